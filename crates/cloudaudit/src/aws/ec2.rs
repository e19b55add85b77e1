//! EC2 security group and instance lookups

use super::context::{AwsContext, FromAwsContext};
use super::error::sdk_context;
use anyhow::Result;
use aws_sdk_ec2::types::{Filter, SecurityGroup};
use cloudaudit_common::defaults::{OPEN_IPV4_CIDR, OPEN_IPV6_CIDR};
use tracing::debug;

/// Whether any inbound rule of `group` admits the whole internet.
///
/// IPv4 `0.0.0.0/0` always counts; IPv6 `::/0` only when `include_ipv6` is set.
pub fn is_open_to_internet(group: &SecurityGroup, include_ipv6: bool) -> bool {
    group.ip_permissions().iter().any(|permission| {
        let v4 = permission
            .ip_ranges()
            .iter()
            .any(|range| range.cidr_ip() == Some(OPEN_IPV4_CIDR));
        let v6 = include_ipv6
            && permission
                .ipv6_ranges()
                .iter()
                .any(|range| range.cidr_ipv6() == Some(OPEN_IPV6_CIDR));
        v4 || v6
    })
}

/// IDs of open groups, unique and in first-seen order
pub fn open_group_ids<'a, I>(groups: I, include_ipv6: bool) -> Vec<String>
where
    I: IntoIterator<Item = &'a SecurityGroup>,
{
    let mut ids: Vec<String> = Vec::new();
    for group in groups {
        if !is_open_to_internet(group, include_ipv6) {
            continue;
        }
        if let Some(id) = group.group_id() {
            if !ids.iter().any(|seen| seen == id) {
                ids.push(id.to_string());
            }
        }
    }
    ids
}

/// EC2 client for the exposure scan
pub struct Ec2Client {
    client: aws_sdk_ec2::Client,
}

impl FromAwsContext for Ec2Client {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.ec2_client(),
        }
    }
}

impl Ec2Client {
    /// All security groups with an inbound rule open to the internet
    pub async fn open_security_groups(&self, include_ipv6: bool) -> Result<Vec<String>> {
        let mut groups = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = self
                .client
                .describe_security_groups()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(sdk_context)?;

            groups.extend(response.security_groups().iter().cloned());

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        let open = open_group_ids(&groups, include_ipv6);
        debug!(scanned = groups.len(), open = open.len(), "Scanned security groups");
        Ok(open)
    }

    /// Instance IDs that have `sg_id` attached
    pub async fn instances_in_group(&self, sg_id: &str) -> Result<Vec<String>> {
        let filter = Filter::builder()
            .name("instance.group-id")
            .values(sg_id)
            .build();

        let mut instance_ids = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = self
                .client
                .describe_instances()
                .filters(filter.clone())
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(sdk_context)?;

            for reservation in response.reservations() {
                for instance in reservation.instances() {
                    if let Some(id) = instance.instance_id() {
                        instance_ids.push(id.to_string());
                    }
                }
            }

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(instance_ids)
    }

    /// The VPC the group belongs to, if it has one
    pub async fn group_vpc(&self, sg_id: &str) -> Result<Option<String>> {
        let response = self
            .client
            .describe_security_groups()
            .group_ids(sg_id)
            .send()
            .await
            .map_err(sdk_context)?;

        Ok(response
            .security_groups()
            .first()
            .and_then(|g| g.vpc_id())
            .map(str::to_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_ec2::types::{IpPermission, IpRange, Ipv6Range};

    fn group(id: &str, v4: &[&str], v6: &[&str]) -> SecurityGroup {
        let mut permission = IpPermission::builder().ip_protocol("tcp");
        for cidr in v4 {
            permission = permission.ip_ranges(IpRange::builder().cidr_ip(*cidr).build());
        }
        for cidr in v6 {
            permission = permission.ipv6_ranges(Ipv6Range::builder().cidr_ipv6(*cidr).build());
        }
        SecurityGroup::builder()
            .group_id(id)
            .ip_permissions(permission.build())
            .build()
    }

    #[test]
    fn ipv4_world_range_is_open() {
        assert!(is_open_to_internet(&group("sg-1", &["0.0.0.0/0"], &[]), false));
        assert!(!is_open_to_internet(&group("sg-2", &["10.0.0.0/8"], &[]), false));
    }

    #[test]
    fn ipv6_world_range_needs_opt_in() {
        let g = group("sg-3", &[], &["::/0"]);
        assert!(!is_open_to_internet(&g, false));
        assert!(is_open_to_internet(&g, true));
    }

    #[test]
    fn group_without_rules_is_closed() {
        let g = SecurityGroup::builder().group_id("sg-4").build();
        assert!(!is_open_to_internet(&g, true));
    }

    #[test]
    fn open_ids_are_unique_and_ordered() {
        let groups = vec![
            group("sg-b", &["0.0.0.0/0"], &[]),
            group("sg-closed", &["192.168.0.0/16"], &[]),
            group("sg-a", &["10.0.0.0/8", "0.0.0.0/0"], &[]),
            group("sg-b", &["0.0.0.0/0"], &[]),
        ];
        assert_eq!(open_group_ids(&groups, false), vec!["sg-b", "sg-a"]);
    }
}
