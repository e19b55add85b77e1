//! Correlation of open security groups with the resources that use them
//!
//! Each [`ExposedService`] knows how to find the resources attached to a
//! group. Lookups go through [`AssociationLookup`] so the correlation rules
//! can be tested without AWS.

use super::context::{AwsContext, FromAwsContext};
use super::ec2::Ec2Client;
use super::error::sdk_context;
use anyhow::Result;
use cloudaudit_common::defaults::ECS_DESCRIBE_TASKS_BATCH;
use std::fmt;
use tracing::{debug, warn};

/// Services checked for security group usage, in report order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExposedService {
    Rds,
    Ecs,
    Eks,
    Ec2,
    Elb,
    Vpc,
    ElastiCache,
    MemoryDb,
}

impl ExposedService {
    pub const ALL: [ExposedService; 8] = [
        ExposedService::Rds,
        ExposedService::Ecs,
        ExposedService::Eks,
        ExposedService::Ec2,
        ExposedService::Elb,
        ExposedService::Vpc,
        ExposedService::ElastiCache,
        ExposedService::MemoryDb,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ExposedService::Rds => "RDS",
            ExposedService::Ecs => "ECS",
            ExposedService::Eks => "EKS",
            ExposedService::Ec2 => "EC2",
            ExposedService::Elb => "ELB",
            ExposedService::Vpc => "VPC",
            ExposedService::ElastiCache => "ElastiCache",
            ExposedService::MemoryDb => "MemoryDB",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ExposedService::Rds => "Relational Database Service (RDS)",
            ExposedService::Ecs => "Elastic Container Service (ECS)",
            ExposedService::Eks => "Elastic Kubernetes Service (EKS)",
            ExposedService::Ec2 => "Elastic Compute Cloud (EC2)",
            ExposedService::Elb => "Elastic Load Balancing (ELB)",
            ExposedService::Vpc => "Virtual Private Cloud (VPC)",
            ExposedService::ElastiCache => "ElastiCache",
            ExposedService::MemoryDb => "MemoryDB",
        }
    }
}

impl fmt::Display for ExposedService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One report row: a group, a service, and what was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Association {
    pub sg_id: String,
    pub service: ExposedService,
    /// Comma-joined resource identifiers, or `Error: <message>`
    pub result: String,
}

impl Association {
    pub fn is_error(&self) -> bool {
        self.result.starts_with("Error: ")
    }
}

/// Trait for the remote side of the exposure scan
#[allow(async_fn_in_trait)]
#[cfg_attr(test, mockall::automock)]
pub trait AssociationLookup: Send + Sync {
    async fn open_security_groups(&self, include_ipv6: bool) -> Result<Vec<String>>;

    async fn associated_resources(&self, service: ExposedService, sg_id: &str)
    -> Result<Vec<String>>;
}

/// Check every service for every group.
///
/// Empty results produce no row; a failed lookup produces an `Error:` row and
/// the scan continues.
pub async fn correlate<L: AssociationLookup>(lookup: &L, sg_ids: &[String]) -> Vec<Association> {
    let mut associations = Vec::new();

    for sg_id in sg_ids {
        println!("Checking associations for Security Group: {sg_id}...");

        for service in ExposedService::ALL {
            let result = match lookup.associated_resources(service, sg_id).await {
                Ok(resources) if resources.is_empty() => continue,
                Ok(resources) => resources.join(", "),
                Err(e) => {
                    warn!(sg_id = %sg_id, service = %service, error = %e, "Association lookup failed");
                    format!("Error: {e}")
                }
            };
            associations.push(Association {
                sg_id: sg_id.clone(),
                service,
                result,
            });
        }
    }

    associations
}

/// Looks up associations with the real service APIs in one region
pub struct ExposureScanner {
    ctx: AwsContext,
    ec2: Ec2Client,
}

impl FromAwsContext for ExposureScanner {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            ctx: ctx.clone(),
            ec2: Ec2Client::from_context(ctx),
        }
    }
}

impl AssociationLookup for ExposureScanner {
    async fn open_security_groups(&self, include_ipv6: bool) -> Result<Vec<String>> {
        self.ec2.open_security_groups(include_ipv6).await
    }

    async fn associated_resources(
        &self,
        service: ExposedService,
        sg_id: &str,
    ) -> Result<Vec<String>> {
        let found = match service {
            ExposedService::Rds => self.rds_instances(sg_id).await?,
            ExposedService::Ecs => self.ecs_tasks(sg_id).await?,
            ExposedService::Eks => self.eks_clusters(sg_id).await?,
            ExposedService::Ec2 => self.ec2.instances_in_group(sg_id).await?,
            ExposedService::Elb => self.classic_load_balancers(sg_id).await?,
            ExposedService::Vpc => self.ec2.group_vpc(sg_id).await?.into_iter().collect(),
            ExposedService::ElastiCache => self.cache_clusters(sg_id).await?,
            ExposedService::MemoryDb => self.memorydb_clusters(sg_id).await?,
        };
        debug!(sg_id = %sg_id, service = %service, count = found.len(), "Checked service");
        Ok(found)
    }
}

impl ExposureScanner {
    async fn rds_instances(&self, sg_id: &str) -> Result<Vec<String>> {
        let client = self.ctx.rds_client();
        let mut found = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let response = client
                .describe_db_instances()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(sdk_context)?;

            found.extend(db_instances_using(response.db_instances(), sg_id));

            match response.marker() {
                Some(m) => marker = Some(m.to_string()),
                None => break,
            }
        }

        Ok(found)
    }

    async fn ecs_tasks(&self, sg_id: &str) -> Result<Vec<String>> {
        let client = self.ctx.ecs_client();
        let mut found = Vec::new();

        let mut clusters = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let response = client
                .list_clusters()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(sdk_context)?;
            clusters.extend(response.cluster_arns().iter().cloned());
            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        for cluster in &clusters {
            let mut task_arns = Vec::new();
            let mut next_token: Option<String> = None;
            loop {
                let response = client
                    .list_tasks()
                    .cluster(cluster)
                    .set_next_token(next_token.take())
                    .send()
                    .await
                    .map_err(sdk_context)?;
                task_arns.extend(response.task_arns().iter().cloned());
                match response.next_token() {
                    Some(token) => next_token = Some(token.to_string()),
                    None => break,
                }
            }

            for batch in task_arns.chunks(ECS_DESCRIBE_TASKS_BATCH) {
                let response = client
                    .describe_tasks()
                    .cluster(cluster)
                    .set_tasks(Some(batch.to_vec()))
                    .send()
                    .await
                    .map_err(sdk_context)?;
                found.extend(tasks_using(response.tasks(), sg_id));
            }
        }

        Ok(found)
    }

    async fn eks_clusters(&self, sg_id: &str) -> Result<Vec<String>> {
        let client = self.ctx.eks_client();
        let mut names = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = client
                .list_clusters()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(sdk_context)?;
            names.extend(response.clusters().iter().cloned());
            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        let mut found = Vec::new();
        for name in names {
            let response = client
                .describe_cluster()
                .name(&name)
                .send()
                .await
                .map_err(sdk_context)?;
            if response
                .cluster()
                .is_some_and(|cluster| eks_cluster_uses(cluster, sg_id))
            {
                found.push(name);
            }
        }

        Ok(found)
    }

    async fn classic_load_balancers(&self, sg_id: &str) -> Result<Vec<String>> {
        let client = self.ctx.elb_client();
        let mut found = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let response = client
                .describe_load_balancers()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(sdk_context)?;

            found.extend(load_balancers_using(
                response.load_balancer_descriptions(),
                sg_id,
            ));

            match response.next_marker() {
                Some(m) => marker = Some(m.to_string()),
                None => break,
            }
        }

        Ok(found)
    }

    async fn cache_clusters(&self, sg_id: &str) -> Result<Vec<String>> {
        let client = self.ctx.elasticache_client();
        let mut found = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let response = client
                .describe_cache_clusters()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(sdk_context)?;

            found.extend(cache_clusters_using(response.cache_clusters(), sg_id));

            match response.marker() {
                Some(m) => marker = Some(m.to_string()),
                None => break,
            }
        }

        Ok(found)
    }

    async fn memorydb_clusters(&self, sg_id: &str) -> Result<Vec<String>> {
        let client = self.ctx.memorydb_client();
        let mut found = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = client
                .describe_clusters()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(sdk_context)?;

            found.extend(memorydb_clusters_using(response.clusters(), sg_id));

            match response.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(found)
    }
}

fn db_instances_using(instances: &[aws_sdk_rds::types::DbInstance], sg_id: &str) -> Vec<String> {
    instances
        .iter()
        .filter(|db| {
            db.vpc_security_groups()
                .iter()
                .any(|m| m.vpc_security_group_id() == Some(sg_id))
        })
        .filter_map(|db| db.db_instance_identifier())
        .map(str::to_string)
        .collect()
}

/// Tasks whose ENI attachment details carry the group ID
fn tasks_using(tasks: &[aws_sdk_ecs::types::Task], sg_id: &str) -> Vec<String> {
    tasks
        .iter()
        .filter(|task| {
            task.attachments()
                .iter()
                .flat_map(|a| a.details())
                .any(|detail| detail.value() == Some(sg_id))
        })
        .filter_map(|task| task.task_arn())
        .map(str::to_string)
        .collect()
}

fn eks_cluster_uses(cluster: &aws_sdk_eks::types::Cluster, sg_id: &str) -> bool {
    cluster.resources_vpc_config().is_some_and(|vpc| {
        vpc.security_group_ids().iter().any(|id| id == sg_id)
            || vpc.cluster_security_group_id() == Some(sg_id)
    })
}

fn load_balancers_using(
    balancers: &[aws_sdk_elasticloadbalancing::types::LoadBalancerDescription],
    sg_id: &str,
) -> Vec<String> {
    balancers
        .iter()
        .filter(|lb| lb.security_groups().iter().any(|id| id == sg_id))
        .filter_map(|lb| lb.load_balancer_name())
        .map(str::to_string)
        .collect()
}

fn cache_clusters_using(
    clusters: &[aws_sdk_elasticache::types::CacheCluster],
    sg_id: &str,
) -> Vec<String> {
    clusters
        .iter()
        .filter(|c| {
            c.security_groups()
                .iter()
                .any(|m| m.security_group_id() == Some(sg_id))
        })
        .filter_map(|c| c.cache_cluster_id())
        .map(str::to_string)
        .collect()
}

fn memorydb_clusters_using(
    clusters: &[aws_sdk_memorydb::types::Cluster],
    sg_id: &str,
) -> Vec<String> {
    clusters
        .iter()
        .filter(|c| {
            c.security_groups()
                .iter()
                .any(|m| m.security_group_id() == Some(sg_id))
        })
        .filter_map(|c| c.name())
        .map(str::to_string)
        .collect()
}
