//! CSV export layouts
//!
//! Each report has a fixed column layout. Multi-table reports are written
//! into one file with a blank row between sections.

use crate::permissions::PermissionReport;
use crate::sso::{Assignment, PermissionSetPolicies, UserGroupMap};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Headers of the Identity Center assignments section
pub const ASSIGNMENT_HEADERS: [&str; 4] = ["Type", "User/Group Name", "Permission Set", "Account ID"];

/// Headers of the Identity Center policies section
pub const POLICY_HEADERS: [&str; 4] = [
    "Permission Set",
    "AWS Managed Policies",
    "Customer Managed Policies",
    "Inline Policy",
];

/// Headers of the Identity Center membership section
pub const MEMBERSHIP_HEADERS: [&str; 2] = ["User Name", "Groups"];

/// Headers of the IAM permissions table
pub const PERMISSION_HEADERS: [&str; 5] = [
    "Name",
    "Policy Name",
    "Resource Type",
    "Policy Type",
    "Permission",
];

fn writer<W: Write>(out: W) -> csv::Writer<W> {
    csv::WriterBuilder::new().flexible(true).from_writer(out)
}

/// Section separator: an empty line, not a quoted empty field
fn blank_row<W: Write>(w: &mut csv::Writer<W>) -> Result<()> {
    w.flush()?;
    w.get_mut().write_all(b"\n")?;
    Ok(())
}

/// Create (or truncate) an export file
pub fn create(path: &Path) -> Result<File> {
    File::create(path).with_context(|| format!("Failed to create CSV file: {}", path.display()))
}

/// Write a single table: one header row followed by the data rows.
pub fn write_table<W, R>(out: W, headers: &[&str], rows: R) -> Result<()>
where
    W: Write,
    R: IntoIterator<Item = Vec<String>>,
{
    let mut w = writer(out);
    w.write_record(headers)?;
    let mut count = 0usize;
    for row in rows {
        w.write_record(&row)?;
        count += 1;
    }
    w.flush()?;
    info!(rows = count, "CSV table written");
    Ok(())
}

/// Write the Identity Center report: assignments, policies, memberships.
///
/// Policies expand to one row per policy index; the permission set name and
/// inline policy appear only on the first row of each set.
pub fn write_sso_report<W: Write>(
    out: W,
    assignments: &[Assignment],
    policies: &[PermissionSetPolicies],
    user_groups: &UserGroupMap,
) -> Result<()> {
    let mut w = writer(out);

    w.write_record(ASSIGNMENT_HEADERS)?;
    for a in assignments {
        w.write_record([&a.principal_type, &a.name, &a.permission_set, &a.account_id])?;
    }

    blank_row(&mut w)?;

    w.write_record(POLICY_HEADERS)?;
    for p in policies {
        let rows = p.aws_managed.len().max(p.customer_managed.len()).max(1);
        for i in 0..rows {
            let first = i == 0;
            w.write_record([
                if first { p.permission_set.as_str() } else { "" },
                p.aws_managed.get(i).map(String::as_str).unwrap_or(""),
                p.customer_managed.get(i).map(String::as_str).unwrap_or(""),
                if first { p.inline_policy.as_str() } else { "" },
            ])?;
        }
    }

    blank_row(&mut w)?;

    w.write_record(MEMBERSHIP_HEADERS)?;
    for (user, groups) in user_groups {
        w.write_record([user.as_str(), groups.join(", ").as_str()])?;
    }

    w.flush()?;
    Ok(())
}

/// Write the IAM permissions report followed by one section per group table.
pub fn write_permissions_report<W: Write>(out: W, report: &PermissionReport) -> Result<()> {
    let mut w = writer(out);

    w.write_record(["Main Permissions Table"])?;
    w.write_record(PERMISSION_HEADERS)?;
    for entry in &report.entries {
        w.write_record(entry.row())?;
    }

    for (group, users) in report.member_tables() {
        blank_row(&mut w)?;
        w.write_record([format!("Users in Group '{group}' Table")])?;
        w.write_record(["User"])?;
        for user in users {
            w.write_record([user])?;
        }
    }

    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::{AuthorizationDetails, PermissionMatcher, analyze};

    fn lines(bytes: Vec<u8>) -> Vec<String> {
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn single_table_layout() {
        let mut out = Vec::new();
        write_table(
            &mut out,
            &["Region", "Stack Name"],
            vec![vec!["us-east-1".to_string(), "web".to_string()]],
        )
        .unwrap();
        assert_eq!(lines(out), vec!["Region,Stack Name", "us-east-1,web"]);
    }

    #[test]
    fn sso_report_layout() {
        let assignments = vec![Assignment {
            principal_type: "USER".into(),
            name: "alice".into(),
            permission_set: "Admin".into(),
            account_id: "111111111111".into(),
        }];
        let policies = vec![PermissionSetPolicies::new(
            "Admin",
            vec!["AdministratorAccess".into(), "Billing".into()],
            vec!["cm-one".into()],
            None,
        )];
        let mut groups = UserGroupMap::new();
        groups.insert("alice".into(), vec!["ops".into(), "dev".into()]);

        let mut out = Vec::new();
        write_sso_report(&mut out, &assignments, &policies, &groups).unwrap();
        let lines = lines(out);

        assert_eq!(
            lines,
            vec![
                "Type,User/Group Name,Permission Set,Account ID",
                "USER,alice,Admin,111111111111",
                "",
                "Permission Set,AWS Managed Policies,Customer Managed Policies,Inline Policy",
                "Admin,AdministratorAccess,cm-one,None",
                ",Billing,,",
                "",
                "User Name,Groups",
                "alice,\"ops, dev\"",
            ]
        );
    }

    #[test]
    fn permissions_report_layout() {
        let details = AuthorizationDetails::from_json(
            r#"{
                "UserDetailList": [{"UserName": "bob", "GroupList": ["readers"]}],
                "GroupDetailList": [{
                    "GroupName": "readers",
                    "GroupPolicyList": [{
                        "PolicyName": "read",
                        "PolicyDocument": {"Statement": [{"Action": "secretsmanager:GetSecretValue"}]}
                    }]
                }]
            }"#,
        )
        .unwrap();
        let report = analyze(
            &details,
            &PermissionMatcher::new(["secretsmanager:GetSecretValue"], Vec::<String>::new()),
        );

        let mut out = Vec::new();
        write_permissions_report(&mut out, &report).unwrap();
        let lines = lines(out);

        assert_eq!(
            lines,
            vec![
                "Main Permissions Table",
                "Name,Policy Name,Resource Type,Policy Type,Permission",
                "readers,read,group,inline,secretsmanager:GetSecretValue",
                "",
                "Users in Group 'readers' Table",
                "User",
                "bob",
            ]
        );
    }

    #[test]
    fn sections_are_separated_by_an_empty_line() {
        let mut out = Vec::new();
        {
            let mut w = writer(&mut out);
            w.write_record(["a"]).unwrap();
            blank_row(&mut w).unwrap();
            w.write_record(["b"]).unwrap();
            w.flush().unwrap();
        }
        assert_eq!(String::from_utf8(out).unwrap(), "a\n\nb\n");
    }

    #[test]
    fn create_reports_bad_path() {
        let err = create(Path::new("/nonexistent-dir/out.csv")).unwrap_err();
        assert!(err.to_string().contains("Failed to create CSV file"));
    }
}
