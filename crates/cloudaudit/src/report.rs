//! Console tables for every report

use crate::aws::{Association, TopicEncryption};
use crate::commands::sns::FinalTopicStatus;
use crate::commands::stacks::{ProtectionOutcome, StackProtection};
use cloudaudit_common::export::{
    ASSIGNMENT_HEADERS, MEMBERSHIP_HEADERS, PERMISSION_HEADERS, POLICY_HEADERS,
};
use cloudaudit_common::{Assignment, PermissionEntry, PermissionSetPolicies, UserGroupMap};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use console::style;

pub const STACK_STATUS_HEADERS: [&str; 5] = [
    "Region",
    "Stack Name",
    "Status",
    "Termination Protection",
    "Reason (if not enabled)",
];

pub const PROTECTION_OUTCOME_HEADERS: [&str; 5] = [
    "Region",
    "Stack Name",
    "Status",
    "Termination Protection",
    "Message",
];

pub const TOPIC_HEADERS: [&str; 3] = ["Region", "SNS Topic ARN", "Encryption Status"];

pub const FINAL_TOPIC_HEADERS: [&str; 3] = ["Region", "SNS Topic ARN", "Final Status"];

pub const ASSOCIATION_HEADERS: [&str; 4] = ["SG ID", "Service", "Description", "Result"];

/// Label shown for topics without a key
pub const NOT_ENCRYPTED: &str = "Not Encrypted";

/// Print a bold title followed by the table
pub fn print_table(title: &str, table: &Table) {
    println!("\n{}\n", style(title).bold());
    println!("{table}");
}

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.iter().map(Cell::new).collect::<Vec<_>>());
    table
}

fn flag_cell(text: &str, good: bool) -> Cell {
    Cell::new(text).fg(if good { Color::Green } else { Color::Red })
}

pub fn stack_status_table(rows: &[StackProtection]) -> Table {
    let mut table = new_table(&STACK_STATUS_HEADERS);
    for row in rows {
        table.add_row(vec![
            Cell::new(&row.region),
            Cell::new(&row.stack_name),
            Cell::new(&row.status),
            flag_cell(row.protection_label(), row.protected),
            Cell::new(row.reason()),
        ]);
    }
    table
}

pub fn protection_outcome_table(rows: &[ProtectionOutcome]) -> Table {
    let mut table = new_table(&PROTECTION_OUTCOME_HEADERS);
    for row in rows {
        table.add_row(vec![
            Cell::new(&row.region),
            Cell::new(&row.stack_name),
            flag_cell(row.status_label(), row.success),
            flag_cell(row.protection_label(), row.success),
            Cell::new(&row.message),
        ]);
    }
    table
}

pub fn topic_table(rows: &[TopicEncryption]) -> Table {
    let mut table = new_table(&TOPIC_HEADERS);
    for row in rows {
        let status = row.kms_key_id.as_deref().unwrap_or(NOT_ENCRYPTED);
        table.add_row(vec![
            Cell::new(&row.region),
            Cell::new(&row.topic_arn),
            flag_cell(status, row.is_encrypted()),
        ]);
    }
    table
}

pub fn final_topic_table(rows: &[FinalTopicStatus]) -> Table {
    let mut table = new_table(&FINAL_TOPIC_HEADERS);
    for row in rows {
        table.add_row(vec![
            Cell::new(&row.region),
            Cell::new(&row.topic_arn),
            flag_cell(row.label(), row.encrypted),
        ]);
    }
    table
}

pub fn association_table(rows: &[Association]) -> Table {
    let mut table = new_table(&ASSOCIATION_HEADERS);
    for row in rows {
        let result = if row.is_error() {
            Cell::new(&row.result).fg(Color::Red)
        } else {
            Cell::new(&row.result)
        };
        table.add_row(vec![
            Cell::new(&row.sg_id),
            Cell::new(row.service.name()),
            Cell::new(row.service.description()),
            result,
        ]);
    }
    table
}

pub fn assignment_table(rows: &[Assignment]) -> Table {
    let mut table = new_table(&ASSIGNMENT_HEADERS);
    for row in rows {
        table.add_row(vec![
            Cell::new(&row.principal_type),
            Cell::new(&row.name).fg(Color::Green),
            Cell::new(&row.permission_set).fg(Color::Yellow),
            Cell::new(&row.account_id).fg(Color::Blue),
        ]);
    }
    table
}

pub fn policy_table(rows: &[PermissionSetPolicies]) -> Table {
    let mut table = new_table(&POLICY_HEADERS);
    for row in rows {
        table.add_row(vec![
            Cell::new(&row.permission_set),
            Cell::new(row.aws_managed.join("\n")).fg(Color::Green),
            Cell::new(row.customer_managed.join("\n")).fg(Color::Yellow),
            Cell::new(&row.inline_policy).fg(Color::Blue),
        ]);
    }
    table
}

pub fn membership_table(memberships: &UserGroupMap) -> Table {
    let mut table = new_table(&MEMBERSHIP_HEADERS);
    for (user, groups) in memberships {
        table.add_row(vec![
            Cell::new(user),
            Cell::new(groups.join(", ")).fg(Color::Green),
        ]);
    }
    table
}

pub fn permission_table(entries: &[PermissionEntry]) -> Table {
    let mut headers = PERMISSION_HEADERS;
    // The console table keeps the historical column label
    headers[0] = "Principle";
    let mut table = new_table(&headers);
    for entry in entries {
        table.add_row(entry.row().map(Cell::new).to_vec());
    }
    table
}

/// Single-column table of the users in one group
pub fn member_table(users: &[String]) -> Table {
    let mut table = new_table(&["User"]);
    for user in users {
        table.add_row(vec![Cell::new(user)]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::ExposedService;

    #[test]
    fn stack_table_shows_reason_for_unprotected() {
        let rows = vec![StackProtection {
            region: "us-east-1".into(),
            stack_name: "web".into(),
            status: "CREATE_COMPLETE".into(),
            protected: false,
        }];
        let rendered = stack_status_table(&rows).to_string();
        assert!(rendered.contains("Termination Protection"));
        assert!(rendered.contains("web"));
        assert!(rendered.contains("Disabled"));
    }

    #[test]
    fn topic_table_labels_unencrypted() {
        let rows = vec![TopicEncryption {
            region: "us-east-1".into(),
            topic_arn: "arn:aws:sns:us-east-1:123456789012:alerts".into(),
            kms_key_id: None,
        }];
        assert!(topic_table(&rows).to_string().contains(NOT_ENCRYPTED));
    }

    #[test]
    fn association_table_has_descriptions() {
        let rows = vec![Association {
            sg_id: "sg-1".into(),
            service: ExposedService::Rds,
            result: "orders".into(),
        }];
        let rendered = association_table(&rows).to_string();
        assert!(rendered.contains("Relational Database Service"));
        assert!(rendered.contains("orders"));
    }

    #[test]
    fn permission_table_uses_principle_header() {
        let rendered = permission_table(&[]).to_string();
        assert!(rendered.contains("Principle"));
        assert!(rendered.contains("Policy Type"));
    }

    #[test]
    fn membership_table_joins_groups() {
        let mut memberships = UserGroupMap::new();
        memberships.insert("alice".into(), vec!["ops".into(), "dev".into()]);
        assert!(membership_table(&memberships).to_string().contains("ops, dev"));
    }
}
