//! Identity Center report records
//!
//! Plain data gathered by the permission-set report. The SDK-facing code in
//! the main crate fills these in; rendering and CSV export only read them.

use crate::defaults::NONE_PLACEHOLDER;
use indexmap::IndexMap;

/// Principal type string used by Identity Center for users
pub const PRINCIPAL_USER: &str = "USER";

/// Principal type string used by Identity Center for groups
pub const PRINCIPAL_GROUP: &str = "GROUP";

/// Account that has at least one provisioned permission set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSummary {
    pub id: String,
    pub name: String,
}

/// One principal assigned a permission set in an account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// `USER`, `GROUP`, or whatever else Identity Center reports
    pub principal_type: String,
    /// Resolved user name or group display name; empty when unresolved
    pub name: String,
    pub permission_set: String,
    pub account_id: String,
}

impl Assignment {
    pub fn is_group(&self) -> bool {
        self.principal_type == PRINCIPAL_GROUP
    }
}

/// Policies attached to one permission set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionSetPolicies {
    pub permission_set: String,
    pub aws_managed: Vec<String>,
    pub customer_managed: Vec<String>,
    pub inline_policy: String,
}

impl PermissionSetPolicies {
    /// Build a record, substituting the `None` placeholder for empty inputs.
    pub fn new(
        permission_set: impl Into<String>,
        aws_managed: Vec<String>,
        customer_managed: Vec<String>,
        inline_policy: Option<String>,
    ) -> Self {
        Self {
            permission_set: permission_set.into(),
            aws_managed: or_placeholder(aws_managed),
            customer_managed: or_placeholder(customer_managed),
            inline_policy: inline_policy
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| NONE_PLACEHOLDER.to_string()),
        }
    }
}

fn or_placeholder(names: Vec<String>) -> Vec<String> {
    if names.is_empty() {
        vec![NONE_PLACEHOLDER.to_string()]
    } else {
        names
    }
}

/// User name to the groups they belong to, in discovery order
pub type UserGroupMap = IndexMap<String, Vec<String>>;

/// Stable sort putting user assignments first, then the other types by name.
pub fn sort_assignments(assignments: &mut [Assignment]) {
    assignments.sort_by(|a, b| {
        let a_key = (a.principal_type != PRINCIPAL_USER, a.principal_type.as_str());
        let b_key = (b.principal_type != PRINCIPAL_USER, b.principal_type.as_str());
        a_key.cmp(&b_key)
    });
}

/// Group names that appear in GROUP assignments
pub fn assigned_group_names(assignments: &[Assignment]) -> Vec<&str> {
    let mut names: Vec<&str> = Vec::new();
    for a in assignments.iter().filter(|a| a.is_group()) {
        if !names.contains(&a.name.as_str()) {
            names.push(&a.name);
        }
    }
    names
}

/// Append `account` unless an account with the same ID is already present.
pub fn push_unique_account(accounts: &mut Vec<AccountSummary>, account: AccountSummary) -> bool {
    if accounts.iter().any(|a| a.id == account.id) {
        return false;
    }
    accounts.push(account);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignment(kind: &str, name: &str) -> Assignment {
        Assignment {
            principal_type: kind.to_string(),
            name: name.to_string(),
            permission_set: "Admin".to_string(),
            account_id: "111111111111".to_string(),
        }
    }

    #[test]
    fn users_sort_first_and_order_is_stable() {
        let mut list = vec![
            assignment("GROUP", "ops"),
            assignment("USER", "bob"),
            assignment("GROUP", "dev"),
            assignment("USER", "alice"),
        ];
        sort_assignments(&mut list);
        let names: Vec<_> = list.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["bob", "alice", "ops", "dev"]);
    }

    #[test]
    fn empty_policies_become_placeholders() {
        let p = PermissionSetPolicies::new("ReadOnly", vec![], vec![], Some(String::new()));
        assert_eq!(p.aws_managed, vec!["None"]);
        assert_eq!(p.customer_managed, vec!["None"]);
        assert_eq!(p.inline_policy, "None");

        let p = PermissionSetPolicies::new(
            "Admin",
            vec!["AdministratorAccess".into()],
            vec![],
            Some("{\"Version\":\"2012-10-17\"}".into()),
        );
        assert_eq!(p.aws_managed, vec!["AdministratorAccess"]);
        assert_eq!(p.inline_policy, "{\"Version\":\"2012-10-17\"}");
    }

    #[test]
    fn group_names_are_unique() {
        let list = vec![
            assignment("GROUP", "ops"),
            assignment("USER", "bob"),
            assignment("GROUP", "ops"),
            assignment("GROUP", "dev"),
        ];
        assert_eq!(assigned_group_names(&list), vec!["ops", "dev"]);
    }

    #[test]
    fn accounts_are_deduplicated_by_id() {
        let mut accounts = Vec::new();
        let a = AccountSummary {
            id: "1".into(),
            name: "prod".into(),
        };
        assert!(push_unique_account(&mut accounts, a.clone()));
        assert!(!push_unique_account(&mut accounts, a));
        assert_eq!(accounts.len(), 1);
    }
}
