//! IAM authorization-details model and permission matching
//!
//! The model mirrors the JSON produced by
//! `aws iam get-account-authorization-details`, keeping only the parts the
//! permissions report reads. Documents fetched live from the IAM API are
//! converted into the same model, so the analysis runs identically on both.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::Path;

/// A JSON value that may be given either as a single item or as a list.
///
/// IAM policy grammar allows both `"Action": "s3:GetObject"` and
/// `"Action": ["s3:GetObject", "s3:PutObject"]`, and the same for `Statement`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        match self {
            OneOrMany::One(item) => std::slice::from_ref(item).iter(),
            OneOrMany::Many(items) => items.iter(),
        }
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(items: Vec<T>) -> Self {
        OneOrMany::Many(items)
    }
}

/// Authorization details for one account
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AuthorizationDetails {
    #[serde(default)]
    pub user_detail_list: Vec<UserDetail>,
    #[serde(default)]
    pub group_detail_list: Vec<GroupDetail>,
    #[serde(default)]
    pub role_detail_list: Vec<RoleDetail>,
    #[serde(default)]
    pub policies: Vec<ManagedPolicy>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserDetail {
    pub user_name: String,
    /// Names of the groups this user belongs to
    #[serde(default)]
    pub group_list: Vec<String>,
    #[serde(default)]
    pub user_policy_list: Vec<InlinePolicy>,
    #[serde(default)]
    pub attached_managed_policies: Vec<AttachedPolicy>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GroupDetail {
    pub group_name: String,
    #[serde(default)]
    pub group_policy_list: Vec<InlinePolicy>,
    #[serde(default)]
    pub attached_managed_policies: Vec<AttachedPolicy>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoleDetail {
    pub role_name: String,
    #[serde(default)]
    pub role_policy_list: Vec<InlinePolicy>,
    #[serde(default)]
    pub attached_managed_policies: Vec<AttachedPolicy>,
}

/// Policy embedded directly in a user, group or role
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InlinePolicy {
    pub policy_name: String,
    #[serde(default)]
    pub policy_document: PolicyDocument,
}

/// Reference from a principal to a managed policy
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AttachedPolicy {
    pub policy_arn: String,
    #[serde(default)]
    pub policy_name: Option<String>,
}

/// Managed policy with its stored versions
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ManagedPolicy {
    pub policy_name: String,
    pub arn: String,
    #[serde(default)]
    pub policy_version_list: Vec<PolicyVersion>,
}

impl ManagedPolicy {
    /// Document of the default version, or of the first listed version when
    /// none is flagged as default.
    pub fn effective_document(&self) -> Option<&PolicyDocument> {
        self.policy_version_list
            .iter()
            .find(|v| v.is_default_version)
            .or_else(|| self.policy_version_list.first())
            .map(|v| &v.document)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyVersion {
    #[serde(default)]
    pub document: PolicyDocument,
    #[serde(default)]
    pub is_default_version: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    #[serde(default)]
    pub statement: OneOrMany<Statement>,
}

impl PolicyDocument {
    /// Parse a policy document from its JSON text
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// A single policy statement. Only `Action` matters to the matcher;
/// statements using `NotAction` carry no actions and never match.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    #[serde(default)]
    pub action: OneOrMany<String>,
}

impl AuthorizationDetails {
    /// Parse authorization details from JSON text
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Load authorization details from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read authorization details: {}", path.display()))?;

        Self::from_json(&content)
            .with_context(|| format!("Failed to parse authorization details: {}", path.display()))
    }
}

/// Decides whether a policy action is one of the permissions being searched for
#[derive(Debug, Clone, Default)]
pub struct PermissionMatcher {
    exact: HashSet<String>,
    /// Prefixes with any trailing `*` already stripped
    prefixes: Vec<String>,
}

impl PermissionMatcher {
    pub fn new<E, P>(exact: E, prefixes: P) -> Self
    where
        E: IntoIterator,
        E::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            exact: exact.into_iter().map(Into::into).collect(),
            prefixes: prefixes
                .into_iter()
                .map(|p| p.into().trim_end_matches('*').to_string())
                .collect(),
        }
    }

    /// `*` always matches, then exact permissions, then prefixes.
    pub fn matches(&self, action: &str) -> bool {
        if action == "*" || self.exact.contains(action) {
            return true;
        }
        self.prefixes.iter().any(|p| action.starts_with(p.as_str()))
    }
}

/// Kind of IAM principal. The declaration order is the report's sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PrincipalKind {
    User,
    Group,
    Role,
}

impl PrincipalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PrincipalKind::User => "user",
            PrincipalKind::Group => "group",
            PrincipalKind::Role => "role",
        }
    }
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PolicyKind {
    Inline,
    Managed,
}

impl PolicyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PolicyKind::Inline => "inline",
            PolicyKind::Managed => "managed",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One matched permission. Field order drives the derived ordering:
/// principal kind first, then principal name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PermissionEntry {
    pub principal_kind: PrincipalKind,
    pub principal: String,
    pub policy_name: String,
    pub policy_kind: PolicyKind,
    pub action: String,
}

impl PermissionEntry {
    /// Row in the report's column order: name, policy, resource type, policy type, permission
    pub fn row(&self) -> [&str; 5] {
        [
            &self.principal,
            &self.policy_name,
            self.principal_kind.as_str(),
            self.policy_kind.as_str(),
            &self.action,
        ]
    }
}

/// Result of matching an account's policies
#[derive(Debug, Clone, Default)]
pub struct PermissionReport {
    /// Unique matches, sorted users first, then groups, then roles
    pub entries: Vec<PermissionEntry>,
    /// Groups with at least one matching entry
    pub groups_with_permissions: HashSet<String>,
    /// Every group, in input order, with its member users
    pub group_members: IndexMap<String, Vec<String>>,
}

impl PermissionReport {
    /// Groups worth a membership table: they matched and have members
    pub fn member_tables(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.group_members
            .iter()
            .filter(|(group, users)| self.groups_with_permissions.contains(*group) && !users.is_empty())
            .map(|(group, users)| (group.as_str(), users.as_slice()))
    }
}

struct Collector<'a> {
    matcher: &'a PermissionMatcher,
    managed: HashMap<&'a str, &'a ManagedPolicy>,
    entries: BTreeSet<PermissionEntry>,
}

impl<'a> Collector<'a> {
    /// Record every matching action of `document`. Returns whether anything matched.
    fn scan(
        &mut self,
        principal: &str,
        principal_kind: PrincipalKind,
        policy_name: &str,
        policy_kind: PolicyKind,
        document: &PolicyDocument,
    ) -> bool {
        let mut matched = false;
        for statement in document.statement.iter() {
            for action in statement.action.iter() {
                if self.matcher.matches(action) {
                    matched = true;
                    self.entries.insert(PermissionEntry {
                        principal_kind,
                        principal: principal.to_string(),
                        policy_name: policy_name.to_string(),
                        policy_kind,
                        action: action.clone(),
                    });
                }
            }
        }
        matched
    }

    fn scan_principal(
        &mut self,
        principal: &str,
        kind: PrincipalKind,
        inline: &[InlinePolicy],
        attached: &[AttachedPolicy],
    ) -> bool {
        let mut matched = false;
        for policy in inline {
            matched |= self.scan(
                principal,
                kind,
                &policy.policy_name,
                PolicyKind::Inline,
                &policy.policy_document,
            );
        }
        for attachment in attached {
            // Managed policies missing from the document are skipped
            let Some(policy) = self.managed.get(attachment.policy_arn.as_str()).copied() else {
                continue;
            };
            if let Some(document) = policy.effective_document() {
                matched |= self.scan(
                    principal,
                    kind,
                    &policy.policy_name,
                    PolicyKind::Managed,
                    document,
                );
            }
        }
        matched
    }
}

/// Match every user, group and role policy in `details` against `matcher`.
pub fn analyze(details: &AuthorizationDetails, matcher: &PermissionMatcher) -> PermissionReport {
    let mut collector = Collector {
        matcher,
        managed: details
            .policies
            .iter()
            .map(|p| (p.arn.as_str(), p))
            .collect(),
        entries: BTreeSet::new(),
    };

    let mut groups_with_permissions = HashSet::new();
    let mut group_members: IndexMap<String, Vec<String>> = IndexMap::new();

    for group in &details.group_detail_list {
        group_members.entry(group.group_name.clone()).or_default();
        if collector.scan_principal(
            &group.group_name,
            PrincipalKind::Group,
            &group.group_policy_list,
            &group.attached_managed_policies,
        ) {
            groups_with_permissions.insert(group.group_name.clone());
        }
    }

    for user in &details.user_detail_list {
        for group in &user.group_list {
            if let Some(members) = group_members.get_mut(group) {
                members.push(user.user_name.clone());
            }
        }
    }

    for user in &details.user_detail_list {
        collector.scan_principal(
            &user.user_name,
            PrincipalKind::User,
            &user.user_policy_list,
            &user.attached_managed_policies,
        );
    }

    for role in &details.role_detail_list {
        collector.scan_principal(
            &role.role_name,
            PrincipalKind::Role,
            &role.role_policy_list,
            &role.attached_managed_policies,
        );
    }

    PermissionReport {
        entries: collector.entries.into_iter().collect(),
        groups_with_permissions,
        group_members,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const GAAD: &str = r#"{
        "UserDetailList": [
            {
                "UserName": "zoe",
                "GroupList": ["secret-readers", "empty-perms"],
                "UserPolicyList": [
                    {
                        "PolicyName": "zoe-inline",
                        "PolicyDocument": {
                            "Version": "2012-10-17",
                            "Statement": {"Effect": "Allow", "Action": "secretsmanager:GetSecretValue", "Resource": "*"}
                        }
                    }
                ],
                "AttachedManagedPolicies": []
            },
            {
                "UserName": "adam",
                "GroupList": ["secret-readers"],
                "AttachedManagedPolicies": [
                    {"PolicyName": "SecretsFull", "PolicyArn": "arn:aws:iam::111111111111:policy/SecretsFull"}
                ]
            }
        ],
        "GroupDetailList": [
            {
                "GroupName": "secret-readers",
                "GroupPolicyList": [
                    {
                        "PolicyName": "read-secrets",
                        "PolicyDocument": {
                            "Statement": [
                                {"Effect": "Allow", "Action": ["secretsmanager:GetSecretValue", "s3:GetObject"]}
                            ]
                        }
                    }
                ]
            },
            {
                "GroupName": "empty-perms",
                "GroupPolicyList": [],
                "AttachedManagedPolicies": []
            }
        ],
        "RoleDetailList": [
            {
                "RoleName": "admin-role",
                "RolePolicyList": [
                    {"PolicyName": "god-mode", "PolicyDocument": {"Statement": [{"Action": "*"}]}}
                ],
                "AttachedManagedPolicies": [
                    {"PolicyName": "Unknown", "PolicyArn": "arn:aws:iam::aws:policy/NotInDocument"}
                ]
            }
        ],
        "Policies": [
            {
                "PolicyName": "SecretsFull",
                "Arn": "arn:aws:iam::111111111111:policy/SecretsFull",
                "PolicyVersionList": [
                    {"Document": {"Statement": [{"Action": "s3:*"}]}, "IsDefaultVersion": false},
                    {"Document": {"Statement": [{"Action": ["secretsmanager:*"]}]}, "IsDefaultVersion": true}
                ]
            }
        ]
    }"#;

    fn default_matcher() -> PermissionMatcher {
        PermissionMatcher::new(
            ["secretsmanager:GetSecretValue", "secretsmanager:*"],
            Vec::<String>::new(),
        )
    }

    #[test]
    fn matcher_exact_and_wildcard() {
        let m = default_matcher();
        assert!(m.matches("secretsmanager:GetSecretValue"));
        assert!(m.matches("secretsmanager:*"));
        assert!(m.matches("*"));
        assert!(!m.matches("secretsmanager:ListSecrets"));
        assert!(!m.matches("s3:GetObject"));
    }

    #[test]
    fn matcher_prefixes_strip_trailing_star() {
        let m = PermissionMatcher::new(Vec::<String>::new(), ["s3:*", "iam:"]);
        assert!(m.matches("s3:GetObject"));
        assert!(m.matches("s3:*"));
        assert!(m.matches("iam:PassRole"));
        assert!(!m.matches("ec2:RunInstances"));
    }

    #[test]
    fn matcher_without_prefixes_ignores_partial_matches() {
        let m = PermissionMatcher::new(["iam:*"], Vec::<String>::new());
        assert!(!m.matches("iam:PassRole"));
        assert!(m.matches("iam:*"));
    }

    #[test]
    fn statement_and_action_accept_single_values() {
        let doc = PolicyDocument::from_json(
            r#"{"Statement": {"Action": "sns:Publish"}}"#,
        )
        .unwrap();
        let actions: Vec<_> = doc
            .statement
            .iter()
            .flat_map(|s| s.action.iter())
            .collect();
        assert_eq!(actions, vec!["sns:Publish"]);
    }

    #[test]
    fn not_action_statements_have_no_actions() {
        let doc = PolicyDocument::from_json(
            r#"{"Statement": [{"Effect": "Deny", "NotAction": "iam:*"}]}"#,
        )
        .unwrap();
        assert_eq!(doc.statement.iter().flat_map(|s| s.action.iter()).count(), 0);
    }

    #[test]
    fn effective_document_prefers_default_version() {
        let details = AuthorizationDetails::from_json(GAAD).unwrap();
        let doc = details.policies[0].effective_document().unwrap();
        let actions: Vec<_> = doc.statement.iter().flat_map(|s| s.action.iter()).collect();
        assert_eq!(actions, vec!["secretsmanager:*"]);
    }

    #[test]
    fn effective_document_falls_back_to_first_version() {
        let policy = ManagedPolicy {
            policy_name: "p".into(),
            arn: "arn".into(),
            policy_version_list: vec![PolicyVersion::default(), PolicyVersion::default()],
        };
        assert!(policy.effective_document().is_some());
        assert!(ManagedPolicy::default().effective_document().is_none());
    }

    #[test]
    fn analyze_selects_expected_entries_in_order() {
        let details = AuthorizationDetails::from_json(GAAD).unwrap();
        let report = analyze(&details, &default_matcher());

        let rows: Vec<[&str; 5]> = report.entries.iter().map(|e| e.row()).collect();
        assert_eq!(
            rows,
            vec![
                ["adam", "SecretsFull", "user", "managed", "secretsmanager:*"],
                ["zoe", "zoe-inline", "user", "inline", "secretsmanager:GetSecretValue"],
                [
                    "secret-readers",
                    "read-secrets",
                    "group",
                    "inline",
                    "secretsmanager:GetSecretValue"
                ],
                ["admin-role", "god-mode", "role", "inline", "*"],
            ]
        );
    }

    #[test]
    fn analyze_tracks_groups_and_members() {
        let details = AuthorizationDetails::from_json(GAAD).unwrap();
        let report = analyze(&details, &default_matcher());

        assert!(report.groups_with_permissions.contains("secret-readers"));
        assert!(!report.groups_with_permissions.contains("empty-perms"));
        assert_eq!(
            report.group_members.keys().collect::<Vec<_>>(),
            vec!["secret-readers", "empty-perms"]
        );
        assert_eq!(report.group_members["secret-readers"], vec!["zoe", "adam"]);

        let tables: Vec<_> = report.member_tables().collect();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].0, "secret-readers");
    }

    #[test]
    fn analyze_deduplicates_repeated_actions() {
        let details = AuthorizationDetails::from_json(
            r#"{
                "UserDetailList": [{
                    "UserName": "dup",
                    "UserPolicyList": [{
                        "PolicyName": "twice",
                        "PolicyDocument": {"Statement": [
                            {"Action": "secretsmanager:*"},
                            {"Action": ["secretsmanager:*"]}
                        ]}
                    }]
                }]
            }"#,
        )
        .unwrap();
        let report = analyze(&details, &default_matcher());
        assert_eq!(report.entries.len(), 1);
    }

    #[test]
    fn empty_document_yields_empty_report() {
        let details = AuthorizationDetails::from_json("{}").unwrap();
        let report = analyze(&details, &default_matcher());
        assert!(report.entries.is_empty());
        assert!(report.group_members.is_empty());
        assert_eq!(report.member_tables().count(), 0);
    }

    #[test]
    fn load_reads_file() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{GAAD}").unwrap();

        let details = AuthorizationDetails::load(file.path()).unwrap();
        assert_eq!(details.user_detail_list.len(), 2);
        assert_eq!(details.role_detail_list[0].role_name, "admin-role");
    }

    #[test]
    fn load_reports_missing_file() {
        let err = AuthorizationDetails::load(Path::new("/nonexistent/gaad.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read authorization details"));
    }
}
