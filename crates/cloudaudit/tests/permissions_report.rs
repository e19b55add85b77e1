//! End-to-end permissions report over a canned authorization-details file

use cloudaudit::commands::permissions;
use cloudaudit::config::{DetailsSource, PermissionsConfig};
use cloudaudit::prompt::ScriptedPrompter;
use cloudaudit_common::defaults::default_exact_permissions;
use cloudaudit_common::{AuthorizationDetails, PolicyKind, PrincipalKind};
use cloudaudit_test_utils::fixtures::sample_authorization_details;
use pretty_assertions::assert_eq;

fn write_fixture(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("gaad.json");
    std::fs::write(&path, sample_authorization_details().to_string()).unwrap();
    path
}

fn config(source: DetailsSource) -> PermissionsConfig {
    PermissionsConfig {
        source,
        exact: default_exact_permissions(),
        prefixes: vec![],
        csv: None,
    }
}

#[test]
fn default_search_finds_secrets_and_wildcards() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path());
    let details = AuthorizationDetails::load(&path).unwrap();

    let mut prompt = ScriptedPrompter::new(["no"]);
    let report = permissions::run(&details, &mut prompt, &config(DetailsSource::File(path))).unwrap();

    let rows: Vec<_> = report
        .entries
        .iter()
        .map(|e| (e.principal_kind, e.principal.as_str(), e.policy_kind, e.action.as_str()))
        .collect();
    assert_eq!(
        rows,
        vec![
            (PrincipalKind::User, "alice", PolicyKind::Inline, "secretsmanager:GetSecretValue"),
            (PrincipalKind::Group, "platform", PolicyKind::Managed, "secretsmanager:*"),
            (PrincipalKind::Role, "deployer", PolicyKind::Inline, "*"),
        ]
    );

    let tables: Vec<_> = report.member_tables().collect();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].0, "platform");
    assert_eq!(tables[0].1, ["alice".to_string(), "bob".to_string()]);
}

#[test]
fn csv_export_contains_main_and_group_tables() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_fixture(dir.path());
    let details = AuthorizationDetails::load(&path).unwrap();
    let out = dir.path().join("permissions.csv");

    let mut cfg = config(DetailsSource::File(path));
    cfg.csv = Some(out.clone());
    let mut prompt = ScriptedPrompter::default();
    permissions::run(&details, &mut prompt, &cfg).unwrap();

    assert!(prompt.asked().is_empty());
    let written = std::fs::read_to_string(&out).unwrap();
    let lines: Vec<_> = written.lines().collect();
    assert_eq!(lines[0], "Main Permissions Table");
    assert_eq!(lines[1], "Name,Policy Name,Resource Type,Policy Type,Permission");
    assert_eq!(
        lines[2],
        "alice,alice-secrets,user,inline,secretsmanager:GetSecretValue"
    );
    assert!(written.contains("\n\nUsers in Group 'platform' Table\nUser\nalice\nbob"));
    assert!(!written.contains("\"\""));
    assert!(!written.contains("auditors"));
}

#[test]
fn prefix_search_reaches_other_services() {
    let details =
        AuthorizationDetails::from_json(&sample_authorization_details().to_string()).unwrap();

    let mut cfg = config(DetailsSource::default());
    cfg.exact.clear();
    cfg.prefixes = vec!["s3:*".to_string(), "cloudtrail:".to_string()];

    let mut prompt = ScriptedPrompter::new(["no"]);
    let report = permissions::run(&details, &mut prompt, &cfg).unwrap();

    let principals: Vec<_> = report.entries.iter().map(|e| e.principal.as_str()).collect();
    assert_eq!(principals, vec!["bob", "auditors", "deployer"]);

    // platform has members but did not match
    assert_eq!(report.member_tables().count(), 1);
    assert_eq!(report.member_tables().next().unwrap().0, "auditors");
}

#[test]
fn missing_file_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let err = AuthorizationDetails::load(&dir.path().join("absent.json")).unwrap_err();
    assert!(err.to_string().contains("absent.json"));
}
