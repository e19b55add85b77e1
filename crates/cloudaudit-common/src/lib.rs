//! cloudaudit-common - Shared types and utilities
//!
//! This crate holds everything the audit workflows share that does not need
//! the AWS SDK: report records, the IAM permission matcher, and the CSV
//! layouts used by the export prompts.
//!
//! ## Modules
//!
//! - [`defaults`]: Default values and fixed strings shared across commands
//! - [`export`]: CSV writers for each report
//! - [`permissions`]: Authorization-details model and permission matching
//! - [`sso`]: Identity Center report records

pub mod defaults;
pub mod export;
pub mod permissions;
pub mod sso;

pub use permissions::{
    AuthorizationDetails, PermissionEntry, PermissionMatcher, PermissionReport, PolicyKind,
    PrincipalKind,
};
pub use sso::{AccountSummary, Assignment, PermissionSetPolicies, UserGroupMap};

/// Returns true when an operator answer means "yes".
///
/// Only the literal word counts; `y`, `yep` and friends do not.
#[inline]
pub fn is_yes(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yes_is_trimmed_and_case_insensitive() {
        assert!(is_yes("yes"));
        assert!(is_yes("  YES\n"));
        assert!(is_yes("Yes"));
    }

    #[test]
    fn anything_else_is_no() {
        assert!(!is_yes("y"));
        assert!(!is_yes("no"));
        assert!(!is_yes(""));
        assert!(!is_yes("yes please"));
    }
}
