//! Canned IAM authorization-details documents
//!
//! The layout follows `aws iam get-account-authorization-details` output with
//! policy documents already decoded into JSON objects.

use serde_json::{Value, json};

/// ARN of the customer managed policy used by [`sample_authorization_details`]
pub const SECRETS_POLICY_ARN: &str = "arn:aws:iam::123456789012:policy/SecretsAccess";

/// Build an inline policy entry allowing `actions`
pub fn inline_policy(name: &str, actions: &[&str]) -> Value {
    json!({
        "PolicyName": name,
        "PolicyDocument": {
            "Version": "2012-10-17",
            "Statement": [{"Effect": "Allow", "Action": actions, "Resource": "*"}]
        }
    })
}

/// A small account:
///
/// - user `alice` reads secrets through an inline policy and is in `platform`
/// - user `bob` has only S3 access and is in `platform` and `auditors`
/// - group `platform` has the managed `SecretsAccess` policy
/// - group `auditors` has nothing relevant
/// - role `deployer` has `*`
pub fn sample_authorization_details() -> Value {
    json!({
        "UserDetailList": [
            {
                "UserName": "alice",
                "GroupList": ["platform"],
                "UserPolicyList": [inline_policy("alice-secrets", &["secretsmanager:GetSecretValue"])],
                "AttachedManagedPolicies": []
            },
            {
                "UserName": "bob",
                "GroupList": ["platform", "auditors"],
                "UserPolicyList": [inline_policy("bob-s3", &["s3:GetObject"])],
                "AttachedManagedPolicies": []
            }
        ],
        "GroupDetailList": [
            {
                "GroupName": "platform",
                "GroupPolicyList": [],
                "AttachedManagedPolicies": [
                    {"PolicyName": "SecretsAccess", "PolicyArn": SECRETS_POLICY_ARN}
                ]
            },
            {
                "GroupName": "auditors",
                "GroupPolicyList": [inline_policy("audit", &["cloudtrail:LookupEvents"])],
                "AttachedManagedPolicies": []
            }
        ],
        "RoleDetailList": [
            {
                "RoleName": "deployer",
                "RolePolicyList": [inline_policy("deploy-all", &["*"])],
                "AttachedManagedPolicies": []
            }
        ],
        "Policies": [
            {
                "PolicyName": "SecretsAccess",
                "Arn": SECRETS_POLICY_ARN,
                "PolicyVersionList": [
                    {
                        "Document": {"Statement": {"Effect": "Allow", "Action": "secretsmanager:*"}},
                        "IsDefaultVersion": true
                    }
                ]
            }
        ]
    })
}
