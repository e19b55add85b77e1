//! AWS error classification and handling
//!
//! Provides typed errors for AWS SDK operations using the `.code()` method
//! instead of string matching on Debug format.

use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata};
use thiserror::Error;

/// AWS error categories for reporting and skip decisions
#[derive(Debug, Error)]
pub enum AwsError {
    /// Resource was not found
    #[error("Resource not found: {message}")]
    NotFound { message: String },

    /// The supplied ARN is malformed or names the wrong service
    #[error("Invalid ARN: {message}")]
    InvalidArn { message: String },

    /// Caller lacks permission for the operation
    #[error("Access denied: {message}")]
    AccessDenied { message: String },

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    Throttled,

    /// Generic AWS SDK error with code and message
    #[error("AWS error: {message}")]
    Sdk {
        code: Option<String>,
        message: String,
    },
}

impl AwsError {
    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AwsError::NotFound { .. })
    }

    pub fn is_invalid_arn(&self) -> bool {
        matches!(self, AwsError::InvalidArn { .. })
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, AwsError::AccessDenied { .. })
    }

    /// Get a user-friendly suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            AwsError::AccessDenied { .. } => suggestion_for_code("AccessDenied"),
            AwsError::Throttled => suggestion_for_code("Throttling"),
            AwsError::Sdk { code: Some(c), .. } => suggestion_for_code(c),
            _ => None,
        }
    }
}

/// Known AWS error codes for "not found" conditions
const NOT_FOUND_CODES: &[&str] = &[
    "NotFoundException",
    "NotFound",
    "ResourceNotFoundException",
    "NoSuchEntity",
    "InvalidGroup.NotFound",
    "InvalidGroupId.NotFound",
    "ClusterNotFoundException",
    "CacheClusterNotFound",
    "DBInstanceNotFound",
    "LoadBalancerNotFound",
    "AccountNotFoundException",
];

/// Known AWS error codes for malformed ARNs
const INVALID_ARN_CODES: &[&str] = &["InvalidArnException", "InvalidArn"];

/// Known AWS error codes for missing permissions
const ACCESS_DENIED_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "UnauthorizedOperation",
    "AuthorizationError",
];

/// Known AWS error codes for throttling/rate limiting
const THROTTLING_CODES: &[&str] = &["Throttling", "ThrottlingException", "RequestLimitExceeded"];

/// Classify an AWS SDK error using the error code.
pub fn classify_aws_error(code: Option<&str>, message: Option<&str>) -> AwsError {
    let message = message.unwrap_or("Unknown error").to_string();

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => AwsError::NotFound { message },
        Some(c) if INVALID_ARN_CODES.contains(&c) => AwsError::InvalidArn { message },
        Some(c) if ACCESS_DENIED_CODES.contains(&c) => AwsError::AccessDenied { message },
        Some(c) if THROTTLING_CODES.contains(&c) => AwsError::Throttled,
        // CloudFormation reports missing stacks as a validation failure
        Some("ValidationError") if message.contains("does not exist") => {
            AwsError::NotFound { message }
        }
        _ => AwsError::Sdk {
            code: code.map(|s| s.to_string()),
            message,
        },
    }
}

/// Classify any SDK error (operation error or `SdkError`) by its metadata.
pub fn classify_sdk_error<E: ProvideErrorMetadata>(error: &E) -> AwsError {
    classify_aws_error(error.code(), error.message())
}

/// One-line description of an SDK error for console output.
///
/// Service errors render as `Code: message`; transport and other failures
/// fall back to the full error chain.
pub fn describe_sdk_error<E>(error: &E) -> String
where
    E: ProvideErrorMetadata + std::error::Error,
{
    match (error.code(), error.message()) {
        (Some(code), Some(message)) => format!("{code}: {message}"),
        (Some(code), None) => code.to_string(),
        _ => DisplayErrorContext(error).to_string(),
    }
}

/// Wrap an SDK error so that its top-level message is the one-line summary.
///
/// The original error stays in the chain for `{:?}` and error classification.
pub fn sdk_context<E>(error: E) -> anyhow::Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let summary = describe_sdk_error(&error);
    anyhow::Error::new(error).context(summary)
}

/// Classify an error from an anyhow::Error by extracting the AWS error code
/// from its debug representation.
pub fn classify_anyhow_error(error: &anyhow::Error) -> AwsError {
    let debug_str = format!("{:?}", error);
    if let Some(code) = extract_error_code(&debug_str) {
        return classify_aws_error(Some(&code), Some(&error.to_string()));
    }

    AwsError::Sdk {
        code: None,
        message: error.to_string(),
    }
}

/// All known AWS error codes for extraction from debug strings (flat list)
const ALL_KNOWN_CODES: &[&str] = &[
    // Credentials
    "ExpiredToken",
    "ExpiredTokenException",
    "InvalidClientTokenId",
    "UnrecognizedClientException",
    // Access
    "AccessDeniedException",
    "AccessDenied",
    "UnauthorizedOperation",
    // Throttling
    "ThrottlingException",
    "Throttling",
    "RequestLimitExceeded",
];

/// Extract an AWS error code from a debug string representation
fn extract_error_code(debug_str: &str) -> Option<String> {
    for code in ALL_KNOWN_CODES {
        if debug_str.contains(code) {
            return Some((*code).to_string());
        }
    }

    // Try to extract any code from `code: Some("...")` pattern
    if let Some(start) = debug_str.find("code: Some(\"") {
        let rest = &debug_str[start + 12..];
        if let Some(end) = rest.find('"') {
            return Some(rest[..end].to_string());
        }
    }

    None
}

/// Error code to user-friendly suggestion mapping
const SUGGESTIONS: &[(&str, &str)] = &[
    (
        "ExpiredToken",
        "Your session has expired. Refresh credentials (e.g. `aws sso login --profile <name>`).",
    ),
    (
        "ExpiredTokenException",
        "Your session has expired. Refresh credentials (e.g. `aws sso login --profile <name>`).",
    ),
    (
        "InvalidClientTokenId",
        "The access key is not valid. Check the profile passed with --profile.",
    ),
    (
        "UnrecognizedClientException",
        "The access key is not valid. Check the profile passed with --profile.",
    ),
    (
        "AccessDenied",
        "The profile lacks read access for this report. Check its IAM permissions.",
    ),
    (
        "AccessDeniedException",
        "The profile lacks read access for this report. Check its IAM permissions.",
    ),
    (
        "UnauthorizedOperation",
        "The profile lacks read access for this report. Check its IAM permissions.",
    ),
    ("Throttling", "AWS API rate limit hit. Try again in a moment."),
    ("ThrottlingException", "AWS API rate limit hit. Try again in a moment."),
    ("RequestLimitExceeded", "AWS API rate limit hit. Try again in a moment."),
];

/// Get a user-friendly suggestion for a known error code.
fn suggestion_for_code(code: &str) -> Option<String> {
    SUGGESTIONS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, s)| (*s).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_codes() {
        for code in NOT_FOUND_CODES {
            let err = classify_aws_error(Some(code), Some("some message"));
            assert!(err.is_not_found(), "Expected NotFound for code: {code}");
        }
    }

    #[test]
    fn invalid_arn_codes() {
        for code in INVALID_ARN_CODES {
            let err = classify_aws_error(Some(code), Some("bad arn"));
            assert!(err.is_invalid_arn(), "Expected InvalidArn for code: {code}");
        }
    }

    #[test]
    fn access_denied_codes() {
        for code in ACCESS_DENIED_CODES {
            let err = classify_aws_error(Some(code), Some("nope"));
            assert!(err.is_access_denied(), "Expected AccessDenied for code: {code}");
            assert!(err.suggestion().is_some());
        }
    }

    #[test]
    fn throttling_codes() {
        for code in THROTTLING_CODES {
            let err = classify_aws_error(Some(code), Some("msg"));
            assert!(matches!(err, AwsError::Throttled));
        }
    }

    #[test]
    fn missing_stack_is_not_found() {
        let err = classify_aws_error(
            Some("ValidationError"),
            Some("Stack with id web does not exist"),
        );
        assert!(err.is_not_found());

        let err = classify_aws_error(Some("ValidationError"), Some("bad template"));
        assert!(matches!(err, AwsError::Sdk { .. }));
    }

    #[test]
    fn unknown_and_missing_codes() {
        let err = classify_aws_error(Some("SomeNewError"), Some("details"));
        assert!(matches!(err, AwsError::Sdk { .. }));

        let err2 = classify_aws_error(None, Some("something failed"));
        assert!(matches!(err2, AwsError::Sdk { code: None, .. }));
    }

    #[test]
    fn extract_code_from_code_field() {
        let debug_str = r#"SdkError { code: Some("SomeRandomCode"), message: "fail" }"#;
        assert_eq!(
            extract_error_code(debug_str).as_deref(),
            Some("SomeRandomCode")
        );
    }

    #[test]
    fn extract_none_from_unrelated_string() {
        assert!(extract_error_code("connection refused").is_none());
    }

    #[test]
    fn anyhow_errors_with_expired_tokens_get_suggestions() {
        let err = anyhow::anyhow!("service error: ExpiredToken: The security token included in the request is expired");
        let classified = classify_anyhow_error(&err);
        assert!(classified.suggestion().unwrap().contains("expired"));
    }

    #[test]
    fn suggestions_for_known_codes() {
        for (code, _) in SUGGESTIONS {
            assert!(
                suggestion_for_code(code).is_some(),
                "No suggestion for code: {code}"
            );
        }
        assert!(suggestion_for_code("SomeUnknownCode").is_none());
    }
}
