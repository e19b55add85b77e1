//! Test utilities for cloudaudit
//!
//! - [`aws`]: region detection for tests that talk to real AWS
//! - [`fixtures`]: canned authorization-details documents

pub mod aws;
pub mod fixtures;
