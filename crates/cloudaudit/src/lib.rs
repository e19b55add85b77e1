//! cloudaudit - AWS audit reports and remediation
//!
//! This crate provides the `cloudaudit` binary: five sequential workflows
//! that enumerate AWS resources, print a table, and optionally fix what they
//! find or export the result to CSV.

pub mod aws;
pub mod commands;
pub mod config;
pub mod prompt;
pub mod report;
