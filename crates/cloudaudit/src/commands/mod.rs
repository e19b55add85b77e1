//! The audit workflows
//!
//! Each workflow is generic over the service traits it needs, so the binary
//! wires in the real clients and the tests wire in mocks.

pub mod exposure;
pub mod permissions;
pub mod sns;
pub mod sso;
pub mod stacks;
