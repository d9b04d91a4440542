//! Security module.
//!
//! Inbound webhook authentication.

pub mod signature;
