//! Cryptographic utilities for the wire protocol
//!
//! This module provides:
//! - SHA-256 and double SHA-256 hashing
//! - The 4-byte frame checksum

pub mod hash;

pub use hash::{checksum, double_sha256, sha256, CHECKSUM_SIZE};
