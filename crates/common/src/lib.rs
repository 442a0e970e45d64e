//! Common utilities shared across the VMS gateway crates.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT utilities (size limits, kid extraction, iat validation)
pub mod jwt;
