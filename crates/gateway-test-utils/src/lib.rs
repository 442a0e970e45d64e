//! # Gateway Test Utilities
//!
//! Shared test utilities for the VMS gateway.
//!
//! This crate provides:
//! - Deterministic signing keys (`crypto_fixtures`)
//! - Session token builders with arbitrary lifetimes (`token_builders`)
//! - Server test harness (`TestGatewayServer` for E2E tests), backed by mock
//!   relay and identity provider servers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gateway_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<(), anyhow::Error> {
//!     let server = TestGatewayServer::spawn().await?;
//!     let token = TestSessionBuilder::new().build();
//!
//!     let response = reqwest::Client::new()
//!         .get(format!("{}/api/auth/session", server.url()))
//!         .bearer_auth(token)
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod crypto_fixtures;
pub mod server_harness;
pub mod token_builders;

// Re-export commonly used items
pub use crypto_fixtures::*;
pub use server_harness::*;
pub use token_builders::*;
