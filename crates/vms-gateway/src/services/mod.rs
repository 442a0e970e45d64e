//! Service layer for the gateway.
//!
//! # Components
//!
//! - `identity` - resolves which remote system a request addresses
//! - `relay_client` - HTTP client for the cloud relay
//! - `idp_client` - HTTP client for the identity provider

pub mod idp_client;
pub mod identity;
pub mod relay_client;

pub use idp_client::{IdpClient, IdpUser, UserUpdate};
pub use identity::SystemIdentity;
pub use relay_client::{
    RelayClient, RelayEndpoint, RelayError, RelayQuery, RelayRequestSpec, RelayResponse,
    TimeWindow,
};
