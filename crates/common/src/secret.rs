//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports [`secrecy`] types. Anything that authenticates a caller or the
//! gateway itself goes through these: operator passwords on login, the
//! session signing seed, the relay API token, and the identity-provider key.
//!
//! `SecretString` implements `Debug` with redaction, so deriving `Debug` on a
//! struct that holds one never leaks the value through `{:?}` or tracing.
//! Values are zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct LoginRequest {
//!     email: String,
//!     password: SecretString,
//! }
//!
//! let req = LoginRequest {
//!     email: "operator@example.com".to_string(),
//!     password: SecretString::from("hunter2"),
//! };
//!
//! assert!(!format!("{req:?}").contains("hunter2"));
//! assert_eq!(req.password.expose_secret(), "hunter2");
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
