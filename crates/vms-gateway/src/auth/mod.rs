//! Session authentication.
//!
//! - `claims` - session claim set and roles
//! - `codec` - EdDSA token issue/verify
//! - `session` - verdict plus sliding-window refresh
//! - `cookie` - session cookie read/write

pub mod claims;
pub mod codec;
pub mod cookie;
pub mod session;

pub use claims::{Role, SessionClaims, SessionIdentity};
pub use codec::{Credential, SessionVerdict, TokenCodec};
pub use cookie::SessionCookie;
pub use session::{RefreshDecision, SessionValidation, SessionValidator};
