//! Session and authorization layer.
//!
//! - [`token`]: signs and verifies session credentials.
//! - [`cookie`]: carries the credential in the `token` cookie.
//! - [`gate`]: the authentication and admin authorization middleware.

pub mod cookie;
pub mod error;
pub mod gate;
pub mod token;

pub use error::{AuthError, TokenError};
pub use gate::{AdminUser, authenticate, authorize, require_admin, require_auth};
pub use token::{DEFAULT_TOKEN_TTL, Principal, TokenCodec};
