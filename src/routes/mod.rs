//! Router Module Index
//!
//! Routes are split by the gate they sit behind, so each endpoint's access tier is
//! fixed by the module it is registered in.

/// No session required.
pub mod public;

/// Behind `require_auth`.
pub mod authenticated;

/// Behind `require_auth` and then `require_admin`.
pub mod admin;
