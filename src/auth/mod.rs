//! Identity and session management.
//!
//! Two credential paths (password and OAuth) converge on a single user
//! identity through the adapter; sessions are carried in a signed cookie
//! and gated by the authorization middleware.

pub mod adapter;
pub mod cookies;
pub mod jwt;
pub mod middleware;
pub mod oauth;
pub mod password;
pub mod policy;
pub mod recovery;

pub use adapter::{IdentityAdapter, SqlIdentityAdapter};
pub use middleware::SessionUser;
