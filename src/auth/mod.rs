//! Token-based user identity and the trusted-network gate.
//!
//! Every caller is identified by the `sub` claim of an HS256 token. Handlers
//! on lenient routes mint a fresh user when the token is missing or invalid;
//! strict routes reject such requests but still hand back a fresh token.

pub mod client_ip;
pub mod middleware;
pub mod subnet;
pub mod token;

pub use middleware::{lenient_auth, strict_auth, trusted_subnet_guard, UserId, TOKEN_COOKIE};
pub use subnet::TrustedSubnet;
pub use token::TokenIssuer;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid token: {0}")]
    InvalidToken(String),
    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
    #[error("invalid trusted subnet '{cidr}': {source}")]
    InvalidSubnet {
        cidr: String,
        #[source]
        source: ipnet::AddrParseError,
    },
}
