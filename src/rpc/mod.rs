//! gRPC front of the shortener.
//!
//! The service stubs are generated by `build.rs` against the hand-written
//! messages in [`proto`].

pub mod auth;
pub mod error;
pub mod proto;
pub mod server;

include!(concat!(env!("OUT_DIR"), "/shorty.v1.Shortener.rs"));

pub use auth::{Caller, RpcAuth, TOKEN_METADATA};
pub use server::ShortenerRpc;
pub use shortener_server::ShortenerServer;
