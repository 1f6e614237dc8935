//! URL shortening operations shared by the HTTP and RPC fronts.

pub mod error;
pub mod keygen;
pub mod service;

pub use error::ServiceError;
pub use keygen::{KeyGenerator, RandomKeyGenerator, KEY_LEN};
pub use service::{Shortened, ShortenerService};
