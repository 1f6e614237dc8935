use rand::{distr::Alphanumeric, Rng};

/// Length of every generated short key.
pub const KEY_LEN: usize = 8;

pub trait KeyGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Draws [`KEY_LEN`] characters uniformly from `[A-Za-z0-9]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomKeyGenerator;

impl KeyGenerator for RandomKeyGenerator {
    fn generate(&self) -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(KEY_LEN)
            .map(char::from)
            .collect()
    }
}
