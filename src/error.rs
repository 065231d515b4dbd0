//! Initialization errors
//!
//! Cache operations never fail with an error; they report `false` / `None`.
//! These errors only come out of configuration and dispatcher setup.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    /// A dispatcher was already installed in the process-wide slot
    #[error("an object cache dispatcher is already installed for this process")]
    AlreadyInstalled,

    #[error("invalid value {value:?} for {var}")]
    InvalidConfig { var: &'static str, value: String },

    /// The configured store's feature was not compiled in
    #[error("shared store '{0}' is not available in this build")]
    UnsupportedStore(String),

    #[error("shared store unavailable: {0:#}")]
    StoreUnavailable(anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CacheError>;
