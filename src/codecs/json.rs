//! JSON Codec using `serde_json`
//!
//! Integers encode as plain decimal text (`42`), which is the representation
//! Redis `INCRBY` and memcached `incr` operate on. Values written through the
//! cache therefore stay adjustable by the stores' atomic primitives.

use crate::traits::CacheCodec;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// JSON Codec using `serde_json`
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl CacheCodec for JsonCodec {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).context("Failed to encode cache value as JSON")
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).context("Failed to decode cache value from JSON")
    }

    fn name(&self) -> &'static str {
        "serde_json"
    }
}
