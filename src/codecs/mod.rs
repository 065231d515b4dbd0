//! Cache Codec Implementations
//!
//! Built-in implementations of the [`CacheCodec`](crate::traits::CacheCodec) trait,
//! used by `TieredCache` to move values in and out of a shared store.

mod json;
pub use json::JsonCodec;
