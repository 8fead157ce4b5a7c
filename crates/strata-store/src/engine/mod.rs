//! KV engine implementations.
//!
//! [`RedisKv`] is the production driver; [`MemoryKv`] implements the same
//! contract in-process for tests and local development.

mod mem;
mod redis;

pub use mem::MemoryKv;
pub use redis::RedisKv;
