//! Cache-aside reads over a pluggable key/value store.
//!
//! - [`backend`]: the [`KeyValueStore`] trait with local and Redis stores
//! - [`codec`]: MessagePack and JSON value encodings
//! - [`aside`]: the [`CacheAside`] read-through primitive
//! - [`keys`]: key layout helpers

pub mod aside;
pub mod backend;
pub mod codec;
pub mod keys;

pub use aside::{CacheAside, DEFAULT_QUERY_TIMEOUT};
pub use backend::{CacheError, DynKeyValueStore, KeyValueStore, LocalStore, RedisStore, create_store};
pub use codec::{Codec, CodecError, Json, MessagePack};
