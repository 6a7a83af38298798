// Client-side cache: storage backends, the durable entry store, and the
// named domains layered on top of it.

pub mod backend;
pub mod domains;
pub mod store;

pub use backend::{FileBackend, MemoryBackend, RedisBackend, StorageBackend};
pub use domains::{CacheDomain, CacheDomains, InvalidationGroup, TtlPolicy};
pub use store::EntryStore;
