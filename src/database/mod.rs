pub mod memory;
pub mod schema;
pub mod store;

pub use memory::MemoryStore;
pub use store::{IndexBatch, IndexStore, Mutation, RedisStore};
