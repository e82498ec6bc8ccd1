pub mod base;
pub mod file_storage;
pub mod memory_storage;
pub mod token_store;

// Re-export the primary store items so code outside can do
// "use crate::store::{TokenStore, create_storage};"
pub use base::{create_storage, SecureStorage};
pub use file_storage::FileStorage;
pub use memory_storage::MemoryStorage;
pub use token_store::TokenStore;
