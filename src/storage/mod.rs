pub mod memory;
pub mod session;
mod statement;

pub use memory::{MemoryStore, StoreStats};
pub use session::MemorySession;
