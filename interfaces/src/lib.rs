pub mod defs;
pub mod empty;
pub mod state;

pub use defs::*;
pub use empty::OfflineAnalyzer;
pub use state::MemoryContentStore;
