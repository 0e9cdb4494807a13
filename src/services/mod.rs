//! Services - parsing and caching
//!
//! - `parser` - Turns upstream documents into dated visit records
//! - `refresher` - Fetch + parse in one step
//! - `store` - Key/value storage behind the cache
//! - `cache` - Tiered read-through cache

pub mod cache;
pub mod parser;
pub mod refresher;
pub mod store;

// Re-export commonly used types
pub use cache::{CacheConfig, ScheduleCache};
pub use parser::ScheduleParser;
pub use refresher::{Refresher, ScheduleRefresher};
pub use store::{CacheStore, MemoryStore};
