/// Loading modules for the resolution engine
/// Provides the per-load cache, pre-scan, call memoization, mapping and
/// incremental execution

pub mod cache;
pub mod cache_builder;
pub mod filter;
pub mod incremental;
pub mod mapper;
pub mod memo;
pub mod signature;

pub use cache::{CacheEntry, ResolutionCache};
pub use cache_builder::CacheBuilder;
pub use filter::FilterArgs;
pub use incremental::IncrementalLoader;
pub use mapper::map_relation;
pub use memo::{CallMemo, MemoOutcome};
pub use signature::{CallKind, CallSignature};
