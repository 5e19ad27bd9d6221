//! `cache-sort` is an out-of-core quicksort for files of fixed-width binary records.
//!
//! The file to be sorted can be much larger than the available memory. Records are never loaded all at once:
//! the sort algorithm addresses them by logical index and every key lookup or record swap goes through a
//! capacity bounded block cache. The cache pages 4 KiB blocks in from the file on demand, evicts the least
//! recently used block when it is full and writes modified blocks back on eviction or on the final flush.
//!
//! # Overview
//!
//! * **Record layout:**
//!   a record is 4 bytes long, a 2-byte big-endian signed key followed by 2 bytes of payload.
//! * **LRU block cache:**
//!   an index-linked recency list with a block id lookup table makes hits, promotions and evictions O(1).
//! * **Hybrid quicksort:**
//!   median-of-three three-way partitioning keeps duplicate keys out of further recursion, short ranges are
//!   finished by insertion sort.
//! * **Run statistics:**
//!   cache hits, block reads, block writes and elapsed time are reported for every run.
//!
//! # Example
//!
//! ```no_run
//! use std::fs;
//!
//! use cache_sort::ExternalQuicksortBuilder;
//!
//! fn main() {
//!     let file = fs::OpenOptions::new().read(true).write(true).open("records.bin").unwrap();
//!
//!     let sorter = ExternalQuicksortBuilder::new()
//!         .with_cache_blocks(10)
//!         .build()
//!         .unwrap();
//!
//!     let stats = sorter.sort(file).unwrap();
//!     print!("{}", stats);
//! }
//! ```

pub mod cache;
pub mod codec;
pub mod lru;
pub mod sort;
pub mod stats;

pub use cache::BlockCache;
pub use codec::{Block, Key, Record, BLOCK_SIZE, RECORD_SIZE};
pub use lru::LruList;
pub use sort::{ExternalQuicksort, ExternalQuicksortBuilder, Quicksort, SortError};
pub use stats::{RunStatistics, StatsCollector};
