//! Stratum - the storage-engine core of a disk-oriented database
//!
//! The crate provides the layers a disk-oriented DBMS stacks between a query
//! engine and raw storage: pages live on disk, a fixed-size buffer pool caches
//! them in memory, and a B+ tree index organizes keys on top of the cache.
//!
//! # Architecture
//!
//! Four components compose bottom-up:
//!
//! - **Storage Layer** (`storage`): disk I/O and persisted page formats
//!   - `DiskManager`: page-granular reads/writes plus a page-id allocator
//!   - `DiskScheduler`: background worker thread for disk requests
//!   - `HeaderPage`: page 0, mapping index names to root page ids
//!
//! - **Containers** (`container`): in-memory structures
//!   - `ExtendibleHashTable`: directory-doubling hash table, used by the
//!     buffer pool as its page table
//!
//! - **Buffer Pool** (`buffer`): memory management for database pages
//!   - `BufferPoolManager`: pins pages into frames and evicts victims
//!   - `LruKReplacer`: LRU-K page replacement policy
//!   - `FrameHeader`: per-frame metadata, payload, and page latch
//!   - `ReadPageGuard`/`WritePageGuard`: RAII pin + latch handles
//!
//! - **Index** (`index`): a clustered, concurrent B+ tree
//!   - `BPlusTree`: point lookup, insert with split propagation, delete with
//!     borrow/merge, traversals under latch crabbing
//!   - `TreeIterator`: ordered cursor over the leaf chain
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stratum::buffer::BufferPoolManager;
//! use stratum::index::BPlusTree;
//! use stratum::storage::disk::DiskManager;
//! use stratum::{PageId, RecordId, SlotId};
//!
//! let disk_manager = Arc::new(DiskManager::new("test.db").unwrap());
//! let bpm = Arc::new(BufferPoolManager::new(100, 2, disk_manager));
//!
//! let tree = BPlusTree::new("orders_pk", Arc::clone(&bpm), 64, 64).unwrap();
//! tree.insert(42, RecordId::new(PageId::new(7), SlotId::new(0))).unwrap();
//! assert!(tree.get_value(42).unwrap().is_some());
//!
//! bpm.flush_all_pages().unwrap();
//! ```

pub mod buffer;
pub mod common;
pub mod container;
pub mod index;
pub mod storage;

// Re-export commonly used types at the crate root
pub use common::{FrameId, PageId, RecordId, Result, SlotId, StratumError};
