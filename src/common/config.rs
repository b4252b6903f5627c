/// Size of a page in bytes (4 KB)
pub const PAGE_SIZE: usize = 4096;

/// Invalid page ID constant
pub const INVALID_PAGE_ID: PageId = PageId(u32::MAX);

/// Invalid frame ID constant
pub const INVALID_FRAME_ID: FrameId = FrameId(u32::MAX);

/// Page ID of the header page holding (index name, root page id) records
pub const HEADER_PAGE_ID: PageId = PageId(0);

/// Default K value for LRU-K replacement policy
pub const DEFAULT_LRUK_K: usize = 2;

/// Default buffer pool size (number of frames)
pub const DEFAULT_BUFFER_POOL_SIZE: usize = 10;

/// Default bucket size for the extendible hash table
pub const DEFAULT_BUCKET_SIZE: usize = 4;

/// Default maximum number of key/value pairs in a B+ tree leaf page
pub const DEFAULT_LEAF_MAX_SIZE: usize = 64;

/// Default maximum number of children in a B+ tree internal page
pub const DEFAULT_INTERNAL_MAX_SIZE: usize = 64;

use super::types::{FrameId, PageId};
