use std::sync::Arc;

use crate::buffer::{BufferPoolManager, ReadPageGuard};
use crate::common::{RecordId, Result};

use super::btree_page::BTreePageRef;

/// Ordered cursor over all (key, value) pairs of a B+ tree.
///
/// Holds a pin and read latch on the current leaf. Running off a leaf's end
/// releases it first and then pins the successor through `next_page_id`, so a
/// cursor never latches two leaves at once. A cursor with no page is "end".
pub struct TreeIterator {
    bpm: Arc<BufferPoolManager>,
    guard: Option<ReadPageGuard>,
    index: usize,
}

impl TreeIterator {
    pub(crate) fn new(bpm: Arc<BufferPoolManager>, guard: Option<ReadPageGuard>, index: usize) -> Self {
        Self { bpm, guard, index }
    }

    pub fn is_end(&self) -> bool {
        self.guard.is_none()
    }

    /// Returns the pair under the cursor and advances, or None at the end.
    pub fn next(&mut self) -> Result<Option<(u32, RecordId)>> {
        loop {
            let Some(guard) = &self.guard else {
                return Ok(None);
            };

            let next_page = {
                let page = BTreePageRef::new(guard.data());
                if self.index < page.size() {
                    let pair = page.key_value_at(self.index);
                    self.index += 1;
                    return Ok(Some(pair));
                }
                page.next_page_id()
            };

            // Unpin the exhausted leaf before pinning its successor.
            self.guard = None;
            self.index = 0;
            match next_page {
                Some(page_id) => self.guard = Some(self.bpm.checked_read_page(page_id)?),
                None => return Ok(None),
            }
        }
    }
}

impl PartialEq for TreeIterator {
    /// Two cursors are equal when they sit on the same leaf page at the same
    /// slot; all end cursors compare equal.
    fn eq(&self, other: &Self) -> bool {
        let self_page = self.guard.as_ref().map(|g| g.page_id());
        let other_page = other.guard.as_ref().map(|g| g.page_id());
        self_page == other_page && (self_page.is_none() || self.index == other.index)
    }
}

impl Iterator for TreeIterator {
    type Item = Result<(u32, RecordId)>;

    fn next(&mut self) -> Option<Self::Item> {
        match TreeIterator::next(self) {
            Ok(Some(pair)) => Some(Ok(pair)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        }
    }
}
