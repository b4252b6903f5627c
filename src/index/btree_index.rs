use std::path::Path;
use std::sync::Arc;

use log::debug;
use parking_lot::{RwLock, RwLockWriteGuard};

use crate::buffer::{BufferPoolManager, ReadPageGuard, WritePageGuard};
use crate::common::{
    PageId, RecordId, Result, SlotId, StratumError, HEADER_PAGE_ID, INVALID_PAGE_ID,
};
use crate::storage::page::{HeaderPage, HeaderPageRef};

use super::btree_iterator::TreeIterator;
use super::btree_page::{BTreePage, BTreePageRef, INTERNAL_SLOT_CAPACITY, LEAF_SLOT_CAPACITY};

#[derive(Debug, Clone, Copy)]
enum WriteOp {
    Insert,
    Delete,
}

#[derive(Debug, Clone, Copy)]
enum Target {
    Key(u32),
    Leftmost,
}

/// Latches held by one mutating operation: the exclusive root-pointer guard
/// and the write-latched ancestors retained by crabbing, plus page ids whose
/// deletion is deferred until every latch is released.
struct LatchContext<'a> {
    root_guard: Option<RwLockWriteGuard<'a, PageId>>,
    ancestors: Vec<WritePageGuard>,
    deleted: Vec<PageId>,
}

impl<'a> LatchContext<'a> {
    fn new(root_guard: RwLockWriteGuard<'a, PageId>) -> Self {
        Self {
            root_guard: Some(root_guard),
            ancestors: Vec::new(),
            deleted: Vec::new(),
        }
    }

    fn root_page_id(&self) -> PageId {
        **self.root_guard.as_ref().expect("root latch released early")
    }

    fn set_root_page_id(&mut self, page_id: PageId) {
        **self.root_guard.as_mut().expect("root latch released early") = page_id;
    }

    /// Drops every retained ancestor latch and the root-pointer guard. Called
    /// once the newly latched child is safe for the current operation.
    fn release_ancestors(&mut self) {
        self.ancestors.clear();
        self.root_guard = None;
    }
}

/// A clustered B+ tree index whose nodes are buffer-pool pages.
///
/// Keys are unique. Descents use latch coupling: a child's latch is taken
/// before any ancestor latch is released, and ancestors are released as soon
/// as the child cannot split (insert) or underflow (delete). The root pointer
/// lives behind its own reader/writer latch, taken shared for lookups and
/// exclusive for mutations, and is persisted in the header page whenever it
/// changes.
pub struct BPlusTree {
    index_name: String,
    root_page_id: RwLock<PageId>,
    bpm: Arc<BufferPoolManager>,
    leaf_max_size: usize,
    internal_max_size: usize,
}

impl BPlusTree {
    /// Opens the index named `name`, creating its header-page record (and the
    /// header page itself on a fresh database file) when missing.
    pub fn new(
        name: &str,
        bpm: Arc<BufferPoolManager>,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<Self> {
        assert!(
            (2..=LEAF_SLOT_CAPACITY).contains(&leaf_max_size),
            "leaf_max_size out of range"
        );
        assert!(
            (3..=INTERNAL_SLOT_CAPACITY).contains(&internal_max_size),
            "internal_max_size out of range"
        );

        if bpm.disk_manager().num_pages() == 0 {
            let mut guard = bpm.new_page()?;
            debug_assert_eq!(guard.page_id(), HEADER_PAGE_ID);
            HeaderPage::new(guard.data_mut()).init();
        }

        let existing = {
            let guard = bpm.checked_read_page(HEADER_PAGE_ID)?;
            HeaderPageRef::new(guard.data()).root_id(name)
        };
        let root_page_id = match existing {
            Some(root) => root,
            None => {
                let mut guard = bpm.checked_write_page(HEADER_PAGE_ID)?;
                if !HeaderPage::new(guard.data_mut()).insert_record(name, INVALID_PAGE_ID) {
                    return Err(StratumError::HeaderPageFull);
                }
                INVALID_PAGE_ID
            }
        };

        Ok(Self {
            index_name: name.to_string(),
            root_page_id: RwLock::new(root_page_id),
            bpm,
            leaf_max_size,
            internal_max_size,
        })
    }

    pub fn is_empty(&self) -> bool {
        *self.root_page_id.read() == INVALID_PAGE_ID
    }

    pub fn get_root_page_id(&self) -> PageId {
        *self.root_page_id.read()
    }

    /// Point lookup. Returns None when the key is absent or the tree is empty.
    pub fn get_value(&self, key: u32) -> Result<Option<RecordId>> {
        match self.find_leaf_read(Target::Key(key))? {
            Some(guard) => Ok(BTreePageRef::new(guard.data()).lookup_key(key)),
            None => Ok(None),
        }
    }

    /// Inserts a key/value pair. Returns false when the key already exists.
    pub fn insert(&self, key: u32, value: RecordId) -> Result<bool> {
        let mut ctx = LatchContext::new(self.root_page_id.write());

        if ctx.root_page_id() == INVALID_PAGE_ID {
            self.start_new_tree(&mut ctx)?;
        }

        let mut leaf_guard = self.find_leaf_write(key, WriteOp::Insert, &mut ctx)?;

        if BTreePageRef::new(leaf_guard.data()).lookup_key(key).is_some() {
            return Ok(false);
        }
        BTreePage::new(leaf_guard.data_mut()).leaf_insert(key, value);

        if BTreePageRef::new(leaf_guard.data()).size() >= self.leaf_max_size {
            let (sep_key, new_guard) = self.split_leaf(&mut leaf_guard)?;
            self.insert_into_parent(&mut ctx, leaf_guard, new_guard, sep_key)?;
        }

        Ok(true)
    }

    /// Removes a key. Absent keys are ignored.
    pub fn remove(&self, key: u32) -> Result<()> {
        let mut ctx = LatchContext::new(self.root_page_id.write());

        if ctx.root_page_id() == INVALID_PAGE_ID {
            return Ok(());
        }

        let mut leaf_guard = self.find_leaf_write(key, WriteOp::Delete, &mut ctx)?;

        if BTreePageRef::new(leaf_guard.data()).lookup_key(key).is_none() {
            return Ok(());
        }
        BTreePage::new(leaf_guard.data_mut()).leaf_delete(key);

        let underflow = {
            let page = BTreePageRef::new(leaf_guard.data());
            page.size() < page.min_size()
        };
        if underflow {
            self.rebalance(&mut ctx, leaf_guard)?;
        } else {
            drop(leaf_guard);
        }

        // Deferred page frees happen only after every latch is released.
        let deleted = std::mem::take(&mut ctx.deleted);
        drop(ctx);
        for page_id in deleted {
            self.bpm.delete_page(page_id)?;
        }
        Ok(())
    }

    /// Cursor positioned at the smallest key.
    pub fn begin(&self) -> Result<TreeIterator> {
        match self.find_leaf_read(Target::Leftmost)? {
            Some(guard) => Ok(TreeIterator::new(Arc::clone(&self.bpm), Some(guard), 0)),
            None => Ok(self.end()),
        }
    }

    /// Cursor positioned at the smallest key >= `key`.
    pub fn begin_at(&self, key: u32) -> Result<TreeIterator> {
        match self.find_leaf_read(Target::Key(key))? {
            Some(guard) => {
                let index = BTreePageRef::new(guard.data()).position_of_nearest_key(key);
                Ok(TreeIterator::new(Arc::clone(&self.bpm), Some(guard), index))
            }
            None => Ok(self.end()),
        }
    }

    /// The past-the-end cursor.
    pub fn end(&self) -> TreeIterator {
        TreeIterator::new(Arc::clone(&self.bpm), None, 0)
    }

    /// Reads whitespace-separated integer keys from `path` and inserts each
    /// one, deriving the record id from the key. Duplicates are skipped.
    pub fn insert_from_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        for key in read_keys(path)? {
            self.insert(key, RecordId::new(PageId::new(key), SlotId::new(0)))?;
        }
        Ok(())
    }

    /// Reads whitespace-separated integer keys from `path` and removes each.
    pub fn remove_from_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        for key in read_keys(path)? {
            self.remove(key)?;
        }
        Ok(())
    }

    /// Renders the tree level by level, for debugging.
    pub fn dump_structure(&self) -> Result<String> {
        use std::fmt::Write as _;

        let root_id = *self.root_page_id.read();
        if root_id == INVALID_PAGE_ID {
            return Ok("<empty>".to_string());
        }

        let mut out = String::new();
        let mut level = vec![root_id];
        while !level.is_empty() {
            let mut next_level = Vec::new();
            for &page_id in &level {
                let guard = self.bpm.checked_read_page(page_id)?;
                let page = BTreePageRef::new(guard.data());
                if page.is_leaf() {
                    let keys: Vec<String> = (0..page.size())
                        .map(|i| page.key_value_at(i).0.to_string())
                        .collect();
                    let _ = write!(out, "[leaf {}: {}] ", page_id.as_u32(), keys.join(","));
                } else {
                    let keys: Vec<String> = (1..page.size())
                        .map(|i| page.key_at(i).to_string())
                        .collect();
                    let _ = write!(out, "[int {}: {}] ", page_id.as_u32(), keys.join(","));
                    for i in 0..page.size() {
                        next_level.push(page.child_at(i));
                    }
                }
            }
            out.push('\n');
            level = next_level;
        }
        Ok(out)
    }

    // Descent -------------------------------------------------------------

    /// Read descent with latch coupling: each child is latched before its
    /// parent's latch (or the root-pointer guard) is released.
    fn find_leaf_read(&self, target: Target) -> Result<Option<ReadPageGuard>> {
        let root_latch = self.root_page_id.read();
        let root_id = *root_latch;
        if root_id == INVALID_PAGE_ID {
            return Ok(None);
        }
        let mut guard = self.bpm.checked_read_page(root_id)?;
        drop(root_latch);

        loop {
            let child_id = {
                let page = BTreePageRef::new(guard.data());
                if page.is_leaf() {
                    break;
                }
                match target {
                    Target::Key(key) => page.child_at(page.key_slot_position(key)),
                    Target::Leftmost => page.child_at(0),
                }
            };
            let child = self.bpm.checked_read_page(child_id)?;
            guard = child;
        }
        Ok(Some(guard))
    }

    /// Write descent. Ancestors (including the root-pointer guard) are
    /// retained in `ctx` until a latched child is safe for `op`; the caller
    /// receives the leaf's write guard.
    fn find_leaf_write<'a>(
        &'a self,
        key: u32,
        op: WriteOp,
        ctx: &mut LatchContext<'a>,
    ) -> Result<WritePageGuard> {
        let root_id = ctx.root_page_id();
        let mut guard = self.bpm.checked_write_page(root_id)?;
        if is_safe(&guard, op) {
            ctx.release_ancestors();
        }

        loop {
            let child_id = {
                let page = BTreePageRef::new(guard.data());
                if page.is_leaf() {
                    break;
                }
                page.child_at(page.key_slot_position(key))
            };
            let child = self.bpm.checked_write_page(child_id)?;
            ctx.ancestors.push(guard);
            guard = child;
            if is_safe(&guard, op) {
                ctx.release_ancestors();
            }
        }
        Ok(guard)
    }

    // Insert path ----------------------------------------------------------

    /// Creates the first leaf as the root of an empty tree.
    fn start_new_tree(&self, ctx: &mut LatchContext<'_>) -> Result<()> {
        let mut guard = self.bpm.new_page()?;
        let page_id = guard.page_id();
        BTreePage::new(guard.data_mut()).init_leaf(page_id, None, self.leaf_max_size);

        ctx.set_root_page_id(page_id);
        self.update_header_root(page_id)?;
        debug!("created root leaf {}", page_id);
        Ok(())
    }

    /// Moves the upper half of a full leaf to a fresh page and links it into
    /// the sibling chain. Returns the separator key and the new leaf's guard.
    fn split_leaf(&self, old_guard: &mut WritePageGuard) -> Result<(u32, WritePageGuard)> {
        let mut new_guard = self.bpm.new_page()?;
        let new_id = new_guard.page_id();

        let mut old = BTreePage::new(old_guard.data_mut());
        let pairs = old.leaf_pairs();
        let moved = pairs.len() / 2;
        let keep = pairs.len() - moved;
        let sep_key = pairs[keep].0;

        let mut new_page = BTreePage::new(new_guard.data_mut());
        new_page.init_leaf(new_id, old.parent_page_id(), self.leaf_max_size);
        new_page.set_leaf_pairs(&pairs[keep..]);
        new_page.set_next_page_id(old.next_page_id());

        old.set_size(keep);
        old.set_next_page_id(Some(new_id));

        debug!("split leaf {} at key {} into {}", old.page_id(), sep_key, new_id);
        Ok((sep_key, new_guard))
    }

    /// Inserts `(sep_key, right)` into the parent of `left`, growing a new
    /// root or splitting the parent (and recursing) as needed.
    fn insert_into_parent<'a>(
        &'a self,
        ctx: &mut LatchContext<'a>,
        mut left: WritePageGuard,
        mut right: WritePageGuard,
        sep_key: u32,
    ) -> Result<()> {
        let left_id = left.page_id();
        let right_id = right.page_id();
        let parent_id = BTreePageRef::new(left.data()).parent_page_id();

        let Some(parent_id) = parent_id else {
            // left was the root: grow the tree by one level.
            let mut root_guard = self.bpm.new_page()?;
            let new_root_id = root_guard.page_id();
            {
                let mut root = BTreePage::new(root_guard.data_mut());
                root.init_internal(new_root_id, None, self.internal_max_size);
                root.set_internal_slots(&[(0, left_id), (sep_key, right_id)]);
            }
            BTreePage::new(left.data_mut()).set_parent_page_id(Some(new_root_id));
            BTreePage::new(right.data_mut()).set_parent_page_id(Some(new_root_id));

            ctx.set_root_page_id(new_root_id);
            self.update_header_root(new_root_id)?;
            debug!("grew new internal root {}", new_root_id);
            return Ok(());
        };

        let mut parent_guard = ctx
            .ancestors
            .pop()
            .expect("parent latch retained by crabbing");
        debug_assert_eq!(parent_guard.page_id(), parent_id);

        if BTreePageRef::new(parent_guard.data()).size() < self.internal_max_size {
            // The parent can absorb one more child.
            BTreePage::new(parent_guard.data_mut()).internal_insert(sep_key, right_id);
            BTreePage::new(right.data_mut()).set_parent_page_id(Some(parent_id));
            return Ok(());
        }

        // Split the parent around the incoming separator.
        let mut new_parent_guard = self.bpm.new_page()?;
        let new_parent_id = new_parent_guard.page_id();
        let grandparent = BTreePageRef::new(parent_guard.data()).parent_page_id();

        let (pushed_key, kept, moved) = {
            let parent = BTreePage::new(parent_guard.data_mut());
            let mut slots = parent.internal_slots();
            let mut pos = 1;
            while pos < slots.len() && slots[pos].0 < sep_key {
                pos += 1;
            }
            slots.insert(pos, (sep_key, right_id));

            // Both halves end up at or above min_size.
            let keep = slots.len() - slots.len() / 2;
            let pushed = slots[keep].0;
            (pushed, slots[..keep].to_vec(), slots[keep..].to_vec())
        };

        BTreePage::new(parent_guard.data_mut()).set_internal_slots(&kept);
        {
            let mut new_parent = BTreePage::new(new_parent_guard.data_mut());
            new_parent.init_internal(new_parent_id, grandparent, self.internal_max_size);
            new_parent.set_internal_slots(&moved);
        }

        // Children that moved now belong to the new page. Two of them may be
        // the guards this call already holds.
        for &(_, child_id) in &moved {
            if child_id == left_id {
                BTreePage::new(left.data_mut()).set_parent_page_id(Some(new_parent_id));
            } else if child_id == right_id {
                BTreePage::new(right.data_mut()).set_parent_page_id(Some(new_parent_id));
            } else {
                let mut child_guard = self.bpm.checked_write_page(child_id)?;
                BTreePage::new(child_guard.data_mut()).set_parent_page_id(Some(new_parent_id));
            }
        }

        drop(left);
        drop(right);
        debug!(
            "split internal {} into {}, pushing key {}",
            parent_id, new_parent_id, pushed_key
        );
        self.insert_into_parent(ctx, parent_guard, new_parent_guard, pushed_key)
    }

    // Delete path ----------------------------------------------------------

    /// Restores the minimum-occupancy invariant of an underflowed page by
    /// borrowing from a sibling or merging with one, recursing up when the
    /// parent underflows in turn.
    fn rebalance<'a>(&'a self, ctx: &mut LatchContext<'a>, page_guard: WritePageGuard) -> Result<()> {
        let (page_id, size, min, is_leaf, parent) = {
            let page = BTreePageRef::new(page_guard.data());
            (
                page.page_id(),
                page.size(),
                page.min_size(),
                page.is_leaf(),
                page.parent_page_id(),
            )
        };
        if size >= min {
            return Ok(());
        }
        let Some(parent_id) = parent else {
            return self.reset_root_if_necessary(ctx, page_guard);
        };

        let mut page_guard = page_guard;
        let mut parent_guard = ctx
            .ancestors
            .pop()
            .expect("parent latch retained by crabbing");
        debug_assert_eq!(parent_guard.page_id(), parent_id);

        let idx = BTreePageRef::new(parent_guard.data())
            .child_index_of(page_id)
            .expect("page is linked from its parent");

        let mut left_guard = None;
        if idx > 0 {
            let left_id = BTreePageRef::new(parent_guard.data()).child_at(idx - 1);
            let lg = self.bpm.checked_write_page(left_id)?;
            if BTreePageRef::new(lg.data()).size() + size >= 2 * min {
                self.borrow_from_left(&mut parent_guard, lg, &mut page_guard, idx, is_leaf)?;
                return Ok(());
            }
            left_guard = Some(lg);
        }

        let parent_size = BTreePageRef::new(parent_guard.data()).size();
        let mut right_guard = None;
        if idx + 1 < parent_size {
            let right_id = BTreePageRef::new(parent_guard.data()).child_at(idx + 1);
            let rg = self.bpm.checked_write_page(right_id)?;
            if BTreePageRef::new(rg.data()).size() + size >= 2 * min {
                self.borrow_from_right(&mut parent_guard, &mut page_guard, rg, idx, is_leaf)?;
                return Ok(());
            }
            right_guard = Some(rg);
        }

        if let Some(lg) = left_guard {
            // The recursive rebalance may reparent the right sibling; its
            // latch must not still be held here.
            drop(right_guard);
            // The left sibling absorbs this page.
            self.merge(ctx, &mut parent_guard, lg, page_guard, idx, is_leaf)?;
        } else if let Some(rg) = right_guard {
            // This page absorbs its right sibling.
            self.merge(ctx, &mut parent_guard, page_guard, rg, idx + 1, is_leaf)?;
        } else {
            unreachable!("non-root page {} has no sibling", page_id);
        }

        self.rebalance(ctx, parent_guard)
    }

    /// The left sibling donates its last element across the separator.
    fn borrow_from_left(
        &self,
        parent: &mut WritePageGuard,
        mut left: WritePageGuard,
        page: &mut WritePageGuard,
        idx: usize,
        is_leaf: bool,
    ) -> Result<()> {
        let page_id = page.page_id();

        if is_leaf {
            let (key, value) = {
                let l = BTreePageRef::new(left.data());
                l.key_value_at(l.size() - 1)
            };
            {
                let mut l = BTreePage::new(left.data_mut());
                let last = l.size() - 1;
                l.leaf_delete_at(last);
            }
            BTreePage::new(page.data_mut()).leaf_insert_at(0, key, value);
            BTreePage::new(parent.data_mut()).set_key_at(idx, key);
        } else {
            let sep_key = BTreePageRef::new(parent.data()).key_at(idx);
            let (donor_key, donor_child) = {
                let l = BTreePageRef::new(left.data());
                (l.key_at(l.size() - 1), l.child_at(l.size() - 1))
            };
            {
                let mut l = BTreePage::new(left.data_mut());
                let last = l.size() - 1;
                l.internal_delete_at(last);
            }
            {
                // The old separator descends; the donated child becomes child 0.
                let mut p = BTreePage::new(page.data_mut());
                p.internal_insert_at(0, 0, donor_child);
                p.set_key_at(1, sep_key);
            }
            BTreePage::new(parent.data_mut()).set_key_at(idx, donor_key);

            let mut child_guard = self.bpm.checked_write_page(donor_child)?;
            BTreePage::new(child_guard.data_mut()).set_parent_page_id(Some(page_id));
        }
        debug!("page {} borrowed from left sibling", page_id);
        Ok(())
    }

    /// The right sibling donates its first element across the separator.
    fn borrow_from_right(
        &self,
        parent: &mut WritePageGuard,
        page: &mut WritePageGuard,
        mut right: WritePageGuard,
        idx: usize,
        is_leaf: bool,
    ) -> Result<()> {
        let page_id = page.page_id();
        let sep_idx = idx + 1;

        if is_leaf {
            let (key, value) = BTreePageRef::new(right.data()).key_value_at(0);
            BTreePage::new(right.data_mut()).leaf_delete_at(0);
            BTreePage::new(page.data_mut()).leaf_append(key, value);

            let new_sep = BTreePageRef::new(right.data()).key_value_at(0).0;
            BTreePage::new(parent.data_mut()).set_key_at(sep_idx, new_sep);
        } else {
            let sep_key = BTreePageRef::new(parent.data()).key_at(sep_idx);
            let donor_child = BTreePageRef::new(right.data()).child_at(0);
            let new_sep = BTreePageRef::new(right.data()).key_at(1);

            BTreePage::new(right.data_mut()).internal_delete_at(0);
            BTreePage::new(page.data_mut()).internal_append(sep_key, donor_child);
            BTreePage::new(parent.data_mut()).set_key_at(sep_idx, new_sep);

            let mut child_guard = self.bpm.checked_write_page(donor_child)?;
            BTreePage::new(child_guard.data_mut()).set_parent_page_id(Some(page_id));
        }
        debug!("page {} borrowed from right sibling", page_id);
        Ok(())
    }

    /// Moves all of `right` into `left` and drops the parent's separator slot
    /// at `sep_idx`. `right` is freed once the operation's latches are gone.
    fn merge(
        &self,
        ctx: &mut LatchContext<'_>,
        parent: &mut WritePageGuard,
        mut left: WritePageGuard,
        right: WritePageGuard,
        sep_idx: usize,
        is_leaf: bool,
    ) -> Result<()> {
        let left_id = left.page_id();
        let right_id = right.page_id();

        if is_leaf {
            let (pairs, next) = {
                let r = BTreePageRef::new(right.data());
                (r.leaf_pairs(), r.next_page_id())
            };
            let mut l = BTreePage::new(left.data_mut());
            for (key, value) in pairs {
                l.leaf_append(key, value);
            }
            l.set_next_page_id(next);
        } else {
            // The parent's separator descends as the first key of the
            // absorbed half.
            let sep_key = BTreePageRef::new(parent.data()).key_at(sep_idx);
            let slots = BTreePageRef::new(right.data()).internal_slots();
            {
                let mut l = BTreePage::new(left.data_mut());
                l.internal_append(sep_key, slots[0].1);
                for &(key, child) in &slots[1..] {
                    l.internal_append(key, child);
                }
            }
            for &(_, child_id) in &slots {
                let mut child_guard = self.bpm.checked_write_page(child_id)?;
                BTreePage::new(child_guard.data_mut()).set_parent_page_id(Some(left_id));
            }
        }

        BTreePage::new(parent.data_mut()).internal_delete_at(sep_idx);
        ctx.deleted.push(right_id);
        debug!("merged page {} into {}", right_id, left_id);
        Ok(())
    }

    /// Shrinks the tree when the root emptied (leaf) or has a single child
    /// (internal), updating the persisted root pointer.
    fn reset_root_if_necessary<'a>(
        &'a self,
        ctx: &mut LatchContext<'a>,
        page_guard: WritePageGuard,
    ) -> Result<()> {
        let (page_id, is_leaf, size) = {
            let page = BTreePageRef::new(page_guard.data());
            (page.page_id(), page.is_leaf(), page.size())
        };

        if is_leaf && size == 0 {
            drop(page_guard);
            ctx.set_root_page_id(INVALID_PAGE_ID);
            self.update_header_root(INVALID_PAGE_ID)?;
            ctx.deleted.push(page_id);
            debug!("tree emptied, root {} cleared", page_id);
        } else if !is_leaf && size == 1 {
            let child_id = BTreePageRef::new(page_guard.data()).child_at(0);
            drop(page_guard);

            let mut child_guard = self.bpm.checked_write_page(child_id)?;
            BTreePage::new(child_guard.data_mut()).set_parent_page_id(None);

            ctx.set_root_page_id(child_id);
            self.update_header_root(child_id)?;
            ctx.deleted.push(page_id);
            debug!("root {} collapsed into {}", page_id, child_id);
        }
        Ok(())
    }

    /// Rewrites this index's header-page record after a root change.
    fn update_header_root(&self, root: PageId) -> Result<()> {
        let mut guard = self.bpm.checked_write_page(HEADER_PAGE_ID)?;
        let mut header = HeaderPage::new(guard.data_mut());
        if !header.update_record(&self.index_name, root)
            && !header.insert_record(&self.index_name, root)
        {
            return Err(StratumError::HeaderPageFull);
        }
        Ok(())
    }
}

/// A page is safe for an operation when that operation cannot propagate past
/// it: an insert cannot split it, a delete cannot underflow it.
fn is_safe(guard: &WritePageGuard, op: WriteOp) -> bool {
    let page = BTreePageRef::new(guard.data());
    match op {
        WriteOp::Insert => {
            if page.is_leaf() {
                page.size() + 1 < page.max_size()
            } else {
                page.size() < page.max_size()
            }
        }
        WriteOp::Delete => page.size() > page.min_size(),
    }
}

fn read_keys<P: AsRef<Path>>(path: P) -> Result<Vec<u32>> {
    let contents = std::fs::read_to_string(path)?;
    contents
        .split_whitespace()
        .map(|token| {
            token
                .parse::<u32>()
                .map_err(|_| StratumError::InvalidKeyFile(format!("bad key: {}", token)))
        })
        .collect()
}
