use std::collections::LinkedList;
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::common::{
    FrameId, PageId, Result, StratumError, DEFAULT_BUCKET_SIZE, INVALID_PAGE_ID, PAGE_SIZE,
};
use crate::container::ExtendibleHashTable;
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::{FrameHeader, LruKReplacer, ReadPageGuard, WritePageGuard};

/// State shared between the manager and outstanding page guards.
pub(crate) struct PoolShared {
    frames: Vec<Arc<FrameHeader>>,
    /// Page table: resident page id -> frame id
    page_table: ExtendibleHashTable<PageId, FrameId>,
    replacer: LruKReplacer,
    /// Pool latch. Owns the free list and serializes every residency
    /// transition (pin, unpin, install, evict, delete).
    latch: Mutex<PoolInner>,
}

struct PoolInner {
    free_list: LinkedList<FrameId>,
}

impl PoolShared {
    /// Releases one pin on `page_id`, OR-ing `is_dirty` into the frame's
    /// dirty flag. Returns false if the page is not resident or its pin count
    /// is already zero; on the last unpin the frame becomes evictable.
    pub(crate) fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let _latch = self.latch.lock();

        let Some(frame_id) = self.page_table.find(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.as_usize()];
        if frame.pin_count() == 0 {
            return false;
        }
        if is_dirty {
            frame.set_dirty(true);
        }
        if frame.unpin() == Some(0) {
            let _ = self.replacer.set_evictable(frame_id, true);
        }
        true
    }
}

/// BufferPoolManager mediates all access between callers and the disk
/// manager: it owns a fixed array of page-sized frames, resolves residency
/// through the extendible-hash page table, and picks eviction victims with
/// the LRU-K replacer when the free list runs dry.
pub struct BufferPoolManager {
    pool_size: usize,
    shared: Arc<PoolShared>,
    disk_scheduler: DiskScheduler,
}

impl BufferPoolManager {
    /// Creates a pool of `pool_size` frames using LRU-`replacer_k` eviction.
    pub fn new(pool_size: usize, replacer_k: usize, disk_manager: Arc<DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = LinkedList::new();

        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(FrameHeader::new(frame_id)));
            free_list.push_back(frame_id);
        }

        Self {
            pool_size,
            shared: Arc::new(PoolShared {
                frames,
                page_table: ExtendibleHashTable::new(DEFAULT_BUCKET_SIZE),
                replacer: LruKReplacer::new(replacer_k, pool_size),
                latch: Mutex::new(PoolInner { free_list }),
            }),
            disk_scheduler: DiskScheduler::new(disk_manager),
        }
    }

    /// Allocates a fresh page and returns a pinned write guard on its zeroed
    /// frame. Fails with `BufferPoolFull` when every frame is pinned.
    pub fn new_page(&self) -> Result<WritePageGuard> {
        let mut inner = self.shared.latch.lock();
        let frame_id = self.acquire_frame(&mut inner)?;

        let page_id = self.disk_scheduler.disk_manager().allocate_page();
        let frame = &self.shared.frames[frame_id.as_usize()];
        frame.set_page_id(page_id);
        frame.set_dirty(false);
        frame.pin();

        self.shared.page_table.insert(page_id, frame_id);
        self.shared.replacer.record_access(frame_id)?;
        self.shared.replacer.set_evictable(frame_id, false)?;
        drop(inner);

        let frame = Arc::clone(&self.shared.frames[frame_id.as_usize()]);
        // Safety: the frame is resident for page_id and pinned above.
        Ok(unsafe { WritePageGuard::new(page_id, frame, Arc::clone(&self.shared)) })
    }

    /// Fetches a page for shared access, reading it from disk if it is not
    /// resident. The returned guard holds a pin and the page's read latch.
    pub fn checked_read_page(&self, page_id: PageId) -> Result<ReadPageGuard> {
        let frame_id = self.fetch_page(page_id)?;
        let frame = Arc::clone(&self.shared.frames[frame_id.as_usize()]);
        // Safety: fetch_page pinned the frame for page_id.
        Ok(unsafe { ReadPageGuard::new(page_id, frame, Arc::clone(&self.shared)) })
    }

    /// Fetches a page for exclusive access, reading it from disk if it is not
    /// resident. The returned guard holds a pin and the page's write latch.
    pub fn checked_write_page(&self, page_id: PageId) -> Result<WritePageGuard> {
        let frame_id = self.fetch_page(page_id)?;
        let frame = Arc::clone(&self.shared.frames[frame_id.as_usize()]);
        // Safety: fetch_page pinned the frame for page_id.
        Ok(unsafe { WritePageGuard::new(page_id, frame, Arc::clone(&self.shared)) })
    }

    /// Releases one pin on `page_id`. See [`PoolShared::unpin_page`]; exposed
    /// here because guards normally do this on drop.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        self.shared.unpin_page(page_id, is_dirty)
    }

    /// Writes a resident page back to disk and clears its dirty flag,
    /// whatever the flag's prior value. Returns false if not resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        if page_id == INVALID_PAGE_ID {
            return Err(StratumError::InvalidPageId(page_id));
        }

        let frame_id = {
            let _latch = self.shared.latch.lock();
            let Some(frame_id) = self.shared.page_table.find(&page_id) else {
                return Ok(false);
            };
            // Quarantine the frame against eviction, then write without the
            // pool latch: a holder of this page's latch may itself be waiting
            // for the pool latch.
            self.shared.frames[frame_id.as_usize()].pin();
            let _ = self.shared.replacer.set_evictable(frame_id, false);
            frame_id
        };

        self.flush_frame(frame_id, page_id).map(|_| true)
    }

    /// Writes every resident page back to disk.
    pub fn flush_all_pages(&self) -> Result<()> {
        for i in 0..self.pool_size {
            let frame_id = FrameId::new(i as u32);
            let page_id = {
                let _latch = self.shared.latch.lock();
                let page_id = self.shared.frames[i].page_id();
                if page_id == INVALID_PAGE_ID {
                    continue;
                }
                self.shared.frames[i].pin();
                let _ = self.shared.replacer.set_evictable(frame_id, false);
                page_id
            };
            self.flush_frame(frame_id, page_id)?;
        }
        Ok(())
    }

    /// Writes a pinned frame's payload to disk and releases the flush pin.
    fn flush_frame(&self, frame_id: FrameId, page_id: PageId) -> Result<()> {
        let frame = &self.shared.frames[frame_id.as_usize()];

        let mut data = [0u8; PAGE_SIZE];
        frame.copy_to(&mut data);
        let result = self.disk_scheduler.schedule_write_sync(page_id, &data);
        if result.is_ok() {
            frame.set_dirty(false);
        }
        self.shared.unpin_page(page_id, false);
        result
    }

    /// Drops a page from the pool and marks its disk page reusable. Returns
    /// Ok(true) when the page is gone (or was never resident) and Ok(false)
    /// when it is resident but pinned.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut inner = self.shared.latch.lock();

        let Some(frame_id) = self.shared.page_table.find(&page_id) else {
            return Ok(true);
        };
        let frame = &self.shared.frames[frame_id.as_usize()];
        if frame.pin_count() > 0 {
            return Ok(false);
        }

        if frame.is_dirty() {
            let mut data = [0u8; PAGE_SIZE];
            frame.copy_to(&mut data);
            self.disk_scheduler.schedule_write_sync(page_id, &data)?;
        }

        self.shared.page_table.remove(&page_id);
        self.shared.replacer.remove(frame_id);
        frame.reset();
        inner.free_list.push_back(frame_id);
        self.disk_scheduler.disk_manager().deallocate_page(page_id);

        Ok(true)
    }

    /// Pin count of a resident page, None if not resident.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let _latch = self.shared.latch.lock();
        self.shared
            .page_table
            .find(&page_id)
            .map(|frame_id| self.shared.frames[frame_id.as_usize()].pin_count())
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.shared.latch.lock().free_list.len()
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        self.disk_scheduler.disk_manager()
    }

    /// Resolves `page_id` to a pinned frame, loading from disk on a miss.
    fn fetch_page(&self, page_id: PageId) -> Result<FrameId> {
        if page_id == INVALID_PAGE_ID {
            return Err(StratumError::InvalidPageId(page_id));
        }
        let mut inner = self.shared.latch.lock();

        if let Some(frame_id) = self.shared.page_table.find(&page_id) {
            let frame = &self.shared.frames[frame_id.as_usize()];
            frame.pin();
            self.shared.replacer.record_access(frame_id)?;
            self.shared.replacer.set_evictable(frame_id, false)?;
            return Ok(frame_id);
        }

        let frame_id = self.acquire_frame(&mut inner)?;
        let frame = &self.shared.frames[frame_id.as_usize()];

        let mut data = [0u8; PAGE_SIZE];
        if let Err(e) = self.disk_scheduler.schedule_read_sync(page_id, &mut data) {
            inner.free_list.push_back(frame_id);
            return Err(e);
        }

        frame.set_page_id(page_id);
        frame.copy_from(&data);
        frame.set_dirty(false);
        frame.pin();

        self.shared.page_table.insert(page_id, frame_id);
        self.shared.replacer.record_access(frame_id)?;
        self.shared.replacer.set_evictable(frame_id, false)?;

        Ok(frame_id)
    }

    /// Shared frame-acquisition subroutine: prefer the free list, otherwise
    /// evict. A dirty victim is written back before its frame is reused.
    fn acquire_frame(&self, inner: &mut PoolInner) -> Result<FrameId> {
        if let Some(frame_id) = inner.free_list.pop_front() {
            return Ok(frame_id);
        }

        let Some(frame_id) = self.shared.replacer.evict() else {
            return Err(StratumError::BufferPoolFull);
        };
        let frame = &self.shared.frames[frame_id.as_usize()];
        let victim_id = frame.page_id();
        debug!("evicting page {} from frame {}", victim_id, frame_id);

        if frame.is_dirty() {
            let mut data = [0u8; PAGE_SIZE];
            frame.copy_to(&mut data);
            self.disk_scheduler.schedule_write_sync(victim_id, &data)?;
        }

        self.shared.page_table.remove(&victim_id);
        frame.reset();

        Ok(frame_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_bpm(pool_size: usize) -> (BufferPoolManager, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let bpm = BufferPoolManager::new(pool_size, 2, dm);
        (bpm, temp_file)
    }

    #[test]
    fn test_new_pool() {
        let (bpm, _temp) = create_bpm(10);
        assert_eq!(bpm.pool_size(), 10);
        assert_eq!(bpm.free_frame_count(), 10);
    }

    #[test]
    fn test_new_page_is_pinned() {
        let (bpm, _temp) = create_bpm(10);

        let guard = bpm.new_page().unwrap();
        let page_id = guard.page_id();
        assert_eq!(page_id, PageId::new(0));
        assert_eq!(bpm.get_pin_count(page_id), Some(1));
        assert_eq!(bpm.free_frame_count(), 9);

        drop(guard);
        assert_eq!(bpm.get_pin_count(page_id), Some(0));
    }

    #[test]
    fn test_read_write_round_trip() {
        let (bpm, _temp) = create_bpm(10);

        let page_id = {
            let mut guard = bpm.new_page().unwrap();
            guard.data_mut()[0] = 42;
            guard.data_mut()[100] = 255;
            guard.page_id()
        };

        let guard = bpm.checked_read_page(page_id).unwrap();
        assert_eq!(guard.data()[0], 42);
        assert_eq!(guard.data()[100], 255);
    }

    #[test]
    fn test_unpin_page_semantics() {
        let (bpm, _temp) = create_bpm(10);

        let guard = bpm.new_page().unwrap();
        let page_id = guard.page_id();
        drop(guard);

        // Pin count is zero now, so another unpin must refuse.
        assert!(!bpm.unpin_page(page_id, false));
        assert!(!bpm.unpin_page(PageId::new(999), false));
    }

    #[test]
    fn test_flush_persists() {
        let (bpm, temp) = create_bpm(10);

        let page_id = {
            let mut guard = bpm.new_page().unwrap();
            guard.data_mut()[0] = 42;
            guard.page_id()
        };
        assert!(bpm.flush_page(page_id).unwrap());

        drop(bpm);
        let dm = Arc::new(DiskManager::new(temp.path()).unwrap());
        let bpm2 = BufferPoolManager::new(10, 2, dm);
        let guard = bpm2.checked_read_page(page_id).unwrap();
        assert_eq!(guard.data()[0], 42);
    }

    #[test]
    fn test_flush_missing_page() {
        let (bpm, _temp) = create_bpm(10);
        assert!(!bpm.flush_page(PageId::new(3)).unwrap());
    }

    #[test]
    fn test_eviction_writes_back_dirty_victim() {
        let (bpm, _temp) = create_bpm(3);

        let mut ids = Vec::new();
        for i in 0..3u8 {
            let mut guard = bpm.new_page().unwrap();
            guard.data_mut()[0] = i;
            ids.push(guard.page_id());
        }
        assert_eq!(bpm.free_frame_count(), 0);

        // Fill three more pages, forcing the first three out.
        for i in 3..6u8 {
            let mut guard = bpm.new_page().unwrap();
            guard.data_mut()[0] = i;
        }

        // The evicted pages must come back from disk intact.
        for (i, &page_id) in ids.iter().enumerate() {
            let guard = bpm.checked_read_page(page_id).unwrap();
            assert_eq!(guard.data()[0], i as u8);
        }
    }

    #[test]
    fn test_pool_exhaustion() {
        let (bpm, _temp) = create_bpm(2);

        let _g1 = bpm.new_page().unwrap();
        let _g2 = bpm.new_page().unwrap();

        assert!(matches!(bpm.new_page(), Err(StratumError::BufferPoolFull)));
    }

    #[test]
    fn test_delete_page() {
        let (bpm, _temp) = create_bpm(10);

        let guard = bpm.new_page().unwrap();
        let page_id = guard.page_id();

        // Pinned: refused, not an error.
        assert!(!bpm.delete_page(page_id).unwrap());

        drop(guard);
        assert!(bpm.delete_page(page_id).unwrap());
        assert_eq!(bpm.get_pin_count(page_id), None);
        assert_eq!(bpm.free_frame_count(), 10);

        // Deleting a non-resident page is a successful no-op.
        assert!(bpm.delete_page(page_id).unwrap());
    }
}
