use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{PageId, PAGE_SIZE};

use super::buffer_pool_manager::PoolShared;
use super::FrameHeader;

/// RAII guard for read access to a page. Holds one pin and the page's read
/// latch; both are released when the guard drops.
pub struct ReadPageGuard {
    page_id: PageId,
    /// Read latch on the payload; released before the pin
    data_guard: Option<RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>>>,
    /// Keeps the latched frame alive for the guard's lifetime
    _frame: Arc<FrameHeader>,
    shared: Arc<PoolShared>,
}

impl ReadPageGuard {
    /// # Safety
    /// The caller must hand in the frame currently resident for `page_id`,
    /// already pinned on this guard's behalf.
    pub(crate) unsafe fn new(
        page_id: PageId,
        frame: Arc<FrameHeader>,
        shared: Arc<PoolShared>,
    ) -> Self {
        let data_guard = frame.data.read();
        // The borrow is extended to 'static; the Arc held below outlives the
        // guard, and Drop releases the guard before anything else.
        let data_guard: RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>> =
            std::mem::transmute(data_guard);

        Self {
            page_id,
            data_guard: Some(data_guard),
            _frame: frame,
            shared,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data_guard.as_ref().unwrap()[..]
    }

    /// Drops this guard, releasing the latch and the pin.
    pub fn drop_guard(self) {
        drop(self);
    }
}

impl Deref for ReadPageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        // Page latch first, pool latch second; unpin_page takes the pool
        // latch, and an evictor holding it may be waiting on this page latch.
        self.data_guard.take();
        self.shared.unpin_page(self.page_id, false);
    }
}

/// RAII guard for write access to a page. Holds one pin and the page's write
/// latch; the frame is marked dirty on release iff `data_mut` was called.
pub struct WritePageGuard {
    page_id: PageId,
    data_guard: Option<RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>>>,
    _frame: Arc<FrameHeader>,
    shared: Arc<PoolShared>,
    is_dirty: bool,
}

impl WritePageGuard {
    /// # Safety
    /// The caller must hand in the frame currently resident for `page_id`,
    /// already pinned on this guard's behalf.
    pub(crate) unsafe fn new(
        page_id: PageId,
        frame: Arc<FrameHeader>,
        shared: Arc<PoolShared>,
    ) -> Self {
        let data_guard = frame.data.write();
        let data_guard: RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>> =
            std::mem::transmute(data_guard);

        Self {
            page_id,
            data_guard: Some(data_guard),
            _frame: frame,
            shared,
            is_dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.data_guard.as_ref().unwrap()[..]
    }

    /// Mutable view of the payload; marks the page dirty.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.is_dirty = true;
        &mut self.data_guard.as_mut().unwrap()[..]
    }

    /// Drops this guard, releasing the latch and the pin.
    pub fn drop_guard(self) {
        drop(self);
    }
}

impl Deref for WritePageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl DerefMut for WritePageGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data_mut()
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        self.data_guard.take();
        self.shared.unpin_page(self.page_id, self.is_dirty);
    }
}
