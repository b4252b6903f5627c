//! Integration tests for the buffer pool manager

use std::sync::Arc;

use stratum::buffer::BufferPoolManager;
use stratum::common::{PageId, StratumError, PAGE_SIZE};
use stratum::storage::disk::DiskManager;

use tempfile::NamedTempFile;

fn create_bpm(pool_size: usize) -> (BufferPoolManager, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
    (BufferPoolManager::new(pool_size, 2, dm), temp_file)
}

/// Pool of three frames: three pinned pages exhaust it, unpinning exactly one
/// page makes the next allocation evict that page's frame.
#[test]
fn test_exhaustion_and_single_victim() {
    let (bpm, _temp) = create_bpm(3);

    let g0 = bpm.new_page().unwrap();
    let g1 = bpm.new_page().unwrap();
    let g2 = bpm.new_page().unwrap();
    assert_eq!(g0.page_id(), PageId::new(0));
    assert_eq!(g1.page_id(), PageId::new(1));
    assert_eq!(g2.page_id(), PageId::new(2));

    // All frames pinned: no eviction candidate.
    assert!(matches!(bpm.new_page(), Err(StratumError::BufferPoolFull)));

    // Unpin page 1; it is now the only possible victim.
    drop(g1);
    let g3 = bpm.new_page().unwrap();
    assert_eq!(g3.page_id(), PageId::new(3));

    // Page 1 was evicted, pages 0 and 2 remain resident and pinned.
    assert_eq!(bpm.get_pin_count(PageId::new(1)), None);
    assert_eq!(bpm.get_pin_count(PageId::new(0)), Some(1));
    assert_eq!(bpm.get_pin_count(PageId::new(2)), Some(1));
}

/// A refetch of a resident page is served from memory, not from disk.
#[test]
fn test_refetch_hits_cache() {
    let (bpm, _temp) = create_bpm(4);

    let page_id = {
        let mut guard = bpm.new_page().unwrap();
        guard.data_mut()[0] = 99;
        guard.page_id()
    };

    let reads_before = bpm.disk_manager().num_reads();
    {
        let guard = bpm.checked_read_page(page_id).unwrap();
        assert_eq!(guard.data()[0], 99);
    }
    let guard = bpm.checked_read_page(page_id).unwrap();
    assert_eq!(guard.data()[0], 99);
    assert_eq!(bpm.disk_manager().num_reads(), reads_before);
}

/// Flushed bytes survive eviction: forcing the page out and refetching it
/// yields a byte-identical payload.
#[test]
fn test_flush_evict_refetch_round_trip() {
    let (bpm, _temp) = create_bpm(2);

    let mut payload = [0u8; PAGE_SIZE];
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte = (i % 251) as u8;
    }

    let page_id = {
        let mut guard = bpm.new_page().unwrap();
        guard.data_mut().copy_from_slice(&payload);
        guard.page_id()
    };
    assert!(bpm.flush_page(page_id).unwrap());

    // Evict the page by cycling both frames through new allocations.
    for _ in 0..2 {
        let _ = bpm.new_page().unwrap();
    }
    assert_eq!(bpm.get_pin_count(page_id), None);

    let guard = bpm.checked_read_page(page_id).unwrap();
    assert_eq!(guard.data(), &payload[..]);
}

#[test]
fn test_pin_counts_accumulate() {
    let (bpm, _temp) = create_bpm(4);

    let page_id = bpm.new_page().unwrap().page_id();

    let g1 = bpm.checked_read_page(page_id).unwrap();
    let g2 = bpm.checked_read_page(page_id).unwrap();
    assert_eq!(bpm.get_pin_count(page_id), Some(2));

    drop(g1);
    assert_eq!(bpm.get_pin_count(page_id), Some(1));
    drop(g2);
    assert_eq!(bpm.get_pin_count(page_id), Some(0));

    // A page with pin count zero rejects a further unpin and stays at zero.
    assert!(!bpm.unpin_page(page_id, true));
    assert_eq!(bpm.get_pin_count(page_id), Some(0));
}

#[test]
fn test_dirty_data_survives_unflushed_eviction() {
    let (bpm, _temp) = create_bpm(1);

    let page_id = {
        let mut guard = bpm.new_page().unwrap();
        guard.data_mut()[10] = 77;
        guard.page_id()
    };

    // The sole frame is recycled; the dirty page must be written back.
    let other = bpm.new_page().unwrap().page_id();
    assert_ne!(other, page_id);

    let guard = bpm.checked_read_page(page_id).unwrap();
    assert_eq!(guard.data()[10], 77);
}

#[test]
fn test_delete_page_returns_frame() {
    let (bpm, _temp) = create_bpm(2);

    let page_id = bpm.new_page().unwrap().page_id();
    assert_eq!(bpm.free_frame_count(), 1);

    assert!(bpm.delete_page(page_id).unwrap());
    assert_eq!(bpm.free_frame_count(), 2);

    // The deallocated page id is handed out again.
    let reused = bpm.new_page().unwrap().page_id();
    assert_eq!(reused, page_id);
}

#[test]
fn test_concurrent_pin_unpin() {
    use std::thread;

    let (bpm, _temp) = create_bpm(8);
    let bpm = Arc::new(bpm);

    let mut page_ids = Vec::new();
    for i in 0..4u8 {
        let mut guard = bpm.new_page().unwrap();
        guard.data_mut()[0] = i;
        page_ids.push(guard.page_id());
    }
    let page_ids = Arc::new(page_ids);

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let bpm = Arc::clone(&bpm);
            let page_ids = Arc::clone(&page_ids);
            thread::spawn(move || {
                for round in 0..50 {
                    let page_id = page_ids[(t + round) % page_ids.len()];
                    let guard = bpm.checked_read_page(page_id).unwrap();
                    assert_eq!(guard.data()[0] as usize, (t + round) % page_ids.len());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for &page_id in page_ids.iter() {
        assert_eq!(bpm.get_pin_count(page_id), Some(0));
    }
}
