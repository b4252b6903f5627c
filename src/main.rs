use std::sync::Arc;

use stratum::buffer::BufferPoolManager;
use stratum::index::BPlusTree;
use stratum::storage::disk::DiskManager;
use stratum::{PageId, RecordId, SlotId};

fn main() {
    println!("Stratum - a disk-oriented storage engine core");
    println!("=============================================\n");

    let db_path = "demo.db";

    let disk_manager = Arc::new(DiskManager::new(db_path).expect("failed to open database file"));
    println!("Opened database file: {}", db_path);

    // 16 frames, LRU-2 replacement
    let bpm = Arc::new(BufferPoolManager::new(16, 2, disk_manager));
    println!("Created buffer pool with {} frames\n", bpm.pool_size());

    let tree =
        BPlusTree::new("demo_index", Arc::clone(&bpm), 4, 4).expect("failed to create index");

    // Small fanout so a handful of keys already builds a two-level tree.
    for key in 1..=10u32 {
        let value = RecordId::new(PageId::new(key), SlotId::new(0));
        tree.insert(key, value).expect("insert failed");
    }
    println!("Inserted keys 1..=10");
    println!("Root page: {}", tree.get_root_page_id());
    println!("Tree structure:\n{}", tree.dump_structure().unwrap());

    let value = tree.get_value(7).expect("lookup failed");
    println!("get_value(7) = {:?}", value);

    print!("Iterating in key order:");
    let mut iter = tree.begin().expect("begin failed");
    while let Some((key, _)) = iter.next().expect("iteration failed") {
        print!(" {}", key);
    }
    println!();

    for key in [2u32, 3, 4] {
        tree.remove(key).expect("remove failed");
    }
    println!("\nRemoved keys 2, 3, 4");
    println!("Tree structure:\n{}", tree.dump_structure().unwrap());

    bpm.flush_all_pages().expect("flush failed");
    bpm.disk_manager().sync().expect("sync failed");
    println!("Flushed all pages to disk");

    println!(
        "Disk stats: {} reads, {} writes",
        bpm.disk_manager().num_reads(),
        bpm.disk_manager().num_writes()
    );

    std::fs::remove_file(db_path).ok();
    println!("\nDemo completed successfully!");
}
