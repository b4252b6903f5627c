use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};

use parking_lot::Mutex;

/// A bucket holding up to `bucket_size` key/value pairs at a given local depth.
struct Bucket<K, V> {
    items: Vec<(K, V)>,
    local_depth: usize,
}

impl<K: Eq, V> Bucket<K, V> {
    fn new(local_depth: usize) -> Self {
        Self {
            items: Vec::new(),
            local_depth,
        }
    }

    fn find(&self, key: &K) -> Option<&V> {
        self.items.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    fn remove(&mut self, key: &K) -> bool {
        if let Some(pos) = self.items.iter().position(|(k, _)| k == key) {
            self.items.remove(pos);
            true
        } else {
            false
        }
    }

    /// Inserts or updates. The caller ensures the bucket has room for a new key.
    fn insert(&mut self, key: K, value: V) {
        if let Some(slot) = self.items.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.items.push((key, value));
        }
    }
}

/// Directory plus bucket arena, protected by the directory latch as a unit.
struct TableState<K, V> {
    global_depth: usize,
    /// Directory slots index into `buckets`; slots share a bucket while its
    /// local depth is below the global depth.
    dir: Vec<usize>,
    buckets: Vec<Bucket<K, V>>,
}

/// Extendible hash table with directory doubling and bucket splitting.
///
/// A key hashes to directory slot `hash & ((1 << global_depth) - 1)`. When an
/// insert lands in a full bucket, the bucket is split into two buckets of
/// incremented local depth (doubling the directory first if the bucket was at
/// global depth) and its entries are redistributed by the next hash bit. The
/// loop repeats until the target bucket has room.
///
/// The buffer pool instantiates this as its page table, mapping resident page
/// ids to frame ids. A single coarse latch covers the directory and every
/// bucket.
pub struct ExtendibleHashTable<K, V, S = RandomState> {
    bucket_size: usize,
    hash_builder: S,
    state: Mutex<TableState<K, V>>,
}

impl<K, V> ExtendibleHashTable<K, V, RandomState>
where
    K: Hash + Eq,
    V: Clone,
{
    /// Creates a table whose buckets hold at most `bucket_size` entries.
    pub fn new(bucket_size: usize) -> Self {
        Self::with_hasher(bucket_size, RandomState::new())
    }
}

impl<K, V, S> ExtendibleHashTable<K, V, S>
where
    K: Hash + Eq,
    V: Clone,
    S: BuildHasher,
{
    pub fn with_hasher(bucket_size: usize, hash_builder: S) -> Self {
        assert!(bucket_size > 0, "bucket size must be positive");
        Self {
            bucket_size,
            hash_builder,
            state: Mutex::new(TableState {
                global_depth: 0,
                dir: vec![0],
                buckets: vec![Bucket::new(0)],
            }),
        }
    }

    fn hash_of(&self, key: &K) -> usize {
        self.hash_builder.hash_one(key) as usize
    }

    /// Directory slot for `key` at the current global depth.
    fn index_of(state: &TableState<K, V>, hash: usize) -> usize {
        hash & ((1 << state.global_depth) - 1)
    }

    /// Looks up `key`, returning a copy of its value.
    pub fn find(&self, key: &K) -> Option<V> {
        let state = self.state.lock();
        let slot = Self::index_of(&state, self.hash_of(key));
        state.buckets[state.dir[slot]].find(key).cloned()
    }

    /// Removes `key`. Returns false if it was not present.
    pub fn remove(&self, key: &K) -> bool {
        let mut state = self.state.lock();
        let slot = Self::index_of(&state, self.hash_of(key));
        let bucket = state.dir[slot];
        state.buckets[bucket].remove(key)
    }

    /// Inserts `key -> value`, updating in place if the key exists. Splits the
    /// target bucket (growing the directory as needed) until there is room.
    pub fn insert(&self, key: K, value: V) {
        let hash = self.hash_of(&key);
        let mut state = self.state.lock();

        loop {
            let slot = Self::index_of(&state, hash);
            let bucket_idx = state.dir[slot];
            let bucket = &state.buckets[bucket_idx];

            if bucket.items.len() < self.bucket_size || bucket.find(&key).is_some() {
                state.buckets[bucket_idx].insert(key, value);
                return;
            }

            self.split_bucket(&mut state, bucket_idx, hash);
        }
    }

    /// Splits the full bucket at `bucket_idx`. The bucket whose image contains
    /// `hash` keeps the arena slot; its sibling is appended. Every directory
    /// slot sharing the bucket's low `local_depth` bits is re-pointed.
    fn split_bucket(&self, state: &mut TableState<K, V>, bucket_idx: usize, hash: usize) {
        let local_depth = state.buckets[bucket_idx].local_depth;

        if local_depth == state.global_depth {
            // Double the directory; each new slot aliases its low-order twin.
            let len = state.dir.len();
            for i in 0..len {
                let twin = state.dir[i];
                state.dir.push(twin);
            }
            state.global_depth += 1;
        }

        let high_bit = 1usize << local_depth;
        let items = std::mem::take(&mut state.buckets[bucket_idx].items);
        state.buckets[bucket_idx] = Bucket::new(local_depth + 1);
        let sibling_idx = state.buckets.len();
        state.buckets.push(Bucket::new(local_depth + 1));

        // Redistribute by the bit just above the old local mask.
        for (k, v) in items {
            let target = if self.hash_of(&k) & high_bit != 0 {
                sibling_idx
            } else {
                bucket_idx
            };
            state.buckets[target].items.push((k, v));
        }

        let mut slot = hash & (high_bit - 1);
        while slot < state.dir.len() {
            state.dir[slot] = if slot & high_bit != 0 {
                sibling_idx
            } else {
                bucket_idx
            };
            slot += high_bit;
        }
    }

    /// Number of address bits currently used by the directory.
    pub fn global_depth(&self) -> usize {
        self.state.lock().global_depth
    }

    /// Local depth of the bucket referenced by directory slot `dir_index`.
    pub fn local_depth(&self, dir_index: usize) -> usize {
        let state = self.state.lock();
        state.buckets[state.dir[dir_index]].local_depth
    }

    /// Number of distinct buckets.
    pub fn num_buckets(&self) -> usize {
        self.state.lock().buckets.len()
    }

    /// Total number of stored entries.
    pub fn len(&self) -> usize {
        let state = self.state.lock();
        state.buckets.iter().map(|b| b.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
