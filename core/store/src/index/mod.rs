//! Chunked sorted index over an encrypted directory.
//!
//! Items are kept in sorted chunks. Each chunk is one document in the
//! index's directory and the manifest routes items to chunks by boundary.
//!
//! # Invariants
//! - Manifest entries are sorted by boundary; every boundary is the first
//!   item of its chunk
//! - Chunks are never empty and together hold every item exactly once
//! - Every item of chunk `i` is `<=` every item of chunk `i + 1`; equal items
//!   may span a boundary
//!
//! # Balancing
//! - A chunk larger than the split threshold is split at its median, and the
//!   halves are split again until each is within the threshold
//! - A chunk smaller than the merge threshold is merged into its smaller
//!   neighbour (the left one on ties), repeatedly while it stays undersized;
//!   an oversized merge result is split again

mod chunk;
mod manifest;

use std::cmp::Ordering;
use tracing::{debug, warn};

use crate::config::IndexSettings;
use crate::directory::Directory;
use chunk::{chunk_key, resident, resident_mut, Slot};
use coffer_common::{Error, Result};
use coffer_document::Serializable;
use manifest::{manifest_key, ChunkEntry};

/// Largest chunk id accepted from a persisted manifest.
const MAX_CHUNK_ID: usize = u32::MAX as usize;

/// Sorted multiset of items ordered by an external comparator.
///
/// Items that compare equal are all kept; [`remove`](Self::remove) deletes
/// one item that is both comparator-equal and `==` to its argument.
///
/// Chunks load lazily and are evicted from memory after each flush.
pub struct ChunkedIndex<T, C>
where
    T: Serializable + Clone + PartialEq,
    C: Fn(&T, &T) -> Ordering,
{
    directory: Directory,
    compare: C,
    manifest: Vec<ChunkEntry<T>>,
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    settings: IndexSettings,
    len: usize,
    manifest_dirty: bool,
    closed: bool,
}

impl<T, C> ChunkedIndex<T, C>
where
    T: Serializable + Clone + PartialEq,
    C: Fn(&T, &T) -> Ordering,
{
    /// Open the index persisted in `directory`, or an empty one.
    ///
    /// The index owns the directory; give it a namespace of its own.
    ///
    /// # Errors
    /// - Invalid thresholds
    /// - Manifest cannot be decrypted or decoded, or is inconsistent
    pub fn open(directory: Directory, compare: C, settings: IndexSettings) -> Result<Self> {
        settings.validate()?;

        let manifest = match directory.get(&manifest_key())? {
            Some(document) => manifest::decode::<T>(&document).map_err(|e| {
                Error::corrupted(format!("Invalid manifest in {}: {}", directory.root(), e))
            })?,
            None => Vec::new(),
        };

        let mut slots: Vec<Slot<T>> = Vec::new();
        for entry in &manifest {
            if entry.len == 0 || entry.id > MAX_CHUNK_ID {
                return Err(Error::corrupted(format!(
                    "Invalid manifest entry for chunk {} in {}",
                    entry.id,
                    directory.root()
                )));
            }
            if slots.len() <= entry.id {
                slots.resize_with(entry.id + 1, || Slot::Free);
            }
            if !matches!(slots[entry.id], Slot::Free) {
                return Err(Error::corrupted(format!(
                    "Chunk {} listed twice in {}",
                    entry.id,
                    directory.root()
                )));
            }
            slots[entry.id] = Slot::Unloaded;
        }

        let sorted = manifest
            .windows(2)
            .all(|pair| compare(&pair[0].boundary, &pair[1].boundary) != Ordering::Greater);
        if !sorted {
            return Err(Error::corrupted(format!(
                "Manifest in {} is not sorted",
                directory.root()
            )));
        }

        let free = (0..slots.len())
            .rev()
            .filter(|id| matches!(slots[*id], Slot::Free))
            .collect();
        let len = manifest.iter().map(|entry| entry.len).sum();

        debug!(
            root = %directory.root(),
            chunks = manifest.len(),
            items = len,
            "Index opened"
        );
        Ok(Self {
            directory,
            compare,
            manifest,
            slots,
            free,
            settings,
            len,
            manifest_dirty: false,
            closed: false,
        })
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the index holds no items.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of chunks.
    pub fn chunk_count(&self) -> usize {
        self.manifest.len()
    }

    pub fn split_threshold(&self) -> usize {
        self.settings.split_threshold
    }

    pub fn merge_threshold(&self) -> usize {
        self.settings.merge_threshold
    }

    /// Change the split threshold. Existing chunks adapt as they are modified.
    ///
    /// # Errors
    /// - Threshold below [`IndexSettings::MIN_SPLIT_THRESHOLD`]
    pub fn set_split_threshold(&mut self, threshold: usize) -> Result<()> {
        let settings = IndexSettings {
            split_threshold: threshold,
            ..self.settings
        };
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }

    /// Change the merge threshold. Existing chunks adapt as they are modified.
    pub fn set_merge_threshold(&mut self, threshold: usize) -> Result<()> {
        self.settings.merge_threshold = threshold;
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::NotPermitted(format!(
                "Index {} is closed",
                self.directory.root()
            )));
        }
        Ok(())
    }

    /// Index of the first manifest entry whose boundary is not below `item`.
    fn lower_chunk(&self, item: &T) -> usize {
        self.manifest
            .partition_point(|entry| (self.compare)(&entry.boundary, item) == Ordering::Less)
    }

    fn load(&mut self, pos: usize) -> Result<()> {
        let entry = &self.manifest[pos];
        let id = entry.id;
        match self.slots.get(id) {
            Some(slot) if slot.is_resident() => return Ok(()),
            Some(Slot::Unloaded) => {}
            _ => return Err(Error::Storage(format!("Chunk {} has no slot", id))),
        }

        let document = self.directory.get(&chunk_key(id))?.ok_or_else(|| {
            Error::corrupted(format!(
                "Chunk {} missing from {}",
                id,
                self.directory.root()
            ))
        })?;
        let items = chunk::decode::<T>(&document).map_err(|e| {
            Error::corrupted(format!(
                "Invalid chunk {} in {}: {}",
                id,
                self.directory.root(),
                e
            ))
        })?;
        if items.len() != entry.len {
            return Err(Error::corrupted(format!(
                "Chunk {} in {} holds {} items, manifest lists {}",
                id,
                self.directory.root(),
                items.len(),
                entry.len
            )));
        }

        self.slots[id] = Slot::Clean(items);
        Ok(())
    }

    fn allocate(&mut self, items: Vec<T>) -> usize {
        match self.free.pop() {
            Some(id) => {
                self.slots[id] = Slot::Dirty(items);
                id
            }
            None => {
                self.slots.push(Slot::Dirty(items));
                self.slots.len() - 1
            }
        }
    }

    fn release(&mut self, id: usize) -> Result<()> {
        self.slots[id] = Slot::Free;
        self.free.push(id);
        self.directory.remove(chunk_key(id))
    }

    /// Insert an item at its sorted position, after any equal items.
    pub fn add(&mut self, item: T) -> Result<()> {
        self.ensure_open()?;

        if self.manifest.is_empty() {
            let id = self.allocate(vec![item.clone()]);
            self.manifest.push(ChunkEntry {
                id,
                boundary: item,
                len: 1,
            });
            self.len = 1;
            self.manifest_dirty = true;
            return Ok(());
        }

        // Last chunk whose boundary is <= item; the first chunk for smaller items.
        let pos = self
            .manifest
            .partition_point(|entry| (self.compare)(&entry.boundary, &item) != Ordering::Greater)
            .saturating_sub(1);
        self.load(pos)?;

        let compare = &self.compare;
        let items = resident_mut(&mut self.slots, self.manifest[pos].id)?;
        let at = items.partition_point(|existing| compare(existing, &item) != Ordering::Greater);
        items.insert(at, item);
        if at == 0 {
            self.manifest[pos].boundary = items[0].clone();
        }

        self.manifest[pos].len += 1;
        self.len += 1;
        self.manifest_dirty = true;
        self.rebalance(pos)
    }

    /// Locate an item: its manifest position and offset within the chunk.
    fn find(&mut self, item: &T) -> Result<Option<(usize, usize)>> {
        // Equal items may end the chunk before the first boundary >= item.
        let mut pos = self.lower_chunk(item).saturating_sub(1);
        while pos < self.manifest.len() {
            if (self.compare)(&self.manifest[pos].boundary, item) == Ordering::Greater {
                break;
            }
            self.load(pos)?;

            let compare = &self.compare;
            let items = resident(&self.slots, self.manifest[pos].id)?;
            let start = items.partition_point(|x| compare(x, item) == Ordering::Less);
            let end = items.partition_point(|x| compare(x, item) != Ordering::Greater);
            if let Some(offset) = items[start..end].iter().position(|x| x == item) {
                return Ok(Some((pos, start + offset)));
            }
            if end < items.len() {
                break;
            }
            pos += 1;
        }
        Ok(None)
    }

    /// Whether the index holds `item`.
    pub fn contains(&mut self, item: &T) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.find(item)?.is_some())
    }

    /// Remove one occurrence of `item`.
    ///
    /// # Returns
    /// Whether an item was removed.
    pub fn remove(&mut self, item: &T) -> Result<bool> {
        self.ensure_open()?;
        let Some((pos, offset)) = self.find(item)? else {
            return Ok(false);
        };

        let id = self.manifest[pos].id;
        let items = resident_mut(&mut self.slots, id)?;
        items.remove(offset);
        let first = items.first().cloned();

        self.manifest[pos].len -= 1;
        self.len -= 1;
        self.manifest_dirty = true;

        match first {
            None => {
                self.manifest.remove(pos);
                self.release(id)?;
                Ok(true)
            }
            Some(first) => {
                if offset == 0 {
                    self.manifest[pos].boundary = first;
                }
                self.rebalance(pos)?;
                Ok(true)
            }
        }
    }

    fn rebalance(&mut self, mut pos: usize) -> Result<()> {
        loop {
            let len = self.manifest[pos].len;
            if len > self.settings.split_threshold {
                return self.split(pos);
            }
            if len >= self.settings.merge_threshold || self.manifest.len() < 2 {
                return Ok(());
            }
            pos = self.merge(pos)?;
        }
    }

    /// Split the chunk at `pos`, and its pieces, until all fit.
    fn split(&mut self, pos: usize) -> Result<()> {
        let mut pending = vec![pos];
        // Right pieces are handled first so that positions stay valid.
        while let Some(pos) = pending.pop() {
            if self.manifest[pos].len <= self.settings.split_threshold {
                continue;
            }
            self.load(pos)?;

            let items = resident_mut(&mut self.slots, self.manifest[pos].id)?;
            let right = items.split_off(items.len() / 2);
            let left_len = items.len();
            let boundary = right
                .first()
                .cloned()
                .ok_or_else(|| Error::Storage("Split produced an empty chunk".to_string()))?;
            let right_len = right.len();

            let id = self.allocate(right);
            self.manifest[pos].len = left_len;
            self.manifest.insert(
                pos + 1,
                ChunkEntry {
                    id,
                    boundary,
                    len: right_len,
                },
            );
            self.manifest_dirty = true;
            pending.push(pos);
            pending.push(pos + 1);
        }
        Ok(())
    }

    /// Merge the chunk at `pos` with its smaller neighbour.
    ///
    /// # Returns
    /// Position of the merged chunk.
    fn merge(&mut self, pos: usize) -> Result<usize> {
        let last = self.manifest.len() - 1;
        let left = if pos == 0 {
            0
        } else if pos == last || self.manifest[pos - 1].len <= self.manifest[pos + 1].len {
            pos - 1
        } else {
            pos
        };
        self.load(left)?;
        self.load(left + 1)?;

        let right = self.manifest.remove(left + 1);
        let moved = match std::mem::replace(&mut self.slots[right.id], Slot::Free) {
            Slot::Clean(items) | Slot::Dirty(items) => items,
            _ => return Err(Error::Storage(format!("Chunk {} is not loaded", right.id))),
        };
        self.release(right.id)?;

        resident_mut(&mut self.slots, self.manifest[left].id)?.extend(moved);
        self.manifest[left].len += right.len;
        self.manifest_dirty = true;
        Ok(left)
    }

    /// Items in `[lower, upper)`, skipping the first `skip` matches and
    /// returning at most `limit`.
    ///
    /// A `None` bound is unbounded. The result equals slicing the fully
    /// sorted, filtered sequence; only chunks up to the last returned item
    /// are loaded.
    pub fn query(
        &mut self,
        lower: Option<&T>,
        upper: Option<&T>,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<T>> {
        self.ensure_open()?;

        let mut results = Vec::new();
        let mut skip = skip;
        let mut pos = match lower {
            Some(lower) => self.lower_chunk(lower).saturating_sub(1),
            None => 0,
        };

        while pos < self.manifest.len() && results.len() < limit {
            if let Some(upper) = upper {
                if (self.compare)(&self.manifest[pos].boundary, upper) != Ordering::Less {
                    break;
                }
            }
            self.load(pos)?;

            let compare = &self.compare;
            let items = resident(&self.slots, self.manifest[pos].id)?;
            let start = match lower {
                Some(lower) => items.partition_point(|x| compare(x, lower) == Ordering::Less),
                None => 0,
            };
            let end = match upper {
                Some(upper) => items.partition_point(|x| compare(x, upper) == Ordering::Less),
                None => items.len(),
            };

            let available = end.saturating_sub(start);
            if skip >= available {
                skip -= available;
            } else {
                let from = start + skip;
                let take = (end - from).min(limit - results.len());
                results.extend_from_slice(&items[from..from + take]);
                skip = 0;
            }
            pos += 1;
        }
        Ok(results)
    }

    /// Every item in sorted order.
    pub fn all(&mut self) -> Result<Vec<T>> {
        self.query(None, None, 0, usize::MAX)
    }

    /// Persist modified chunks and the manifest, then evict loaded chunks.
    pub fn flush(&mut self) -> Result<()> {
        self.ensure_open()?;

        let mut written = 0;
        for entry in &self.manifest {
            if let Slot::Dirty(items) = &self.slots[entry.id] {
                self.directory
                    .put(chunk_key(entry.id), Some(chunk::encode(items)?))?;
                written += 1;
            }
        }
        if self.manifest_dirty {
            self.directory
                .put(manifest_key(), Some(manifest::encode(&self.manifest)?))?;
            self.manifest_dirty = false;
        }

        // Written chunks now live in the directory buffer until it commits.
        for slot in &mut self.slots {
            if slot.is_resident() {
                *slot = Slot::Unloaded;
            }
        }

        debug!(
            root = %self.directory.root(),
            chunks = written,
            items = self.len,
            "Index flushed"
        );
        self.directory.flush()
    }

    /// Flush and close the index and its directory.
    ///
    /// Closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.flush()?;
        self.directory.close()?;
        self.closed = true;
        Ok(())
    }

    /// Whether [`close`](Self::close) has completed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn has_unflushed(&self) -> bool {
        self.manifest_dirty || self.slots.iter().any(|slot| matches!(slot, Slot::Dirty(_)))
    }
}

impl<T, C> Drop for ChunkedIndex<T, C>
where
    T: Serializable + Clone + PartialEq,
    C: Fn(&T, &T) -> Ordering,
{
    fn drop(&mut self) {
        if self.closed || !self.has_unflushed() {
            return;
        }
        if let Err(e) = self.flush() {
            warn!(
                root = %self.directory.root(),
                error = %e,
                "Dropped index with unflushed chunks"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coffer_common::StorePath;
    use coffer_crypto::DataKey;
    use coffer_storage::{MemoryProvider, StorageProvider};
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};
    use std::sync::Arc;

    type IntIndex = ChunkedIndex<i64, fn(&i64, &i64) -> Ordering>;

    struct Fixture {
        provider: Arc<MemoryProvider>,
        key: Arc<DataKey>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                provider: Arc::new(MemoryProvider::new()),
                key: Arc::new(DataKey::generate()),
            }
        }

        fn open(&self, split: usize, merge: usize) -> IntIndex {
            let directory = Directory::with_provider(
                self.provider.clone(),
                StorePath::parse("/index").unwrap(),
                self.key.clone(),
            )
            .unwrap();
            ChunkedIndex::open(
                directory,
                i64::cmp as fn(&i64, &i64) -> Ordering,
                IndexSettings {
                    split_threshold: split,
                    merge_threshold: merge,
                },
            )
            .unwrap()
        }
    }

    /// Check the structural invariants against the persisted chunks.
    fn assert_consistent(index: &mut IntIndex) {
        let mut previous: Option<i64> = None;
        let mut total = 0;
        for pos in 0..index.manifest.len() {
            index.load(pos).unwrap();
            let entry = &index.manifest[pos];
            let items = resident(&index.slots, entry.id).unwrap();
            assert!(!items.is_empty(), "empty chunk at {}", pos);
            assert_eq!(items.len(), entry.len);
            assert_eq!(items[0], entry.boundary);
            assert!(items.len() <= index.settings.split_threshold);
            assert!(items.windows(2).all(|w| w[0] <= w[1]));
            if let Some(previous) = previous {
                assert!(previous <= items[0]);
            }
            previous = items.last().copied();
            total += items.len();
        }
        assert_eq!(total, index.len());
    }

    #[test]
    fn test_empty_index() {
        let fixture = Fixture::new();
        let mut index = fixture.open(6, 2);
        assert!(index.is_empty());
        assert_eq!(index.chunk_count(), 0);
        assert!(index.all().unwrap().is_empty());
        assert!(!index.remove(&3).unwrap());
        assert!(!index.contains(&3).unwrap());
    }

    #[test]
    fn test_add_splits_at_threshold() {
        let fixture = Fixture::new();
        let mut index = fixture.open(6, 2);
        for i in 0..7 {
            index.add(i).unwrap();
        }
        assert_eq!(index.chunk_count(), 2);
        assert_eq!(index.manifest[0].len, 3);
        assert_eq!(index.manifest[1].boundary, 3);
        assert_consistent(&mut index);
    }

    #[test]
    fn test_smaller_item_moves_first_boundary() {
        let fixture = Fixture::new();
        let mut index = fixture.open(6, 2);
        for i in [10, 20, 30] {
            index.add(i).unwrap();
        }
        index.add(-5).unwrap();
        assert_eq!(index.manifest[0].boundary, -5);
        assert_eq!(index.all().unwrap(), [-5, 10, 20, 30]);
    }

    #[test]
    fn test_remove_merges_and_drops_empty_chunks() {
        let fixture = Fixture::new();
        let mut index = fixture.open(2, 2);
        for i in 0..20 {
            index.add(i).unwrap();
        }
        assert!(index.chunk_count() >= 10);
        assert_consistent(&mut index);

        for i in (0..20).step_by(2) {
            assert!(index.remove(&i).unwrap());
            assert_consistent(&mut index);
        }
        assert_eq!(index.all().unwrap(), (1..20).step_by(2).collect::<Vec<_>>());

        for i in (1..20).step_by(2) {
            assert!(index.remove(&i).unwrap());
        }
        assert!(index.is_empty());
        assert_eq!(index.chunk_count(), 0);
    }

    #[test]
    fn test_duplicates_across_chunks() {
        let fixture = Fixture::new();
        let mut index = fixture.open(2, 0);
        for _ in 0..9 {
            index.add(5).unwrap();
        }
        index.add(1).unwrap();
        index.add(9).unwrap();
        assert_consistent(&mut index);
        assert_eq!(index.query(Some(&5), Some(&6), 0, usize::MAX).unwrap().len(), 9);

        for remaining in (0..9).rev() {
            assert!(index.remove(&5).unwrap());
            assert_eq!(index.len(), remaining + 2);
            assert_consistent(&mut index);
        }
        assert!(!index.remove(&5).unwrap());
        assert_eq!(index.all().unwrap(), [1, 9]);
    }

    #[test]
    fn test_query_bounds_skip_and_limit() {
        let fixture = Fixture::new();
        let mut index = fixture.open(3, 1);
        for i in (0..50).rev() {
            index.add(i * 2).unwrap();
        }

        assert_eq!(index.query(Some(&10), Some(&20), 0, usize::MAX).unwrap(), [10, 12, 14, 16, 18]);
        assert_eq!(index.query(Some(&11), Some(&19), 1, 2).unwrap(), [14, 16]);
        assert_eq!(index.query(None, Some(&5), 0, usize::MAX).unwrap(), [0, 2, 4]);
        assert_eq!(index.query(Some(&95), None, 0, usize::MAX).unwrap(), [96, 98]);
        assert_eq!(index.query(None, None, 48, 10).unwrap(), [96, 98]);
        assert!(index.query(None, None, 100, 10).unwrap().is_empty());
        assert!(index.query(None, None, 0, 0).unwrap().is_empty());
        assert!(index.query(Some(&30), Some(&20), 0, usize::MAX).unwrap().is_empty());
    }

    #[test]
    fn test_flush_evicts_and_reopen_restores() {
        let fixture = Fixture::new();
        let mut index = fixture.open(4, 2);
        for i in 0..30 {
            index.add(i * 7 % 31).unwrap();
        }
        let expected = index.all().unwrap();
        index.flush().unwrap();
        assert!(index.slots.iter().all(|slot| !slot.is_resident()));
        assert_eq!(index.all().unwrap(), expected);

        index.remove(&7).unwrap();
        index.close().unwrap();
        assert!(matches!(index.add(1), Err(Error::NotPermitted(_))));

        let mut reopened = fixture.open(4, 2);
        let mut remaining = expected.clone();
        remaining.retain(|x| *x != 7);
        assert_eq!(reopened.all().unwrap(), remaining);
        assert_eq!(reopened.len(), remaining.len());
        assert_consistent(&mut reopened);
    }

    #[test]
    fn test_drop_persists_unflushed_changes() {
        let fixture = Fixture::new();
        {
            let mut index = fixture.open(6, 2);
            index.add(3).unwrap();
            index.add(1).unwrap();
        }
        assert_eq!(fixture.open(6, 2).all().unwrap(), [1, 3]);
    }

    #[test]
    fn test_threshold_validation() {
        let fixture = Fixture::new();
        let mut index = fixture.open(6, 2);
        assert!(index.set_split_threshold(1).is_err());
        assert_eq!(index.split_threshold(), 6);
        index.set_split_threshold(2).unwrap();
        index.set_merge_threshold(0).unwrap();
        assert_eq!(index.merge_threshold(), 0);

        for i in 0..5 {
            index.add(i).unwrap();
        }
        assert_consistent(&mut index);
    }

    #[test]
    fn test_missing_chunk_is_corruption() {
        let fixture = Fixture::new();
        {
            let mut index = fixture.open(2, 1);
            for i in 0..6 {
                index.add(i).unwrap();
            }
            index.close().unwrap();
        }
        let chunk = StorePath::parse("/index")
            .unwrap()
            .join(&crate::naming::file_name(&chunk_key(0)))
            .unwrap();
        assert!(fixture.provider.remove(&chunk).unwrap());

        let mut index = fixture.open(2, 1);
        assert!(index.all().unwrap_err().is_corrupted());
    }

    #[test]
    fn test_random_workload_matches_model() {
        let fixture = Fixture::new();
        let mut rng = StdRng::seed_from_u64(7);
        let mut model: Vec<i64> = Vec::new();

        // Split thresholds only grow, so chunks written earlier stay within bounds.
        for (split, merge) in [(2, 2), (5, 4), (6, 2), (16, 3)] {
            let mut index = fixture.open(split, merge);
            for _ in 0..300 {
                if model.is_empty() || rng.gen_bool(0.6) {
                    let item = rng.gen_range(-40..40);
                    index.add(item).unwrap();
                    model.push(item);
                } else {
                    let item = *model.choose(&mut rng).unwrap();
                    assert!(index.remove(&item).unwrap());
                    let at = model.iter().position(|x| *x == item).unwrap();
                    model.remove(at);
                }
                if rng.gen_ratio(1, 50) {
                    index.flush().unwrap();
                }
            }
            model.sort();
            assert_eq!(index.all().unwrap(), model);
            assert_consistent(&mut index);
            index.close().unwrap();
        }
    }
}
