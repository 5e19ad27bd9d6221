//! LRU block cache.

use log;
use std::io;
use std::io::prelude::*;
use std::io::SeekFrom;

use crate::codec::{block_offset, Block, BlockId, Key, Record, RecordLocation, BLOCK_SIZE, RECORD_SIZE};
use crate::lru::LruList;
use crate::sort::SortError;
use crate::stats::{RunStatistics, StatsCollector};

/// Capacity bounded, write-back block cache over a backing file.
/// Every record access goes through the cache. A missing block is loaded from the file, evicting
/// the least recently used block first if the cache is full. Dirty blocks are written back on
/// eviction or [`BlockCache::flush`].
pub struct BlockCache<F, S = RunStatistics>
where
    F: Read + Write + Seek,
    S: StatsCollector,
{
    /// Backing file.
    file: F,
    /// Backing file length in bytes.
    extent: u64,
    /// Maximum number of resident blocks.
    capacity: usize,
    /// Resident blocks.
    blocks: LruList<Block>,
    /// Statistics collector.
    stats: S,
}

impl<F> BlockCache<F, RunStatistics>
where
    F: Read + Write + Seek,
{
    /// Creates a cache collecting statistics into a fresh [`RunStatistics`].
    pub fn new(file: F, capacity: usize) -> Result<Self, SortError> {
        Self::with_stats(file, capacity, RunStatistics::new())
    }
}

impl<F, S> BlockCache<F, S>
where
    F: Read + Write + Seek,
    S: StatsCollector,
{
    /// Creates a cache.
    ///
    /// # Arguments
    /// * `file` - Backing file
    /// * `capacity` - Maximum number of resident blocks, must be positive
    /// * `stats` - Statistics collector
    pub fn with_stats(mut file: F, capacity: usize, stats: S) -> Result<Self, SortError> {
        if capacity == 0 {
            return Err(SortError::InvalidCapacity(capacity));
        }

        let extent = file.seek(SeekFrom::End(0))?;
        log::debug!("block cache created (capacity: {} blocks, file length: {})", capacity, extent);

        return Ok(BlockCache {
            file,
            extent,
            capacity,
            blocks: LruList::with_capacity(capacity),
            stats,
        });
    }

    /// Returns the maximum number of resident blocks.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of resident blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Returns the number of whole records in the backing file.
    pub fn record_count(&self) -> u64 {
        self.extent / RECORD_SIZE as u64
    }

    pub fn stats(&self) -> &S {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut S {
        &mut self.stats
    }

    /// Checks if the block is resident.
    pub fn is_resident(&self, block_id: BlockId) -> bool {
        self.blocks.contains(block_id)
    }

    /// Returns resident block ids from the most to the least recently used.
    pub fn resident_blocks(&self) -> Vec<BlockId> {
        self.blocks.iter_ids().collect()
    }

    /// Returns the key of the record at `index`.
    pub fn read_key(&mut self, index: u64) -> Result<Key, SortError> {
        let location = RecordLocation::of(index);
        let block = self.resolve(location.block_id)?;
        Ok(block.key_at(location.offset))
    }

    /// Returns the record at `index`.
    pub fn read_record(&mut self, index: u64) -> Result<Record, SortError> {
        let location = RecordLocation::of(index);
        let block = self.resolve(location.block_id)?;
        Ok(block.record_at(location.offset))
    }

    /// Overwrites the record at `index`, marking its block dirty.
    pub fn write_record(&mut self, index: u64, record: &Record) -> Result<(), SortError> {
        let location = RecordLocation::of(index);
        let block = self.resolve(location.block_id)?;
        block.put_record(location.offset, record);
        Ok(())
    }

    /// Evicts all resident blocks writing dirty ones back to the file.
    pub fn flush(&mut self) -> Result<(), SortError> {
        let resident = self.blocks.len();
        while let Some((_, block)) = self.blocks.evict_least_recent() {
            self.write_back(block)?;
        }

        log::debug!("block cache flushed ({} blocks evicted)", resident);
        return Ok(());
    }

    /// Releases the backing file. Resident blocks are dropped without being written back,
    /// so [`BlockCache::flush`] has to be called first to keep pending writes.
    pub fn close(self) -> Result<(), SortError> {
        let mut file = self.into_inner();
        file.flush()?;
        Ok(())
    }

    /// Returns the backing file, dropping resident blocks.
    pub fn into_inner(self) -> F {
        let dirty = self
            .blocks
            .iter_ids()
            .filter(|id| self.blocks.get(*id).map_or(false, Block::is_dirty))
            .count();
        if dirty > 0 {
            log::warn!("releasing backing file with {} unflushed dirty blocks", dirty);
        }

        self.file
    }

    /// Makes the block resident and returns it.
    fn resolve(&mut self, block_id: BlockId) -> Result<&mut Block, SortError> {
        if self.blocks.promote(block_id) {
            self.stats.record_hit();
        } else {
            if self.blocks.len() >= self.capacity {
                if let Some((_, victim)) = self.blocks.evict_least_recent() {
                    self.write_back(victim)?;
                }
            }
            let block = self.load(block_id)?;
            self.blocks.insert_most_recent(block_id, block);
        }

        self.blocks
            .get_mut(block_id)
            .ok_or_else(|| SortError::IO(io::Error::new(io::ErrorKind::Other, "resolved block is not resident")))
    }

    fn load(&mut self, block_id: BlockId) -> Result<Block, SortError> {
        let mut block = Block::empty(block_id);
        let offset = block_offset(block_id);

        if offset < self.extent {
            let len = (self.extent - offset).min(BLOCK_SIZE as u64) as usize;
            self.file.seek(SeekFrom::Start(offset))?;
            self.file.read_exact(&mut block.buffer_mut()[..len])?;
            block.set_len(len);
        }

        self.stats.record_read();
        log::trace!("block {} loaded ({} bytes)", block_id, block.len());

        return Ok(block);
    }

    fn write_back(&mut self, mut block: Block) -> Result<(), SortError> {
        if !block.is_dirty() {
            log::trace!("block {} evicted", block.id());
            return Ok(());
        }

        let offset = block_offset(block.id());
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(block.backed_bytes())?;
        block.mark_clean();

        self.extent = self.extent.max(offset + block.len() as u64);
        self.stats.record_write();
        log::trace!("block {} written back ({} bytes)", block.id(), block.len());

        return Ok(());
    }
}
