//! External quicksort.

use log;
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::io;
use std::io::prelude::*;
use std::io::SeekFrom;
use std::time::Instant;

use crate::cache::BlockCache;
use crate::codec::{Key, RECORD_SIZE};
use crate::stats::{RunStatistics, StatsCollector};

/// Default maximum range length sorted by insertion sort.
pub const DEFAULT_INSERTION_THRESHOLD: usize = 10;
/// Smallest accepted insertion sort threshold.
pub const MIN_INSERTION_THRESHOLD: usize = 3;

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// Common I/O error.
    IO(io::Error),
    /// Cache capacity is not positive.
    InvalidCapacity(usize),
    /// Insertion sort threshold is too small.
    InvalidThreshold(usize),
    /// File length is not a multiple of the record size.
    MalformedLength(u64),
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self {
            SortError::IO(err) => Some(err),
            _ => None,
        }
    }
}

impl Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::IO(err) => write!(f, "I/O operation failed: {}", err),
            SortError::InvalidCapacity(capacity) => write!(f, "invalid cache capacity: {} blocks", capacity),
            SortError::InvalidThreshold(threshold) => write!(
                f,
                "invalid insertion sort threshold: {} (minimum is {})",
                threshold, MIN_INSERTION_THRESHOLD
            ),
            SortError::MalformedLength(len) => write!(
                f,
                "file length {} is not a multiple of the record size {}",
                len, RECORD_SIZE
            ),
        }
    }
}

impl From<io::Error> for SortError {
    fn from(err: io::Error) -> Self {
        SortError::IO(err)
    }
}

/// Hybrid quicksort over logical record indices.
/// Knows nothing about blocks: every key read and record swap goes through the block cache.
pub struct Quicksort<'c, F, S = RunStatistics>
where
    F: Read + Write + Seek,
    S: StatsCollector,
{
    cache: &'c mut BlockCache<F, S>,
    insertion_threshold: usize,
    swaps: u64,
}

impl<'c, F, S> Quicksort<'c, F, S>
where
    F: Read + Write + Seek,
    S: StatsCollector,
{
    /// Creates a sort engine over the cache.
    ///
    /// # Arguments
    /// * `cache` - Block cache all record accesses go through
    /// * `insertion_threshold` - Ranges of at most this many records are sorted by insertion sort
    pub fn new(cache: &'c mut BlockCache<F, S>, insertion_threshold: usize) -> Self {
        Quicksort {
            cache,
            insertion_threshold: insertion_threshold.max(MIN_INSERTION_THRESHOLD),
            swaps: 0,
        }
    }

    /// Returns the number of swaps that changed the file content.
    pub fn swaps(&self) -> u64 {
        self.swaps
    }

    /// Sorts all records of the backing file.
    pub fn sort_all(&mut self) -> Result<(), SortError> {
        let count = self.cache.record_count();
        if count > 1 {
            self.sort_range(0, count - 1)?;
        }
        Ok(())
    }

    /// Sorts records in the inclusive index range `[lo, hi]`.
    ///
    /// The smaller partition is sorted recursively and the larger one iteratively,
    /// so the recursion depth stays logarithmic.
    pub fn sort_range(&mut self, mut lo: u64, mut hi: u64) -> Result<(), SortError> {
        while lo < hi {
            if hi - lo + 1 <= self.insertion_threshold as u64 {
                return self.insertion_sort(lo, hi);
            }

            let pivot = self.median_of_three(lo, hi)?;
            let (lt, gt) = self.partition(lo, hi, pivot)?;

            // [lo, lt) is less than the pivot, [gt, hi] is greater
            let left_len = lt - lo;
            let right_len = hi + 1 - gt;
            if left_len < right_len {
                if left_len > 1 {
                    self.sort_range(lo, lt - 1)?;
                }
                lo = gt;
            } else {
                if right_len > 1 {
                    self.sort_range(gt, hi)?;
                }
                if lt == lo {
                    return Ok(());
                }
                hi = lt - 1;
            }
        }

        return Ok(());
    }

    /// Three-way partition of `[lo, hi]` around `pivot`.
    /// Returns `(lt, gt)` such that `[lo, lt)` < pivot, `[lt, gt)` == pivot, `[gt, hi]` > pivot.
    fn partition(&mut self, lo: u64, hi: u64, pivot: Key) -> Result<(u64, u64), SortError> {
        let mut lt = lo;
        let mut cur = lo;
        let mut gt = hi + 1;

        while cur < gt {
            let key = self.cache.read_key(cur)?;
            if key < pivot {
                self.swap(lt, cur)?;
                lt += 1;
                cur += 1;
            } else if key > pivot {
                gt -= 1;
                self.swap(cur, gt)?;
            } else {
                cur += 1;
            }
        }

        return Ok((lt, gt));
    }

    /// Picks the median key of the first, middle and last records.
    /// Ties resolve to the first candidate in first, middle, last order.
    fn median_of_three(&mut self, lo: u64, hi: u64) -> Result<Key, SortError> {
        let first = self.cache.read_key(lo)?;
        let middle = self.cache.read_key(lo + (hi - lo) / 2)?;
        let last = self.cache.read_key(hi)?;

        let is_median =
            |candidate: Key, a: Key, b: Key| (a <= candidate && candidate <= b) || (b <= candidate && candidate <= a);

        let pivot = if is_median(first, middle, last) {
            first
        } else if is_median(middle, first, last) {
            middle
        } else {
            last
        };

        return Ok(pivot);
    }

    fn insertion_sort(&mut self, lo: u64, hi: u64) -> Result<(), SortError> {
        for i in lo + 1..=hi {
            let mut j = i;
            while j > lo && self.cache.read_key(j - 1)? > self.cache.read_key(j)? {
                self.swap(j - 1, j)?;
                j -= 1;
            }
        }

        return Ok(());
    }

    /// Exchanges two records. Identical records are left untouched to keep their blocks clean.
    fn swap(&mut self, i: u64, j: u64) -> Result<(), SortError> {
        if i == j {
            return Ok(());
        }

        let left = self.cache.read_record(i)?;
        let right = self.cache.read_record(j)?;
        if left != right {
            self.cache.write_record(i, &right)?;
            self.cache.write_record(j, &left)?;
            self.swaps += 1;
        }

        return Ok(());
    }
}

/// External quicksort builder. Provides methods for [`ExternalQuicksort`] initialization.
#[derive(Debug, Clone)]
pub struct ExternalQuicksortBuilder {
    /// Number of blocks the cache keeps in memory.
    cache_blocks: usize,
    /// Maximum range length sorted by insertion sort.
    insertion_threshold: usize,
}

impl ExternalQuicksortBuilder {
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        ExternalQuicksortBuilder::default()
    }

    /// Builds an [`ExternalQuicksort`] instance using provided configuration.
    pub fn build(self) -> Result<ExternalQuicksort, SortError> {
        ExternalQuicksort::new(self.cache_blocks, self.insertion_threshold)
    }

    /// Sets number of blocks the cache keeps in memory.
    pub fn with_cache_blocks(mut self, cache_blocks: usize) -> ExternalQuicksortBuilder {
        self.cache_blocks = cache_blocks;
        return self;
    }

    /// Sets maximum range length sorted by insertion sort.
    pub fn with_insertion_threshold(mut self, insertion_threshold: usize) -> ExternalQuicksortBuilder {
        self.insertion_threshold = insertion_threshold;
        return self;
    }
}

impl Default for ExternalQuicksortBuilder {
    fn default() -> Self {
        ExternalQuicksortBuilder {
            cache_blocks: 1,
            insertion_threshold: DEFAULT_INSERTION_THRESHOLD,
        }
    }
}

/// External quicksort. Sorts a file of fixed-width records in place.
#[derive(Debug, Clone)]
pub struct ExternalQuicksort {
    cache_blocks: usize,
    insertion_threshold: usize,
}

impl ExternalQuicksort {
    /// Creates a new sorter instance.
    ///
    /// # Arguments
    /// * `cache_blocks` - Number of blocks the cache keeps in memory, must be positive.
    /// * `insertion_threshold` - Maximum range length sorted by insertion sort, at least
    ///   [`MIN_INSERTION_THRESHOLD`].
    pub fn new(cache_blocks: usize, insertion_threshold: usize) -> Result<Self, SortError> {
        if cache_blocks == 0 {
            return Err(SortError::InvalidCapacity(cache_blocks));
        }
        if insertion_threshold < MIN_INSERTION_THRESHOLD {
            return Err(SortError::InvalidThreshold(insertion_threshold));
        }

        return Ok(ExternalQuicksort {
            cache_blocks,
            insertion_threshold,
        });
    }

    /// Sorts the file in place and closes it.
    /// Returns the run statistics.
    ///
    /// # Arguments
    /// * `file` - File to be sorted
    pub fn sort<F>(&self, file: F) -> Result<RunStatistics, SortError>
    where
        F: Read + Write + Seek,
    {
        let mut stats = RunStatistics::new();
        self.sort_with_stats(file, &mut stats)?;
        Ok(stats)
    }

    /// Sorts the file in place and closes it, reporting to a custom statistics collector.
    ///
    /// # Arguments
    /// * `file` - File to be sorted
    /// * `stats` - Statistics collector
    pub fn sort_with_stats<F, S>(&self, mut file: F, stats: S) -> Result<(), SortError>
    where
        F: Read + Write + Seek,
        S: StatsCollector,
    {
        let len = file.seek(SeekFrom::End(0))?;
        if len % RECORD_SIZE as u64 != 0 {
            return Err(SortError::MalformedLength(len));
        }

        let started = Instant::now();
        let mut cache = BlockCache::with_stats(file, self.cache_blocks, stats)?;
        log::info!(
            "sorting {} records (cache: {} blocks, insertion threshold: {})",
            cache.record_count(),
            self.cache_blocks,
            self.insertion_threshold
        );

        let mut engine = Quicksort::new(&mut cache, self.insertion_threshold);
        engine.sort_all()?;
        log::debug!("sort done ({} swaps), flushing cache", engine.swaps());

        cache.flush()?;
        cache.stats_mut().set_elapsed(started.elapsed());
        log::info!(
            "sort finished (hits: {}, reads: {}, writes: {}, elapsed: {:?})",
            cache.stats().hits(),
            cache.stats().reads(),
            cache.stats().writes(),
            cache.stats().elapsed()
        );

        cache.close()
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;
    use std::io::{Cursor, Write};

    use rand::prelude::*;
    use rstest::*;

    use super::{ExternalQuicksort, ExternalQuicksortBuilder, Quicksort, SortError};
    use crate::cache::BlockCache;
    use crate::codec::{extract_key, RECORDS_PER_BLOCK, RECORD_SIZE};
    use crate::stats::{RunStatistics, StatsCollector};

    fn encode(records: &[(i16, u16)]) -> Vec<u8> {
        let mut data = Vec::with_capacity(records.len() * RECORD_SIZE);
        for (key, payload) in records {
            data.extend_from_slice(&key.to_be_bytes());
            data.extend_from_slice(&payload.to_be_bytes());
        }
        data
    }

    fn keys(data: &[u8]) -> Vec<i16> {
        (0..data.len()).step_by(RECORD_SIZE).map(|at| extract_key(data, at)).collect()
    }

    fn record_counts(data: &[u8]) -> HashMap<&[u8], usize> {
        let mut counts = HashMap::new();
        for record in data.chunks(RECORD_SIZE) {
            *counts.entry(record).or_insert(0) += 1;
        }
        counts
    }

    fn sort_in_memory(data: Vec<u8>, cache_blocks: usize, threshold: usize) -> (Vec<u8>, RunStatistics) {
        let sorter = ExternalQuicksortBuilder::new()
            .with_cache_blocks(cache_blocks)
            .with_insertion_threshold(threshold)
            .build()
            .unwrap();

        let mut file = Cursor::new(data);
        let stats = sorter.sort(&mut file).unwrap();
        (file.into_inner(), stats)
    }

    #[fixture]
    fn random_records() -> Vec<(i16, u16)> {
        let mut rng = StdRng::seed_from_u64(42);
        (0..5 * RECORDS_PER_BLOCK + 17).map(|_| (rng.gen(), rng.gen())).collect()
    }

    #[test]
    fn test_three_records_single_block() {
        let input = encode(&[(5, 0xaaaa), (1, 0xbbbb), (3, 0xcccc)]);
        let (output, stats) = sort_in_memory(input, 1, 10);

        assert_eq!(keys(&output), vec![1, 3, 5]);
        assert_eq!(output, encode(&[(1, 0xbbbb), (3, 0xcccc), (5, 0xaaaa)]));
        assert_eq!(stats.reads(), 1);
        assert_eq!(stats.writes(), 1);
        assert!(stats.hits() > 0);
    }

    #[test]
    fn test_equal_keys_untouched() {
        let input = encode(&[(7, 1), (7, 2), (7, 3), (7, 4), (7, 5)]);

        let mut cache = BlockCache::new(Cursor::new(input.clone()), 1).unwrap();
        let mut engine = Quicksort::new(&mut cache, 3);
        engine.sort_all().unwrap();
        assert_eq!(engine.swaps(), 0);

        cache.flush().unwrap();
        assert_eq!(cache.stats().writes(), 0);
        assert_eq!(cache.into_inner().into_inner(), input);
    }

    #[rstest]
    #[case(1, 3)]
    #[case(2, 10)]
    #[case(3, 4)]
    #[case(8, 10)]
    fn test_random_records(random_records: Vec<(i16, u16)>, #[case] cache_blocks: usize, #[case] threshold: usize) {
        let input = encode(&random_records);
        let (output, stats) = sort_in_memory(input.clone(), cache_blocks, threshold);

        let sorted_keys = keys(&output);
        assert!(sorted_keys.windows(2).all(|pair| pair[0] <= pair[1]));
        assert_eq!(record_counts(&output), record_counts(&input));
        assert_eq!(output.len(), input.len());
        assert!(stats.reads() >= 6);
        if cache_blocks >= 6 {
            // everything fits: each block is loaded and written exactly once
            assert_eq!(stats.reads(), 6);
            assert_eq!(stats.writes(), 6);
        }
    }

    #[rstest]
    #[case::sorted((0..3000).map(|i| i as i16).collect())]
    #[case::reversed((0..3000).rev().map(|i| i as i16).collect())]
    #[case::few_distinct((0..3000).map(|i| (i % 3) as i16).collect())]
    #[case::negative((0..3000).map(|i| (1500 - i) as i16 * 7).collect())]
    #[case::organ_pipe((0..3000).map(|i: i32| (1500 - (i - 1500).abs()) as i16).collect())]
    fn test_key_distributions(#[case] input_keys: Vec<i16>) {
        let records: Vec<(i16, u16)> = input_keys.iter().enumerate().map(|(i, k)| (*k, i as u16)).collect();
        let (output, _) = sort_in_memory(encode(&records), 2, 10);

        let mut expected_keys = input_keys.clone();
        expected_keys.sort();
        assert_eq!(keys(&output), expected_keys);
    }

    #[rstest]
    #[case(vec![])]
    #[case(vec![(4, 4)])]
    #[case(vec![(2, 0), (1, 0)])]
    fn test_tiny_files(#[case] records: Vec<(i16, u16)>) {
        let (output, _) = sort_in_memory(encode(&records), 1, 10);

        let mut expected = records.clone();
        expected.sort();
        assert_eq!(output, encode(&expected));
    }

    #[test]
    fn test_median_of_three() {
        let input = encode(&[(3, 0), (9, 0), (9, 0), (1, 0), (5, 0)]);
        let mut cache = BlockCache::new(Cursor::new(input), 1).unwrap();
        let mut engine = Quicksort::new(&mut cache, 3);

        // first, middle, last = 3, 9, 5
        assert_eq!(engine.median_of_three(0, 4).unwrap(), 5);
        // first, middle, last = 9, 9, 1: first candidate wins the tie
        assert_eq!(engine.median_of_three(1, 3).unwrap(), 9);
        // first, middle, last = 9, 1, 5
        assert_eq!(engine.median_of_three(2, 4).unwrap(), 5);
    }

    #[test]
    fn test_partition_zones() {
        let input = encode(&[(4, 0), (8, 0), (4, 1), (1, 0), (9, 0), (4, 2), (2, 0)]);
        let mut cache = BlockCache::new(Cursor::new(input), 1).unwrap();
        let mut engine = Quicksort::new(&mut cache, 3);

        let (lt, gt) = engine.partition(0, 6, 4).unwrap();
        assert_eq!((lt, gt), (2, 5));

        let partitioned: Vec<i16> = (0..7).map(|i| cache.read_key(i).unwrap()).collect();
        assert!(partitioned[..2].iter().all(|k| *k < 4));
        assert!(partitioned[2..5].iter().all(|k| *k == 4));
        assert!(partitioned[5..].iter().all(|k| *k > 4));
    }

    #[test]
    fn test_real_file() {
        let mut tmp_file = tempfile::tempfile_in("./").unwrap();
        let records: Vec<(i16, u16)> = (0..2500).map(|i| ((i * 7919 % 2500) as i16, i as u16)).collect();
        tmp_file.write_all(&encode(&records)).unwrap();

        let sorter = ExternalQuicksort::new(2, 10).unwrap();
        sorter.sort(tmp_file.try_clone().unwrap()).unwrap();

        let mut cache = BlockCache::new(tmp_file, 1).unwrap();
        let sorted: Vec<i16> = (0..2500).map(|i| cache.read_key(i).unwrap()).collect();
        assert_eq!(sorted, (0..2500).map(|i| i as i16).collect::<Vec<_>>());
    }

    #[rstest]
    #[case(0, 10)]
    #[case(4, 2)]
    fn test_invalid_configuration(#[case] cache_blocks: usize, #[case] threshold: usize) {
        let result = ExternalQuicksortBuilder::new()
            .with_cache_blocks(cache_blocks)
            .with_insertion_threshold(threshold)
            .build();

        match result {
            Err(SortError::InvalidCapacity(value)) => assert_eq!(value, cache_blocks),
            Err(SortError::InvalidThreshold(value)) => assert_eq!(value, threshold),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_length() {
        let sorter = ExternalQuicksort::new(1, 10).unwrap();
        let mut file = Cursor::new(vec![0u8; 10]);

        let err = sorter.sort(&mut file).unwrap_err();
        assert!(matches!(err, SortError::MalformedLength(10)));
        assert_eq!(err.to_string(), "file length 10 is not a multiple of the record size 4");
        assert_eq!(file.into_inner(), vec![0u8; 10]);
    }
}
