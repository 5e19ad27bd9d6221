//! Sort run statistics.

use std::fmt;
use std::time::Duration;

/// Statistics collector interface. The block cache reports every cache hit, block load and block
/// write-back to it, the sorter reports the total run time.
pub trait StatsCollector {
    /// Registers an access to an already resident block.
    fn record_hit(&mut self);

    /// Registers a block load from the backing file.
    fn record_read(&mut self);

    /// Registers a block write-back to the backing file.
    fn record_write(&mut self);

    /// Sets the run wall time.
    fn set_elapsed(&mut self, elapsed: Duration);

    fn hits(&self) -> u64;

    fn reads(&self) -> u64;

    fn writes(&self) -> u64;

    fn elapsed(&self) -> Duration;
}

impl<S: StatsCollector + ?Sized> StatsCollector for &mut S {
    fn record_hit(&mut self) {
        (**self).record_hit()
    }

    fn record_read(&mut self) {
        (**self).record_read()
    }

    fn record_write(&mut self) {
        (**self).record_write()
    }

    fn set_elapsed(&mut self, elapsed: Duration) {
        (**self).set_elapsed(elapsed)
    }

    fn hits(&self) -> u64 {
        (**self).hits()
    }

    fn reads(&self) -> u64 {
        (**self).reads()
    }

    fn writes(&self) -> u64 {
        (**self).writes()
    }

    fn elapsed(&self) -> Duration {
        (**self).elapsed()
    }
}

/// Plain counters of a single sort run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStatistics {
    hits: u64,
    reads: u64,
    writes: u64,
    elapsed: Duration,
}

impl RunStatistics {
    pub fn new() -> Self {
        RunStatistics::default()
    }
}

impl StatsCollector for RunStatistics {
    fn record_hit(&mut self) {
        self.hits += 1;
    }

    fn record_read(&mut self) {
        self.reads += 1;
    }

    fn record_write(&mut self) {
        self.writes += 1;
    }

    fn set_elapsed(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
    }

    fn hits(&self) -> u64 {
        self.hits
    }

    fn reads(&self) -> u64 {
        self.reads
    }

    fn writes(&self) -> u64 {
        self.writes
    }

    fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

impl fmt::Display for RunStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Cache Hits: {}", self.hits)?;
        writeln!(f, "Disk reads: {}", self.reads)?;
        writeln!(f, "Disk writes: {}", self.writes)?;
        writeln!(f, "Time is {}", self.elapsed.as_millis())
    }
}
