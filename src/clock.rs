//! Injectable time and randomness
//!
//! Conversions are pure apart from timestamps and the random segment of
//! document identifiers. Both come from these traits so tests can pin them.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Upper bound (exclusive) of the random identifier segment
pub const RANDOM_SEGMENT_MAX: u32 = 0xFF_FFFF;

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

pub trait RandomSource {
    /// A value in `0..RANDOM_SEGMENT_MAX`
    fn next_segment(&mut self) -> u32;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always reports the same instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Clock pinned to `secs` seconds after the Unix epoch
    pub fn at_epoch_secs(secs: i64) -> Self {
        FixedClock(DateTime::from_timestamp(secs, 0).unwrap_or_default())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Random segments backed by an OS-seeded generator
#[derive(Debug)]
pub struct ThreadRandom(StdRng);

impl Default for ThreadRandom {
    fn default() -> Self {
        ThreadRandom(StdRng::from_entropy())
    }
}

impl RandomSource for ThreadRandom {
    fn next_segment(&mut self) -> u32 {
        self.0.gen_range(0..RANDOM_SEGMENT_MAX)
    }
}

/// Reproducible random segments
#[derive(Debug, Clone)]
pub struct SeededRandom(StdRng);

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        SeededRandom(StdRng::seed_from_u64(seed))
    }
}

impl RandomSource for SeededRandom {
    fn next_segment(&mut self) -> u32 {
        self.0.gen_range(0..RANDOM_SEGMENT_MAX)
    }
}

/// Returns the same segment every time
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub u32);

impl RandomSource for FixedRandom {
    fn next_segment(&mut self) -> u32 {
        self.0 % RANDOM_SEGMENT_MAX
    }
}

/// Build a document identifier: hex seconds, 6 hex random digits, 6 hex index digits
pub fn object_id(now: DateTime<Utc>, random: u32, index: usize) -> String {
    format!("{:x}{:06x}{:06x}", now.timestamp().max(0), random, index)
}
