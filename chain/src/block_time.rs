use std::{
    num::NonZeroUsize,
    sync::{Arc, Mutex},
    time::{Duration, SystemTime},
};

use daoscan_storage::{BlockTimestampPatch, EntityStore};
use error_stack::{Result, ResultExt};
use lru::LruCache;
use tracing::{debug, warn};

use crate::{reader::ChainReader, ChainReaderError};

#[derive(Debug, Clone)]
pub struct BlockTimestampCacheOptions {
    /// How long a future-block estimate (and the sampled average block
    /// time) stays valid.
    pub ttl: Duration,
    /// Bound on the in-memory cache.
    pub capacity: NonZeroUsize,
    /// How many blocks to sample when computing the average block time.
    pub sample_distance: u64,
}

impl Default for BlockTimestampCacheOptions {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 60 * 60),
            capacity: NonZeroUsize::new(16 * 1024).expect("nonzero"),
            sample_distance: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedTimestamp {
    timestamp: u64,
    future: bool,
    updated_at: u64,
}

#[derive(Debug, Clone, Copy)]
struct AverageBlockTime {
    seconds: u64,
    computed_at: u64,
}

/// Memoized (block number → timestamp) resolution for one chain.
///
/// Historical blocks are cached permanently, in memory and in the store.
/// Future blocks are estimated from the average block time and marked
/// stale after the TTL.
pub struct BlockTimestampCache {
    reader: Arc<dyn ChainReader>,
    store: EntityStore,
    options: BlockTimestampCacheOptions,
    cache: Mutex<LruCache<u64, CachedTimestamp>>,
    average: Mutex<Option<AverageBlockTime>>,
}

impl BlockTimestampCache {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        store: EntityStore,
        options: BlockTimestampCacheOptions,
    ) -> Self {
        let cache = Mutex::new(LruCache::new(options.capacity));
        Self {
            reader,
            store,
            options,
            cache,
            average: Mutex::new(None),
        }
    }

    /// Resolve the timestamp of a block, estimating blocks past the head.
    pub async fn resolve(&self, block_number: u64) -> Result<u64, ChainReaderError> {
        let now = unix_now();

        if let Some(entry) = self.cached(block_number) {
            if self.is_fresh(&entry, now) {
                return Ok(entry.timestamp);
            }
        }

        if let Some(row) = self
            .store
            .find_block_timestamp(self.reader.chain_id(), block_number)
            .change_context(ChainReaderError::Request)
            .attach_printable("failed to read block timestamp row")?
        {
            if let Some(timestamp) = row.timestamp {
                let entry = CachedTimestamp {
                    timestamp,
                    future: row.future,
                    updated_at: row.updated_at,
                };
                if self.is_fresh(&entry, now) {
                    self.remember(block_number, entry);
                    return Ok(timestamp);
                }
            }
        }

        let latest = self.reader.get_block(None).await?;

        let (timestamp, future) = if block_number <= latest.number {
            let header = self.reader.get_block(Some(block_number)).await?;
            (header.timestamp, false)
        } else {
            let average = self.average_block_time(&latest, now).await;
            let estimate = latest
                .timestamp
                .saturating_add(average.saturating_mul(block_number - latest.number));
            debug!(
                block_number,
                latest = latest.number,
                average,
                "estimated future block timestamp"
            );
            (estimate, true)
        };

        let patch = BlockTimestampPatch {
            timestamp: Some(timestamp),
            future: Some(future),
            updated_at: Some(now),
        };
        self.store
            .upsert_block_timestamp(self.reader.chain_id(), block_number, &patch, &patch)
            .change_context(ChainReaderError::Request)
            .attach_printable("failed to persist block timestamp")?;

        self.remember(
            block_number,
            CachedTimestamp {
                timestamp,
                future,
                updated_at: now,
            },
        );

        Ok(timestamp)
    }

    /// Average seconds per block, sampled over `sample_distance` blocks
    /// and cached with the TTL. Falls back to the chain's hardcoded
    /// default when sampling fails.
    async fn average_block_time(&self, latest: &crate::BlockHeader, now: u64) -> u64 {
        {
            let cached = self.average.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(average) = *cached {
                if now.saturating_sub(average.computed_at) < self.options.ttl.as_secs() {
                    return average.seconds;
                }
            }
        }

        let seconds = match self.sample_block_time(latest).await {
            Ok(seconds) => seconds,
            Err(err) => {
                let fallback = self.reader.chain_id().default_block_time();
                warn!(error = ?err, fallback, "failed to sample average block time");
                fallback
            }
        };

        let mut cached = self.average.lock().unwrap_or_else(|e| e.into_inner());
        *cached = Some(AverageBlockTime {
            seconds,
            computed_at: now,
        });
        seconds
    }

    async fn sample_block_time(
        &self,
        latest: &crate::BlockHeader,
    ) -> Result<u64, ChainReaderError> {
        let distance = self.options.sample_distance.min(latest.number);
        if distance == 0 {
            return Ok(self.reader.chain_id().default_block_time());
        }
        let earlier = self.reader.get_block(Some(latest.number - distance)).await?;
        Ok(latest.timestamp.saturating_sub(earlier.timestamp) / distance)
    }

    fn is_fresh(&self, entry: &CachedTimestamp, now: u64) -> bool {
        !entry.future || now.saturating_sub(entry.updated_at) < self.options.ttl.as_secs()
    }

    fn cached(&self, block_number: u64) -> Option<CachedTimestamp> {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.get(&block_number).copied()
    }

    fn remember(&self, block_number: u64, entry: CachedTimestamp) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.put(block_number, entry);
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
