use std::{collections::HashMap, num::NonZeroUsize, sync::Arc, sync::Mutex, time::Duration};

use alloy_primitives::{Address, B256};
use daoscan_chain::{
    BlockHeader, BlockTimestampCache, BlockTimestampCacheOptions, CallRequest, CallResult,
    ChainReader, ChainReaderError, LogFilter, RawLog,
};
use daoscan_common::ChainId;
use daoscan_storage::EntityStore;
use error_stack::{Report, Result};

struct StubReader {
    chain_id: ChainId,
    latest: Mutex<BlockHeader>,
    blocks: Mutex<HashMap<u64, u64>>,
    fail_historical: bool,
}

impl StubReader {
    fn new(chain_id: ChainId, latest: BlockHeader) -> Self {
        Self {
            chain_id,
            latest: Mutex::new(latest),
            blocks: Mutex::new(HashMap::new()),
            fail_historical: false,
        }
    }

    fn with_block(self, number: u64, timestamp: u64) -> Self {
        self.blocks.lock().unwrap().insert(number, timestamp);
        self
    }

    fn set_latest(&self, latest: BlockHeader) {
        *self.latest.lock().unwrap() = latest;
    }
}

#[async_trait::async_trait]
impl ChainReader for StubReader {
    fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    async fn multicall(
        &self,
        _calls: Vec<CallRequest>,
        _at_block: Option<u64>,
    ) -> Result<Vec<CallResult>, ChainReaderError> {
        Ok(Vec::new())
    }

    async fn get_block(&self, number: Option<u64>) -> Result<BlockHeader, ChainReaderError> {
        match number {
            None => Ok(*self.latest.lock().unwrap()),
            Some(number) => {
                if self.fail_historical {
                    return Err(Report::new(ChainReaderError::Request));
                }
                self.blocks
                    .lock()
                    .unwrap()
                    .get(&number)
                    .map(|timestamp| BlockHeader {
                        number,
                        timestamp: *timestamp,
                    })
                    .ok_or_else(|| Report::new(ChainReaderError::NotFound))
            }
        }
    }

    async fn get_storage_at(
        &self,
        _address: Address,
        _slot: B256,
    ) -> Result<B256, ChainReaderError> {
        Err(Report::new(ChainReaderError::NotFound))
    }

    async fn get_logs(&self, _filter: &LogFilter) -> Result<Vec<RawLog>, ChainReaderError> {
        Ok(Vec::new())
    }
}

const LATEST_TS: u64 = 1_700_000_000;

fn mainnet_reader() -> StubReader {
    // 12s average: 1000 blocks back is 12_000 seconds earlier.
    StubReader::new(
        ChainId::MAINNET,
        BlockHeader {
            number: 1_000_000,
            timestamp: LATEST_TS,
        },
    )
    .with_block(999_000, LATEST_TS - 12_000)
}

fn options(ttl: Duration) -> BlockTimestampCacheOptions {
    BlockTimestampCacheOptions {
        ttl,
        capacity: NonZeroUsize::new(64).unwrap(),
        sample_distance: 1000,
    }
}

#[tokio::test]
async fn future_block_is_estimated_from_average_block_time() {
    let store = EntityStore::in_memory().unwrap();
    let reader = Arc::new(mainnet_reader());
    let cache = BlockTimestampCache::new(
        reader,
        store.clone(),
        options(Duration::from_secs(24 * 60 * 60)),
    );

    let timestamp = cache.resolve(9_999_999).await.unwrap();
    assert_eq!(timestamp, LATEST_TS + 12 * 8_999_999);

    let row = store
        .find_block_timestamp(ChainId::MAINNET, 9_999_999)
        .unwrap()
        .unwrap();
    assert!(row.future);
    assert_eq!(row.timestamp, Some(timestamp));
}

#[tokio::test]
async fn future_estimate_is_recomputed_after_ttl() {
    let store = EntityStore::in_memory().unwrap();
    let reader = Arc::new(mainnet_reader());
    // Zero TTL: every future estimate is already stale.
    let cache = BlockTimestampCache::new(reader.clone(), store, options(Duration::ZERO));

    let first = cache.resolve(9_999_999).await.unwrap();
    assert_eq!(first, LATEST_TS + 12 * 8_999_999);

    // The chain advanced; a stale estimate must not be served.
    reader.set_latest(BlockHeader {
        number: 2_000_000,
        timestamp: LATEST_TS + 600_000,
    });
    reader
        .blocks
        .lock()
        .unwrap()
        .insert(1_999_000, LATEST_TS + 600_000 - 12_000);

    let second = cache.resolve(9_999_999).await.unwrap();
    assert_eq!(second, LATEST_TS + 600_000 + 12 * 7_999_999);
    assert_ne!(first, second);
}

#[tokio::test]
async fn far_future_estimate_saturates_instead_of_wrapping() {
    let store = EntityStore::in_memory().unwrap();
    let reader = Arc::new(mainnet_reader());
    let cache = BlockTimestampCache::new(
        reader,
        store,
        options(Duration::from_secs(24 * 60 * 60)),
    );

    // An absurd block number must clamp to the far future, not wrap
    // around into the past.
    let timestamp = cache.resolve(u64::MAX).await.unwrap();
    assert_eq!(timestamp, u64::MAX);
}

#[tokio::test]
async fn historical_block_is_cached_permanently() {
    let store = EntityStore::in_memory().unwrap();
    let reader = Arc::new(mainnet_reader().with_block(500, 42_000));
    let cache = BlockTimestampCache::new(reader.clone(), store, options(Duration::ZERO));

    assert_eq!(cache.resolve(500).await.unwrap(), 42_000);

    // Even with a zero TTL and a mutated source, the exact entry is
    // served from cache: historical blocks never change.
    reader.blocks.lock().unwrap().insert(500, 1);
    assert_eq!(cache.resolve(500).await.unwrap(), 42_000);
}

#[tokio::test]
async fn average_block_time_falls_back_to_chain_default() {
    let store = EntityStore::in_memory().unwrap();
    let mut reader = StubReader::new(
        ChainId::BASE,
        BlockHeader {
            number: 1_000_000,
            timestamp: LATEST_TS,
        },
    );
    reader.fail_historical = true;
    let cache = BlockTimestampCache::new(
        Arc::new(reader),
        store,
        options(Duration::from_secs(24 * 60 * 60)),
    );

    // Sampling fails, so the Base default of 2s is used.
    let timestamp = cache.resolve(1_000_010).await.unwrap();
    assert_eq!(timestamp, LATEST_TS + 2 * 10);
}
