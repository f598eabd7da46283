use std::sync::Arc;

use alloy_primitives::B256;
use daoscan_chain::ChainReader;
use daoscan_storage::EntityStore;
use tracing::{debug, warn};

use crate::{
    correlation::TxCorrelation,
    envelope::EventEnvelope,
    events::decode_event,
    factory::FactoryResolver,
    handlers::{self, HandlerContext},
    watchlist::{WatchedContract, Watchlist},
};

/// Applies batches of decoded events to the entity store.
///
/// Failures are isolated per event: a decode or handler failure is
/// logged and skipped, and the rest of the batch proceeds. Handlers are
/// idempotent, so a crashed batch can simply be replayed.
pub struct EventDispatcher {
    store: EntityStore,
    watchlist: Arc<Watchlist>,
}

impl EventDispatcher {
    pub fn new(store: EntityStore, watchlist: Arc<Watchlist>) -> Self {
        Self { store, watchlist }
    }

    pub fn watchlist(&self) -> &Watchlist {
        &self.watchlist
    }

    /// Apply one batch of envelopes, in order.
    ///
    /// Envelopes must arrive in block/log order so that events of one
    /// transaction are contiguous; the correlation context lives exactly
    /// as long as the transaction's events.
    pub async fn apply(&self, reader: &dyn ChainReader, batch: &[EventEnvelope]) {
        let mut correlation = TxCorrelation::default();
        let mut current_tx: Option<B256> = None;

        for envelope in batch {
            if current_tx != Some(envelope.transaction_hash) {
                correlation.reset();
                current_tx = Some(envelope.transaction_hash);
            }

            let event = match decode_event(envelope) {
                Ok(event) => event,
                Err(err) => {
                    warn!(
                        contract = %envelope.contract_name,
                        event = %envelope.event_name,
                        block = envelope.block_number,
                        error = ?err,
                        "failed to decode event, skipping"
                    );
                    continue;
                }
            };

            if let Some(child) = FactoryResolver::resolve(&event, envelope.block_number) {
                debug!(chain_id = %envelope.chain_id, address = %child.address, "watching factory child");
                self.watchlist.register(
                    envelope.chain_id,
                    child.address,
                    WatchedContract {
                        candidates: child.candidates,
                        start_block: child.start_block,
                    },
                );
            }

            let mut ctx = HandlerContext {
                reader,
                store: &self.store,
                correlation: &mut correlation,
                chain_id: envelope.chain_id,
                log_address: envelope.log_address,
                block_number: envelope.block_number,
                block_timestamp: envelope.block_timestamp,
                transaction_hash: envelope.transaction_hash,
            };
            if let Err(err) = handlers::dispatch(&mut ctx, event).await {
                warn!(
                    contract = %envelope.contract_name,
                    event = %envelope.event_name,
                    block = envelope.block_number,
                    error = ?err,
                    "event handler failed, skipping"
                );
            }
        }
    }
}
