//! Event ingestion for DAO governance contracts.
//!
//! Decoded log envelopes flow through [`decode_event`] into typed
//! [`ContractEvent`]s, which the [`EventDispatcher`] routes to one
//! handler each. Handlers upsert entities through `daoscan-storage` and
//! resolve ownership through `daoscan-chain` reads; factory events grow
//! the shared [`Watchlist`].

mod correlation;
mod dispatcher;
mod envelope;
mod events;
mod factory;
mod handlers;
mod watchlist;

pub use self::correlation::TxCorrelation;
pub use self::dispatcher::EventDispatcher;
pub use self::envelope::EventEnvelope;
pub use self::events::{decode_event, ContractEvent, DecodeError};
pub use self::factory::{FactoryResolver, ResolvedChild};
pub use self::handlers::HandlerError;
pub use self::watchlist::{CandidateAbi, WatchedContract, Watchlist};
