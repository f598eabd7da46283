//! Proposal lifecycle state derivation.
//!
//! Indexed rows only record what happened; what a proposal *is* right
//! now depends on live data: the Safe's nonce, accumulated signatures,
//! and wall-clock position inside timelock windows. The
//! [`ProposalStateMachine`] combines both into a
//! [`FractalProposalState`] per proposal, multisig and Azorius alike.

mod machine;
mod source;
mod state;

use std::fmt;

pub use self::machine::{
    assign_live_state, AzoriusProposalState, DerivedProposalState, ProposalStateMachine,
};
pub use self::source::{SafeTransactionSource, SafeTxInfo, SourceError};
pub use self::state::FractalProposalState;

#[derive(Debug)]
pub enum ProposalStateError {
    /// A chain read the derivation depends on failed.
    ChainRead,
    /// A store read failed.
    Store,
    /// The derivation was cancelled before completing.
    Cancelled,
}

impl error_stack::Context for ProposalStateError {}

impl fmt::Display for ProposalStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProposalStateError::ChainRead => f.write_str("chain read failed"),
            ProposalStateError::Store => f.write_str("store operation failed"),
            ProposalStateError::Cancelled => f.write_str("state derivation cancelled"),
        }
    }
}
