use std::fmt;

use serde::Serialize;

/// Lifecycle state of a governance proposal.
///
/// The first six members mirror the on-chain Azorius `ProposalState`
/// enum in declaration order; `proposalState(id)` return values index
/// into them positionally. The remaining members only exist off-chain,
/// derived for multisig proposals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FractalProposalState {
    Active,
    Timelocked,
    Executable,
    Executed,
    Expired,
    Failed,
    Rejected,
    Timelockable,
    Module,
    Pending,
    Closed,
}

impl FractalProposalState {
    /// Map a raw `proposalState(id)` return value onto the shared prefix.
    /// Values past the contract enum yield `None`.
    pub fn from_azorius_state(state: u8) -> Option<Self> {
        use FractalProposalState::*;
        [Active, Timelocked, Executable, Executed, Expired, Failed]
            .get(state as usize)
            .copied()
    }

    /// Terminal states never change on replay or re-derivation.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FractalProposalState::Executed
                | FractalProposalState::Expired
                | FractalProposalState::Failed
                | FractalProposalState::Rejected
                | FractalProposalState::Closed
        )
    }
}

impl fmt::Display for FractalProposalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FractalProposalState::Active => "ACTIVE",
            FractalProposalState::Timelocked => "TIMELOCKED",
            FractalProposalState::Executable => "EXECUTABLE",
            FractalProposalState::Executed => "EXECUTED",
            FractalProposalState::Expired => "EXPIRED",
            FractalProposalState::Failed => "FAILED",
            FractalProposalState::Rejected => "REJECTED",
            FractalProposalState::Timelockable => "TIMELOCKABLE",
            FractalProposalState::Module => "MODULE",
            FractalProposalState::Pending => "PENDING",
            FractalProposalState::Closed => "CLOSED",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::FractalProposalState;

    #[test]
    fn azorius_states_map_positionally() {
        assert_eq!(
            FractalProposalState::from_azorius_state(0),
            Some(FractalProposalState::Active)
        );
        assert_eq!(
            FractalProposalState::from_azorius_state(1),
            Some(FractalProposalState::Timelocked)
        );
        assert_eq!(
            FractalProposalState::from_azorius_state(2),
            Some(FractalProposalState::Executable)
        );
        assert_eq!(
            FractalProposalState::from_azorius_state(3),
            Some(FractalProposalState::Executed)
        );
        assert_eq!(
            FractalProposalState::from_azorius_state(4),
            Some(FractalProposalState::Expired)
        );
        assert_eq!(
            FractalProposalState::from_azorius_state(5),
            Some(FractalProposalState::Failed)
        );
        assert_eq!(FractalProposalState::from_azorius_state(6), None);
        assert_eq!(FractalProposalState::from_azorius_state(u8::MAX), None);
    }

    #[test]
    fn off_chain_states_are_not_reachable_from_the_contract_enum() {
        for raw in 0..=u8::MAX {
            if let Some(state) = FractalProposalState::from_azorius_state(raw) {
                assert!(!matches!(
                    state,
                    FractalProposalState::Rejected
                        | FractalProposalState::Timelockable
                        | FractalProposalState::Module
                        | FractalProposalState::Pending
                        | FractalProposalState::Closed
                ));
            }
        }
    }
}
