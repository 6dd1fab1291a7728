//! Router state machine with validated transitions.
//!
//! Enforces the allowed transitions for the turn-routing lifecycle:
//! AwaitingIdentity -> Identified -> RoutedClinical -> Identified,
//! with self-loops for "ask again" and small talk.

use aftercare_core::error::AftercareError;
use aftercare_core::types::RouterState;

/// Validate that a router state transition is allowed.
///
/// Valid transitions:
/// - AwaitingIdentity -> AwaitingIdentity (no name found, ask again)
/// - AwaitingIdentity -> Identified (name resolved, record loaded)
/// - Identified -> Identified (small-talk turn)
/// - Identified -> RoutedClinical (clinical turn hand-off)
/// - RoutedClinical -> Identified (clinical turn completed)
pub fn validate_transition(from: RouterState, to: RouterState) -> Result<(), AftercareError> {
    let valid = matches!(
        (from, to),
        (RouterState::AwaitingIdentity, RouterState::AwaitingIdentity)
            | (RouterState::AwaitingIdentity, RouterState::Identified)
            | (RouterState::Identified, RouterState::Identified)
            | (RouterState::Identified, RouterState::RoutedClinical)
            | (RouterState::RoutedClinical, RouterState::Identified)
    );

    if valid {
        Ok(())
    } else {
        Err(AftercareError::Router(format!(
            "illegal transition {:?} -> {:?}",
            from, to
        )))
    }
}
