use super::descriptor::{Propagation, TransactionDescriptor};
use crate::core::{Result, TxError};

/// What `begin` should do for one request, given the context's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Start a new physical transaction; the returned status governs it
    StartNew,

    /// Participate in the already-active physical transaction
    Join,

    /// Park the active physical transaction and start an independent one;
    /// the parked handle is remembered on the returned status
    SuspendAndStartNew,
}

/// Resolve a transaction request against the calling context's state.
///
/// Pure function of the descriptor and whether a physical transaction is
/// already active on the context; it never touches the context itself.
pub fn resolve(descriptor: &TransactionDescriptor, has_active: bool) -> Result<Decision> {
    match (descriptor.propagation_policy(), has_active) {
        (Propagation::Required, false) => Ok(Decision::StartNew),
        (Propagation::Required, true) => Ok(Decision::Join),
        (Propagation::RequiresNew, false) => Ok(Decision::StartNew),
        (Propagation::RequiresNew, true) => Ok(Decision::SuspendAndStartNew),
        (other, _) => Err(TxError::UnsupportedOperation(format!(
            "Propagation {other} is not implemented"
        ))),
    }
}
