/// Outcome a caller should request for a failed unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackDecision {
    /// Treat the failure as recovered; commit anyway
    Commit,

    /// Roll the transaction back
    Rollback,
}

/// Maps failure kinds to transaction outcomes.
///
/// The mapping is evaluated by the service layer around its unit of work;
/// the manager itself never inspects caller errors. This replaces
/// interceptor-style "which exceptions roll back" configuration with an
/// explicit object the caller owns and passes where it is needed.
pub trait RollbackPolicy<E> {
    fn decide(&self, error: &E) -> RollbackDecision;
}

/// Default policy: every failure rolls back.
pub struct RollbackOnAll;

impl<E> RollbackPolicy<E> for RollbackOnAll {
    fn decide(&self, _error: &E) -> RollbackDecision {
        RollbackDecision::Rollback
    }
}
