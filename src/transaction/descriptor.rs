use std::fmt;

/// Propagation policy for one `begin` request.
///
/// Decides how the request relates to a transaction that may already be in
/// progress on the calling context. Only `Required` and `RequiresNew` are
/// resolved today; the remaining values are declared as the extension
/// surface and fail with an unsupported-operation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// Join the current transaction, or start one if none is active
    Required,

    /// Always start an independent transaction, suspending the current one
    RequiresNew,

    /// Execute in a savepoint-scoped subtransaction
    Nested,

    /// Join the current transaction, or run non-transactionally
    Supports,

    /// Run non-transactionally, suspending any current transaction
    NotSupported,

    /// Join the current transaction, failing if none is active
    Mandatory,

    /// Run non-transactionally, failing if a transaction is active
    Never,
}

impl fmt::Display for Propagation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Propagation::Required => write!(f, "REQUIRED"),
            Propagation::RequiresNew => write!(f, "REQUIRES_NEW"),
            Propagation::Nested => write!(f, "NESTED"),
            Propagation::Supports => write!(f, "SUPPORTS"),
            Propagation::NotSupported => write!(f, "NOT_SUPPORTED"),
            Propagation::Mandatory => write!(f, "MANDATORY"),
            Propagation::Never => write!(f, "NEVER"),
        }
    }
}

/// Isolation level requested for the physical transaction.
///
/// Carried through to the connection untouched; the propagation resolver
/// never alters it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

/// Immutable description of one transaction request.
///
/// Built once per `begin` call, builder-style:
///
/// ```
/// use txflow::{IsolationLevel, Propagation, TransactionDescriptor};
///
/// let descriptor = TransactionDescriptor::new()
///     .propagation(Propagation::RequiresNew)
///     .isolation(IsolationLevel::Serializable)
///     .read_only(true);
///
/// assert_eq!(descriptor.propagation_policy(), Propagation::RequiresNew);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionDescriptor {
    propagation: Propagation,
    isolation: IsolationLevel,
    read_only: bool,
}

impl TransactionDescriptor {
    /// Create a descriptor with the defaults: `Required`, read-committed,
    /// read-write.
    pub fn new() -> Self {
        Self {
            propagation: Propagation::Required,
            isolation: IsolationLevel::ReadCommitted,
            read_only: false,
        }
    }

    /// Set the propagation policy
    pub fn propagation(mut self, propagation: Propagation) -> Self {
        self.propagation = propagation;
        self
    }

    /// Set the isolation level
    pub fn isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = isolation;
        self
    }

    /// Set the read-only flag
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

impl Default for TransactionDescriptor {
    fn default() -> Self {
        Self::new()
    }
}

// Getter names shadow the builder methods on purpose: the builder consumes
// `self`, the getters borrow.
impl TransactionDescriptor {
    pub fn propagation_policy(&self) -> Propagation {
        self.propagation
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_descriptor() {
        let descriptor = TransactionDescriptor::default();
        assert_eq!(descriptor.propagation_policy(), Propagation::Required);
        assert_eq!(descriptor.isolation_level(), IsolationLevel::ReadCommitted);
        assert!(!descriptor.is_read_only());
    }

    #[test]
    fn test_builder_pattern() {
        let descriptor = TransactionDescriptor::new()
            .propagation(Propagation::RequiresNew)
            .isolation(IsolationLevel::Serializable)
            .read_only(true);

        assert_eq!(descriptor.propagation_policy(), Propagation::RequiresNew);
        assert_eq!(descriptor.isolation_level(), IsolationLevel::Serializable);
        assert!(descriptor.is_read_only());
    }

    #[test]
    fn test_propagation_display() {
        assert_eq!(Propagation::Required.to_string(), "REQUIRED");
        assert_eq!(Propagation::RequiresNew.to_string(), "REQUIRES_NEW");
        assert_eq!(Propagation::NotSupported.to_string(), "NOT_SUPPORTED");
    }
}
