use thiserror::Error;

/// Domain-rule violations surfaced to API callers.
///
/// Anything else that goes wrong (storage failures, poisoned locks) stays an
/// opaque [`anyhow::Error`] and is reported as an internal error. Handlers
/// downcast to this type to pick the response status.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Time log is already approved")]
    AlreadyApproved,

    #[error("User is already a member of this project")]
    DuplicateMember,
}
