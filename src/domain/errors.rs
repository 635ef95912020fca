use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("message content exceeds character limit of {limit}")]
    ContentTooLong { limit: usize },
    #[error("recipient cannot be empty")]
    RecipientEmpty,
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DomainError {
    /// True for errors caused by caller input rather than infrastructure.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DomainError::ContentTooLong { .. } | DomainError::RecipientEmpty | DomainError::Validation(_)
        )
    }
}
