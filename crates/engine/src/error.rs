//! The module contains the errors the engine can return.
//!
//! Computations never fail with an [`EngineError`]: missing input and lookup
//! misses are reported through [`Outcome`] and [`Diagnostic`]. The errors
//! below cover malformed data handed to the engine:
//!
//! - [`InvalidAmount`] when a money or rate string can't be parsed.
//! - [`InvalidTag`] when a rule attribute has an unknown value.
//! - [`InvalidCatalog`] when a catalog snapshot breaks its invariants.
//!
//!  [`InvalidAmount`]: EngineError::InvalidAmount
//!  [`InvalidTag`]: EngineError::InvalidTag
//!  [`InvalidCatalog`]: EngineError::InvalidCatalog
//!  [`Outcome`]: crate::Outcome
//!  [`Diagnostic`]: crate::Diagnostic
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid {kind}: \"{value}\"")]
    InvalidTag { kind: &'static str, value: String },
    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),
    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),
    #[error(transparent)]
    CacheKey(#[from] serde_json::Error),
}

impl EngineError {
    pub(crate) fn tag(kind: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidTag {
            kind,
            value: value.into(),
        }
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (
                Self::InvalidTag { kind: ka, value: va },
                Self::InvalidTag { kind: kb, value: vb },
            ) => ka == kb && va == vb,
            (Self::InvalidCatalog(a), Self::InvalidCatalog(b)) => a == b,
            (Self::UnsupportedCurrency(a), Self::UnsupportedCurrency(b)) => a == b,
            (Self::CacheKey(a), Self::CacheKey(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
