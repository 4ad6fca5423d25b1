//! Fatal structural errors.
//!
//! These abort a run. They travel inside `anyhow::Error` and can be recovered
//! with `downcast_ref::<RemapError>()`.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemapError {
    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("can't find parent '{parent}' of {feature_type} record '{id}' in gene '{gene}'")]
    UnresolvedParent {
        gene: String,
        feature_type: String,
        id: String,
        parent: String,
    },

    #[error("{feature_type} record at {location} is not contained in a gene")]
    FeatureOutsideGene { feature_type: String, location: String },

    #[error("more than two features with key '{0}'")]
    DuplicateFeature(String),

    #[error("sequence '{0}' not found in sequence size table")]
    UnknownSequence(String),

    #[error("malformed chain {chain}: {reason}")]
    MalformedChain { chain: usize, reason: String },
}
