/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

//! Crate-wide error types for the experiment lifecycle core.

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("illegal state transition from {from:?} to {to:?}")]
    InvalidStateTransition {
        from: crate::model::ExperimentState,
        to: crate::model::ExperimentState,
    },
    #[error("field {field} cannot be changed while experiment is in state {state:?}")]
    IllegalUpdateForState {
        field: &'static str,
        state: crate::model::ExperimentState,
    },
    #[error("experiment {0} not found")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("rule parse error: {0}")]
    RuleParse(#[from] RuleParseError),
}

/// Errors a store backend (primary or secondary) can raise.
///
/// `Transient` may be retried by the caller; `Conflict` and `Schema`
/// propagate unchanged. The service never retries internally since any
/// partial progress has already been compensated by the time an error
/// reaches the caller.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("transient repository error: {0}")]
    Transient(String),
    #[error("conflicting write: {0}")]
    Conflict(String),
    #[error("experiment not found: {0}")]
    NotFound(String),
    #[error("repository schema error: {0}")]
    Schema(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RuleParseError {
    #[error("invalid segmentation rule {expr:?}: {reason}")]
    Invalid { expr: String, reason: String },
}

pub type Result<T, E = ServiceError> = std::result::Result<T, E>;
