//! Probe trait and the shared classification policy
//!
//! Every probe starts at [`Classification::No`] and is only promoted by
//! evidence. A probe returns `Ok(classification)` once it has all the
//! evidence it is going to get. If a statement fails, or an explicit check
//! contradicts PostgreSQL behavior, the probe returns an error and the
//! in-flight classification it had earned so far is kept.

use crate::session::{SessionError, SqlSession};
use pci_core::{Classification, FailureKind};

/// Why a probe stopped early
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProbeError {
    /// A statement was rejected by the database
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Statements ran, but the observed behavior is wrong
    #[error("{0}")]
    Assertion(String),
}

impl ProbeError {
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::Assertion(message.into())
    }
}

/// Classification earned so far by a running probe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    current: Classification,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the in-flight classification; never lowers it
    pub fn promote(&mut self, to: Classification) {
        if to > self.current {
            self.current = to;
        }
    }

    pub fn current(&self) -> Classification {
        self.current
    }
}

/// What a probe needs from its surroundings
pub struct ProbeContext<'a> {
    pub session: &'a dyn SqlSession,

    /// Scratch schema, first on the search path
    pub scratch_schema: &'a str,
}

impl<'a> ProbeContext<'a> {
    pub fn new(session: &'a dyn SqlSession, scratch_schema: &'a str) -> Self {
        Self { session, scratch_schema }
    }
}

/// A single scripted capability check
#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    /// Run the probe, promoting `progress` as evidence accumulates
    async fn run(&self, ctx: &ProbeContext<'_>, progress: &mut Progress) -> Result<Classification, ProbeError>;
}

/// Failure detail attached to an outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// Classification plus the reason a probe ended early, if it did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub classification: Classification,
    pub failure: Option<ProbeFailure>,
}

impl ProbeOutcome {
    pub fn classified(classification: Classification) -> Self {
        Self {
            classification,
            failure: None,
        }
    }

    pub fn failed(classification: Classification, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            classification,
            failure: Some(ProbeFailure {
                kind,
                message: message.into(),
            }),
        }
    }

    /// Whether the probe found a correctness anomaly
    pub fn is_anomaly(&self) -> bool {
        matches!(&self.failure, Some(f) if f.kind == FailureKind::AssertionFailure)
    }
}

/// Run a probe and apply the classification policy
///
/// Only fatal session errors (lost connection) are returned as `Err`.
pub async fn evaluate(probe: &dyn Probe, ctx: &ProbeContext<'_>) -> Result<ProbeOutcome, SessionError> {
    let mut progress = Progress::new();

    match probe.run(ctx, &mut progress).await {
        Ok(classification) => Ok(ProbeOutcome::classified(classification)),
        Err(ProbeError::Session(err)) if err.is_fatal() => Err(err),
        Err(ProbeError::Session(err)) => Ok(ProbeOutcome::failed(
            progress.current(),
            err.failure_kind(),
            err.to_string(),
        )),
        Err(ProbeError::Assertion(message)) => Ok(ProbeOutcome::failed(
            progress.current(),
            FailureKind::AssertionFailure,
            message,
        )),
    }
}
