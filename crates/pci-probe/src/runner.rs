//! Probe runner: drives the registry over a catalogue on one session
//!
//! The run is strictly sequential in catalogue order. A failing probe only
//! affects its own entry; only a lost connection ends the run early.

use crate::probe::{evaluate, ProbeContext, ProbeOutcome};
use crate::probes::ProbeRegistry;
use crate::session::{SessionError, SqlSession};
use pci_core::config::is_plain_identifier;
use pci_core::{CatalogError, Classification, FailureKind, FeatureCatalog, ProbeDiagnostic, ResultMatrix};

/// Errors that stop a probe run
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Invalid scratch schema name: {0:?} (expected a lowercase unquoted identifier)")]
    InvalidScratchSchema(String),
}

/// Everything a full run produced
#[derive(Debug, Clone, Default)]
pub struct RunResults {
    /// One classification per catalogue entry
    pub matrix: ResultMatrix,

    /// One entry per probe that stopped early
    pub diagnostics: Vec<ProbeDiagnostic>,
}

impl RunResults {
    /// Number of correctness anomalies found
    pub fn anomaly_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.kind == FailureKind::AssertionFailure)
            .count()
    }
}

/// Runs registered probes for every entry of a catalogue
#[derive(Debug)]
pub struct ProbeRunner<'a> {
    catalog: &'a FeatureCatalog,
    registry: &'a ProbeRegistry,
    scratch_schema: String,
}

impl<'a> ProbeRunner<'a> {
    pub fn new(
        catalog: &'a FeatureCatalog,
        registry: &'a ProbeRegistry,
        scratch_schema: impl Into<String>,
    ) -> Result<Self, RunError> {
        let scratch_schema = scratch_schema.into();
        if !is_plain_identifier(&scratch_schema) {
            return Err(RunError::InvalidScratchSchema(scratch_schema));
        }

        Ok(Self {
            catalog,
            registry,
            scratch_schema,
        })
    }

    pub fn scratch_schema(&self) -> &str {
        &self.scratch_schema
    }

    /// Drop and recreate the scratch schema and put it first on the search path
    pub async fn reset_scratch_schema(&self, session: &dyn SqlSession) -> Result<(), SessionError> {
        let schema = &self.scratch_schema;
        session
            .execute(&format!(
                "DROP SCHEMA IF EXISTS {schema} CASCADE; CREATE SCHEMA {schema}; SET search_path TO {schema}"
            ))
            .await?;

        tracing::debug!(schema = %schema, "scratch schema reset");
        Ok(())
    }

    /// Run the probe for one catalogue entry
    ///
    /// Returns `Err` only for an entry outside the catalogue or a lost
    /// connection.
    pub async fn run_probe(
        &self,
        category: &str,
        sub_feature: &str,
        session: &dyn SqlSession,
    ) -> Result<ProbeOutcome, RunError> {
        self.catalog.ensure_contains(category, sub_feature)?;

        let Some(probe) = self.registry.get(category, sub_feature) else {
            tracing::warn!(category, sub_feature, "no probe registered");
            return Ok(ProbeOutcome::failed(
                Classification::No,
                FailureKind::NoProbe,
                "No probe registered for this feature",
            ));
        };

        let ctx = ProbeContext::new(session, &self.scratch_schema);
        let outcome = evaluate(probe, &ctx).await?;

        match &outcome.failure {
            None => {
                tracing::debug!(category, sub_feature, classification = %outcome.classification, "probe finished");
            }
            Some(failure) => {
                if failure.kind == FailureKind::AssertionFailure {
                    tracing::error!(
                        category,
                        sub_feature,
                        classification = %outcome.classification,
                        "behavior differs from PostgreSQL: {}",
                        failure.message
                    );
                } else {
                    tracing::warn!(
                        category,
                        sub_feature,
                        classification = %outcome.classification,
                        kind = failure.kind.as_str(),
                        "feature failed: {}",
                        failure.message
                    );
                }

                // A probe may have failed inside BEGIN ... ; leave no aborted block behind
                if let Err(e) = session.execute("ROLLBACK").await {
                    if e.is_fatal() {
                        return Err(e.into());
                    }
                    tracing::debug!(error = %e, "rollback after failed probe");
                }
            }
        }

        Ok(outcome)
    }

    /// Classification for one catalogue entry
    pub async fn run(
        &self,
        category: &str,
        sub_feature: &str,
        session: &dyn SqlSession,
    ) -> Result<Classification, RunError> {
        Ok(self.run_probe(category, sub_feature, session).await?.classification)
    }

    /// Reset the scratch schema and probe every catalogue entry
    pub async fn run_all(&self, session: &dyn SqlSession) -> Result<RunResults, RunError> {
        self.run_all_with(session, |_, _, _| {}).await
    }

    /// Like [`run_all`](Self::run_all), calling `on_outcome` after each probe
    pub async fn run_all_with<F>(&self, session: &dyn SqlSession, mut on_outcome: F) -> Result<RunResults, RunError>
    where
        F: FnMut(&str, &str, &ProbeOutcome) + Send,
    {
        tracing::info!(
            session = session.name(),
            probes = self.catalog.probe_count(),
            schema = %self.scratch_schema,
            "starting probe run"
        );

        self.reset_scratch_schema(session).await?;

        let mut results = RunResults::default();

        for (category, sub_feature) in self.catalog.probe_keys() {
            let outcome = self.run_probe(category, sub_feature, session).await?;
            on_outcome(category, sub_feature, &outcome);

            results.matrix.insert(category, sub_feature, outcome.classification);
            if let Some(failure) = outcome.failure {
                results.diagnostics.push(ProbeDiagnostic::new(
                    category,
                    sub_feature,
                    outcome.classification,
                    failure.kind,
                    failure.message,
                ));
            }
        }

        tracing::info!(
            probes = results.matrix.len(),
            stopped_early = results.diagnostics.len(),
            anomalies = results.anomaly_count(),
            "probe run finished"
        );

        Ok(results)
    }
}
