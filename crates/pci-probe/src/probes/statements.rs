//! Probes that only need statements to run without error

use crate::probe::{Probe, ProbeContext, ProbeError, Progress};
use pci_core::Classification;

/// All-or-nothing probe: `full` if every statement runs, `no` otherwise
#[derive(Debug, Clone)]
pub struct StatementProbe {
    statements: Vec<&'static str>,
}

impl StatementProbe {
    pub fn new(statements: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            statements: statements.into_iter().collect(),
        }
    }

    pub fn single(statement: &'static str) -> Self {
        Self::new([statement])
    }
}

#[async_trait::async_trait]
impl Probe for StatementProbe {
    async fn run(&self, ctx: &ProbeContext<'_>, _progress: &mut Progress) -> Result<Classification, ProbeError> {
        for statement in &self.statements {
            ctx.session.execute(statement).await?;
        }
        Ok(Classification::Full)
    }
}

/// Probe whose stages go from a basic form to the full form of a feature
///
/// Every stage except the last promotes to `partial`; the last one
/// completes the feature.
#[derive(Debug, Clone)]
pub struct StagedProbe {
    stages: Vec<&'static str>,
}

impl StagedProbe {
    pub fn new(stages: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            stages: stages.into_iter().collect(),
        }
    }
}

#[async_trait::async_trait]
impl Probe for StagedProbe {
    async fn run(&self, ctx: &ProbeContext<'_>, progress: &mut Progress) -> Result<Classification, ProbeError> {
        let last = self.stages.len().saturating_sub(1);
        for (i, stage) in self.stages.iter().enumerate() {
            ctx.session.execute(stage).await?;
            if i < last {
                progress.promote(Classification::Partial);
            }
        }
        Ok(Classification::Full)
    }
}
