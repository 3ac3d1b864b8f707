//! Feature probes for the PostgreSQL Compatibility Index
//!
//! This crate runs scripted capability checks against a live database and
//! classifies each one as `full`, `partial` or `no`.
//!
//! ## Features
//!
//! - `postgres` (default) - PostgreSQL session via tokio-postgres
//!
//! Without it, [`PostgresSession::connect`] returns an error and only the
//! [`MockSession`] is usable.
//!
//! ## Example
//!
//! ```rust,ignore
//! use pci_core::{ConnectionConfig, FeatureCatalog};
//! use pci_probe::{PostgresSession, ProbeRegistry, ProbeRunner};
//!
//! let catalog = FeatureCatalog::standard();
//! let registry = ProbeRegistry::standard();
//! let session = PostgresSession::connect(&ConnectionConfig::default()).await?;
//!
//! let runner = ProbeRunner::new(&catalog, &registry, "pci_test")?;
//! let results = runner.run_all(&session).await?;
//! ```

pub mod mock;
pub mod postgres;
pub mod probe;
pub mod probes;
pub mod runner;
pub mod session;

pub use mock::MockSession;
pub use postgres::PostgresSession;
pub use probe::{evaluate, Probe, ProbeContext, ProbeError, ProbeFailure, ProbeOutcome, Progress};
pub use probes::ProbeRegistry;
pub use runner::{ProbeRunner, RunError, RunResults};
pub use session::{Row, SessionError, SqlSession};
