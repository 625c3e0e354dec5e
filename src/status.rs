// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Batch execution and status aggregation.
//!
//! Batches are handed one at a time to a [`BatchApplier`], the narrow
//! interface to whatever provider physically applies mode changes. Failures
//! are plain [`Status`] values, never errors, so one connection failing never
//! stops the remaining connections from being attempted. Everything that
//! completed is merged into one [`AggregatedStatus`].
//!
//! Batches run sequentially. Batches of different connections may still
//! touch overlapping server side state, and sequential execution keeps error
//! attribution per connection simple.

use crate::{batch::ProviderBatch, resource::ConnectionId};

use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
    sync::atomic::{AtomicBool, Ordering},
};
use tracing::{debug, info, instrument, warn};

/// Severity of a status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    #[default]
    Ok,
    Warning,
    Error,
}

impl Display for Severity {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        let label = match self {
            Self::Ok => "ok",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        fmt.write_str(label)
    }
}

/// Outcome of applying one batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Status {
    pub severity: Severity,

    /// Repository server reported the failure.
    pub server_error: bool,

    pub message: String,
}

impl Status {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Ok,
            server_error: false,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            server_error: false,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            server_error: false,
            message: message.into(),
        }
    }

    /// Error reported by the repository server itself.
    pub fn server_error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            server_error: true,
            message: message.into(),
        }
    }

    /// Check if status counts as an error.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error || self.server_error
    }

    /// Severity after folding in the server error sub-code.
    pub fn effective_severity(&self) -> Severity {
        if self.is_error() {
            Severity::Error
        } else {
            self.severity
        }
    }

    pub fn is_ok(&self) -> bool {
        self.effective_severity() == Severity::Ok
    }
}

impl Display for Status {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}: {}", self.effective_severity(), self.message)
    }
}

/// Apply interface of a provider.
///
/// Must be safe to run again on already applied files, those simply stop
/// being actionable.
pub trait BatchApplier {
    /// Apply one batch, reporting the outcome as data.
    fn apply_batch(&mut self, batch: &ProviderBatch) -> Status;
}

impl<F> BatchApplier for F
where
    F: FnMut(&ProviderBatch) -> Status,
{
    fn apply_batch(&mut self, batch: &ProviderBatch) -> Status {
        self(batch)
    }
}

/// Cancellation signal checked between batches.
pub trait Cancellation {
    fn is_cancelled(&self) -> bool;
}

impl Cancellation for AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::SeqCst)
    }
}

/// Cancellation signal that never fires.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverCancel;

impl Cancellation for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Merged outcome of applying every batch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AggregatedStatus {
    pub per_connection: BTreeMap<ConnectionId, Status>,
    pub severity: Severity,

    /// Execution stopped early on cancellation.
    pub cancelled: bool,

    /// Connections whose batches were never attempted.
    pub skipped: Vec<ConnectionId>,
}

impl AggregatedStatus {
    /// Record status of a connection, and fold it into overall severity.
    pub fn record(&mut self, connection: ConnectionId, status: Status) {
        self.per_connection.insert(connection, status);
        self.severity = self
            .per_connection
            .values()
            .map(Status::effective_severity)
            .max()
            .unwrap_or_default();
    }

    /// Every status that is not ok.
    pub fn problems(&self) -> impl Iterator<Item = (&ConnectionId, &Status)> {
        self.per_connection
            .iter()
            .filter(|(_, status)| !status.is_ok())
    }

    pub fn is_ok(&self) -> bool {
        self.severity == Severity::Ok
    }

    /// Message fit for display.
    ///
    /// A lone problem is shown as is, without any wrapper text.
    pub fn message(&self) -> String {
        let problems = self.problems().collect::<Vec<_>>();
        let mut message = match problems.as_slice() {
            [] => format!("{} operations completed", self.per_connection.len()),
            [(_, status)] => status.message.clone(),
            many => format!("{} operations failed", many.len()),
        };

        if self.cancelled {
            message.push_str(&format!(" (cancelled, {} not attempted)", self.skipped.len()));
        }

        message
    }
}

impl Display for AggregatedStatus {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(fmt, "{}: {}", self.severity, self.message())
    }
}

/// Run batches and merge their outcome.
#[derive(Debug)]
pub struct StatusAggregator<'a, C>
where
    C: Cancellation + ?Sized,
{
    cancellation: &'a C,
}

impl<'a, C> StatusAggregator<'a, C>
where
    C: Cancellation + ?Sized,
{
    /// Construct new aggregator watching a cancellation signal.
    pub fn new(cancellation: &'a C) -> Self {
        Self { cancellation }
    }

    /// Apply every batch in order.
    ///
    /// Each batch is attempted regardless of how earlier ones went, unless
    /// cancellation fires. Cancellation stops new batches from starting,
    /// while already recorded outcomes are kept.
    #[instrument(skip(self, batches, applier), level = "debug")]
    pub fn apply<A>(&self, batches: &[ProviderBatch], applier: &mut A) -> AggregatedStatus
    where
        A: BatchApplier + ?Sized,
    {
        let mut aggregate = AggregatedStatus::default();
        for (at, batch) in batches.iter().enumerate() {
            if self.cancellation.is_cancelled() {
                warn!("cancelled with {} batches left", batches.len() - at);
                aggregate.cancelled = true;
                aggregate.skipped = batches[at..]
                    .iter()
                    .map(|batch| batch.connection.clone())
                    .collect();
                break;
            }

            debug!("apply {} entries to {}", batch.len(), batch.connection);
            let status = applier.apply_batch(batch);
            if status.is_error() {
                warn!("batch for {} failed: {}", batch.connection, status.message);
            }
            aggregate.record(batch.connection.clone(), status);
        }

        info!("{aggregate}");
        aggregate
    }
}
