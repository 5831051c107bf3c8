//! Resource naming and the injectable time/identity sources.
//!
//! Every generated name has the form `{deployment_id}-{suffix}-{timestamp}`.
//! The timestamp is captured once per plan invocation so a single plan's
//! names always agree with each other.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::plan::ResourceKind;

/// Format of the timestamp component (UTC, second resolution).
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    /// Creates a clock that always reports `at`.
    #[must_use]
    pub const fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Source of plan identifiers.
pub trait IdSource: Send + Sync {
    /// Returns a fresh plan identifier.
    fn plan_id(&self) -> Uuid;
}

/// Random (v4) plan identifiers.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomIdSource;

impl IdSource for RandomIdSource {
    fn plan_id(&self) -> Uuid {
        Uuid::new_v4()
    }
}

/// Always hands out the same identifier.
#[derive(Debug, Clone, Copy)]
pub struct FixedIdSource(Uuid);

impl FixedIdSource {
    /// Creates a source that always returns `id`.
    #[must_use]
    pub const fn new(id: Uuid) -> Self {
        Self(id)
    }
}

impl IdSource for FixedIdSource {
    fn plan_id(&self) -> Uuid {
        self.0
    }
}

/// Generates the names of one plan's resources.
#[derive(Debug, Clone)]
pub struct NameGenerator {
    /// Deployment id used as the prefix.
    deployment_id: String,
    /// Formatted timestamp shared by every name.
    timestamp: String,
}

impl NameGenerator {
    /// Creates a generator pinned to one instant.
    #[must_use]
    pub fn new(deployment_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            deployment_id: deployment_id.into(),
            timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
        }
    }

    /// Returns the generated name for a resource kind.
    #[must_use]
    pub fn name(&self, kind: ResourceKind) -> String {
        format!("{}-{}-{}", self.deployment_id, kind.suffix(), self.timestamp)
    }

    /// Returns the shared timestamp component.
    #[must_use]
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }
}
