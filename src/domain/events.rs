//! Structured harvest events
//!
//! Every pipeline stage reports counts through these events instead of
//! printing progress. Consumers subscribe through an `EventSink`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::product::Category;

/// Lifecycle of one (retailer, category) unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "url_index", rename_all = "snake_case")]
pub enum UnitState {
    Pending,
    TryingUrl(usize),
    Succeeded,
    Exhausted,
}

impl UnitState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UnitState::Succeeded | UnitState::Exhausted)
    }
}

impl fmt::Display for UnitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitState::Pending => write!(f, "PENDING"),
            UnitState::TryingUrl(i) => write!(f, "TRYING_URL({i})"),
            UnitState::Succeeded => write!(f, "SUCCEEDED"),
            UnitState::Exhausted => write!(f, "EXHAUSTED"),
        }
    }
}

/// Identifies a unit in events
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitKey {
    pub retailer: String,
    pub category: Category,
}

impl UnitKey {
    pub fn new(retailer: impl Into<String>, category: Category) -> Self {
        Self {
            retailer: retailer.into(),
            category,
        }
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.retailer, self.category)
    }
}

/// Per-strategy counts from one extraction pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyAttempt {
    pub strategy: String,
    pub containers_found: usize,
    pub candidates_extracted: usize,
    pub validated: usize,
    pub kept: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HarvestEvent {
    RunStarted {
        units_planned: usize,
        timestamp: DateTime<Utc>,
    },
    UnitStarted {
        unit: UnitKey,
        urls_planned: usize,
    },
    UnitStateChanged {
        unit: UnitKey,
        state: UnitState,
    },
    FetchFailed {
        unit: UnitKey,
        url: String,
    },
    StrategyEvaluated {
        unit: UnitKey,
        url: String,
        attempt: StrategyAttempt,
    },
    DiagnosticsCaptured {
        unit: UnitKey,
        url: String,
        summary: String,
    },
    UnitDeduplicated {
        unit: UnitKey,
        before: usize,
        after: usize,
    },
    UnitPersisted {
        unit: UnitKey,
        saved: usize,
        total: usize,
    },
    UnitFinished {
        unit: UnitKey,
        state: UnitState,
        records: usize,
    },
    RunFinished {
        units_completed: usize,
        total_records: usize,
        cancelled: bool,
        timestamp: DateTime<Utc>,
    },
}

impl HarvestEvent {
    /// Stable event name for routing
    pub fn event_name(&self) -> &'static str {
        match self {
            HarvestEvent::RunStarted { .. } => "run-started",
            HarvestEvent::UnitStarted { .. } => "unit-started",
            HarvestEvent::UnitStateChanged { .. } => "unit-state-changed",
            HarvestEvent::FetchFailed { .. } => "fetch-failed",
            HarvestEvent::StrategyEvaluated { .. } => "strategy-evaluated",
            HarvestEvent::DiagnosticsCaptured { .. } => "diagnostics-captured",
            HarvestEvent::UnitDeduplicated { .. } => "unit-deduplicated",
            HarvestEvent::UnitPersisted { .. } => "unit-persisted",
            HarvestEvent::UnitFinished { .. } => "unit-finished",
            HarvestEvent::RunFinished { .. } => "run-finished",
        }
    }
}
