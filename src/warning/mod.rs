//! Warning aggregation.
//!
//! Combines sensor readings with the banded flexibility score into one
//! session-wide [`WarningState`].
//!
//! # Levels
//!
//! ```text
//! Safe → Caution → Warning → Critical
//! ```
//!
//! Transitions happen only through recomputation on each recorded step (or
//! after a protocol execution). There is no terminal state and the level may
//! fall again once flexibility recovers.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::WarningConfig;
use crate::flexibility::FlexibilityMetrics;
use crate::sensors::SensorReading;

/// Ordered severity of a session or a single sensor reading.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum WarningLevel {
    /// Plenty of optionality left
    Safe = 0,
    /// Optionality is shrinking
    Caution = 1,
    /// Generate new options before committing further
    Warning = 2,
    /// Close to an absorbing barrier
    Critical = 3,
}

impl WarningLevel {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningLevel::Safe => "safe",
            WarningLevel::Caution => "caution",
            WarningLevel::Warning => "warning",
            WarningLevel::Critical => "critical",
        }
    }
}

impl std::fmt::Display for WarningLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for WarningLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "safe" => Ok(WarningLevel::Safe),
            "caution" => Ok(WarningLevel::Caution),
            "warning" => Ok(WarningLevel::Warning),
            "critical" => Ok(WarningLevel::Critical),
            _ => Err(format!("Unknown warning level: {}", s)),
        }
    }
}

/// What the caller should do next.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    /// Continue as planned
    Proceed,
    /// Continue, watching commitments
    Caution,
    /// Open new options before the next commitment
    GenerateOptions,
    /// Run an escape protocol
    Escape,
}

impl RecommendedAction {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendedAction::Proceed => "proceed",
            RecommendedAction::Caution => "caution",
            RecommendedAction::GenerateOptions => "generate_options",
            RecommendedAction::Escape => "escape",
        }
    }
}

impl std::fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Session-wide risk snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarningState {
    /// Session the state belongs to
    pub session_id: String,
    /// Highest of every sensor severity and the banded flexibility level
    pub overall_risk: WarningLevel,
    /// Level implied by the flexibility score alone
    pub flexibility_level: WarningLevel,
    /// Flexibility score at evaluation time
    pub flexibility_score: f64,
    /// Every sensor reading
    pub readings: Vec<SensorReading>,
    /// Readings above `Safe`
    pub active_warnings: Vec<SensorReading>,
    /// Two or more distinct sensors at `Warning` or above
    pub compound_risk: bool,
    /// What the caller should do next
    pub recommended_action: RecommendedAction,
    /// When the state was computed
    pub evaluated_at: DateTime<Utc>,
}

impl WarningState {
    /// Reading from a named sensor.
    pub fn reading(&self, sensor_name: &str) -> Option<&SensorReading> {
        self.readings.iter().find(|r| r.sensor_name == sensor_name)
    }

    /// Whether an escape protocol is recommended.
    pub fn escape_recommended(&self) -> bool {
        self.recommended_action == RecommendedAction::Escape
    }
}

/// Protocol surfaced to the caller when escape is recommended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscapeRecommendation {
    /// Protocol name
    pub name: String,
    /// Escalation level of the protocol
    pub level: u8,
    /// Why escape is recommended
    pub reason: String,
    /// Session risk that triggered the recommendation
    pub urgency: WarningLevel,
    /// Protocol steps
    pub steps: Vec<String>,
    /// Duration label
    pub execution_time: String,
    /// Prior success probability of the protocol
    pub success_probability: f64,
}

/// Combines sensor readings into a [`WarningState`].
#[derive(Debug, Clone)]
pub struct WarningAggregator {
    config: WarningConfig,
}

impl WarningAggregator {
    /// Create a new aggregator.
    pub fn new(config: WarningConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &WarningConfig {
        &self.config
    }

    /// Aggregate readings and flexibility into one state.
    pub fn aggregate(
        &self,
        session_id: &str,
        readings: Vec<SensorReading>,
        flexibility: &FlexibilityMetrics,
    ) -> WarningState {
        let flexibility_level = self.config.level_for_score(flexibility.flexibility_score);
        let overall_risk = readings
            .iter()
            .map(|r| r.severity)
            .fold(flexibility_level, WarningLevel::max);

        let mut severe: Vec<&str> = readings
            .iter()
            .filter(|r| r.severity >= WarningLevel::Warning)
            .map(|r| r.sensor_name.as_str())
            .collect();
        severe.sort_unstable();
        severe.dedup();
        let compound_risk = severe.len() >= 2;

        if compound_risk {
            warn!(
                session_id = %session_id,
                sensors = ?severe,
                "Compound risk: multiple sensors at warning or above"
            );
        }

        let recommended_action = if compound_risk || overall_risk == WarningLevel::Critical {
            RecommendedAction::Escape
        } else {
            match overall_risk {
                WarningLevel::Safe => RecommendedAction::Proceed,
                WarningLevel::Caution => RecommendedAction::Caution,
                _ => RecommendedAction::GenerateOptions,
            }
        };

        let active_warnings = readings.iter().filter(|r| r.is_active()).cloned().collect();

        WarningState {
            session_id: session_id.to_string(),
            overall_risk,
            flexibility_level,
            flexibility_score: flexibility.flexibility_score,
            readings,
            active_warnings,
            compound_risk,
            recommended_action,
            evaluated_at: Utc::now(),
        }
    }
}

/// Append-only warning history with bounded retention.
///
/// Entries are never removed except by evicting the oldest once `retention`
/// is exceeded.
#[derive(Debug, Clone)]
pub struct WarningHistory {
    retention: usize,
    entries: VecDeque<WarningState>,
    total_recorded: u64,
}

impl WarningHistory {
    /// Create an empty history that keeps at most `retention` entries.
    pub fn new(retention: usize) -> Self {
        Self {
            retention: retention.max(1),
            entries: VecDeque::new(),
            total_recorded: 0,
        }
    }

    /// Append a state, evicting the oldest if over retention.
    pub fn push(&mut self, state: WarningState) {
        if self.entries.len() == self.retention {
            self.entries.pop_front();
        }
        self.entries.push_back(state);
        self.total_recorded += 1;
    }

    /// Most recent state.
    pub fn latest(&self) -> Option<&WarningState> {
        self.entries.back()
    }

    /// Retained states, oldest first.
    pub fn entries(&self) -> Vec<WarningState> {
        self.entries.iter().cloned().collect()
    }

    /// Number of retained states.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// States recorded since creation, including evicted ones.
    pub fn total_recorded(&self) -> u64 {
        self.total_recorded
    }
}
