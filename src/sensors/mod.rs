//! Sensor array.
//!
//! Each sensor is an independent heuristic that reads the session's
//! [`PathMemory`] plus a [`SensorContext`] and returns one [`SensorReading`].
//! Sensors never mutate state and tolerate short or empty history by
//! reporting `Safe` with no indicators.
//!
//! The set of sensors is closed: [`Sensor`] enumerates every variant and
//! dispatches the shared [`RiskSensor`] capability. New sensors are added by
//! extending the enum.
//!
//! - [`ResourceSensor`]: fatigue and depletion from session length and stalled option creation
//! - [`CognitiveSensor`]: repetitive decision wording (lock-in)
//! - [`TechnicalDebtSensor`]: coupling between constraints through shared options
//! - [`CommitmentSensor`]: escalating streaks of high commitment
//! - [`ConvergenceSensor`]: options being destroyed faster than created
//! - [`BarrierSensor`]: absorbing barriers at or past their warning threshold

mod barrier;
mod cognitive;
mod commitment;
mod convergence;
mod resource;
mod technical_debt;

pub use barrier::*;
pub use cognitive::*;
pub use commitment::*;
pub use convergence::*;
pub use resource::*;
pub use technical_debt::*;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SensorConfig;
use crate::path_memory::PathMemory;
use crate::warning::WarningLevel;

/// One sensor's verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Name of the reporting sensor
    pub sensor_name: String,
    /// Severity of the finding
    pub severity: WarningLevel,
    /// Human-readable evidence
    pub indicators: Vec<String>,
    /// Confidence in the reading (0.0-1.0)
    pub confidence: f64,
}

impl SensorReading {
    /// A `Safe` reading with no indicators.
    pub fn safe(sensor_name: &str, confidence: f64) -> Self {
        Self {
            sensor_name: sensor_name.to_string(),
            severity: WarningLevel::Safe,
            indicators: Vec::new(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Create a reading.
    pub fn new(
        sensor_name: &str,
        severity: WarningLevel,
        indicators: Vec<String>,
        confidence: f64,
    ) -> Self {
        Self {
            sensor_name: sensor_name.to_string(),
            severity,
            indicators,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Whether the reading is above `Safe`.
    pub fn is_active(&self) -> bool {
        self.severity > WarningLevel::Safe
    }
}

/// Session information available to sensors beyond the path memory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SensorContext {
    /// Session being evaluated
    pub session_id: String,
    /// When the evaluation happens
    pub evaluated_at: Option<DateTime<Utc>>,
    /// Most recent decision texts, oldest first
    pub recent_outputs: Vec<String>,
}

impl SensorContext {
    /// Build a context from the last `window` non-audit decisions.
    pub fn from_memory(memory: &PathMemory, window: usize) -> Self {
        let mut recent_outputs: Vec<String> = memory
            .path_history
            .iter()
            .rev()
            .filter(|e| !e.is_intervention())
            .take(window)
            .map(|e| e.decision.clone())
            .collect();
        recent_outputs.reverse();

        Self {
            session_id: memory.session_id.clone(),
            evaluated_at: Some(Utc::now()),
            recent_outputs,
        }
    }
}

/// Capability shared by every sensor: evaluate risk given path memory.
pub trait RiskSensor {
    /// Stable sensor name used in readings.
    fn name(&self) -> &'static str;

    /// Evaluate the session. Must not fail; short history yields `Safe`.
    fn evaluate(&self, memory: &PathMemory, context: &SensorContext) -> SensorReading;
}

/// Closed set of sensors.
#[derive(Debug, Clone)]
pub enum Sensor {
    /// Fatigue and depletion
    Resource(ResourceSensor),
    /// Repetitive decisions
    Cognitive(CognitiveSensor),
    /// Constraint coupling
    TechnicalDebt(TechnicalDebtSensor),
    /// Commitment streaks
    Commitment(CommitmentSensor),
    /// Option destruction
    Convergence(ConvergenceSensor),
    /// Barrier proximity
    Barrier(BarrierSensor),
}

impl RiskSensor for Sensor {
    fn name(&self) -> &'static str {
        match self {
            Sensor::Resource(s) => s.name(),
            Sensor::Cognitive(s) => s.name(),
            Sensor::TechnicalDebt(s) => s.name(),
            Sensor::Commitment(s) => s.name(),
            Sensor::Convergence(s) => s.name(),
            Sensor::Barrier(s) => s.name(),
        }
    }

    fn evaluate(&self, memory: &PathMemory, context: &SensorContext) -> SensorReading {
        match self {
            Sensor::Resource(s) => s.evaluate(memory, context),
            Sensor::Cognitive(s) => s.evaluate(memory, context),
            Sensor::TechnicalDebt(s) => s.evaluate(memory, context),
            Sensor::Commitment(s) => s.evaluate(memory, context),
            Sensor::Convergence(s) => s.evaluate(memory, context),
            Sensor::Barrier(s) => s.evaluate(memory, context),
        }
    }
}

/// The sensors evaluated on every step.
#[derive(Debug, Clone)]
pub struct SensorArray {
    sensors: Vec<Sensor>,
}

impl SensorArray {
    /// Create an array from explicit sensors.
    pub fn new(sensors: Vec<Sensor>) -> Self {
        Self { sensors }
    }

    /// An array with no sensors; warning levels then follow flexibility bands alone.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// The standard six sensors.
    pub fn standard(config: &SensorConfig) -> Self {
        Self::new(vec![
            Sensor::Resource(ResourceSensor::new(config.clone())),
            Sensor::Cognitive(CognitiveSensor::new(config.clone())),
            Sensor::TechnicalDebt(TechnicalDebtSensor::new(config.clone())),
            Sensor::Commitment(CommitmentSensor::new(config.clone())),
            Sensor::Convergence(ConvergenceSensor::new(config.clone())),
            Sensor::Barrier(BarrierSensor::new(config.clone())),
        ])
    }

    /// Evaluate every sensor against the session.
    pub fn evaluate(&self, memory: &PathMemory, context: &SensorContext) -> Vec<SensorReading> {
        self.sensors
            .iter()
            .map(|sensor| sensor.evaluate(memory, context))
            .collect()
    }

    /// Names of the sensors in evaluation order.
    pub fn names(&self) -> Vec<&'static str> {
        self.sensors.iter().map(|s| s.name()).collect()
    }

    /// Number of sensors.
    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    /// Whether the array has no sensors.
    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }
}
