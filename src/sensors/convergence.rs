//! Option convergence sensor: options destroyed faster than created.

use super::{RiskSensor, SensorContext, SensorReading};
use crate::config::SensorConfig;
use crate::path_memory::PathMemory;
use crate::warning::WarningLevel;

/// Flags negative option velocity and exhausted option sets.
#[derive(Debug, Clone)]
pub struct ConvergenceSensor {
    config: SensorConfig,
}

impl ConvergenceSensor {
    /// Create a new option convergence sensor.
    pub fn new(config: SensorConfig) -> Self {
        Self { config }
    }
}

impl RiskSensor for ConvergenceSensor {
    fn name(&self) -> &'static str {
        "option_convergence"
    }

    fn evaluate(&self, memory: &PathMemory, _context: &SensorContext) -> SensorReading {
        let count = memory.path_history.len();
        if count < self.config.convergence_min_history {
            return SensorReading::safe(self.name(), 0.0);
        }

        let velocity = memory.current_flexibility.option_velocity;
        let exhausted = memory.available_options.is_empty() && !memory.foreclosed_options.is_empty();

        let severity = if velocity <= self.config.velocity_warning || (exhausted && velocity < 0.0) {
            WarningLevel::Warning
        } else if velocity <= self.config.velocity_caution || exhausted {
            WarningLevel::Caution
        } else {
            WarningLevel::Safe
        };

        let mut indicators = Vec::new();
        if severity > WarningLevel::Safe {
            if velocity < 0.0 {
                indicators.push(format!(
                    "Options closing faster than opening ({:+.2} per decision)",
                    velocity
                ));
            }
            if exhausted {
                indicators.push(format!(
                    "No options remain available; {} foreclosed",
                    memory.foreclosed_options.len()
                ));
            }
        }

        let confidence = (count as f64 / (self.config.convergence_min_history * 3).max(1) as f64).min(1.0);
        SensorReading::new(self.name(), severity, indicators, confidence)
    }
}
