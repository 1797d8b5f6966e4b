//! Commitment escalation sensor.

use super::{RiskSensor, SensorContext, SensorReading};
use crate::config::SensorConfig;
use crate::path_memory::PathMemory;
use crate::warning::WarningLevel;

/// Flags an unbroken trailing run of highly committed decisions.
#[derive(Debug, Clone)]
pub struct CommitmentSensor {
    config: SensorConfig,
}

impl CommitmentSensor {
    /// Create a new commitment escalation sensor.
    pub fn new(config: SensorConfig) -> Self {
        Self { config }
    }
}

impl RiskSensor for CommitmentSensor {
    fn name(&self) -> &'static str {
        "commitment_escalation"
    }

    fn evaluate(&self, memory: &PathMemory, _context: &SensorContext) -> SensorReading {
        let streak: Vec<_> = memory
            .path_history
            .iter()
            .rev()
            .take_while(|e| e.commitment_level > self.config.streak_commitment)
            .collect();
        if streak.is_empty() {
            return SensorReading::safe(self.name(), (memory.path_history.len() as f64 / 3.0).min(1.0));
        }

        let length = streak.len();
        let avg_reversibility =
            streak.iter().map(|e| e.reversibility_cost).sum::<f64>() / length as f64;

        let severity = if length >= self.config.streak_critical
            && avg_reversibility > self.config.streak_reversibility
        {
            WarningLevel::Critical
        } else if length >= self.config.streak_warning {
            WarningLevel::Warning
        } else if length >= self.config.streak_caution {
            WarningLevel::Caution
        } else {
            WarningLevel::Safe
        };

        let indicators = if severity > WarningLevel::Safe {
            vec![
                format!(
                    "{} consecutive decisions above {:.1} commitment",
                    length, self.config.streak_commitment
                ),
                format!("Average reversal cost across the streak: {:.2}", avg_reversibility),
            ]
        } else {
            Vec::new()
        };

        let confidence = (length as f64 / self.config.streak_critical.max(1) as f64).min(1.0);
        SensorReading::new(self.name(), severity, indicators, confidence.max(0.5))
    }
}
