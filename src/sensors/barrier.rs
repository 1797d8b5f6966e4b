//! Barrier proximity sensor.

use super::{RiskSensor, SensorContext, SensorReading};
use crate::config::SensorConfig;
use crate::path_memory::{Barrier, BarrierImpact, PathMemory};
use crate::warning::WarningLevel;

/// Flags absorbing barriers at or past their warning threshold.
#[derive(Debug, Clone)]
pub struct BarrierSensor {
    config: SensorConfig,
}

impl BarrierSensor {
    /// Create a new barrier sensor.
    pub fn new(config: SensorConfig) -> Self {
        Self { config }
    }

    fn severity(&self, barrier: &Barrier) -> WarningLevel {
        let threshold = barrier.warning_threshold;
        if barrier.proximity < threshold {
            WarningLevel::Safe
        } else if barrier.impact == BarrierImpact::Irreversible
            && barrier.proximity >= self.config.barrier_hit
        {
            WarningLevel::Critical
        } else if barrier.proximity >= (threshold + 1.0) / 2.0 {
            WarningLevel::Warning
        } else {
            WarningLevel::Caution
        }
    }
}

impl RiskSensor for BarrierSensor {
    fn name(&self) -> &'static str {
        "barrier_proximity"
    }

    fn evaluate(&self, memory: &PathMemory, _context: &SensorContext) -> SensorReading {
        if memory.path_history.is_empty() {
            return SensorReading::safe(self.name(), 0.0);
        }

        let mut severity = WarningLevel::Safe;
        let mut indicators = Vec::new();
        for barrier in &memory.absorbing_barriers {
            let level = self.severity(barrier);
            if level > WarningLevel::Safe {
                indicators.push(format!(
                    "{} proximity {:.2} (threshold {:.2}, {:?} impact)",
                    barrier.name, barrier.proximity, barrier.warning_threshold, barrier.impact
                ));
                severity = severity.max(level);
            }
        }

        SensorReading::new(self.name(), severity, indicators, 0.7)
    }
}
