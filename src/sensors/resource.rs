//! Resource sensor: fatigue and depletion.

use super::{RiskSensor, SensorContext, SensorReading};
use crate::config::SensorConfig;
use crate::path_memory::PathMemory;
use crate::warning::WarningLevel;

/// Flags long sessions, especially once new options stop appearing.
#[derive(Debug, Clone)]
pub struct ResourceSensor {
    config: SensorConfig,
}

impl ResourceSensor {
    /// Create a new resource sensor.
    pub fn new(config: SensorConfig) -> Self {
        Self { config }
    }
}

impl RiskSensor for ResourceSensor {
    fn name(&self) -> &'static str {
        "resource"
    }

    fn evaluate(&self, memory: &PathMemory, _context: &SensorContext) -> SensorReading {
        let window_size = self.config.resource_window.max(1);
        let history = &memory.path_history;
        if history.is_empty() {
            return SensorReading::safe(self.name(), 0.0);
        }

        let hours = memory.session_hours();
        let recent = memory.recent_events(window_size);
        let recent_new: usize = recent.iter().map(|e| e.options_opened.len()).sum();
        let stalled = recent.len() >= window_size && recent_new == 0;

        // Creation rate in the window before the recent one.
        let earlier_end = history.len().saturating_sub(window_size);
        let earlier_start = earlier_end.saturating_sub(window_size);
        let earlier = &history[earlier_start..earlier_end];
        let earlier_rate = if earlier.is_empty() {
            0.0
        } else {
            earlier.iter().map(|e| e.options_opened.len()).sum::<usize>() as f64
                / earlier.len() as f64
        };
        let recent_rate = recent_new as f64 / recent.len() as f64;
        let falling = earlier_rate > 0.0 && recent_rate < earlier_rate * self.config.stall_ratio;

        let mut indicators = Vec::new();
        if hours > self.config.fatigue_hours {
            indicators.push(format!(
                "Session length {:.1}h exceeds {:.1}h fatigue threshold",
                hours, self.config.fatigue_hours
            ));
        }
        if stalled {
            indicators.push(format!(
                "No new options created in the last {} decisions",
                recent.len()
            ));
        } else if falling {
            indicators.push(format!(
                "Option creation fell from {:.2} to {:.2} per decision",
                earlier_rate, recent_rate
            ));
        }

        let severity = if hours >= self.config.depletion_hours && stalled {
            WarningLevel::Critical
        } else if hours > self.config.fatigue_hours && (stalled || falling) {
            WarningLevel::Warning
        } else if hours > self.config.fatigue_hours || (stalled && falling) {
            WarningLevel::Caution
        } else {
            WarningLevel::Safe
        };

        if severity == WarningLevel::Safe {
            indicators.clear();
        }

        let confidence = (history.len() as f64 / window_size as f64).min(1.0);
        SensorReading::new(self.name(), severity, indicators, confidence)
    }
}
