//! Technical debt sensor: interdependency between constraints.

use std::collections::{BTreeMap, HashSet};

use super::{RiskSensor, SensorContext, SensorReading};
use crate::config::SensorConfig;
use crate::path_memory::PathMemory;
use crate::warning::WarningLevel;

/// Most shared options listed as indicators.
const MAX_SHARED_INDICATORS: usize = 3;

/// Flags constraints that reference overlapping options.
#[derive(Debug, Clone)]
pub struct TechnicalDebtSensor {
    config: SensorConfig,
}

impl TechnicalDebtSensor {
    /// Create a new technical debt sensor.
    pub fn new(config: SensorConfig) -> Self {
        Self { config }
    }
}

impl RiskSensor for TechnicalDebtSensor {
    fn name(&self) -> &'static str {
        "technical_debt"
    }

    fn evaluate(&self, memory: &PathMemory, _context: &SensorContext) -> SensorReading {
        let window = self.config.coupling_window.max(2);
        let start = memory.constraints.len().saturating_sub(window);
        let constraints = &memory.constraints[start..];
        if constraints.len() < 2 {
            return SensorReading::safe(self.name(), 0.0);
        }

        // Option -> indices of the constraints binding it, ascending.
        let mut holders: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (index, constraint) in constraints.iter().enumerate() {
            for option in &constraint.affected_options {
                holders.entry(option.as_str()).or_default().push(index);
            }
        }

        let mut coupled_pairs: HashSet<(usize, usize)> = HashSet::new();
        for indices in holders.values() {
            for (k, &a) in indices.iter().enumerate() {
                for &b in &indices[k + 1..] {
                    coupled_pairs.insert((a, b));
                }
            }
        }
        let pairs = constraints.len() * (constraints.len() - 1) / 2;
        let coupled = coupled_pairs.len();
        let coupling = coupled as f64 / pairs as f64;

        let mut shared: Vec<(&str, usize)> = holders
            .iter()
            .map(|(option, indices)| (*option, indices.len()))
            .filter(|(_, count)| *count >= 2)
            .collect();
        shared.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

        let severity = if coupling >= self.config.coupling_critical
            && constraints.len() >= self.config.coupling_min_constraints
        {
            WarningLevel::Critical
        } else if coupling >= self.config.coupling_warning {
            WarningLevel::Warning
        } else if coupling >= self.config.coupling_caution {
            WarningLevel::Caution
        } else {
            WarningLevel::Safe
        };

        let mut indicators = Vec::new();
        if severity > WarningLevel::Safe {
            indicators.push(format!(
                "Constraint coupling {:.0}%: {} of {} constraint pairs share options",
                coupling * 100.0,
                coupled,
                pairs
            ));
            for (option, count) in shared.iter().take(MAX_SHARED_INDICATORS) {
                indicators.push(format!("Option '{}' is bound by {} constraints", option, count));
            }
        }

        let confidence =
            (constraints.len() as f64 / self.config.coupling_min_constraints.max(1) as f64).min(1.0);
        SensorReading::new(self.name(), severity, indicators, confidence)
    }
}
