//! Cognitive sensor: repetitive decisions as a lock-in signal.

use std::collections::HashSet;

use super::{RiskSensor, SensorContext, SensorReading};
use crate::config::SensorConfig;
use crate::path_memory::PathMemory;
use crate::warning::WarningLevel;

/// Words shorter than this are ignored for lexical diversity.
const MIN_CONTENT_WORD: usize = 4;

/// Flags low lexical diversity across the most recent decisions.
#[derive(Debug, Clone)]
pub struct CognitiveSensor {
    config: SensorConfig,
}

impl CognitiveSensor {
    /// Create a new cognitive sensor.
    pub fn new(config: SensorConfig) -> Self {
        Self { config }
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Unique content words over total content words (1.0 when there are none).
fn lexical_diversity(outputs: &[String]) -> f64 {
    let words: Vec<String> = outputs
        .iter()
        .flat_map(|o| o.split(|c: char| !c.is_alphanumeric()))
        .filter(|w| w.chars().count() >= MIN_CONTENT_WORD)
        .map(|w| w.to_lowercase())
        .collect();
    if words.is_empty() {
        return 1.0;
    }
    let unique: HashSet<&String> = words.iter().collect();
    unique.len() as f64 / words.len() as f64
}

impl RiskSensor for CognitiveSensor {
    fn name(&self) -> &'static str {
        "cognitive"
    }

    fn evaluate(&self, _memory: &PathMemory, context: &SensorContext) -> SensorReading {
        let window = self.config.cognitive_window.max(1);
        let start = context.recent_outputs.len().saturating_sub(window);
        let outputs = &context.recent_outputs[start..];
        if outputs.len() < self.config.cognitive_min_history.max(2) {
            return SensorReading::safe(self.name(), 0.0);
        }

        let distinct: HashSet<String> = outputs.iter().map(|o| normalize(o)).collect();
        let repeated = outputs.len() - distinct.len();
        let repetition = repeated as f64 / outputs.len() as f64;
        let diversity = lexical_diversity(outputs);

        let repetitive = repetition >= self.config.repetition_threshold;
        let locked_wording = diversity < self.config.diversity_threshold;

        let mut indicators = Vec::new();
        if repetitive {
            indicators.push(format!(
                "Repetitive decision pattern: {} of {} recent decisions repeat earlier wording",
                repeated,
                outputs.len()
            ));
        }
        if locked_wording {
            indicators.push(format!(
                "Low lexical diversity ({:.2}) across the last {} decisions",
                diversity,
                outputs.len()
            ));
        }

        let severity = match (repetitive, locked_wording) {
            (true, true) => WarningLevel::Critical,
            (true, false) | (false, true) => WarningLevel::Warning,
            (false, false) if repeated > 0 && repetition >= self.config.repetition_threshold / 2.0 => {
                indicators.push(format!(
                    "Some decisions repeat: {} of {} recent decisions",
                    repeated,
                    outputs.len()
                ));
                WarningLevel::Caution
            }
            (false, false) => WarningLevel::Safe,
        };

        let confidence = (outputs.len() as f64 / window as f64).min(1.0);
        SensorReading::new(self.name(), severity, indicators, confidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path_memory::BarrierCatalog;

    fn context(outputs: &[&str]) -> SensorContext {
        SensorContext {
            session_id: "s".to_string(),
            evaluated_at: None,
            recent_outputs: outputs.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn evaluate(outputs: &[&str]) -> SensorReading {
        let memory = PathMemory::new("s", &BarrierCatalog::default());
        CognitiveSensor::new(SensorConfig::default()).evaluate(&memory, &context(outputs))
    }

    #[test]
    fn test_short_history_is_safe() {
        let reading = evaluate(&["same", "same", "same"]);
        assert_eq!(reading.severity, WarningLevel::Safe);
        assert!(reading.indicators.is_empty());
    }

    #[test]
    fn test_identical_decisions_flag_repetition() {
        let outputs = vec!["Keep refining the current login flow design"; 15];
        let reading = evaluate(&outputs);
        assert!(reading.severity >= WarningLevel::Warning);
        assert!(reading
            .indicators
            .iter()
            .any(|i| i.starts_with("Repetitive decision pattern")));
        assert_eq!(reading.confidence, 1.0);
    }

    #[test]
    fn test_case_and_spacing_do_not_hide_repetition() {
        let reading = evaluate(&[
            "Ship it now",
            "ship  it now",
            "SHIP IT NOW",
            "Ship it now ",
            "ship it now",
        ]);
        assert!(reading.indicators.iter().any(|i| i.contains("Repetitive")));
    }

    #[test]
    fn test_varied_decisions_are_safe() {
        let reading = evaluate(&[
            "Sketch three onboarding variants for mobile",
            "Interview support staff about churn causes",
            "Prototype pricing page with annual discount",
            "Benchmark competitor search latency numbers",
            "Draft migration plan for legacy billing tables",
        ]);
        assert_eq!(reading.severity, WarningLevel::Safe);
        assert!(reading.indicators.is_empty());
    }

    #[test]
    fn test_lexical_diversity() {
        assert_eq!(lexical_diversity(&[]), 1.0);
        let same = vec!["alpha alpha alpha alpha".to_string()];
        assert_eq!(lexical_diversity(&same), 0.25);
    }
}
