//! Flexibility calculator.
//!
//! Derives [`FlexibilityMetrics`] from a session's [`PathMemory`]. The
//! computation is a pure function of the memory: the same history always
//! yields the same metrics.
//!
//! # Score
//!
//! ```text
//! penalty   = Σ impact_weight × decay^age × commitment × reversibility   (last N decisions)
//! credit    = Σ uplift × decay^age                                       (interventions among them)
//! raw       = clamp(1 − penalty)
//! score     = min(clamp(raw + credit), ceiling)
//! ```
//!
//! `age` counts decisions recorded after an event; protocol audit events do
//! not age anything. `ceiling` is the previous score, so the score never rises
//! between steps. Only protocol execution lifts the ceiling. Its credit fades
//! as later decisions are recorded and is gone once the intervention leaves
//! the window, so fresh lock-in is always visible again.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::config::FlexibilityConfig;
use crate::path_memory::{BarrierSubtype, ConstraintKind, PathEvent, PathMemory};

/// Live distance to one absorbing barrier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarrierProximity {
    /// Barrier identifier
    pub barrier_id: String,
    /// Proximity (0.0-1.0, 1.0 = hit)
    pub proximity: f64,
    /// Remaining distance (1 - proximity)
    pub distance: f64,
    /// Change in proximity since the previous recomputation (positive = approaching)
    pub approach_rate: f64,
}

/// Flexibility metrics, recomputed on every step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlexibilityMetrics {
    /// Remaining decision optionality (0.0-1.0)
    pub flexibility_score: f64,
    /// Fraction of decisions still undoable (0.0-1.0)
    pub reversibility_index: f64,
    /// Distance travelled from the initial state (uncapped)
    pub path_divergence: f64,
    /// Per-barrier proximity readings
    pub barrier_proximities: Vec<BarrierProximity>,
    /// Options opened minus options closed per step, over the option window
    pub option_velocity: f64,
    /// Running mean commitment level
    pub commitment_depth: f64,
}

impl Default for FlexibilityMetrics {
    fn default() -> Self {
        Self {
            flexibility_score: 1.0,
            reversibility_index: 1.0,
            path_divergence: 0.0,
            barrier_proximities: Vec::new(),
            option_velocity: 0.0,
            commitment_depth: 0.0,
        }
    }
}

impl FlexibilityMetrics {
    /// Proximity reading for a barrier, if computed.
    pub fn proximity(&self, barrier_id: &str) -> Option<&BarrierProximity> {
        self.barrier_proximities
            .iter()
            .find(|p| p.barrier_id == barrier_id)
    }
}

/// Computes [`FlexibilityMetrics`] from path memory.
#[derive(Debug, Clone)]
pub struct FlexibilityCalculator {
    config: FlexibilityConfig,
}

impl FlexibilityCalculator {
    /// Create a new calculator.
    pub fn new(config: FlexibilityConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &FlexibilityConfig {
        &self.config
    }

    /// Flexibility implied by decisions alone, before recovery credit and ceiling.
    pub fn raw_score(&self, history: &[PathEvent]) -> f64 {
        let penalty: f64 = history
            .iter()
            .rev()
            .filter(|e| !e.is_intervention())
            .take(self.config.history_window)
            .enumerate()
            .map(|(age, event)| {
                self.config.impact_weight * self.config.decay.powi(age as i32) * event.impact()
            })
            .sum();
        (1.0 - penalty).clamp(0.0, 1.0)
    }

    /// Uplift still owed to the session by recent protocol interventions.
    ///
    /// Each intervention's uplift decays with the number of decisions
    /// recorded after it and stops counting once `history_window`
    /// decisions have followed it.
    pub fn recovery_credit(&self, history: &[PathEvent]) -> f64 {
        let mut credit = 0.0;
        let mut age = 0usize;
        for event in history.iter().rev() {
            if event.is_intervention() {
                credit += event.recovery_uplift * self.config.decay.powi(age as i32);
            } else {
                age += 1;
                if age >= self.config.history_window {
                    break;
                }
            }
        }
        credit
    }

    /// Recompute all metrics for the session.
    ///
    /// An empty history yields the maximal-flexibility defaults.
    pub fn recompute(&self, memory: &PathMemory) -> FlexibilityMetrics {
        let history = &memory.path_history;
        if history.is_empty() {
            return FlexibilityMetrics::default();
        }

        let candidate =
            (self.raw_score(history) + self.recovery_credit(history)).clamp(0.0, 1.0);
        let flexibility_score = candidate.min(memory.flexibility_ceiling).clamp(0.0, 1.0);

        let count = history.len() as f64;
        let reversible = history.iter().filter(|e| e.reversibility_cost < 0.5).count() as f64;
        let reversibility_index = reversible / count;
        let commitment_depth = history.iter().map(|e| e.commitment_level).sum::<f64>() / count;
        let path_divergence = history
            .iter()
            .map(|e| (self.config.divergence_base + e.commitment_level) * self.config.divergence_scale)
            .sum();
        let option_velocity = self.option_velocity(memory.recent_events(self.config.option_window));

        let mut metrics = FlexibilityMetrics {
            flexibility_score,
            reversibility_index,
            path_divergence,
            barrier_proximities: Vec::new(),
            option_velocity,
            commitment_depth,
        };
        metrics.barrier_proximities = self.barrier_proximities(memory, &metrics);
        metrics
    }

    /// Distinct options opened minus distinct options closed, per event.
    fn option_velocity(&self, window: &[PathEvent]) -> f64 {
        if window.is_empty() {
            return 0.0;
        }
        let opened: BTreeSet<&String> = window.iter().flat_map(|e| &e.options_opened).collect();
        let closed: BTreeSet<&String> = window.iter().flat_map(|e| &e.options_closed).collect();
        (opened.len() as f64 - closed.len() as f64) / window.len() as f64
    }

    fn barrier_proximities(
        &self,
        memory: &PathMemory,
        metrics: &FlexibilityMetrics,
    ) -> Vec<BarrierProximity> {
        let blend = self.config.barrier_blend.clamp(0.0, 1.0);
        let flexibility_loss = 1.0 - metrics.flexibility_score;

        memory
            .absorbing_barriers
            .iter()
            .map(|barrier| {
                let driver = self.driver(barrier.subtype, memory, metrics).clamp(0.0, 1.0);
                let proximity = (blend * flexibility_loss + (1.0 - blend) * driver).clamp(0.0, 1.0);
                BarrierProximity {
                    barrier_id: barrier.id.clone(),
                    proximity,
                    distance: 1.0 - proximity,
                    approach_rate: proximity - barrier.proximity,
                }
            })
            .collect()
    }

    /// Subtype-specific evidence of approach, in [0, 1].
    fn driver(
        &self,
        subtype: BarrierSubtype,
        memory: &PathMemory,
        metrics: &FlexibilityMetrics,
    ) -> f64 {
        let window = memory.recent_events(self.config.option_window);
        match subtype {
            BarrierSubtype::CognitiveLockIn => metrics.commitment_depth,
            BarrierSubtype::AnalysisParalysis => {
                if window.len() < self.config.concentration_min_events {
                    return 0.0;
                }
                fraction(window, |e| e.commitment_level < self.config.indecision_level)
            }
            BarrierSubtype::PerfectionismSpiral => {
                if window.len() < self.config.option_window {
                    return 0.0;
                }
                fraction(window, |e| e.options_opened.is_empty() && e.options_closed.is_empty())
            }
            BarrierSubtype::ExpertiseTrap => {
                technique_concentration(&memory.path_history, self.config.concentration_min_events)
            }
            BarrierSubtype::ConsensusTrap => {
                0.5 * memory.strongest(ConstraintKind::Relational) + 0.5 * metrics.commitment_depth
            }
            BarrierSubtype::NoveltyExhaustion => (-metrics.option_velocity).max(0.0),
            BarrierSubtype::FrameFixation => memory.strongest(ConstraintKind::Creative),
            BarrierSubtype::IrreversibleCommitment => 1.0 - metrics.reversibility_index,
            BarrierSubtype::ResourceDepletion => memory.strongest(ConstraintKind::Resource),
            BarrierSubtype::TechnicalLockIn => memory.strongest(ConstraintKind::Technical),
            BarrierSubtype::ReputationDamage => {
                0.5 * (memory.strongest(ConstraintKind::Market)
                    + memory.strongest(ConstraintKind::Relational))
            }
            BarrierSubtype::MarketLockout => memory.strongest(ConstraintKind::Market),
            BarrierSubtype::RegulatoryViolation => memory.strongest(ConstraintKind::Regulatory),
            BarrierSubtype::StakeholderAlienation => memory.strongest(ConstraintKind::Relational),
        }
    }
}

fn fraction(events: &[PathEvent], predicate: impl Fn(&PathEvent) -> bool) -> f64 {
    if events.is_empty() {
        return 0.0;
    }
    events.iter().filter(|e| predicate(e)).count() as f64 / events.len() as f64
}

/// Share of decisions produced by the most-used technique.
fn technique_concentration(history: &[PathEvent], min_events: usize) -> f64 {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut total = 0usize;
    for event in history.iter().filter(|e| !e.is_intervention()) {
        *counts.entry(event.technique.as_str()).or_default() += 1;
        total += 1;
    }
    if total < min_events {
        return 0.0;
    }
    counts.values().copied().max().unwrap_or(0) as f64 / total as f64
}
