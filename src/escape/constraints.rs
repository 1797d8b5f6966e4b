//! Constraint analysis: how hard the session's constraints are to break.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::config::EscapeConfig;
use crate::path_memory::{ConstraintKind, PathMemory};

/// Constraints of one category, combined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintItem {
    /// Constraint category
    pub category: ConstraintKind,
    /// Number of constraints combined (0 for the history-derived baseline)
    pub count: usize,
    /// Mean strength
    pub strength: f64,
    /// Ease of breaking (1 - break cost)
    pub flexibility: f64,
    /// Mean reversibility cost
    pub break_cost: f64,
    /// Other categories sharing affected options with this one
    pub dependencies: Vec<ConstraintKind>,
}

/// Combined view of every constraint in a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintAnalysis {
    /// One item per category present
    pub items: Vec<ConstraintItem>,
    /// Mean strength across items
    pub mean_strength: f64,
    /// Extra strength from heterogeneous, interdependent categories
    pub interaction_effect: f64,
    /// `mean_strength × (1 + interaction_effect)`, clamped to [0, 1]
    pub total_strength: f64,
    /// Mean ease of breaking across items (1.0 with no items)
    pub mean_breakability: f64,
    /// Category pairs sharing affected options
    pub dependency_pairs: usize,
}

impl ConstraintAnalysis {
    fn empty() -> Self {
        Self {
            items: Vec::new(),
            mean_strength: 0.0,
            interaction_effect: 0.0,
            total_strength: 0.0,
            mean_breakability: 1.0,
            dependency_pairs: 0,
        }
    }

    /// Number of distinct categories.
    pub fn categories(&self) -> usize {
        self.items.len()
    }
}

/// Analyze the constraints of a session.
///
/// A session with history but no synthesized constraints is still bound by
/// its commitments, so it is analyzed as a single cognitive item built from
/// commitment depth and reversibility.
pub fn analyze_constraints(memory: &PathMemory, config: &EscapeConfig) -> ConstraintAnalysis {
    let items = if memory.constraints.is_empty() {
        match baseline_item(memory) {
            Some(item) => vec![item],
            None => return ConstraintAnalysis::empty(),
        }
    } else {
        category_items(memory)
    };

    let dependency_pairs = items.iter().map(|i| i.dependencies.len()).sum::<usize>() / 2;
    let n = items.len() as f64;
    let mean_strength = items.iter().map(|i| i.strength).sum::<f64>() / n;
    let mean_breakability = items.iter().map(|i| i.flexibility).sum::<f64>() / n;

    let interaction_effect = (config.interaction_per_category * (n - 1.0)
        + config.interaction_per_dependency * dependency_pairs as f64)
        .max(0.0)
        .min(config.interaction_cap.max(0.0));
    let total_strength = (mean_strength * (1.0 + interaction_effect)).clamp(0.0, 1.0);

    ConstraintAnalysis {
        items,
        mean_strength,
        interaction_effect,
        total_strength,
        mean_breakability,
        dependency_pairs,
    }
}

fn baseline_item(memory: &PathMemory) -> Option<ConstraintItem> {
    if !memory.path_history.iter().any(|e| !e.is_intervention()) {
        return None;
    }
    let metrics = &memory.current_flexibility;
    Some(ConstraintItem {
        category: ConstraintKind::Cognitive,
        count: 0,
        strength: metrics.commitment_depth,
        flexibility: metrics.reversibility_index,
        break_cost: 1.0 - metrics.reversibility_index,
        dependencies: Vec::new(),
    })
}

fn category_items(memory: &PathMemory) -> Vec<ConstraintItem> {
    let mut by_kind: BTreeMap<ConstraintKind, (Vec<f64>, Vec<f64>, BTreeSet<&str>)> = BTreeMap::new();
    for constraint in &memory.constraints {
        let entry = by_kind.entry(constraint.kind).or_default();
        entry.0.push(constraint.strength);
        entry.1.push(constraint.reversibility_cost);
        entry.2.extend(constraint.affected_options.iter().map(String::as_str));
    }

    by_kind
        .iter()
        .map(|(kind, (strengths, costs, options))| {
            let count = strengths.len();
            let strength = strengths.iter().sum::<f64>() / count as f64;
            let break_cost = costs.iter().sum::<f64>() / count as f64;
            let dependencies = by_kind
                .iter()
                .filter(|(other, (_, _, other_options))| {
                    *other != kind && !options.is_disjoint(other_options)
                })
                .map(|(other, _)| *other)
                .collect();

            ConstraintItem {
                category: *kind,
                count,
                strength,
                flexibility: 1.0 - break_cost,
                break_cost,
                dependencies,
            }
        })
        .collect()
}
