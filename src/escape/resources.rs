//! Resource inventory: what the session still has available for an escape.

use serde::{Deserialize, Serialize};

use crate::config::EscapeConfig;
use crate::path_memory::{ConstraintKind, PathMemory};

/// Estimated resources, each in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceInventory {
    /// Time left before the session horizon
    pub time_available: f64,
    /// Attention left after the steps taken so far
    pub attention_budget: f64,
    /// Goodwill left with the people affected
    pub social_capital: f64,
    /// Room to change technical choices
    pub technical_capacity: f64,
    /// Budget not yet sunk
    pub financial_resources: f64,
    /// Backing for a change of direction
    pub organizational_support: f64,
    /// Weighted sum of the above
    pub available_resources: f64,
}

impl ResourceInventory {
    /// Lowest individual resource and its name.
    pub fn scarcest(&self) -> (&'static str, f64) {
        [
            ("time_available", self.time_available),
            ("attention_budget", self.attention_budget),
            ("social_capital", self.social_capital),
            ("technical_capacity", self.technical_capacity),
            ("financial_resources", self.financial_resources),
            ("organizational_support", self.organizational_support),
        ]
        .into_iter()
        .fold(("time_available", f64::INFINITY), |lowest, candidate| {
            if candidate.1 < lowest.1 {
                candidate
            } else {
                lowest
            }
        })
    }
}

/// Estimate the resources available for an escape.
///
/// Each prior reset-type decision costs `reset_penalty` of the social,
/// financial and organizational resources: repeated pivots erode support.
pub fn assess_resources(memory: &PathMemory, config: &EscapeConfig) -> ResourceInventory {
    let flexibility = memory.flexibility_score();
    let reset_cost = config.reset_penalty * memory.reset_count() as f64;
    let steps = memory.path_history.iter().filter(|e| !e.is_intervention()).count();

    let time_available = unit(1.0 - memory.session_hours() / config.time_horizon_hours.max(f64::EPSILON));
    let attention_budget =
        unit(1.0 - steps as f64 / config.attention_capacity_steps.max(1) as f64);
    let social_capital = unit(1.0 - memory.strongest(ConstraintKind::Relational) - reset_cost);
    let technical_capacity =
        unit(0.5 * flexibility + 0.5 * (1.0 - memory.strongest(ConstraintKind::Technical)));
    let financial_resources = unit(1.0 - memory.strongest(ConstraintKind::Resource) - reset_cost);
    let institutional = memory
        .strongest(ConstraintKind::Market)
        .max(memory.strongest(ConstraintKind::Regulatory));
    let organizational_support = unit(0.5 * flexibility + 0.5 * (1.0 - institutional) - reset_cost);

    let w = &config.resource_weights;
    let available_resources = unit(
        w.time * time_available
            + w.attention * attention_budget
            + w.social * social_capital
            + w.technical * technical_capacity
            + w.financial * financial_resources
            + w.organizational * organizational_support,
    );

    ResourceInventory {
        time_available,
        attention_budget,
        social_capital,
        technical_capacity,
        financial_resources,
        organizational_support,
        available_resources,
    }
}

#[inline]
fn unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}
