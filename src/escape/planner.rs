//! Escape planner: constraint analysis → resource inventory → protocol
//! selection → trajectory, with feasibility and success odds.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use super::constraints::{analyze_constraints, ConstraintAnalysis};
use super::protocols::{EscapeProtocol, ProtocolCatalog};
use super::resources::{assess_resources, ResourceInventory};
use super::trajectory::{build_execution_plan, synthesize_trajectory, EscapeTrajectory, ExecutionPlan};
use crate::config::EscapeConfig;
use crate::path_memory::PathMemory;

/// Full escape analysis for a session.
///
/// An infeasible escape is a normal result: `feasibility` is false and
/// `warnings` explains why.
#[derive(Debug, Clone, Serialize)]
pub struct EscapeAnalysis {
    /// Analyzed session
    pub session_id: String,
    /// Flexibility score at analysis time
    pub flexibility_score: f64,
    /// Constraint analysis
    pub constraints: ConstraintAnalysis,
    /// Resource inventory
    pub resources: ResourceInventory,
    /// Selected protocol
    pub protocol: EscapeProtocol,
    /// Combined constraint strength times the safety margin
    pub escape_force_needed: f64,
    /// Whether available resources cover the force needed
    pub feasibility: bool,
    /// Estimated probability the escape succeeds
    pub success_probability: f64,
    /// Phased trajectory
    pub trajectory: EscapeTrajectory,
    /// Step-by-step plan with contingencies
    pub execution_plan: ExecutionPlan,
    /// Textual flags
    pub warnings: Vec<String>,
    /// When the analysis ran
    pub analyzed_at: DateTime<Utc>,
}

/// Builds [`EscapeAnalysis`] values.
#[derive(Debug, Clone)]
pub struct EscapePlanner {
    config: EscapeConfig,
}

impl EscapePlanner {
    /// Create a new planner.
    pub fn new(config: EscapeConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &EscapeConfig {
        &self.config
    }

    /// Analyze constraints of a session without planning.
    pub fn analyze(&self, memory: &PathMemory) -> ConstraintAnalysis {
        analyze_constraints(memory, &self.config)
    }

    /// Plan an escape for a session.
    pub fn plan(&self, memory: &PathMemory, catalog: &ProtocolCatalog) -> EscapeAnalysis {
        let constraints = analyze_constraints(memory, &self.config);
        let resources = assess_resources(memory, &self.config);
        let flexibility_score = memory.flexibility_score();
        let protocol = catalog
            .recommend(flexibility_score, constraints.total_strength)
            .clone();

        let trajectory = synthesize_trajectory(&protocol, &constraints, &resources);
        let execution_plan = build_execution_plan(&trajectory);

        let escape_force_needed = constraints.total_strength * self.config.safety_margin;
        let available = resources.available_resources;
        let feasibility = available >= escape_force_needed;
        let success_probability = self.success_probability(
            available,
            escape_force_needed,
            protocol.success_probability,
            trajectory.phases.len(),
        );

        let warnings = self.warnings(
            &constraints,
            available,
            escape_force_needed,
            feasibility,
            success_probability,
        );

        debug!(
            session_id = %memory.session_id,
            protocol = %protocol.name,
            total_strength = constraints.total_strength,
            available = available,
            feasibility = feasibility,
            success_probability = success_probability,
            "Escape planned"
        );

        EscapeAnalysis {
            session_id: memory.session_id.clone(),
            flexibility_score,
            constraints,
            resources,
            protocol,
            escape_force_needed,
            feasibility,
            success_probability,
            trajectory,
            execution_plan,
            warnings,
            analyzed_at: Utc::now(),
        }
    }

    /// `min(cap, (available / needed) × prior × (1 − penalty × phases))`.
    /// With nothing to overcome the estimate is the cap.
    fn success_probability(&self, available: f64, needed: f64, prior: f64, phases: usize) -> f64 {
        // `max` maps NaN to 0.0.
        let cap = self.config.max_success_probability.max(0.0).min(1.0);
        if needed <= f64::EPSILON {
            return cap;
        }
        let phase_factor = (1.0 - self.config.phase_penalty * phases as f64).max(0.0);
        ((available / needed) * prior * phase_factor).max(0.0).min(cap)
    }

    fn warnings(
        &self,
        constraints: &ConstraintAnalysis,
        available: f64,
        needed: f64,
        feasibility: bool,
        success_probability: f64,
    ) -> Vec<String> {
        let c = &self.config;
        let mut warnings = Vec::new();

        if !feasibility {
            warnings.push(format!(
                "Resource gap: {:.2} available vs {:.2} needed",
                available, needed
            ));
        }
        if success_probability < c.low_success_threshold {
            warnings.push(format!(
                "Low success probability: {:.0}%",
                success_probability * 100.0
            ));
        }
        if constraints.total_strength > c.high_strength_threshold {
            warnings.push(format!(
                "Very high constraint strength: {:.2}",
                constraints.total_strength
            ));
        }
        if constraints.interaction_effect > c.high_interaction_threshold {
            warnings.push(format!(
                "High interaction effects across {} constraint categories: {:.2}",
                constraints.categories(),
                constraints.interaction_effect
            ));
        }
        if constraints.mean_breakability < c.low_breakability_threshold {
            warnings.push(format!(
                "Low breakability: constraints are hard to undo ({:.2})",
                constraints.mean_breakability
            ));
        }

        warnings
    }
}
