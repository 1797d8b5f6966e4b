//! Escape trajectory and execution plan synthesis.

use serde::{Deserialize, Serialize};

use super::constraints::ConstraintAnalysis;
use super::protocols::EscapeProtocol;
use super::resources::ResourceInventory;

/// Phase of an escape trajectory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    /// Free resources and secure agreement
    Preparation,
    /// Run the protocol steps
    Execution,
    /// Lock in the regained flexibility
    Consolidation,
}

impl PhaseKind {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseKind::Preparation => "preparation",
            PhaseKind::Execution => "execution",
            PhaseKind::Consolidation => "consolidation",
        }
    }
}

impl std::fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One phase of a trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPhase {
    /// Phase kind
    pub phase: PhaseKind,
    /// Actions in order
    pub actions: Vec<String>,
    /// Duration label
    pub duration: String,
    /// Resources the phase draws on
    pub required_resources: Vec<String>,
    /// Conditions that mark the phase complete
    pub success_criteria: Vec<String>,
    /// What to do if the phase fails
    pub rollback_plan: String,
}

/// Phased plan for executing a protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscapeTrajectory {
    /// Protocol being executed
    pub protocol: String,
    /// Preparation, Execution, Consolidation
    pub phases: Vec<TrajectoryPhase>,
    /// Phases with more than two success criteria
    pub critical_path: Vec<PhaseKind>,
}

/// Situation a contingency responds to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContingencyTrigger {
    /// Resources run out mid-escape
    ResourceShortage,
    /// People affected push back
    StakeholderResistance,
    /// A technical step fails
    TechnicalFailure,
}

/// Named fallback response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contingency {
    /// Triggering situation
    pub trigger: ContingencyTrigger,
    /// Response steps
    pub response: Vec<String>,
}

/// Step-by-step plan with checkpoints and contingencies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Protocol being executed
    pub protocol: String,
    /// Every action across phases, in order
    pub ordered_steps: Vec<String>,
    /// One checkpoint per phase
    pub checkpoints: Vec<String>,
    /// Resource shortage, stakeholder resistance, technical failure
    pub contingencies: Vec<Contingency>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Build the three-phase trajectory for a protocol.
pub fn synthesize_trajectory(
    protocol: &EscapeProtocol,
    constraints: &ConstraintAnalysis,
    resources: &ResourceInventory,
) -> EscapeTrajectory {
    let (scarcest, _) = resources.scarcest();
    let categories: Vec<&str> = constraints.items.iter().map(|i| i.category.as_str()).collect();
    let binding = if categories.is_empty() {
        "current commitments".to_string()
    } else {
        format!("{} constraints", categories.join(", "))
    };

    let preparation = TrajectoryPhase {
        phase: PhaseKind::Preparation,
        actions: vec![
            format!("Document the {} that bind the current path", binding),
            format!("Secure {} before starting", scarcest.replace('_', " ")),
            "Agree on the point at which the escape is abandoned".to_string(),
        ],
        duration: "10% of execution time".to_string(),
        required_resources: strings(&["time_available", "attention_budget"]),
        success_criteria: strings(&[
            "Binding constraints are listed with owners",
            "Resources for the execution phase are committed",
        ]),
        rollback_plan: "Nothing has changed yet; stop and record why".to_string(),
    };

    let execution = TrajectoryPhase {
        phase: PhaseKind::Execution,
        actions: protocol.steps.clone(),
        duration: protocol.execution_time.clone(),
        required_resources: strings(&[
            "attention_budget",
            "technical_capacity",
            "organizational_support",
        ]),
        success_criteria: vec![
            format!("Every {} step is complete", protocol.name),
            "At least one foreclosed option is available again".to_string(),
            "No new irreversible commitment was made".to_string(),
        ],
        rollback_plan: format!(
            "Stop after the current step of {} and restore the documented state",
            protocol.name
        ),
    };

    let consolidation = TrajectoryPhase {
        phase: PhaseKind::Consolidation,
        actions: strings(&[
            "Record which constraints were relaxed",
            "Re-run the risk assessment",
            "Set a checkpoint before the next high-commitment decision",
        ]),
        duration: "25% of execution time".to_string(),
        required_resources: strings(&["attention_budget", "social_capital"]),
        success_criteria: strings(&[
            "Warning level has dropped at least one band",
            "Reopened options are recorded as available",
            "Stakeholders acknowledge the new direction",
        ]),
        rollback_plan: "Keep the regained options and defer further changes".to_string(),
    };

    let phases = vec![preparation, execution, consolidation];
    let critical_path = phases
        .iter()
        .filter(|p| p.success_criteria.len() > 2)
        .map(|p| p.phase)
        .collect();

    EscapeTrajectory {
        protocol: protocol.name.clone(),
        phases,
        critical_path,
    }
}

/// Flatten a trajectory into an execution plan with contingencies.
pub fn build_execution_plan(trajectory: &EscapeTrajectory) -> ExecutionPlan {
    let ordered_steps = trajectory
        .phases
        .iter()
        .flat_map(|p| p.actions.iter().cloned())
        .collect();
    let checkpoints = trajectory
        .phases
        .iter()
        .map(|p| format!("End of {}: {}", p.phase, p.success_criteria.join("; ")))
        .collect();

    let contingencies = vec![
        Contingency {
            trigger: ContingencyTrigger::ResourceShortage,
            response: strings(&[
                "Pause at the next checkpoint",
                "Drop to the previous protocol level",
                "Reallocate effort from the lowest-value commitment",
            ]),
        },
        Contingency {
            trigger: ContingencyTrigger::StakeholderResistance,
            response: strings(&[
                "Share the constraint analysis with the people affected",
                "Negotiate a partial reset instead of a full one",
            ]),
        },
        Contingency {
            trigger: ContingencyTrigger::TechnicalFailure,
            response: vec![
                "Roll back to the last completed checkpoint".to_string(),
                format!("Retry {} with a narrower scope", trajectory.protocol),
            ],
        },
    ];

    ExecutionPlan {
        protocol: trajectory.protocol.clone(),
        ordered_steps,
        checkpoints,
        contingencies,
    }
}
