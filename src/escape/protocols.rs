//! Escape protocol catalog.
//!
//! The catalog is an immutable value built once and handed to the engine.
//! Protocols are ordered by escalation level; each declares the flexibility
//! band it is appropriate for and the uplift it applies when executed.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::path_memory::EscapeRoute;
use crate::warning::WarningState;

/// A named remediation procedure for regaining flexibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscapeProtocol {
    /// Protocol name
    pub name: String,
    /// Escalation level (1 = gentlest)
    pub level: u8,
    /// What the protocol does
    pub description: String,
    /// Lowest flexibility score the protocol is appropriate for (inclusive)
    pub min_flexibility: f64,
    /// Highest flexibility score the protocol is appropriate for (exclusive, except at 1.0)
    pub max_flexibility: f64,
    /// Strongest combined constraint the protocol can break
    pub max_constraint_strength: f64,
    /// Flexibility added on execution
    pub uplift: f64,
    /// Ordered steps
    pub steps: Vec<String>,
    /// Duration label
    pub execution_time: String,
    /// Prior success probability (not measured)
    pub success_probability: f64,
    /// Options the intervention reopens
    pub opens_options: Vec<String>,
}

impl EscapeProtocol {
    /// Whether the score falls inside the protocol's applicability band.
    pub fn applies_to(&self, flexibility: f64) -> bool {
        flexibility >= self.min_flexibility
            && (flexibility < self.max_flexibility || self.max_flexibility >= 1.0)
    }

    /// Whether the session still has enough flexibility to run the protocol.
    pub fn reachable_at(&self, flexibility: f64) -> bool {
        flexibility >= self.min_flexibility
    }

    /// Route entry listed on the session's path memory.
    pub fn to_route(&self) -> EscapeRoute {
        EscapeRoute {
            name: self.name.clone(),
            level: self.level,
            steps: self.steps.clone(),
            execution_time: self.execution_time.clone(),
            success_probability: self.success_probability,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn protocol(
    name: &str,
    level: u8,
    description: &str,
    band: (f64, f64),
    max_constraint_strength: f64,
    uplift: f64,
    steps: &[&str],
    execution_time: &str,
    success_probability: f64,
    opens: &[&str],
) -> EscapeProtocol {
    EscapeProtocol {
        name: name.to_string(),
        level,
        description: description.to_string(),
        min_flexibility: band.0,
        max_flexibility: band.1,
        max_constraint_strength,
        uplift,
        steps: steps.iter().map(|s| s.to_string()).collect(),
        execution_time: execution_time.to_string(),
        success_probability,
        opens_options: opens.iter().map(|s| s.to_string()).collect(),
    }
}

/// Immutable list of escape protocols, ordered by level.
#[derive(Debug, Clone)]
pub struct ProtocolCatalog {
    protocols: Vec<EscapeProtocol>,
}

impl ProtocolCatalog {
    /// Create a catalog. Protocols are sorted by level; an empty list is rejected.
    pub fn new(mut protocols: Vec<EscapeProtocol>) -> EngineResult<Self> {
        if protocols.is_empty() {
            return Err(EngineError::InvalidCatalog {
                message: "catalog must contain at least one protocol".to_string(),
            });
        }
        protocols.sort_by_key(|p| p.level);
        Ok(Self { protocols })
    }

    /// Every protocol, ordered by level.
    pub fn protocols(&self) -> &[EscapeProtocol] {
        &self.protocols
    }

    /// Look up a protocol by name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&EscapeProtocol> {
        self.protocols
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Number of protocols.
    pub fn len(&self) -> usize {
        self.protocols.len()
    }

    /// Always false for a constructed catalog.
    pub fn is_empty(&self) -> bool {
        self.protocols.is_empty()
    }

    /// Protocol used when the score is below every band: the level-1 entry.
    pub fn fallback(&self) -> &EscapeProtocol {
        &self.protocols[0]
    }

    /// Select the protocol for a flexibility score and combined constraint strength.
    ///
    /// The band containing the score wins. When the constraints are stronger
    /// than that protocol can break, the next level is used instead. Scores
    /// below every band fall back to [`ProtocolCatalog::fallback`], so some
    /// protocol is always returned.
    pub fn recommend(&self, flexibility: f64, total_strength: f64) -> &EscapeProtocol {
        let flexibility = unit_or_zero(flexibility);
        let total_strength = unit_or_zero(total_strength);

        match self.protocols.iter().position(|p| p.applies_to(flexibility)) {
            Some(index) => {
                let selected = &self.protocols[index];
                if total_strength > selected.max_constraint_strength {
                    self.protocols.get(index + 1).unwrap_or(selected)
                } else {
                    selected
                }
            }
            None => self.fallback(),
        }
    }

    /// Routes still reachable at a flexibility score. Never empty: the
    /// fallback is listed when nothing else is reachable.
    pub fn routes_at(&self, flexibility: f64) -> Vec<EscapeRoute> {
        let routes: Vec<EscapeRoute> = self
            .protocols
            .iter()
            .filter(|p| p.reachable_at(flexibility))
            .map(EscapeProtocol::to_route)
            .collect();
        if routes.is_empty() {
            vec![self.fallback().to_route()]
        } else {
            routes
        }
    }
}

fn unit_or_zero(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

impl Default for ProtocolCatalog {
    fn default() -> Self {
        Self {
            protocols: vec![
                protocol(
                    "Pattern Interruption",
                    1,
                    "Break the current line of reasoning and force a fresh perspective",
                    (0.5, 1.0),
                    0.3,
                    0.10,
                    &[
                        "Stop the current technique and summarize where the session stands",
                        "Apply a random-entry stimulus unrelated to the problem",
                        "List three assumptions the recent decisions depend on",
                        "Choose one assumption to deliberately violate",
                    ],
                    "15-30 minutes",
                    0.7,
                    &["alternative_framing"],
                ),
                protocol(
                    "Resource Reallocation",
                    2,
                    "Free committed time and effort and redirect it to unexplored options",
                    (0.4, 0.5),
                    0.5,
                    0.15,
                    &[
                        "Inventory where effort has been committed",
                        "Identify commitments with the lowest marginal return",
                        "Release those commitments explicitly",
                        "Redirect the freed capacity to a new option",
                    ],
                    "1-2 hours",
                    0.65,
                    &["reallocated_capacity"],
                ),
                protocol(
                    "Stakeholder Reset",
                    3,
                    "Renegotiate commitments made to people to reopen closed options",
                    (0.3, 0.4),
                    0.6,
                    0.20,
                    &[
                        "Map stakeholders affected by the binding decisions",
                        "Explain what changed and why the current path is constrained",
                        "Negotiate which commitments can be relaxed",
                        "Confirm the revised expectations in writing",
                    ],
                    "1-3 days",
                    0.6,
                    &["renegotiated_commitments"],
                ),
                protocol(
                    "Technical Refactoring",
                    4,
                    "Decouple locked-in technical choices so they can be replaced",
                    (0.2, 0.3),
                    0.8,
                    0.25,
                    &[
                        "Identify the components the constraints couple together",
                        "Introduce boundaries so each component can change independently",
                        "Replace the most binding component behind its boundary",
                        "Verify the old path is no longer required",
                    ],
                    "1-2 weeks",
                    0.55,
                    &["modular_boundaries"],
                ),
                protocol(
                    "Strategic Pivot",
                    5,
                    "Abandon the current direction and restart from a new strategic premise",
                    (0.1, 0.2),
                    1.0,
                    0.35,
                    &[
                        "Acknowledge that the current path is no longer viable",
                        "Salvage reusable assets and lessons",
                        "Define a new premise that avoids the binding constraints",
                        "Restart the session from the new premise",
                        "Communicate the pivot to everyone affected",
                    ],
                    "2-4 weeks",
                    0.5,
                    &["new_strategic_direction"],
                ),
            ],
        }
    }
}

// ============================================================================
// Execution
// ============================================================================

/// Parameters for executing a protocol.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecuteProtocolParams {
    /// Protocol name
    pub protocol: String,
    /// Require explicit confirmation before applying
    #[serde(default)]
    pub require_confirmation: bool,
    /// Whether confirmation was granted
    #[serde(default)]
    pub confirmed: bool,
}

impl ExecuteProtocolParams {
    /// Execute without asking for confirmation.
    pub fn new(protocol: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            ..Default::default()
        }
    }

    /// Require confirmation, recording whether it was granted.
    pub fn with_confirmation(mut self, confirmed: bool) -> Self {
        self.require_confirmation = true;
        self.confirmed = confirmed;
        self
    }

    /// Whether the protocol should actually be applied.
    pub fn is_authorized(&self) -> bool {
        !self.require_confirmation || self.confirmed
    }
}

/// Outcome of a protocol execution.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    /// Protocol name
    pub protocol: String,
    /// Flexibility before execution
    pub flexibility_before: f64,
    /// Flexibility after execution (equal to before when not executed)
    pub flexibility_after: f64,
    /// Whether the uplift was applied
    pub executed: bool,
    /// Audit event appended to the path history
    pub audit_event_id: Option<String>,
    /// Warning state re-evaluated after execution
    pub warning_state: Option<WarningState>,
}
