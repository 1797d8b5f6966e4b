//! Path memory: the per-session record of decisions and the constraints they created.
//!
//! [`PathMemory`] is the session-scoped aggregate. It is only mutated through
//! [`PathMemory::append_step`] (called by the engine's `record_step`) and
//! [`PathMemory::append_intervention`] (called when an escape protocol runs).
//! History is never pruned: later sensors read it as evidence.

mod barriers;

pub use barriers::*;

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::ConstraintConfig;
use crate::flexibility::FlexibilityMetrics;

/// Technique tag used for audit events appended by protocol execution.
pub const INTERVENTION_TECHNIQUE: &str = "escape_protocol";

/// Words in a decision that mark it as a reset-type decision.
const RESET_MARKERS: &[&str] = &["reset", "pivot", "restart", "start over", "undo", "rollback"];

/// Clamp a numeric input into [0, 1], logging any correction.
///
/// Upstream scoring is noisy, so out-of-range values are corrected rather
/// than rejected. NaN is treated as 0.0.
pub fn clamp_unit(field: &str, value: f64) -> f64 {
    if value.is_nan() {
        warn!(field = %field, "Non-numeric input replaced with 0.0");
        return 0.0;
    }
    let clamped = value.clamp(0.0, 1.0);
    if clamped != value {
        warn!(
            field = %field,
            original = value,
            clamped = clamped,
            "Out-of-range input clamped to [0, 1]"
        );
    }
    clamped
}

// ============================================================================
// Constraints
// ============================================================================

/// Category of a durable restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    /// Architecture or implementation lock-in
    Technical,
    /// Time, budget or energy committed
    Resource,
    /// A mental frame that is hard to leave
    Cognitive,
    /// Commitments made to people
    Relational,
    /// Positioning that the market now expects
    Market,
    /// Compliance obligations
    Regulatory,
    /// A creative direction that has been locked in
    Creative,
}

impl ConstraintKind {
    /// Every kind, in declaration order.
    pub const ALL: [ConstraintKind; 7] = [
        ConstraintKind::Technical,
        ConstraintKind::Resource,
        ConstraintKind::Cognitive,
        ConstraintKind::Relational,
        ConstraintKind::Market,
        ConstraintKind::Regulatory,
        ConstraintKind::Creative,
    ];

    /// Infer the kind of constraint a technique tends to create.
    pub fn from_technique(technique: &str) -> Self {
        match technique.to_lowercase().as_str() {
            "six_hats" | "po" | "concept_extraction" | "neural_state" | "first_principles" => {
                ConstraintKind::Cognitive
            }
            "scamper" | "random_entry" | "disney_method" | "biomimetic_path" => {
                ConstraintKind::Creative
            }
            "design_thinking" | "yes_and" | "cross_cultural" | "collective_intel" => {
                ConstraintKind::Relational
            }
            "temporal_work" | "paradoxical_problem" => ConstraintKind::Resource,
            "market_analysis" | "competitive_positioning" => ConstraintKind::Market,
            "compliance_review" => ConstraintKind::Regulatory,
            _ => ConstraintKind::Technical,
        }
    }

    /// Get the kind name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ConstraintKind::Technical => "technical",
            ConstraintKind::Resource => "resource",
            ConstraintKind::Cognitive => "cognitive",
            ConstraintKind::Relational => "relational",
            ConstraintKind::Market => "market",
            ConstraintKind::Regulatory => "regulatory",
            ConstraintKind::Creative => "creative",
        }
    }
}

impl std::fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ConstraintKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "technical" => Ok(ConstraintKind::Technical),
            "resource" => Ok(ConstraintKind::Resource),
            "cognitive" => Ok(ConstraintKind::Cognitive),
            "relational" => Ok(ConstraintKind::Relational),
            "market" => Ok(ConstraintKind::Market),
            "regulatory" => Ok(ConstraintKind::Regulatory),
            "creative" => Ok(ConstraintKind::Creative),
            _ => Err(format!("Unknown constraint kind: {}", s)),
        }
    }
}

/// A durable restriction created by a recorded decision. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    /// Unique constraint identifier.
    pub id: String,
    /// Category of the restriction.
    pub kind: ConstraintKind,
    /// Human-readable description.
    pub description: String,
    /// ID of the path event that created it.
    pub created_by: String,
    /// Strength (0.0-1.0).
    pub strength: f64,
    /// Options the restriction touches.
    pub affected_options: BTreeSet<String>,
    /// Cost of undoing the restriction (0.0-1.0).
    pub reversibility_cost: f64,
}

// ============================================================================
// Path Events
// ============================================================================

/// Caller-supplied summary of one decision, already reduced to numeric fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepDelta {
    /// Options this decision opened
    #[serde(default)]
    pub options_opened: Vec<String>,
    /// Options this decision closed
    #[serde(default)]
    pub options_closed: Vec<String>,
    /// Cost of reversing the decision (1.0 = irreversible)
    #[serde(default)]
    pub reversibility_cost: f64,
    /// How strongly the session committed to the decision
    #[serde(default)]
    pub commitment_level: f64,
    /// When the decision was made (defaults to now)
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl StepDelta {
    /// Create a delta with the given reversibility cost and commitment level.
    pub fn new(reversibility_cost: f64, commitment_level: f64) -> Self {
        Self {
            reversibility_cost,
            commitment_level,
            ..Default::default()
        }
    }

    /// Add options opened by the decision.
    pub fn with_opened<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options_opened.extend(options.into_iter().map(Into::into));
        self
    }

    /// Add options closed by the decision.
    pub fn with_closed<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options_closed.extend(options.into_iter().map(Into::into));
        self
    }

    /// Set the decision timestamp.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// One recorded decision. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathEvent {
    /// Unique event identifier.
    pub id: String,
    /// When the decision was made.
    pub timestamp: DateTime<Utc>,
    /// Reasoning technique that produced the decision.
    pub technique: String,
    /// Step number within the technique (>= 1).
    pub step: u32,
    /// Decision text.
    pub decision: String,
    /// Options opened.
    pub options_opened: BTreeSet<String>,
    /// Options closed.
    pub options_closed: BTreeSet<String>,
    /// Cost of reversal (0.0-1.0, 1.0 = irreversible).
    pub reversibility_cost: f64,
    /// Commitment level (0.0-1.0).
    pub commitment_level: f64,
    /// Constraint IDs created together with this event.
    pub constraints_created: Vec<String>,
    /// Flexibility granted by the protocol this audit event records (0.0 for decisions).
    #[serde(default)]
    pub recovery_uplift: f64,
}

impl PathEvent {
    /// Weighted irreversibility of the decision.
    #[inline]
    pub fn impact(&self) -> f64 {
        self.commitment_level * self.reversibility_cost
    }

    /// Whether this is an audit event appended by protocol execution.
    pub fn is_intervention(&self) -> bool {
        self.technique == INTERVENTION_TECHNIQUE
    }

    /// Whether the decision reset or pivoted the session.
    pub fn is_reset(&self) -> bool {
        if self.is_intervention() {
            return true;
        }
        let text = self.decision.to_lowercase();
        RESET_MARKERS.iter().any(|marker| text.contains(marker))
    }
}

/// A remediation route still reachable at the session's current flexibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscapeRoute {
    /// Protocol name.
    pub name: String,
    /// Escalation level (1 = gentlest).
    pub level: u8,
    /// Ordered steps.
    pub steps: Vec<String>,
    /// Duration label.
    pub execution_time: String,
    /// Prior success probability.
    pub success_probability: f64,
}

/// Changes produced by recording one step.
#[derive(Debug, Clone, Serialize)]
pub struct PathMemoryDelta {
    /// The appended event.
    pub event: PathEvent,
    /// Constraints synthesized by the step.
    pub new_constraints: Vec<Constraint>,
    /// Options that became available.
    pub newly_available: Vec<String>,
    /// Options that became foreclosed.
    pub newly_foreclosed: Vec<String>,
}

// ============================================================================
// Path Memory
// ============================================================================

/// Session-scoped record of all decisions and the constraints they created.
#[derive(Debug, Clone, Serialize)]
pub struct PathMemory {
    /// Owning session.
    pub session_id: String,
    /// When the session was opened.
    pub created_at: DateTime<Utc>,
    /// Events ordered by step, then insertion.
    pub path_history: Vec<PathEvent>,
    /// Constraints in creation order.
    pub constraints: Vec<Constraint>,
    /// Options closed and not since reopened.
    pub foreclosed_options: BTreeSet<String>,
    /// Options opened and not since closed.
    pub available_options: BTreeSet<String>,
    /// Metrics as of the latest recomputation.
    pub current_flexibility: FlexibilityMetrics,
    /// Barrier templates with live proximities.
    pub absorbing_barriers: Vec<Barrier>,
    /// IDs of events with both high commitment and high reversal cost.
    pub critical_decisions: Vec<String>,
    /// Protocols still reachable at the current flexibility.
    pub escape_routes: Vec<EscapeRoute>,
    /// Flexibility may never rise above this except through a protocol.
    pub(crate) flexibility_ceiling: f64,
}

impl PathMemory {
    /// Create an empty path memory for a new session.
    pub fn new(session_id: impl Into<String>, barriers: &BarrierCatalog) -> Self {
        Self {
            session_id: session_id.into(),
            created_at: Utc::now(),
            path_history: Vec::new(),
            constraints: Vec::new(),
            foreclosed_options: BTreeSet::new(),
            available_options: BTreeSet::new(),
            current_flexibility: FlexibilityMetrics::default(),
            absorbing_barriers: barriers.barriers().to_vec(),
            critical_decisions: Vec::new(),
            escape_routes: Vec::new(),
            flexibility_ceiling: 1.0,
        }
    }

    /// Record a decision, synthesizing constraints when it is both highly
    /// committed and hard to reverse.
    pub fn append_step(
        &mut self,
        technique: &str,
        step: u32,
        decision: &str,
        delta: StepDelta,
        policy: &ConstraintConfig,
    ) -> PathMemoryDelta {
        let step = if step == 0 {
            warn!(technique = %technique, "Step 0 corrected to 1");
            1
        } else {
            step
        };

        let mut event = PathEvent {
            id: format!("evt_{}", Uuid::new_v4()),
            timestamp: delta.timestamp.unwrap_or_else(Utc::now),
            technique: technique.to_string(),
            step,
            decision: decision.to_string(),
            options_opened: delta.options_opened.into_iter().collect(),
            options_closed: delta.options_closed.into_iter().collect(),
            reversibility_cost: clamp_unit("reversibility_cost", delta.reversibility_cost),
            commitment_level: clamp_unit("commitment_level", delta.commitment_level),
            constraints_created: Vec::new(),
            recovery_uplift: 0.0,
        };

        let new_constraints = synthesize_constraints(&event, policy);
        event.constraints_created = new_constraints.iter().map(|c| c.id.clone()).collect();

        if event.commitment_level > policy.commitment_threshold
            && event.reversibility_cost > policy.reversibility_threshold
        {
            self.critical_decisions.push(event.id.clone());
        }

        let (newly_available, newly_foreclosed) = self.apply_options(&event);
        self.constraints.extend(new_constraints.iter().cloned());
        self.insert_ordered(event.clone());

        debug!(
            session_id = %self.session_id,
            event_id = %event.id,
            step = event.step,
            constraints = new_constraints.len(),
            "Path event recorded"
        );

        PathMemoryDelta {
            event,
            new_constraints,
            newly_available,
            newly_foreclosed,
        }
    }

    /// Append the audit event that marks a protocol intervention.
    ///
    /// `uplift` is the flexibility the protocol granted; the calculator
    /// decays it as later decisions are recorded.
    pub fn append_intervention(
        &mut self,
        protocol: &str,
        opens: &[String],
        uplift: f64,
    ) -> PathEvent {
        let event = PathEvent {
            id: format!("evt_{}", Uuid::new_v4()),
            timestamp: self.latest_timestamp().unwrap_or_else(Utc::now),
            technique: INTERVENTION_TECHNIQUE.to_string(),
            step: self.max_step().max(1),
            decision: format!("Executed escape protocol: {}", protocol),
            options_opened: opens.iter().cloned().collect(),
            options_closed: BTreeSet::new(),
            reversibility_cost: 0.0,
            commitment_level: 0.0,
            constraints_created: Vec::new(),
            recovery_uplift: uplift.clamp(0.0, 1.0),
        };
        self.apply_options(&event);
        self.insert_ordered(event.clone());
        event
    }

    /// Store freshly computed metrics and copy live proximities onto the barriers.
    pub(crate) fn apply_metrics(&mut self, metrics: FlexibilityMetrics) {
        for barrier in &mut self.absorbing_barriers {
            if let Some(reading) = metrics.proximity(&barrier.id) {
                barrier.proximity = reading.proximity;
            }
        }
        self.flexibility_ceiling = metrics.flexibility_score;
        self.current_flexibility = metrics;
    }

    /// Raise flexibility by `uplift` (capped at 1.0) and lift the ceiling to
    /// match. Returns the (before, after) scores; the granted amount belongs
    /// on the intervention's audit event.
    pub(crate) fn grant_uplift(&mut self, uplift: f64) -> (f64, f64) {
        let before = self.current_flexibility.flexibility_score;
        let after = (before + uplift.max(0.0)).min(1.0);
        self.flexibility_ceiling = after;
        self.current_flexibility.flexibility_score = after;
        (before, after)
    }

    /// Update option sets, returning (newly available, newly foreclosed).
    fn apply_options(&mut self, event: &PathEvent) -> (Vec<String>, Vec<String>) {
        let mut newly_available = Vec::new();
        let mut newly_foreclosed = Vec::new();

        for option in &event.options_opened {
            self.foreclosed_options.remove(option);
            if self.available_options.insert(option.clone()) {
                newly_available.push(option.clone());
            }
        }
        for option in &event.options_closed {
            self.available_options.remove(option);
            if self.foreclosed_options.insert(option.clone()) {
                newly_foreclosed.push(option.clone());
            }
        }

        (newly_available, newly_foreclosed)
    }

    /// Insert keeping history ordered by step, ties in insertion order.
    fn insert_ordered(&mut self, event: PathEvent) {
        let position = self
            .path_history
            .partition_point(|existing| existing.step <= event.step);
        if position < self.path_history.len() {
            debug!(
                session_id = %self.session_id,
                step = event.step,
                "Out-of-order step inserted before later steps"
            );
        }
        self.path_history.insert(position, event);
    }

    /// The last `n` events (fewer if history is shorter).
    pub fn recent_events(&self, n: usize) -> &[PathEvent] {
        let start = self.path_history.len().saturating_sub(n);
        &self.path_history[start..]
    }

    /// Highest step recorded so far (0 when empty).
    pub fn max_step(&self) -> u32 {
        self.path_history.iter().map(|e| e.step).max().unwrap_or(0)
    }

    /// Latest decision timestamp.
    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.path_history.iter().map(|e| e.timestamp).max()
    }

    /// Time between the earliest and latest recorded decision.
    pub fn session_duration(&self) -> Duration {
        let earliest = self.path_history.iter().map(|e| e.timestamp).min();
        match (earliest, self.latest_timestamp()) {
            (Some(first), Some(last)) => last - first,
            _ => Duration::zero(),
        }
    }

    /// Elapsed session time in fractional hours.
    pub fn session_hours(&self) -> f64 {
        self.session_duration().num_seconds().max(0) as f64 / 3600.0
    }

    /// Number of reset-type decisions made so far.
    pub fn reset_count(&self) -> usize {
        self.path_history.iter().filter(|e| e.is_reset()).count()
    }

    /// Look up an event by ID.
    pub fn event(&self, id: &str) -> Option<&PathEvent> {
        self.path_history.iter().find(|e| e.id == id)
    }

    /// Strongest constraint of the given kind (0.0 when none exist).
    pub fn strongest(&self, kind: ConstraintKind) -> f64 {
        self.constraints
            .iter()
            .filter(|c| c.kind == kind)
            .map(|c| c.strength)
            .fold(0.0, f64::max)
    }

    /// Current flexibility score.
    #[inline]
    pub fn flexibility_score(&self) -> f64 {
        self.current_flexibility.flexibility_score
    }
}

/// Build the constraints a highly committed, hard-to-reverse step creates.
fn synthesize_constraints(event: &PathEvent, policy: &ConstraintConfig) -> Vec<Constraint> {
    if event.commitment_level <= policy.commitment_threshold
        || event.reversibility_cost <= policy.reversibility_threshold
    {
        return Vec::new();
    }

    let affected: BTreeSet<String> = if event.options_closed.is_empty() {
        std::iter::once(event.technique.clone()).collect()
    } else {
        event.options_closed.clone()
    };

    let kind = ConstraintKind::from_technique(&event.technique);
    let summary: String = event.decision.chars().take(80).collect();

    let mut constraints = vec![Constraint {
        id: format!("con_{}", Uuid::new_v4()),
        kind,
        description: format!("{} commitment at step {}: {}", kind, event.step, summary),
        created_by: event.id.clone(),
        strength: event.impact(),
        affected_options: affected.clone(),
        reversibility_cost: event.reversibility_cost,
    }];

    if kind != ConstraintKind::Resource
        && event.commitment_level > policy.secondary_threshold
        && event.reversibility_cost > policy.secondary_threshold
    {
        constraints.push(Constraint {
            id: format!("con_{}", Uuid::new_v4()),
            kind: ConstraintKind::Resource,
            description: format!(
                "Resources sunk into step {} would be lost on reversal",
                event.step
            ),
            created_by: event.id.clone(),
            strength: event.reversibility_cost,
            affected_options: affected,
            reversibility_cost: event.reversibility_cost,
        });
    }

    constraints
}
