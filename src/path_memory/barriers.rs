//! Absorbing barrier catalog.
//!
//! Barriers are stateless templates describing categories of irreversible
//! failure. The session copies the catalog on creation and only updates each
//! barrier's live `proximity` as flexibility is recomputed.

use serde::{Deserialize, Serialize};

/// Broad family of a barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarrierType {
    /// Traps in the thinking process itself
    Creative,
    /// Real-world states that are hard or impossible to leave
    Critical,
}

/// Specific barrier category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarrierSubtype {
    // Creative
    /// Committed so deeply to one frame that alternatives stop appearing
    CognitiveLockIn,
    /// Endless evaluation without committing to anything
    AnalysisParalysis,
    /// Iterating on the same decision without opening new ground
    PerfectionismSpiral,
    /// Reaching for the familiar technique every time
    ExpertiseTrap,
    /// Locked into what stakeholders already agreed to
    ConsensusTrap,
    /// Options are being consumed faster than they are generated
    NoveltyExhaustion,
    /// A creative direction has hardened into the only direction
    FrameFixation,
    // Critical
    /// Most decisions can no longer be undone
    IrreversibleCommitment,
    /// Time, budget or energy is running out
    ResourceDepletion,
    /// Architecture choices that cannot be backed out
    TechnicalLockIn,
    /// Public commitments that would be costly to retract
    ReputationDamage,
    /// Market position that forecloses alternatives
    MarketLockout,
    /// Obligations that cannot be walked back
    RegulatoryViolation,
    /// Relationships strained past repair
    StakeholderAlienation,
}

impl BarrierSubtype {
    /// Get the subtype name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            BarrierSubtype::CognitiveLockIn => "cognitive_lock_in",
            BarrierSubtype::AnalysisParalysis => "analysis_paralysis",
            BarrierSubtype::PerfectionismSpiral => "perfectionism_spiral",
            BarrierSubtype::ExpertiseTrap => "expertise_trap",
            BarrierSubtype::ConsensusTrap => "consensus_trap",
            BarrierSubtype::NoveltyExhaustion => "novelty_exhaustion",
            BarrierSubtype::FrameFixation => "frame_fixation",
            BarrierSubtype::IrreversibleCommitment => "irreversible_commitment",
            BarrierSubtype::ResourceDepletion => "resource_depletion",
            BarrierSubtype::TechnicalLockIn => "technical_lock_in",
            BarrierSubtype::ReputationDamage => "reputation_damage",
            BarrierSubtype::MarketLockout => "market_lockout",
            BarrierSubtype::RegulatoryViolation => "regulatory_violation",
            BarrierSubtype::StakeholderAlienation => "stakeholder_alienation",
        }
    }
}

impl std::fmt::Display for BarrierSubtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How recoverable a barrier is once hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarrierImpact {
    /// Recovery is routine
    Recoverable,
    /// Recovery is costly
    Difficult,
    /// No recovery
    Irreversible,
}

/// A category of irreversible failure, with its live proximity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Barrier {
    /// Stable identifier (the subtype name).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Barrier family.
    #[serde(rename = "type")]
    pub barrier_type: BarrierType,
    /// Specific category.
    pub subtype: BarrierSubtype,
    /// Live proximity (0.0-1.0, 1.0 = hit).
    pub proximity: f64,
    /// Recoverability once hit.
    pub impact: BarrierImpact,
    /// Proximity at which the barrier starts warning.
    pub warning_threshold: f64,
}

impl Barrier {
    /// Create a barrier template with zero proximity.
    pub fn new(
        name: &str,
        subtype: BarrierSubtype,
        impact: BarrierImpact,
        warning_threshold: f64,
    ) -> Self {
        let barrier_type = match subtype {
            BarrierSubtype::CognitiveLockIn
            | BarrierSubtype::AnalysisParalysis
            | BarrierSubtype::PerfectionismSpiral
            | BarrierSubtype::ExpertiseTrap
            | BarrierSubtype::ConsensusTrap
            | BarrierSubtype::NoveltyExhaustion
            | BarrierSubtype::FrameFixation => BarrierType::Creative,
            _ => BarrierType::Critical,
        };
        Self {
            id: subtype.as_str().to_string(),
            name: name.to_string(),
            barrier_type,
            subtype,
            proximity: 0.0,
            impact,
            warning_threshold,
        }
    }
}

/// Immutable set of barrier templates handed to the engine at construction.
#[derive(Debug, Clone)]
pub struct BarrierCatalog {
    barriers: Vec<Barrier>,
}

impl BarrierCatalog {
    /// Create a catalog from explicit templates.
    pub fn new(barriers: Vec<Barrier>) -> Self {
        Self { barriers }
    }

    /// All templates in catalog order.
    pub fn barriers(&self) -> &[Barrier] {
        &self.barriers
    }

    /// Number of templates.
    pub fn len(&self) -> usize {
        self.barriers.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.barriers.is_empty()
    }
}

impl Default for BarrierCatalog {
    fn default() -> Self {
        use BarrierImpact::*;
        use BarrierSubtype::*;

        Self::new(vec![
            Barrier::new("Cognitive Lock-in", CognitiveLockIn, Difficult, 0.7),
            Barrier::new("Analysis Paralysis", AnalysisParalysis, Recoverable, 0.75),
            Barrier::new("Perfectionism Spiral", PerfectionismSpiral, Recoverable, 0.75),
            Barrier::new("Expertise Trap", ExpertiseTrap, Difficult, 0.75),
            Barrier::new("Consensus Trap", ConsensusTrap, Difficult, 0.7),
            Barrier::new("Novelty Exhaustion", NoveltyExhaustion, Recoverable, 0.75),
            Barrier::new("Frame Fixation", FrameFixation, Difficult, 0.7),
            Barrier::new("Irreversible Commitment", IrreversibleCommitment, Irreversible, 0.65),
            Barrier::new("Resource Depletion", ResourceDepletion, Difficult, 0.7),
            Barrier::new("Technical Lock-in", TechnicalLockIn, Difficult, 0.7),
            Barrier::new("Reputation Damage", ReputationDamage, Irreversible, 0.65),
            Barrier::new("Market Lockout", MarketLockout, Difficult, 0.7),
            Barrier::new("Regulatory Violation", RegulatoryViolation, Irreversible, 0.6),
            Barrier::new("Stakeholder Alienation", StakeholderAlienation, Difficult, 0.7),
        ])
    }
}
