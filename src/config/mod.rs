//! Configuration for the path-dependency risk engine.
//!
//! Every heuristic weight used by the engine (decay constants, band thresholds,
//! safety margins) is a policy value and lives here rather than as a literal in
//! the algorithm code. Values are loaded from environment variables (and a
//! `.env` file when present); every section also implements [`Default`].

use std::env;
use std::str::FromStr;

use serde::Serialize;

use crate::error::AppError;
use crate::warning::WarningLevel;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone, Default, Serialize)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Engine policy
    pub engine: EngineConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize)]
pub struct LoggingConfig {
    /// Log level filter used when `RUST_LOG` is unset
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable output
    Pretty,
    /// One JSON object per line
    Json,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Policy values for every engine component.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineConfig {
    /// Flexibility calculator weights
    pub flexibility: FlexibilityConfig,
    /// Constraint synthesis thresholds
    pub constraints: ConstraintConfig,
    /// Sensor heuristics
    pub sensors: SensorConfig,
    /// Warning bands and history retention
    pub warning: WarningConfig,
    /// Escape planner coefficients
    pub escape: EscapeConfig,
}

/// Weights for [`crate::flexibility::FlexibilityCalculator`].
#[derive(Debug, Clone, Serialize)]
pub struct FlexibilityConfig {
    /// Number of most recent events contributing to the flexibility penalty
    pub history_window: usize,
    /// Exponential decay applied per step of age (newest event has weight 1.0)
    pub decay: f64,
    /// Scale applied to each `commitment * reversibility` term
    pub impact_weight: f64,
    /// Sliding window for option velocity
    pub option_window: usize,
    /// Per-event divergence contributed regardless of commitment
    pub divergence_base: f64,
    /// Scale applied to each event's divergence contribution
    pub divergence_scale: f64,
    /// Share of barrier proximity driven by global flexibility loss (rest comes from the subtype driver)
    pub barrier_blend: f64,
    /// Commitment below which a decision counts as indecisive
    pub indecision_level: f64,
    /// Decisions needed before indecision or technique concentration is meaningful
    pub concentration_min_events: usize,
}

impl Default for FlexibilityConfig {
    fn default() -> Self {
        Self {
            history_window: 20,
            decay: 0.9,
            impact_weight: 0.15,
            option_window: 10,
            divergence_base: 0.1,
            divergence_scale: 0.1,
            barrier_blend: 0.4,
            indecision_level: 0.15,
            concentration_min_events: 5,
        }
    }
}

/// Thresholds controlling when a recorded step synthesizes constraints.
#[derive(Debug, Clone, Serialize)]
pub struct ConstraintConfig {
    /// Commitment level a step must exceed to create a constraint
    pub commitment_threshold: f64,
    /// Reversibility cost a step must exceed to create a constraint
    pub reversibility_threshold: f64,
    /// Above this (for both fields) a second, resource-kind constraint is created
    pub secondary_threshold: f64,
}

impl Default for ConstraintConfig {
    fn default() -> Self {
        Self {
            commitment_threshold: 0.7,
            reversibility_threshold: 0.7,
            secondary_threshold: 0.9,
        }
    }
}

/// Heuristic thresholds for the sensor array.
#[derive(Debug, Clone, Serialize)]
pub struct SensorConfig {
    /// Elapsed hours after which fatigue is flagged
    pub fatigue_hours: f64,
    /// Elapsed hours after which depletion is critical
    pub depletion_hours: f64,
    /// Recent events inspected for new options
    pub resource_window: usize,
    /// Recent decision texts inspected for repetition
    pub cognitive_window: usize,
    /// Minimum decisions before the cognitive sensor reports anything
    pub cognitive_min_history: usize,
    /// Share of repeated decision texts that counts as a repetitive pattern
    pub repetition_threshold: f64,
    /// Lexical diversity below which wording is considered locked in
    pub diversity_threshold: f64,
    /// Option creation is falling when the recent rate drops below this share of the earlier rate
    pub stall_ratio: f64,
    /// Constraint coupling ratio for Caution
    pub coupling_caution: f64,
    /// Constraint coupling ratio for Warning
    pub coupling_warning: f64,
    /// Constraint coupling ratio for Critical
    pub coupling_critical: f64,
    /// Constraints needed before coupling can be Critical
    pub coupling_min_constraints: usize,
    /// Most recent constraints inspected for coupling
    pub coupling_window: usize,
    /// Trailing high-commitment streak for Caution
    pub streak_caution: usize,
    /// Trailing high-commitment streak for Warning
    pub streak_warning: usize,
    /// Trailing high-commitment streak for Critical
    pub streak_critical: usize,
    /// Commitment level counted as part of a streak
    pub streak_commitment: f64,
    /// Mean reversal cost across a streak needed for Critical
    pub streak_reversibility: f64,
    /// Option velocity at or below which Caution is reported
    pub velocity_caution: f64,
    /// Option velocity at or below which Warning is reported
    pub velocity_warning: f64,
    /// Minimum events before the convergence sensor reports anything
    pub convergence_min_history: usize,
    /// Proximity at which an irreversible barrier is treated as hit
    pub barrier_hit: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            fatigue_hours: 3.0,
            depletion_hours: 6.0,
            resource_window: 10,
            cognitive_window: 10,
            cognitive_min_history: 5,
            repetition_threshold: 0.5,
            diversity_threshold: 0.3,
            stall_ratio: 0.5,
            coupling_caution: 0.3,
            coupling_warning: 0.5,
            coupling_critical: 0.75,
            coupling_min_constraints: 5,
            coupling_window: 50,
            streak_caution: 3,
            streak_warning: 5,
            streak_critical: 8,
            streak_commitment: 0.7,
            streak_reversibility: 0.8,
            velocity_caution: -0.5,
            velocity_warning: -1.0,
            convergence_min_history: 3,
            barrier_hit: 0.95,
        }
    }
}

/// Flexibility bands and warning history retention.
#[derive(Debug, Clone, Serialize)]
pub struct WarningConfig {
    /// Scores strictly above this are Safe
    pub safe_above: f64,
    /// Scores at or above this (and not Safe) are Caution
    pub caution_above: f64,
    /// Scores at or above this (and not Caution) are Warning; below is Critical
    pub warning_above: f64,
    /// Warning states retained per session (oldest evicted first)
    pub history_retention: usize,
}

impl Default for WarningConfig {
    fn default() -> Self {
        Self {
            safe_above: 0.6,
            caution_above: 0.4,
            warning_above: 0.2,
            history_retention: 1000,
        }
    }
}

impl WarningConfig {
    /// Map a flexibility score onto the default warning band.
    pub fn level_for_score(&self, score: f64) -> WarningLevel {
        if score > self.safe_above {
            WarningLevel::Safe
        } else if score >= self.caution_above {
            WarningLevel::Caution
        } else if score >= self.warning_above {
            WarningLevel::Warning
        } else {
            WarningLevel::Critical
        }
    }
}

/// Coefficients for [`crate::escape::EscapePlanner`].
#[derive(Debug, Clone, Serialize)]
pub struct EscapeConfig {
    /// Multiplier on total constraint strength giving the escape force needed
    pub safety_margin: f64,
    /// Upper bound for any estimated success probability
    pub max_success_probability: f64,
    /// Success probability lost per trajectory phase
    pub phase_penalty: f64,
    /// Interaction effect added per constraint category beyond the first
    pub interaction_per_category: f64,
    /// Interaction effect added per cross-category dependency
    pub interaction_per_dependency: f64,
    /// Upper bound for the interaction effect
    pub interaction_cap: f64,
    /// Success probability below which a warning is raised
    pub low_success_threshold: f64,
    /// Total strength above which a warning is raised
    pub high_strength_threshold: f64,
    /// Interaction effect above which a warning is raised
    pub high_interaction_threshold: f64,
    /// Mean breakability below which a warning is raised
    pub low_breakability_threshold: f64,
    /// Session length (hours) after which no time is considered available
    pub time_horizon_hours: f64,
    /// Steps after which attention is considered spent
    pub attention_capacity_steps: usize,
    /// Resource penalty per prior reset-type decision
    pub reset_penalty: f64,
    /// Weights combining the resource inventory into `available_resources`
    pub resource_weights: ResourceWeights,
}

impl Default for EscapeConfig {
    fn default() -> Self {
        Self {
            safety_margin: 1.2,
            max_success_probability: 0.95,
            phase_penalty: 0.1,
            interaction_per_category: 0.1,
            interaction_per_dependency: 0.05,
            interaction_cap: 0.5,
            low_success_threshold: 0.5,
            high_strength_threshold: 0.8,
            high_interaction_threshold: 0.3,
            low_breakability_threshold: 0.3,
            time_horizon_hours: 8.0,
            attention_capacity_steps: 100,
            reset_penalty: 0.1,
            resource_weights: ResourceWeights::default(),
        }
    }
}

/// Weights for [`crate::escape::assess_resources`]. They must sum to 1.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceWeights {
    /// Weight of time left before the horizon
    pub time: f64,
    /// Weight of attention left
    pub attention: f64,
    /// Weight of social capital
    pub social: f64,
    /// Weight of technical capacity
    pub technical: f64,
    /// Weight of financial resources
    pub financial: f64,
    /// Weight of organizational support
    pub organizational: f64,
}

impl Default for ResourceWeights {
    fn default() -> Self {
        Self {
            time: 0.2,
            attention: 0.2,
            social: 0.15,
            technical: 0.15,
            financial: 0.15,
            organizational: 0.15,
        }
    }
}

impl ResourceWeights {
    /// Sum of all weights.
    pub fn total(&self) -> f64 {
        self.time + self.attention + self.social + self.technical + self.financial + self.organizational
    }

    fn named(&self) -> [(&'static str, f64); 6] {
        [
            ("PRE_WEIGHT_TIME", self.time),
            ("PRE_WEIGHT_ATTENTION", self.attention),
            ("PRE_WEIGHT_SOCIAL", self.social),
            ("PRE_WEIGHT_TECHNICAL", self.technical),
            ("PRE_WEIGHT_FINANCIAL", self.financial),
            ("PRE_WEIGHT_ORGANIZATIONAL", self.organizational),
        ]
    }
}

/// Reject a policy value outside [0, 1] (NaN included).
fn check_unit(name: &str, value: f64) -> Result<(), AppError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(AppError::Config {
            message: format!("{} must be in [0, 1], got {}", name, value),
        })
    }
}

/// Read and parse an environment variable, falling back to `default`.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let engine = EngineConfig::from_env();
        engine.validate()?;

        Ok(Config { logging, engine })
    }
}

impl EngineConfig {
    /// Load every engine section from `PRE_*` environment variables.
    pub fn from_env() -> Self {
        let f = FlexibilityConfig::default();
        let flexibility = FlexibilityConfig {
            history_window: env_or("PRE_HISTORY_WINDOW", f.history_window),
            decay: env_or("PRE_DECAY", f.decay),
            impact_weight: env_or("PRE_IMPACT_WEIGHT", f.impact_weight),
            option_window: env_or("PRE_OPTION_WINDOW", f.option_window),
            divergence_base: env_or("PRE_DIVERGENCE_BASE", f.divergence_base),
            divergence_scale: env_or("PRE_DIVERGENCE_SCALE", f.divergence_scale),
            barrier_blend: env_or("PRE_BARRIER_BLEND", f.barrier_blend),
            indecision_level: env_or("PRE_INDECISION_LEVEL", f.indecision_level),
            concentration_min_events: env_or(
                "PRE_CONCENTRATION_MIN_EVENTS",
                f.concentration_min_events,
            ),
        };

        let c = ConstraintConfig::default();
        let constraints = ConstraintConfig {
            commitment_threshold: env_or("PRE_CONSTRAINT_COMMITMENT", c.commitment_threshold),
            reversibility_threshold: env_or(
                "PRE_CONSTRAINT_REVERSIBILITY",
                c.reversibility_threshold,
            ),
            secondary_threshold: env_or("PRE_CONSTRAINT_SECONDARY", c.secondary_threshold),
        };

        let s = SensorConfig::default();
        let sensors = SensorConfig {
            fatigue_hours: env_or("PRE_FATIGUE_HOURS", s.fatigue_hours),
            depletion_hours: env_or("PRE_DEPLETION_HOURS", s.depletion_hours),
            resource_window: env_or("PRE_RESOURCE_WINDOW", s.resource_window),
            cognitive_window: env_or("PRE_COGNITIVE_WINDOW", s.cognitive_window),
            cognitive_min_history: env_or("PRE_COGNITIVE_MIN_HISTORY", s.cognitive_min_history),
            repetition_threshold: env_or("PRE_REPETITION_THRESHOLD", s.repetition_threshold),
            diversity_threshold: env_or("PRE_DIVERSITY_THRESHOLD", s.diversity_threshold),
            stall_ratio: env_or("PRE_STALL_RATIO", s.stall_ratio),
            coupling_caution: env_or("PRE_COUPLING_CAUTION", s.coupling_caution),
            coupling_warning: env_or("PRE_COUPLING_WARNING", s.coupling_warning),
            coupling_critical: env_or("PRE_COUPLING_CRITICAL", s.coupling_critical),
            coupling_min_constraints: env_or(
                "PRE_COUPLING_MIN_CONSTRAINTS",
                s.coupling_min_constraints,
            ),
            coupling_window: env_or("PRE_COUPLING_WINDOW", s.coupling_window),
            streak_caution: env_or("PRE_STREAK_CAUTION", s.streak_caution),
            streak_warning: env_or("PRE_STREAK_WARNING", s.streak_warning),
            streak_critical: env_or("PRE_STREAK_CRITICAL", s.streak_critical),
            streak_commitment: env_or("PRE_STREAK_COMMITMENT", s.streak_commitment),
            streak_reversibility: env_or("PRE_STREAK_REVERSIBILITY", s.streak_reversibility),
            velocity_caution: env_or("PRE_VELOCITY_CAUTION", s.velocity_caution),
            velocity_warning: env_or("PRE_VELOCITY_WARNING", s.velocity_warning),
            convergence_min_history: env_or(
                "PRE_CONVERGENCE_MIN_HISTORY",
                s.convergence_min_history,
            ),
            barrier_hit: env_or("PRE_BARRIER_HIT", s.barrier_hit),
        };

        let w = WarningConfig::default();
        let warning = WarningConfig {
            safe_above: env_or("PRE_BAND_SAFE", w.safe_above),
            caution_above: env_or("PRE_BAND_CAUTION", w.caution_above),
            warning_above: env_or("PRE_BAND_WARNING", w.warning_above),
            history_retention: env_or("PRE_WARNING_HISTORY_RETENTION", w.history_retention),
        };

        let e = EscapeConfig::default();
        let escape = EscapeConfig {
            safety_margin: env_or("PRE_SAFETY_MARGIN", e.safety_margin),
            max_success_probability: env_or("PRE_MAX_SUCCESS", e.max_success_probability),
            phase_penalty: env_or("PRE_PHASE_PENALTY", e.phase_penalty),
            interaction_per_category: env_or(
                "PRE_INTERACTION_PER_CATEGORY",
                e.interaction_per_category,
            ),
            interaction_per_dependency: env_or(
                "PRE_INTERACTION_PER_DEPENDENCY",
                e.interaction_per_dependency,
            ),
            interaction_cap: env_or("PRE_INTERACTION_CAP", e.interaction_cap),
            low_success_threshold: env_or("PRE_LOW_SUCCESS", e.low_success_threshold),
            high_strength_threshold: env_or("PRE_HIGH_STRENGTH", e.high_strength_threshold),
            high_interaction_threshold: env_or(
                "PRE_HIGH_INTERACTION",
                e.high_interaction_threshold,
            ),
            low_breakability_threshold: env_or(
                "PRE_LOW_BREAKABILITY",
                e.low_breakability_threshold,
            ),
            time_horizon_hours: env_or("PRE_TIME_HORIZON_HOURS", e.time_horizon_hours),
            attention_capacity_steps: env_or(
                "PRE_ATTENTION_CAPACITY_STEPS",
                e.attention_capacity_steps,
            ),
            reset_penalty: env_or("PRE_RESET_PENALTY", e.reset_penalty),
            resource_weights: ResourceWeights {
                time: env_or("PRE_WEIGHT_TIME", e.resource_weights.time),
                attention: env_or("PRE_WEIGHT_ATTENTION", e.resource_weights.attention),
                social: env_or("PRE_WEIGHT_SOCIAL", e.resource_weights.social),
                technical: env_or("PRE_WEIGHT_TECHNICAL", e.resource_weights.technical),
                financial: env_or("PRE_WEIGHT_FINANCIAL", e.resource_weights.financial),
                organizational: env_or(
                    "PRE_WEIGHT_ORGANIZATIONAL",
                    e.resource_weights.organizational,
                ),
            },
        };

        Self {
            flexibility,
            constraints,
            sensors,
            warning,
            escape,
        }
    }

    /// Reject policy combinations the engine cannot honor.
    pub fn validate(&self) -> Result<(), AppError> {
        let w = &self.warning;
        if !(0.0 < w.warning_above && w.warning_above < w.caution_above
            && w.caution_above < w.safe_above
            && w.safe_above < 1.0)
        {
            return Err(AppError::Config {
                message: format!(
                    "warning bands must satisfy 0 < warning ({}) < caution ({}) < safe ({}) < 1",
                    w.warning_above, w.caution_above, w.safe_above
                ),
            });
        }

        if w.history_retention == 0 {
            return Err(AppError::Config {
                message: "PRE_WARNING_HISTORY_RETENTION must be at least 1".to_string(),
            });
        }

        let decay = self.flexibility.decay;
        if !(decay > 0.0 && decay <= 1.0) {
            return Err(AppError::Config {
                message: format!("PRE_DECAY must be in (0, 1], got {}", decay),
            });
        }

        if self.flexibility.history_window == 0 {
            return Err(AppError::Config {
                message: "PRE_HISTORY_WINDOW must be at least 1".to_string(),
            });
        }

        if self.escape.safety_margin.is_nan() || self.escape.safety_margin <= 0.0 {
            return Err(AppError::Config {
                message: format!(
                    "PRE_SAFETY_MARGIN must be positive, got {}",
                    self.escape.safety_margin
                ),
            });
        }

        if self.escape.time_horizon_hours.is_nan() || self.escape.time_horizon_hours <= 0.0 {
            return Err(AppError::Config {
                message: format!(
                    "PRE_TIME_HORIZON_HOURS must be positive, got {}",
                    self.escape.time_horizon_hours
                ),
            });
        }

        let f = &self.flexibility;
        let c = &self.constraints;
        let s = &self.sensors;
        let e = &self.escape;
        for (name, value) in [
            ("PRE_IMPACT_WEIGHT", f.impact_weight),
            ("PRE_BARRIER_BLEND", f.barrier_blend),
            ("PRE_INDECISION_LEVEL", f.indecision_level),
            ("PRE_CONSTRAINT_COMMITMENT", c.commitment_threshold),
            ("PRE_CONSTRAINT_REVERSIBILITY", c.reversibility_threshold),
            ("PRE_CONSTRAINT_SECONDARY", c.secondary_threshold),
            ("PRE_REPETITION_THRESHOLD", s.repetition_threshold),
            ("PRE_DIVERSITY_THRESHOLD", s.diversity_threshold),
            ("PRE_STALL_RATIO", s.stall_ratio),
            ("PRE_COUPLING_CAUTION", s.coupling_caution),
            ("PRE_COUPLING_WARNING", s.coupling_warning),
            ("PRE_COUPLING_CRITICAL", s.coupling_critical),
            ("PRE_STREAK_COMMITMENT", s.streak_commitment),
            ("PRE_STREAK_REVERSIBILITY", s.streak_reversibility),
            ("PRE_BARRIER_HIT", s.barrier_hit),
            ("PRE_MAX_SUCCESS", e.max_success_probability),
            ("PRE_PHASE_PENALTY", e.phase_penalty),
            ("PRE_INTERACTION_PER_CATEGORY", e.interaction_per_category),
            ("PRE_INTERACTION_PER_DEPENDENCY", e.interaction_per_dependency),
            ("PRE_INTERACTION_CAP", e.interaction_cap),
            ("PRE_LOW_SUCCESS", e.low_success_threshold),
            ("PRE_HIGH_STRENGTH", e.high_strength_threshold),
            ("PRE_HIGH_INTERACTION", e.high_interaction_threshold),
            ("PRE_LOW_BREAKABILITY", e.low_breakability_threshold),
            ("PRE_RESET_PENALTY", e.reset_penalty),
        ] {
            check_unit(name, value)?;
        }

        for (name, value) in e.resource_weights.named() {
            check_unit(name, value)?;
        }
        let total = e.resource_weights.total();
        if (total - 1.0).abs() > 1e-6 {
            return Err(AppError::Config {
                message: format!("resource weights must sum to 1, got {:.4}", total),
            });
        }

        Ok(())
    }
}
