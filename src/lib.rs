//! # Path Risk Engine
//!
//! Tracks how much decision optionality ("flexibility") a multi-step
//! reasoning session has left, watches for approach to irreversible states
//! ("absorbing barriers") through a bank of independent sensors, and plans
//! a recovery ("escape") when flexibility runs low.
//!
//! ## Features
//!
//! - **Path Memory**: Append-only record of decisions and the constraints they created
//! - **Flexibility Metrics**: Decayed commitment penalty, reversibility, option velocity
//! - **Sensor Array**: Resource, cognitive, technical-debt, commitment, convergence and barrier sensors
//! - **Warning Levels**: `Safe → Caution → Warning → Critical` with compound-risk detection
//! - **Escape Planning**: Constraint analysis, resource inventory, phased trajectories
//! - **Protocol Catalog**: Five remediation protocols with confirmation-gated execution
//!
//! ## Architecture
//!
//! ```text
//! record_step → PathMemory → FlexibilityCalculator → SensorArray → WarningAggregator
//!                                                                        ↓
//!                                      plan_escape / execute_protocol ← EscapeRecommendation
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use path_risk_engine::{EngineConfig, RiskEngine, StepDelta};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = RiskEngine::with_defaults(EngineConfig::default());
//!     engine.open_session("session-1").await?;
//!     let result = engine
//!         .record_step("session-1", "scamper", 1, "Drop the free tier", StepDelta::new(0.9, 0.8))
//!         .await?;
//!     println!("{}", result.warning_state.overall_risk);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Operator CLI commands.
pub mod cli;
/// Configuration management for the engine.
pub mod config;
/// Session registry and the engine operations.
pub mod engine;
/// Error types and result aliases for the application.
pub mod error;
/// Escape planning and the protocol catalog.
pub mod escape;
/// Flexibility metrics computed from path memory.
pub mod flexibility;
/// Per-session decision history, constraints and barriers.
pub mod path_memory;
/// Independent risk sensors.
pub mod sensors;
/// Warning levels, aggregation and history.
pub mod warning;

pub use config::{Config, EngineConfig};
pub use engine::{RecordStepResult, RiskEngine};
pub use error::{AppError, AppResult, EngineError, EngineResult};
pub use escape::{EscapeAnalysis, EscapeProtocol, ExecuteProtocolParams, ExecutionResult, ProtocolCatalog};
pub use path_memory::{PathMemory, StepDelta};
pub use warning::{RecommendedAction, WarningLevel, WarningState};
