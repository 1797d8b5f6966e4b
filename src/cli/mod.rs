//! Operator CLI commands.
//!
//! Replays decision scenarios through a fresh engine and shows the policy
//! and protocol catalog the engine runs with.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::engine::{RecordStepResult, RiskEngine};
use crate::error::{AppError, AppResult};
use crate::escape::{EscapeAnalysis, ExecuteProtocolParams, ExecutionResult, ProtocolCatalog};
use crate::path_memory::StepDelta;
use crate::warning::WarningLevel;

const RULE: &str = "═══════════════════════════════════════════════════════════════════════════════";

/// Operator subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Replay a JSON scenario of decisions and print each warning state
    Simulate {
        /// Path to the scenario file
        #[arg(long)]
        scenario: PathBuf,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,

        /// Run escape planning after the last step
        #[arg(long)]
        plan: bool,
    },

    /// List the escape protocol catalog
    Protocols,

    /// Show the effective engine policy
    Config,
}

/// Result of CLI command execution.
pub struct CliResult {
    /// Exit code (0 = success)
    pub exit_code: i32,
    /// Output message
    pub message: String,
}

impl CliResult {
    /// Create a success result with the given message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            message: message.into(),
        }
    }

    /// Create an error result with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            message: message.into(),
        }
    }
}

// ============================================================================
// Scenarios
// ============================================================================

/// One decision in a scenario file.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioStep {
    /// Reasoning technique
    pub technique: String,
    /// Step number (defaults to the position in the file, starting at 1)
    #[serde(default)]
    pub step: Option<u32>,
    /// Decision text
    pub decision: String,
    /// Numeric summary of the decision
    #[serde(flatten)]
    pub delta: StepDelta,
}

/// A replayable sequence of decisions.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Session id used for the replay
    #[serde(default = "default_session_id")]
    pub session_id: String,
    /// Decisions in order
    pub steps: Vec<ScenarioStep>,
    /// Protocols executed after the last step
    #[serde(default)]
    pub protocols: Vec<String>,
}

fn default_session_id() -> String {
    "scenario".to_string()
}

impl Scenario {
    /// Parse a scenario from JSON.
    pub fn from_json(json: &str) -> AppResult<Self> {
        let scenario: Scenario = serde_json::from_str(json)?;
        if scenario.steps.is_empty() {
            return Err(AppError::Scenario {
                message: "scenario has no steps".to_string(),
            });
        }
        Ok(scenario)
    }

    /// Load a scenario file.
    pub fn load(path: &Path) -> AppResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

/// Everything produced by replaying a scenario.
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    /// Session id used for the replay
    pub session_id: String,
    /// One result per step
    pub steps: Vec<RecordStepResult>,
    /// One result per executed protocol
    pub executions: Vec<ExecutionResult>,
    /// Escape analysis after the last step, when requested
    pub escape_analysis: Option<EscapeAnalysis>,
}

impl SimulationReport {
    /// Highest risk seen during the replay.
    pub fn peak_risk(&self) -> WarningLevel {
        self.steps
            .iter()
            .map(|s| s.warning_state.overall_risk)
            .max()
            .unwrap_or(WarningLevel::Safe)
    }
}

/// Replay a scenario through a fresh engine.
pub async fn run_simulation(
    scenario: &Scenario,
    config: &EngineConfig,
    plan: bool,
) -> AppResult<SimulationReport> {
    let engine = RiskEngine::with_defaults(config.clone());
    let session_id = scenario.session_id.as_str();
    engine.open_session(session_id).await?;

    let mut steps = Vec::with_capacity(scenario.steps.len());
    for (index, step) in scenario.steps.iter().enumerate() {
        let number = step.step.unwrap_or(index as u32 + 1);
        let result = engine
            .record_step(
                session_id,
                &step.technique,
                number,
                &step.decision,
                step.delta.clone(),
            )
            .await?;
        steps.push(result);
    }

    let mut executions = Vec::with_capacity(scenario.protocols.len());
    for name in &scenario.protocols {
        let result = engine
            .execute_protocol(session_id, ExecuteProtocolParams::new(name.as_str()))
            .await?;
        executions.push(result);
    }

    let escape_analysis = if plan {
        Some(engine.plan_escape(session_id).await?)
    } else {
        None
    };

    Ok(SimulationReport {
        session_id: scenario.session_id.clone(),
        steps,
        executions,
        escape_analysis,
    })
}

// ============================================================================
// Commands
// ============================================================================

/// Execute a CLI command.
pub async fn execute_command(command: Commands, config: &EngineConfig) -> CliResult {
    match command {
        Commands::Simulate {
            scenario,
            json,
            plan,
        } => execute_simulate(&scenario, config, json, plan).await,
        Commands::Protocols => execute_protocols(),
        Commands::Config => execute_config(config),
    }
}

async fn execute_simulate(path: &Path, config: &EngineConfig, json: bool, plan: bool) -> CliResult {
    let scenario = match Scenario::load(path) {
        Ok(s) => s,
        Err(e) => return CliResult::error(format!("Failed to load {}: {}", path.display(), e)),
    };

    let report = match run_simulation(&scenario, config, plan).await {
        Ok(r) => r,
        Err(e) => return CliResult::error(format!("Simulation failed: {}", e)),
    };

    if json {
        return match serde_json::to_string_pretty(&report) {
            Ok(s) => CliResult::success(s),
            Err(e) => CliResult::error(format!("Failed to serialize report: {}", e)),
        };
    }

    CliResult::success(format_report(&report))
}

fn format_report(report: &SimulationReport) -> String {
    let mut output = String::new();

    output.push_str(&format!("\nSimulation: {}\n", report.session_id));
    output.push_str(RULE);
    output.push_str("\n\n");

    for result in &report.steps {
        let event = &result.path_memory_delta.event;
        let state = &result.warning_state;
        output.push_str(&format!(
            "step {:>3} [{}] flexibility {:.3}  risk {:<8}  action {}\n",
            event.step,
            event.technique,
            result.flexibility.flexibility_score,
            state.overall_risk.as_str(),
            state.recommended_action
        ));
        for reading in &state.active_warnings {
            output.push_str(&format!(
                "    {} {}: {}\n",
                level_symbol(reading.severity),
                reading.sensor_name,
                reading.indicators.join("; ")
            ));
        }
        if let Some(rec) = &result.escape_recommendation {
            output.push_str(&format!(
                "    → escape: {} (level {}, {}): {}\n",
                rec.name, rec.level, rec.execution_time, rec.reason
            ));
        }
    }

    for execution in &report.executions {
        output.push_str(&format!(
            "\nExecuted {}: flexibility {:.3} → {:.3}\n",
            execution.protocol, execution.flexibility_before, execution.flexibility_after
        ));
    }

    output.push_str(&format!("\nPeak risk: {}\n", report.peak_risk()));

    if let Some(analysis) = &report.escape_analysis {
        output.push_str(&format!("\nEscape Analysis\n{}\n", RULE));
        output.push_str(&format!(
            "Protocol: {} (level {})\n",
            analysis.protocol.name, analysis.protocol.level
        ));
        output.push_str(&format!(
            "Constraint strength: {:.2} across {} categories (interaction {:.2})\n",
            analysis.constraints.total_strength,
            analysis.constraints.categories(),
            analysis.constraints.interaction_effect
        ));
        output.push_str(&format!(
            "Resources: {:.2} available, {:.2} needed → {}\n",
            analysis.resources.available_resources,
            analysis.escape_force_needed,
            if analysis.feasibility { "feasible" } else { "infeasible" }
        ));
        output.push_str(&format!(
            "Success probability: {:.0}%\n",
            analysis.success_probability * 100.0
        ));
        for phase in &analysis.trajectory.phases {
            output.push_str(&format!("  {} ({})\n", phase.phase, phase.duration));
            for action in &phase.actions {
                output.push_str(&format!("    - {}\n", action));
            }
        }
        for warning in &analysis.warnings {
            output.push_str(&format!("  ⚠ {}\n", warning));
        }
    }

    output
}

fn execute_protocols() -> CliResult {
    let catalog = ProtocolCatalog::default();
    let mut output = String::new();

    output.push_str("\nEscape Protocols\n");
    output.push_str(RULE);
    output.push_str("\n\n");

    for protocol in catalog.protocols() {
        output.push_str(&format!(
            "{}. {} ({})\n   flexibility {:.1}-{:.1}, uplift +{:.2}, prior success {:.0}%\n",
            protocol.level,
            protocol.name,
            protocol.execution_time,
            protocol.min_flexibility,
            protocol.max_flexibility,
            protocol.uplift,
            protocol.success_probability * 100.0
        ));
        for step in &protocol.steps {
            output.push_str(&format!("   - {}\n", step));
        }
        output.push('\n');
    }

    CliResult::success(output)
}

fn execute_config(config: &EngineConfig) -> CliResult {
    match serde_json::to_string_pretty(config) {
        Ok(s) => CliResult::success(s),
        Err(e) => CliResult::error(format!("Failed to serialize config: {}", e)),
    }
}

fn level_symbol(level: WarningLevel) -> &'static str {
    match level {
        WarningLevel::Safe => "✓",
        WarningLevel::Caution => "⚡",
        WarningLevel::Warning => "⚠",
        WarningLevel::Critical => "🔴",
    }
}
