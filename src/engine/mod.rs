//! Risk engine: session registry and the operations callers invoke.
//!
//! ```text
//! record_step → PathMemory::append_step → FlexibilityCalculator::recompute
//!             → SensorArray::evaluate → WarningAggregator::aggregate
//!             → (escape recommended?) ProtocolCatalog::recommend
//! ```
//!
//! Each session owns its path memory behind a mutex, so at most one
//! mutation per session is in flight. Warning history sits behind its own
//! lock and can be read while a step is being recorded.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::escape::{
    EscapeAnalysis, EscapePlanner, EscapeProtocol, ExecuteProtocolParams, ExecutionResult,
    ProtocolCatalog,
};
use crate::flexibility::{FlexibilityCalculator, FlexibilityMetrics};
use crate::path_memory::{BarrierCatalog, PathMemory, PathMemoryDelta, StepDelta};
use crate::sensors::{SensorArray, SensorContext};
use crate::warning::{
    EscapeRecommendation, WarningAggregator, WarningHistory, WarningLevel, WarningState,
};

/// Result of recording one step.
#[derive(Debug, Clone, Serialize)]
pub struct RecordStepResult {
    /// What the step changed in path memory
    pub path_memory_delta: PathMemoryDelta,
    /// Metrics after the step
    pub flexibility: FlexibilityMetrics,
    /// Warning state after the step
    pub warning_state: WarningState,
    /// Present when escape is recommended
    pub escape_recommendation: Option<EscapeRecommendation>,
}

/// Per-session state.
struct SessionHandle {
    memory: Mutex<PathMemory>,
    history: RwLock<WarningHistory>,
}

/// Path-dependency risk engine.
///
/// Catalogs and policy are fixed at construction; the only mutable state
/// is the per-session registry.
pub struct RiskEngine {
    config: EngineConfig,
    calculator: FlexibilityCalculator,
    sensors: SensorArray,
    aggregator: WarningAggregator,
    planner: EscapePlanner,
    protocols: ProtocolCatalog,
    barriers: BarrierCatalog,
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
}

impl RiskEngine {
    /// Create an engine from explicit catalogs and sensors.
    pub fn new(
        config: EngineConfig,
        protocols: ProtocolCatalog,
        barriers: BarrierCatalog,
        sensors: SensorArray,
    ) -> Self {
        info!(
            protocols = protocols.len(),
            barriers = barriers.len(),
            sensors = ?sensors.names(),
            "Risk engine initialized"
        );

        Self {
            calculator: FlexibilityCalculator::new(config.flexibility.clone()),
            aggregator: WarningAggregator::new(config.warning.clone()),
            planner: EscapePlanner::new(config.escape.clone()),
            config,
            sensors,
            protocols,
            barriers,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create an engine with the default catalogs and the standard sensors.
    pub fn with_defaults(config: EngineConfig) -> Self {
        let sensors = SensorArray::standard(&config.sensors);
        Self::new(
            config,
            ProtocolCatalog::default(),
            BarrierCatalog::default(),
            sensors,
        )
    }

    /// Get the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========================================================================
    // Session lifecycle
    // ========================================================================

    /// Register a new, empty session.
    pub async fn open_session(&self, session_id: impl Into<String>) -> EngineResult<()> {
        let session_id = session_id.into();
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session_id) {
            return Err(EngineError::SessionExists { session_id });
        }

        let mut memory = PathMemory::new(session_id.clone(), &self.barriers);
        memory.escape_routes = self.protocols.routes_at(memory.flexibility_score());

        sessions.insert(
            session_id.clone(),
            Arc::new(SessionHandle {
                memory: Mutex::new(memory),
                history: RwLock::new(WarningHistory::new(self.config.warning.history_retention)),
            }),
        );
        info!(session_id = %session_id, "Session opened");
        Ok(())
    }

    /// Discard a session and everything it recorded.
    pub async fn close_session(&self, session_id: &str) -> EngineResult<()> {
        match self.sessions.write().await.remove(session_id) {
            Some(_) => {
                info!(session_id = %session_id, "Session closed");
                Ok(())
            }
            None => Err(not_found(session_id)),
        }
    }

    /// IDs of open sessions, sorted.
    pub async fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Snapshot of a session's path memory.
    pub async fn path_memory(&self, session_id: &str) -> EngineResult<PathMemory> {
        let handle = self.session(session_id).await?;
        let memory = handle.memory.lock().await;
        Ok(memory.clone())
    }

    async fn session(&self, session_id: &str) -> EngineResult<Arc<SessionHandle>> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| not_found(session_id))
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Record one decision and re-evaluate the session.
    pub async fn record_step(
        &self,
        session_id: &str,
        technique: &str,
        step: u32,
        decision: &str,
        delta: StepDelta,
    ) -> EngineResult<RecordStepResult> {
        let handle = self.session(session_id).await?;
        let mut memory = handle.memory.lock().await;

        let path_memory_delta =
            memory.append_step(technique, step, decision, delta, &self.config.constraints);
        self.refresh(&mut memory);

        let warning_state = self.evaluate(&memory);
        let escape_recommendation = if warning_state.escape_recommended() {
            Some(self.recommend(&memory, &warning_state))
        } else {
            None
        };

        debug!(
            session_id = %session_id,
            step = path_memory_delta.event.step,
            flexibility = memory.flexibility_score(),
            overall_risk = %warning_state.overall_risk,
            action = %warning_state.recommended_action,
            "Step evaluated"
        );

        self.push_history(&handle, warning_state.clone()).await;

        Ok(RecordStepResult {
            path_memory_delta,
            flexibility: memory.current_flexibility.clone(),
            warning_state,
            escape_recommendation,
        })
    }

    /// Latest warning state; a fresh evaluation when nothing was recorded yet.
    pub async fn get_warning_state(&self, session_id: &str) -> EngineResult<WarningState> {
        let handle = self.session(session_id).await?;
        if let Some(latest) = handle.history.read().await.latest() {
            return Ok(latest.clone());
        }
        let memory = handle.memory.lock().await;
        Ok(self.evaluate(&memory))
    }

    /// Retained warning states, oldest first.
    pub async fn get_warning_history(&self, session_id: &str) -> EngineResult<Vec<WarningState>> {
        let handle = self.session(session_id).await?;
        let history = handle.history.read().await;
        Ok(history.entries())
    }

    /// Full escape analysis for a session.
    pub async fn plan_escape(&self, session_id: &str) -> EngineResult<EscapeAnalysis> {
        let handle = self.session(session_id).await?;
        let memory = handle.memory.lock().await;
        Ok(self.planner.plan(&memory, &self.protocols))
    }

    /// Every protocol, ordered by escalation level.
    pub fn list_protocols(&self) -> &[EscapeProtocol] {
        self.protocols.protocols()
    }

    /// Apply a protocol's uplift and record the intervention.
    ///
    /// When confirmation is required and not granted nothing changes and
    /// both readings equal the current score.
    pub async fn execute_protocol(
        &self,
        session_id: &str,
        params: ExecuteProtocolParams,
    ) -> EngineResult<ExecutionResult> {
        let handle = self.session(session_id).await?;
        let protocol = self
            .protocols
            .get(&params.protocol)
            .ok_or_else(|| EngineError::UnknownProtocol {
                name: params.protocol.clone(),
            })?;

        let mut memory = handle.memory.lock().await;

        if !params.is_authorized() {
            let current = memory.flexibility_score();
            info!(
                session_id = %session_id,
                protocol = %protocol.name,
                "Protocol execution not confirmed; nothing applied"
            );
            return Ok(ExecutionResult {
                protocol: protocol.name.clone(),
                flexibility_before: current,
                flexibility_after: current,
                executed: false,
                audit_event_id: None,
                warning_state: None,
            });
        }

        let (flexibility_before, lifted) = memory.grant_uplift(protocol.uplift);
        let audit = memory.append_intervention(
            &protocol.name,
            &protocol.opens_options,
            lifted - flexibility_before,
        );
        self.refresh(&mut memory);
        let flexibility_after = memory.flexibility_score();

        let warning_state = self.evaluate(&memory);
        self.push_history(&handle, warning_state.clone()).await;

        info!(
            session_id = %session_id,
            protocol = %protocol.name,
            level = protocol.level,
            flexibility_before = flexibility_before,
            flexibility_after = flexibility_after,
            overall_risk = %warning_state.overall_risk,
            "Escape protocol executed"
        );

        Ok(ExecutionResult {
            protocol: protocol.name.clone(),
            flexibility_before,
            flexibility_after,
            executed: true,
            audit_event_id: Some(audit.id),
            warning_state: Some(warning_state),
        })
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Recompute metrics and reachable escape routes.
    fn refresh(&self, memory: &mut PathMemory) {
        let metrics = self.calculator.recompute(memory);
        memory.apply_metrics(metrics);
        memory.escape_routes = self.protocols.routes_at(memory.flexibility_score());
    }

    fn evaluate(&self, memory: &PathMemory) -> WarningState {
        let context = SensorContext::from_memory(memory, self.config.sensors.cognitive_window);
        let readings = self.sensors.evaluate(memory, &context);
        self.aggregator
            .aggregate(&memory.session_id, readings, &memory.current_flexibility)
    }

    fn recommend(&self, memory: &PathMemory, state: &WarningState) -> EscapeRecommendation {
        let total_strength = self.planner.analyze(memory).total_strength;
        let protocol = self
            .protocols
            .recommend(memory.flexibility_score(), total_strength);

        let reason = if state.flexibility_level == WarningLevel::Critical {
            format!(
                "Flexibility {:.2} is in the critical band",
                state.flexibility_score
            )
        } else if state.compound_risk {
            let sensors: Vec<&str> = state
                .active_warnings
                .iter()
                .filter(|r| r.severity >= WarningLevel::Warning)
                .map(|r| r.sensor_name.as_str())
                .collect();
            format!("Compound risk from sensors: {}", sensors.join(", "))
        } else {
            let critical: Vec<&str> = state
                .active_warnings
                .iter()
                .filter(|r| r.severity == WarningLevel::Critical)
                .map(|r| r.sensor_name.as_str())
                .collect();
            format!("Critical reading from: {}", critical.join(", "))
        };

        warn!(
            session_id = %memory.session_id,
            protocol = %protocol.name,
            reason = %reason,
            "Escape recommended"
        );

        EscapeRecommendation {
            name: protocol.name.clone(),
            level: protocol.level,
            reason,
            urgency: state.overall_risk,
            steps: protocol.steps.clone(),
            execution_time: protocol.execution_time.clone(),
            success_probability: protocol.success_probability,
        }
    }

    async fn push_history(&self, handle: &SessionHandle, state: WarningState) {
        let mut history = handle.history.write().await;
        if let Some(previous) = history.latest() {
            if previous.overall_risk != state.overall_risk {
                info!(
                    session_id = %state.session_id,
                    from = %previous.overall_risk,
                    to = %state.overall_risk,
                    "Warning level changed"
                );
            }
        }
        history.push(state);
    }
}

fn not_found(session_id: &str) -> EngineError {
    EngineError::SessionNotFound {
        session_id: session_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warning::RecommendedAction;

    fn engine() -> RiskEngine {
        RiskEngine::with_defaults(EngineConfig::default())
    }

    #[tokio::test]
    async fn test_open_session_twice_fails() {
        let engine = engine();
        engine.open_session("s1").await.unwrap();
        let err = engine.open_session("s1").await.unwrap_err();
        assert!(matches!(err, EngineError::SessionExists { .. }));
        assert_eq!(engine.session_ids().await, vec!["s1".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_session_is_reported() {
        let engine = engine();
        let err = engine
            .record_step("missing", "po", 1, "x", StepDelta::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::SessionNotFound { .. }));
        assert!(engine.get_warning_history("missing").await.is_err());
        assert!(engine.plan_escape("missing").await.is_err());
        assert!(engine.close_session("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_fresh_session_is_safe() {
        let engine = engine();
        engine.open_session("s1").await.unwrap();
        let state = engine.get_warning_state("s1").await.unwrap();
        assert_eq!(state.overall_risk, WarningLevel::Safe);
        assert_eq!(state.recommended_action, RecommendedAction::Proceed);
        assert!(engine.get_warning_history("s1").await.unwrap().is_empty());

        let memory = engine.path_memory("s1").await.unwrap();
        assert_eq!(memory.escape_routes.len(), 5);
    }

    #[tokio::test]
    async fn test_record_step_appends_history() {
        let engine = engine();
        engine.open_session("s1").await.unwrap();
        let result = engine
            .record_step("s1", "six_hats", 1, "White hat facts", StepDelta::new(0.1, 0.2))
            .await
            .unwrap();
        assert!(result.escape_recommendation.is_none());
        assert_eq!(result.path_memory_delta.event.step, 1);

        let history = engine.get_warning_history("s1").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0], result.warning_state);
    }

    #[tokio::test]
    async fn test_unknown_protocol_is_rejected() {
        let engine = engine();
        engine.open_session("s1").await.unwrap();
        let err = engine
            .execute_protocol("s1", ExecuteProtocolParams::new("Teleport"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownProtocol { .. }));
    }

    #[tokio::test]
    async fn test_close_session_discards_state() {
        let engine = engine();
        engine.open_session("s1").await.unwrap();
        engine.close_session("s1").await.unwrap();
        assert!(engine.session_ids().await.is_empty());
        assert!(engine.path_memory("s1").await.is_err());
    }
}
