//! Engine integration tests
//!
//! Drives the public `RiskEngine` API end to end: recording steps, warning
//! levels, escape recommendations and protocol execution.

use std::sync::Arc;

use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;

use path_risk_engine::config::EngineConfig;
use path_risk_engine::escape::{ExecuteProtocolParams, ProtocolCatalog};
use path_risk_engine::path_memory::{BarrierCatalog, StepDelta};
use path_risk_engine::sensors::SensorArray;
use path_risk_engine::warning::{RecommendedAction, WarningLevel, WarningState};
use path_risk_engine::{EngineError, RecordStepResult, RiskEngine};

// ============================================================================
// Helpers
// ============================================================================

fn engine() -> RiskEngine {
    RiskEngine::with_defaults(EngineConfig::default())
}

/// Engine whose sensors never report, so levels follow flexibility bands alone.
fn banded_engine() -> RiskEngine {
    RiskEngine::new(
        EngineConfig::default(),
        ProtocolCatalog::default(),
        BarrierCatalog::default(),
        SensorArray::empty(),
    )
}

async fn open(engine: &RiskEngine, session_id: &str) {
    engine.open_session(session_id).await.unwrap();
}

async fn record(
    engine: &RiskEngine,
    session_id: &str,
    technique: &str,
    step: u32,
    decision: &str,
    delta: StepDelta,
) -> RecordStepResult {
    engine
        .record_step(session_id, technique, step, decision, delta)
        .await
        .unwrap()
}

/// Deterministic spread of (reversibility, commitment) pairs, some out of range.
fn mixed_deltas(count: usize) -> Vec<StepDelta> {
    (0..count)
        .map(|i| {
            let rev = ((i * 37) % 23) as f64 / 20.0 - 0.05;
            let commit = ((i * 53) % 29) as f64 / 25.0 - 0.1;
            StepDelta::new(rev, commit)
        })
        .collect()
}

fn sensors_at_or_above(state: &WarningState, level: WarningLevel) -> usize {
    let mut names: Vec<&str> = state
        .readings
        .iter()
        .filter(|r| r.severity >= level)
        .map(|r| r.sensor_name.as_str())
        .collect();
    names.sort_unstable();
    names.dedup();
    names.len()
}

// ============================================================================
// Flexibility invariants
// ============================================================================

#[tokio::test]
async fn test_flexibility_stays_in_unit_interval() {
    let engine = engine();
    open(&engine, "s").await;

    for (i, delta) in mixed_deltas(60).into_iter().enumerate() {
        let result = record(&engine, "s", "triz", i as u32 + 1, &format!("decision {}", i), delta).await;
        let score = result.flexibility.flexibility_score;
        assert!((0.0..=1.0).contains(&score), "score {} out of range", score);
        assert!((0.0..=1.0).contains(&result.flexibility.reversibility_index));
        for proximity in &result.flexibility.barrier_proximities {
            assert!((0.0..=1.0).contains(&proximity.proximity));
        }
    }
}

#[tokio::test]
async fn test_flexibility_non_increasing_without_protocols() {
    let engine = engine();
    open(&engine, "s").await;

    let mut previous = 1.0;
    for (i, delta) in mixed_deltas(40).into_iter().enumerate() {
        let result = record(&engine, "s", "po", i as u32 + 1, &format!("step {}", i), delta).await;
        let score = result.flexibility.flexibility_score;
        assert!(score <= previous + 1e-12, "score rose from {} to {}", previous, score);
        previous = score;
    }
}

#[tokio::test]
async fn test_out_of_range_inputs_are_clamped() {
    let engine = engine();
    open(&engine, "s").await;

    let result = record(&engine, "s", "triz", 1, "overshoot", StepDelta::new(2.5, -0.4)).await;
    assert_eq!(result.path_memory_delta.event.reversibility_cost, 1.0);
    assert_eq!(result.path_memory_delta.event.commitment_level, 0.0);
}

// ============================================================================
// Warning levels
// ============================================================================

#[tokio::test]
async fn test_stubbed_sensors_follow_flexibility_bands() {
    let engine = banded_engine();
    let bands = EngineConfig::default().warning;
    open(&engine, "s").await;

    for i in 0..25u32 {
        let result = record(&engine, "s", "scamper", i + 1, "commit", StepDelta::new(0.8, 0.85)).await;
        let state = &result.warning_state;
        assert_eq!(
            state.overall_risk,
            bands.level_for_score(result.flexibility.flexibility_score)
        );
        assert!(state.readings.is_empty());
        assert!(!state.compound_risk);
    }

    let history = engine.get_warning_history("s").await.unwrap();
    let levels: Vec<WarningLevel> = history.iter().map(|s| s.overall_risk).collect();
    assert_eq!(levels.first(), Some(&WarningLevel::Safe));
    assert_eq!(levels.last(), Some(&WarningLevel::Critical));
    assert!(levels.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_compound_risk_iff_two_sensors_at_warning() {
    let engine = engine();
    open(&engine, "s").await;

    let mut saw_compound = false;
    for i in 0..12u32 {
        let result = record(
            &engine,
            "s",
            "scamper",
            i + 1,
            "Double down on the premium tier",
            StepDelta::new(0.95, 0.9),
        )
        .await;
        let state = &result.warning_state;
        assert_eq!(
            state.compound_risk,
            sensors_at_or_above(state, WarningLevel::Warning) >= 2
        );
        if state.compound_risk {
            saw_compound = true;
            assert_eq!(state.recommended_action, RecommendedAction::Escape);
        }
    }
    assert!(saw_compound);
}

#[tokio::test]
async fn test_active_warnings_are_readings_above_safe() {
    let engine = engine();
    open(&engine, "s").await;

    for i in 0..10u32 {
        let result = record(&engine, "s", "six_hats", i + 1, "same words again", StepDelta::new(0.5, 0.75)).await;
        let state = result.warning_state;
        let expected: Vec<_> = state
            .readings
            .iter()
            .filter(|r| r.severity > WarningLevel::Safe)
            .cloned()
            .collect();
        assert_eq!(state.active_warnings, expected);
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_scenario_locked_in_session_recommends_pattern_interruption() {
    let engine = engine();
    open(&engine, "s").await;

    let mut last = None;
    for i in 0..20u32 {
        last = Some(
            record(
                &engine,
                "s",
                "scamper",
                i + 1,
                &format!("Eliminate alternative {}", i),
                StepDelta::new(0.95, 0.9),
            )
            .await,
        );
    }

    let result = last.unwrap();
    assert_eq!(result.warning_state.overall_risk, WarningLevel::Critical);
    assert_eq!(result.warning_state.recommended_action, RecommendedAction::Escape);
    let recommendation = result.escape_recommendation.unwrap();
    assert_eq!(recommendation.name, "Pattern Interruption");
    assert_eq!(recommendation.urgency, WarningLevel::Critical);
    assert!(!recommendation.steps.is_empty());
}

#[tokio::test]
async fn test_scenario_light_session_is_safe() {
    let engine = engine();
    open(&engine, "s").await;

    let steps = [
        ("six_hats", "Gather the facts about current churn", "churn-data"),
        ("scamper", "Substitute the onboarding email sequence", "email-variant"),
        ("po", "Provoke: what if pricing were inverted", "inverted-pricing"),
        ("yes_and", "Build on the partner referral idea", "referrals"),
        ("triz", "Separate billing from provisioning", "billing-split"),
    ];

    let mut last = None;
    for (i, (technique, decision, option)) in steps.iter().enumerate() {
        last = Some(
            record(
                &engine,
                "s",
                technique,
                i as u32 + 1,
                decision,
                StepDelta::new(0.1, 0.2).with_opened([*option]),
            )
            .await,
        );
    }

    let state = last.unwrap().warning_state;
    assert_eq!(state.overall_risk, WarningLevel::Safe);
    assert!(state.active_warnings.is_empty());
    assert_eq!(state.recommended_action, RecommendedAction::Proceed);
}

#[tokio::test]
async fn test_scenario_long_stalled_session_flags_resources() {
    let engine = engine();
    open(&engine, "s").await;

    let start = Utc::now() - Duration::hours(5);
    let span = Duration::hours(4).num_seconds();
    let mut last = None;
    for i in 0..60i64 {
        let mut delta = StepDelta::new(0.2, 0.3).at(start + Duration::seconds(span * i / 59));
        if i < 50 {
            delta = delta.with_opened([format!("idea-{}", i)]);
        }
        last = Some(
            record(&engine, "s", "six_hats", i as u32 + 1, &format!("Refine idea {}", i), delta).await,
        );
    }

    let state = last.unwrap().warning_state;
    let resource = state.reading("resource").unwrap();
    assert!(resource.severity >= WarningLevel::Warning);
    assert!(!resource.indicators.is_empty());
}

#[tokio::test]
async fn test_scenario_identical_decisions_flag_cognitive_repetition() {
    let engine = engine();
    open(&engine, "s").await;

    let mut last = None;
    for i in 0..15u32 {
        last = Some(
            record(
                &engine,
                "s",
                "six_hats",
                i + 1,
                "Keep polishing the current landing page",
                StepDelta::new(0.2, 0.3),
            )
            .await,
        );
    }

    let state = last.unwrap().warning_state;
    let cognitive = state.reading("cognitive").unwrap();
    assert!(cognitive
        .indicators
        .iter()
        .any(|i| i.contains("Repetitive decision pattern")));
}

// ============================================================================
// Protocol execution
// ============================================================================

#[tokio::test]
async fn test_execute_protocol_twice_never_exceeds_one() {
    let engine = engine();
    open(&engine, "s").await;
    for i in 0..3u32 {
        record(&engine, "s", "triz", i + 1, "commit", StepDelta::new(0.6, 0.6)).await;
    }

    for _ in 0..2 {
        let result = engine
            .execute_protocol("s", ExecuteProtocolParams::new("Strategic Pivot"))
            .await
            .unwrap();
        assert!(result.executed);
        assert!(result.flexibility_after <= 1.0);
        assert!(result.flexibility_after >= result.flexibility_before);
    }

    let memory = engine.path_memory("s").await.unwrap();
    assert!(memory.flexibility_score() <= 1.0);
}

#[tokio::test]
async fn test_execute_protocol_on_fresh_session_stays_at_one() {
    let engine = engine();
    open(&engine, "s").await;

    let result = engine
        .execute_protocol("s", ExecuteProtocolParams::new("Pattern Interruption"))
        .await
        .unwrap();
    assert_eq!(result.flexibility_before, 1.0);
    assert_eq!(result.flexibility_after, 1.0);
}

#[tokio::test]
async fn test_unconfirmed_execution_is_a_no_op() {
    let engine = engine();
    open(&engine, "s").await;
    record(&engine, "s", "triz", 1, "commit", StepDelta::new(0.9, 0.9)).await;
    let before = engine.path_memory("s").await.unwrap();

    let result = engine
        .execute_protocol(
            "s",
            ExecuteProtocolParams::new("Stakeholder Reset").with_confirmation(false),
        )
        .await
        .unwrap();

    assert!(!result.executed);
    assert_eq!(result.flexibility_before, result.flexibility_after);
    assert_eq!(result.flexibility_before, before.flexibility_score());
    assert!(result.audit_event_id.is_none());

    let after = engine.path_memory("s").await.unwrap();
    assert_eq!(after.path_history.len(), before.path_history.len());
    assert_eq!(engine.get_warning_history("s").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_confirmed_execution_appends_audit_event() {
    let engine = engine();
    open(&engine, "s").await;
    for i in 0..3u32 {
        record(&engine, "s", "triz", i + 1, "commit", StepDelta::new(0.9, 0.9)).await;
    }

    let result = engine
        .execute_protocol(
            "s",
            ExecuteProtocolParams::new("resource reallocation").with_confirmation(true),
        )
        .await
        .unwrap();
    assert!(result.executed);
    assert_eq!(result.protocol, "Resource Reallocation");
    let expected = (result.flexibility_before + 0.15).min(1.0);
    assert!((result.flexibility_after - expected).abs() < 1e-9);

    let memory = engine.path_memory("s").await.unwrap();
    let audit_id = result.audit_event_id.unwrap();
    let audit = memory.event(&audit_id).unwrap();
    assert!(audit.is_intervention());
    assert!(memory.available_options.contains("reallocated_capacity"));
    assert_eq!(engine.get_warning_history("s").await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_uplift_survives_later_steps() {
    let engine = engine();
    open(&engine, "s").await;
    for i in 0..5u32 {
        record(&engine, "s", "triz", i + 1, "commit", StepDelta::new(0.9, 0.9)).await;
    }

    let executed = engine
        .execute_protocol("s", ExecuteProtocolParams::new("Technical Refactoring"))
        .await
        .unwrap();
    let next = record(&engine, "s", "po", 6, "light touch", StepDelta::new(0.0, 0.0)).await;

    assert!((next.flexibility.flexibility_score - executed.flexibility_after).abs() < 1e-9);
}

#[tokio::test]
async fn test_warning_level_drops_after_recovery() {
    let engine = banded_engine();
    open(&engine, "s").await;
    for i in 0..20u32 {
        record(&engine, "s", "scamper", i + 1, "commit", StepDelta::new(0.95, 0.9)).await;
    }
    assert_eq!(
        engine.get_warning_state("s").await.unwrap().overall_risk,
        WarningLevel::Critical
    );

    let result = engine
        .execute_protocol("s", ExecuteProtocolParams::new("Strategic Pivot"))
        .await
        .unwrap();
    let state = result.warning_state.unwrap();
    assert!(state.overall_risk < WarningLevel::Critical);
    assert_eq!(engine.get_warning_state("s").await.unwrap(), state);
}

#[tokio::test]
async fn test_lock_in_is_detected_after_full_recovery() {
    let engine = banded_engine();
    open(&engine, "s").await;
    let mut step = 0u32;
    for _ in 0..20 {
        step += 1;
        record(&engine, "s", "scamper", step, "commit", StepDelta::new(0.95, 0.9)).await;
    }
    for _ in 0..3 {
        engine
            .execute_protocol("s", ExecuteProtocolParams::new("Strategic Pivot"))
            .await
            .unwrap();
    }
    let recovered = engine.get_warning_state("s").await.unwrap();
    assert!(recovered.flexibility_score > 0.99);
    assert_eq!(recovered.overall_risk, WarningLevel::Safe);

    let mut last = None;
    for _ in 0..40 {
        step += 1;
        last = Some(record(&engine, "s", "scamper", step, "commit", StepDelta::new(1.0, 1.0)).await);
    }
    let last = last.unwrap();
    assert_eq!(last.flexibility.flexibility_score, 0.0);
    assert_eq!(last.warning_state.flexibility_level, WarningLevel::Critical);
    assert_eq!(last.warning_state.overall_risk, WarningLevel::Critical);
}

#[tokio::test]
async fn test_flexibility_falls_again_between_recoveries() {
    let engine = banded_engine();
    open(&engine, "s").await;
    let mut step = 0u32;
    for _ in 0..5 {
        step += 1;
        record(&engine, "s", "triz", step, "commit", StepDelta::new(0.9, 0.9)).await;
    }

    for protocol in ["Technical Refactoring", "Strategic Pivot"] {
        let executed = engine
            .execute_protocol("s", ExecuteProtocolParams::new(protocol))
            .await
            .unwrap();
        assert!(executed.flexibility_after > executed.flexibility_before);

        let mut previous = executed.flexibility_after;
        let mut reached_critical = false;
        for _ in 0..25 {
            step += 1;
            let result = record(&engine, "s", "triz", step, "commit", StepDelta::new(0.95, 0.9)).await;
            let score = result.flexibility.flexibility_score;
            if previous > 0.0 {
                assert!(score < previous, "{}: {} did not fall below {}", protocol, score, previous);
            } else {
                assert_eq!(score, 0.0);
            }
            previous = score;
            if result.warning_state.overall_risk == WarningLevel::Critical {
                reached_critical = true;
                break;
            }
        }
        assert!(reached_critical, "{} never returned to Critical", protocol);
    }
}

#[tokio::test]
async fn test_list_protocols_is_ordered() {
    let engine = engine();
    let names: Vec<&str> = engine.list_protocols().iter().map(|p| p.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Pattern Interruption",
            "Resource Reallocation",
            "Stakeholder Reset",
            "Technical Refactoring",
            "Strategic Pivot"
        ]
    );
}

// ============================================================================
// Sessions and concurrency
// ============================================================================

#[tokio::test]
async fn test_missing_session_is_an_error() {
    let engine = engine();
    let err = engine.get_warning_state("nope").await.unwrap_err();
    assert!(matches!(err, EngineError::SessionNotFound { .. }));
    assert!(engine
        .execute_protocol("nope", ExecuteProtocolParams::new("Pattern Interruption"))
        .await
        .is_err());
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let engine = engine();
    open(&engine, "a").await;
    open(&engine, "b").await;

    for i in 0..10u32 {
        record(&engine, "a", "scamper", i + 1, "commit", StepDelta::new(0.9, 0.9)).await;
    }

    let b = engine.path_memory("b").await.unwrap();
    assert!(b.path_history.is_empty());
    assert_eq!(b.flexibility_score(), 1.0);
    assert!(engine.get_warning_history("b").await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_steps_are_not_lost() {
    let engine = Arc::new(engine());
    open(&engine, "s").await;

    let handles: Vec<_> = (0..32u32)
        .map(|i| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                engine
                    .record_step("s", "po", i + 1, &format!("parallel {}", i), StepDelta::new(0.3, 0.3))
                    .await
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let memory = engine.path_memory("s").await.unwrap();
    assert_eq!(memory.path_history.len(), 32);
    let steps: Vec<u32> = memory.path_history.iter().map(|e| e.step).collect();
    assert_eq!(steps, (1..=32).collect::<Vec<u32>>());
    assert_eq!(engine.get_warning_history("s").await.unwrap().len(), 32);
}

#[tokio::test]
async fn test_history_retention_is_bounded() {
    let mut config = EngineConfig::default();
    config.warning.history_retention = 5;
    let engine = RiskEngine::with_defaults(config);
    open(&engine, "s").await;

    for i in 0..12u32 {
        record(&engine, "s", "po", i + 1, &format!("step {}", i), StepDelta::default()).await;
    }

    let history = engine.get_warning_history("s").await.unwrap();
    assert_eq!(history.len(), 5);
    assert_eq!(engine.path_memory("s").await.unwrap().path_history.len(), 12);
}
