//! Escape planning integration tests
//!
//! Covers protocol recommendation across the whole input range and escape
//! analyses produced through the engine.

use pretty_assertions::assert_eq;

use path_risk_engine::config::EngineConfig;
use path_risk_engine::escape::{ContingencyTrigger, PhaseKind, ProtocolCatalog};
use path_risk_engine::path_memory::StepDelta;
use path_risk_engine::RiskEngine;

async fn locked_in_engine(steps: u32) -> RiskEngine {
    let engine = RiskEngine::with_defaults(EngineConfig::default());
    engine.open_session("s").await.unwrap();
    for i in 0..steps {
        engine
            .record_step(
                "s",
                "scamper",
                i + 1,
                &format!("Commit to variant {}", i),
                StepDelta::new(0.95, 0.9).with_closed([format!("variant-{}", i)]),
            )
            .await
            .unwrap();
    }
    engine
}

#[test]
fn test_recommend_protocol_always_returns_a_catalog_entry() {
    let catalog = ProtocolCatalog::default();
    for f in 0..=100 {
        for s in 0..=10 {
            let flexibility = f as f64 / 100.0;
            let strength = s as f64 / 10.0;
            let protocol = catalog.recommend(flexibility, strength);
            assert!(
                catalog.get(&protocol.name).is_some(),
                "no protocol for flexibility {} strength {}",
                flexibility,
                strength
            );
        }
    }
}

#[test]
fn test_recommend_protocol_falls_back_at_bottom_of_scale() {
    let catalog = ProtocolCatalog::default();
    assert_eq!(catalog.recommend(0.0, 0.0).name, "Pattern Interruption");
    assert_eq!(catalog.recommend(0.09, 1.0).name, "Pattern Interruption");
}

#[tokio::test]
async fn test_plan_escape_for_fresh_session_is_feasible() {
    let engine = RiskEngine::with_defaults(EngineConfig::default());
    engine.open_session("s").await.unwrap();

    let analysis = engine.plan_escape("s").await.unwrap();
    assert!(analysis.feasibility);
    assert!(analysis.warnings.is_empty());
    assert_eq!(analysis.constraints.total_strength, 0.0);
    assert!(analysis.success_probability <= 0.95);
}

#[tokio::test]
async fn test_plan_escape_for_locked_in_session_is_infeasible_not_an_error() {
    let engine = locked_in_engine(20).await;

    let analysis = engine.plan_escape("s").await.unwrap();
    assert_eq!(analysis.flexibility_score, 0.0);
    assert!(!analysis.feasibility);
    assert!(analysis.escape_force_needed > analysis.resources.available_resources);
    assert!(analysis.success_probability < 0.5);
    assert!(!analysis.warnings.is_empty());
    assert_eq!(analysis.protocol.name, "Pattern Interruption");
}

#[tokio::test]
async fn test_plan_escape_trajectory_shape() {
    let engine = locked_in_engine(8).await;

    let analysis = engine.plan_escape("s").await.unwrap();
    let phases: Vec<PhaseKind> = analysis.trajectory.phases.iter().map(|p| p.phase).collect();
    assert_eq!(
        phases,
        vec![PhaseKind::Preparation, PhaseKind::Execution, PhaseKind::Consolidation]
    );
    for phase in &analysis.trajectory.phases {
        assert!(!phase.rollback_plan.is_empty());
        assert!(!phase.success_criteria.is_empty());
        assert!(!phase.required_resources.is_empty());
    }
    assert_eq!(
        analysis.trajectory.critical_path,
        vec![PhaseKind::Execution, PhaseKind::Consolidation]
    );

    let triggers: Vec<ContingencyTrigger> = analysis
        .execution_plan
        .contingencies
        .iter()
        .map(|c| c.trigger)
        .collect();
    assert_eq!(
        triggers,
        vec![
            ContingencyTrigger::ResourceShortage,
            ContingencyTrigger::StakeholderResistance,
            ContingencyTrigger::TechnicalFailure,
        ]
    );
}

#[tokio::test]
async fn test_success_probability_never_exceeds_cap() {
    for steps in [0, 1, 3, 8, 20] {
        let engine = locked_in_engine(steps).await;
        let analysis = engine.plan_escape("s").await.unwrap();
        assert!((0.0..=0.95).contains(&analysis.success_probability));
        assert!((0.0..=1.0).contains(&analysis.constraints.total_strength));
    }
}

#[tokio::test]
async fn test_escape_routes_shrink_as_flexibility_drops() {
    let engine = locked_in_engine(0).await;
    assert_eq!(engine.path_memory("s").await.unwrap().escape_routes.len(), 5);

    let engine = locked_in_engine(20).await;
    let routes = engine.path_memory("s").await.unwrap().escape_routes;
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].name, "Pattern Interruption");
}

#[tokio::test]
async fn test_plan_escape_unknown_session() {
    let engine = RiskEngine::with_defaults(EngineConfig::default());
    assert!(engine.plan_escape("missing").await.is_err());
}
