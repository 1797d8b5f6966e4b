//! CLI integration tests
//!
//! Replays scenario files written to temporary directories.

use std::io::Write;

use tempfile::{NamedTempFile, TempDir};

use path_risk_engine::cli::{execute_command, run_simulation, Commands, Scenario};
use path_risk_engine::config::EngineConfig;
use path_risk_engine::WarningLevel;

const LOCKED_IN: &str = r#"{
    "session_id": "locked-in",
    "steps": [
        {"technique": "scamper", "decision": "Drop the free tier", "reversibility_cost": 0.95, "commitment_level": 0.9},
        {"technique": "scamper", "decision": "Sign the exclusive reseller deal", "reversibility_cost": 0.95, "commitment_level": 0.9},
        {"technique": "scamper", "decision": "Rewrite the client in the vendor SDK", "reversibility_cost": 0.95, "commitment_level": 0.9},
        {"technique": "scamper", "decision": "Announce the launch date publicly", "reversibility_cost": 0.95, "commitment_level": 0.9},
        {"technique": "scamper", "decision": "Hire the dedicated sales team", "reversibility_cost": 0.95, "commitment_level": 0.9},
        {"technique": "scamper", "decision": "Retire the legacy API", "reversibility_cost": 0.95, "commitment_level": 0.9}
    ],
    "protocols": ["Pattern Interruption"]
}"#;

fn scenario_file(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_run_simulation_replays_every_step() {
    let scenario = Scenario::from_json(LOCKED_IN).unwrap();
    let report = run_simulation(&scenario, &EngineConfig::default(), true)
        .await
        .unwrap();

    assert_eq!(report.session_id, "locked-in");
    assert_eq!(report.steps.len(), 6);
    assert_eq!(report.executions.len(), 1);
    assert!(report.executions[0].executed);
    assert!(report.escape_analysis.is_some());
    assert!(report.peak_risk() >= WarningLevel::Warning);

    let steps: Vec<u32> = report
        .steps
        .iter()
        .map(|s| s.path_memory_delta.event.step)
        .collect();
    assert_eq!(steps, vec![1, 2, 3, 4, 5, 6]);
}

#[tokio::test]
async fn test_run_simulation_unknown_protocol_fails() {
    let json = r#"{"steps": [{"technique": "po", "decision": "x"}], "protocols": ["Teleport"]}"#;
    let scenario = Scenario::from_json(json).unwrap();
    let err = run_simulation(&scenario, &EngineConfig::default(), false)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Unknown escape protocol"));
}

#[tokio::test]
async fn test_simulate_command_text_output() {
    let file = scenario_file(LOCKED_IN);
    let result = execute_command(
        Commands::Simulate {
            scenario: file.path().to_path_buf(),
            json: false,
            plan: true,
        },
        &EngineConfig::default(),
    )
    .await;

    assert_eq!(result.exit_code, 0);
    assert!(result.message.contains("Simulation: locked-in"));
    assert!(result.message.contains("step   1 [scamper]"));
    assert!(result.message.contains("Executed Pattern Interruption"));
    assert!(result.message.contains("Escape Analysis"));
}

#[tokio::test]
async fn test_simulate_command_json_output() {
    let file = scenario_file(LOCKED_IN);
    let result = execute_command(
        Commands::Simulate {
            scenario: file.path().to_path_buf(),
            json: true,
            plan: false,
        },
        &EngineConfig::default(),
    )
    .await;

    assert_eq!(result.exit_code, 0);
    let report: serde_json::Value = serde_json::from_str(&result.message).unwrap();
    assert_eq!(report["session_id"], "locked-in");
    assert_eq!(report["steps"].as_array().unwrap().len(), 6);
    assert!(report["escape_analysis"].is_null());
    assert!(report["steps"][0]["warning_state"]["overall_risk"].is_string());
}

#[tokio::test]
async fn test_simulate_command_missing_file() {
    let dir = TempDir::new().unwrap();
    let result = execute_command(
        Commands::Simulate {
            scenario: dir.path().join("missing.json"),
            json: false,
            plan: false,
        },
        &EngineConfig::default(),
    )
    .await;

    assert_eq!(result.exit_code, 1);
    assert!(result.message.starts_with("Failed to load"));
}

#[tokio::test]
async fn test_simulate_command_rejects_empty_scenario() {
    let file = scenario_file(r#"{"steps": []}"#);
    let result = execute_command(
        Commands::Simulate {
            scenario: file.path().to_path_buf(),
            json: false,
            plan: false,
        },
        &EngineConfig::default(),
    )
    .await;

    assert_eq!(result.exit_code, 1);
    assert!(result.message.contains("scenario has no steps"));
}

#[tokio::test]
async fn test_protocols_and_config_commands() {
    let config = EngineConfig::default();

    let protocols = execute_command(Commands::Protocols, &config).await;
    assert_eq!(protocols.exit_code, 0);
    assert!(protocols.message.contains("Strategic Pivot"));

    let printed = execute_command(Commands::Config, &config).await;
    assert_eq!(printed.exit_code, 0);
    let value: serde_json::Value = serde_json::from_str(&printed.message).unwrap();
    assert_eq!(value["warning"]["history_retention"], 1000);
}
