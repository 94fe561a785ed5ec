//! Decision Audit CLI
//!
//! Thin glue around the audit pipeline: demo sequence, ledger verification,
//! CSV batch replay and the deterministic scenario suite.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use decision_audit::clock::SystemClock;
use decision_audit::crypto::{load_or_generate_key, CryptoProvider};
use decision_audit::fairness::compute_group_metrics;
use decision_audit::harness::{baseline_decision, ScenarioHarness};
use decision_audit::ledger::Ledger;
use decision_audit::model::mortgage_risk_model;
use decision_audit::orchestrator::{DecisionInput, Orchestrator};
use decision_audit::policy::ProfileRegistry;
use decision_audit::replay::replay_csv;
use decision_audit::AuditConfig;

#[derive(Parser)]
#[command(name = "decision-audit")]
#[command(about = "Tamper-evident audit pipeline for algorithmic decisions")]
#[command(version = "0.1.0")]
struct Cli {
    /// Optional YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the demo sequence through the full pipeline
    Demo,
    /// Verify a persisted ledger against its signing key
    Verify {
        /// Path to the persisted ledger JSON
        #[arg(long)]
        ledger: PathBuf,

        /// Path to the 32-byte signing key file
        #[arg(long)]
        key: PathBuf,
    },
    /// Replay a CSV batch of decision contexts
    Replay {
        /// CSV file with one decision context per row
        path: PathBuf,

        /// Grouping attribute for the fairness report
        #[arg(long, default_value = "segment")]
        group_by: String,
    },
    /// Run the deterministic scenario suite
    Scenarios,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "decision_audit=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AuditConfig::from_yaml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => AuditConfig::default(),
    };

    match cli.command {
        Commands::Demo => run_demo(),
        Commands::Verify { ledger, key } => run_verify(ledger, key),
        Commands::Replay { path, group_by } => run_replay(config, path, &group_by),
        Commands::Scenarios => run_scenarios(),
    }
}

fn run_demo() -> anyhow::Result<()> {
    let config = AuditConfig {
        max_epsilon: 20.0,
        drift_window_size: 20,
        drift_threshold: 2.5,
        min_test_samples: 5,
        ..AuditConfig::default()
    };
    let mut orchestrator = Orchestrator::new(config)?;

    println!("[1] VALID DECISION");
    let context = demo_context(150_000.0, 200_000.0, 1_000.0, 6_000.0, 0.5);
    let decision = mortgage_risk_model(&context).into();
    let result = orchestrator.audit_decision(&decision, &context)?;
    println!("  audit id:           {}", result.audit_id);
    println!("  constraints passed: {}", result.constraints.passed);
    println!("  block hash:         {}...", &result.block_hash[..16]);
    println!("  budget spent:       {:.2}", result.privacy.spent);

    println!("\n[2] POLICY VIOLATION");
    let context = demo_context(200_000.0, 210_000.0, 3_000.0, 5_000.0, 1.5);
    let decision = DecisionInput {
        decision: "APPROVE".to_string(),
        score: 0.9,
        reasons: vec![],
    };
    let result = orchestrator.audit_decision(&decision, &context)?;
    println!("  final outcome: {}", result.final_outcome);
    for violation in &result.constraints.violations {
        println!(
            "  - {} [{}]: {}",
            violation.id,
            violation.severity.as_str(),
            violation.description
        );
    }

    println!("\n[3] DRIFT DETECTION");
    let mut drift_seen = false;
    for i in 0..25 {
        let context = demo_context(150_000.0 + i as f64 * 100.0, 200_000.0, 1_000.0, 6_000.0, 0.5);
        let decision = mortgage_risk_model(&context).into();
        orchestrator.audit_decision(&decision, &context)?;
    }
    for i in 0..25 {
        let context = demo_context(300_000.0 + i as f64 * 500.0, 350_000.0, 4_000.0, 8_000.0, 0.9);
        let decision = mortgage_risk_model(&context).into();
        let result = orchestrator.audit_decision(&decision, &context)?;
        if let Some(drift) = &result.drift {
            if drift.drift {
                println!(
                    "  drift detected: score {:.2} > threshold {:.2}",
                    drift.score, drift.threshold
                );
                drift_seen = true;
                break;
            }
        }
    }
    if !drift_seen {
        println!("  no drift detected within demo window");
    }

    println!("\n[4] SCENARIO SUITE");
    let engine = ProfileRegistry::with_builtin()
        .build("financial_basic")
        .unwrap_or_default();
    let report = ScenarioHarness::standard_suite().run(|inputs| baseline_decision(&engine, inputs));
    println!("  total: {}  passed: {}  failed: {}", report.total, report.passed, report.failed);
    for (category, stats) in &report.by_category {
        println!("  {}: {}/{}", category, stats.passed, stats.total);
    }

    println!("\n[5] INTEGRITY VERIFICATION");
    let integrity = orchestrator.verify_integrity();
    println!(
        "  chain: {} ({} blocks)",
        if integrity.chain_valid { "VALID" } else { "INVALID" },
        integrity.chain_length
    );
    println!("  decisions audited: {}", integrity.total_decisions);
    println!("  drift events:      {}", integrity.total_drift_events);
    println!(
        "  privacy budget:    {:.2}/{:.2} spent, {:.2} remaining",
        integrity.privacy.spent, integrity.privacy.total_budget, integrity.privacy.remaining
    );

    println!("\n[6] FAIRNESS REPORT");
    let blocks = orchestrator.ledger().blocks();
    let fairness = compute_group_metrics(&blocks, "segment");
    println!("{}", serde_json::to_string_pretty(&fairness)?);

    Ok(())
}

fn demo_context(
    loan_amount: f64,
    property_value: f64,
    monthly_debt: f64,
    monthly_income: f64,
    marginal_var: f64,
) -> Map<String, Value> {
    let mut context = Map::new();
    context.insert("loan_amount".to_string(), json!(loan_amount));
    context.insert("property_value".to_string(), json!(property_value));
    context.insert("monthly_debt".to_string(), json!(monthly_debt));
    context.insert("monthly_income".to_string(), json!(monthly_income));
    context.insert("marginal_var".to_string(), json!(marginal_var));
    context.insert("var_limit".to_string(), json!(1.0));
    context.insert(
        "segment".to_string(),
        json!(if loan_amount < 250_000.0 { "standard" } else { "jumbo" }),
    );
    context.insert(
        "features".to_string(),
        json!([loan_amount, property_value, monthly_debt, monthly_income, marginal_var]),
    );
    context
}

fn run_verify(ledger_path: PathBuf, key_path: PathBuf) -> anyhow::Result<()> {
    if !ledger_path.exists() {
        anyhow::bail!("ledger file {} does not exist", ledger_path.display());
    }
    let key = load_or_generate_key(&key_path)?;
    let ledger = Ledger::with_persistence(
        CryptoProvider::from_key(key),
        Arc::new(SystemClock),
        ledger_path.clone(),
    )
    .with_context(|| format!("loading ledger {}", ledger_path.display()))?;

    let (valid, errors) = ledger.verify_integrity();
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "chain_valid": valid,
            "chain_length": ledger.len(),
            "chain_errors": errors,
        }))?
    );
    Ok(())
}

fn run_replay(config: AuditConfig, path: PathBuf, group_by: &str) -> anyhow::Result<()> {
    if config.ledger_path.is_some() && config.key_path.is_none() {
        anyhow::bail!("a persistent ledger requires key_path in the configuration");
    }

    let mut orchestrator = Orchestrator::new(config)?;
    let summary = replay_csv(&mut orchestrator, &path)?;
    info!("Replay complete: {} rows", summary.rows);

    let blocks = orchestrator.ledger().blocks();
    let fairness = compute_group_metrics(&blocks, group_by);

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "summary": summary,
            "integrity": orchestrator.verify_integrity(),
            "fairness": fairness,
        }))?
    );
    Ok(())
}

fn run_scenarios() -> anyhow::Result<()> {
    let engine = ProfileRegistry::with_builtin()
        .build("financial_basic")
        .unwrap_or_default();
    let report = ScenarioHarness::standard_suite().run(|inputs| baseline_decision(&engine, inputs));
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
