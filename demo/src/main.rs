//! REMEDY — Demo CLI
//!
//! Runs simulated research pipelines through the repair loop and inspects the
//! policy and rule files a deployment would load.
//!
//! Usage:
//!   cargo run -p demo -- run citation
//!   cargo run -p demo -- run stubborn --policy policy.toml --json
//!   cargo run -p demo -- policy policy.toml
//!   cargo run -p demo -- rules --overrides rules.toml

mod scenarios;
mod simulated;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use remedy_actions::ActionCatalog;
use remedy_contracts::{
    error::{RepairError, RepairResult},
    execution::RepairRunRecord,
    outcome::PipelineReport,
    policy::RepairPolicy,
};
use remedy_policy::{RuleOverrides, RuleTable};

use crate::scenarios::Scenario;

// ── CLI definition ────────────────────────────────────────────────────────────

/// REMEDY — bounded automatic repair for failed pipeline runs.
#[derive(Parser)]
#[command(
    name = "remedy",
    about = "REMEDY repair loop demo",
    long_about = "Runs simulated research pipelines through the REMEDY repair loop and\n\
                  validates the policy and rule files that govern it."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Repair one simulated pipeline scenario.
    Run {
        #[arg(value_enum)]
        scenario: Scenario,
        /// Repair policy file (TOML, or JSON with a .json extension).
        #[arg(long)]
        policy: Option<PathBuf>,
        /// Rule override file merged over the built-in rule table.
        #[arg(long)]
        rules: Option<PathBuf>,
        /// Print the full run record as JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },
    /// Validate a policy file and print its canonical form.
    Policy { file: PathBuf },
    /// Print the effective rule table.
    Rules {
        #[arg(long)]
        overrides: Option<PathBuf>,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // RUST_LOG=debug shows every planning decision.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run {
            scenario,
            policy,
            rules,
            json,
        } => run_scenario(scenario, policy.as_deref(), rules.as_deref(), json),
        Command::Policy { file } => show_policy(&file),
        Command::Rules { overrides } => show_rules(overrides.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("remedy: {}", e);
        std::process::exit(1);
    }
}

// ── Subcommands ───────────────────────────────────────────────────────────────

fn load_rules(overrides: Option<&Path>) -> RepairResult<RuleTable> {
    let base = RuleTable::builtin();
    match overrides {
        Some(path) => Ok(base.merged(&RuleOverrides::from_file(path)?)),
        None => Ok(base),
    }
}

fn run_scenario(
    scenario: Scenario,
    policy: Option<&Path>,
    rules: Option<&Path>,
    json: bool,
) -> RepairResult<()> {
    let policy = match policy {
        Some(path) => RepairPolicy::from_file(path)?,
        None => RepairPolicy::default(),
    };
    let rules = load_rules(rules)?;

    let record = scenarios::run(scenario, policy, rules)?;

    if json {
        let text = serde_json::to_string_pretty(&record).map_err(|e| RepairError::Serialization {
            reason: format!("failed to serialize run record: {e}"),
        })?;
        println!("{text}");
    } else {
        print_summary(scenario, &record);
    }
    Ok(())
}

fn print_summary(scenario: Scenario, record: &RepairRunRecord<PipelineReport>) {
    println!("=== Scenario: {} ===", scenario.name());
    println!();
    println!("  Run id:       {}", record.run_id);
    println!("  Stop reason:  {}", record.stop_reason);
    println!("  Attempts:     {}", record.attempts);
    println!("  Elapsed:      {:.3}s", record.total_elapsed_seconds);
    println!();

    for (i, signals) in record.failure_signals_history.iter().enumerate() {
        println!("  Attempt {} failed:", i + 1);
        for signal in signals {
            println!(
                "    [{}] {} ({})",
                signal.stage().as_str(),
                signal.kind(),
                signal.message()
            );
        }
    }
    if !record.failure_signals_history.is_empty() {
        println!();
    }

    if record.action_history.is_empty() {
        println!("  Actions applied: none");
    } else {
        println!("  Actions applied: {}", record.action_history.join(" -> "));
    }

    println!("  Final config:");
    for (key, value) in &record.final_config {
        // The embedded policy is noise in a summary.
        if key == remedy_contracts::action::keys::REPAIR_POLICY {
            continue;
        }
        println!("    {key} = {value}");
    }
    println!();
    println!(
        "  Result: {}",
        if record.succeeded() { "REPAIRED" } else { "GAVE UP" }
    );
}

fn show_policy(file: &Path) -> RepairResult<()> {
    let policy = RepairPolicy::from_file(file)?;
    println!("{}", policy.to_json()?);
    println!("fingerprint: {}", policy.fingerprint()?);
    Ok(())
}

fn show_rules(overrides: Option<&Path>) -> RepairResult<()> {
    let table = load_rules(overrides)?;
    let catalog = ActionCatalog::new();

    println!("rule table version {}", table.version());
    println!("fingerprint: {}", table.fingerprint()?);
    println!();
    for (kind, ids) in table.entries() {
        let ids = if ids.is_empty() {
            "(none)".to_string()
        } else {
            ids.join(", ")
        };
        println!("  {:<22} {}", kind.as_str(), ids);
    }

    let unknown = table.unknown_actions(&catalog);
    if !unknown.is_empty() {
        println!();
        for (kind, id) in unknown {
            println!("  warning: {kind} names unregistered action '{id}'");
        }
    }

    println!();
    println!("registered actions:");
    for (id, description) in catalog.describe() {
        println!("  {:<22} {}", id, description);
    }
    Ok(())
}
