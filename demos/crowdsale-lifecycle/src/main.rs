//! Crowdsale lifecycle walkthrough
//!
//! Runs the engine through four campaigns:
//!
//! 1. **Accumulation**: one backer funds twice, another tops up to the goal
//! 2. **Deadline**: a contribution after the campaign window is rejected
//! 3. **Quorum withdrawal**: a 2-of-2 vault pays out only after both owners sign
//! 4. **Refund**: a shortfall keeps the vault locked and the backer reclaims once

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Duration;
use clap::Parser;
use colored::Colorize;
use crowdsale_core::{
    Crowdsale, CrowdsaleConfig, InMemoryRail, ManualClock, ProjectId, ProjectTerms,
};
use crowdsale_types::{Address, Amount, CrowdsaleResult};
use tracing::info;

/// Crowdsale lifecycle demo
#[derive(Parser)]
#[command(name = "crowdsale-lifecycle")]
#[command(
    about = "Walk a crowdsale engine through funding, finalization, withdrawal and refunds",
    long_about = None
)]
#[command(version)]
struct Cli {
    /// Configuration file path (TOML)
    #[arg(short, long, env = "CROWDSALE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, env = "CROWDSALE_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Campaign length in seconds
    #[arg(long, default_value_t = 5)]
    campaign_secs: i64,
}

fn separator() {
    println!("{}", "━".repeat(72).dimmed());
}

fn header(title: &str) {
    println!();
    println!("{}", "═".repeat(72).cyan());
    println!("  {}", title.cyan().bold());
    println!("{}", "═".repeat(72).cyan());
}

fn step(label: &str, value: impl std::fmt::Display) {
    println!("  {} {}: {}", "├".dimmed(), label, value);
}

fn outcome<T: std::fmt::Debug>(label: &str, result: &CrowdsaleResult<T>) {
    match result {
        Ok(value) => println!(
            "  {} {}: {}",
            "├".dimmed(),
            label,
            format!("{:?}", value).green()
        ),
        Err(err) => println!(
            "  {} {}: {} ({:?})",
            "├".dimmed(),
            label,
            err.to_string().red(),
            err.kind()
        ),
    }
}

struct Demo {
    engine: Arc<Crowdsale>,
    clock: Arc<ManualClock>,
    rail: Arc<InMemoryRail>,
    campaign: Duration,
}

impl Demo {
    fn project(
        &self,
        goal: Amount,
        owners: &[&Address],
        required: usize,
    ) -> CrowdsaleResult<ProjectId> {
        let terms = ProjectTerms::new(
            goal,
            owners.iter().map(|o| (*o).clone()).collect(),
            required,
            self.campaign,
        )
        .with_metadata("Sanyok");
        let id = self.engine.create_project(&Address::new("creator"), terms)?;
        step(
            "created",
            format!(
                "{} goal={} owners={} required={}",
                id,
                goal,
                owners.len(),
                required
            ),
        );
        Ok(id)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| cli.log_level.clone().into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let config = CrowdsaleConfig::load(cli.config.as_deref())?;
    info!(?config, "Configuration loaded");

    let clock = Arc::new(ManualClock::starting_now());
    let rail = Arc::new(InMemoryRail::new());
    let demo = Demo {
        engine: Arc::new(Crowdsale::new(config, clock.clone(), rail.clone())?),
        clock,
        rail,
        campaign: Duration::seconds(cli.campaign_secs),
    };

    println!();
    println!("{}", "╔══════════════════════════════════════════════════════════════╗".cyan());
    println!(
        "{}",
        "║    Crowdsale: funding ledger + N-of-M escrow vaults          ║"
            .cyan()
            .bold()
    );
    println!("{}", "╚══════════════════════════════════════════════════════════════╝".cyan());

    let a = Address::new("A");
    let b = Address::new("B");
    let c = Address::new("C");
    let d = Address::new("D");
    let e = Address::new("E");

    // ── Part 1: accumulation ────────────────────────────────────────
    header("Part 1: Contributions accumulate per backer");
    let first = demo.project(1500, &[&b], 1)?;
    demo.engine.fund_project(&a, first, 800)?;
    demo.engine.fund_project(&a, first, 200)?;
    step("A contributed", demo.engine.backer_funds(first, &a)?.to_string().yellow());
    demo.engine.fund_project(&e, first, 500)?;
    let snapshot = demo.engine.get_project(first)?;
    step("raised", format!("{} / {}", snapshot.raised, snapshot.goal).yellow());
    step("goal reached", demo.engine.goal_reached(first)?.to_string().green());
    separator();

    // ── Part 2: deadline ────────────────────────────────────────────
    header("Part 2: Deadline enforcement");
    let late = demo.project(1500, &[&b], 1)?;
    demo.clock.advance(demo.campaign + Duration::seconds(1));
    step("clock", format!("advanced past deadline {}", snapshot_deadline(&demo, late)?));
    outcome("A funds 100", &demo.engine.fund_project(&a, late, 100));
    step("raised", demo.engine.get_project(late)?.raised);
    separator();

    // ── Part 3: quorum withdrawal ───────────────────────────────────
    header("Part 3: 2-of-2 withdrawal after success");
    let funded = demo.project(1500, &[&b, &c], 2)?;
    demo.engine.fund_project(&a, funded, 1500)?;
    let finalized = demo.engine.finalize(funded)?;
    step("finalized", format!("{} released={}", finalized.state, finalized.released).green());

    let vault = demo.engine.vault_of(funded)?;
    let tx = demo.engine.submit_transaction(&b, vault, &d, 1000)?;
    step("B submitted", format!("{} → D 1000", tx));
    step("D balance before C confirms", demo.rail.balance_of(&d));
    outcome("C confirms", &demo.engine.confirm_transaction(&c, vault, tx));
    step("D balance", demo.rail.balance_of(&d).to_string().green().bold());
    step("vault holds", demo.engine.vault(vault)?.balance());
    outcome("A tries to withdraw", &demo.engine.submit_transaction(&a, vault, &a, 500));
    separator();

    // ── Part 4: refund ──────────────────────────────────────────────
    header("Part 4: Shortfall and refund");
    let short = demo.project(1500, &[&b, &c], 2)?;
    demo.engine.fund_project(&a, short, 1400)?;
    let finalized = demo.engine.finalize(short)?;
    step("finalized", finalized.state.to_string().red());
    let short_vault = demo.engine.vault_of(short)?;
    outcome("B tries to withdraw", &demo.engine.submit_transaction(&b, short_vault, &b, 100));
    outcome("A claims refund", &demo.engine.claim_refund(&a, short));
    outcome("A claims again", &demo.engine.claim_refund(&a, short));
    step("A received", demo.rail.balance_of(&a).to_string().green().bold());
    outcome("second finalize", &demo.engine.finalize(short));
    separator();

    // ── Summary ─────────────────────────────────────────────────────
    header("Summary");
    let stats = demo.engine.statistics()?;
    step(
        "projects",
        format!(
            "{} open / {} succeeded / {} failed",
            stats.open, stats.succeeded, stats.failed
        ),
    );
    step(
        "raised / held / withdrawn",
        format!(
            "{} / {} / {}",
            stats.total_raised, stats.total_held, stats.total_withdrawn
        ),
    );
    step("delivered by rail", demo.rail.total_delivered());
    step("audit entries", demo.engine.audit_entries()?.len());
    println!(
        "  {} audit chain intact: {}",
        "└".dimmed(),
        if demo.engine.verify_audit_chain()? {
            "YES".green().bold()
        } else {
            "NO".red().bold()
        }
    );
    println!();

    Ok(())
}

fn snapshot_deadline(demo: &Demo, id: ProjectId) -> CrowdsaleResult<String> {
    Ok(demo.engine.get_project(id)?.deadline.to_rfc3339())
}
