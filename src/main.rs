// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};

use erp_observations::render::{render_pdf, render_text};
use erp_observations::{
    events_for_observation, generate_report, get_observation, init_tracing, insert_observation,
    load_catalog, now_utc, observations_in_range, open_database, seed_catalog,
    transition_observations, AppConfig, Catalog, NewObservation, PeriodReport, ReportPeriod,
    TransitionTarget,
};

const CLI_ACTOR: &str = "cli";

#[derive(Parser, Debug)]
#[command(
    name = "erp-observations",
    author,
    version,
    about = "Track ERP module observations and reconcile them per period",
    long_about = None
)]
struct Cli {
    #[command(flatten)]
    config: AppConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the database and seed the module catalog
    Init,

    /// Record a new observation (status OPEN)
    Add {
        /// Observation text
        text: String,

        #[arg(long)]
        module: i64,

        /// Vital, Essential, or Desirable
        #[arg(long)]
        criticality: String,

        /// Access code
        #[arg(long)]
        code: Option<String>,
    },

    /// Close one or more observations
    Close(TransitionArgs),

    /// Resurface one or more observations
    Resurface(TransitionArgs),

    /// List every observation created within a period
    List(PeriodArgs),

    /// Print the period reconciliation report
    Report {
        #[command(flatten)]
        period: PeriodArgs,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Write the period report as a PDF
    Pdf {
        #[command(flatten)]
        period: PeriodArgs,

        #[arg(long, short, default_value = "observation_brief.pdf")]
        out: PathBuf,
    },

    /// Browse the period report in the terminal
    View(PeriodArgs),

    /// Show the audit trail of one observation
    History { id: i64 },
}

#[derive(Args, Debug)]
struct PeriodArgs {
    /// First day, YYYY-MM-DD
    #[arg(long)]
    from: String,

    /// Last day, YYYY-MM-DD (inclusive)
    #[arg(long)]
    to: String,
}

impl PeriodArgs {
    fn period(&self) -> Result<ReportPeriod> {
        Ok(ReportPeriod::parse(Some(self.from.as_str()), Some(self.to.as_str()))?)
    }
}

#[derive(Args, Debug)]
struct TransitionArgs {
    #[arg(required = true)]
    ids: Vec<i64>,

    /// Access code
    #[arg(long)]
    code: Option<String>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.config;

    match cli.command {
        Commands::Init => run_init(&config),
        Commands::Add {
            text,
            module,
            criticality,
            code,
        } => run_add(&config, &text, module, &criticality, code.as_deref()),
        Commands::Close(args) => run_transition(&config, args, TransitionTarget::Close),
        Commands::Resurface(args) => run_transition(&config, args, TransitionTarget::Resurface),
        Commands::List(period) => run_list(&config, &period.period()?),
        Commands::Report { period, json } => run_report(&config, &period.period()?, json),
        Commands::Pdf { period, out } => run_pdf(&config, &period.period()?, &out),
        Commands::View(period) => run_ui_mode(&config, &period.period()?),
        Commands::History { id } => run_history(&config, id),
    }
}

fn open(config: &AppConfig) -> Result<(Connection, Catalog)> {
    let conn = open_database(&config.db_path)
        .with_context(|| format!("opening database {}", config.db_path.display()))?;
    let catalog = load_catalog(&conn).context("loading module catalog")?;

    if catalog.is_empty() {
        anyhow::bail!("Module catalog is empty. Run `erp-observations init` first.");
    }
    Ok((conn, catalog))
}

fn build_report(config: &AppConfig, period: &ReportPeriod) -> Result<PeriodReport> {
    let (conn, catalog) = open(config)?;
    Ok(generate_report(&conn, &catalog, &config.engine(), period)?)
}

fn run_init(config: &AppConfig) -> Result<()> {
    println!("🗄️  Initializing {}", config.db_path.display());

    let conn = open_database(&config.db_path).context("creating database")?;
    let inserted = seed_catalog(&conn, &Catalog::default_seed()).context("seeding catalog")?;
    let catalog = load_catalog(&conn)?;

    println!("✓ Database ready (WAL mode)");
    println!(
        "✓ {} groups, {} modules ({} rows inserted)",
        catalog.groups().len(),
        catalog.modules().len(),
        inserted
    );
    Ok(())
}

fn run_add(
    config: &AppConfig,
    text: &str,
    module_id: i64,
    criticality: &str,
    code: Option<&str>,
) -> Result<()> {
    config.authorize(code)?;
    let (conn, catalog) = open(config)?;

    let new = NewObservation::from_parts(Some(text), Some(module_id), Some(criticality))?;
    new.validate(&catalog)?;
    let id = insert_observation(&conn, &new, now_utc(), CLI_ACTOR)?;

    println!("✓ Observation #{} recorded ({})", id, new.criticality);
    Ok(())
}

fn run_transition(config: &AppConfig, args: TransitionArgs, target: TransitionTarget) -> Result<()> {
    config.authorize(args.code.as_deref())?;
    let (mut conn, _) = open(config)?;

    let updated = transition_observations(&mut conn, &args.ids, target, now_utc(), CLI_ACTOR)?;

    println!("✓ {} of {} observation(s) now {}", updated, args.ids.len(), target.status());
    Ok(())
}

fn run_list(config: &AppConfig, period: &ReportPeriod) -> Result<()> {
    let (conn, _) = open(config)?;
    let rows = observations_in_range(&conn, period)?;

    println!("📋 {} observation(s) {}", rows.len(), period.label());
    for row in rows {
        println!(
            "#{:<5} {:<10} {:<10} {} / {}: {}",
            row.id, row.criticality, row.status, row.group_name, row.module_name, row.observation
        );
    }
    Ok(())
}

fn run_report(config: &AppConfig, period: &ReportPeriod, json: bool) -> Result<()> {
    let report = build_report(config, period)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render_text(&report, &config.report_title));
    }
    Ok(())
}

fn run_pdf(config: &AppConfig, period: &ReportPeriod, out: &Path) -> Result<()> {
    let report = build_report(config, period)?;
    let bytes = render_pdf(&report, &config.report_title)?;

    fs::write(out, &bytes).with_context(|| format!("writing {}", out.display()))?;
    println!("✓ Wrote {} ({} bytes)", out.display(), bytes.len());
    Ok(())
}

fn run_history(config: &AppConfig, id: i64) -> Result<()> {
    let (conn, _) = open(config)?;
    let observation = get_observation(&conn, id)?
        .with_context(|| format!("observation #{} not found", id))?;

    println!(
        "📝 #{} [{}] {} - {}",
        observation.id, observation.criticality, observation.status, observation.text
    );
    for event in events_for_observation(&conn, id)? {
        println!(
            "   {}  {:<24} {:<6} {}",
            event.occurred_at, event.event_type, event.actor, event.data
        );
    }
    Ok(())
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &AppConfig, period: &ReportPeriod) -> Result<()> {
    let report = build_report(config, period)?;

    println!("{}", report.summary());
    println!("Starting UI... (Press 'q' to quit)\n");

    let mut app = ui::App::new(report, &config.report_title);
    ui::run_ui(&mut app)?;

    println!("\n✅ UI closed successfully");
    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &AppConfig, _period: &ReportPeriod) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or print the report: erp-observations report --from ... --to ...");
    std::process::exit(1);
}
