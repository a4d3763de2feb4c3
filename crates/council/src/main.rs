use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use council_agents::graph::NodeId;
use council_agents::StepObserver;
use council_models::memory_record::MemoryRole;
use council_models::run::ToolPolicy;
use council_models::state::DecisionState;
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "council", about = "Multi-agent trade decision engine")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/council.toml")]
    config: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Pretty-print the output JSON
    #[arg(long)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Produce a BUY/SELL/HOLD decision for a subject on a date
    Run {
        /// Ticker symbol
        subject: String,

        /// As-of date (YYYY-MM-DD)
        date: NaiveDate,

        /// Use the offline toolsets regardless of config
        #[arg(long)]
        offline: bool,

        /// Print each graph step to stderr
        #[arg(long)]
        trace: bool,
    },
    /// Reflect on a recorded run once its outcome is known
    Learn {
        subject: String,

        date: NaiveDate,

        /// Realized return, e.g. 0.042 or -0.03
        #[arg(allow_hyphen_values = true)]
        outcome: Decimal,
    },
    /// List recorded runs for a subject, newest first
    History { subject: String },
    /// Show the lessons a role would recall for a situation
    Recall {
        /// bull_researcher, bear_researcher, trader, invest_judge or risk_judge
        #[arg(value_parser = parse_role)]
        role: MemoryRole,

        situation: String,

        /// Number of lessons to return
        #[arg(short = 'k', long, default_value_t = 2)]
        matches: usize,
    },
}

fn parse_role(s: &str) -> Result<MemoryRole, String> {
    MemoryRole::parse(s).ok_or_else(|| {
        let known = MemoryRole::ALL.map(|r| r.as_str()).join(", ");
        format!("unknown role {s:?}, expected one of: {known}")
    })
}

struct StderrTrace;

impl StepObserver for StderrTrace {
    fn on_step(&mut self, step: usize, node: NodeId, state: &DecisionState) {
        eprintln!("[step {step:>3}] {node} (messages: {})", state.messages.len());
    }
}

fn to_json(value: &impl serde::Serialize, pretty: bool) -> Result<String> {
    Ok(if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing (respects RUST_LOG env var)
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_writer(std::io::stderr)
            .init();
    }

    let config = council::load_config(&cli.config)?;
    let orchestrator =
        council::build_orchestrator(&config).context("Failed to build orchestrator")?;

    match cli.command {
        Command::Run {
            subject,
            date,
            offline,
            trace,
        } => {
            let policy = if offline {
                ToolPolicy::Offline
            } else {
                ToolPolicy::from_online_flag(config.tools.online)
            };
            let handle = if trace {
                orchestrator
                    .run_observed(&subject, date, policy, &mut StderrTrace)
                    .await
            } else {
                orchestrator.run_with_policy(&subject, date, policy).await
            }
            .context("Run failed")?;

            let summary = serde_json::json!({
                "run_id": handle.run_id,
                "subject": handle.subject,
                "trade_date": handle.trade_date,
                "signal": handle.signal,
                "steps": handle.steps,
                "elapsed_ms": handle.elapsed_ms,
                "final_decision": handle.state.final_decision,
            });
            println!("{}", to_json(&summary, cli.pretty)?);
        }
        Command::Learn {
            subject,
            date,
            outcome,
        } => {
            let log = orchestrator
                .run_log()
                .context("learn needs memory.sqlite_path so runs are recorded")?;
            let handle = log
                .latest(&subject, date)
                .with_context(|| format!("No recorded run for {subject} on {date}"))?;

            let report = orchestrator.learn(&handle, outcome).await;
            println!("{}", to_json(&report, cli.pretty)?);
        }
        Command::History { subject } => {
            let log = orchestrator
                .run_log()
                .context("history needs memory.sqlite_path so runs are recorded")?;
            let mut runs = Vec::new();
            for date in log.dates(&subject)? {
                let handle = log.latest(&subject, date)?;
                runs.push(serde_json::json!({
                    "trade_date": date,
                    "run_id": handle.run_id,
                    "signal": handle.signal,
                    "completed_at": handle.completed_at,
                }));
            }
            println!("{}", to_json(&runs, cli.pretty)?);
        }
        Command::Recall {
            role,
            situation,
            matches,
        } => {
            let recalled = orchestrator
                .memories()
                .get(role)
                .recall(&situation, matches)
                .context("Recall failed")?;
            let lessons: Vec<_> = recalled
                .iter()
                .map(|m| {
                    serde_json::json!({
                        "similarity": m.similarity,
                        "situation": m.record.situation,
                        "lesson": m.record.lesson,
                        "created_at": m.record.created_at,
                    })
                })
                .collect();
            println!("{}", to_json(&lessons, cli.pretty)?);
        }
    }

    Ok(())
}
