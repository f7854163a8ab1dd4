use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use zinsplan_core::{
    CancellationToken, PlanInput, RankingKey, SimulationError, ValidatedPlan, compare_strategies,
    monte_carlo, simulate,
};

mod logging;
mod plan_file;
mod report;

use logging::init_logging;

#[derive(Parser, Debug)]
#[command(name = "zinsplan")]
#[command(about = "Savings and retirement projections under German capital-gains tax")]
struct Cli {
    /// Log level (debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Project the savings and withdrawal phases once
    Simulate {
        #[command(flatten)]
        plan: PlanArgs,
    },
    /// Run the plan strategy and its variants on a shared return path
    Compare {
        #[command(flatten)]
        plan: PlanArgs,

        /// Order of the ranking table
        #[arg(long, value_enum, default_value_t = Ranking::FinalCapital)]
        rank_by: Ranking,

        /// Include every strategy's year-by-year ledger (JSON only)
        #[arg(long)]
        ledger: bool,
    },
    /// Repeat the projection with independently drawn returns
    MonteCarlo {
        #[command(flatten)]
        plan: PlanArgs,

        #[arg(short, long, default_value_t = 1000)]
        iterations: usize,
    },
    /// Check a plan file and list every problem
    Validate {
        /// Plan file (YAML or JSON)
        #[arg(short, long)]
        plan: PathBuf,

        /// Write the normalized plan here
        #[arg(long)]
        write_normalized: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct PlanArgs {
    /// Plan file (YAML or JSON)
    #[arg(short, long)]
    plan: PathBuf,

    /// Overrides the seed of the plan file
    #[arg(short, long)]
    seed: Option<u64>,

    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Ranking {
    FinalCapital,
    TotalWithdrawn,
    Duration,
}

impl From<Ranking> for RankingKey {
    fn from(ranking: Ranking) -> Self {
        match ranking {
            Ranking::FinalCapital => RankingKey::FinalCapital,
            Ranking::TotalWithdrawn => RankingKey::TotalWithdrawn,
            Ranking::Duration => RankingKey::Duration,
        }
    }
}

/// Exit code for plans that fail validation
const INVALID_PLAN: u8 = 2;

/// Load, override and validate a plan; `Ok(None)` after reporting validation errors
fn prepare(args: &PlanArgs) -> color_eyre::Result<Option<ValidatedPlan>> {
    let mut input: PlanInput = plan_file::load_plan(&args.plan)?;
    if let Some(seed) = args.seed {
        input.seed = Some(seed);
    }
    match input.normalize().validate() {
        Ok(plan) => Ok(Some(plan)),
        Err(errors) => {
            tracing::warn!(problems = errors.len(), "Plan failed validation");
            report::write_validation_errors(&mut io::stderr().lock(), &errors)?;
            Ok(None)
        }
    }
}

fn run(command: Command) -> color_eyre::Result<ExitCode> {
    let cancel = CancellationToken::new();
    let mut out = io::stdout().lock();

    match command {
        Command::Simulate { plan } => {
            let Some(validated) = prepare(&plan)? else {
                return Ok(ExitCode::from(INVALID_PLAN));
            };
            let result = simulate(&validated, &cancel)?;
            tracing::info!(
                seed = result.seed,
                years = result.withdrawal.rows.len(),
                "Simulation finished"
            );
            match plan.format {
                OutputFormat::Table => report::write_plan(&mut out, &result)?,
                OutputFormat::Json => report::write_json(&mut out, &report::capped_plan(&result))?,
            }
        }
        Command::Compare {
            plan,
            rank_by,
            ledger,
        } => {
            let Some(validated) = prepare(&plan)? else {
                return Ok(ExitCode::from(INVALID_PLAN));
            };
            let include_ledger = ledger && plan.format == OutputFormat::Json;
            let comparison = compare_strategies(&validated, include_ledger, &cancel)?;
            tracing::info!(
                strategies = comparison.results.len(),
                basis = %comparison.basis.label(),
                "Comparison finished"
            );
            match plan.format {
                OutputFormat::Table => {
                    report::write_comparison(&mut out, &comparison, rank_by.into())?;
                }
                OutputFormat::Json => report::write_json(&mut out, &comparison)?,
            }
        }
        Command::MonteCarlo { plan, iterations } => {
            let Some(validated) = prepare(&plan)? else {
                return Ok(ExitCode::from(INVALID_PLAN));
            };
            let summary = match monte_carlo(&validated, iterations, &cancel) {
                Ok(summary) => summary,
                Err(SimulationError::Validation(errors)) => {
                    report::write_validation_errors(&mut io::stderr().lock(), &errors)?;
                    return Ok(ExitCode::from(INVALID_PLAN));
                }
                Err(err) => return Err(err.into()),
            };
            tracing::info!(
                iterations = summary.iterations,
                success_rate = summary.success_rate,
                "Monte Carlo finished"
            );
            match plan.format {
                OutputFormat::Table => report::write_monte_carlo(&mut out, &summary)?,
                OutputFormat::Json => report::write_json(&mut out, &summary)?,
            }
        }
        Command::Validate {
            plan,
            write_normalized,
        } => {
            let input = plan_file::load_plan(&plan)?;
            match input.normalize().validate() {
                Ok(validated) => {
                    writeln!(
                        out,
                        "{} is valid: withdrawal {}-{} with {}",
                        plan.display(),
                        validated.withdrawal.start_year,
                        validated.withdrawal_end_year(),
                        validated.withdrawal.strategy.label(),
                    )?;
                    if let Some(path) = write_normalized {
                        plan_file::save_plan(&path, &*validated)?;
                        tracing::info!(path = %path.display(), "Wrote normalized plan");
                    }
                }
                Err(errors) => {
                    report::write_validation_errors(&mut out, &errors)?;
                    return Ok(ExitCode::from(INVALID_PLAN));
                }
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> color_eyre::Result<ExitCode> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    run(cli.command)
}
