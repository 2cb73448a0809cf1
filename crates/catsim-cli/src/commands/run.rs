//! The `catsim run` command.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use catsim_core::engine::{ProgressReporter, SimulationEngine};
use catsim_core::model::{rasch_items, EstimationMethod, StoppingRule, Trajectory};
use catsim_core::parser::{
    self, parse_number_list, parse_stopping_rule, ConfigDraft, DEFAULT_FIXED_LENGTH,
    DEFAULT_TARGET_SEM,
};
use catsim_core::report::SimulationReport;
use catsim_report::{write_csv_report, write_html_report};

use super::{ensure_known_formats, parse_formats};

/// Pool used when neither a config file nor `--items` supplies one.
const DEFAULT_ITEMS: &str = "-2.0, -1.5, -1.0, -0.5, 0.0, 0.5, 1.0, 1.5, 2.0, 2.5";
/// Examinees used when neither a config file nor `--abilities` supplies them.
const DEFAULT_ABILITIES: &str = "0.7";
/// Above this many sessions, per-session console output is suppressed.
const CONSOLE_SESSION_LIMIT: usize = 50;

const FORMATS: [&str; 3] = ["json", "csv", "html"];

/// Flags of `catsim run`.
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub config: Option<PathBuf>,
    pub items: Option<String>,
    pub abilities: Option<String>,
    pub rule: Option<String>,
    pub length: Option<usize>,
    pub target_sem: Option<f64>,
    pub method: Option<String>,
    pub seed: Option<u64>,
    pub replications: Option<u32>,
    pub parallelism: Option<usize>,
    pub time_budget_secs: Option<u64>,
    pub output: PathBuf,
    pub format: String,
    pub detail: bool,
}

/// Console progress reporter.
struct ConsoleReporter {
    verbose: bool,
}

impl ProgressReporter for ConsoleReporter {
    fn on_session_start(&self, _: usize, _: f64) {}

    fn on_session_complete(&self, index: usize, t: &Trajectory) {
        if self.verbose {
            eprintln!(
                "  Done: session {} (θ = {:.2}) estimate {:.3}, SE {:.3}, {} items [{}]",
                index + 1,
                t.true_ability,
                t.final_estimate,
                t.final_se,
                t.items_administered,
                t.stop_reason,
            );
        }
    }

    fn on_batch_complete(&self, total: usize, elapsed: Duration) {
        eprintln!(
            "\nComplete: {total} sessions ({:.1}s)",
            elapsed.as_secs_f64()
        );
    }
}

pub async fn execute(args: RunArgs) -> Result<()> {
    let formats = parse_formats(&args.format, &FORMATS);
    ensure_known_formats(&formats, &FORMATS)?;

    let defaults = builtin_defaults()?;
    let from_file = match &args.config {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading config file");
            parser::parse_config(path)?
        }
        None => ConfigDraft::default(),
    };
    let from_flags = flag_overrides(&args)?;

    let config = defaults
        .merge(from_file)
        .merge(from_flags)
        .build()
        .context("invalid configuration")?;

    for warning in parser::validate_config(&config) {
        eprintln!("Warning: {}", warning.message);
    }

    let total = config.session_count();
    eprintln!(
        "catsim v{}: {} examinees x {} replications, {} items, {}, {}",
        env!("CARGO_PKG_VERSION"),
        config.abilities.len(),
        config.replications,
        config.pool.len(),
        config.method.to_string().to_uppercase(),
        config.stopping_rule,
    );
    eprintln!();

    let reporter = ConsoleReporter {
        verbose: total <= CONSOLE_SESSION_LIMIT,
    };
    let engine = SimulationEngine::new(config);
    let report = engine.run(&reporter).await?;

    print_summary(&report);
    if args.detail {
        for (idx, t) in report.trajectories.iter().enumerate() {
            print_session_detail(idx + 1, t);
        }
    }

    // Save outputs
    std::fs::create_dir_all(&args.output).with_context(|| {
        format!(
            "failed to create output directory {}",
            args.output.display()
        )
    })?;
    let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H%M%S");

    for fmt in &formats {
        match *fmt {
            "json" => {
                let path = args.output.join(format!("report-{timestamp}.json"));
                report.save_json(&path)?;
                eprintln!("Results saved to: {}", path.display());
            }
            "csv" => {
                let path = args.output.join(format!("report-{timestamp}.csv"));
                write_csv_report(&report, &path)?;
                eprintln!("CSV export: {}", path.display());
            }
            "html" => {
                let path = args.output.join(format!("report-{timestamp}.html"));
                write_html_report(&report, &path)?;
                eprintln!("HTML report: {}", path.display());
            }
            other => anyhow::bail!("unknown output format '{other}'"),
        }
    }

    Ok(())
}

/// The ten-item demonstration pool and a single examinee at 0.7.
fn builtin_defaults() -> Result<ConfigDraft> {
    Ok(ConfigDraft {
        items: Some(rasch_items(&parse_number_list("items", DEFAULT_ITEMS)?)),
        abilities: Some(parse_number_list("abilities", DEFAULT_ABILITIES)?),
        ..Default::default()
    })
}

fn flag_overrides(args: &RunArgs) -> Result<ConfigDraft> {
    let items = args
        .items
        .as_deref()
        .map(|list| parse_number_list("--items", list))
        .transpose()?
        .map(|difficulties| rasch_items(&difficulties));

    let abilities = args
        .abilities
        .as_deref()
        .map(|list| parse_number_list("--abilities", list))
        .transpose()?;

    let method = args
        .method
        .as_deref()
        .map(str::parse::<EstimationMethod>)
        .transpose()?;

    Ok(ConfigDraft {
        items,
        abilities,
        stopping_rule: stopping_rule_from_flags(
            args.rule.as_deref(),
            args.length,
            args.target_sem,
        )?,
        method,
        seed: args.seed,
        replications: args.replications,
        parallelism: args.parallelism,
        time_budget_secs: args.time_budget_secs,
    })
}

/// `--rule` picks the rule and falls back to default parameters; without it
/// the presence of `--length` or `--target-sem` implies the rule.
fn stopping_rule_from_flags(
    rule: Option<&str>,
    length: Option<usize>,
    target: Option<f64>,
) -> Result<Option<StoppingRule>> {
    let stopping = match (rule, length, target) {
        (Some(rule), length, target) => Some(parse_stopping_rule(
            rule,
            Some(length.unwrap_or(DEFAULT_FIXED_LENGTH)),
            Some(target.unwrap_or(DEFAULT_TARGET_SEM)),
        )?),
        (None, Some(_), Some(_)) => {
            anyhow::bail!("--length and --target-sem are exclusive unless --rule is given")
        }
        (None, Some(length), None) => Some(parse_stopping_rule("fixed-length", Some(length), None)?),
        (None, None, Some(target)) => Some(parse_stopping_rule("target-sem", None, Some(target))?),
        (None, None, None) => None,
    };
    Ok(stopping)
}

fn print_summary(report: &SimulationReport) {
    let Some(stats) = &report.aggregate else {
        println!("No sessions were run.");
        return;
    };

    let mut table = Table::new();
    table.set_header(vec![
        "Sessions",
        "Bias",
        "RMSE",
        "MAE",
        "Correlation",
        "Avg Items",
        "Avg SE",
    ]);
    table.add_row(vec![
        Cell::new(stats.examinee_count),
        Cell::new(format!("{:.3}", stats.bias)),
        Cell::new(format!("{:.3}", stats.rmse)),
        Cell::new(format!("{:.3}", stats.mae)),
        Cell::new(
            stats
                .correlation
                .map(|r| format!("{r:.3}"))
                .unwrap_or_else(|| "n/a".to_string()),
        ),
        Cell::new(format!("{:.1}", stats.avg_items)),
        Cell::new(format!("{:.3}", stats.avg_se)),
    ]);
    println!("\n{table}");

    if report.conditional.len() < report.trajectories.len() {
        let mut table = Table::new();
        table.set_header(vec![
            "True θ",
            "Replications",
            "Mean Estimate",
            "Bias",
            "MSE",
            "Avg Items",
        ]);
        for c in &report.conditional {
            table.add_row(vec![
                Cell::new(format!("{:.2}", c.true_ability)),
                Cell::new(c.replications),
                Cell::new(format!("{:.3}", c.mean_estimate)),
                Cell::new(format!("{:.3}", c.bias)),
                Cell::new(format!("{:.3}", c.mse)),
                Cell::new(format!("{:.1}", c.avg_items)),
            ]);
        }
        println!("\n{table}");
    } else if report.trajectories.len() <= CONSOLE_SESSION_LIMIT {
        let mut table = Table::new();
        table.set_header(vec!["#", "True θ", "Estimate", "SE", "Items", "Error", "Stop"]);
        for (idx, t) in report.trajectories.iter().enumerate() {
            table.add_row(vec![
                Cell::new(idx + 1),
                Cell::new(format!("{:.3}", t.true_ability)),
                Cell::new(format!("{:.3}", t.final_estimate)),
                Cell::new(format!("{:.3}", t.final_se)),
                Cell::new(t.items_administered),
                Cell::new(format!("{:.3}", t.error())),
                Cell::new(t.stop_reason),
            ]);
        }
        println!("\n{table}");
    }

    let reasons: Vec<String> = report
        .stop_reason_counts()
        .iter()
        .map(|(reason, count)| format!("{reason}: {count}"))
        .collect();
    println!("Stop reasons: {}", reasons.join(", "));
}

fn print_session_detail(number: usize, t: &Trajectory) {
    println!(
        "\nSession {number}: true θ {:.3}, estimate {:.3}, SE {:.3}",
        t.true_ability, t.final_estimate, t.final_se
    );
    let mut table = Table::new();
    table.set_header(vec![
        "Step",
        "Item",
        "Difficulty",
        "Response",
        "Estimate",
        "SE",
        "Fisher Info",
    ]);
    for step in t.administered_steps() {
        table.add_row(vec![
            Cell::new(step.step),
            Cell::new(step.item_id.map(|id| id.to_string()).unwrap_or_default()),
            Cell::new(
                step.difficulty
                    .map(|d| format!("{d:.2}"))
                    .unwrap_or_default(),
            ),
            Cell::new(match step.response {
                Some(1) => "correct",
                Some(_) => "incorrect",
                None => "-",
            }),
            Cell::new(format!("{:.3}", step.ability_estimate)),
            Cell::new(format!("{:.3}", step.standard_error)),
            Cell::new(format!("{:.3}", step.fisher_info)),
        ]);
    }
    println!("{table}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_flag_uses_default_parameters() {
        assert_eq!(
            stopping_rule_from_flags(Some("target-sem"), None, None).unwrap(),
            Some(StoppingRule::TargetSem { target: 0.3 })
        );
        assert_eq!(
            stopping_rule_from_flags(Some("fixed-length"), None, Some(0.2)).unwrap(),
            Some(StoppingRule::FixedLength { length: 7 })
        );
    }

    #[test]
    fn parameters_imply_rule() {
        assert_eq!(
            stopping_rule_from_flags(None, Some(4), None).unwrap(),
            Some(StoppingRule::FixedLength { length: 4 })
        );
        assert_eq!(
            stopping_rule_from_flags(None, None, Some(0.5)).unwrap(),
            Some(StoppingRule::TargetSem { target: 0.5 })
        );
        assert_eq!(stopping_rule_from_flags(None, None, None).unwrap(), None);
        assert!(stopping_rule_from_flags(None, Some(4), Some(0.5)).is_err());
    }

    #[test]
    fn invalid_flag_values_are_rejected() {
        assert!(stopping_rule_from_flags(Some("adaptive"), None, None).is_err());
        assert!(stopping_rule_from_flags(None, Some(0), None).is_err());
        assert!(stopping_rule_from_flags(None, None, Some(1.5)).is_err());
    }

    #[test]
    fn builtin_defaults_build() {
        let config = builtin_defaults().unwrap().build().unwrap();
        assert_eq!(config.pool.len(), 10);
        assert_eq!(config.abilities, vec![0.7]);
        assert_eq!(config.stopping_rule, StoppingRule::FixedLength { length: 7 });
    }
}
