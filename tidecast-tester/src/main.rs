mod logic;

use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use tidecast_game::{BundledCatalog, CatalogLoader};

use logic::{
    LogicTester, ScenarioResult, all_scenarios, find_scenario, list_scenarios,
    resolve_seed_inputs, split_csv,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Console,
    Json,
    Markdown,
}

#[derive(Debug, Parser)]
#[command(name = "tidecast-tester", version)]
#[command(about = "Automated logic testing for the Tidecast fishing engine")]
struct Args {
    /// Scenarios to run (comma-separated, or `all`)
    #[arg(long, default_value = "smoke")]
    scenarios: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated, decimal or 0x-hex)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Number of iterations per scenario and seed
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    /// Casts per simulated campaign
    #[arg(long, default_value_t = 12)]
    casts: usize,

    /// Output report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Console)]
    report: ReportFormat,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    if args.report == ReportFormat::Console {
        announce_banner();
    }

    let start_time = Instant::now();
    let scenarios = expand_scenarios(&args.scenarios);
    let seeds = resolve_seed_inputs(&split_csv(&args.seeds))?;
    let catalog = BundledCatalog
        .load_catalog()
        .context("loading bundled catalog")?;
    let tester = LogicTester::new(Arc::new(catalog), args.casts, args.verbose);

    let results = run_logic_scenarios(&args, &scenarios, &seeds, &tester);
    write_reports(&args, &results, start_time)?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }
    Ok(())
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available scenarios:")?;
    for (key, description) in list_scenarios() {
        writeln!(output_target.writer(), "  {key:25} - {description}")?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🎣 Tidecast Automated Tester".bright_cyan().bold());
    println!("{}", "================================".cyan());
}

fn expand_scenarios(scenarios_arg: &str) -> Vec<String> {
    let mut scenarios = split_csv(scenarios_arg);
    if scenarios.iter().any(|s| s.eq_ignore_ascii_case("all")) {
        scenarios.retain(|s| !s.eq_ignore_ascii_case("all"));
        for scenario in all_scenarios() {
            if !scenarios.iter().any(|s| s == scenario.name) {
                scenarios.push(scenario.name.to_string());
            }
        }
    }
    scenarios
}

fn run_logic_scenarios(
    args: &Args,
    scenarios: &[String],
    seeds: &[u64],
    tester: &LogicTester,
) -> Vec<ScenarioResult> {
    let mut results = Vec::new();
    if args.report == ReportFormat::Console {
        println!("{}", "🧠 Running Logic Tests".bright_yellow().bold());
        println!("{}", "-".repeat(30).yellow());
    }

    for scenario_name in scenarios {
        match find_scenario(scenario_name) {
            Some(scenario) => {
                results.extend(tester.run_scenario(scenario, seeds, args.iterations));
            }
            None => eprintln!("⚠️  Unknown scenario: {}", scenario_name.yellow()),
        }
    }
    results
}

fn write_reports(args: &Args, results: &[ScenarioResult], start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;
    match args.report {
        ReportFormat::Json => {
            logic::reports::generate_json_report(&mut output_target, results)?;
        }
        ReportFormat::Markdown => {
            if results.is_empty() {
                writeln!(
                    &mut output_target,
                    "# Tidecast Logic Test Results\n\n_No scenarios executed._"
                )?;
            } else {
                logic::reports::generate_markdown_report(&mut output_target, results)?;
            }
        }
        ReportFormat::Console => {
            let duration = start_time.elapsed();
            if results.is_empty() {
                writeln!(&mut output_target, "No logic scenarios executed.")?;
            } else {
                logic::reports::generate_console_report(&mut output_target, results, duration)?;
            }
            writeln!(&mut output_target)?;
            writeln!(&mut output_target, "🏁 Total time: {:?}", start_time.elapsed())?;
        }
    }
    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let args = Args::parse_from(["tidecast-tester"]);
        assert_eq!(args.scenarios, "smoke");
        assert_eq!(args.seeds, "1337");
        assert_eq!(args.iterations, 10);
        assert_eq!(args.casts, 12);
        assert_eq!(args.report, ReportFormat::Console);
        assert!(args.output.is_none());
    }

    #[test]
    fn report_format_parses_value_enum() {
        let args = Args::parse_from(["tidecast-tester", "--report", "markdown", "-v"]);
        assert_eq!(args.report, ReportFormat::Markdown);
        assert!(args.verbose);
        assert!(Args::try_parse_from(["tidecast-tester", "--report", "csv"]).is_err());
    }

    #[test]
    fn all_expands_to_every_scenario_once() {
        let expanded = expand_scenarios("abort-safety, all");
        assert_eq!(expanded.len(), all_scenarios().len());
        assert_eq!(expanded[0], "abort-safety");
        assert!(expanded.iter().any(|s| s == "flavor-enrichment"));
    }

    #[test]
    fn output_target_writes_to_file() {
        let path = std::env::temp_dir().join(format!("tidecast-target-{}", std::process::id()));
        let mut target = OutputTarget::new(Some(path.clone())).unwrap();
        writeln!(target, "hello").unwrap();
        target.flush_inner().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello\n");
        let _ = std::fs::remove_file(path);
    }
}
