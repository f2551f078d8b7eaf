// 🛢️ Carbon Screen CLI - Validate yearly datasets and run the screening

use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use std::process;

use carbon_screen::{
    DatasetKind, InputValidator, MatchPolicy, PipelineReport, ScreeningPipeline, TableStore,
    YearOutcome,
};

fn main() -> Result<()> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("run") => run_screening(RunConfig::from_args(&args[2..])?),
        Some("validate") => run_validate(RunConfig::from_args(&args[2..])?),
        _ => {
            print_usage();
            process::exit(2);
        }
    }
}

fn init_tracing() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "carbon_screen=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

struct RunConfig {
    data_dir: PathBuf,
    out_dir: PathBuf,
    policy: MatchPolicy,
    write_json: bool,
}

impl RunConfig {
    fn from_args(args: &[String]) -> Result<RunConfig> {
        let mut config = RunConfig {
            data_dir: PathBuf::from("data"),
            out_dir: PathBuf::from("output"),
            policy: MatchPolicy::FuzzyPartial,
            write_json: false,
        };

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--data-dir" => config.data_dir = PathBuf::from(expect_value(&mut iter, arg)?),
                "--out" => config.out_dir = PathBuf::from(expect_value(&mut iter, arg)?),
                "--policy" => {
                    let value = expect_value(&mut iter, arg)?;
                    config.policy = match MatchPolicy::from_label(value) {
                        Some(policy) => policy,
                        None => bail!("Unknown policy '{}', expected exact or fuzzy", value),
                    };
                }
                "--json" => config.write_json = true,
                other => bail!("Unknown argument '{}'", other),
            }
        }

        Ok(config)
    }
}

fn expect_value<'a>(iter: &mut std::slice::Iter<'a, String>, flag: &str) -> Result<&'a str> {
    match iter.next() {
        Some(value) => Ok(value),
        None => bail!("{} needs a value", flag),
    }
}

fn run_screening(config: RunConfig) -> Result<()> {
    println!("🛢️  Carbon Screen - Equity Portfolio Carbon Exposure");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let store = TableStore::new();

    // 1. Validate input data
    println!("\n📂 Validating {}...", config.data_dir.display());
    let registry = InputValidator::new(&config.data_dir).validate(&store)?;
    let years = registry.years();
    println!("✓ {} year(s) ready: {}", years.len(), years.join(", "));

    // 2. Run the pipeline
    println!("\n🔍 Screening with {} matching...", config.policy.label());
    let pipeline = ScreeningPipeline::new(config.policy);
    let outcomes = pipeline.run(&registry)?;

    // 3. Write one table per completed year
    println!();
    for outcome in &outcomes {
        match outcome {
            YearOutcome::Completed(result) => {
                let path = store.write(
                    &result.table,
                    &format!("{}screening", result.year),
                    &config.out_dir,
                )?;
                println!(
                    "✓ {}: {:.1}% of value matched, {} rows -> {}",
                    result.year,
                    result.summary.fraction_matched * 100.0,
                    result.summary.rows_final,
                    path.display()
                );
            }
            YearOutcome::Skipped { year, missing } => {
                let labels: Vec<&str> = missing.iter().map(|kind| kind.label()).collect();
                println!("⚠️  {}: skipped, missing {}", year, labels.join(", "));
            }
        }
    }

    // 4. Optional JSON run report
    let report = PipelineReport::from_outcomes(config.policy, &outcomes);
    if config.write_json {
        std::fs::create_dir_all(&config.out_dir)
            .with_context(|| format!("Could not create {}", config.out_dir.display()))?;
        let path = config
            .out_dir
            .join(format!("{}screening_report.json", store.file_prefix));
        std::fs::write(&path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("Could not write {}", path.display()))?;
        println!("✓ Report written to {}", path.display());
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ {}", report.summary());

    Ok(())
}

fn run_validate(config: RunConfig) -> Result<()> {
    println!("📋 Carbon Screen - Input Check");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let store = TableStore::new();
    let registry = InputValidator::new(&config.data_dir).validate(&store)?;

    if registry.is_empty() {
        println!("⚠️  No yearly datasets under {}", config.data_dir.display());
        return Ok(());
    }

    println!();
    for year in registry.years() {
        let present: Vec<&str> = DatasetKind::ALL
            .iter()
            .copied()
            .filter(|kind| registry.get(&year, *kind).is_some())
            .map(|kind| kind.label())
            .collect();
        let missing = registry.missing_kinds(&year);
        if missing.is_empty() {
            println!("✓ {}: {}", year, present.join(", "));
        } else {
            let labels: Vec<&str> = missing.iter().map(|kind| kind.label()).collect();
            println!(
                "⚠️  {}: has {}, missing {}",
                year,
                present.join(", "),
                labels.join(", ")
            );
        }
    }

    println!("\n✅ {} year(s) inspected", registry.year_count());
    Ok(())
}

fn print_usage() {
    eprintln!("Usage: carbon-screen <command> [options]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  run         Match, merge and screen every year, one output CSV per year");
    eprintln!("  validate    Check the data folders without running the screen");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --data-dir <path>   Input root with equity_data/, carbon_data/, financial_data/ (default: data)");
    eprintln!("  --out <path>        Output folder for screening tables (default: output)");
    eprintln!("  --policy <name>     Matching policy, exact or fuzzy (default: fuzzy)");
    eprintln!("  --json              Also write a JSON run report");
}
