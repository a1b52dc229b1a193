use adaptive_psychophysics::config::{load_config, save_config, Config};
use adaptive_psychophysics::local::simulate::{run_session, SimulatedObserver};
use adaptive_psychophysics::local::trial_log::{TrialLog, TrialLogWriter};
use adaptive_psychophysics::processing::analysis::{
    analyze, analyze_conditions, write_curve_csv, AnalysisReport, ConditionReport,
};
use adaptive_psychophysics::utils::log::log_with_header;
use adaptive_psychophysics::{PsychError, Result};

use colored::Colorize;
use std::collections::BTreeMap;
use std::str::FromStr;

const USAGE: &str = "usage:
  main analyze <trial_log> [config.yaml] [curve.csv]
  main simulate <config.yaml> <out_log> [n_trials] [seed]
  main init-config <config.yaml>";

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        println!("{}", USAGE);
        return;
    }

    let outcome = match args[1].as_str() {
        "analyze" => run_analyze(&args[2..]),
        "simulate" => run_simulate(&args[2..]),
        "init-config" => run_init_config(&args[2..]),
        _ => {
            println!("Invalid argument\n{}", USAGE);
            return;
        }
    };

    if let Err(error) = outcome {
        eprintln!("{} {}", "error:".red().bold(), error);
        std::process::exit(1);
    }
}

fn config_or_default(path: Option<&String>) -> Result<Config> {
    match path {
        Some(path) => load_config(path),
        None => Ok(Config::default()),
    }
}

/// Optional positional argument; present but malformed is a usage error.
fn parse_arg<T: FromStr>(args: &[String], index: usize, name: &str, default: T) -> Result<T> {
    match args.get(index) {
        Some(value) => value.parse().map_err(|_| {
            PsychError::invalid_config(format!("{} must be a non-negative integer, got '{}'", name, value))
        }),
        None => Ok(default),
    }
}

fn run_analyze(args: &[String]) -> Result<()> {
    let Some(log_path) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };
    let config = config_or_default(args.get(1))?;

    let log = TrialLog::read(log_path, &config.trial_log)?;
    let reports = match &config.trial_log.split {
        Some(split) => analyze_conditions(&log.conditions(split)?, &config.fit, &config.bootstrap)?,
        None => vec![ConditionReport {
            label: "all".to_string(),
            report: analyze(&log.observations, &config.fit, &config.bootstrap)?,
        }],
    };

    println!("{} {}", "Trial log:".bold(), log_path);
    for condition in &reports {
        print_report(&log, &condition.label, &condition.report);
    }

    if let Some(curve_path) = args.get(2) {
        for condition in &reports {
            let path = curve_path_for(curve_path, &condition.label, reports.len());
            write_curve_csv(&condition.report, &path)?;
            println!("Fitted curve written to {}", path);
        }
    }

    if config.logging.enabled {
        for condition in &reports {
            let report = &condition.report;
            let message = format!(
                "file: {}\ncondition: {}\nthreshold: {}\nslope: {}\nci: [{}, {}]\nslope ci: [{}, {}]\nfailed resamples: {}",
                log_path,
                condition.label,
                report.threshold,
                report.slope,
                report.ci_lower,
                report.ci_upper,
                report.slope_ci_lower,
                report.slope_ci_upper,
                report.n_failed_resamples
            );
            log_with_header(&config.logging.log_dir, "analysis.log", "fit", &message)?;
        }
    }

    Ok(())
}

/// `curve.csv` becomes `curve_<label>.csv` when there is more than one condition.
fn curve_path_for(path: &str, label: &str, n_conditions: usize) -> String {
    if n_conditions < 2 {
        return path.to_string();
    }
    match path.rsplit_once('.') {
        Some((stem, extension)) => format!("{}_{}.{}", stem, label, extension),
        None => format!("{}_{}", path, label),
    }
}

fn print_report(log: &TrialLog, label: &str, report: &AnalysisReport) {
    match log.param("task") {
        Some(task) => println!("Task: {} ({})", task, label),
        None => println!("Condition: {}", label),
    }
    println!("Trials: {}", report.total_trials);
    println!(
        "Threshold estimate: {}, CI: [{}, {}]",
        format!("{:.4}", report.threshold).green(),
        report.ci_lower,
        report.ci_upper
    );
    println!(
        "Slope: {:.4}, CI: [{}, {}]",
        report.slope, report.slope_ci_lower, report.slope_ci_upper
    );
    if report.n_failed_resamples > 0 {
        println!(
            "{}",
            format!(
                "{} of {} bootstrap resamples failed to fit and were skipped",
                report.n_failed_resamples,
                report.n_failed_resamples + report.n_resamples_used
            )
            .yellow()
        );
    }
    if let Some(last) = report.last_intensity {
        println!("Last value in the staircase: {}", last);
    }
}

fn run_simulate(args: &[String]) -> Result<()> {
    let (Some(config_path), Some(out_path)) = (args.first(), args.get(1)) else {
        println!("{}", USAGE);
        return Ok(());
    };
    let config = load_config(config_path)?;
    let n_trials: usize = parse_arg(args, 2, "n_trials", 80)?;
    let seed: u64 = parse_arg(args, 3, "seed", 0)?;

    let staircase = &config.staircase;
    let observer = SimulatedObserver::new(
        (staircase.lower_bound + staircase.upper_bound) / 2.0,
        config.fit.slope_prior,
        config.fit.guess_rate,
        config.fit.flake_rate,
    )?;
    let observations = run_session(staircase, &observer, n_trials, seed, &config.logging)?;

    let mut params = BTreeMap::new();
    params.insert("task".to_string(), "simulated".to_string());
    params.insert("observer_threshold".to_string(), observer.threshold.to_string());
    params.insert("observer_slope".to_string(), observer.slope.to_string());
    params.insert("seed".to_string(), seed.to_string());

    let mut writer = TrialLogWriter::create(out_path, &params)?;
    for (trial, observation) in observations.iter().enumerate() {
        writer.write_trial(trial + 1, observation)?;
    }
    writer.finish()?;

    println!(
        "Simulated {} trials, log written to {}",
        observations.len().to_string().green(),
        out_path
    );
    Ok(())
}

fn run_init_config(args: &[String]) -> Result<()> {
    let Some(path) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };
    save_config(&Config::default(), path)?;
    println!("Default configuration written to {}", path);
    Ok(())
}
