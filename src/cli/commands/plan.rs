//! Plan command - show cache decisions without building

use crate::cache::RunOptions;
use crate::cli::args::{OutputFormat, PlanArgs};
use crate::config::Config;
use crate::error::HoardResult;
use crate::pipeline::{select_origins, ComponentReport, Pipeline};
use console::style;

/// Execute the plan command
pub async fn execute(args: PlanArgs, config: &Config) -> HoardResult<()> {
    let origins = select_origins(config, args.origin.as_deref())?;
    let options = RunOptions {
        dry_run: true,
        force_rebuild: args.force || config.cache.force_rebuild,
    };

    let pipeline = Pipeline::new(config, options);
    let reports = pipeline.decide(&origins).await;

    print_decisions(&reports, args.format)
}

/// Print decisions in the requested format
pub fn print_decisions(reports: &[ComponentReport], format: OutputFormat) -> HoardResult<()> {
    match format {
        OutputFormat::Table => print_table(reports),
        OutputFormat::Json => print_json(reports)?,
        OutputFormat::Plain => print_plain(reports),
    }
    Ok(())
}

fn print_table(reports: &[ComponentReport]) {
    let total: usize = reports.iter().map(|r| r.evaluations.len()).sum();
    if total == 0 {
        println!("No cache entries configured.");
        return;
    }

    println!(
        "{:<16} {:<16} {:<20} {:<6} {}",
        style("ORIGIN").bold(),
        style("COMPONENT").bold(),
        style("KEY").bold(),
        style("STATE").bold(),
        style("REASON").bold()
    );
    println!("{}", "-".repeat(80));

    let mut hits = 0;
    for report in reports {
        for evaluation in &report.evaluations {
            let state = if evaluation.decision.is_hit() {
                hits += 1;
                style("hit").green()
            } else {
                style("miss").yellow()
            };
            println!(
                "{:<16} {:<16} {:<20} {:<6} {}",
                report.origin,
                report.component,
                evaluation.entry.key,
                state,
                evaluation.decision.reason()
            );
        }
    }

    println!();
    println!("{} entries: {} hit, {} to build", total, hits, total - hits);
}

fn print_json(reports: &[ComponentReport]) -> HoardResult<()> {
    #[derive(serde::Serialize)]
    struct ComponentJson<'a> {
        origin: &'a str,
        component: &'a str,
        entries: &'a [crate::cache::Evaluation],
    }

    let json: Vec<ComponentJson> = reports
        .iter()
        .map(|r| ComponentJson {
            origin: &r.origin,
            component: &r.component,
            entries: &r.evaluations,
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

fn print_plain(reports: &[ComponentReport]) {
    for report in reports {
        for evaluation in &report.evaluations {
            let state = if evaluation.decision.is_hit() { "hit" } else { "miss" };
            println!("{}/{} {}", report.component, evaluation.entry.key, state);
        }
    }
}
