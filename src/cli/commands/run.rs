//! Run command - decide, build misses, cache outputs

use crate::cache::RunOptions;
use crate::cli::args::{OutputFormat, RunArgs};
use crate::config::Config;
use crate::error::{HoardError, HoardResult};
use crate::pipeline::{select_origins, Pipeline};
use console::style;

/// Execute the run command
pub async fn execute(args: RunArgs, config: &Config) -> HoardResult<()> {
    let origins = select_origins(config, args.origin.as_deref())?;
    let options = RunOptions {
        dry_run: args.dry_run || config.cache.dry_run,
        force_rebuild: args.force || config.cache.force_rebuild,
    };

    let pipeline = Pipeline::new(config, options);
    let report = pipeline.run(&origins).await;

    if report.dry_run {
        super::plan::print_decisions(&report.components, OutputFormat::Table)?;
        println!();
        println!("{} Dry run, nothing built", style("[OK]").green());
        return Ok(());
    }

    println!(
        "{} {} hit, {} built, {} cached",
        style("[OK]").green(),
        report.hits(),
        report.built,
        report.cached
    );
    if report.failed > 0 {
        return Err(HoardError::User(format!(
            "{} build(s) failed",
            report.failed
        )));
    }

    Ok(())
}
