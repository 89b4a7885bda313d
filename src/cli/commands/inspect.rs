//! Inspect command - show stored pointer records for one entry

use crate::cache::hash::short;
use crate::cache::{has_real_files, pointer, CacheLayout, PointerRecord};
use crate::cli::args::{InspectArgs, OutputFormat};
use crate::config::Config;
use crate::error::{HoardError, HoardResult};
use console::style;
use std::path::Path;
use tokio::fs;

/// A pointer record and whether its outputs are still present
struct StoredPointer {
    fingerprint: String,
    record: PointerRecord,
    present: bool,
}

/// Execute the inspect command
pub async fn execute(args: InspectArgs, config: &Config) -> HoardResult<()> {
    let layout = CacheLayout::new(config.cache.base_dir());
    let pointers = load_pointers(&layout, &args.component, &args.key).await?;

    if pointers.is_empty() {
        match args.format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => println!(
                "No cache records for {}/{}.",
                args.component, args.key
            ),
        }
        return Ok(());
    }

    match args.format {
        OutputFormat::Table => print_table(&pointers),
        OutputFormat::Json => print_json(&pointers)?,
        OutputFormat::Plain => {
            for p in &pointers {
                println!("{}", p.fingerprint);
            }
        }
    }

    Ok(())
}

/// Load every pointer under the entry's hash directory, newest first
async fn load_pointers(
    layout: &CacheLayout,
    component: &str,
    key: &str,
) -> HoardResult<Vec<StoredPointer>> {
    let dir = layout.hash_dir(component, key);
    if !dir.exists() {
        return Ok(vec![]);
    }

    let mut pointers = vec![];
    let mut entries = fs::read_dir(&dir)
        .await
        .map_err(|e| HoardError::io(format!("reading {}", dir.display()), e))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| HoardError::io("reading pointer entry", e))?
    {
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }
        let Some(fingerprint) = file_stem(&path) else {
            continue;
        };
        if let Some(record) = pointer::load(&path).await {
            let present =
                has_real_files(&layout.stored_output(&record.output_dir, &record.scan_dir));
            pointers.push(StoredPointer {
                fingerprint,
                record,
                present,
            });
        }
    }

    pointers.sort_by(|a, b| b.record.timestamp.cmp(&a.record.timestamp));
    Ok(pointers)
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().map(|s| s.to_string_lossy().into_owned())
}

fn print_table(pointers: &[StoredPointer]) {
    println!(
        "{:<14} {:<20} {:<18} {:<8} {}",
        style("FINGERPRINT").bold(),
        style("SCAN DIR").bold(),
        style("CAPTURED").bold(),
        style("SOURCES").bold(),
        style("OUTPUTS").bold()
    );
    println!("{}", "-".repeat(76));

    for p in pointers {
        let outputs = if p.present {
            style("present").green()
        } else {
            style("missing").red()
        };
        println!(
            "{:<14} {:<20} {:<18} {:<8} {}",
            short(&p.fingerprint),
            p.record.scan_dir,
            p.record.timestamp.format("%Y-%m-%d %H:%M"),
            p.record.sources.len(),
            outputs
        );
    }

    println!();
    println!("{} record(s)", pointers.len());
}

fn print_json(pointers: &[StoredPointer]) -> HoardResult<()> {
    #[derive(serde::Serialize)]
    #[serde(rename_all = "camelCase")]
    struct PointerJson<'a> {
        fingerprint: &'a str,
        #[serde(flatten)]
        record: &'a PointerRecord,
        outputs_present: bool,
    }

    let json: Vec<PointerJson> = pointers
        .iter()
        .map(|p| PointerJson {
            fingerprint: &p.fingerprint,
            record: &p.record,
            outputs_present: p.present,
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
