use crate::error::CliError;
use engine_core::state::Snapshot;
use engine_runtime::report::RunReport;
use std::collections::BTreeMap;

pub fn print_report(report: &RunReport, as_json: bool) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("Run {} ({} ms):", report.run_id, report.elapsed_ms);
    println!("{:<40} {:<12} {:>8}  {}", "Dataset", "State", "Rows", "Detail");
    println!("{}", "-".repeat(80));

    let mut units: Vec<_> = report.units.iter().collect();
    units.sort_by(|a, b| a.dataset.cmp(&b.dataset));

    for unit in units {
        let detail = match (&unit.error, &unit.cursor) {
            (Some(error), _) => error.as_str(),
            (None, Some(cursor)) => cursor.as_str(),
            (None, None) => "unchanged",
        };
        println!(
            "{:<40} {:<12} {:>8}  {}",
            unit.dataset.as_str(),
            unit.state.to_string(),
            unit.rows_appended,
            detail
        );
    }

    let m = &report.metrics;
    println!("{}", "-".repeat(80));
    println!(
        "{} committed, {} unchanged, {} failed; {} rows, {} bytes uploaded, {} retries",
        m.datasets_committed,
        m.datasets_unchanged,
        m.datasets_failed,
        m.rows_appended,
        m.bytes_uploaded,
        m.retry_count
    );
    if report.cancelled {
        println!("Run was interrupted before every dataset finished");
    }
    Ok(())
}

pub fn print_cursors(snapshot: &Snapshot, as_json: bool) -> Result<(), CliError> {
    let sorted: BTreeMap<&str, String> = snapshot
        .iter()
        .map(|(key, cursor)| (key.as_str(), cursor.to_string()))
        .collect();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&sorted)?);
        return Ok(());
    }

    if sorted.is_empty() {
        println!("No cursors stored yet");
        return Ok(());
    }

    println!("{:<40} {}", "Dataset", "Cursor");
    println!("{}", "-".repeat(66));
    for (key, cursor) in sorted {
        println!("{key:<40} {cursor}");
    }
    Ok(())
}
