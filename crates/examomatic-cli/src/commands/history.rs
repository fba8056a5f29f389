//! The `examomatic history` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use examomatic_client::{create_service, load_config_from};
use examomatic_core::history::{summarize, to_series, SeriesOrder, SeriesPoint};
use examomatic_core::traits::ResultStore;

pub async fn execute(bank: u64, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let service = create_service(&config)?;

    let records = service.get_history(bank).await?;
    let Some(stats) = summarize(&records) else {
        println!("No attempts recorded for test bank {bank}.");
        return Ok(());
    };

    let series = to_series(&records, SeriesOrder::Chronological);
    println!("{}", render_table(&series));
    println!(
        "{} attempt(s): best {}%, latest {}%, average {:.1}%",
        stats.attempts, stats.best, stats.latest, stats.average
    );
    Ok(())
}

fn render_table(series: &[SeriesPoint]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Date", "Score", "Trend"]);

    for point in series {
        table.add_row(vec![
            Cell::new(&point.label),
            Cell::new(format!("{}%", point.value)),
            Cell::new(bar(point.value)),
        ]);
    }

    table
}

/// One `#` per 5 percentage points.
fn bar(value: u32) -> String {
    "#".repeat((value / 5) as usize)
}
