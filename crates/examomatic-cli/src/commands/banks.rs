//! The `examomatic banks` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use examomatic_client::{create_service, load_config_from};
use examomatic_core::model::TestBank;
use examomatic_core::traits::QuestionBank;

pub async fn execute(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let service = create_service(&config)?;

    let banks = service.list_test_banks().await?;
    if banks.is_empty() {
        println!("No test banks found. Import one with `examomatic import --file <path>`.");
        return Ok(());
    }

    println!("{}", render_table(&banks));
    Ok(())
}

fn render_table(banks: &[TestBank]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Exam code", "Questions", "Last score"]);

    for bank in banks {
        let last = bank
            .latest_score()
            .map(|s| format!("{s:.0}%"))
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![
            Cell::new(bank.id),
            Cell::new(&bank.name),
            Cell::new(&bank.exam_code),
            Cell::new(bank.question_count),
            Cell::new(last),
        ]);
    }

    table
}
