//! The `examomatic delete` command.

use std::path::PathBuf;

use anyhow::Result;

use examomatic_client::{create_service, load_config_from};
use examomatic_core::traits::QuestionBank;

pub async fn execute(bank: u64, confirmed: bool, config_path: Option<PathBuf>) -> Result<()> {
    anyhow::ensure!(
        confirmed,
        "deleting test bank {bank} removes all of its questions; pass --yes to confirm"
    );

    let config = load_config_from(config_path.as_deref())?;
    let service = create_service(&config)?;

    service.delete_test_bank(bank).await?;
    println!("Deleted test bank {bank}.");
    Ok(())
}
