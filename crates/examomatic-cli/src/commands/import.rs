//! The `examomatic import` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use examomatic_client::{create_service, load_config_from};
use examomatic_core::parser::{parse_import_file, validate_import_set};
use examomatic_core::traits::{ImportFile, QuestionBank};

pub async fn execute(file: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    // Reject broken files before they reach the service.
    let set = parse_import_file(&file)?;
    for w in validate_import_set(&set) {
        let prefix = w
            .question_number
            .map(|n| format!("  [question {n}]"))
            .unwrap_or_else(|| "  ".to_string());
        println!("{prefix} WARNING: {}", w.message);
    }

    let config = load_config_from(config_path.as_deref())?;
    let service = create_service(&config)?;

    let contents = std::fs::read(&file)
        .with_context(|| format!("failed to read import file: {}", file.display()))?;
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "import.json".to_string());

    let receipt = service
        .import_questions(ImportFile {
            file_name,
            contents,
        })
        .await?;

    println!("{}", receipt.message);
    Ok(())
}
