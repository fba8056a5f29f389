//! The `examomatic validate` command.

use std::path::PathBuf;

use anyhow::Result;

pub fn execute(file: PathBuf) -> Result<()> {
    let set = examomatic_core::parser::parse_import_file(&file)?;

    println!(
        "Import file: {} ({}), {} questions",
        set.exam_name,
        set.exam_code,
        set.questions.len()
    );

    let warnings = examomatic_core::parser::validate_import_set(&set);
    for w in &warnings {
        let prefix = w
            .question_number
            .map(|n| format!("  [question {n}]"))
            .unwrap_or_else(|| "  ".to_string());
        println!("{prefix} WARNING: {}", w.message);
    }

    if warnings.is_empty() {
        println!("Import file valid.");
    } else {
        println!("\n{} warning(s) found.", warnings.len());
    }

    Ok(())
}
