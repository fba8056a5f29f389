//! The `examomatic init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("examomatic.toml").exists() {
        println!("examomatic.toml already exists, skipping.");
    } else {
        std::fs::write("examomatic.toml", SAMPLE_CONFIG)?;
        println!("Created examomatic.toml");
    }

    std::fs::create_dir_all("question-sets")?;
    let example_path = std::path::Path::new("question-sets/example.json");
    if example_path.exists() {
        println!("question-sets/example.json already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_QUESTION_SET)?;
        println!("Created question-sets/example.json");
    }

    println!("\nNext steps:");
    println!("  1. Point server_url in examomatic.toml at your question-bank service");
    println!("  2. Run: examomatic validate --file question-sets/example.json");
    println!("  3. Run: examomatic import --file question-sets/example.json");
    println!("  4. Run: examomatic banks, then examomatic take --bank <id>");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# examomatic configuration

# Question-bank service. ${VAR} references are expanded from the environment.
server_url = "http://127.0.0.1:8000"
request_timeout_secs = 30

# Shuffle questions and options for each attempt.
shuffle = true

# "local" scores answers from the downloaded answer keys,
# "server" asks the service to confirm each answer.
evaluation = "local"
"#;

const EXAMPLE_QUESTION_SET: &str = r#"{
  "exam_name": "Example Cloud Fundamentals",
  "exam_code": "EX-100",
  "questions": [
    {
      "question": "Which service stores objects such as images and backups?",
      "option_a": "Block storage",
      "option_b": "Object storage",
      "option_c": "A message queue",
      "correct_answer": "B",
      "explanation": "Object storage keeps arbitrary blobs addressed by key."
    },
    {
      "question": "Which of these are regions in Europe?",
      "option_a": "eu-west-1",
      "option_b": "us-east-1",
      "option_c": "eu-central-1",
      "option_d": "ap-south-1",
      "correct_answer": ["A", "C"],
      "explanation": ["Region names starting with eu-", "are located in Europe."]
    }
  ]
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn sample_config_parses() {
        let config: examomatic_client::ExamomaticConfig = toml::from_str(SAMPLE_CONFIG).unwrap();
        assert_eq!(config.server_url, "http://127.0.0.1:8000");
    }

    #[test]
    fn example_question_set_is_valid() {
        let set = examomatic_core::parser::parse_import_str(
            EXAMPLE_QUESTION_SET,
            Path::new("example.json"),
        )
        .unwrap();
        assert_eq!(set.questions.len(), 2);
        assert!(examomatic_core::parser::validate_import_set(&set).is_empty());
    }
}
