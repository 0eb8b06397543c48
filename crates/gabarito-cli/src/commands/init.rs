//! The `gabarito init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    if Path::new("gabarito.toml").exists() {
        println!("gabarito.toml already exists, skipping.");
    } else {
        std::fs::write("gabarito.toml", SAMPLE_CONFIG)?;
        println!("Created gabarito.toml");
    }

    println!("\nNext steps:");
    println!("  1. Point base_url in gabarito.toml at your backend");
    println!("  2. Run: gabarito login --email <email> --password <password>");
    println!("  3. Run: gabarito exams list");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# gabarito configuration

# Exam-correction backend. ${VAR} references are read from the environment.
base_url = "http://localhost:8080"

# Per-request timeout in seconds
timeout_secs = 30

# Where the session token is stored between runs
# session_file = "${HOME}/.config/gabarito/session.json"
"#;
