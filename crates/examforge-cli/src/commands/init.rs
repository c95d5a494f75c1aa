//! The `examforge init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    // Create examforge.toml
    if std::path::Path::new("examforge.toml").exists() {
        println!("examforge.toml already exists, skipping.");
    } else {
        std::fs::write("examforge.toml", SAMPLE_CONFIG)?;
        println!("Created examforge.toml");
    }

    // Create example question bank
    std::fs::create_dir_all("banks")?;
    let bank_path = std::path::Path::new("banks/example.json");
    if bank_path.exists() {
        println!("banks/example.json already exists, skipping.");
    } else {
        std::fs::write(bank_path, EXAMPLE_BANK)?;
        println!("Created banks/example.json");
    }

    println!("\nNext steps:");
    println!("  1. Edit examforge.toml with your service URLs");
    println!("  2. Run: examforge compose --bank banks/example.json --event Entomology --count 4");
    println!("  3. Run: examforge grade --set set.json --answers answers.json");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# examforge configuration

[services.questions]
base_url = "https://pool.example.org"
api_key = "${EXAMFORGE_API_KEY}"

[services.grader]
base_url = "https://grader.example.org"
api_key = "${EXAMFORGE_API_KEY}"

[services.contest]
base_url = "https://grader.example.org"
api_key = "${EXAMFORGE_API_KEY}"

default_event = "Entomology"
default_count = 25
default_time_limit_secs = 1800
id_percentage = 20
output_dir = "./examforge-results"
"#;

const EXAMPLE_BANK: &str = r#"[
  {
    "id": "ent-1",
    "question": "Which order do beetles belong to?",
    "options": ["Coleoptera", "Diptera", "Hemiptera", "Orthoptera"],
    "answers": [1],
    "difficulty": 0.3,
    "subtopics": ["orders"]
  },
  {
    "id": "ent-2",
    "question": "Which body part bears an insect's wings?",
    "options": ["head", "thorax", "abdomen"],
    "answers": ["thorax"],
    "difficulty": 0.2
  },
  {
    "id": "ent-3",
    "question": "Select all hemimetabolous orders.",
    "options": ["Odonata", "Lepidoptera", "Hemiptera", "Coleoptera"],
    "answers": [1, 3],
    "difficulty": 0.6
  },
  {
    "id": "ent-4",
    "question": "Name the larval stage of a butterfly.",
    "answers": ["caterpillar"],
    "difficulty": 0.2
  }
]
"#;
