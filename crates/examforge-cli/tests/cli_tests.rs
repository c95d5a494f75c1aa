//! CLI integration tests using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn examforge() -> Command {
    #[allow(deprecated)]
    Command::cargo_bin("examforge").unwrap()
}

const BANK: &str = r#"[
  {
    "id": "ent-1",
    "question": "Which order do beetles belong to?",
    "options": ["Coleoptera", "Diptera", "Hemiptera"],
    "answers": [1],
    "difficulty": 0.3
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
    "question": "Name the larval stage of a butterfly.",
    "answers": ["caterpillar"],
    "difficulty": 0.2
  }
]"#;

const SET: &str = r#"{
  "event": "Entomology",
  "time_limit_secs": 600,
  "questions": [
    {
      "prompt": "Which body part bears an insect's wings?",
      "options": ["head", "thorax", "abdomen"],
      "answers": ["thorax"]
    },
    {
      "prompt": "Name the larval stage of a butterfly.",
      "options": [],
      "answers": ["caterpillar"]
    }
  ],
  "share_indices": [0, 1]
}"#;

const ANSWERS: &str = r#"{
  "0": {"type": "selected", "values": ["thorax"]},
  "1": {"type": "freetext", "text": "caterpillar"}
}"#;

#[test]
fn compose_from_local_bank() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("bank.json"), BANK).unwrap();

    examforge()
        .current_dir(dir.path())
        .args([
            "compose",
            "--bank",
            "bank.json",
            "--event",
            "Entomology",
            "--count",
            "3",
            "--output",
            "set.json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 questions"))
        .stdout(predicate::str::contains("Share indices:"))
        .stdout(predicate::str::contains("Set written to: set.json"));

    let set = std::fs::read_to_string(dir.path().join("set.json")).unwrap();
    assert!(set.contains("\"questions\""));
    assert!(set.contains("\"share_indices\""));
}

#[test]
fn compose_resumes_a_persisted_session() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("bank.json"), BANK).unwrap();

    let args = [
        "compose",
        "--bank",
        "bank.json",
        "--event",
        "Entomology",
        "--count",
        "3",
        "--output",
        "set.json",
    ];

    examforge()
        .current_dir(dir.path())
        .args(args)
        .assert()
        .success();

    let first = std::fs::read_to_string(dir.path().join("set.json")).unwrap();

    examforge()
        .current_dir(dir.path())
        .args(args)
        .assert()
        .success()
        .stderr(predicate::str::contains("Resuming persisted session"));

    // The resumed run reproduces the identical set.
    let second = std::fs::read_to_string(dir.path().join("set.json")).unwrap();
    assert_eq!(first, second);
}

#[test]
fn compose_recovers_from_a_corrupt_session_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("bank.json"), BANK).unwrap();

    let args = [
        "compose",
        "--bank",
        "bank.json",
        "--event",
        "Entomology",
        "--count",
        "3",
        "--output",
        "set.json",
    ];

    examforge()
        .current_dir(dir.path())
        .args(args)
        .assert()
        .success();

    let session_file = dir
        .path()
        .join("examforge-results/sessions/entomology-1800s.json");
    assert!(session_file.exists());
    std::fs::write(&session_file, "{not json").unwrap();

    // The corrupt record is cleared and a fresh set is composed.
    examforge()
        .current_dir(dir.path())
        .args(args)
        .assert()
        .success()
        .stderr(predicate::str::contains("Resuming persisted session").not());
}

#[test]
fn compose_missing_bank_fails() {
    let dir = TempDir::new().unwrap();

    examforge()
        .current_dir(dir.path())
        .args(["compose", "--bank", "missing.json", "--count", "3"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn compose_rejects_unknown_difficulty_band() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("bank.json"), BANK).unwrap();

    examforge()
        .current_dir(dir.path())
        .args([
            "compose",
            "--bank",
            "bank.json",
            "--count",
            "3",
            "--difficulty",
            "impossible",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown difficulty band"));
}

#[test]
fn grade_offline_with_exact_and_fuzzy_tiers() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("set.json"), SET).unwrap();
    std::fs::write(dir.path().join("answers.json"), ANSWERS).unwrap();

    examforge()
        .current_dir(dir.path())
        .args(["grade", "--set", "set.json", "--answers", "answers.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Score: 2.00 / 2"))
        .stderr(predicate::str::contains("offline"));
}

#[test]
fn grade_rejects_out_of_range_answer_index() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("set.json"), SET).unwrap();
    std::fs::write(
        dir.path().join("answers.json"),
        r#"{"9": {"type": "freetext", "text": "x"}}"#,
    )
    .unwrap();

    examforge()
        .current_dir(dir.path())
        .args(["grade", "--set", "set.json", "--answers", "answers.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("out of range"));
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    examforge()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created examforge.toml"))
        .stdout(predicate::str::contains("Created banks/example.json"));

    assert!(dir.path().join("examforge.toml").exists());
    assert!(dir.path().join("banks/example.json").exists());
}

#[test]
fn init_skips_existing() {
    let dir = TempDir::new().unwrap();

    examforge()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();

    examforge()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists, skipping"));
}
