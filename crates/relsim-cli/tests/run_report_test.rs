use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn write_profile(dir: &std::path::Path, name: &str, agent_id: &str, attachment_style: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    let json = format!(
        r#"{{
            "agent_id": "{agent_id}",
            "values": {{
                "achievement": 0.5, "autonomy": 0.5, "belonging": 0.5, "intimacy": 0.5,
                "novelty": 0.5, "power": 0.5, "security": 0.5, "stability": 0.5
            }},
            "attachment_style": "{attachment_style}",
            "fear_architecture": ["abandonment"],
            "linguistic_signature": ["honestly"],
            "entropy_tolerance": 0.5,
            "communication_style": "direct"
        }}"#
    );
    std::fs::write(&path, json).unwrap();
    path
}

#[test]
fn run_then_report_round_trips_through_saved_json() {
    let temp = TempDir::new().unwrap();
    let profile_a = write_profile(temp.path(), "a.json", "alex", "secure");
    let profile_b = write_profile(temp.path(), "b.json", "blair", "anxious");
    let out_path = temp.path().join("distribution.json");

    let mut run_cmd = Command::cargo_bin("relsim").unwrap();
    run_cmd
        .arg("run")
        .arg("--profile-a")
        .arg(&profile_a)
        .arg("--profile-b")
        .arg(&profile_b)
        .arg("--n-simulations")
        .arg("2")
        .arg("--out")
        .arg(&out_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Ensemble report"));

    assert!(out_path.exists());

    let mut report_cmd = Command::cargo_bin("relsim").unwrap();
    report_cmd
        .arg("report")
        .arg("--input")
        .arg(&out_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Ensemble report"));
}

#[test]
fn run_rejects_a_profile_with_a_missing_value_key() {
    let temp = TempDir::new().unwrap();
    let bad_path = temp.path().join("bad.json");
    std::fs::write(
        &bad_path,
        r#"{
            "agent_id": "alex",
            "values": { "achievement": 0.5 },
            "attachment_style": "secure",
            "fear_architecture": [],
            "linguistic_signature": [],
            "entropy_tolerance": 0.5,
            "communication_style": "direct"
        }"#,
    )
    .unwrap();
    let profile_b = write_profile(temp.path(), "b.json", "blair", "anxious");

    let mut cmd = Command::cargo_bin("relsim").unwrap();
    cmd.arg("run")
        .arg("--profile-a")
        .arg(&bad_path)
        .arg("--profile-b")
        .arg(&profile_b)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid profile"));
}
