//! Integration tests for the ckpt binary

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use ckpt::config::{Config, Context};
    use ckpt::experiment::{ExperimentRecord, ExperimentStore, RawResult};
    use predicates::prelude::*;
    use serde_json::{json, Value};
    use std::fs;
    use tempfile::TempDir;

    fn ckpt(root: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("ckpt");
        cmd.arg("--root").arg(root.path()).env_remove("CKPT_ROOT");
        cmd
    }

    fn seed(root: &TempDir, name: &str, config: Value, acc: f64) -> String {
        let ctx = Context::new(root.path(), Config::default());
        let mut record = ExperimentRecord::new(name, config.as_object().cloned().unwrap());
        record.add_metrics([("acc".to_string(), acc)]).unwrap();
        ExperimentStore::new(&ctx).save(&record).unwrap()
    }

    #[test]
    fn help_displays() {
        let root = TempDir::new().unwrap();
        ckpt(&root)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Content-addressed checkpoint cache"));
    }

    #[test]
    fn version_displays() {
        let root = TempDir::new().unwrap();
        ckpt(&root)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("ckpt"));
    }

    #[test]
    fn report_empty_root() {
        let root = TempDir::new().unwrap();
        ckpt(&root)
            .arg("report")
            .assert()
            .success()
            .stdout(predicate::str::contains("id").and(predicate::str::contains("config")));
    }

    #[test]
    fn report_prunes_and_merges() {
        let root = TempDir::new().unwrap();
        seed(&root, "mnist", json!({"lr": 0.1, "seed": 1}), 0.9);
        seed(&root, "mnist", json!({"lr": 0.1, "seed": 1}), 0.9);
        seed(&root, "mnist", json!({"lr": 0.2, "seed": 1}), 0.8);

        let output = ckpt(&root)
            .args(["report", "-o", "csv", "--sort-by", "acc", "--desc"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let stdout = String::from_utf8(output.stdout).unwrap();
        let lines: Vec<&str> = stdout.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "id,name,config,acc");
        assert!(lines[1].ends_with("mnist,lr=0.1,0.9000"));
        assert!(lines[2].ends_with("mnist,lr=0.2,0.8000"));
        assert!(!stdout.contains("seed"));
    }

    #[test]
    fn report_writes_file() {
        let root = TempDir::new().unwrap();
        seed(&root, "mnist", json!({"lr": 0.1}), 0.9);
        let path = root.path().join("report.csv");

        ckpt(&root)
            .args(["report", "-o", "csv", "--filename"])
            .arg(&path)
            .assert()
            .success()
            .stdout(predicate::str::contains("Wrote 1 row(s)"));

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("id,name,config,acc\r\n"));
    }

    #[test]
    fn report_scores_raw_results() {
        let root = TempDir::new().unwrap();
        let ctx = Context::new(root.path(), Config::default());
        let mut record = ExperimentRecord::new("mnist", serde_json::Map::new());
        record
            .add_results("test", RawResult::new(vec![1.0, 0.0], vec![1.0, 1.0]))
            .unwrap();
        ExperimentStore::new(&ctx).save(&record).unwrap();

        ckpt(&root)
            .arg("report")
            .assert()
            .success()
            .stdout(predicate::str::contains("test-accuracy").and(predicate::str::contains("0.5000")));
    }

    #[test]
    fn report_unknown_sort_column() {
        let root = TempDir::new().unwrap();
        seed(&root, "mnist", json!({"lr": 0.1}), 0.9);

        ckpt(&root)
            .args(["report", "--sort-by", "loss"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Unknown report column: loss"));
    }

    #[test]
    fn remove_missing_experiment() {
        let root = TempDir::new().unwrap();
        let kept = seed(&root, "mnist", json!({"lr": 0.1}), 0.9);

        ckpt(&root)
            .args(["remove", "--yes", kept.as_str(), "zzzz"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Experiment not found: zzzz"))
            .stderr(predicate::str::contains("Hint:"));

        // Nothing is deleted when any id fails to resolve
        assert!(root
            .path()
            .join("experiments")
            .join(format!("{}.json", kept))
            .is_file());
    }

    #[test]
    fn remove_by_short_id() {
        let root = TempDir::new().unwrap();
        let address = seed(&root, "mnist", json!({"lr": 0.1}), 0.9);

        ckpt(&root)
            .args(["remove", "--yes", &address[..8]])
            .assert()
            .success()
            .stdout(predicate::str::contains("Removed"));

        assert!(!root
            .path()
            .join("experiments")
            .join(format!("{}.json", address))
            .exists());
    }

    #[test]
    fn inspect_shows_record() {
        let root = TempDir::new().unwrap();
        let address = seed(&root, "mnist", json!({"model": {"lr": 0.1}}), 0.9);

        ckpt(&root)
            .args(["inspect", &address[..10]])
            .assert()
            .success()
            .stdout(predicate::str::contains("mnist"))
            .stdout(predicate::str::contains("model-lr"))
            .stdout(predicate::str::contains("0.9000"));

        ckpt(&root)
            .args(["inspect", "--json", address.as_str()])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"format-version\": 1"));
    }

    #[test]
    fn run_prints_plan() {
        let root = TempDir::new().unwrap();
        let path = root.path().join("pipeline.toml");
        fs::write(&path, "[scaler]\n\n[model]\nalpha = 0.5\n").unwrap();

        ckpt(&root)
            .args(["run", "--no-checkpoints", "--config"])
            .arg(&path)
            .assert()
            .success()
            .stdout(predicate::str::contains("\"name\": \"scaler+model\""))
            .stdout(predicate::str::contains("\"checkpoints\": false"))
            .stdout(predicate::str::contains("\"dry-run\": false"));
    }

    #[test]
    fn rerun_is_a_dry_run() {
        let root = TempDir::new().unwrap();
        let address = seed(&root, "scaler+model", json!({"scaler": {}, "model": {"alpha": 0.5}}), 0.9);

        ckpt(&root)
            .args(["rerun", address.as_str()])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"dry-run\": true"))
            .stdout(predicate::str::contains("\"alpha\": 0.5"))
            .stderr(predicate::str::contains("Dry run"));

        let output = ckpt(&root).args(["rerun", address.as_str()]).output().unwrap();
        let plan: Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(plan["dry-run"], true);
    }

    #[test]
    fn config_path_and_show() {
        let root = TempDir::new().unwrap();

        ckpt(&root)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config"));

        ckpt(&root)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"min-short-hash\": 7"));
    }

    #[test]
    fn invalid_config_is_reported() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("config"), "{not json").unwrap();

        ckpt(&root)
            .arg("report")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }
}
