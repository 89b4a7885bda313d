//! Integration tests for Hoard

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;

    fn hoard() -> Command {
        let mut cmd = cargo_bin_cmd!("hoard");
        cmd.env_remove("HOARD_CONFIG")
            .env_remove("HOARD_DRY_RUN")
            .env_remove("HOARD_FORCE_REBUILD");
        cmd
    }

    #[test]
    fn help_displays() {
        hoard()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("content-addressed build output cache"));
    }

    #[test]
    fn version_displays() {
        hoard()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("hoard"));
    }

    #[test]
    fn missing_explicit_config() {
        hoard()
            .args(["--config", "/nonexistent/hoard.toml", "plan"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Configuration file not found"));
    }

    #[test]
    fn unknown_origin() {
        let dir = tempfile::TempDir::new().unwrap();
        hoard()
            .current_dir(dir.path())
            .args(["plan", "--origin", "nope"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Origin not found"));
    }
}

#[cfg(unix)]
mod cache_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const CONFIG: &str = r#"
[cache]
dir = "store"

[[origins]]
name = "site"
path = "tree"

[[origins.components]]
name = "docs"
cache = [
  { run = { key = "build", sources = ["src/main.c"], cache_dir = "out", command = "mkdir -p out && echo ok > out/result.txt" }, scan = { dir = "out" } },
  { run = { key = "broken", cacheDir = "out" } },
]
"#;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("tree/src")).unwrap();
        fs::write(dir.path().join("tree/src/main.c"), "int main(){}").unwrap();
        fs::write(dir.path().join("hoard.toml"), CONFIG).unwrap();
        dir
    }

    fn hoard(dir: &Path) -> Command {
        let mut cmd = cargo_bin_cmd!("hoard");
        cmd.current_dir(dir)
            .env_remove("HOARD_CONFIG")
            .env_remove("HOARD_DRY_RUN")
            .env_remove("HOARD_FORCE_REBUILD");
        cmd
    }

    #[test]
    fn plan_reports_miss_before_first_run() {
        let dir = project();

        hoard(dir.path())
            .args(["plan", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("docs/build miss"))
            .stdout(predicate::str::contains("broken").not());
    }

    #[test]
    fn run_then_plan_hits() {
        let dir = project();

        hoard(dir.path()).arg("run").assert().success();
        assert!(dir.path().join("store/hashes/docs/build").is_dir());

        hoard(dir.path())
            .args(["plan", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("docs/build hit"));
    }

    #[test]
    fn force_makes_plan_miss() {
        let dir = project();
        hoard(dir.path()).arg("run").assert().success();

        hoard(dir.path())
            .args(["plan", "--force"])
            .assert()
            .success()
            .stdout(predicate::str::contains("forced rebuild"));
    }

    #[test]
    fn dry_run_env_exits_cleanly_without_building() {
        let dir = project();

        hoard(dir.path())
            .arg("run")
            .env("HOARD_DRY_RUN", "true")
            .assert()
            .success()
            .stdout(predicate::str::contains("Dry run"));

        assert!(!dir.path().join("tree/out").exists());
        assert!(!dir.path().join("store/hashes").exists());
    }

    #[test]
    fn changed_source_misses_again() {
        let dir = project();
        hoard(dir.path()).arg("run").assert().success();

        fs::write(dir.path().join("tree/src/main.c"), "int main(){return 1;}").unwrap();

        hoard(dir.path())
            .args(["plan", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("docs/build miss"));
    }

    #[test]
    fn inspect_lists_records() {
        let dir = project();
        hoard(dir.path()).arg("run").assert().success();

        hoard(dir.path())
            .args(["inspect", "docs", "build"])
            .assert()
            .success()
            .stdout(predicate::str::contains("present"))
            .stdout(predicate::str::contains("1 record(s)"));
    }

    #[test]
    fn plan_json_points_scan_at_cache_on_hit() {
        let dir = project();
        hoard(dir.path()).arg("run").assert().success();

        let output = hoard(dir.path())
            .args(["plan", "--format", "json"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        let entry = &json[0]["entries"][0];
        assert_eq!(entry["decision"], "hit");
        assert!(entry["scan"][0]["dir"]
            .as_str()
            .unwrap()
            .contains("store/outputs/"));
    }
}
