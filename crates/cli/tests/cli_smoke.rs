use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const REGISTRY: &str = r#"{
  "A": {"path": "libs/a", "deps": [], "tests": ["libs/a/tests"], "type": "engine"},
  "B": {"path": "libs/b", "deps": ["A"], "tests": ["libs/b/tests"]},
  "C": {"path": "apps/c", "deps": ["A"], "tests": ["apps/c/tests"], "run": ["echo", "hello from c"]},
  "D": {"path": "tools/d", "deps": []}
}"#;

fn repo() -> TempDir {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("project_map.json"), REGISTRY).unwrap();
    for dir in ["libs/a/tests", "libs/b/tests", "apps/c/tests", "tools/d"] {
        fs::create_dir_all(temp.path().join(dir)).unwrap();
    }
    temp
}

fn ripple(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("ripple").unwrap();
    cmd.current_dir(root)
        .arg("--root")
        .arg(root)
        .env_remove("RIPPLE_ROOT")
        .env_remove("RIPPLE_REGISTRY")
        .env_remove("RIPPLE_ADAPTER")
        .env_remove("RIPPLE_CACHE_URL")
        .env_remove("RIPPLE_NO_WRITE")
        .env("RUST_LOG", "warn");
    cmd
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({e}): {}",
            String::from_utf8_lossy(&output.stdout)
        )
    })
}

#[test]
fn test_projects_lists_every_registered_project() {
    let repo = repo();
    ripple(repo.path())
        .arg("projects")
        .assert()
        .success()
        .stdout(predicate::str::contains("A [engine] libs/a"))
        .stdout(predicate::str::contains("run:   echo hello from c"))
        .stdout(predicate::str::contains("D [misc] tools/d"));
}

#[test]
fn test_reverse_deps_lists_dependents() {
    let repo = repo();
    ripple(repo.path())
        .args(["deps", "A", "--reverse"])
        .assert()
        .success()
        .stdout("B\nC\n");
}

#[test]
fn test_unknown_project_fails() {
    let repo = repo();
    ripple(repo.path())
        .args(["deps", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown project 'nope'"));
}

#[test]
fn test_graph_renders_dot() {
    let repo = repo();
    ripple(repo.path())
        .args(["graph", "--format", "dot"])
        .assert()
        .success()
        .stdout(predicate::str::contains("digraph G"))
        .stdout(predicate::str::contains("\"A\" -> \"B\""));
}

#[test]
fn test_missing_registry_is_fatal() {
    let temp = TempDir::new().unwrap();
    ripple(temp.path())
        .arg("projects")
        .assert()
        .failure()
        .stderr(predicate::str::contains("registry file not found"));
}

#[test]
fn test_affected_without_diff_orders_projects_with_tests() {
    let repo = repo();
    let output = ripple(repo.path())
        .args(["affected", "--no-diff", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json = stdout_json(&output);
    assert_eq!(json["mode"], "no-diff");
    let projects: Vec<&str> = json["projects"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p.as_str().unwrap())
        .collect();
    assert_eq!(projects.len(), 3);
    assert_eq!(projects[0], "A");
    assert!(!projects.contains(&"D"));
}

#[test]
fn test_mock_test_run_is_recorded() {
    let repo = repo();
    let output = ripple(repo.path())
        .args(["--adapter", "mock", "test", "--no-diff", "--json", "--parallel", "2"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let summary = stdout_json(&output);
    assert_eq!(summary["label"], "tests");
    assert_eq!(summary["rc"], 0);
    assert_eq!(summary["results"].as_array().unwrap().len(), 3);

    ripple(repo.path())
        .arg("results")
        .assert()
        .success()
        .stdout(predicate::str::contains("tests: 3 ok"));
}

#[test]
fn test_no_write_leaves_no_state_behind() {
    let repo = repo();
    ripple(repo.path())
        .args(["--no-write", "--adapter", "mock", "test", "--no-diff"])
        .assert()
        .success();
    assert!(!repo.path().join(".ripple").exists());
}

#[test]
fn test_local_cache_is_refused_without_writes() {
    let repo = repo();
    ripple(repo.path())
        .args(["--no-write", "--adapter", "mock", "test", "--no-diff", "--cache", "local"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("writes are disabled"));
}

#[test]
fn test_base_from_last_reuses_recorded_base() {
    let repo = repo();
    // Not a git repository: diffing degrades to "all", the base is still recorded
    ripple(repo.path())
        .args(["affected", "--base", "release"])
        .assert()
        .success();
    let state = fs::read_to_string(repo.path().join(".ripple/state.json")).unwrap();
    assert!(state.contains("\"release\""));

    ripple(repo.path())
        .args(["affected", "--base-from", "last", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"degraded\": true"));
}

#[cfg(unix)]
mod tasks {
    use super::*;

    const TASKS: &str = r#"
[aliases]
b = "build"

[tasks.build]
command = "mkdir -p out && cp src/x.txt out/y.txt && echo built"
inputs = ["src/x.txt"]
outputs = ["out/y.txt"]

[tasks.check]
command = "exit 3"
deps = ["build"]

[tasks.loop-a]
command = "true"
deps = ["loop-b"]

[tasks.loop-b]
command = "true"
deps = ["loop-a"]
"#;

    fn task_repo() -> TempDir {
        let repo = repo();
        fs::create_dir_all(repo.path().join("src")).unwrap();
        fs::write(repo.path().join("src/x.txt"), "input").unwrap();
        fs::write(repo.path().join("ripple.toml"), TASKS).unwrap();
        repo
    }

    #[test]
    fn test_second_cached_run_is_a_hit() {
        let repo = task_repo();
        let first = ripple(repo.path())
            .args(["tasks", "run", "b", "--cache", "local", "--json"])
            .output()
            .unwrap();
        assert!(first.status.success(), "{}", String::from_utf8_lossy(&first.stderr));
        assert_eq!(stdout_json(&first)["results"][0]["cached"], false);

        let second = ripple(repo.path())
            .args(["tasks", "run", "build", "--cache", "local", "--json"])
            .output()
            .unwrap();
        let summary = stdout_json(&second);
        assert_eq!(summary["results"][0]["cached"], true);
        assert_eq!(summary["results"][0]["duration"], 0.0);
    }

    #[test]
    fn test_failing_task_sets_exit_code() {
        let repo = task_repo();
        ripple(repo.path())
            .args(["tasks", "run", "check"])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("[failed]"))
            .stdout(predicate::str::contains("rc=3"));
    }

    #[test]
    fn test_cyclic_tasks_are_rejected() {
        let repo = task_repo();
        ripple(repo.path())
            .args(["tasks", "run", "loop-a"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("cyclic task graph"));
    }

    #[test]
    fn test_cache_key_is_stable() {
        let repo = task_repo();
        let key = |repo: &TempDir| {
            let output = ripple(repo.path()).args(["cache", "key", "build"]).output().unwrap();
            String::from_utf8(output.stdout).unwrap()
        };
        let first = key(&repo);
        assert_eq!(first.trim().len(), 64);
        assert_eq!(first, key(&repo));
    }

    #[test]
    fn test_run_target_executes_through_the_shell() {
        let repo = task_repo();
        ripple(repo.path())
            .args(["run", "C"])
            .assert()
            .success()
            .stdout(predicate::str::contains("hello from c"));
    }
}
