use assert_cmd::Command;
use predicates::prelude::*;
use std::fmt::Write;
use tempfile::TempDir;

fn added_file(out: &mut String, path: &str, lines: &[String]) {
    let _ = writeln!(out, "diff --git a/{0} b/{0}", path);
    out.push_str("new file mode 100644\n--- /dev/null\n");
    let _ = writeln!(out, "+++ b/{}", path);
    let _ = writeln!(out, "@@ -0,0 +1,{} @@", lines.len());
    for line in lines {
        let _ = writeln!(out, "+{}", line);
    }
}

fn sample_diff() -> String {
    let app: Vec<String> = (0..30).map(|i| format!("const step{} = run({});", i, i)).collect();
    let lock: Vec<String> = (0..200).map(|i| format!("\"dep-{}\": \"1.0.{}\",", i, i)).collect();

    let mut diff = String::new();
    added_file(&mut diff, "src/app.ts", &app);
    added_file(&mut diff, "package-lock.json", &lock);
    diff
}

/// Config file that keeps the cache inside the temp dir
fn write_config(dir: &TempDir) -> String {
    let cache_dir = dir.path().join("cache");
    let path = dir.path().join("config.toml");
    let content = format!("[cache]\ndir = {:?}\n", cache_dir.to_string_lossy());
    std::fs::write(&path, content).unwrap();
    path.to_string_lossy().to_string()
}

fn nexus() -> Command {
    let mut cmd = Command::cargo_bin("nexus-commit").unwrap();
    cmd.env_remove("NEXUS_LOG").env_remove("NEXUS_COMMIT_CONFIG");
    cmd
}

#[test]
fn help_lists_commands() {
    nexus()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("commit"))
        .stdout(predicate::str::contains("analyze"))
        .stdout(predicate::str::contains("cache"));
}

#[test]
fn analyze_json_drops_lock_files() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir);

    nexus()
        .args(["--config", &config, "analyze", "--json"])
        .write_stdin(sample_diff())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"src/app.ts\""))
        .stdout(predicate::str::contains("package-lock").not())
        .stdout(predicate::str::contains("\"parsed_files\": 2"));
}

#[test]
fn analyze_reads_diff_file() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir);
    let diff_path = dir.path().join("change.diff");
    std::fs::write(&diff_path, sample_diff()).unwrap();

    nexus()
        .args(["--config", &config, "analyze", "--json", "--file"])
        .arg(&diff_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"pass-through\""));
}

#[test]
fn analyze_noise_only_diff_reports_nothing() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir);
    let lock: Vec<String> = (0..50).map(|i| format!("\"dep-{}\": \"1.0.{}\",", i, i)).collect();
    let mut diff = String::new();
    added_file(&mut diff, "Cargo.lock", &lock);

    nexus()
        .args(["--config", &config, "analyze", "--json"])
        .write_stdin(diff)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"files\": []"))
        .stdout(predicate::str::contains("\"parsed_files\": 1"))
        .stdout(predicate::str::contains("\"filtered_files\": 0"));
}

#[test]
fn cache_path_uses_configured_dir() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir);

    nexus()
        .args(["--config", &config, "cache", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cache"));
}

#[test]
fn cache_clear_on_empty_dir() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir);

    nexus()
        .args(["--config", &config, "cache", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 0 cached entries"));
}

#[test]
fn invalid_config_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[cache\nenabled = ").unwrap();

    nexus()
        .args(["--config"])
        .arg(&path)
        .arg("info")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config"));
}
