use assert_cmd::Command;
use std::path::PathBuf;
use tempfile::TempDir;

/// Test harness for running CLI commands with temporary databases
pub struct CliTestHarness {
    temp_dir: TempDir,
    db_path: PathBuf,
}

impl CliTestHarness {
    /// Create a new test harness with a temporary database
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("test.db");

        Self { temp_dir, db_path }
    }

    /// Get a Command instance configured for testing
    pub fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("studio").expect("Failed to find studio binary");

        // No studio.toml from the developer's checkout leaks in.
        cmd.current_dir(self.temp_dir.path())
            .env("STUDIO_CONFIG", self.temp_dir.path().join("absent.toml"))
            .env("STUDIO_DATABASE_PATH", &self.db_path)
            .env("STUDIO_TIMEZONE", "UTC")
            .env_remove("RUST_LOG");

        cmd
    }

    /// Helper to run a command and assert success
    pub fn run_success(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().success()
    }

    /// Helper to run a command and assert failure
    pub fn run_failure(&self, args: &[&str]) -> assert_cmd::assert::Assert {
        self.command().args(args).assert().failure()
    }

    /// Runs `args` and returns the new item's id from the success message.
    pub fn add(&self, args: &[&str]) -> String {
        let output = self.run_success(args).get_output().stdout.clone();
        let stdout = strip_ansi(&String::from_utf8_lossy(&output));
        stdout
            .lines()
            .find_map(|line| line.trim().strip_prefix("→ ID:"))
            .map(|id| id.trim().to_string())
            .expect("add printed no ID line")
    }

    /// Plain-text stdout of a successful `list` run.
    pub fn list(&self, args: &[&str]) -> String {
        let mut argv = vec!["list"];
        argv.extend_from_slice(args);
        let output = self.run_success(&argv).get_output().stdout.clone();
        strip_ansi(&String::from_utf8_lossy(&output))
    }
}

/// Removes terminal colour sequences.
pub fn strip_ansi(text: &str) -> String {
    let mut plain = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' {
            for next in chars.by_ref() {
                if next.is_ascii_alphabetic() {
                    break;
                }
            }
        } else {
            plain.push(c);
        }
    }
    plain
}

/// Common test fixtures
pub struct TestFixtures;

impl TestFixtures {
    /// Weekly class, Mondays 09:00-10:00 from 2024-01-01 through 2024-01-29.
    pub fn weekly_class_args() -> Vec<&'static str> {
        vec![
            "add", "Morning yoga",
            "--at", "2024-01-01 09:00",
            "--duration", "60",
            "--resource", "studio-a",
            "--every", "weekly",
            "--until", "2024-01-29",
        ]
    }

    /// Two weeks: 2024-01-08 through 2024-01-21.
    pub fn two_week_window() -> Vec<&'static str> {
        vec!["--from", "2024-01-08", "--to", "2024-01-21"]
    }
}
