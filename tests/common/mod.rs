//! Shared fixture for integration tests: a real repository driven by the git CLI.

#![allow(dead_code)]

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

use stepwise::core::types::{Identity, Oid};
use stepwise::git::Git;

/// Test fixture that creates a real git repository on `main`.
pub struct TestRepo {
    pub dir: TempDir,
}

impl TestRepo {
    /// Create a new test repository with an initial commit.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");

        run_git(dir.path(), &["init", "-q"]);
        run_git(dir.path(), &["symbolic-ref", "HEAD", "refs/heads/main"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        run_git(dir.path(), &["config", "user.name", "Test User"]);
        run_git(dir.path(), &["config", "commit.gpgsign", "false"]);

        let repo = Self { dir };
        repo.commit_file("README.md", "# Test Repo\n", "Initial commit");
        repo
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn git(&self) -> Git {
        Git::open(self.path()).expect("failed to open test repo")
    }

    /// Write a file, stage it, commit, and return the new HEAD.
    pub fn commit_file(&self, path: &str, content: &str, message: &str) -> Oid {
        self.write(path, content);
        self.git_cmd(&["add", path]);
        self.git_cmd(&["commit", "-q", "-m", message]);
        self.rev_parse("HEAD")
    }

    pub fn write(&self, path: &str, content: &str) {
        let full = self.path().join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full, content).unwrap();
    }

    pub fn read(&self, path: &str) -> String {
        std::fs::read_to_string(self.path().join(path)).unwrap()
    }

    pub fn exists(&self, path: &str) -> bool {
        self.path().join(path).exists()
    }

    pub fn git_cmd(&self, args: &[&str]) {
        run_git(self.path(), args);
    }

    pub fn git_output(&self, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .output()
            .expect("git command failed");
        String::from_utf8(output.stdout).unwrap().trim().to_string()
    }

    pub fn rev_parse(&self, rev: &str) -> Oid {
        Oid::new(self.git_output(&["rev-parse", rev])).unwrap()
    }

    /// Symbolic ref HEAD points at, or `None` when detached.
    pub fn head_ref(&self) -> Option<String> {
        let output = Command::new("git")
            .args(["symbolic-ref", "-q", "HEAD"])
            .current_dir(self.path())
            .output()
            .expect("git symbolic-ref failed");
        output
            .status
            .success()
            .then(|| String::from_utf8(output.stdout).unwrap().trim().to_string())
    }

    /// Build the conflict scenario used across tests.
    ///
    /// ```text
    /// main:  I --- M                (M: file.txt = "main")
    ///         \
    /// topic:   A --- B --- C        (B: file.txt = "topic")
    /// ```
    ///
    /// `I` has `file.txt = "line"`. Leaves `topic` checked out.
    pub fn diverged(&self) -> Scenario {
        let base = self.commit_file("file.txt", "line\n", "add file");
        self.git_cmd(&["checkout", "-q", "-b", "topic"]);
        let a = self.commit_file("a.txt", "a\n", "A");
        let b = self.commit_file("file.txt", "topic\n", "B");
        let c = self.commit_file("c.txt", "c\n", "C");
        self.git_cmd(&["checkout", "-q", "main"]);
        let m = self.commit_file("file.txt", "main\n", "M");
        self.git_cmd(&["checkout", "-q", "topic"]);
        Scenario { base, a, b, c, m }
    }
}

pub struct Scenario {
    pub base: Oid,
    pub a: Oid,
    pub b: Oid,
    pub c: Oid,
    pub m: Oid,
}

pub fn committer() -> Identity {
    Identity::new("Rebase Bot", "rebase@example.com").unwrap()
}

/// Run a git command in the given directory, panicking on failure.
pub fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git command failed");

    if !output.status.success() {
        panic!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
}
