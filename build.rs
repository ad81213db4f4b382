// SPDX-License-Identifier: MPL-2.0

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=CAMERA_SERVER_VERSION");

    // Packagers can pin the version instead of deriving it from git
    let version = std::env::var("CAMERA_SERVER_VERSION").unwrap_or_else(|_| git_version());

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// Version string in the form `<crate version>-<short hash>`, or
/// `<crate version>-dirty-<short hash>` when the worktree has local changes.
fn git_version() -> String {
    let crate_version = std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".into());

    let Some(hash) = git(&["rev-parse", "--short", "HEAD"]) else {
        return crate_version;
    };

    let dirty = git(&["status", "--porcelain"]).is_some_and(|out| !out.is_empty());
    if dirty {
        format!("{}-dirty-{}", crate_version, hash)
    } else {
        format!("{}-{}", crate_version, hash)
    }
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
