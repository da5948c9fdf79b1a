use std::env;
use std::process::Command;

const PREFIX: &str = "ANSELUS_BUILD";

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=.git/HEAD");

    let hash = capture("git", &["rev-parse", "--short", "HEAD"]);
    let status = capture("git", &["status", "--porcelain"]).map(|changes| {
        if changes.is_empty() {
            "clean".to_string()
        } else {
            "dirty".to_string()
        }
    });
    let rustc = env::var("RUSTC").unwrap_or_else(|_| "rustc".into());

    emit("HASH", hash);
    emit("STATUS", status);
    emit(
        "TIMESTAMP",
        Some(chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()),
    );
    emit("TARGET", env::var("TARGET").ok());
    emit("PROFILE", env::var("PROFILE").ok());
    emit("RUSTC", capture(&rustc, &["--version"]));
}

/// Exposes `value` to the crate as `ANSELUS_BUILD_<name>`.
fn emit(name: &str, value: Option<String>) {
    let value = value.unwrap_or_else(|| "unknown".into());
    println!("cargo:rustc-env={PREFIX}_{name}={value}");
}

/// Runs a tool and returns its trimmed stdout when it succeeds.
fn capture(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|text| text.trim().to_string())
}
