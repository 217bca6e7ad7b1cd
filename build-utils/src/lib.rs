//! Build-script helper that embeds version metadata into a binary.
//!
//! Call [`emit`] from `build.rs`; the crate can then read
//! `<PREFIX>_RUSTC_VERSION`, `<PREFIX>_TARGET_OS`, `<PREFIX>_TARGET_ARCH`,
//! `<PREFIX>_GIT_COMMIT` and `<PREFIX>_BUILD_TIME` with `env!`.

use std::env;
use std::process::Command;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

const UNKNOWN: &str = "unknown";

pub fn emit(prefix: &str) {
    let vars = [
        ("RUSTC_VERSION", rustc_version()),
        ("TARGET_OS", cargo_env("CARGO_CFG_TARGET_OS")),
        ("TARGET_ARCH", cargo_env("CARGO_CFG_TARGET_ARCH")),
        ("GIT_COMMIT", git_commit()),
        ("BUILD_TIME", build_time()),
    ];
    for (name, value) in vars {
        println!("cargo:rustc-env={prefix}_{name}={value}");
    }
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=../.git/HEAD");
}

fn cargo_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| UNKNOWN.to_string())
}

fn rustc_version() -> String {
    let rustc = env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    command_output(&rustc, &["--version"])
        .map(|version| version.trim_start_matches("rustc ").to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn git_commit() -> String {
    command_output("git", &["rev-parse", "--short", "HEAD"]).unwrap_or_else(|| UNKNOWN.to_string())
}

fn build_time() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| UNKNOWN.to_string())
}

fn command_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
