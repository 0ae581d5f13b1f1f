use std::env;
use std::process::Command;

// Stamp the short git hash into `storyreel --version` when building from a checkout.
fn main() {
    let version = env::var("CARGO_PKG_VERSION").unwrap_or_default();
    let hash = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|raw| raw.trim().to_owned())
        .filter(|hash| !hash.is_empty());

    let long_version = match hash {
        Some(hash) => format!("{version} ({hash})"),
        None => version,
    };
    println!("cargo:rustc-env=STORYREEL_LONG_VERSION={long_version}");
    println!("cargo:rerun-if-changed=.git/HEAD");
}
