//! Build script for the scanscribe CLI
//!
//! Generates build-time metadata for version output

use std::env;
use std::path::Path;

fn main() {
    built::write_built_file().expect("Failed to acquire build-time information");

    // Set build-time environment variables for use in clap
    println!(
        "cargo:rustc-env=BUILT_HOST={}",
        env::var("HOST").unwrap_or_else(|_| "unknown".to_string())
    );
    println!("cargo:rustc-env=BUILT_GIT_COMMIT_HASH={}", commit_hash());
    println!(
        "cargo:rustc-env=BUILT_TIME_UTC={}",
        chrono::Utc::now().to_rfc3339()
    );
}

/// Short hash of the checked-out commit; `GIT_COMMIT_HASH` wins when set
fn commit_hash() -> String {
    if let Some(hash) = env::var("GIT_COMMIT_HASH").ok().filter(|h| !h.is_empty()) {
        return hash;
    }
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
    match built::util::get_repo_head(Path::new(&manifest_dir)) {
        Ok(Some((_branch, _commit, short))) => short,
        // not a git checkout (e.g. a packaged source tarball)
        _ => "unknown".to_string(),
    }
}
