/// Build script for edfsim
/// Captures build environment for reproducibility

fn main() {
    println!("cargo:rerun-if-changed=Cargo.toml");
    println!("cargo:rerun-if-changed=Cargo.lock");

    // Capture git hash so `edfsim version` identifies the exact build
    if let Ok(output) = std::process::Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
    {
        if output.status.success() {
            if let Ok(hash) = String::from_utf8(output.stdout) {
                println!("cargo:rustc-env=GIT_HASH={}", hash.trim());
            }
        }
    }
}
