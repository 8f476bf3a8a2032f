use std::process::Command;

fn main() {
    let commit = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .and_then(|o| String::from_utf8(o.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=CSV2JSON_BUILD_COMMIT={commit}");

    let built = chrono::Utc::now().to_rfc3339();
    println!("cargo:rustc-env=CSV2JSON_BUILD_TIMESTAMP={built}");

    println!("cargo:rerun-if-changed=.git/HEAD");
}
