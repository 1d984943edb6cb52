use std::env;
use std::fs;
use std::path::PathBuf;

const DEFAULT_LOG_TAG: &str = "PORTAO";

fn main() {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR missing"));
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR missing"));

    // Settings are baked into the binary; swapping them means rebuilding.
    let settings_source = env::var_os("GATENODE_SETTINGS")
        .map(PathBuf::from)
        .unwrap_or_else(|| manifest_dir.join("config").join("node.json"));

    fs::copy(&settings_source, out_dir.join("node_settings.json")).unwrap_or_else(|err| {
        panic!(
            "Failed to embed settings from {}: {err}",
            settings_source.display()
        )
    });

    let log_tag = env::var("GATENODE_LOG_TAG").unwrap_or_else(|_| DEFAULT_LOG_TAG.to_string());
    println!("cargo:rustc-env=GATENODE_LOG_TAG={log_tag}");

    println!("cargo:rerun-if-env-changed=GATENODE_SETTINGS");
    println!("cargo:rerun-if-env-changed=GATENODE_LOG_TAG");
    println!(
        "cargo:rerun-if-changed={}",
        settings_source.to_str().expect("settings path invalid UTF-8")
    );
}
