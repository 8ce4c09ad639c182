//! Environment readiness check.

use anyhow::Result;
use std::path::Path;

use crate::browser::find_chromium;

/// Check Chromium availability and output-path writability.
pub async fn run(output_path: &Path) -> Result<()> {
    println!("Shelfscout Doctor");
    println!("=================");
    println!();

    let os = std::env::consts::OS;
    let arch = std::env::consts::ARCH;
    println!("OS:   {os}");
    println!("Arch: {arch}");
    println!();

    let chromium_path = find_chromium();
    match &chromium_path {
        Some(path) => println!("[OK] Chromium found: {}", path.display()),
        None => println!(
            "[!!] Chromium NOT found. Install Chrome/Chromium or set SHELFSCOUT_CHROMIUM_PATH."
        ),
    }

    let out_dir = output_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    if out_dir.exists() {
        println!("[OK] Output directory exists: {}", out_dir.display());
    } else {
        println!("[!!] Output directory does not exist: {}", out_dir.display());
    }

    println!();
    if chromium_path.is_some() && out_dir.exists() {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }

    Ok(())
}
