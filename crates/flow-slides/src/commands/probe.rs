use anyhow::Result;
use colored::Colorize;
use flow_slides::config::Config;
use flow_slides::convert::select::{HostInfo, Probe, default_bundle_dir};

pub fn run() -> Result<()> {
    let config = Config::load_or_default();
    let options = config.selector_options();
    let host = HostInfo::current();

    println!("{} {} / {}", "Host:".bold(), host.os, host.arch);
    println!("{} {}", "Preference:".bold(), options.prefer);
    let bundle_dir = options.bundle_dir.clone().or_else(default_bundle_dir);
    match &bundle_dir {
        Some(dir) => println!("{} {}", "Bundle folder:".bold(), dir.display()),
        None => println!("{} {}", "Bundle folder:".bold(), "(none)".dimmed()),
    }
    println!("{} {}", "Cache:".bold(), options.cache_dir.display());
    println!();

    let probe = Probe::run(&options, &host);
    let available = probe.available();
    if available.is_empty() {
        println!("{}", "No conversion toolchain found.".yellow());
        println!(
            "Install LibreOffice, or point {} at an office executable.",
            "flow-slides config set engine.office_path <path>".cyan()
        );
        return Ok(());
    }

    println!("{}", "Available toolchains (priority order):".bold());
    for (i, (kind, description)) in available.iter().enumerate() {
        let marker = if i == 0 { "*".green().bold() } else { " ".normal() };
        println!("  {marker} {:<11} {description}", kind.as_str());
    }

    let exporter = probe.into_exporter(options.prefer);
    println!();
    println!("{} {}", "Selected:".green().bold(), exporter.name());
    Ok(())
}
