use anyhow::Result;
use colored::Colorize;
use flow_slides::config::Config;

use crate::cli::ConfigCommands;

pub fn run(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show => show(),
        ConfigCommands::Set { key, value } => {
            let mut config = Config::load_or_default();
            config.set(&key, &value)?;
            let path = config.save()?;
            println!("{} {key} = {value}", "Set".green());
            println!("{}", format!("Saved to {}", path.display()).dimmed());
            Ok(())
        }
        ConfigCommands::Recent => {
            let config = Config::load_or_default();
            let recent = config.recent_projects();
            if recent.is_empty() {
                println!("{}", "No recent projects.".dimmed());
            }
            for (i, project) in recent.iter().enumerate() {
                println!("{:>2}. {}", i + 1, project.display());
            }
            Ok(())
        }
        ConfigCommands::AddRecent { file } => {
            let mut config = Config::load_or_default();
            config.add_recent_project(&file)?;
            config.save()?;
            println!("{} {}", "Added".green(), file.display());
            Ok(())
        }
        ConfigCommands::RemoveRecent { file } => {
            let mut config = Config::load_or_default();
            if config.remove_recent_project(&file) {
                config.save()?;
                println!("{} {}", "Removed".green(), file.display());
            } else {
                println!("{} {}", "Not in the recent list:".yellow(), file.display());
            }
            Ok(())
        }
    }
}

fn show() -> Result<()> {
    let path = Config::path()?;
    let config = match Config::load() {
        Ok(config) => config,
        Err(_) => {
            println!("{}", format!("No config at {}; showing defaults.", path.display()).dimmed());
            Config::default()
        }
    };
    let options = config.selector_options();

    println!("{}", "Engine".bold());
    println!("  prefer:      {}", options.prefer);
    println!("  bundle_dir:  {}", display_or_unset(options.bundle_dir.as_deref()));
    println!("  office_path: {}", display_or_unset(options.office_path.as_deref()));
    println!("{}", "Cache".bold());
    println!("  dir:         {}", options.cache_dir.display());
    println!("  dpi:         {}", options.dpi);
    println!("{}", "Recent projects".bold());
    println!("  {}", config.recent_projects().len());
    Ok(())
}

fn display_or_unset(path: Option<&std::path::Path>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "(unset)".dimmed().to_string())
}
