use anyhow::{Context, Result};
use colored::Colorize;
use flow_slides::config::Config;

use crate::cli::CacheCommands;

pub fn run(command: CacheCommands) -> Result<()> {
    match command {
        CacheCommands::Path => {
            let options = Config::load_or_default().selector_options();
            println!("{}", options.cache_dir.display());
            Ok(())
        }
        CacheCommands::Clear { file } => {
            let engine = super::engine_from_config();
            let removed = engine
                .clear_cache(&file)
                .with_context(|| format!("Failed to clear cache of {}", file.display()))?;
            if removed {
                println!("{} {}", "Cleared cache of".green(), file.display());
            } else {
                println!("{} {}", "Nothing cached for".dimmed(), file.display());
            }
            Ok(())
        }
    }
}
