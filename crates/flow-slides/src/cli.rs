use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "flow-slides")]
#[command(author, version, about)]
#[command(long_about = "Convert presentation decks into cached slide images.\n\n\
    Decks are exported through PowerPoint, a bundled document builder or a\n\
    headless office suite, whichever is found first, and rasterized once.\n\n\
    Examples:\n  \
    flow-slides probe                      Show the conversion toolchains found\n  \
    flow-slides count songs/*              Slide counts and global index layout\n  \
    flow-slides render deck.pptx -o out    Write every slide as PNG\n  \
    flow-slides watch deck.pptx            Re-render whenever the deck is saved")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the conversion toolchains available on this host
    Probe,

    /// Count slides of decks or song folders and show their global index ranges
    Count {
        /// Presentation files, or song folders containing slides.pptx
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Convert a deck and write its slides as PNG images
    Render {
        /// Presentation file to render
        file: PathBuf,

        /// Output directory for PNG files
        #[arg(short, long, default_value = "slides")]
        output_dir: PathBuf,

        /// Only write this slide (1-indexed)
        #[arg(long)]
        slide: Option<usize>,
    },

    /// Inspect or clear cached slide images
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Render a deck and re-render it every time it changes on disk
    Watch {
        /// Presentation file to watch
        file: PathBuf,
    },

    /// View and modify configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// Print the cache directory in use
    Path,

    /// Remove every cached image of a deck
    Clear {
        /// Presentation file whose cache is removed
        file: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Display current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g. engine.prefer, engine.office_path, cache.dpi)
        key: String,

        /// Value to set
        value: String,
    },

    /// List recently opened projects
    Recent,

    /// Add a project to the recent list
    AddRecent {
        /// Project file
        file: PathBuf,
    },

    /// Remove a project from the recent list
    RemoveRecent {
        /// Project file
        file: PathBuf,
    },
}

#[derive(Clone, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    Powershell,
}

impl Cli {
    pub fn run(self) -> anyhow::Result<()> {
        let quiet = self.quiet;
        match self.command {
            Commands::Probe => crate::commands::probe::run(),
            Commands::Count { paths } => crate::commands::count::run(&paths, quiet),
            Commands::Render {
                file,
                output_dir,
                slide,
            } => {
                if !file.exists() {
                    anyhow::bail!("File not found: {}", file.display());
                }
                crate::commands::render::run(&file, &output_dir, slide, quiet)
            }
            Commands::Cache { command } => crate::commands::cache::run(command),
            Commands::Watch { file } => {
                if !file.exists() {
                    anyhow::bail!("File not found: {}", file.display());
                }
                crate::commands::watch::run(&file, quiet)
            }
            Commands::Config { command } => crate::commands::config::run(command),
            Commands::Completion { shell } => {
                crate::commands::completion::run(shell);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_render() {
        let cli = Cli::parse_from(["flow-slides", "-vv", "render", "deck.pptx", "-o", "out", "--slide", "3"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Render {
                file,
                output_dir,
                slide,
            } => {
                assert_eq!(file, PathBuf::from("deck.pptx"));
                assert_eq!(output_dir, PathBuf::from("out"));
                assert_eq!(slide, Some(3));
            }
            _ => panic!("expected render"),
        }
    }

    #[test]
    fn test_count_requires_paths() {
        assert!(Cli::try_parse_from(["flow-slides", "count"]).is_err());
    }
}
