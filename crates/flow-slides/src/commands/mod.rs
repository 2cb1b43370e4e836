pub mod cache;
pub mod completion;
pub mod config;
pub mod count;
pub mod probe;
pub mod render;
pub mod watch;

use anyhow::Result;
use colored::Colorize;
use flow_slides::config::Config;
use flow_slides::convert::select::select_engine;
use flow_slides::{ConverterEngine, ManagerEvent, SlideManager};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Probe the host with the user's configuration and build the engine.
pub fn engine_from_config() -> Arc<dyn ConverterEngine> {
    let config = Config::load_or_default();
    select_engine(&config.selector_options())
}

pub fn manager_from_config() -> Result<(SlideManager, Receiver<ManagerEvent>)> {
    let (tx, rx) = mpsc::channel();
    let manager = SlideManager::new(engine_from_config(), tx)?;
    Ok((manager, rx))
}

/// Print one manager event the way every command reports progress.
pub fn report(event: &ManagerEvent, quiet: bool) {
    match event {
        ManagerEvent::LoadError(message) => eprintln!("{} {message}", "warning:".yellow().bold()),
        _ if quiet => {}
        ManagerEvent::LoadProgress {
            current,
            total,
            engine,
        } => println!("  {}", format!("[{current}/{total}] {engine}").dimmed()),
        ManagerEvent::LoadStatus(message) => println!("  {}", message.dimmed()),
        ManagerEvent::FileChanged(path) => {
            println!("{} {}", "Changed:".cyan(), path.display());
        }
        _ => {}
    }
}

/// Pump the manager until `done` picks an event, reporting everything seen
/// on the way. Returns the value `done` produced.
pub fn wait_for<T>(
    manager: &mut SlideManager,
    events: &Receiver<ManagerEvent>,
    quiet: bool,
    mut done: impl FnMut(&ManagerEvent) -> Option<T>,
) -> T {
    loop {
        manager.wait_events(POLL_INTERVAL);
        for event in events.try_iter() {
            report(&event, quiet);
            if let Some(value) = done(&event) {
                return value;
            }
        }
    }
}
