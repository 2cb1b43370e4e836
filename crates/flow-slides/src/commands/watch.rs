use anyhow::Result;
use colored::Colorize;
use flow_slides::ManagerEvent;
use std::path::Path;

pub fn run(file: &Path, quiet: bool) -> Result<()> {
    let (mut manager, events) = super::manager_from_config()?;
    manager.load_deck(file)?;
    manager.start_watching(file)?;
    println!(
        "{} {} {}",
        "Watching".bold(),
        file.display(),
        "(Ctrl+C to stop)".dimmed()
    );

    loop {
        super::wait_for(&mut manager, &events, quiet, |event| match event {
            ManagerEvent::LoadFinished(count) => {
                println!("{} {count} slides", "Ready:".green().bold());
                None
            }
            ManagerEvent::FileChanged(_) => Some(()),
            _ => None,
        });
        // The cached images belong to the old contents.
        manager.reload_all()?;
    }
}
