use anyhow::{Context, Result};
use colored::Colorize;
use flow_slides::ManagerEvent;
use std::path::Path;

pub fn run(file: &Path, output_dir: &Path, slide: Option<usize>, quiet: bool) -> Result<()> {
    let (mut manager, events) = super::manager_from_config()?;
    if !quiet {
        println!("{} {} with {}", "Converting".bold(), file.display(), manager.engine().name());
    }

    manager.load_deck(file)?;
    let outcome = super::wait_for(&mut manager, &events, quiet, |event| match event {
        ManagerEvent::LoadFinished(count) => Some(Ok(*count)),
        ManagerEvent::LoadError(message) => Some(Err(message.clone())),
        _ => None,
    });
    let count = match outcome {
        Ok(count) => count,
        Err(message) => {
            manager.shutdown();
            anyhow::bail!("Conversion of {} failed: {message}", file.display());
        }
    };
    if count == 0 {
        manager.shutdown();
        println!("{}", "The presentation has no slides.".yellow());
        return Ok(());
    }

    let indices: Vec<usize> = match slide {
        Some(n) if n == 0 || n > count => {
            manager.shutdown();
            anyhow::bail!("Slide {n} out of range. The presentation has {count} slides.");
        }
        Some(n) => vec![n - 1],
        None => (0..count).collect(),
    };

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    for index in indices {
        let image = manager.slide_image(index)?;
        let path = output_dir.join(format!("slide-{:03}.png", index + 1));
        image
            .save(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if !quiet {
            println!("  {} {}", "wrote".green(), path.display());
        }
    }
    manager.shutdown();

    println!(
        "{} {count} slides from {} into {}",
        "Done:".green().bold(),
        file.display(),
        output_dir.display()
    );
    Ok(())
}
