use anyhow::Result;
use colored::Colorize;
use flow_slides::ManagerEvent;
use flow_slides::model::Song;
use std::path::{Path, PathBuf};

fn song_for(path: &Path) -> Song {
    if path.is_dir() {
        return Song::from_folder(path);
    }
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Song::new(name, path)
}

pub fn run(paths: &[PathBuf], quiet: bool) -> Result<()> {
    let songs: Vec<Song> = paths.iter().map(PathBuf::as_path).map(song_for).collect();
    for song in songs.iter().filter(|s| !s.has_slides()) {
        eprintln!("{} {}: no presentation found", "warning:".yellow().bold(), song.name);
    }

    let (mut manager, events) = super::manager_from_config()?;
    manager.scan_songs(songs);
    let total = super::wait_for(&mut manager, &events, quiet, |event| match event {
        ManagerEvent::MetadataScanFinished(total) => Some(*total),
        _ => None,
    });
    manager.shutdown();

    println!("{:<30} {:>7} {:>15}", "Song".bold(), "Slides".bold(), "Global".bold());
    for (song, offset, count) in manager.index().spans() {
        let range = match count {
            0 => "-".to_string(),
            n => format!("{}..={}", offset + 1, offset + n),
        };
        println!("{song:<30} {count:>7} {range:>15}");
    }
    println!();
    println!("{} {total} slides", "Total:".green().bold());
    Ok(())
}
