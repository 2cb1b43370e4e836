//! Flat slide numbering across the decks of several songs.
use crate::error::{Result, SlideError};
use crate::model::Song;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Span {
    song: String,
    offset: usize,
    count: usize,
}

/// Maps a global slide index over the concatenated decks of the active songs
/// to `(song, local index)` and back.
///
/// Songs without a deck on disk take no space. With duplicate song names the
/// first one wins.
#[derive(Debug, Clone, Default)]
pub struct SlideIndexSpace {
    spans: Vec<Span>,
    total: usize,
}

impl SlideIndexSpace {
    pub fn new(songs: &[Song]) -> Self {
        let mut space = Self::default();
        space.recompute(songs);
        space
    }

    /// Rebuild the offsets from the current song list and slide counts.
    pub fn recompute(&mut self, songs: &[Song]) {
        self.spans.clear();
        let mut offset = 0;
        for song in songs.iter().filter(|s| s.has_slides()) {
            let count = song.slide_count();
            self.spans.push(Span {
                song: song.name.clone(),
                offset,
                count,
            });
            offset += count;
        }
        self.total = offset;
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    fn span(&self, song: &str) -> Result<&Span> {
        self.spans
            .iter()
            .find(|s| s.song == song)
            .ok_or_else(|| SlideError::SongNotFound(song.to_string()))
    }

    pub fn offset_of(&self, song: &str) -> Result<usize> {
        self.span(song).map(|s| s.offset)
    }

    pub fn global_to_local(&self, global: usize) -> Result<(&str, usize)> {
        if global >= self.total {
            return Err(SlideError::InvalidIndex(global));
        }
        // Spans are sorted by offset; the last one starting at or before
        // `global` holds it unless it is empty.
        let pos = self.spans.partition_point(|s| s.offset <= global);
        let span = pos
            .checked_sub(1)
            .map(|p| &self.spans[p])
            .filter(|s| global < s.offset + s.count)
            .ok_or(SlideError::InvalidIndex(global))?;
        Ok((span.song.as_str(), global - span.offset))
    }

    pub fn local_to_global(&self, song: &str, local: usize) -> Result<usize> {
        let span = self.span(song)?;
        if local >= span.count {
            return Err(SlideError::InvalidIndex(local));
        }
        Ok(span.offset + local)
    }

    /// `(song, offset, count)` for every song that occupies the space.
    pub fn spans(&self) -> impl Iterator<Item = (&str, usize, usize)> {
        self.spans
            .iter()
            .map(|s| (s.song.as_str(), s.offset, s.count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn song(dir: &Path, name: &str, count: usize) -> Song {
        let deck = dir.join(format!("{name}.pptx"));
        std::fs::write(&deck, "x").unwrap();
        let mut song = Song::new(name, deck);
        song.set_slide_count(count);
        song
    }

    #[test]
    fn test_offsets_and_lookup() {
        let tmp = tempfile::tempdir().unwrap();
        let space = SlideIndexSpace::new(&[song(tmp.path(), "A", 3), song(tmp.path(), "B", 2)]);

        assert_eq!(space.offset_of("A").unwrap(), 0);
        assert_eq!(space.offset_of("B").unwrap(), 3);
        assert_eq!(space.total(), 5);
        assert_eq!(space.global_to_local(4).unwrap(), ("B", 1));
        assert_eq!(space.global_to_local(2).unwrap(), ("A", 2));
    }

    #[test]
    fn test_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let songs = [
            song(tmp.path(), "A", 3),
            song(tmp.path(), "Empty", 0),
            song(tmp.path(), "B", 2),
            song(tmp.path(), "C", 4),
        ];
        let space = SlideIndexSpace::new(&songs);
        for s in &songs {
            for local in 0..s.slide_count() {
                let global = space.local_to_global(&s.name, local).unwrap();
                assert_eq!(space.global_to_local(global).unwrap(), (s.name.as_str(), local));
            }
        }
        for global in 0..space.total() {
            let (name, local) = space.global_to_local(global).unwrap();
            assert_eq!(space.local_to_global(name, local).unwrap(), global);
        }
    }

    #[test]
    fn test_out_of_range_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let space = SlideIndexSpace::new(&[song(tmp.path(), "A", 3), song(tmp.path(), "B", 2)]);
        for global in [5, 6, usize::MAX] {
            assert!(matches!(
                space.global_to_local(global),
                Err(SlideError::InvalidIndex(g)) if g == global
            ));
        }
        assert!(space.local_to_global("A", 3).is_err());
        assert!(matches!(
            space.local_to_global("Missing", 0),
            Err(SlideError::SongNotFound(_))
        ));
    }

    #[test]
    fn test_songs_without_deck_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ghost = Song::new("Ghost", tmp.path().join("ghost.pptx"));
        ghost.set_slide_count(4);
        let space = SlideIndexSpace::new(&[ghost, song(tmp.path(), "A", 2)]);
        assert_eq!(space.total(), 2);
        assert!(space.offset_of("Ghost").is_err());
        assert_eq!(space.global_to_local(0).unwrap(), ("A", 0));
    }

    #[test]
    fn test_recompute_after_count_change() {
        let tmp = tempfile::tempdir().unwrap();
        let mut songs = vec![song(tmp.path(), "A", 3), song(tmp.path(), "B", 2)];
        let mut space = SlideIndexSpace::new(&songs);
        songs[0].set_slide_count(1);
        space.recompute(&songs);
        assert_eq!(space.offset_of("B").unwrap(), 1);
        assert_eq!(space.total(), 3);
    }

    #[test]
    fn test_empty_space() {
        let space = SlideIndexSpace::default();
        assert!(space.is_empty());
        assert!(space.global_to_local(0).is_err());
    }
}
