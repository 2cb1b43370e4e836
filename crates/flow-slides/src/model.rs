//! Songs, score sheets and the hotspots placed on them.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Layer holding the chorus mapping. Verses use layers 0..CHORUS_LAYER.
pub const CHORUS_LAYER: usize = 5;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str) -> String {
    format!("{prefix}-{}", NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

/// A clickable region on a score sheet bound to lyric text and slides.
#[derive(Debug, Clone, PartialEq)]
pub struct Hotspot {
    pub id: String,
    pub x: i32,
    pub y: i32,
    pub order: usize,
    pub lyric: String,
    /// Default mapping, used for verse 1 when no layer mapping exists.
    pub slide_index: Option<usize>,
    /// Layer (verse) → slide index.
    pub slide_mappings: BTreeMap<usize, usize>,
}

impl Hotspot {
    pub fn new(x: i32, y: i32) -> Self {
        Self {
            id: next_id("hotspot"),
            x,
            y,
            order: 0,
            lyric: String::new(),
            slide_index: None,
            slide_mappings: BTreeMap::new(),
        }
    }

    pub fn with_lyric(mut self, lyric: impl Into<String>) -> Self {
        self.lyric = lyric.into();
        self
    }

    /// Slide mapped to `layer`. Verse 1 (layer 0) falls back to the default
    /// mapping.
    pub fn slide_for_layer(&self, layer: usize) -> Option<usize> {
        match self.slide_mappings.get(&layer) {
            Some(&index) => Some(index),
            None if layer == 0 => self.slide_index,
            None => None,
        }
    }

    pub fn set_slide(&mut self, layer: usize, index: usize) {
        self.slide_mappings.insert(layer, index);
        if layer == 0 {
            self.slide_index = Some(index);
        }
    }

    /// Slide to show while `verse` is active, falling back to the chorus.
    pub fn resolve_slide(&self, verse: usize) -> Option<usize> {
        self.slide_for_layer(verse)
            .or_else(|| self.slide_for_layer(CHORUS_LAYER))
    }
}

/// One page of sheet music with its hotspots.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSheet {
    pub id: String,
    pub name: String,
    pub image_path: Option<PathBuf>,
    pub hotspots: Vec<Hotspot>,
}

impl ScoreSheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: next_id("sheet"),
            name: name.into(),
            image_path: None,
            hotspots: Vec::new(),
        }
    }

    /// Append `hotspot`, or insert it at order `at` shifting later ones back.
    pub fn add_hotspot(&mut self, mut hotspot: Hotspot, at: Option<usize>) {
        match at {
            None => hotspot.order = self.hotspots.len(),
            Some(order) => {
                for h in &mut self.hotspots {
                    if h.order >= order {
                        h.order += 1;
                    }
                }
                hotspot.order = order;
            }
        }
        self.hotspots.push(hotspot);
    }

    /// Remove by id and close the gap in the ordering.
    pub fn remove_hotspot(&mut self, id: &str) -> Option<Hotspot> {
        let pos = self.hotspots.iter().position(|h| h.id == id)?;
        let removed = self.hotspots.remove(pos);
        for h in &mut self.hotspots {
            if h.order > removed.order {
                h.order -= 1;
            }
        }
        Some(removed)
    }

    pub fn find_hotspot(&self, id: &str) -> Option<&Hotspot> {
        self.hotspots.iter().find(|h| h.id == id)
    }

    pub fn find_hotspot_mut(&mut self, id: &str) -> Option<&mut Hotspot> {
        self.hotspots.iter_mut().find(|h| h.id == id)
    }

    pub fn ordered_hotspots(&self) -> Vec<&Hotspot> {
        let mut ordered: Vec<&Hotspot> = self.hotspots.iter().collect();
        ordered.sort_by_key(|h| h.order);
        ordered
    }

    pub fn next_hotspot(&self, id: &str) -> Option<&Hotspot> {
        let ordered = self.ordered_hotspots();
        let pos = ordered.iter().position(|h| h.id == id)?;
        ordered.get(pos + 1).copied()
    }

    pub fn previous_hotspot(&self, id: &str) -> Option<&Hotspot> {
        let ordered = self.ordered_hotspots();
        let pos = ordered.iter().position(|h| h.id == id)?;
        pos.checked_sub(1).map(|p| ordered[p])
    }
}

/// A song in the service order, optionally backed by a slide deck.
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    pub name: String,
    deck: Option<PathBuf>,
    slide_count: usize,
}

impl Song {
    pub fn new(name: impl Into<String>, deck: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            deck: Some(deck.into()),
            slide_count: 0,
        }
    }

    pub fn without_deck(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            deck: None,
            slide_count: 0,
        }
    }

    /// `<folder>/slides.pptx`, the layout songs are stored in.
    pub fn from_folder(folder: &Path) -> Self {
        let name = folder
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::new(name, folder.join("slides.pptx"))
    }

    pub fn deck(&self) -> Option<&Path> {
        self.deck.as_deref()
    }

    /// Absolute deck path, when the deck exists.
    pub fn resolved_deck(&self) -> Option<PathBuf> {
        self.deck.as_ref()?.canonicalize().ok()
    }

    pub fn has_slides(&self) -> bool {
        self.deck.as_ref().is_some_and(|p| p.is_file())
    }

    pub fn slide_count(&self) -> usize {
        self.slide_count
    }

    pub fn set_slide_count(&mut self, count: usize) {
        self.slide_count = count;
    }
}

/// A worship service: ordered sheets plus the operator's position in them.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub name: String,
    pub sheets: Vec<ScoreSheet>,
    pub current_sheet: usize,
    /// Active layer: 0..CHORUS_LAYER for verses, CHORUS_LAYER for the chorus.
    pub current_verse: usize,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sheets: Vec::new(),
            current_sheet: 0,
            current_verse: 0,
        }
    }

    pub fn add_sheet(&mut self, sheet: ScoreSheet) {
        self.sheets.push(sheet);
    }

    pub fn remove_sheet(&mut self, id: &str) -> Option<ScoreSheet> {
        let pos = self.sheets.iter().position(|s| s.id == id)?;
        let removed = self.sheets.remove(pos);
        if self.current_sheet >= self.sheets.len() {
            self.current_sheet = self.sheets.len().saturating_sub(1);
        }
        Some(removed)
    }

    pub fn move_sheet(&mut self, id: &str, to: usize) -> bool {
        let Some(pos) = self.sheets.iter().position(|s| s.id == id) else {
            return false;
        };
        let sheet = self.sheets.remove(pos);
        let to = to.min(self.sheets.len());
        self.sheets.insert(to, sheet);
        true
    }

    pub fn current_sheet(&self) -> Option<&ScoreSheet> {
        self.sheets.get(self.current_sheet)
    }

    pub fn current_sheet_mut(&mut self) -> Option<&mut ScoreSheet> {
        self.sheets.get_mut(self.current_sheet)
    }

    pub fn next_sheet(&mut self) -> bool {
        if self.current_sheet + 1 < self.sheets.len() {
            self.current_sheet += 1;
            true
        } else {
            false
        }
    }

    pub fn previous_sheet(&mut self) -> bool {
        if self.current_sheet > 0 {
            self.current_sheet -= 1;
            true
        } else {
            false
        }
    }
}
