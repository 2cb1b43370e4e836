//! Two-stage preview → live staging for the display output.
use std::sync::mpsc::Sender;

use tracing::{debug, warn};

use crate::convert::SlideImage;
use crate::error::Result;
use crate::model::{Hotspot, Project};

/// Anything that can produce the image of a global slide index.
pub trait SlideSource {
    fn slide_image(&self, global: usize) -> Result<SlideImage>;
}

/// What a stage currently shows.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum StageBinding {
    #[default]
    Empty,
    Hotspot(Hotspot),
    Slide(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    PreviewChanged(String),
    LiveChanged(String),
    /// Image for the display, or `None` to blank it.
    SlideChanged(Option<SlideImage>),
}

pub struct LiveController {
    preview: StageBinding,
    live: StageBinding,
    events: Sender<LiveEvent>,
}

impl LiveController {
    pub fn new(events: Sender<LiveEvent>) -> Self {
        Self {
            preview: StageBinding::Empty,
            live: StageBinding::Empty,
            events,
        }
    }

    pub fn preview(&self) -> &StageBinding {
        &self.preview
    }

    pub fn live(&self) -> &StageBinding {
        &self.live
    }

    /// Forget both stages, e.g. when another project is opened.
    pub fn reset(&mut self) {
        self.preview = StageBinding::Empty;
        self.live = StageBinding::Empty;
    }

    fn emit(&self, event: LiveEvent) {
        let _ = self.events.send(event);
    }

    pub fn set_preview(&mut self, hotspot: &Hotspot) {
        self.preview = StageBinding::Hotspot(hotspot.clone());
        self.emit(LiveEvent::PreviewChanged(hotspot.lyric.clone()));
    }

    pub fn set_preview_slide(&mut self, index: usize) {
        self.preview = StageBinding::Slide(index);
        self.emit(LiveEvent::PreviewChanged(format!("Slide {} (Direct)", index + 1)));
    }

    /// Copy the preview to live and publish it. Returns the slide index that
    /// was put on the display, if any. An empty preview leaves live untouched.
    pub fn send_to_live(&mut self, project: Option<&Project>, slides: &dyn SlideSource) -> Option<usize> {
        if self.preview == StageBinding::Empty {
            debug!("nothing in preview");
            return None;
        }
        self.live = self.preview.clone();
        self.publish_live(project, slides)
    }

    pub fn clear_live(&mut self) {
        self.live = StageBinding::Empty;
        self.emit(LiveEvent::LiveChanged(String::new()));
        self.emit(LiveEvent::SlideChanged(None));
    }

    /// Publish the live stage again without changing it, for a display
    /// window that was just opened.
    pub fn sync_live(&self, project: Option<&Project>, slides: &dyn SlideSource) -> Option<usize> {
        self.publish_live(project, slides)
    }

    fn publish_live(&self, project: Option<&Project>, slides: &dyn SlideSource) -> Option<usize> {
        match &self.live {
            StageBinding::Empty => {
                self.emit(LiveEvent::LiveChanged(String::new()));
                self.emit(LiveEvent::SlideChanged(None));
                None
            }
            StageBinding::Hotspot(hotspot) => {
                self.emit(LiveEvent::LiveChanged(hotspot.lyric.clone()));
                let verse = project.map_or(0, |p| p.current_verse);
                self.publish_slide(hotspot.resolve_slide(verse), slides)
            }
            StageBinding::Slide(index) => {
                self.emit(LiveEvent::LiveChanged(format!("Slide {}", index + 1)));
                self.publish_slide(Some(*index), slides)
            }
        }
    }

    fn publish_slide(&self, index: Option<usize>, slides: &dyn SlideSource) -> Option<usize> {
        let Some(index) = index else {
            self.emit(LiveEvent::SlideChanged(None));
            return None;
        };
        match slides.slide_image(index) {
            Ok(image) => {
                self.emit(LiveEvent::SlideChanged(Some(image)));
                Some(index)
            }
            Err(err) => {
                warn!(index, "cannot show slide: {err}");
                self.emit(LiveEvent::SlideChanged(None));
                None
            }
        }
    }

    /// Move the preview to the next hotspot of the current sheet, or to the
    /// first one when no hotspot is in preview.
    pub fn next_hotspot(&mut self, project: &Project) -> Option<Hotspot> {
        let sheet = project.current_sheet()?;
        let next = match &self.preview {
            StageBinding::Hotspot(current) => sheet.next_hotspot(&current.id)?,
            _ => *sheet.ordered_hotspots().first()?,
        }
        .clone();
        self.set_preview(&next);
        Some(next)
    }

    pub fn previous_hotspot(&mut self, project: &Project) -> Option<Hotspot> {
        let StageBinding::Hotspot(current) = &self.preview else {
            return None;
        };
        let previous = project
            .current_sheet()?
            .previous_hotspot(&current.id)?
            .clone();
        self.set_preview(&previous);
        Some(previous)
    }
}
