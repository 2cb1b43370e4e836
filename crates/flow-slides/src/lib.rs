//! Slide conversion, caching and live staging for worship presentations.
//!
//! A [`manager::SlideManager`] owns a background worker that converts
//! presentation decks into cached slide images through whichever toolchain
//! [`convert::select::select_engine`] found on the host. Songs are laid out
//! in one [`index::SlideIndexSpace`] so the UI can address every slide of a
//! project by a single number, and [`live::LiveController`] stages those
//! slides for the display output.

pub mod config;
pub mod convert;
pub mod deck;
pub mod error;
pub mod index;
pub mod live;
pub mod manager;
pub mod model;
pub mod watch;
pub mod worker;

pub use convert::{ConverterEngine, SlideImage};
pub use error::{Result, SlideError};
pub use manager::{ManagerEvent, SlideManager};
