//! # wand_caster
//!
//! Gesture spell-casting trainer.  The index fingertip traces a spell path;
//! completing every checkpoint casts the spell, which erupts as a particle
//! burst and rings a MIDI chime.  A teaching mode walks each spell through
//! demonstration, practice and an exam before unlocking the next.
//!
//! ## Data flow
//!
//! ```text
//!  perception thread(s) ──InputEvent──▶ AppState ──CastEvent──▶ CastBus
//!                                         │                      ├─▶ BurstSimulator
//!                                         │                      ├─▶ Tutor
//!                                         │                      └─▶ chime thread
//!                                         └──FrameView──▶ Visualizer
//! ```
//!
//! ## Feature flags
//!
//! * (default): **Simulation mode**: hold the left mouse button to trace.
//! * `leap`: **Hardware mode**: a LeapMotion controller supplies the hand
//!   landmarks via LeapC.
//!
//! ### Keyboard
//!
//! | Key | Action |
//! |---|---|
//! | `1`–`8` | Select spell |
//! | `Left` / `Right` | Previous / next spell |
//! | `Tab` | Toggle teaching / free play |
//! | `Enter` | Begin lesson, or leave the demonstration |
//! | `C` | Cast the selected spell without tracing |
//! | `M` | Force mastery of the current spell |
//! | `Q` / `Escape` | Quit |

use thiserror::Error;

pub mod app;
pub mod bus;
pub mod chime;
pub mod config;
pub mod perception;
pub mod visualizer;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error("spell path rejected: {0}")]
    Path(#[from] spell_paths::PathError),
    #[error("window: {0}")]
    Window(String),
}
