// Darkens or fully occludes selected monitors while one stays usable.
//
// The platform-neutral core (state machine, configuration, event queue,
// game-mode edge detection) builds everywhere; the Win32 overlay, hook and
// tray layer lives in `platform` and only on Windows.

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod game_mode;
pub mod hotkey;
pub mod monitor;
pub mod surface;

#[cfg(windows)]
pub mod platform;

pub use controller::{BlackoutController, BlackoutState};
pub use error::{BlackoutError, Result};
