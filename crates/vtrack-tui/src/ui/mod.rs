//! Terminal UI module using ratatui.
//!
//! - `render`: frame layout and overlays (login, idle warning, quit)
//! - `input`: terminal event handling, including activity reporting
//! - `styles`: color scheme and text styling

pub mod input;
pub mod render;
pub mod styles;
