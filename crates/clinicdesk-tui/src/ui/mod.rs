//! Terminal UI module using ratatui.
//!
//! - `render`: frame layout, guard placeholders and overlays
//! - `input`: keyboard event handling per state and screen
//! - `styles`: color palette and text styling
//! - `forms`: add/edit modal rendering
//! - `tabs`: patients and appointments screens

pub mod forms;
pub mod input;
pub mod render;
pub mod styles;
pub mod tabs;
