//! Text artifacts rendered from converted models

pub mod preview;
pub mod sql;

pub use preview::{preview, preview_detailed, Preview};
pub use sql::{render_inserts, render_schema};
