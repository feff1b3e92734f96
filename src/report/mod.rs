//! Report rendering.

pub mod generator;

pub use generator::{generate_json_report, render_full_report, render_inline, write_output};
