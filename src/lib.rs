//! Markdown rendering, sanitisation, and headless-browser PDF export.

pub mod application;
pub mod config;
pub mod infra;
