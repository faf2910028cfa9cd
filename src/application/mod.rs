//! Application services: rendering, sanitisation, and the export pipeline.

pub mod error;
pub mod export;
pub mod render;
