// Library exports for fieldplot

pub mod catalog;
pub mod csv_reader;
pub mod data;
pub mod dates;
pub mod error;
pub mod filter;
pub mod graph;
pub mod parser;
pub mod resolve;
pub mod runtime;
pub mod series;

// Planning, scaling and statistics
pub mod ir;
pub mod scale;
pub mod stats;
pub mod transform;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[serde(rename = "png")]
    #[default]
    Png,
    #[serde(rename = "svg")]
    Svg,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RenderOptions {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default, rename = "type")]
    pub format: OutputFormat,
}

fn default_width() -> u32 { 800 }
fn default_height() -> u32 { 600 }

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            format: OutputFormat::Png,
        }
    }
}

impl RenderOptions {
    /// Parse options from JSON, e.g. `{"width": 1024, "type": "svg"}`
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid render options")
    }

    /// Switch to SVG when the output path ends in `.svg`
    pub fn for_output(mut self, path: &Path) -> Self {
        let is_svg = path
            .extension()
            .and_then(|e| e.to_str())
            .map_or(false, |e| e.eq_ignore_ascii_case("svg"));
        if is_svg {
            self.format = OutputFormat::Svg;
        }
        self
    }
}
