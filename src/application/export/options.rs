use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PdfOptionsError {
    #[error("invalid length `{value}`: {reason}")]
    InvalidLength { value: String, reason: &'static str },
    #[error("unknown page format `{0}`")]
    UnknownFormat(String),
}

/// Paper sizes supported by the export surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PdfFormat {
    #[default]
    A4,
    Letter,
    Legal,
}

impl PdfFormat {
    /// Paper width and height in inches.
    pub fn dimensions_in(self) -> (f64, f64) {
        match self {
            PdfFormat::A4 => (8.27, 11.69),
            PdfFormat::Letter => (8.5, 11.0),
            PdfFormat::Legal => (8.5, 14.0),
        }
    }
}

impl FromStr for PdfFormat {
    type Err = PdfOptionsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "a4" => Ok(PdfFormat::A4),
            "letter" => Ok(PdfFormat::Letter),
            "legal" => Ok(PdfFormat::Legal),
            _ => Err(PdfOptionsError::UnknownFormat(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthUnit {
    Millimetres,
    Centimetres,
    Inches,
    Pixels,
    Points,
}

impl LengthUnit {
    fn suffix(self) -> &'static str {
        match self {
            LengthUnit::Millimetres => "mm",
            LengthUnit::Centimetres => "cm",
            LengthUnit::Inches => "in",
            LengthUnit::Pixels => "px",
            LengthUnit::Points => "pt",
        }
    }

    fn per_inch(self) -> f64 {
        match self {
            LengthUnit::Millimetres => 25.4,
            LengthUnit::Centimetres => 2.54,
            LengthUnit::Inches => 1.0,
            LengthUnit::Pixels => 96.0,
            LengthUnit::Points => 72.0,
        }
    }
}

/// A CSS absolute length as accepted in margin options (`20mm`, `0.5in`).
/// A bare number is read as CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CssLength {
    value: f64,
    unit: LengthUnit,
}

impl CssLength {
    pub fn new(value: f64, unit: LengthUnit) -> Self {
        Self { value, unit }
    }

    pub fn to_inches(self) -> f64 {
        self.value / self.unit.per_inch()
    }
}

impl FromStr for CssLength {
    type Err = PdfOptionsError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim().to_ascii_lowercase();
        let invalid = |reason| PdfOptionsError::InvalidLength {
            value: raw.to_string(),
            reason,
        };

        if trimmed.is_empty() {
            return Err(invalid("length must not be empty"));
        }

        let split = trimmed
            .find(|c: char| c.is_ascii_alphabetic())
            .unwrap_or(trimmed.len());
        let (number, unit) = trimmed.split_at(split);

        let unit = match unit {
            "" | "px" => LengthUnit::Pixels,
            "mm" => LengthUnit::Millimetres,
            "cm" => LengthUnit::Centimetres,
            "in" => LengthUnit::Inches,
            "pt" => LengthUnit::Points,
            _ => return Err(invalid("unit must be one of mm, cm, in, px, pt")),
        };

        let value: f64 = number
            .trim()
            .parse()
            .map_err(|_| invalid("not a number"))?;
        if !value.is_finite() || value < 0.0 {
            return Err(invalid("length must be a non-negative number"));
        }

        Ok(Self { value, unit })
    }
}

impl TryFrom<String> for CssLength {
    type Error = PdfOptionsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CssLength> for String {
    fn from(length: CssLength) -> Self {
        length.to_string()
    }
}

impl fmt::Display for CssLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.suffix())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageMargin {
    pub top: CssLength,
    pub right: CssLength,
    pub bottom: CssLength,
    pub left: CssLength,
}

impl PageMargin {
    pub fn uniform(length: CssLength) -> Self {
        Self {
            top: length,
            right: length,
            bottom: length,
            left: length,
        }
    }
}

impl Default for PageMargin {
    fn default() -> Self {
        Self::uniform(default_margin())
    }
}

/// Fully resolved print settings handed to the capture backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PdfOptions {
    pub format: PdfFormat,
    pub margin: PageMargin,
    pub display_header_footer: bool,
    pub header_template: Option<String>,
    pub footer_template: Option<String>,
    pub print_background: bool,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            format: PdfFormat::A4,
            margin: PageMargin::default(),
            display_header_footer: false,
            header_template: None,
            footer_template: None,
            print_background: true,
        }
    }
}

impl PdfOptions {
    /// Apply caller-supplied fields over these options, keeping anything the
    /// caller left unset.
    pub fn merged_with(&self, overrides: &PdfOptionsOverride) -> PdfOptions {
        let mut merged = self.clone();
        if let Some(format) = overrides.format {
            merged.format = format;
        }
        if let Some(margin) = overrides.margin.as_ref() {
            merged.margin = PageMargin {
                top: margin.top.unwrap_or(merged.margin.top),
                right: margin.right.unwrap_or(merged.margin.right),
                bottom: margin.bottom.unwrap_or(merged.margin.bottom),
                left: margin.left.unwrap_or(merged.margin.left),
            };
        }
        if let Some(display) = overrides.display_header_footer {
            merged.display_header_footer = display;
        }
        if let Some(template) = overrides.header_template.as_ref() {
            merged.header_template = Some(template.clone());
        }
        if let Some(template) = overrides.footer_template.as_ref() {
            merged.footer_template = Some(template.clone());
        }
        if let Some(background) = overrides.print_background {
            merged.print_background = background;
        }
        merged
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MarginOverride {
    pub top: Option<CssLength>,
    pub right: Option<CssLength>,
    pub bottom: Option<CssLength>,
    pub left: Option<CssLength>,
}

/// Partial print settings as accepted from callers.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PdfOptionsOverride {
    pub format: Option<PdfFormat>,
    pub margin: Option<MarginOverride>,
    pub display_header_footer: Option<bool>,
    pub header_template: Option<String>,
    pub footer_template: Option<String>,
    pub print_background: Option<bool>,
}

pub(crate) fn default_margin() -> CssLength {
    CssLength::new(20.0, LengthUnit::Millimetres)
}
