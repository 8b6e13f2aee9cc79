//! Typed display options for layers and backdrops.

use serde::{Deserialize, Serialize};

/// Default color of a layer without a configured color.
pub const DEFAULT_LAYER_COLOR: Rgb = Rgb(40, 90, 150);

/// Default backdrop label font size.
pub const DEFAULT_FONT_SIZE: f64 = 40.0;

/// Default backdrop margins: left, top, right, bottom.
pub const DEFAULT_MARGINS: (f64, f64, f64, f64) = (30.0, 40.0, 30.0, 30.0);

const LIGHTEN_RATIO: f64 = 0.3;
const DARKEN_RATIO: f64 = 0.3;

/// 8-bit RGB color, serialized as `[r, g, b]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Mix 30% towards white.
    pub fn lighten(&self) -> Self {
        let f = |c: u8| (c as f64 + (255.0 - c as f64) * LIGHTEN_RATIO) as u8;
        Self(f(self.0), f(self.1), f(self.2))
    }

    /// Scale 30% towards black.
    pub fn darken(&self) -> Self {
        let f = |c: u8| (c as f64 * (1.0 - DARKEN_RATIO)) as u8;
        Self(f(self.0), f(self.1), f(self.2))
    }

    /// Packed `0xRRGGBBAA` tile color with opaque alpha.
    pub fn tile_color(&self) -> u32 {
        ((self.0 as u32) << 24) | ((self.1 as u32) << 16) | ((self.2 as u32) << 8) | 0xff
    }
}

/// Per-layer options from the rule set.
///
/// Unknown keys are ignored; the rule-set loader reports them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerOptions {
    /// Display color of the layer's backdrops.
    #[serde(default)]
    pub color: Option<Rgb>,
    /// Label font size of the layer backdrop.
    #[serde(default)]
    pub font_size: Option<f64>,
    /// Left margin of the layer backdrop.
    #[serde(default)]
    pub margin_left: Option<f64>,
    /// Top margin of the layer backdrop.
    #[serde(default)]
    pub margin_top: Option<f64>,
    /// Right margin of the layer backdrop.
    #[serde(default)]
    pub margin_right: Option<f64>,
    /// Bottom margin of the layer backdrop.
    #[serde(default)]
    pub margin_bottom: Option<f64>,
}

impl LayerOptions {
    /// Keys understood in a rule-set `options` object.
    pub const FIELDS: [&'static str; 6] =
        ["color", "font_size", "margin_left", "margin_top", "margin_right", "margin_bottom"];

    /// Layer color or [`DEFAULT_LAYER_COLOR`].
    pub fn color_or_default(&self) -> Rgb {
        self.color.unwrap_or(DEFAULT_LAYER_COLOR)
    }

    /// Font size and margin overrides for the layer backdrop, in a fixed order.
    pub fn backdrop_overrides(&self) -> Vec<BackdropOption> {
        [
            self.font_size.map(BackdropOption::FontSize),
            self.margin_left.map(BackdropOption::MarginLeft),
            self.margin_top.map(BackdropOption::MarginTop),
            self.margin_right.map(BackdropOption::MarginRight),
            self.margin_bottom.map(BackdropOption::MarginBottom),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// Display options of a backdrop. Unset fields fall back to defaults.
///
/// A backdrop is *displayed* (materialized and padded by margins) only when it
/// has a color.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackdropOptions {
    /// Tile color. `None` means the group is layout-only.
    pub color: Option<Rgb>,
    /// Label font size.
    pub font_size: Option<f64>,
    /// Left margin.
    pub margin_left: Option<f64>,
    /// Top margin (the font size is added on top of it).
    pub margin_top: Option<f64>,
    /// Right margin.
    pub margin_right: Option<f64>,
    /// Bottom margin.
    pub margin_bottom: Option<f64>,
}

impl BackdropOptions {
    /// Whether the backdrop is drawn.
    pub fn is_displayed(&self) -> bool {
        self.color.is_some()
    }

    /// Effective font size.
    pub fn font_size(&self) -> f64 {
        self.font_size.unwrap_or(DEFAULT_FONT_SIZE)
    }

    /// Effective margins: left, top, right, bottom.
    pub fn margins(&self) -> (f64, f64, f64, f64) {
        (
            self.margin_left.unwrap_or(DEFAULT_MARGINS.0),
            self.margin_top.unwrap_or(DEFAULT_MARGINS.1),
            self.margin_right.unwrap_or(DEFAULT_MARGINS.2),
            self.margin_bottom.unwrap_or(DEFAULT_MARGINS.3),
        )
    }

    /// Apply one option, overwriting any previous value.
    pub fn apply(&mut self, option: BackdropOption) {
        match option {
            BackdropOption::Color(c) => self.color = Some(c),
            BackdropOption::FontSize(v) => self.font_size = Some(v),
            BackdropOption::MarginLeft(v) => self.margin_left = Some(v),
            BackdropOption::MarginTop(v) => self.margin_top = Some(v),
            BackdropOption::MarginRight(v) => self.margin_right = Some(v),
            BackdropOption::MarginBottom(v) => self.margin_bottom = Some(v),
        }
    }
}

/// A single backdrop option assignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackdropOption {
    /// Tile color (makes the backdrop displayed).
    Color(Rgb),
    /// Label font size.
    FontSize(f64),
    /// Left margin.
    MarginLeft(f64),
    /// Top margin.
    MarginTop(f64),
    /// Right margin.
    MarginRight(f64),
    /// Bottom margin.
    MarginBottom(f64),
}
