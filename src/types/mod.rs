//! Core types: variables, rules, relations and layout primitives.

pub mod variable;
pub mod rule;
pub mod relation;
pub mod options;
pub mod geometry;

pub use variable::{VarId, Variable, StartVariable, VariablesSet, ModelError};
pub use rule::{LayerRule, RuleError};
pub use relation::Relation;
pub use options::{
    Rgb, LayerOptions, BackdropOptions, BackdropOption,
    DEFAULT_LAYER_COLOR, DEFAULT_FONT_SIZE, DEFAULT_MARGINS,
};
pub use geometry::{Rect, Position, Alignment};
