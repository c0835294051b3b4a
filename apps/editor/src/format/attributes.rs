//! Formatting attributes: closed value sets plus the partial per-field attribute record.
//!
//! Font family, size, alignment, letter-spacing and line-height are closed enums so the
//! toolbar, the overlay and the measurement surface always agree on the same finite
//! set of values. Booleans (bold/italic/underline) toggle; everything else is set.

use serde::{Deserialize, Serialize};

pub use crate::layout::font_metrics::FontFamily;

// ────────────────────────────────────────────────────────────────────────────
// Closed value sets
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontSize {
    Xs,
    Sm,
    Base,
    Lg,
    Xl,
}

impl FontSize {
    pub fn points(self) -> f32 {
        match self {
            FontSize::Xs => 9.0,
            FontSize::Sm => 10.0,
            FontSize::Base => 11.0,
            FontSize::Lg => 12.0,
            FontSize::Xl => 14.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    Left,
    Center,
    Right,
    Justify,
}

impl Alignment {
    pub fn css(self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
            Alignment::Justify => "justify",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LetterSpacing {
    Tight,
    Normal,
    Wide,
    Wider,
}

impl LetterSpacing {
    /// Extra advance per character, in em.
    pub fn em(self) -> f32 {
        match self {
            LetterSpacing::Tight => -0.02,
            LetterSpacing::Normal => 0.0,
            LetterSpacing::Wide => 0.05,
            LetterSpacing::Wider => 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineHeight {
    Tight,
    Normal,
    Relaxed,
    Loose,
}

impl LineHeight {
    /// Line box height as a multiple of the font size.
    pub fn factor(self) -> f32 {
        match self {
            LineHeight::Tight => 1.15,
            LineHeight::Normal => 1.3,
            LineHeight::Relaxed => 1.5,
            LineHeight::Loose => 1.8,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Attribute names and values
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatAttribute {
    Bold,
    Italic,
    Underline,
    FontFamily,
    FontSize,
    Alignment,
    LetterSpacing,
    LineHeight,
}

impl FormatAttribute {
    pub fn as_str(self) -> &'static str {
        match self {
            FormatAttribute::Bold => "bold",
            FormatAttribute::Italic => "italic",
            FormatAttribute::Underline => "underline",
            FormatAttribute::FontFamily => "font_family",
            FormatAttribute::FontSize => "font_size",
            FormatAttribute::Alignment => "alignment",
            FormatAttribute::LetterSpacing => "letter_spacing",
            FormatAttribute::LineHeight => "line_height",
        }
    }

    pub fn is_boolean(self) -> bool {
        matches!(
            self,
            FormatAttribute::Bold | FormatAttribute::Italic | FormatAttribute::Underline
        )
    }
}

/// A concrete attribute value as persisted in the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "attribute", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    Bold(bool),
    Italic(bool),
    Underline(bool),
    FontFamily(FontFamily),
    FontSize(FontSize),
    Alignment(Alignment),
    LetterSpacing(LetterSpacing),
    LineHeight(LineHeight),
}

impl AttributeValue {
    pub fn attribute(&self) -> FormatAttribute {
        match self {
            AttributeValue::Bold(_) => FormatAttribute::Bold,
            AttributeValue::Italic(_) => FormatAttribute::Italic,
            AttributeValue::Underline(_) => FormatAttribute::Underline,
            AttributeValue::FontFamily(_) => FormatAttribute::FontFamily,
            AttributeValue::FontSize(_) => FormatAttribute::FontSize,
            AttributeValue::Alignment(_) => FormatAttribute::Alignment,
            AttributeValue::LetterSpacing(_) => FormatAttribute::LetterSpacing,
            AttributeValue::LineHeight(_) => FormatAttribute::LineHeight,
        }
    }

    /// Inline CSS equivalent, used for styled-span marks.
    pub fn css(&self) -> String {
        match self {
            AttributeValue::Bold(on) => {
                format!("font-weight: {}", if *on { "bold" } else { "normal" })
            }
            AttributeValue::Italic(on) => {
                format!("font-style: {}", if *on { "italic" } else { "normal" })
            }
            AttributeValue::Underline(on) => {
                format!("text-decoration: {}", if *on { "underline" } else { "none" })
            }
            AttributeValue::FontFamily(family) => format!("font-family: {}", family.css_name()),
            AttributeValue::FontSize(size) => format!("font-size: {}pt", size.points()),
            AttributeValue::Alignment(align) => format!("text-align: {}", align.css()),
            AttributeValue::LetterSpacing(spacing) => {
                format!("letter-spacing: {}em", spacing.em())
            }
            AttributeValue::LineHeight(height) => format!("line-height: {}", height.factor()),
        }
    }
}

/// A toolbar action. Boolean attributes toggle against the field's current effective
/// value; the rest carry the chosen member of their closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "attribute", content = "value", rename_all = "snake_case")]
pub enum FormatCommand {
    Bold,
    Italic,
    Underline,
    FontFamily(FontFamily),
    FontSize(FontSize),
    Alignment(Alignment),
    LetterSpacing(LetterSpacing),
    LineHeight(LineHeight),
}

impl FormatCommand {
    pub fn attribute(&self) -> FormatAttribute {
        match self {
            FormatCommand::Bold => FormatAttribute::Bold,
            FormatCommand::Italic => FormatAttribute::Italic,
            FormatCommand::Underline => FormatAttribute::Underline,
            FormatCommand::FontFamily(_) => FormatAttribute::FontFamily,
            FormatCommand::FontSize(_) => FormatAttribute::FontSize,
            FormatCommand::Alignment(_) => FormatAttribute::Alignment,
            FormatCommand::LetterSpacing(_) => FormatAttribute::LetterSpacing,
            FormatCommand::LineHeight(_) => FormatAttribute::LineHeight,
        }
    }

    pub fn is_toggle(&self) -> bool {
        self.attribute().is_boolean()
    }

    /// Resolves the command into the value to persist, given the field's current
    /// effective attributes.
    pub fn resolve(&self, effective: &FormatAttributes) -> AttributeValue {
        match *self {
            FormatCommand::Bold => AttributeValue::Bold(!effective.bold.unwrap_or(false)),
            FormatCommand::Italic => AttributeValue::Italic(!effective.italic.unwrap_or(false)),
            FormatCommand::Underline => {
                AttributeValue::Underline(!effective.underline.unwrap_or(false))
            }
            FormatCommand::FontFamily(v) => AttributeValue::FontFamily(v),
            FormatCommand::FontSize(v) => AttributeValue::FontSize(v),
            FormatCommand::Alignment(v) => AttributeValue::Alignment(v),
            FormatCommand::LetterSpacing(v) => AttributeValue::LetterSpacing(v),
            FormatCommand::LineHeight(v) => AttributeValue::LineHeight(v),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Partial attribute record
// ────────────────────────────────────────────────────────────────────────────

/// Partial formatting. Unset attributes fall back to the document default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underline: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<FontFamily>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<FontSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<Alignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub letter_spacing: Option<LetterSpacing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_height: Option<LineHeight>,
}

impl FormatAttributes {
    /// The document-wide default style: every attribute set.
    pub fn document_default() -> Self {
        Self {
            bold: Some(false),
            italic: Some(false),
            underline: Some(false),
            font_family: Some(FontFamily::Inter),
            font_size: Some(FontSize::Base),
            alignment: Some(Alignment::Left),
            letter_spacing: Some(LetterSpacing::Normal),
            line_height: Some(LineHeight::Normal),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn set(&mut self, value: AttributeValue) {
        match value {
            AttributeValue::Bold(v) => self.bold = Some(v),
            AttributeValue::Italic(v) => self.italic = Some(v),
            AttributeValue::Underline(v) => self.underline = Some(v),
            AttributeValue::FontFamily(v) => self.font_family = Some(v),
            AttributeValue::FontSize(v) => self.font_size = Some(v),
            AttributeValue::Alignment(v) => self.alignment = Some(v),
            AttributeValue::LetterSpacing(v) => self.letter_spacing = Some(v),
            AttributeValue::LineHeight(v) => self.line_height = Some(v),
        }
    }

    /// Layers `over` on top of `self`, attribute by attribute.
    pub fn merged_with(&self, over: &FormatAttributes) -> FormatAttributes {
        FormatAttributes {
            bold: over.bold.or(self.bold),
            italic: over.italic.or(self.italic),
            underline: over.underline.or(self.underline),
            font_family: over.font_family.or(self.font_family),
            font_size: over.font_size.or(self.font_size),
            alignment: over.alignment.or(self.alignment),
            letter_spacing: over.letter_spacing.or(self.letter_spacing),
            line_height: over.line_height.or(self.line_height),
        }
    }

    /// Fully concrete style, filling any gap from the built-in default.
    pub fn resolve(&self) -> ResolvedStyle {
        let base = Self::document_default().merged_with(self);
        ResolvedStyle {
            bold: base.bold.unwrap_or(false),
            italic: base.italic.unwrap_or(false),
            underline: base.underline.unwrap_or(false),
            font_family: base.font_family.unwrap_or(FontFamily::Inter),
            font_size: base.font_size.unwrap_or(FontSize::Base),
            alignment: base.alignment.unwrap_or(Alignment::Left),
            letter_spacing: base.letter_spacing.unwrap_or(LetterSpacing::Normal),
            line_height: base.line_height.unwrap_or(LineHeight::Normal),
        }
    }
}

/// Concrete style carried by rendered field nodes and read by the measurement surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub font_family: FontFamily,
    pub font_size: FontSize,
    pub alignment: Alignment,
    pub letter_spacing: LetterSpacing,
    pub line_height: LineHeight,
}

impl Default for ResolvedStyle {
    fn default() -> Self {
        FormatAttributes::document_default().resolve()
    }
}
