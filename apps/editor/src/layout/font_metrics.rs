//! Static glyph-width tables for the five resume font families.
//!
//! Widths are in em units (relative to font size). This is an approximation of real
//! glyph advances: good enough to tell a three-line bullet from a two-line one, which
//! is the precision pagination needs. Kerning and ligatures are ignored.
//!
//! One measured table (Inter) covers ASCII 0x20..=0x7E; the other families are
//! expressed as a width scale over it (Garamond ≈ 85%, Lato ≈ 105%, Oswald ≈ 68%,
//! Computer Modern ≈ 90%). Index = (char as usize) - 32.

use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Font family enum
// ────────────────────────────────────────────────────────────────────────────

/// The closed set of font families offered by the formatting toolbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FontFamily {
    /// Clean humanist sans-serif.
    Inter,
    /// Classic old-style serif.
    EbGaramond,
    /// Geometric humanist sans-serif.
    Lato,
    /// Condensed display sans-serif.
    Oswald,
    /// Traditional TeX font.
    ComputerModern,
}

impl FontFamily {
    pub fn css_name(self) -> &'static str {
        match self {
            FontFamily::Inter => "Inter",
            FontFamily::EbGaramond => "'EB Garamond'",
            FontFamily::Lato => "Lato",
            FontFamily::Oswald => "Oswald",
            FontFamily::ComputerModern => "'Computer Modern'",
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Page configuration
// ────────────────────────────────────────────────────────────────────────────

/// Physical page frame used by the preview and the paginator, in points.
///
/// Defaults to US letter (612 × 792pt) with 1" (72pt) margins, which leaves a
/// 468 × 648pt content box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageConfig {
    pub page_width_pt: f32,
    pub page_height_pt: f32,
    pub margin_pt: f32,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            page_width_pt: 612.0,
            page_height_pt: 792.0,
            margin_pt: 72.0,
        }
    }
}

impl PageConfig {
    /// Usable line width; blocks are measured at this full preview width.
    pub fn content_width_pt(&self) -> f32 {
        (self.page_width_pt - 2.0 * self.margin_pt).max(0.0)
    }

    /// Height budget of one page frame.
    pub fn content_height_pt(&self) -> f32 {
        (self.page_height_pt - 2.0 * self.margin_pt).max(0.0)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Font metric table
// ────────────────────────────────────────────────────────────────────────────

/// Character-width table for one family, at 1em.
pub struct FontMetricTable {
    pub font: FontFamily,
    scale: f32,
    /// Extra advance applied to bold text.
    pub bold_factor: f32,
}

impl FontMetricTable {
    /// Width of a string in em units. Non-ASCII characters use the average width.
    pub fn measure_str(&self, s: &str) -> f32 {
        s.chars()
            .map(|c| {
                let code = c as usize;
                if (32..=126).contains(&code) {
                    INTER_WIDTHS[code - 32]
                } else {
                    INTER_AVERAGE_WIDTH
                }
            })
            .sum::<f32>()
            * self.scale
    }

    /// Width of `s` in points for a concrete size, weight and letter-spacing.
    pub fn measure_pt(&self, s: &str, size_pt: f32, bold: bool, letter_spacing_em: f32) -> f32 {
        let weight = if bold { self.bold_factor } else { 1.0 };
        let glyphs = self.measure_str(s) * weight;
        let tracking = letter_spacing_em * s.chars().count() as f32;
        (glyphs + tracking) * size_pt
    }
}

/// Inter advances for ASCII 0x20..=0x7E.
#[rustfmt::skip]
static INTER_WIDTHS: [f32; 95] = [
    // sp    !     "     #     $     %     &     '     (     )     *     +     ,     -     .     /
    0.25, 0.30, 0.38, 0.56, 0.56, 0.89, 0.67, 0.22, 0.33, 0.33, 0.39, 0.59, 0.28, 0.33, 0.28, 0.31,
    // 0-9
    0.56, 0.56, 0.56, 0.56, 0.56, 0.56, 0.56, 0.56, 0.56, 0.56,
    // :     ;     <     =     >     ?     @
    0.28, 0.28, 0.59, 0.59, 0.59, 0.50, 1.02,
    // A-M
    0.67, 0.61, 0.61, 0.67, 0.56, 0.50, 0.67, 0.67, 0.25, 0.39, 0.61, 0.53, 0.78,
    // N-Z
    0.67, 0.72, 0.56, 0.72, 0.61, 0.50, 0.56, 0.67, 0.67, 0.89, 0.61, 0.61, 0.56,
    // [     \     ]     ^     _     `
    0.28, 0.31, 0.28, 0.47, 0.56, 0.34,
    // a-m
    0.56, 0.56, 0.50, 0.56, 0.56, 0.31, 0.56, 0.56, 0.22, 0.22, 0.53, 0.22, 0.83,
    // n-z
    0.56, 0.56, 0.56, 0.56, 0.33, 0.44, 0.39, 0.56, 0.50, 0.72, 0.50, 0.50, 0.44,
    // {     |     }     ~
    0.33, 0.26, 0.33, 0.59,
];

const INTER_AVERAGE_WIDTH: f32 = 0.52;

static INTER_TABLE: FontMetricTable = FontMetricTable {
    font: FontFamily::Inter,
    scale: 1.0,
    bold_factor: 1.06,
};
static EB_GARAMOND_TABLE: FontMetricTable = FontMetricTable {
    font: FontFamily::EbGaramond,
    scale: 0.85,
    bold_factor: 1.05,
};
static LATO_TABLE: FontMetricTable = FontMetricTable {
    font: FontFamily::Lato,
    scale: 1.05,
    bold_factor: 1.06,
};
static OSWALD_TABLE: FontMetricTable = FontMetricTable {
    font: FontFamily::Oswald,
    scale: 0.68,
    bold_factor: 1.08,
};
static COMPUTER_MODERN_TABLE: FontMetricTable = FontMetricTable {
    font: FontFamily::ComputerModern,
    scale: 0.90,
    bold_factor: 1.10,
};

/// Returns the static metric table for a font family.
pub fn get_metrics(font: FontFamily) -> &'static FontMetricTable {
    match font {
        FontFamily::Inter => &INTER_TABLE,
        FontFamily::EbGaramond => &EB_GARAMOND_TABLE,
        FontFamily::Lato => &LATO_TABLE,
        FontFamily::Oswald => &OSWALD_TABLE,
        FontFamily::ComputerModern => &COMPUTER_MODERN_TABLE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_space_matches_table() {
        let metrics = get_metrics(FontFamily::Inter);
        assert!((metrics.measure_str(" ") - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_non_ascii_uses_average_width() {
        let metrics = get_metrics(FontFamily::Inter);
        assert!((metrics.measure_str("é") - INTER_AVERAGE_WIDTH).abs() < 1e-6);
    }

    #[test]
    fn test_condensed_font_narrower_than_wide_font() {
        let text = "Architected distributed caching layer";
        let oswald = get_metrics(FontFamily::Oswald).measure_str(text);
        let lato = get_metrics(FontFamily::Lato).measure_str(text);
        assert!(oswald < lato, "Oswald should measure narrower than Lato");
    }

    #[test]
    fn test_bold_and_tracking_widen_text() {
        let metrics = get_metrics(FontFamily::Inter);
        let plain = metrics.measure_pt("Resume", 11.0, false, 0.0);
        assert!(metrics.measure_pt("Resume", 11.0, true, 0.0) > plain);
        assert!(metrics.measure_pt("Resume", 11.0, false, 0.05) > plain);
        assert!(metrics.measure_pt("Resume", 11.0, false, -0.02) < plain);
    }

    #[test]
    fn test_default_page_config_letter_with_inch_margins() {
        let config = PageConfig::default();
        assert!((config.content_width_pt() - 468.0).abs() < 1e-3);
        assert!((config.content_height_pt() - 648.0).abs() < 1e-3);
    }

    #[test]
    fn test_all_five_fonts_accessible() {
        for font in [
            FontFamily::Inter,
            FontFamily::EbGaramond,
            FontFamily::Lato,
            FontFamily::Oswald,
            FontFamily::ComputerModern,
        ] {
            assert_eq!(get_metrics(font).font, font);
        }
    }
}
