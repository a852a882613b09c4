//! Burned-in subtitle style contract.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Style passed to the cutter's subtitle filter.
///
/// The defaults are the fixed contract tuned for mobile playback: Arial 18pt,
/// white text, 1px black outline, boxed semi-transparent background,
/// bottom-center with a 40px vertical margin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SubtitleStyle {
    pub font_name: String,
    pub font_size: u32,
    /// Text color, ASS `&H...` notation
    pub primary_colour: String,
    /// Outline color, ASS `&H...` notation
    pub outline_colour: String,
    pub outline_width: u32,
    /// Background box color with alpha, ASS `&H...` notation
    pub back_colour: String,
    /// ASS border style; 3 draws an opaque box behind the text
    pub border_style: u32,
    /// ASS numpad alignment; 2 is bottom-center
    pub alignment: u32,
    /// Vertical margin from the bottom, pixels
    pub margin_v: u32,
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            font_name: "Arial".to_string(),
            font_size: 18,
            primary_colour: "&HFFFFFF".to_string(),
            outline_colour: "&H000000".to_string(),
            outline_width: 1,
            back_colour: "&H80000000".to_string(),
            border_style: 3,
            alignment: 2,
            margin_v: 40,
        }
    }
}

impl SubtitleStyle {
    /// Resolve a named style. Unknown names fall back to the default.
    pub fn from_name(name: &str) -> Self {
        match name {
            "youtube" | "" => Self::default(),
            _ => Self::default(),
        }
    }

    /// Render as an ffmpeg/ASS `force_style` parameter string.
    pub fn force_style(&self) -> String {
        format!(
            "FontName={},FontSize={},PrimaryColour={},OutlineColour={},Outline={},BackColour={},BorderStyle={},Alignment={},MarginV={}",
            self.font_name,
            self.font_size,
            self.primary_colour,
            self.outline_colour,
            self.outline_width,
            self.back_colour,
            self.border_style,
            self.alignment,
            self.margin_v,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_force_style_contract() {
        let style = SubtitleStyle::default();
        assert_eq!(
            style.force_style(),
            "FontName=Arial,FontSize=18,PrimaryColour=&HFFFFFF,OutlineColour=&H000000,Outline=1,BackColour=&H80000000,BorderStyle=3,Alignment=2,MarginV=40"
        );
    }

    #[test]
    fn test_unknown_name_falls_back() {
        assert_eq!(SubtitleStyle::from_name("nonsense"), SubtitleStyle::default());
    }
}
