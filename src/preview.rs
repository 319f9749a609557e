//! Style preview computation
//!
//! Maps a style id and intensity to a cosmetic filter approximation. There
//! is no state here: the same inputs always give bit-identical output, and
//! computing a preview never touches the history.

use serde::{Deserialize, Serialize};

use crate::project::Intensity;

/// Style selected for a new project
pub const DEFAULT_STYLE_ID: &str = "cyberpunk";

/// Visual transform parameters for the preview surface
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformDescriptor {
    /// Hue rotation in degrees
    pub hue_rotate_deg: f64,
    /// Saturation multiplier (1.0 = unchanged)
    pub saturation: f64,
    /// Contrast multiplier (1.0 = unchanged)
    pub contrast: f64,
    /// Blur radius in pixels
    pub blur_px: f64,
    /// Brightness multiplier (1.0 = unchanged)
    pub brightness: f64,
    /// Grayscale fraction in [0, 1]
    pub grayscale: f64,
    /// Sepia fraction in [0, 1]
    pub sepia: f64,
}

impl TransformDescriptor {
    pub const IDENTITY: Self = Self {
        hue_rotate_deg: 0.0,
        saturation: 1.0,
        contrast: 1.0,
        blur_px: 0.0,
        brightness: 1.0,
        grayscale: 0.0,
        sepia: 0.0,
    };

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Render as a CSS `filter` value, listing only non-identity parameters
    pub fn to_css_filter(&self) -> String {
        let id = Self::IDENTITY;
        let mut parts = Vec::new();
        if self.hue_rotate_deg != id.hue_rotate_deg {
            parts.push(format!("hue-rotate({}deg)", self.hue_rotate_deg));
        }
        if self.sepia != id.sepia {
            parts.push(format!("sepia({})", self.sepia));
        }
        if self.brightness != id.brightness {
            parts.push(format!("brightness({})", self.brightness));
        }
        if self.saturation != id.saturation {
            parts.push(format!("saturate({})", self.saturation));
        }
        if self.contrast != id.contrast {
            parts.push(format!("contrast({})", self.contrast));
        }
        if self.grayscale != id.grayscale {
            parts.push(format!("grayscale({})", self.grayscale));
        }
        if self.blur_px != id.blur_px {
            parts.push(format!("blur({}px)", self.blur_px));
        }

        if parts.is_empty() {
            "none".to_string()
        } else {
            parts.join(" ")
        }
    }
}

impl Default for TransformDescriptor {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A selectable style and its preview formula
pub struct StyleDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// Formula over intensity (degrees use the raw value, the rest use [0, 1])
    formula: fn(f64, f64) -> TransformDescriptor,
}

/// Catalog entry as exposed to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleInfo {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl From<&StyleDefinition> for StyleInfo {
    fn from(style: &StyleDefinition) -> Self {
        Self {
            id: style.id.to_string(),
            name: style.name.to_string(),
            description: style.description.to_string(),
        }
    }
}

pub static STYLES: &[StyleDefinition] = &[
    StyleDefinition {
        id: "cyberpunk",
        name: "Cyberpunk",
        description: "Futuristic neon aesthetics",
        formula: |raw, o| TransformDescriptor {
            hue_rotate_deg: raw,
            saturation: 1.0 + o,
            contrast: 1.0 + o * 0.5,
            ..TransformDescriptor::IDENTITY
        },
    },
    StyleDefinition {
        id: "oil-painting",
        name: "Oil Painting",
        description: "Rich textured art",
        formula: |_, o| TransformDescriptor {
            sepia: o * 0.5,
            saturation: 1.0 + o,
            blur_px: o * 2.0,
            ..TransformDescriptor::IDENTITY
        },
    },
    StyleDefinition {
        id: "anime",
        name: "Classic Anime",
        description: "2D Japanese animation",
        formula: |_, o| TransformDescriptor {
            brightness: 1.0 + o * 0.2,
            saturation: 1.0 + o * 0.8,
            ..TransformDescriptor::IDENTITY
        },
    },
    StyleDefinition {
        id: "claymation",
        name: "Claymation",
        description: "Stop motion look",
        formula: |_, o| TransformDescriptor {
            contrast: 1.0 + o,
            grayscale: o * 0.2,
            ..TransformDescriptor::IDENTITY
        },
    },
];

/// Look up a style by id
pub fn find_style(style_id: &str) -> Option<&'static StyleDefinition> {
    STYLES.iter().find(|s| s.id == style_id)
}

/// The catalog in display order
pub fn catalog() -> Vec<StyleInfo> {
    STYLES.iter().map(StyleInfo::from).collect()
}

/// Compute the preview transform for a style at the given intensity.
///
/// Unknown style ids map to the identity transform.
pub fn preview_transform(style_id: &str, intensity: Intensity) -> TransformDescriptor {
    match find_style(style_id) {
        Some(style) => (style.formula)(f64::from(intensity.value()), intensity.normalized()),
        None => TransformDescriptor::IDENTITY,
    }
}
