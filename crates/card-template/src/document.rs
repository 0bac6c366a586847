//! The serialized design document: an ordered tree of drawable objects.
//!
//! All types derive `Serialize + Deserialize` so the same structs cover
//! editor output, the template store's JSON bodies, and in-memory filling.
//! Unknown fields are ignored on input so documents written by newer
//! editors still load as much as this version understands.

use serde::{Deserialize, Serialize};

/// A complete design: canvas dimensions plus the drawable object tree.
///
/// Array order is z-order: later objects draw on top of earlier ones.
/// Object ids are unique within a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDocument {
    #[serde(default = "default_version")]
    pub version: String,
    /// Design-space width in template pixels.
    pub width: f32,
    /// Design-space height in template pixels.
    pub height: f32,
    /// Canvas background; white when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<Color>,
    #[serde(default)]
    pub objects: Vec<DocObject>,
}

fn default_version() -> String {
    "1".to_string()
}

impl TemplateDocument {
    /// An empty canvas of the given design-space size.
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            version: default_version(),
            width,
            height,
            background: None,
            objects: Vec::new(),
        }
    }
}

/// One drawable object: position, size, rotation, and a typed body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocObject {
    pub id: String,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Rotation in degrees, clockwise about the object center.
    #[serde(default)]
    pub rotation: f32,
    /// Record-field binding carried by the editor for placeholder objects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Frame overlay asset reference (drawn by the editor, kept on round-trip).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_overlay: Option<String>,
    #[serde(flatten)]
    pub kind: ObjectKind,
}

/// Type-specific object payload, tagged by `"type"` in the serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ObjectKind {
    Text {
        /// Literal text, possibly carrying `{{field}}` tokens.
        content: String,
        #[serde(default = "default_font_size")]
        font_size: f32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        font_family: Option<String>,
        #[serde(default = "Color::black")]
        fill: Color,
        #[serde(default)]
        align: TextAlign,
    },
    Image {
        /// URL, file path, or a `{{field}}` token resolved per data row.
        src: String,
        #[serde(default = "default_opacity")]
        opacity: f32,
    },
    Shape {
        shape: ShapeKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fill: Option<Color>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stroke: Option<Color>,
        #[serde(default)]
        stroke_width: f32,
    },
    Group {
        /// Children positioned relative to the group origin.
        children: Vec<DocObject>,
    },
}

fn default_font_size() -> f32 {
    16.0
}

fn default_opacity() -> f32 {
    1.0
}

/// Geometric shape primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Rect,
    Ellipse,
}

/// Horizontal text alignment within the object box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// RGBA color. Alpha defaults to fully opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    #[serde(default = "default_alpha")]
    pub a: u8,
}

fn default_alpha() -> u8 {
    255
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn black() -> Self {
        Self::rgb(0, 0, 0)
    }

    pub fn white() -> Self {
        Self::rgb(255, 255, 255)
    }

    /// Parse `#rgb` or `#rrggbb` (leading `#` optional).
    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.trim().trim_start_matches('#');
        match s.len() {
            3 => {
                let mut it = s.chars();
                let (r, g, b) = (it.next()?, it.next()?, it.next()?);
                let expand = |c: char| {
                    let v = c.to_digit(16)? as u8;
                    Some(v * 16 + v)
                };
                Some(Self::rgb(expand(r)?, expand(g)?, expand(b)?))
            }
            6 => {
                let r = u8::from_str_radix(&s[0..2], 16).ok()?;
                let g = u8::from_str_radix(&s[2..4], 16).ok()?;
                let b = u8::from_str_radix(&s[4..6], 16).ok()?;
                Some(Self::rgb(r, g, b))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_json_round_trip() {
        let doc = TemplateDocument {
            version: "1".to_string(),
            width: 1011.0,
            height: 638.0,
            background: Some(Color::white()),
            objects: vec![
                DocObject {
                    id: "name".to_string(),
                    x: 40.0,
                    y: 80.0,
                    width: 400.0,
                    height: 48.0,
                    rotation: 0.0,
                    field: Some("firstName".to_string()),
                    frame_overlay: None,
                    kind: ObjectKind::Text {
                        content: "{{firstName}} {{lastName}}".to_string(),
                        font_size: 32.0,
                        font_family: None,
                        fill: Color::black(),
                        align: TextAlign::Left,
                    },
                },
                DocObject {
                    id: "photo".to_string(),
                    x: 700.0,
                    y: 60.0,
                    width: 240.0,
                    height: 300.0,
                    rotation: 0.0,
                    field: None,
                    frame_overlay: Some("rounded".to_string()),
                    kind: ObjectKind::Image {
                        src: "{{photo}}".to_string(),
                        opacity: 1.0,
                    },
                },
            ],
        };

        let json = serde_json::to_string(&doc).unwrap();
        let back: TemplateDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_missing_objects_array_loads_as_empty() {
        // A truncated document still parses; filling it is then a no-op.
        let doc: TemplateDocument =
            serde_json::from_str(r#"{"width": 100.0, "height": 50.0}"#).unwrap();
        assert!(doc.objects.is_empty());
        assert_eq!(doc.version, "1");
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let json = r#"{
            "width": 100.0,
            "height": 50.0,
            "editorZoom": 1.5,
            "objects": [{
                "id": "r1", "type": "shape", "shape": "rect",
                "width": 10.0, "height": 10.0,
                "selectable": true
            }]
        }"#;
        let doc: TemplateDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.objects.len(), 1);
    }

    #[test]
    fn test_color_from_hex() {
        assert_eq!(Color::from_hex("#ff8000"), Some(Color::rgb(255, 128, 0)));
        assert_eq!(Color::from_hex("fff"), Some(Color::rgb(255, 255, 255)));
        assert_eq!(Color::from_hex("#12345"), None);
    }
}
