//! Typed view of the document tree returned by the Figma files endpoint. Only
//! the fields the exporter reads are modeled; the full response is kept
//! alongside as JSON for debug dumps.

use std::{fmt, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FigmaFile {
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    pub document: Node,

    /// The response exactly as Figma sent it. `Null` unless the file came
    /// from [`FigmaFile::from_json`].
    #[serde(skip)]
    pub raw: serde_json::Value,
}

impl FigmaFile {
    /// Parses a files endpoint response. Documents nest two JSON levels per
    /// node, so the parser runs without serde_json's depth limit and grows the
    /// stack on demand instead.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        let mut deserializer = serde_json::Deserializer::from_str(text);
        deserializer.disable_recursion_limit();

        let raw = serde_json::Value::deserialize(serde_stacker::Deserializer::new(
            &mut deserializer,
        ))?;
        deserializer.end()?;

        let mut file = FigmaFile::deserialize(serde_stacker::Deserializer::new(&raw))?;
        file.raw = raw;
        Ok(file)
    }

    /// Pretty JSON of the original response, or of the typed fields when
    /// there is no original.
    pub fn to_debug_json(&self) -> serde_json::Result<Vec<u8>> {
        if self.raw.is_null() {
            serde_json::to_vec_pretty(self)
        } else {
            serde_json::to_vec_pretty(&self.raw)
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub export_settings: Vec<ExportSetting>,
}

impl Node {
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Whether this node is flagged for image export under a usable name.
    pub fn is_exportable(&self) -> bool {
        !self.name.is_empty() && !self.export_settings.is_empty()
    }
}

// Tear down children with an explicit stack; the derived drop recurses once
// per level.
impl Drop for Node {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSetting {
    pub format: ImageFormat,

    #[serde(default)]
    pub suffix: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<Constraint>,
}

impl ExportSetting {
    /// The render scale for this setting. Figma also uses the constraint value
    /// for width and height constraints; it is passed through as a scale all
    /// the same. Missing, zero, negative or non-finite values mean 1.
    pub fn scale(&self) -> f64 {
        match &self.constraint {
            Some(constraint) if constraint.value.is_finite() && constraint.value > 0.0 => {
                constraint.value
            }
            _ => 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraint {
    #[serde(rename = "type", default)]
    pub kind: String,

    #[serde(default)]
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Svg,
    Png,
    Jpg,
    Pdf,
}

impl ImageFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageFormat::Svg => "svg",
            ImageFormat::Png => "png",
            ImageFormat::Jpg => "jpg",
            ImageFormat::Pdf => "pdf",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown export format '{0}'")]
pub struct UnknownFormat(String);

impl FromStr for ImageFormat {
    type Err = UnknownFormat;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "svg" => Ok(ImageFormat::Svg),
            "png" => Ok(ImageFormat::Png),
            "jpg" => Ok(ImageFormat::Jpg),
            "pdf" => Ok(ImageFormat::Pdf),
            _ => Err(UnknownFormat(value.to_owned())),
        }
    }
}

// Figma sends formats in upper case ("PNG"); the dump keeps that spelling.
impl Serialize for ImageFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_str().to_ascii_uppercase())
    }
}

impl<'de> Deserialize<'de> for ImageFormat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(de::Error::custom)
    }
}
