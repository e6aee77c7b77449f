use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// One identity attribute as supplied by an extractor.
///
/// Extractors are not consistent about cardinality: the same field may come
/// back as `"iX"` for one page and `["iX", "iX M60"]` for another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Single(String),
    List(Vec<String>),
}

impl AttributeValue {
    /// The trimmed value used for identity. For lists, that's the first
    /// element that is not blank.
    pub fn primary(&self) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value.trim()).filter(|v| !v.is_empty()),
            Self::List(values) => values.iter().map(|v| v.trim()).find(|v| !v.is_empty()),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}
impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}
impl From<Vec<String>> for AttributeValue {
    fn from(values: Vec<String>) -> Self {
        Self::List(values)
    }
}

/// Identity attributes of a tracked item.
///
/// `group` and `item` are required for an attribute-based fingerprint;
/// `variant` and `version` refine it when present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<AttributeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<AttributeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<AttributeValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<AttributeValue>,
}

impl Attributes {
    pub fn new(group: impl Into<AttributeValue>, item: impl Into<AttributeValue>) -> Self {
        Self {
            group: Some(group.into()),
            item: Some(item.into()),
            ..Self::default()
        }
    }

    pub fn with_variant(mut self, variant: impl Into<AttributeValue>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<AttributeValue>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_ref().and_then(AttributeValue::primary)
    }

    pub fn item(&self) -> Option<&str> {
        self.item.as_ref().and_then(AttributeValue::primary)
    }

    pub fn variant(&self) -> Option<&str> {
        self.variant.as_ref().and_then(AttributeValue::primary)
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_ref().and_then(AttributeValue::primary)
    }

    /// `true` if no attribute carries a usable value.
    pub fn is_empty(&self) -> bool {
        self.group().is_none() && self.item().is_none() && self.variant().is_none() && self.version().is_none()
    }

    /// Collapse every attribute to its primary value, which is the form the
    /// store persists. Fingerprints computed before and after are identical.
    pub fn primaries(&self) -> Self {
        let single = |value: Option<&str>| value.map(AttributeValue::from);
        Self {
            group: single(self.group()),
            item: single(self.item()),
            variant: single(self.variant()),
            version: single(self.version()),
        }
    }

    /// Human-readable label for reports, e.g. `iX xDrive50 (2024)`.
    pub fn label(&self) -> Option<String> {
        let mut label = [self.item(), self.variant()].into_iter().flatten().collect::<Vec<_>>().join(" ");
        if let Some(version) = self.version() {
            if label.is_empty() {
                label.push_str(version);
            } else {
                _ = write!(label, " ({version})");
            }
        }
        (!label.is_empty()).then_some(label)
    }
}
