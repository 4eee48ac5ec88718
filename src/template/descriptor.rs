use std::fmt;

use serde::{Deserialize, Serialize};

/// Discovery key: the case-sensitive file stem of a definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemplateKey(pub String);

impl TemplateKey {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Conventional export name: `wishlist` → `WishlistTemplate`,
    /// `book-notes` → `BookNotesTemplate`.
    pub fn export_name(&self) -> String {
        let mut out = String::with_capacity(self.0.len() + "Template".len());
        for segment in self
            .0
            .split(|ch: char| !ch.is_alphanumeric())
            .filter(|segment| !segment.is_empty())
        {
            let mut chars = segment.chars();
            if let Some(first) = chars.next() {
                out.extend(first.to_uppercase());
                out.push_str(chars.as_str());
            }
        }
        out.push_str("Template");
        out
    }
}

impl fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Declared contract of one template.
///
/// Deserialization is lenient on purpose; `validate::validate_metadata`
/// decides whether a descriptor is usable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDescriptor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub required_fields: Vec<String>,
    #[serde(default)]
    pub optional_fields: Vec<String>,
    #[serde(default)]
    pub supported_types: Option<Vec<String>>,
}

impl TemplateDescriptor {
    pub fn display_name(&self, key: &TemplateKey) -> String {
        if self.name.trim().is_empty() {
            key.0.clone()
        } else {
            self.name.clone()
        }
    }

    /// Declared supported types, treating an empty list as "no restriction".
    pub fn type_restriction(&self) -> Option<&[String]> {
        self.supported_types
            .as_deref()
            .filter(|types| !types.is_empty())
    }
}
