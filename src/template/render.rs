use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::model::params::Fields;

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_.-]+)\s*\}\}").expect("valid placeholder regex")
});

/// Substitute `{{name}}` placeholders from `fields`, then the built-ins
/// `date` and `key`. Unknown names render empty.
pub fn render_placeholders(text: &str, fields: &Fields, key: &str) -> String {
    PLACEHOLDER_RE
        .replace_all(text, |caps: &Captures| {
            let name = &caps[1];
            if let Some(value) = fields.get(name) {
                return value.to_string();
            }
            match name {
                "date" => chrono::Local::now().format("%Y-%m-%d").to_string(),
                "key" => key.to_string(),
                _ => String::new(),
            }
        })
        .into_owned()
}

pub fn has_placeholders(text: &str) -> bool {
    PLACEHOLDER_RE.is_match(text)
}
