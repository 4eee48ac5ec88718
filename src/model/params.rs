use url::Url;

use crate::error::{Result, StencilError};

/// Fields every automated invocation must carry before a template is touched.
pub const CORE_FIELDS: [&str; 3] = ["type", "url", "title"];

/// A raw inbound value; protocol calls may repeat a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Single(String),
    Multi(Vec<String>),
}

impl ParamValue {
    /// First value wins; the rest are dropped.
    pub fn first(&self) -> Option<&str> {
        match self {
            ParamValue::Single(value) => Some(value),
            ParamValue::Multi(values) => values.first().map(String::as_str),
        }
    }
}

/// Inbound parameters, in the order the caller supplied them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterBag {
    entries: Vec<(String, ParamValue)>,
}

impl ParameterBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value; a repeated key turns the entry into `Multi`.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();

        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => {
                let values = match std::mem::replace(existing, ParamValue::Multi(Vec::new())) {
                    ParamValue::Single(first) => vec![first, value],
                    ParamValue::Multi(mut values) => {
                        values.push(value);
                        values
                    }
                };
                *existing = ParamValue::Multi(values);
            }
            None => self.entries.push((key, ParamValue::Single(value))),
        }
    }

    #[cfg(test)]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key, value);
        self
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Parse a percent-encoded query string (`type=a&url=b`, leading `?` allowed).
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut bag = Self::new();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            bag.push(key.into_owned(), value.into_owned());
        }
        bag
    }

    /// Parse a protocol URI such as `stencil://create?type=wishlist&title=Foo`.
    pub fn from_uri(raw: &str, scheme: &str) -> Result<Self> {
        let url = Url::parse(raw)
            .map_err(|err| StencilError::MissingParameter(format!("unparseable uri {raw:?}: {err}")))?;

        if !url.scheme().eq_ignore_ascii_case(scheme) {
            return Err(StencilError::MissingParameter(format!(
                "uri scheme must be {scheme}, got {}",
                url.scheme()
            )));
        }

        let mut bag = Self::new();
        for (key, value) in url.query_pairs() {
            bag.push(key.into_owned(), value.into_owned());
        }
        Ok(bag)
    }

    /// Parse command-style `key=value` arguments.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        let mut bag = Self::new();
        for arg in args {
            let arg = arg.as_ref();
            let Some((key, value)) = arg.split_once('=') else {
                return Err(StencilError::MissingParameter(format!(
                    "expected key=value, got {arg:?}"
                )));
            };
            bag.push(key.trim(), value);
        }
        Ok(bag)
    }

    /// Accept any of the supported invocation shapes: a full URI, a query
    /// string, or a list of `key=value` words.
    pub fn parse_invocation<S: AsRef<str>>(args: &[S], scheme: &str) -> Result<Self> {
        match args {
            [single] if has_uri_scheme(single.as_ref()) => Self::from_uri(single.as_ref(), scheme),
            [single] if single.as_ref().contains('&') || single.as_ref().starts_with('?') => {
                Ok(Self::from_query(single.as_ref()))
            }
            _ => Self::from_args(args),
        }
    }

    /// Collapse multi-valued entries to their first value.
    pub fn normalize(&self) -> Fields {
        let mut fields = Fields::new();
        for (key, value) in &self.entries {
            if let Some(first) = value.first() {
                fields.insert(key.clone(), first.to_string());
            }
        }
        fields
    }
}

/// True when `raw` opens with `<scheme>://`. A query string carrying an
/// unencoded URL value (`url=https://x`) has `=` before the `://`.
fn has_uri_scheme(raw: &str) -> bool {
    raw.split_once("://").is_some_and(|(scheme, _)| {
        scheme.starts_with(|ch: char| ch.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '-' | '.'))
    })
}

/// Ordered field map; insertion order is the order fields were collected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fields {
    entries: Vec<(String, String)>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite in place, keeping the original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value for `key` if present and non-blank after trimming.
    pub fn non_blank(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|value| !value.trim().is_empty())
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[cfg(test)]
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Overlay `other` onto `self`; `other` wins on conflicts.
    pub fn merge(&mut self, other: &Fields) {
        for (key, value) in other.iter() {
            self.insert(key, value);
        }
    }

    /// Fail with `MissingParameter` naming the first blank core field.
    pub fn require_core(&self) -> Result<()> {
        match CORE_FIELDS.iter().find(|field| self.non_blank(field).is_none()) {
            Some(field) => Err(StencilError::MissingParameter((*field).to_string())),
            None => Ok(()),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Fields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut fields = Fields::new();
        for (key, value) in iter {
            fields.insert(key, value);
        }
        fields
    }
}
