//! The frameworks/tools/domains lookup table the skills extractor matches
//! against. Shipped as configuration data embedded in the binary (never
//! read from disk at call time), so extraction stays a pure function of its
//! inputs.

use std::collections::HashMap;

const RAW: &str = include_str!("../../assets/dictionary.toml");

/// Version tag for the embedded dictionary, surfaced in configuration so an
/// operator can tell which dictionary snapshot produced a given record.
pub const DICTIONARIES_VERSION: &str = "2026.1";

#[derive(Debug, serde::Deserialize)]
struct RawDictionary {
    frameworks: HashMap<String, String>,
    tools: HashMap<String, String>,
}

/// Slug → domain lookup tables for frameworks and tools, loaded once at
/// process startup and passed to the skills extractor as an immutable
/// borrow.
pub struct Dictionary {
    frameworks: HashMap<String, String>,
    tools: HashMap<String, String>,
}

impl Dictionary {
    /// Parses the dictionary embedded in the binary. Infallible in
    /// practice — the asset ships with the crate — but surfaces a `Result`
    /// so a malformed asset fails loudly at startup instead of silently
    /// producing an empty dictionary.
    pub fn embedded() -> Result<Self, toml::de::Error> {
        let raw: RawDictionary = toml::from_str(RAW)?;
        Ok(Self { frameworks: raw.frameworks, tools: raw.tools })
    }

    pub fn framework_domain(&self, slug: &str) -> Option<&str> {
        self.frameworks.get(&slug.to_lowercase()).map(String::as_str)
    }

    pub fn tool_domain(&self, slug: &str) -> Option<&str> {
        self.tools.get(&slug.to_lowercase()).map(String::as_str)
    }

    pub fn framework_slugs(&self) -> impl Iterator<Item = &str> {
        self.frameworks.keys().map(String::as_str)
    }

    pub fn tool_slugs(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_dictionary_parses() {
        let dict = Dictionary::embedded().unwrap();
        assert_eq!(dict.framework_domain("react"), Some("Frontend"));
        assert_eq!(dict.tool_domain("docker"), Some("Infra"));
        assert_eq!(dict.framework_domain("not-a-real-framework"), None);
    }

    #[test]
    fn lookups_are_case_insensitive() {
        let dict = Dictionary::embedded().unwrap();
        assert_eq!(dict.framework_domain("React"), Some("Frontend"));
    }
}
