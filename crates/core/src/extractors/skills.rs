//! Skills extractor (C5.1): derives primary languages, frameworks, tools,
//! and domains from a bundle's repos, language stats, topics, and
//! descriptions. Pure — no I/O, no shared mutable state.

use std::collections::{BTreeSet, HashMap};

use gh_intel_types::{LanguageShare, ProfileBundle};
use regex_lite::Regex;

use super::dictionary::Dictionary;

/// Minimum cumulative share of total bytes the emitted language set must
/// cover.
const COVERAGE_THRESHOLD: f64 = 0.95;
const MAX_LANGUAGES: usize = 10;

pub struct SkillsOutput {
    pub primary_languages: HashMap<String, LanguageShare>,
    pub frameworks: BTreeSet<String>,
    pub tools: BTreeSet<String>,
    pub domains: BTreeSet<String>,
}

pub fn extract(bundle: &ProfileBundle, dictionary: &Dictionary) -> SkillsOutput {
    SkillsOutput {
        primary_languages: primary_languages(bundle),
        ..pattern_match(bundle, dictionary)
    }
}

fn primary_languages(bundle: &ProfileBundle) -> HashMap<String, LanguageShare> {
    let mut totals: HashMap<String, u64> = HashMap::new();
    for langs in bundle.language_stats.values() {
        for (lang, bytes) in langs {
            *totals.entry(lang.clone()).or_insert(0) += bytes;
        }
    }
    let grand_total: u64 = totals.values().sum();
    if grand_total == 0 {
        return HashMap::new();
    }

    let mut ranked: Vec<(String, u64)> = totals.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    let mut cumulative = 0u64;
    let mut out = HashMap::new();
    for (lang, bytes) in ranked.into_iter().take(MAX_LANGUAGES) {
        out.insert(
            lang,
            LanguageShare { bytes, percentage: bytes as f64 / grand_total as f64 },
        );
        cumulative += bytes;
        if cumulative as f64 / grand_total as f64 >= COVERAGE_THRESHOLD {
            break;
        }
    }
    out
}

fn pattern_match(bundle: &ProfileBundle, dictionary: &Dictionary) -> SkillsOutput {
    let mut frameworks = BTreeSet::new();
    let mut tools = BTreeSet::new();
    let mut domains = BTreeSet::new();

    for repo in &bundle.repos {
        for topic in &repo.topics {
            if let Some(domain) = dictionary.framework_domain(topic) {
                frameworks.insert(topic.to_lowercase());
                domains.insert(domain.to_string());
            }
            if let Some(domain) = dictionary.tool_domain(topic) {
                tools.insert(topic.to_lowercase());
                domains.insert(domain.to_string());
            }
        }

        if let Some(domain) = dictionary.framework_domain(&repo.name) {
            frameworks.insert(repo.name.to_lowercase());
            domains.insert(domain.to_string());
        }
        if let Some(domain) = dictionary.tool_domain(&repo.name) {
            tools.insert(repo.name.to_lowercase());
            domains.insert(domain.to_string());
        }

        if let Some(description) = &repo.description {
            for slug in dictionary.framework_slugs() {
                if whole_word_match(description, slug) {
                    if let Some(domain) = dictionary.framework_domain(slug) {
                        frameworks.insert(slug.to_string());
                        domains.insert(domain.to_string());
                    }
                }
            }
            for slug in dictionary.tool_slugs() {
                if whole_word_match(description, slug) {
                    if let Some(domain) = dictionary.tool_domain(slug) {
                        tools.insert(slug.to_string());
                        domains.insert(domain.to_string());
                    }
                }
            }
        }
    }

    SkillsOutput { primary_languages: HashMap::new(), frameworks, tools, domains }
}

fn whole_word_match(haystack: &str, needle: &str) -> bool {
    let escaped = regex_lite::escape(needle);
    let pattern = format!(r"(?i)\b{escaped}\b");
    Regex::new(&pattern).map(|re| re.is_match(haystack)).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gh_intel_types::{Repo, User};

    fn user() -> User {
        User {
            login: "alice".to_string(),
            display_name: None,
            bio: None,
            company: None,
            location: None,
            email: None,
            blog: None,
            twitter_username: None,
            created_at: Utc::now(),
            followers: 0,
            following: 0,
            public_repos: 0,
        }
    }

    fn repo(name: &str, topics: Vec<&str>, description: Option<&str>) -> Repo {
        Repo {
            name: name.to_string(),
            is_fork: false,
            primary_language: None,
            stargazers: 0,
            forks: 0,
            size_bytes: 0,
            topics: topics.into_iter().map(String::from).collect(),
            created_at: Utc::now(),
            pushed_at: Utc::now(),
            description: description.map(String::from),
        }
    }

    #[test]
    fn minimal_bundle_yields_no_skills() {
        let bundle = ProfileBundle::user_only("alice", user(), Utc::now());
        let dict = Dictionary::embedded().unwrap();
        let out = extract(&bundle, &dict);
        assert!(out.primary_languages.is_empty());
        assert!(out.frameworks.is_empty());
        assert!(out.domains.is_empty());
    }

    #[test]
    fn languages_cover_at_least_95_percent_of_bytes() {
        let mut bundle = ProfileBundle::user_only("alice", user(), Utc::now());
        bundle.repos = vec![repo("a", vec![], None)];
        bundle.language_stats.insert(
            "a".to_string(),
            HashMap::from([
                ("Rust".to_string(), 9500u64),
                ("Shell".to_string(), 400),
                ("Dockerfile".to_string(), 100),
            ]),
        );
        let dict = Dictionary::embedded().unwrap();
        let out = extract(&bundle, &dict);
        assert!(out.primary_languages.contains_key("Rust"));
        let rust_share = out.primary_languages["Rust"].percentage;
        assert!((rust_share - 0.95).abs() < 0.001);
    }

    #[test]
    fn topic_match_surfaces_framework_and_domain() {
        let mut bundle = ProfileBundle::user_only("alice", user(), Utc::now());
        bundle.repos = vec![repo("my-api", vec!["django"], None)];
        let dict = Dictionary::embedded().unwrap();
        let out = extract(&bundle, &dict);
        assert!(out.frameworks.contains("django"));
        assert!(out.domains.contains("Backend"));
    }

    #[test]
    fn description_whole_word_match_is_case_insensitive() {
        let mut bundle = ProfileBundle::user_only("alice", user(), Utc::now());
        bundle.repos = vec![repo("widget", vec![], Some("A small React dashboard"))];
        let dict = Dictionary::embedded().unwrap();
        let out = extract(&bundle, &dict);
        assert!(out.frameworks.contains("react"));
    }

    #[test]
    fn description_substring_without_word_boundary_does_not_match() {
        let mut bundle = ProfileBundle::user_only("alice", user(), Utc::now());
        bundle.repos = vec![repo("widget", vec![], Some("preactive rendering engine"))];
        let dict = Dictionary::embedded().unwrap();
        let out = extract(&bundle, &dict);
        assert!(!out.frameworks.contains("react"));
    }
}
