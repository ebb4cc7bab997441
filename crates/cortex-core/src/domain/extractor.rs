//! Entity and concept extraction from message text
//!
//! Entities are things a message points at: `@mentions`, file paths,
//! component-style identifiers and URLs. Concepts are topics recognised from
//! fixed vocabularies. Both lists are deduplicated in first-seen order.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static MENTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@(\w+)").expect("valid mention regex"));

static FILE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[\w-]+\.(?:tsx|ts|jsx|json|js|md|py|yaml|yml|sql|rs|toml)\b").expect("valid file regex")
});

static COMPONENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z][a-zA-Z]+(?:Widget|Service|Controller|Adapter|Component|Provider|Handler)\b")
        .expect("valid component regex")
});

static URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://[^\s]+").expect("valid url regex"));

pub const TECHNOLOGIES: &[&str] = &[
    "neo4j",
    "pgvector",
    "react",
    "typescript",
    "docker",
    "kubernetes",
    "api",
    "websocket",
    "mcp",
    "graphql",
    "rest",
    "postgresql",
    "redis",
];

pub const ACTIONS: &[&str] = &[
    "deploy",
    "review",
    "test",
    "refactor",
    "implement",
    "fix",
    "create",
    "delete",
    "update",
    "analyze",
    "research",
];

pub const DOMAINS: &[&str] = &[
    "security",
    "performance",
    "architecture",
    "authentication",
    "authorization",
    "database",
    "frontend",
    "backend",
    "infrastructure",
];

/// Extract referenced entities
pub fn extract_entities(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut entities = Vec::new();
    let mut push = |candidate: &str| {
        if seen.insert(candidate.to_string()) {
            entities.push(candidate.to_string());
        }
    };

    for cap in MENTION.captures_iter(text) {
        if let Some(name) = cap.get(1) {
            push(name.as_str());
        }
    }
    for m in FILE_PATH.find_iter(text) {
        push(m.as_str());
    }
    for m in COMPONENT.find_iter(text) {
        push(m.as_str());
    }
    for m in URL.find_iter(text) {
        push(m.as_str());
    }

    entities
}

/// Extract vocabulary concepts by case-insensitive substring match
pub fn extract_concepts(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut seen = HashSet::new();

    TECHNOLOGIES
        .iter()
        .chain(ACTIONS)
        .chain(DOMAINS)
        .filter(|term| lower.contains(**term))
        .filter(|term| seen.insert(**term))
        .map(|term| term.to_string())
        .collect()
}
