//! Term-overlap relevance scoring for graph and message results

/// Fraction of whitespace-separated query terms that occur in `text`,
/// case-insensitively. Zero for empty text or an empty query.
pub fn calculate_relevance(query: &str, text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }

    let text = text.to_lowercase();
    let terms: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
    if terms.is_empty() {
        return 0.0;
    }

    let matched = terms.iter().filter(|term| text.contains(term.as_str())).count();
    matched as f64 / terms.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_match() {
        assert_eq!(calculate_relevance("database architecture", "PostgreSQL is a database"), 0.5);
    }

    #[test]
    fn test_full_and_no_match() {
        assert_eq!(calculate_relevance("Neo4j", "neo4j adapter"), 1.0);
        assert_eq!(calculate_relevance("redis", "neo4j adapter"), 0.0);
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(calculate_relevance("anything", ""), 0.0);
        assert_eq!(calculate_relevance("   ", "some text"), 0.0);
    }
}
