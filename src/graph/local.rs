//! Keyword scoring used when the backend's native search is unavailable.

use super::types::{EdgeInfo, NodeInfo, SearchResult};

/// Score awarded when the whole query appears verbatim in a text.
pub const EXACT_MATCH_SCORE: u32 = 100;
/// Score awarded per query keyword found in a text.
pub const KEYWORD_SCORE: u32 = 10;

/// Scores texts against a query: exact substring first, otherwise per keyword.
pub struct QueryScorer {
    query: String,
    keywords: Vec<String>,
}

impl QueryScorer {
    pub fn new(query: &str) -> Self {
        let query = query.to_lowercase();
        let keywords = query
            .replace([',', '，'], " ")
            .split_whitespace()
            .filter(|w| w.chars().count() > 1)
            .map(str::to_string)
            .collect();
        Self { query, keywords }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn score(&self, text: &str) -> u32 {
        if text.is_empty() {
            return 0;
        }
        let lower = text.to_lowercase();
        if lower.contains(&self.query) {
            return EXACT_MATCH_SCORE;
        }
        self.keywords
            .iter()
            .filter(|k| lower.contains(k.as_str()))
            .count() as u32
            * KEYWORD_SCORE
    }
}

/// Keep positive scores, order by descending score (stable on ties), take `limit`.
fn top_by_score<T>(items: Vec<T>, limit: usize, score: impl Fn(&T) -> u32) -> Vec<(u32, T)> {
    let mut scored: Vec<(u32, T)> = items
        .into_iter()
        .map(|item| (score(&item), item))
        .filter(|(s, _)| *s > 0)
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.truncate(limit);
    scored
}

pub fn rank_edges(edges: Vec<EdgeInfo>, query: &str, limit: usize) -> Vec<(u32, EdgeInfo)> {
    let scorer = QueryScorer::new(query);
    top_by_score(edges, limit, |e| scorer.score(&e.fact) + scorer.score(&e.name))
}

pub fn rank_nodes(nodes: Vec<NodeInfo>, query: &str, limit: usize) -> Vec<(u32, NodeInfo)> {
    let scorer = QueryScorer::new(query);
    top_by_score(nodes, limit, |n| scorer.score(&n.name) + scorer.score(&n.summary))
}

/// Build a search result from whatever edges/nodes the caller enumerated.
pub fn local_search(
    edges: Option<Vec<EdgeInfo>>,
    nodes: Option<Vec<NodeInfo>>,
    query: &str,
    limit: usize,
) -> SearchResult {
    let mut result = SearchResult {
        query: query.to_string(),
        ..Default::default()
    };

    if let Some(edges) = edges {
        for (_, edge) in rank_edges(edges, query, limit) {
            if !edge.fact.is_empty() {
                result.facts.push(edge.fact.clone());
            }
            result.edges.push(edge);
        }
    }

    if let Some(nodes) = nodes {
        for (_, node) in rank_nodes(nodes, query, limit) {
            if !node.summary.is_empty() {
                result.facts.push(format!("[{}]: {}", node.name, node.summary));
            }
            result.nodes.push(node);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn edge(id: &str, name: &str, fact: &str) -> EdgeInfo {
        EdgeInfo {
            uuid: id.into(),
            name: name.into(),
            fact: fact.into(),
            source_node_uuid: "s".into(),
            target_node_uuid: "t".into(),
        }
    }

    #[test]
    fn keywords_split_on_commas_and_drop_single_chars() {
        let scorer = QueryScorer::new("Campus protest, a tuition，Hike");
        assert_eq!(scorer.keywords(), &["campus", "protest", "tuition", "hike"]);
    }

    #[test]
    fn exact_match_scores_hundred() {
        let scorer = QueryScorer::new("tuition hike");
        assert_eq!(scorer.score("Students oppose the Tuition Hike"), 100);
        assert_eq!(scorer.score("hike planned; tuition unchanged"), 20);
        assert_eq!(scorer.score("nothing relevant"), 0);
        assert_eq!(scorer.score(""), 0);
    }

    #[test]
    fn exact_fact_ranks_above_keyword_fact() {
        let edges = vec![
            edge("e1", "MENTIONS", "tuition went up and a hike was organized"),
            edge("e2", "OPPOSES", "students rally against the tuition hike"),
            edge("e3", "LIKES", "unrelated"),
        ];
        let ranked = rank_edges(edges, "tuition hike", 10);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].1.uuid, "e2");
        assert!(ranked[0].0 >= EXACT_MATCH_SCORE);
        assert!(ranked[0].0 > ranked[1].0);
    }

    #[test]
    fn ties_keep_enumeration_order_and_limit_applies() {
        let edges = vec![
            edge("e1", "X", "protest one"),
            edge("e2", "X", "protest two"),
            edge("e3", "X", "protest three"),
        ];
        let ranked = rank_edges(edges, "protest", 2);
        let ids: Vec<_> = ranked.iter().map(|(_, e)| e.uuid.as_str()).collect();
        assert_eq!(ids, vec!["e1", "e2"]);
    }

    #[test]
    fn local_search_renders_node_facts() {
        let nodes = vec![NodeInfo {
            uuid: "n1".into(),
            name: "Alice".into(),
            labels: vec!["Entity".into(), "Student".into()],
            summary: "Alice leads the protest".into(),
            attributes: Map::new(),
        }];
        let result = local_search(None, Some(nodes), "alice", 5);
        assert_eq!(result.facts, vec!["[Alice]: Alice leads the protest"]);
        assert_eq!(result.nodes.len(), 1);
        assert!(result.edges.is_empty());
    }
}
