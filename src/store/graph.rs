//! In-memory fact graph: entities connected through the statements that
//! mention them, with bounded breadth-first traversal.
//!
//! Entities are keyed by lowercased name per owner, with a stemmed index on
//! the side so "deploying" still seeds the entity "deploy". Statements are
//! the edges: each statement links its subject entity to its object entity
//! (unary facts attach to the subject only).

use rust_stemmers::{Algorithm, Stemmer};
use std::collections::{HashMap, HashSet, VecDeque};

use crate::constants::KEYWORD_MIN_TOKEN_LEN;
use crate::types::{Statement, StatementId};

#[derive(Default)]
struct OwnerGraph {
    /// entity key -> statements mentioning it
    entity_statements: HashMap<String, HashSet<StatementId>>,

    /// statement -> the entity keys it connects
    statement_entities: HashMap<StatementId, Vec<String>>,

    /// stemmed entity token -> entity keys
    stemmed_index: HashMap<String, HashSet<String>>,
}

/// Fact graph across all owners. Callers hold this behind a RwLock.
#[derive(Default)]
pub struct FactGraph {
    owners: HashMap<String, OwnerGraph>,
}

fn entity_key(name: &str) -> String {
    name.trim().to_lowercase()
}

impl FactGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a statement's entity links.
    pub fn insert(&mut self, statement: &Statement) {
        let graph = self.owners.entry(statement.owner_id.clone()).or_default();
        let stemmer = Stemmer::create(Algorithm::English);

        let mut keys = Vec::new();
        for name in [statement.subject.as_str(), statement.object.as_str()] {
            let key = entity_key(name);
            if key.is_empty() {
                continue;
            }
            graph
                .entity_statements
                .entry(key.clone())
                .or_default()
                .insert(statement.id);
            for token in key.split_whitespace() {
                let stem = stemmer.stem(token).to_string();
                graph.stemmed_index.entry(stem).or_default().insert(key.clone());
            }
            keys.push(key);
        }
        graph.statement_entities.insert(statement.id, keys);
    }

    /// Remove a statement's entity links.
    pub fn remove(&mut self, owner_id: &str, statement_id: &StatementId) {
        let Some(graph) = self.owners.get_mut(owner_id) else {
            return;
        };
        if let Some(keys) = graph.statement_entities.remove(statement_id) {
            for key in keys {
                if let Some(set) = graph.entity_statements.get_mut(&key) {
                    set.remove(statement_id);
                    if set.is_empty() {
                        graph.entity_statements.remove(&key);
                    }
                }
            }
        }
    }

    /// Recognise graph entities mentioned in the query text.
    ///
    /// Matches exact lowercased entity names first, then falls back to
    /// stemmed token matching. An explicit entity filter, when non-empty,
    /// restricts the result to those names.
    pub fn match_entities(&self, owner_id: &str, query: &str, entity_filter: &[String]) -> Vec<String> {
        let Some(graph) = self.owners.get(owner_id) else {
            return Vec::new();
        };
        let stemmer = Stemmer::create(Algorithm::English);
        let query_lower = query.to_lowercase();

        let mut matched: HashSet<String> = HashSet::new();

        // Multi-word entity names match as substrings of the query.
        for key in graph.entity_statements.keys() {
            if key.contains(' ') && query_lower.contains(key.as_str()) {
                matched.insert(key.clone());
            }
        }

        for raw in query_lower.split(|c: char| !c.is_alphanumeric()) {
            if raw.len() < KEYWORD_MIN_TOKEN_LEN {
                continue;
            }
            if graph.entity_statements.contains_key(raw) {
                matched.insert(raw.to_string());
                continue;
            }
            let stem = stemmer.stem(raw).to_string();
            if let Some(keys) = graph.stemmed_index.get(&stem) {
                matched.extend(keys.iter().cloned());
            }
        }

        if !entity_filter.is_empty() {
            let allowed: HashSet<String> = entity_filter.iter().map(|e| entity_key(e)).collect();
            matched.retain(|k| allowed.contains(k));
        }

        let mut out: Vec<String> = matched.into_iter().collect();
        out.sort(); // deterministic seed order
        out
    }

    /// Bounded BFS from seed entities through statements.
    ///
    /// Returns each reached statement with its hop distance: statements
    /// touching a seed entity are hop 0, statements reached through one
    /// intermediate entity are hop 1, and so on up to `max_depth`. A
    /// statement reachable at several depths reports the smallest.
    pub fn bfs(&self, owner_id: &str, seeds: &[String], max_depth: usize) -> Vec<(StatementId, usize)> {
        let Some(graph) = self.owners.get(owner_id) else {
            return Vec::new();
        };

        let mut visited_entities: HashSet<String> = HashSet::new();
        let mut statement_hops: HashMap<StatementId, usize> = HashMap::new();
        let mut frontier: VecDeque<(String, usize)> = VecDeque::new();

        for seed in seeds {
            let key = entity_key(seed);
            if graph.entity_statements.contains_key(&key) && visited_entities.insert(key.clone()) {
                frontier.push_back((key, 0));
            }
        }

        while let Some((entity, hop)) = frontier.pop_front() {
            let Some(statements) = graph.entity_statements.get(&entity) else {
                continue;
            };
            for stmt_id in statements {
                let entry = statement_hops.entry(*stmt_id).or_insert(hop);
                if *entry > hop {
                    *entry = hop;
                }
                if hop >= max_depth {
                    continue;
                }
                if let Some(neighbors) = graph.statement_entities.get(stmt_id) {
                    for neighbor in neighbors {
                        if visited_entities.insert(neighbor.clone()) {
                            frontier.push_back((neighbor.clone(), hop + 1));
                        }
                    }
                }
            }
        }

        let mut out: Vec<(StatementId, usize)> = statement_hops.into_iter().collect();
        // Deterministic: by hop, then id
        out.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        out
    }

    /// Number of distinct entities for an owner.
    pub fn entity_count(&self, owner_id: &str) -> usize {
        self.owners
            .get(owner_id)
            .map(|g| g.entity_statements.len())
            .unwrap_or(0)
    }
}
