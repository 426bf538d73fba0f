//! BM25 keyword index over statement text, built on tantivy.
//!
//! One document per statement: the fact text is tokenized for ranking, the
//! subject/object entity names are indexed alongside it, and the statement
//! id is stored for lookup. Scores are raw BM25 and therefore wide-range;
//! the quality filter accounts for that with its graph-source floor.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, Schema, Value, STORED, STRING, TEXT};
use tantivy::{Index, IndexReader, IndexWriter, TantivyDocument};
use tracing::debug;

use crate::types::StatementId;

/// 15MB writer heap; statements are short documents.
const WRITER_HEAP_BYTES: usize = 15_000_000;

pub struct StatementIndex {
    index: Index,
    reader: IndexReader,
    writer: Arc<RwLock<IndexWriter>>,
    id_field: Field,
    fact_field: Field,
    entities_field: Field,
    owner_field: Field,
}

impl StatementIndex {
    /// Create or open an on-disk index at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;
        let dir = tantivy::directory::MmapDirectory::open(path)
            .context("Failed to open tantivy directory")?;

        let schema = Self::schema();
        let index = if Index::exists(&dir)? {
            Index::open(dir).context("Failed to open existing statement index")?
        } else {
            Index::create_in_dir(path, schema).context("Failed to create statement index")?
        };

        Self::from_index(index)
    }

    /// Create a volatile in-RAM index.
    pub fn in_memory() -> Result<Self> {
        let index = Index::create_in_ram(Self::schema());
        Self::from_index(index)
    }

    fn schema() -> Schema {
        let mut builder = Schema::builder();
        builder.add_text_field("id", STRING | STORED);
        builder.add_text_field("fact", TEXT | STORED);
        builder.add_text_field("entities", TEXT);
        builder.add_text_field("owner", STRING | STORED);
        builder.build()
    }

    fn from_index(index: Index) -> Result<Self> {
        let schema = index.schema();
        let id_field = schema.get_field("id")?;
        let fact_field = schema.get_field("fact")?;
        let entities_field = schema.get_field("entities")?;
        let owner_field = schema.get_field("owner")?;

        let writer = index
            .writer(WRITER_HEAP_BYTES)
            .context("Failed to create index writer")?;

        let reader = index
            .reader_builder()
            .reload_policy(tantivy::ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .context("Failed to create index reader")?;

        Ok(Self {
            index,
            reader,
            writer: Arc::new(RwLock::new(writer)),
            id_field,
            fact_field,
            entities_field,
            owner_field,
        })
    }

    /// Add or update a statement document.
    pub fn upsert(
        &self,
        statement_id: &StatementId,
        fact: &str,
        entities: &[String],
        owner_id: &str,
    ) -> Result<()> {
        let writer = self.writer.write();

        let id_term = tantivy::Term::from_field_text(self.id_field, &statement_id.0.to_string());
        writer.delete_term(id_term);

        let mut doc = TantivyDocument::new();
        doc.add_text(self.id_field, statement_id.0.to_string());
        doc.add_text(self.fact_field, fact);
        doc.add_text(self.entities_field, entities.join(" "));
        doc.add_text(self.owner_field, owner_id);

        writer.add_document(doc)?;
        Ok(())
    }

    /// Remove a statement document.
    pub fn delete(&self, statement_id: &StatementId) -> Result<()> {
        let writer = self.writer.write();
        let id_term = tantivy::Term::from_field_text(self.id_field, &statement_id.0.to_string());
        writer.delete_term(id_term);
        Ok(())
    }

    /// Commit pending changes and reload the reader so they are searchable.
    pub fn commit(&self) -> Result<()> {
        {
            let mut writer = self.writer.write();
            writer.commit().context("Failed to commit statement index")?;
        }
        self.reader.reload()?;
        Ok(())
    }

    /// BM25 search restricted to one owner.
    ///
    /// Returns (statement_id, score) pairs sorted by score descending.
    pub fn search(&self, query: &str, owner_id: &str, limit: usize) -> Result<Vec<(StatementId, f32)>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();
        let query_parser =
            QueryParser::for_index(&self.index, vec![self.fact_field, self.entities_field]);

        // Tantivy query syntax characters in free text break parsing; strip
        // them and retry once before giving up.
        let parsed_query = match query_parser.parse_query(query) {
            Ok(q) => q,
            Err(e) => {
                debug!("keyword query parse error for '{}': {}", query, e);
                let escaped = query.replace(
                    [
                        ':', '^', '~', '*', '?', '[', ']', '{', '}', '(', ')', '"', '\\', '/',
                        '+', '-', '!', '&', '|',
                    ],
                    " ",
                );
                match query_parser.parse_query(&escaped) {
                    Ok(q) => q,
                    Err(_) => return Ok(Vec::new()),
                }
            }
        };

        // Over-fetch so the owner filter can reject foreign documents
        // without starving the caller's limit.
        let top_docs = searcher
            .search(&parsed_query, &TopDocs::with_limit(limit * 4))
            .context("keyword search failed")?;

        let mut results = Vec::with_capacity(limit);

        for (score, doc_address) in top_docs {
            if results.len() >= limit {
                break;
            }
            let Ok(doc) = searcher.doc::<TantivyDocument>(doc_address) else {
                continue;
            };
            let matches_owner = doc
                .get_first(self.owner_field)
                .and_then(|v| v.as_str())
                .map(|o| o == owner_id)
                .unwrap_or(false);
            if !matches_owner {
                continue;
            }

            if let Some(id_value) = doc.get_first(self.id_field) {
                if let Some(id_str) = id_value.as_str() {
                    if let Ok(uuid) = uuid::Uuid::parse_str(id_str) {
                        results.push((StatementId(uuid), score));
                    }
                }
            }
        }

        Ok(results)
    }

    pub fn len(&self) -> usize {
        self.reader.searcher().num_docs() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
