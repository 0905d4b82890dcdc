//! Query editor completion
//!
//! [`build_completion_context`] pools table and column names out of a schema
//! description; a [`CompletionProvider`] turns the word under the cursor into
//! ranked candidates. Column names are pooled across all tables, so a column
//! candidate does not say which table it belongs to.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::schema::SchemaDescription;

/// SQL keywords offered by every provider
pub const SQL_KEYWORDS: &[&str] = &[
    "ADD", "ALL", "ALTER", "AND", "AS", "ASC", "AVG", "BETWEEN", "BY", "CASE", "CAST",
    "COALESCE", "COUNT", "CREATE", "CROSS", "DEFAULT", "DELETE", "DESC", "DISTINCT", "DROP",
    "ELSE", "END", "EXCEPT", "EXISTS", "FALSE", "FOREIGN", "FROM", "FULL", "GROUP", "HAVING",
    "IN", "INDEX", "INNER", "INSERT", "INTERSECT", "INTO", "IS", "JOIN", "KEY", "LEFT", "LIKE",
    "LIMIT", "MAX", "MIN", "NOT", "NULL", "OFFSET", "ON", "OR", "ORDER", "OUTER", "OVER",
    "PARTITION", "PRIMARY", "REFERENCES", "RETURNING", "RIGHT", "SELECT", "SET", "SUM",
    "TABLE", "THEN", "TRUE", "UNION", "UNIQUE", "UPDATE", "USING", "VALUES", "WHEN", "WHERE",
    "WITH",
];

/// Table and column names available for completion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionContext {
    pub tables: BTreeSet<String>,
    pub columns: BTreeSet<String>,
}

/// Pool the table names and column names of a schema
pub fn build_completion_context(description: &SchemaDescription) -> CompletionContext {
    let tables = description
        .entities
        .iter()
        .map(|entity| entity.name.clone())
        .collect();

    let columns = description
        .entities
        .iter()
        .flat_map(|entity| entity.attributes.iter())
        .map(|attribute| attribute.name.clone())
        .collect();

    CompletionContext { tables, columns }
}

/// Where a completion candidate comes from
///
/// Variants are declared in ranking order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CompletionKind {
    Table,
    Column,
    Keyword,
}

/// A single suggestion for the word under the cursor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionCandidate {
    /// Text to insert
    pub label: String,

    /// Candidate pool the label was drawn from
    pub kind: CompletionKind,

    /// First column (1-based) of the word being replaced
    pub start_column: usize,

    /// Column (1-based) just past the word being replaced, i.e. the cursor
    pub end_column: usize,
}

/// Request for completions at a cursor position
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    /// Full text of the line the cursor is on
    pub line_text: String,

    /// Cursor column, 1-based
    pub cursor_column: usize,
}

/// Response listing ranked completion candidates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResponse {
    pub candidates: Vec<CompletionCandidate>,
}

/// Capability a query editor depends on to offer completions
pub trait CompletionProvider: Send + Sync {
    /// Ranked candidates for the word ending at `cursor_column` (1-based)
    fn complete(&self, line_text: &str, cursor_column: usize) -> Vec<CompletionCandidate>;
}

/// Offers SQL keywords only; used before any schema is known
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordCompletionProvider;

impl CompletionProvider for KeywordCompletionProvider {
    fn complete(&self, line_text: &str, cursor_column: usize) -> Vec<CompletionCandidate> {
        let word = WordAtCursor::new(line_text, cursor_column);
        let mut candidates = Vec::new();
        word.collect_keywords(&mut candidates);
        candidates
    }
}

/// Offers tables and columns of the loaded schema, then SQL keywords
#[derive(Debug, Clone, Default)]
pub struct SchemaCompletionProvider {
    context: CompletionContext,
}

impl SchemaCompletionProvider {
    /// Complete against the tables and columns in `context`
    pub fn new(context: CompletionContext) -> Self {
        Self { context }
    }

    /// Names this provider completes against
    pub fn context(&self) -> &CompletionContext {
        &self.context
    }
}

impl CompletionProvider for SchemaCompletionProvider {
    fn complete(&self, line_text: &str, cursor_column: usize) -> Vec<CompletionCandidate> {
        let word = WordAtCursor::new(line_text, cursor_column);
        let mut candidates = Vec::new();

        word.collect(&self.context.tables, CompletionKind::Table, &mut candidates);
        word.collect(&self.context.columns, CompletionKind::Column, &mut candidates);
        word.collect_keywords(&mut candidates);

        candidates
    }
}

/// The identifier fragment immediately left of the cursor
#[derive(Debug, Clone, PartialEq, Eq)]
struct WordAtCursor {
    prefix: String,
    start_column: usize,
    end_column: usize,
}

impl WordAtCursor {
    fn new(line_text: &str, cursor_column: usize) -> Self {
        let characters: Vec<char> = line_text.chars().collect();
        let cursor = cursor_column.saturating_sub(1).min(characters.len());

        let mut start = cursor;
        while start > 0 && is_word_character(characters[start - 1]) {
            start -= 1;
        }

        Self {
            prefix: characters[start..cursor].iter().collect::<String>().to_lowercase(),
            start_column: start + 1,
            end_column: cursor + 1,
        }
    }

    fn matches(&self, label: &str) -> bool {
        label.to_lowercase().starts_with(&self.prefix)
    }

    fn candidate(&self, label: &str, kind: CompletionKind) -> CompletionCandidate {
        CompletionCandidate {
            label: label.to_string(),
            kind,
            start_column: self.start_column,
            end_column: self.end_column,
        }
    }

    fn collect(
        &self,
        labels: &BTreeSet<String>,
        kind: CompletionKind,
        candidates: &mut Vec<CompletionCandidate>,
    ) {
        candidates.extend(
            labels
                .iter()
                .filter(|label| self.matches(label))
                .map(|label| self.candidate(label, kind)),
        );
    }

    fn collect_keywords(&self, candidates: &mut Vec<CompletionCandidate>) {
        let mut keywords: Vec<&str> = SQL_KEYWORDS
            .iter()
            .copied()
            .filter(|keyword| self.matches(keyword))
            .collect();
        keywords.sort_unstable();

        candidates.extend(
            keywords
                .into_iter()
                .map(|keyword| self.candidate(keyword, CompletionKind::Keyword)),
        );
    }
}

fn is_word_character(character: char) -> bool {
    character.is_alphanumeric() || character == '_'
}
