//! Schema types produced by catalog introspection
//!
//! These types describe a sandbox schema discovered at runtime. A
//! [`SchemaDescription`] is always regenerated in full; nothing here is
//! mutated after introspection builds it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized description of every table in one database schema
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDescription {
    /// Tables, unique by name and ordered by name
    pub entities: Vec<Entity>,

    /// Foreign-key relationships, one per constraint
    pub relationships: Vec<Relationship>,

    /// Index names grouped by owning table
    pub indexes: Vec<IndexGroup>,
}

/// A single table and its columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Table name
    pub name: String,

    /// Columns in display order (keys first, see [`Attribute::display_order`])
    pub attributes: Vec<Attribute>,
}

/// A single column of an [`Entity`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    /// Column name
    pub name: String,

    /// Normalized type name (e.g. `integer`, `int4[]`, `character_varying`)
    #[serde(rename = "type")]
    pub data_type: String,

    /// Key participation, absent for plain columns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<AttributeKey>,

    /// Nullability, rendered as the diagram comment
    pub comment: Nullability,
}

impl Attribute {
    /// Sort key implementing the display contract: primary keys, then
    /// foreign keys, then plain columns; not-null before nullable; then by
    /// type name and finally by column name.
    pub fn display_order(&self) -> (u8, Nullability, &str, &str) {
        let key_rank = match self.key {
            Some(AttributeKey::PrimaryKey) => 0,
            Some(AttributeKey::ForeignKey) => 1,
            None => 2,
        };

        (key_rank, self.comment, &self.data_type, &self.name)
    }
}

/// Key constraint a column takes part in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeKey {
    #[serde(rename = "PK")]
    PrimaryKey,
    #[serde(rename = "FK")]
    ForeignKey,
}

impl AttributeKey {
    pub fn as_str(self) -> &'static str {
        match self {
            AttributeKey::PrimaryKey => "PK",
            AttributeKey::ForeignKey => "FK",
        }
    }
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Column nullability
///
/// Ordered so that `NotNull` sorts before `Null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Nullability {
    #[serde(rename = "not null")]
    NotNull,
    #[serde(rename = "null")]
    Null,
}

impl Nullability {
    pub fn as_str(self) -> &'static str {
        match self {
            Nullability::NotNull => "not null",
            Nullability::Null => "null",
        }
    }
}

impl fmt::Display for Nullability {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// A foreign-key constraint between two tables
///
/// Composite keys collapse into one relationship listing every column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    /// Referencing side
    pub child: RelationshipSide,

    /// Referenced side
    pub parent: RelationshipSide,
}

/// One side of a [`Relationship`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipSide {
    /// Table name
    pub entity: String,

    /// Columns in constraint declaration order, without duplicates
    pub attributes: Vec<String>,
}

/// Index names belonging to one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexGroup {
    /// Owning table name
    pub name: String,

    /// Index names, sorted
    pub indexes: Vec<String>,
}

/// A column of a query result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    /// Column name as reported by the database (may repeat)
    pub name: String,
}

/// Result of a query in positional row form
///
/// Rows are arrays rather than objects so that duplicate column names in a
/// result set stay unambiguous.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOutput {
    /// Result columns, empty for statements that return no columns
    pub fields: Vec<Field>,

    /// Row values, each aligned with `fields`
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl QueryOutput {
    /// Whether the statement produced no result columns at all
    ///
    /// This is a successful outcome (e.g. DDL), to be shown as "No results".
    pub fn is_empty_result(&self) -> bool {
        self.fields.is_empty()
    }

    /// Reshape rows into objects keyed by field name
    ///
    /// Field order is preserved; when a name repeats, the later value wins.
    pub fn to_objects(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.fields
                    .iter()
                    .zip(row)
                    .map(|(field, value)| (field.name.clone(), value.clone()))
                    .collect()
            })
            .collect()
    }
}

/// Request to execute a query
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    /// SQL query to execute
    pub sql: String,
}

/// JSON document holding schema DDL, as served by the schema source and
/// accepted when loading a schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDocument {
    /// DDL text
    pub schema: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_attribute_serialization() {
        let attribute = Attribute {
            name: "id".to_string(),
            data_type: "integer".to_string(),
            key: Some(AttributeKey::PrimaryKey),
            comment: Nullability::NotNull,
        };

        assert_eq!(
            serde_json::to_value(&attribute).unwrap(),
            json!({ "name": "id", "type": "integer", "key": "PK", "comment": "not null" })
        );

        let plain = Attribute {
            key: None,
            comment: Nullability::Null,
            ..attribute
        };
        let value = serde_json::to_value(&plain).unwrap();
        assert!(value.get("key").is_none());
        assert_eq!(value["comment"], "null");
    }

    #[test]
    fn test_display_order_ranks_keys_first() {
        let make = |name: &str, key: Option<AttributeKey>, comment: Nullability| Attribute {
            name: name.to_string(),
            data_type: "text".to_string(),
            key,
            comment,
        };

        let mut attributes = vec![
            make("note", None, Nullability::Null),
            make("owner_id", Some(AttributeKey::ForeignKey), Nullability::Null),
            make("title", None, Nullability::NotNull),
            make("id", Some(AttributeKey::PrimaryKey), Nullability::NotNull),
        ];
        attributes.sort_by(|left, right| left.display_order().cmp(&right.display_order()));

        let names: Vec<&str> = attributes.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["id", "owner_id", "title", "note"]);
    }

    #[test]
    fn test_to_objects_keeps_field_order_and_last_duplicate() {
        let output = QueryOutput {
            fields: vec![
                Field { name: "id".to_string() },
                Field { name: "name".to_string() },
                Field { name: "id".to_string() },
            ],
            rows: vec![vec![json!(1), json!("Alice"), json!(7)]],
        };

        let objects = output.to_objects();
        assert_eq!(objects.len(), 1);
        let keys: Vec<&String> = objects[0].keys().collect();
        assert_eq!(keys, vec!["id", "name"]);
        assert_eq!(objects[0]["id"], json!(7));
    }

    #[test]
    fn test_empty_result_is_not_an_error_shape() {
        let output = QueryOutput::default();
        assert!(output.is_empty_result());
        assert_eq!(
            serde_json::to_value(&output).unwrap(),
            json!({ "fields": [], "rows": [] })
        );
    }
}
