//! Schema introspection
//!
//! Runs the backend's three catalog queries against a session and folds the
//! rows into a [`SchemaDescription`]. Grouping, type normalization and
//! ordering happen here, so every backend yields the same shape.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::database::traits::{DatabaseError, DatabaseSession};
use crate::schema::{
    Attribute, AttributeKey, Entity, IndexGroup, Nullability, Relationship, RelationshipSide,
    SchemaDescription,
};
use crate::{Error, Result};

/// Which catalog query an introspection failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SchemaQueryPurpose {
    Entities,
    Relationships,
    Indexes,
}

impl fmt::Display for SchemaQueryPurpose {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchemaQueryPurpose::Entities => "entities",
            SchemaQueryPurpose::Relationships => "relationships",
            SchemaQueryPurpose::Indexes => "indexes",
        };
        formatter.write_str(name)
    }
}

/// Describe every table, relationship and index of a schema
///
/// The three catalog queries run concurrently; if any of them fails the
/// whole description fails and partial results are dropped.
#[tracing::instrument(skip(session))]
pub async fn describe_schema<DB>(session: &DB, schema_name: &str) -> Result<SchemaDescription>
where
    DB: DatabaseSession + ?Sized,
{
    let (entities, relationships, indexes) = tokio::try_join!(
        describe_entities(session, schema_name),
        describe_relationships(session, schema_name),
        describe_indexes(session, schema_name),
    )?;

    tracing::debug!(
        entities = entities.len(),
        relationships = relationships.len(),
        indexes = indexes.len(),
        "schema described"
    );

    Ok(SchemaDescription {
        entities,
        relationships,
        indexes,
    })
}

/// Describe the tables of a schema and their columns
pub async fn describe_entities<DB>(session: &DB, schema_name: &str) -> Result<Vec<Entity>>
where
    DB: DatabaseSession + ?Sized,
{
    let purpose = SchemaQueryPurpose::Entities;
    let rows = catalog_rows(session, session.catalog().entities, schema_name, purpose).await?;

    let mut attributes_by_table: BTreeMap<String, Vec<Attribute>> = BTreeMap::new();
    for row in &rows {
        let table_name = text_column(row, 0, "table_name").map_err(wrap(purpose))?;
        let attribute = Attribute {
            name: text_column(row, 1, "column_name").map_err(wrap(purpose))?,
            data_type: normalize_type(
                &text_column(row, 2, "data_type").map_err(wrap(purpose))?,
                &text_column(row, 3, "udt_name").map_err(wrap(purpose))?,
            ),
            key: parse_key(optional_text_column(row, 5, "attribute_key").map_err(wrap(purpose))?)
                .map_err(wrap(purpose))?,
            comment: parse_nullability(&text_column(row, 4, "is_nullable").map_err(wrap(purpose))?),
        };

        attributes_by_table
            .entry(table_name)
            .or_default()
            .push(attribute);
    }

    Ok(attributes_by_table
        .into_iter()
        .map(|(name, mut attributes)| {
            attributes.sort_by(|left, right| left.display_order().cmp(&right.display_order()));
            Entity { name, attributes }
        })
        .collect())
}

/// Describe the foreign-key relationships of a schema
///
/// Rows sharing a constraint identity collapse into one relationship.
pub async fn describe_relationships<DB>(
    session: &DB,
    schema_name: &str,
) -> Result<Vec<Relationship>>
where
    DB: DatabaseSession + ?Sized,
{
    let purpose = SchemaQueryPurpose::Relationships;
    let rows =
        catalog_rows(session, session.catalog().relationships, schema_name, purpose).await?;

    let mut relationships: Vec<Relationship> = Vec::new();
    let mut position_by_constraint: HashMap<String, usize> = HashMap::new();

    for row in &rows {
        let constraint_id = text_column(row, 0, "constraint_id").map_err(wrap(purpose))?;
        let child_table = text_column(row, 1, "child_table").map_err(wrap(purpose))?;
        let child_column = text_column(row, 2, "child_column").map_err(wrap(purpose))?;
        let parent_table = text_column(row, 3, "parent_table").map_err(wrap(purpose))?;
        let parent_column = text_column(row, 4, "parent_column").map_err(wrap(purpose))?;

        let position = *position_by_constraint
            .entry(constraint_id)
            .or_insert_with(|| {
                relationships.push(Relationship {
                    child: RelationshipSide {
                        entity: child_table,
                        attributes: Vec::new(),
                    },
                    parent: RelationshipSide {
                        entity: parent_table,
                        attributes: Vec::new(),
                    },
                });
                relationships.len() - 1
            });

        let relationship = &mut relationships[position];
        push_unique(&mut relationship.child.attributes, child_column);
        push_unique(&mut relationship.parent.attributes, parent_column);
    }

    // Stable sort keeps constraint order between the same pair of tables
    relationships.sort_by(|left, right| {
        (left.parent.entity.as_str(), left.child.entity.as_str())
            .cmp(&(right.parent.entity.as_str(), right.child.entity.as_str()))
    });

    Ok(relationships)
}

/// Describe the indexes of a schema, grouped by table
pub async fn describe_indexes<DB>(session: &DB, schema_name: &str) -> Result<Vec<IndexGroup>>
where
    DB: DatabaseSession + ?Sized,
{
    let purpose = SchemaQueryPurpose::Indexes;
    let rows = catalog_rows(session, session.catalog().indexes, schema_name, purpose).await?;

    let mut indexes_by_table: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for row in &rows {
        let table_name = text_column(row, 0, "table_name").map_err(wrap(purpose))?;
        let index_name = text_column(row, 1, "index_name").map_err(wrap(purpose))?;
        indexes_by_table.entry(table_name).or_default().push(index_name);
    }

    Ok(indexes_by_table
        .into_iter()
        .map(|(name, mut indexes)| {
            indexes.sort();
            indexes.dedup();
            IndexGroup { name, indexes }
        })
        .collect())
}

/// Normalize a catalog type name for display
///
/// Arrays become `element[]`, user-defined types use their underlying type
/// name, and spaces in multi-word built-in names become underscores.
/// Length and precision modifiers such as `(10, 2)` are dropped.
pub fn normalize_type(data_type: &str, udt_name: &str) -> String {
    match data_type {
        "ARRAY" => format!("{}[]", udt_name.strip_prefix('_').unwrap_or(udt_name)),
        "USER-DEFINED" => udt_name.to_string(),
        other => strip_modifiers(other)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_"),
    }
}

fn strip_modifiers(data_type: &str) -> String {
    let mut depth = 0usize;
    data_type
        .chars()
        .filter(|character| match character {
            '(' => {
                depth += 1;
                false
            }
            ')' => {
                depth = depth.saturating_sub(1);
                false
            }
            _ => depth == 0,
        })
        .collect()
}

async fn catalog_rows<DB>(
    session: &DB,
    sql: &str,
    schema_name: &str,
    purpose: SchemaQueryPurpose,
) -> Result<Vec<Vec<Value>>>
where
    DB: DatabaseSession + ?Sized,
{
    match session.query(sql, &[schema_name]).await {
        Ok(output) => Ok(output.rows),
        Err(source) => {
            tracing::warn!(%purpose, error = %source, "catalog query failed");
            Err(Error::SchemaQuery { purpose, source })
        }
    }
}

fn wrap(purpose: SchemaQueryPurpose) -> impl Fn(DatabaseError) -> Error {
    move |source| Error::SchemaQuery { purpose, source }
}

fn optional_text_column(
    row: &[Value],
    index: usize,
    column: &str,
) -> std::result::Result<Option<String>, DatabaseError> {
    match row.get(index) {
        Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.clone())),
        Some(Value::Number(number)) => Ok(Some(number.to_string())),
        Some(other) => Err(DatabaseError::Serialization(format!(
            "catalog column {column} is not text: {other}"
        ))),
        None => Err(DatabaseError::Serialization(format!(
            "catalog row is missing column {column}"
        ))),
    }
}

fn text_column(
    row: &[Value],
    index: usize,
    column: &str,
) -> std::result::Result<String, DatabaseError> {
    optional_text_column(row, index, column)?.ok_or_else(|| {
        DatabaseError::Serialization(format!("catalog column {column} is unexpectedly null"))
    })
}

fn parse_key(key: Option<String>) -> std::result::Result<Option<AttributeKey>, DatabaseError> {
    match key.as_deref() {
        None => Ok(None),
        Some("PK") => Ok(Some(AttributeKey::PrimaryKey)),
        Some("FK") => Ok(Some(AttributeKey::ForeignKey)),
        Some(other) => Err(DatabaseError::Serialization(format!(
            "unknown attribute key {other}"
        ))),
    }
}

fn parse_nullability(is_nullable: &str) -> Nullability {
    if is_nullable.eq_ignore_ascii_case("YES") {
        Nullability::Null
    } else {
        Nullability::NotNull
    }
}

fn push_unique(attributes: &mut Vec<String>, name: String) {
    if !attributes.contains(&name) {
        attributes.push(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::sqlite::{SqliteSession, SqliteSessionOptions};
    use crate::database::traits::CatalogQueries;
    use crate::schema::QueryOutput;
    use async_trait::async_trait;

    async fn session_with(ddl: &str) -> SqliteSession {
        let session = SqliteSession::create(&SqliteSessionOptions::default())
            .await
            .unwrap();
        session.exec(ddl).await.unwrap();
        session
    }

    /// Session that answers every catalog query with canned rows, or fails
    /// for one purpose
    struct CannedSession {
        entities: Vec<Vec<Value>>,
        relationships: Vec<Vec<Value>>,
        failing: Option<SchemaQueryPurpose>,
    }

    static CANNED_CATALOG: CatalogQueries = CatalogQueries {
        entities: "entities",
        relationships: "relationships",
        indexes: "indexes",
    };

    #[async_trait]
    impl DatabaseSession for CannedSession {
        type Options = ();

        async fn create(_options: &()) -> std::result::Result<Self, DatabaseError> {
            Ok(Self {
                entities: Vec::new(),
                relationships: Vec::new(),
                failing: None,
            })
        }

        async fn exec(&self, _ddl: &str) -> std::result::Result<(), DatabaseError> {
            Ok(())
        }

        async fn query(
            &self,
            sql: &str,
            _parameters: &[&str],
        ) -> std::result::Result<QueryOutput, DatabaseError> {
            let purpose = match sql {
                "entities" => SchemaQueryPurpose::Entities,
                "relationships" => SchemaQueryPurpose::Relationships,
                _ => SchemaQueryPurpose::Indexes,
            };
            if self.failing == Some(purpose) {
                return Err(DatabaseError::Query("catalog unavailable".to_string()));
            }
            let rows = match purpose {
                SchemaQueryPurpose::Entities => self.entities.clone(),
                SchemaQueryPurpose::Relationships => self.relationships.clone(),
                SchemaQueryPurpose::Indexes => Vec::new(),
            };
            Ok(QueryOutput {
                fields: Vec::new(),
                rows,
            })
        }

        async fn close(&self) {}

        fn is_initialized(&self) -> bool {
            true
        }

        fn catalog(&self) -> &'static CatalogQueries {
            &CANNED_CATALOG
        }

        fn default_schema(&self) -> &str {
            "public"
        }
    }

    fn entity_row(table: &str, column: &str, data_type: &str, udt: &str, key: Option<&str>) -> Vec<Value> {
        vec![
            Value::from(table),
            Value::from(column),
            Value::from(data_type),
            Value::from(udt),
            Value::from("NO"),
            key.map(Value::from).unwrap_or(Value::Null),
        ]
    }

    #[test]
    fn test_normalize_type() {
        assert_eq!(normalize_type("ARRAY", "_int4"), "int4[]");
        assert_eq!(normalize_type("USER-DEFINED", "mood"), "mood");
        assert_eq!(normalize_type("character varying", "varchar"), "character_varying");
        assert_eq!(
            normalize_type("timestamp with time zone", "timestamptz"),
            "timestamp_with_time_zone"
        );
        assert_eq!(normalize_type("integer", "int4"), "integer");
    }

    #[test]
    fn test_normalize_type_drops_modifiers() {
        assert_eq!(normalize_type("DECIMAL(10, 2)", ""), "DECIMAL");
        assert_eq!(normalize_type("VARCHAR(255)", ""), "VARCHAR");
        assert_eq!(normalize_type("NUMERIC (8)", ""), "NUMERIC");
        assert_eq!(
            normalize_type("TIMESTAMP(3) WITH TIME ZONE", ""),
            "TIMESTAMP_WITH_TIME_ZONE"
        );
    }

    #[tokio::test]
    async fn test_parameterized_types_render_in_diagram() {
        let session =
            session_with("CREATE TABLE items(id INTEGER PRIMARY KEY, price DECIMAL(10, 2));").await;

        let description = describe_schema(&session, "main").await.unwrap();
        let price = &description.entities[0].attributes[1];
        assert_eq!(price.data_type, "DECIMAL");

        let diagram = crate::diagram::generate_diagram(&description);
        assert!(diagram.contains("        price DECIMAL \"null\""), "{diagram}");
    }

    #[tokio::test]
    async fn test_round_trip_two_tables() {
        let session = session_with(
            "CREATE TABLE a(id INT PRIMARY KEY); CREATE TABLE b(id INT PRIMARY KEY, a_id INT REFERENCES a(id));",
        )
        .await;

        let description = describe_schema(&session, "main").await.unwrap();

        let names: Vec<&str> = description.entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);

        assert_eq!(description.relationships.len(), 1);
        let relationship = &description.relationships[0];
        assert_eq!(relationship.parent.entity, "a");
        assert_eq!(relationship.child.entity, "b");
        assert_eq!(relationship.child.attributes, vec!["a_id"]);
        assert_eq!(relationship.parent.attributes, vec!["id"]);
    }

    #[tokio::test]
    async fn test_attribute_keys_types_and_order() {
        let session = session_with(
            "CREATE TABLE owners (id INTEGER PRIMARY KEY);
             CREATE TABLE pets (
                 nickname TEXT,
                 name TEXT NOT NULL,
                 owner_id INTEGER NOT NULL REFERENCES owners(id),
                 id INTEGER PRIMARY KEY,
                 born DATE
             );",
        )
        .await;

        let entities = describe_entities(&session, "main").await.unwrap();
        let pets = entities.iter().find(|e| e.name == "pets").unwrap();

        let summary: Vec<(&str, Option<AttributeKey>, Nullability, &str)> = pets
            .attributes
            .iter()
            .map(|a| (a.name.as_str(), a.key, a.comment, a.data_type.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("id", Some(AttributeKey::PrimaryKey), Nullability::NotNull, "INTEGER"),
                ("owner_id", Some(AttributeKey::ForeignKey), Nullability::NotNull, "INTEGER"),
                ("name", None, Nullability::NotNull, "TEXT"),
                ("born", None, Nullability::Null, "DATE"),
                ("nickname", None, Nullability::Null, "TEXT"),
            ]
        );
    }

    #[tokio::test]
    async fn test_composite_foreign_key_is_one_relationship() {
        let session = session_with(
            "CREATE TABLE courses (term TEXT, code TEXT, PRIMARY KEY (term, code));
             CREATE TABLE enrollments (
                 student TEXT,
                 term TEXT,
                 code TEXT,
                 FOREIGN KEY (term, code) REFERENCES courses(term, code)
             );",
        )
        .await;

        let relationships = describe_relationships(&session, "main").await.unwrap();
        assert_eq!(relationships.len(), 1);
        assert_eq!(relationships[0].child.entity, "enrollments");
        assert_eq!(relationships[0].child.attributes, vec!["term", "code"]);
        assert_eq!(relationships[0].parent.entity, "courses");
        assert_eq!(relationships[0].parent.attributes, vec!["term", "code"]);
    }

    #[tokio::test]
    async fn test_relationships_ordered_by_parent_then_child() {
        let session = session_with(
            "CREATE TABLE users (id INTEGER PRIMARY KEY);
             CREATE TABLE products (id INTEGER PRIMARY KEY);
             CREATE TABLE reviews (user_id INTEGER REFERENCES users(id), product_id INTEGER REFERENCES products(id));
             CREATE TABLE orders (user_id INTEGER REFERENCES users(id), product_id INTEGER REFERENCES products(id));",
        )
        .await;

        let relationships = describe_relationships(&session, "main").await.unwrap();
        let pairs: Vec<(&str, &str)> = relationships
            .iter()
            .map(|r| (r.parent.entity.as_str(), r.child.entity.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("products", "orders"),
                ("products", "reviews"),
                ("users", "orders"),
                ("users", "reviews"),
            ]
        );
    }

    #[tokio::test]
    async fn test_tables_without_foreign_keys_or_indexes() {
        let session = session_with(
            "CREATE TABLE notes (body TEXT);
             CREATE TABLE tags (label TEXT);
             CREATE INDEX tags_label_idx ON tags(label);
             CREATE INDEX tags_a_idx ON tags(label);",
        )
        .await;

        let description = describe_schema(&session, "main").await.unwrap();
        assert_eq!(description.entities.len(), 2);
        assert!(description.relationships.is_empty());
        assert_eq!(
            description.indexes,
            vec![IndexGroup {
                name: "tags".to_string(),
                indexes: vec!["tags_a_idx".to_string(), "tags_label_idx".to_string()],
            }]
        );
    }

    #[tokio::test]
    async fn test_unknown_schema_is_empty() {
        let session = session_with("CREATE TABLE notes (body TEXT);").await;
        let description = describe_schema(&session, "nowhere").await.unwrap();
        assert_eq!(description, SchemaDescription::default());
    }

    #[tokio::test]
    async fn test_canned_rows_normalize_postgres_types() {
        let session = CannedSession {
            entities: vec![
                entity_row("users", "tags", "ARRAY", "_text", None),
                entity_row("users", "mood", "USER-DEFINED", "mood", None),
                entity_row("users", "id", "integer", "int4", Some("PK")),
            ],
            relationships: Vec::new(),
            failing: None,
        };

        let entities = describe_entities(&session, "public").await.unwrap();
        let types: Vec<&str> = entities[0]
            .attributes
            .iter()
            .map(|a| a.data_type.as_str())
            .collect();
        assert_eq!(types, vec!["integer", "mood", "text[]"]);
    }

    #[tokio::test]
    async fn test_duplicate_columns_in_constraint_rows_are_collapsed() {
        let row = |child: &str, parent: &str| {
            vec![
                Value::from("orders.fk_user"),
                Value::from("orders"),
                Value::from(child),
                Value::from("users"),
                Value::from(parent),
            ]
        };
        let session = CannedSession {
            entities: Vec::new(),
            relationships: vec![row("user_id", "id"), row("user_id", "id")],
            failing: None,
        };

        let relationships = describe_relationships(&session, "public").await.unwrap();
        assert_eq!(relationships.len(), 1);
        assert_eq!(relationships[0].child.attributes, vec!["user_id"]);
        assert_eq!(relationships[0].parent.attributes, vec!["id"]);
    }

    #[tokio::test]
    async fn test_failing_query_fails_whole_description() {
        let session = CannedSession {
            entities: vec![entity_row("users", "id", "integer", "int4", Some("PK"))],
            relationships: Vec::new(),
            failing: Some(SchemaQueryPurpose::Relationships),
        };

        let error = describe_schema(&session, "public").await.unwrap_err();
        match error {
            Error::SchemaQuery { purpose, .. } => {
                assert_eq!(purpose, SchemaQueryPurpose::Relationships)
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_catalog_row_is_a_schema_query_error() {
        let session = CannedSession {
            entities: vec![vec![Value::from("users")]],
            relationships: Vec::new(),
            failing: None,
        };

        let error = describe_entities(&session, "public").await.unwrap_err();
        assert!(matches!(
            error,
            Error::SchemaQuery {
                purpose: SchemaQueryPurpose::Entities,
                source: DatabaseError::Serialization(_),
            }
        ));
    }
}
