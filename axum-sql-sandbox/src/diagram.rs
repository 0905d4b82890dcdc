//! Mermaid ER diagram generation
//!
//! Turns a [`SchemaDescription`] into `erDiagram` text for the Mermaid
//! renderer. The output is deterministic: the renderer is sensitive to exact
//! syntax and the same schema must always produce the same bytes.

use crate::schema::{Attribute, Entity, Relationship, SchemaDescription};

/// First line of every diagram
pub const DIAGRAM_HEADER: &str = "erDiagram";

/// Render a schema description as a Mermaid ER diagram
///
/// Entities come first, then relationships; empty sections are left out and
/// sections are separated by a blank line. Indexes are not rendered.
///
/// # Example
///
/// ```rust
/// use axum_sql_sandbox::diagram::generate_diagram;
/// use axum_sql_sandbox::SchemaDescription;
///
/// assert_eq!(generate_diagram(&SchemaDescription::default()), "erDiagram");
/// ```
pub fn generate_diagram(description: &SchemaDescription) -> String {
    let mut sections = vec![DIAGRAM_HEADER.to_string()];

    if !description.entities.is_empty() {
        sections.push(
            description
                .entities
                .iter()
                .map(render_entity)
                .collect::<Vec<_>>()
                .join("\n\n"),
        );
    }

    if !description.relationships.is_empty() {
        sections.push(
            description
                .relationships
                .iter()
                .map(render_relationship)
                .collect::<Vec<_>>()
                .join("\n"),
        );
    }

    sections.join("\n\n")
}

fn render_entity(entity: &Entity) -> String {
    let mut lines = Vec::with_capacity(entity.attributes.len() + 2);
    lines.push(format!("    {} {{", entity.name));
    lines.extend(entity.attributes.iter().map(render_attribute));
    lines.push("    }".to_string());
    lines.join("\n")
}

fn render_attribute(attribute: &Attribute) -> String {
    let key = match attribute.key {
        Some(key) => format!(" {key} "),
        None => " ".to_string(),
    };

    format!(
        "        {} {}{}\"{}\"",
        attribute.name, attribute.data_type, key, attribute.comment
    )
}

// Many child rows reference one parent row
fn render_relationship(relationship: &Relationship) -> String {
    let child = &relationship.child;
    let parent = &relationship.parent;

    format!(
        "    {} ||--o{{ {} : \"{}({}) -> {}({})\"",
        parent.entity,
        child.entity,
        child.entity,
        child.attributes.join(", "),
        parent.entity,
        parent.attributes.join(", ")
    )
}
