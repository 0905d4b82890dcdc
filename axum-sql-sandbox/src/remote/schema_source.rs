//! Reqwest-backed schema source

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};

use super::SchemaSource;
use crate::schema::SchemaDocument;

/// Fetches `{base_url}/admin/exercise/schemas/{id}/json/`
pub struct HttpSchemaSource {
    client: Client,
    base_url: Url,
}

impl HttpSchemaSource {
    /// Build a source using a reqwest client with an explicit request timeout
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(base_url: Url, timeout: Duration) -> crate::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    fn schema_url(&self, schema_id: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["admin", "exercise", "schemas", schema_id, "json", ""]);
        }
        url
    }
}

#[async_trait]
impl SchemaSource for HttpSchemaSource {
    #[tracing::instrument(skip(self))]
    async fn fetch_schema(&self, schema_id: &str) -> crate::Result<SchemaDocument> {
        let response = self
            .client
            .get(self.schema_url(schema_id))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?;

        let body = response.bytes().await?;
        let document: SchemaDocument = serde_json::from_slice(&body)?;
        tracing::debug!(bytes = body.len(), "fetched schema document");

        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use axum::{extract::Path, http::StatusCode, routing::get, Json, Router};
    use serde_json::json;

    async fn serve(router: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        Url::parse(&format!("http://{address}")).unwrap()
    }

    fn exercise_server() -> Router {
        Router::new()
            .route(
                "/admin/exercise/schemas/{id}/json/",
                get(|Path(id): Path<String>| async move {
                    if id == "missing" {
                        return Err(StatusCode::NOT_FOUND);
                    }
                    Ok(Json(json!({ "schema": format!("CREATE TABLE t{id} (id INT);") })))
                }),
            )
            .route(
                "/admin/exercise/schemas/broken/json/",
                get(|| async { "not json" }),
            )
    }

    #[test]
    fn test_schema_url() {
        let source = HttpSchemaSource::new(
            Url::parse("http://localhost:8000/").unwrap(),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            source.schema_url("42").as_str(),
            "http://localhost:8000/admin/exercise/schemas/42/json/"
        );

        let nested = HttpSchemaSource::new(
            Url::parse("http://localhost:8000/course").unwrap(),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(
            nested.schema_url("42").as_str(),
            "http://localhost:8000/course/admin/exercise/schemas/42/json/"
        );
    }

    #[tokio::test]
    async fn test_fetch_schema() {
        let source = HttpSchemaSource::new(serve(exercise_server()).await, Duration::from_secs(5))
            .unwrap();

        let document = source.fetch_schema("3").await.unwrap();
        assert_eq!(document.schema, "CREATE TABLE t3 (id INT);");
    }

    #[tokio::test]
    async fn test_fetch_schema_failures() {
        let source = HttpSchemaSource::new(serve(exercise_server()).await, Duration::from_secs(5))
            .unwrap();

        assert!(matches!(
            source.fetch_schema("missing").await,
            Err(Error::Http(_))
        ));
        assert!(matches!(
            source.fetch_schema("broken").await,
            Err(Error::Serialization(_))
        ));
    }
}
