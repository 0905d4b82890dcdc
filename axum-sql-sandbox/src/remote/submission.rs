//! Solution submission

use std::time::Duration;

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema::QueryOutput;

/// Body posted to the submission endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub query: String,

    /// Result rows keyed by column name
    pub result: Vec<Map<String, Value>>,
}

impl Submission {
    pub fn from_output(query: impl Into<String>, output: &QueryOutput) -> Self {
        Self {
            query: query.into(),
            result: output.to_objects(),
        }
    }
}

/// Posts solutions to one exercise's submission endpoint
pub struct SubmissionClient {
    client: Client,
    endpoint: Url,
}

impl SubmissionClient {
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(endpoint: Url, timeout: Duration) -> crate::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }

    /// Submission endpoint of the exercise page at `exercise_url`, i.e. its
    /// `submit/` sub-path
    pub fn for_exercise(exercise_url: Url, timeout: Duration) -> crate::Result<Self> {
        let mut endpoint = exercise_url;
        if let Ok(mut segments) = endpoint.path_segments_mut() {
            segments.pop_if_empty().extend(["submit", ""]);
        }
        Self::new(endpoint, timeout)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Post a query together with its result; non-2xx responses are errors
    #[tracing::instrument(skip_all, fields(endpoint = %self.endpoint))]
    pub async fn submit(&self, query: &str, output: &QueryOutput) -> crate::Result<()> {
        let submission = Submission::from_output(query, output);

        self.client
            .post(self.endpoint.clone())
            .json(&submission)
            .send()
            .await?
            .error_for_status()?;

        tracing::info!(rows = submission.result.len(), "solution submitted");
        Ok(())
    }
}
