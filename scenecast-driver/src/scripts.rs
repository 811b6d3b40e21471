//! Script execution endpoints

use crate::WebDriverClient;
use crate::error::Result;
use serde_json::{Value as JsonValue, json};

impl WebDriverClient {
    /// Run a synchronous script in the focused window
    ///
    /// # Arguments
    /// * `script` - Function body; `arguments[n]` holds the n-th argument
    /// * `args` - Script arguments (element references are passed as-is)
    ///
    /// # Returns
    /// The script's return value
    pub async fn execute(
        &self,
        session_id: &str,
        script: &str,
        args: Vec<JsonValue>,
    ) -> Result<JsonValue> {
        let url = self.session_url(session_id, "/execute/sync");
        let response = self
            .client
            .post(&url)
            .json(&json!({ "script": script, "args": args }))
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Run an asynchronous script in the focused window
    ///
    /// The script completes by calling `arguments[arguments.length - 1]`
    /// with its result, bounded by the session's script timeout.
    pub async fn execute_async(
        &self,
        session_id: &str,
        script: &str,
        args: Vec<JsonValue>,
    ) -> Result<JsonValue> {
        let url = self.session_url(session_id, "/execute/async");
        let response = self
            .client
            .post(&url)
            .json(&json!({ "script": script, "args": args }))
            .send()
            .await?;

        self.handle_response(response).await
    }
}
