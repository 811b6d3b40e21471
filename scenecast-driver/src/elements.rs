//! Element lookup and interaction endpoints

use crate::WebDriverClient;
use crate::error::{Result, WebDriverError};
use serde_json::{Value as JsonValue, json};

/// Key under which W3C drivers return element references
pub(crate) const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Enter key as a WebDriver key code
pub(crate) const KEY_ENTER: &str = "\u{E007}";

/// Wraps an element id so it can be passed to a script as an argument
pub(crate) fn element_arg(element_id: &str) -> JsonValue {
    json!({ ELEMENT_KEY: element_id })
}

impl WebDriverClient {
    /// Find the first element matching a locator
    ///
    /// # Arguments
    /// * `using` - Locator strategy ("css selector", "xpath", ...)
    /// * `value` - Locator expression
    ///
    /// # Returns
    /// The element id, or `None` when nothing matches
    pub async fn find_element(
        &self,
        session_id: &str,
        using: &str,
        value: &str,
    ) -> Result<Option<String>> {
        let url = self.session_url(session_id, "/element");
        let response = self
            .client
            .post(&url)
            .json(&json!({ "using": using, "value": value }))
            .send()
            .await?;

        match self.handle_response::<JsonValue>(response).await {
            Ok(reference) => reference
                .get(ELEMENT_KEY)
                .and_then(JsonValue::as_str)
                .map(|id| Some(id.to_string()))
                .ok_or_else(|| {
                    WebDriverError::ParseError(format!("Malformed element reference: {}", reference))
                }),
            Err(e) if e.is_no_such_element() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Click an element
    pub async fn element_click(&self, session_id: &str, element_id: &str) -> Result<()> {
        let url = self.session_url(session_id, &format!("/element/{}/click", element_id));
        let response = self.client.post(&url).json(&json!({})).send().await?;

        self.handle_response::<JsonValue>(response).await?;
        Ok(())
    }

    /// Type text into an element
    pub async fn element_send_keys(&self, session_id: &str, element_id: &str, text: &str) -> Result<()> {
        let url = self.session_url(session_id, &format!("/element/{}/value", element_id));
        let response = self
            .client
            .post(&url)
            .json(&json!({ "text": text }))
            .send()
            .await?;

        self.handle_response::<JsonValue>(response).await?;
        Ok(())
    }
}
