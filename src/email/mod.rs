//! Outbound email delivery for account confirmation.

use crate::config::EmailConfig;
use crate::error::AppError;
use async_trait::async_trait;
use serde_json::json;
use tracing::info;
use url::Url;

/// Delivery seam so handlers never talk to the provider directly.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_confirmation(&self, to: &str, confirmation_url: &str) -> Result<(), AppError>;
}

/// Build the link a user clicks to confirm their address. The token rides
/// in the query string because confirmation is a plain browser GET.
pub fn confirmation_url(base_url: &str, email: &str, token: &str) -> Result<String, AppError> {
    let mut url = Url::parse(base_url).map_err(|e| AppError::EmailError(e.to_string()))?;
    url.set_path("/api/v0/auth/email-confirmation");
    url.query_pairs_mut()
        .append_pair("email", email)
        .append_pair("token", token);
    Ok(url.to_string())
}

/// SendGrid v3 mail-send client.
pub struct SendgridMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    sender: String,
}

impl SendgridMailer {
    pub fn new(config: &EmailConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            sender: config.sender.clone(),
        }
    }
}

#[async_trait]
impl Mailer for SendgridMailer {
    async fn send_confirmation(&self, to: &str, confirmation_url: &str) -> Result<(), AppError> {
        let body = json!({
            "personalizations": [{ "to": [{ "email": to }] }],
            "from": { "email": self.sender },
            "subject": "WhiteBoard email confirmation",
            "content": [{
                "type": "text/html",
                "value": format!(
                    "<!DOCTYPE html><html><body>\
                     <p>Please click the button below to confirm your address.</p>\
                     <a href=\"{confirmation_url}\">Confirm</a>\
                     </body></html>"
                ),
            }],
        });

        let response = self
            .client
            .post(format!("{}/v3/mail/send", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::EmailError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AppError::EmailError(format!(
                "mail provider returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}

/// Logs instead of sending. Used when no API key is configured and in
/// tests.
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send_confirmation(&self, to: &str, confirmation_url: &str) -> Result<(), AppError> {
        info!(to, confirmation_url, "confirmation mail suppressed (no mailer configured)");
        Ok(())
    }
}
