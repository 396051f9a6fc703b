use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::info;

use crate::ChatError;

pub const VALIDATE_URL: &str = "https://id.twitch.tv/oauth2/validate";
pub const CHAT_READ_SCOPE: &str = "chat:read";

/// Body of a successful token validation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenInfo {
    pub client_id: String,
    pub login: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub expires_in: u64,
}

impl TokenInfo {
    /// The token must read chat and, when an app id is configured, belong to it.
    pub fn check(&self, app_id: Option<&str>) -> Result<(), ChatError> {
        if !self.scopes.iter().any(|scope| scope == CHAT_READ_SCOPE) {
            return Err(ChatError::MissingScope {
                scope: CHAT_READ_SCOPE.to_string(),
            });
        }
        if let Some(expected) = app_id.filter(|id| !id.is_empty()) {
            if expected != self.client_id {
                return Err(ChatError::ClientIdMismatch {
                    expected: expected.to_string(),
                    actual: self.client_id.clone(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ValidateFailure {
    #[serde(default)]
    message: String,
}

pub fn bare_token(token: &str) -> &str {
    token.trim().trim_start_matches("oauth:")
}

pub async fn validate_token(
    http: &Client,
    validate_url: &str,
    token: &str,
) -> Result<TokenInfo, ChatError> {
    let response = http
        .get(validate_url)
        .header("Authorization", format!("OAuth {}", bare_token(token)))
        .send()
        .await?;

    if response.status() == StatusCode::UNAUTHORIZED {
        let failure: ValidateFailure = response.json().await.unwrap_or(ValidateFailure {
            message: "unauthorized".to_string(),
        });
        return Err(ChatError::InvalidToken(failure.message));
    }

    let info: TokenInfo = response.error_for_status()?.json().await?;
    info!(
        login = %info.login,
        expires_in = info.expires_in,
        "chat: oauth token validated"
    );
    Ok(info)
}

#[cfg(test)]
#[path = "tests/token_tests.rs"]
mod tests;
