//! Wire types for the refresh endpoints

use serde::{Deserialize, Serialize};

/// Body of a refresh-token exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Successful refresh-token exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenResponse {
    /// New bearer token
    pub token: String,
    /// Rotated refresh token, when the server issues one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_uses_camel_case() {
        let body = RefreshTokenRequest {
            refresh_token: "r1".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({ "refreshToken": "r1" })
        );
    }

    #[test]
    fn test_response_refresh_token_is_optional() {
        let response: RefreshTokenResponse =
            serde_json::from_value(json!({ "token": "t2" })).unwrap();
        assert_eq!(response.token, "t2");
        assert_eq!(response.refresh_token, None);

        let response: RefreshTokenResponse =
            serde_json::from_value(json!({ "token": "t2", "refreshToken": "r2" })).unwrap();
        assert_eq!(response.refresh_token.as_deref(), Some("r2"));
    }
}
