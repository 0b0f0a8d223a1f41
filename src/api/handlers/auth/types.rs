//! Request/response types for authentication endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GetAuthenticationChallengesRequest {
    pub user_email: String,
    pub device_id: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationChallengesResponse {
    pub password_challenge: String,
    pub password_derivation_salt: String,
    pub device_challenge: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn request_uses_camel_case_wire_names() -> Result<()> {
        let request = GetAuthenticationChallengesRequest {
            user_email: "alice@example.com".to_string(),
            device_id: "d1".to_string(),
        };
        let value = serde_json::to_value(&request)?;
        let email = value
            .get("userEmail")
            .and_then(serde_json::Value::as_str)
            .context("missing userEmail")?;
        assert_eq!(email, "alice@example.com");
        assert!(value.get("deviceId").is_some());
        Ok(())
    }

    #[test]
    fn challenges_response_round_trips() -> Result<()> {
        let response = AuthenticationChallengesResponse {
            password_challenge: "pwd".to_string(),
            password_derivation_salt: "salt".to_string(),
            device_challenge: "dev".to_string(),
        };
        let value = serde_json::to_value(&response)?;
        let decoded: AuthenticationChallengesResponse = serde_json::from_value(value)?;
        assert_eq!(decoded.password_derivation_salt, "salt");
        Ok(())
    }
}
