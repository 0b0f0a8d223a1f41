//! Request/response types for pairing endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RequestAccessRequest {
    pub user_email: String,
    pub device_id: String,
    pub device_access_code: String,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default, rename = "deviceOS")]
    pub device_os: Option<String>,
    #[serde(default)]
    pub app_version: Option<String>,
    #[serde(default)]
    pub device_public_key: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CheckDeviceRequest {
    pub user_email: String,
    pub device_id: String,
    pub device_access_code: String,
    pub device_validation_code: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationStatusResponse {
    pub authorization_status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn request_access_accepts_minimal_payload() -> Result<()> {
        let request: RequestAccessRequest = serde_json::from_value(serde_json::json!({
            "userEmail": "alice@example.com",
            "deviceId": "d1",
            "deviceAccessCode": "secret",
        }))?;
        assert_eq!(request.user_email, "alice@example.com");
        assert!(request.device_name.is_none());
        assert!(request.device_public_key.is_none());
        Ok(())
    }

    #[test]
    fn device_os_uses_legacy_wire_name() -> Result<()> {
        let request: RequestAccessRequest = serde_json::from_value(serde_json::json!({
            "userEmail": "alice@example.com",
            "deviceId": "d1",
            "deviceAccessCode": "secret",
            "deviceOS": "android 14",
        }))?;
        assert_eq!(request.device_os.as_deref(), Some("android 14"));
        Ok(())
    }

    #[test]
    fn status_response_uses_camel_case() -> Result<()> {
        let response = AuthorizationStatusResponse {
            authorization_status: "PENDING".to_string(),
        };
        let value = serde_json::to_value(&response)?;
        let status = value
            .get("authorizationStatus")
            .and_then(serde_json::Value::as_str)
            .context("missing authorizationStatus")?;
        assert_eq!(status, "PENDING");
        Ok(())
    }
}
