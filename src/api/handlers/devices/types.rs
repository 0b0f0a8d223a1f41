//! Request/response types for device management endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GetAuthorizedDevicesRequest {
    pub user_email: String,
    pub device_id: String,
    #[serde(default)]
    pub device_access_code: Option<String>,
    #[serde(default)]
    pub device_challenge_response: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSummary {
    pub id: i64,
    pub device_name: Option<String>,
    pub device_type: Option<String>,
    pub os_version: Option<String>,
    pub app_version: Option<String>,
    pub authorization_status: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizedDevicesResponse {
    pub devices: Vec<DeviceSummary>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RemoveAuthorizationRequest {
    pub user_email: String,
    pub device_id: String,
    #[serde(default)]
    pub device_access_code: Option<String>,
    #[serde(default)]
    pub device_challenge_response: Option<String>,
    pub device_to_remove_id: i64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RenameDeviceRequest {
    pub user_email: String,
    pub device_id: String,
    #[serde(default)]
    pub device_access_code: Option<String>,
    #[serde(default)]
    pub device_challenge_response: Option<String>,
    pub device_to_rename_id: i64,
    pub new_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn remove_request_round_trips() -> Result<()> {
        let request: RemoveAuthorizationRequest = serde_json::from_value(serde_json::json!({
            "userEmail": "alice@example.com",
            "deviceId": "d1",
            "deviceToRemoveId": 42,
        }))?;
        assert_eq!(request.device_to_remove_id, 42);
        Ok(())
    }

    #[test]
    fn device_summary_serializes_camel_case() -> Result<()> {
        let summary = DeviceSummary {
            id: 1,
            device_name: Some("Pixel".to_string()),
            device_type: None,
            os_version: None,
            app_version: None,
            authorization_status: "AUTHORIZED".to_string(),
        };
        let value = serde_json::to_value(&summary)?;
        assert_eq!(value["deviceName"], "Pixel");
        assert_eq!(value["authorizationStatus"], "AUTHORIZED");
        Ok(())
    }
}
