//! Request/response types for shared-item endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GetContactsForSharedItemRequest {
    pub user_email: String,
    pub device_id: String,
    #[serde(default)]
    pub device_access_code: Option<String>,
    #[serde(default)]
    pub device_challenge_response: Option<String>,
    pub item_id: i64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SharedItemContact {
    pub id: i64,
    pub email: String,
    pub is_manager: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SharedItemContactsResponse {
    pub contacts: Vec<SharedItemContact>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StopReceivingSharingRequest {
    pub user_email: String,
    pub device_id: String,
    #[serde(default)]
    pub device_access_code: Option<String>,
    #[serde(default)]
    pub device_challenge_response: Option<String>,
    pub item_id: i64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CheckEmailForSharingRequest {
    pub user_email: String,
    pub device_id: String,
    #[serde(default)]
    pub device_access_code: Option<String>,
    #[serde(default)]
    pub device_challenge_response: Option<String>,
    pub email_address: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ShareableResponse {
    pub valid: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn contacts_request_round_trips() -> Result<()> {
        let request: GetContactsForSharedItemRequest =
            serde_json::from_value(serde_json::json!({
                "userEmail": "alice@example.com",
                "deviceId": "d1",
                "itemId": 12,
            }))?;
        assert_eq!(request.item_id, 12);
        Ok(())
    }

    #[test]
    fn contact_serializes_camel_case() -> Result<()> {
        let contact = SharedItemContact {
            id: 3,
            email: "bob@example.com".to_string(),
            is_manager: true,
        };
        let value = serde_json::to_value(&contact)?;
        assert_eq!(value["isManager"], true);
        Ok(())
    }
}
