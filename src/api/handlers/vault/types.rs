//! Request/response types for vault data endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GetDataRequest {
    pub user_email: String,
    pub device_id: String,
    /// Legacy path credential (deprecated clients).
    #[serde(default)]
    pub device_access_code: Option<String>,
    #[serde(default)]
    pub device_challenge_response: Option<String>,
    #[serde(default)]
    pub password_challenge_response: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GetDataResponse {
    pub encrypted_data: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDataRequest {
    pub user_email: String,
    pub device_id: String,
    #[serde(default)]
    pub device_access_code: Option<String>,
    #[serde(default)]
    pub device_challenge_response: Option<String>,
    #[serde(default)]
    pub password_challenge_response: Option<String>,
    pub encrypted_data: String,
}
