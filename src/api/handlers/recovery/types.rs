//! Request/response types for password-backup recovery endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BackupPasswordRequest {
    pub user_email: String,
    pub device_id: String,
    #[serde(default)]
    pub device_access_code: Option<String>,
    #[serde(default)]
    pub device_challenge_response: Option<String>,
    pub encrypted_password_backup: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GetPasswordBackupRequest {
    pub user_email: String,
    pub device_id: String,
    #[serde(default)]
    pub device_access_code: Option<String>,
    #[serde(default)]
    pub device_challenge_response: Option<String>,
    pub reset_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PasswordBackupResponse {
    pub encrypted_password_backup: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn backup_request_requires_blob() {
        let result: Result<BackupPasswordRequest, _> =
            serde_json::from_value(serde_json::json!({
                "userEmail": "alice@example.com",
                "deviceId": "d1",
            }));
        assert!(result.is_err());
    }

    #[test]
    fn get_backup_request_round_trips() -> Result<()> {
        let request: GetPasswordBackupRequest = serde_json::from_value(serde_json::json!({
            "userEmail": "alice@example.com",
            "deviceId": "d1",
            "resetToken": "token",
        }))?;
        assert_eq!(request.reset_token, "token");
        assert!(request.device_access_code.is_none());
        Ok(())
    }
}
