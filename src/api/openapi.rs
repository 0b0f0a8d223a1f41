//! OpenAPI document assembled from the handler annotations.
//!
//! Add new endpoints to `paths(...)` so they show up in the generated spec;
//! undocumented routes like `/` stay out on purpose.

use utoipa::OpenApi;

use super::handlers::{auth, devices, health, pairing, recovery, sharing, vault};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        pairing::request_access,
        pairing::check_device,
        auth::get_authentication_challenges,
        vault::get_data,
        vault::update_data,
        recovery::backup_password,
        recovery::get_password_backup,
        devices::get_authorized_devices,
        devices::remove_authorization,
        devices::rename_device,
        sharing::get_contacts_for_shared_item,
        sharing::stop_receiving_sharing,
        sharing::check_email_for_sharing,
    ),
    components(schemas(
        health::Health,
        pairing::types::RequestAccessRequest,
        pairing::types::CheckDeviceRequest,
        pairing::types::AuthorizationStatusResponse,
        auth::types::GetAuthenticationChallengesRequest,
        auth::types::AuthenticationChallengesResponse,
        vault::types::GetDataRequest,
        vault::types::GetDataResponse,
        vault::types::UpdateDataRequest,
        recovery::types::BackupPasswordRequest,
        recovery::types::GetPasswordBackupRequest,
        recovery::types::PasswordBackupResponse,
        devices::types::GetAuthorizedDevicesRequest,
        devices::types::DeviceSummary,
        devices::types::AuthorizedDevicesResponse,
        devices::types::RemoveAuthorizationRequest,
        devices::types::RenameDeviceRequest,
        sharing::types::GetContactsForSharedItemRequest,
        sharing::types::SharedItemContact,
        sharing::types::SharedItemContactsResponse,
        sharing::types::StopReceivingSharingRequest,
        sharing::types::CheckEmailForSharingRequest,
        sharing::types::ShareableResponse,
    )),
    tags(
        (name = "pairing", description = "Device pairing and out-of-band confirmation"),
        (name = "auth", description = "Challenge issuance for authorized devices"),
        (name = "vault", description = "Encrypted vault data"),
        (name = "recovery", description = "Password backup escrow and recovery"),
        (name = "devices", description = "Device management"),
        (name = "sharing", description = "Shared item authorization"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;
