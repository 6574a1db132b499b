// Google Workspace / Cloud infra layer.
// - `service_account.rs` mints OAuth2 access tokens.
// - `google_api.rs` is the shared authorized HTTP plumbing and error mapping.
// - One client per service, each implementing a core pipeline port.

#[path = "service_account.rs"]
pub mod service_account;

#[path = "google_api.rs"]
pub mod google_api;

#[path = "drive_client.rs"]
pub mod drive_client;

#[path = "storage_client.rs"]
pub mod storage_client;

#[path = "vision_client.rs"]
pub mod vision_client;

#[path = "sheets_client.rs"]
pub mod sheets_client;

pub use drive_client::DriveClient;
pub use google_api::GoogleApi;
pub use service_account::token_source_from_env;
pub use sheets_client::SheetsClient;
pub use storage_client::StorageClient;
pub use vision_client::VisionClient;
