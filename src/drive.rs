//! Google Drive upload into `root folder / YYYY-MM-DD`.
//!
//! ## Calls
//!
//! | Phase | Request | Success |
//! |---|---|---|
//! | list | `GET {api}/files?q=...&fields=files(id,name)` | 2xx, first match wins |
//! | create-folder | `POST {api}/files` with folder metadata | 2xx, `id` in body |
//! | initiate | `POST {upload}/files?uploadType=resumable` | 2xx, `Location` header |
//! | transfer | `PUT <Location>` with the JPEG bytes | 200 or 201 |
//!
//! Every error carries the phase it happened in.
//!
//! ## Folder races
//!
//! Find-or-create is list-then-create with no lock. Two uploads starting at
//! the same moment on different devices can both see zero matches and create
//! duplicate folders with the same name. Later lookups take the first match,
//! so uploads keep working; the duplicates have to be merged by hand.

use crate::auth::TokenSource;
use crate::config::DriveConfig;
use crate::naming::{date_folder_name, photo_file_name};
use crate::types::UploadedFile;
use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use reqwest::{Client, Request, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
pub const JPEG_MIME_TYPE: &str = "image/jpeg";
/// Parent id Drive uses for "My Drive".
pub const ROOT_PARENT: &str = "root";

/// Which step of an upload failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    List,
    CreateFolder,
    Initiate,
    Transfer,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::List => "list",
            Self::CreateFolder => "create-folder",
            Self::Initiate => "initiate",
            Self::Transfer => "transfer",
        })
    }
}

#[derive(Error, Debug)]
pub enum DriveError {
    #[error("not signed in to Google")]
    NotAuthenticated,
    #[error("no access token available")]
    NoAccessToken,
    #[error("{phase}: HTTP {status}: {body}")]
    Http {
        phase: Phase,
        status: u16,
        body: String,
    },
    #[error("{phase}: {message}")]
    Network { phase: Phase, message: String },
    #[error("{phase}: unexpected response: {message}")]
    MalformedResponse { phase: Phase, message: String },
    #[error("HTTP client setup failed: {0}")]
    Client(#[source] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriveError {
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::Http { phase, .. }
            | Self::Network { phase, .. }
            | Self::MalformedResponse { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    fn network(phase: Phase, err: reqwest::Error) -> Self {
        Self::Network {
            phase,
            message: err.to_string(),
        }
    }

    fn malformed(phase: Phase, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            phase,
            message: message.into(),
        }
    }
}

/// A file or folder as returned by the files API.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

/// Escape a value for a single-quoted Drive query literal.
fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Query matching non-trashed folders named `name` directly under `parent`.
pub fn folder_query(name: &str, parent: &str) -> String {
    format!(
        "name='{}' and mimeType='{FOLDER_MIME_TYPE}' and trashed=false and '{}' in parents",
        quote(name),
        quote(parent)
    )
}

// ============================================================================
// Transport
// ============================================================================

/// The four Drive calls an upload needs.
#[async_trait]
pub trait DriveApi: Send + Sync {
    async fn list_folders(
        &self,
        token: &str,
        name: &str,
        parent: &str,
    ) -> Result<Vec<DriveFile>, DriveError>;

    /// Returns the new folder's id.
    async fn create_folder(&self, token: &str, name: &str, parent: &str)
    -> Result<String, DriveError>;

    /// Returns the upload session URI.
    async fn initiate_upload(
        &self,
        token: &str,
        name: &str,
        parent: &str,
    ) -> Result<String, DriveError>;

    /// Returns the stored file's id.
    async fn transfer(
        &self,
        token: &str,
        session_uri: &str,
        bytes: Vec<u8>,
    ) -> Result<String, DriveError>;
}

/// [`DriveApi`] over HTTPS.
pub struct HttpDriveApi {
    client: Client,
    api_base: String,
    upload_base: String,
}

impl HttpDriveApi {
    pub fn new(config: &DriveConfig) -> Result<Self, DriveError> {
        let client = Client::builder()
            .use_rustls_tls()
            .connect_timeout(Duration::from_secs(15))
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(DriveError::Client)?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            upload_base: config.upload_base.trim_end_matches('/').to_string(),
        })
    }

    fn list_request(&self, token: &str, name: &str, parent: &str) -> reqwest::Result<Request> {
        self.client
            .get(format!("{}/files", self.api_base))
            .bearer_auth(token)
            .query(&[
                ("q", folder_query(name, parent).as_str()),
                ("fields", "files(id,name)"),
            ])
            .build()
    }

    fn create_folder_request(
        &self,
        token: &str,
        name: &str,
        parent: &str,
    ) -> reqwest::Result<Request> {
        self.client
            .post(format!("{}/files", self.api_base))
            .bearer_auth(token)
            .json(&json!({
                "name": name,
                "mimeType": FOLDER_MIME_TYPE,
                "parents": [parent],
            }))
            .build()
    }

    fn initiate_request(&self, token: &str, name: &str, parent: &str) -> reqwest::Result<Request> {
        self.client
            .post(format!("{}/files", self.upload_base))
            .bearer_auth(token)
            .query(&[("uploadType", "resumable")])
            .header("X-Upload-Content-Type", JPEG_MIME_TYPE)
            .json(&json!({
                "name": name,
                "parents": [parent],
                "mimeType": JPEG_MIME_TYPE,
            }))
            .build()
    }

    fn transfer_request(
        &self,
        token: &str,
        session_uri: &str,
        bytes: Vec<u8>,
    ) -> reqwest::Result<Request> {
        self.client
            .put(session_uri)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, JPEG_MIME_TYPE)
            .body(bytes)
            .build()
    }

    async fn execute(&self, phase: Phase, request: reqwest::Result<Request>) -> Result<Response, DriveError> {
        let request = request.map_err(|e| DriveError::network(phase, e))?;
        self.client
            .execute(request)
            .await
            .map_err(|e| DriveError::network(phase, e))
    }
}

async fn http_error(phase: Phase, response: Response) -> DriveError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    tracing::error!(%phase, status, %body, "Drive API error");
    DriveError::Http {
        phase,
        status,
        body,
    }
}

async fn expect_success(phase: Phase, response: Response) -> Result<Response, DriveError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(http_error(phase, response).await)
    }
}

#[async_trait]
impl DriveApi for HttpDriveApi {
    #[instrument(skip(self, token))]
    async fn list_folders(
        &self,
        token: &str,
        name: &str,
        parent: &str,
    ) -> Result<Vec<DriveFile>, DriveError> {
        let phase = Phase::List;
        let response = self
            .execute(phase, self.list_request(token, name, parent))
            .await?;
        let list: FileList = expect_success(phase, response)
            .await?
            .json()
            .await
            .map_err(|e| DriveError::malformed(phase, e.to_string()))?;
        Ok(list.files)
    }

    #[instrument(skip(self, token))]
    async fn create_folder(
        &self,
        token: &str,
        name: &str,
        parent: &str,
    ) -> Result<String, DriveError> {
        let phase = Phase::CreateFolder;
        let response = self
            .execute(phase, self.create_folder_request(token, name, parent))
            .await?;
        let created: DriveFile = expect_success(phase, response)
            .await?
            .json()
            .await
            .map_err(|e| DriveError::malformed(phase, e.to_string()))?;
        Ok(created.id)
    }

    #[instrument(skip(self, token))]
    async fn initiate_upload(
        &self,
        token: &str,
        name: &str,
        parent: &str,
    ) -> Result<String, DriveError> {
        let phase = Phase::Initiate;
        let response = self
            .execute(phase, self.initiate_request(token, name, parent))
            .await?;
        let response = expect_success(phase, response).await?;
        response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| DriveError::malformed(phase, "no Location header"))
    }

    #[instrument(skip(self, token, session_uri, bytes), fields(bytes = bytes.len()))]
    async fn transfer(
        &self,
        token: &str,
        session_uri: &str,
        bytes: Vec<u8>,
    ) -> Result<String, DriveError> {
        let phase = Phase::Transfer;
        let response = self
            .execute(phase, self.transfer_request(token, session_uri, bytes))
            .await?;
        if !matches!(response.status(), StatusCode::OK | StatusCode::CREATED) {
            return Err(http_error(phase, response).await);
        }
        let stored: DriveFile = response
            .json()
            .await
            .map_err(|e| DriveError::malformed(phase, e.to_string()))?;
        Ok(stored.id)
    }
}

// ============================================================================
// Upload flow
// ============================================================================

/// Folder resolution and uploads for the signed-in user.
pub struct Drive {
    api: Arc<dyn DriveApi>,
    tokens: Arc<dyn TokenSource>,
    root_folder: String,
}

impl Drive {
    pub fn new(api: Arc<dyn DriveApi>, tokens: Arc<dyn TokenSource>, config: &DriveConfig) -> Self {
        Self {
            api,
            tokens,
            root_folder: config.root_folder.clone(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens.is_authenticated()
    }

    async fn token(&self) -> Result<String, DriveError> {
        if !self.tokens.is_authenticated() {
            return Err(DriveError::NotAuthenticated);
        }
        self.tokens
            .access_token()
            .await
            .ok_or(DriveError::NoAccessToken)
    }

    async fn resolve_folder(&self, token: &str, name: &str, parent: &str) -> Result<String, DriveError> {
        let found = self.api.list_folders(token, name, parent).await?;
        if let Some(first) = found.into_iter().next() {
            tracing::debug!(name, id = %first.id, "folder found");
            return Ok(first.id);
        }
        let id = self.api.create_folder(token, name, parent).await?;
        tracing::info!(name, %id, "folder created");
        Ok(id)
    }

    /// Id of the folder `name` under `parent`, creating it if absent.
    pub async fn find_or_create_folder(&self, name: &str, parent: &str) -> Result<String, DriveError> {
        let token = self.token().await?;
        self.resolve_folder(&token, name, parent).await
    }

    /// Upload a JPEG into `root folder / <UTC date of taken_at>`.
    ///
    /// The stored name is `<custom>.jpg` or the local timestamp of `taken_at`.
    pub async fn upload_photo(
        &self,
        path: &Path,
        taken_at: DateTime<Local>,
        custom_name: Option<&str>,
    ) -> Result<UploadedFile, DriveError> {
        let token = self.token().await?;
        let bytes = tokio::fs::read(path).await?;

        let root = self
            .resolve_folder(&token, &self.root_folder, ROOT_PARENT)
            .await?;
        let day = date_folder_name(&taken_at.with_timezone(&Utc));
        let folder = self.resolve_folder(&token, &day, &root).await?;

        let name = photo_file_name(custom_name, &taken_at);
        let session = self.api.initiate_upload(&token, &name, &folder).await?;
        let id = self.api.transfer(&token, &session, bytes).await?;
        tracing::info!(%name, %id, folder = %day, "photo uploaded");
        Ok(UploadedFile { id, name })
    }
}
