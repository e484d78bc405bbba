//! Google Drive remote folder: credentials, folder picking and uploads

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::errors::{ConfigError, DispatchError};
use crate::domain::model::GeneratedArtifact;
use crate::ports::{ArtifactSink, FolderPicker, PickOutcome, PickedFolder};
use crate::resolver::fetcher::describe_transport_error;

/// Shortest client id / API key accepted as plausible
pub const MIN_CREDENTIAL_LEN: usize = 10;

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// `[google]` configuration section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub client_id: String,
    pub api_key: String,
    /// Optional, only used to label the picker
    pub app_id: String,
    pub upload_url: String,
    pub files_url: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            api_key: String::new(),
            app_id: String::new(),
            upload_url: "https://www.googleapis.com/upload/drive/v3/files?uploadType=multipart"
                .to_string(),
            files_url: "https://www.googleapis.com/drive/v3/files".to_string(),
        }
    }
}

impl GoogleConfig {
    /// Check the credentials needed by every remote-folder operation
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_credential("Google client ID", &self.client_id)?;
        check_credential("Google API key", &self.api_key)?;
        Ok(())
    }
}

fn check_credential(field: &'static str, value: &str) -> Result<(), ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::MissingCredential(field));
    }
    if value.len() < MIN_CREDENTIAL_LEN {
        return Err(ConfigError::CredentialTooShort {
            field,
            min: MIN_CREDENTIAL_LEN,
        });
    }
    Ok(())
}

/// Validated credentials plus the bearer token for one session
#[derive(Debug, Clone)]
pub struct DriveAccess {
    client: reqwest::Client,
    config: GoogleConfig,
    access_token: String,
}

impl DriveAccess {
    pub fn new(
        client: reqwest::Client,
        config: GoogleConfig,
        access_token: Option<String>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let access_token = access_token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(ConfigError::MissingAccessToken)?;
        Ok(Self {
            client,
            config,
            access_token,
        })
    }

    pub fn uploader(&self, folder_id: impl Into<String>) -> DriveUploader {
        DriveUploader {
            access: self.clone(),
            folder_id: folder_id.into(),
        }
    }

    /// Confirm that `folder_id` names a folder the token can see
    pub async fn lookup_folder(&self, folder_id: &str) -> Result<PickedFolder, ConfigError> {
        let url = format!("{}/{}", self.config.files_url.trim_end_matches('/'), folder_id);
        let response = self
            .client
            .get(&url)
            .query(&[("fields", "id,name,mimeType")])
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| ConfigError::Invalid(format!("folder lookup failed: {}", describe_transport_error(&e))))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ConfigError::Invalid(format!(
                "folder lookup failed: {}",
                remote_error_message(status, &body)
            )));
        }

        let file: DriveFile = response
            .json()
            .await
            .map_err(|e| ConfigError::Invalid(format!("unexpected folder lookup response: {}", e)))?;

        if file.mime_type.as_deref() != Some(FOLDER_MIME_TYPE) {
            return Err(ConfigError::Invalid(format!(
                "{} is not a folder",
                file.name.as_deref().unwrap_or(folder_id)
            )));
        }
        Ok(PickedFolder {
            id: file.id.unwrap_or_else(|| folder_id.to_string()),
            name: file.name.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: Option<String>,
    name: Option<String>,
    mime_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DriveErrorBody {
    error: Option<DriveErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct DriveErrorDetail {
    message: Option<String>,
}

/// `error.message` from a Drive error body, else the status text
fn remote_error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<DriveErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| e.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.as_str().to_string())
        })
}

/// Uploads each artifact into one Drive folder
pub struct DriveUploader {
    access: DriveAccess,
    folder_id: String,
}

impl DriveUploader {
    fn form(&self, artifact: &GeneratedArtifact) -> Result<Form, reqwest::Error> {
        let metadata = serde_json::json!({
            "name": artifact.filename,
            "parents": [self.folder_id],
        });
        let metadata = Part::text(metadata.to_string()).mime_str("application/json")?;
        let file = Part::bytes(artifact.binary.clone())
            .file_name(artifact.filename.clone())
            .mime_str(&artifact.mime_type)?;
        Ok(Form::new().part("metadata", metadata).part("file", file))
    }
}

#[async_trait]
impl ArtifactSink for DriveUploader {
    fn describe(&self) -> String {
        format!("Google Drive folder {}", self.folder_id)
    }

    async fn dispatch(&self, artifact: &GeneratedArtifact) -> Result<(), DispatchError> {
        let failure = |message: String| DispatchError::Remote {
            filename: artifact.filename.clone(),
            message,
        };

        let form = self.form(artifact).map_err(|e| failure(e.to_string()))?;
        debug!(filename = %artifact.filename, folder = %self.folder_id, "Uploading artifact");

        let response = self
            .access
            .client
            .post(&self.access.config.upload_url)
            .bearer_auth(&self.access.access_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| failure(describe_transport_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = remote_error_message(status, &body);
            warn!(filename = %artifact.filename, status = status.as_u16(), %message, "Upload rejected");
            return Err(failure(message));
        }
        Ok(())
    }
}

/// Terminal folder picker: asks for a folder id, then confirms it remotely
pub struct PromptFolderPicker<R> {
    access: DriveAccess,
    input: Mutex<R>,
}

impl PromptFolderPicker<BufReader<Stdin>> {
    pub fn stdin(access: DriveAccess) -> Self {
        Self::new(access, BufReader::new(tokio::io::stdin()))
    }
}

impl<R> PromptFolderPicker<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    pub fn new(access: DriveAccess, input: R) -> Self {
        Self {
            access,
            input: Mutex::new(input),
        }
    }
}

#[async_trait]
impl<R> FolderPicker for PromptFolderPicker<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn pick_folder(&self) -> Result<PickOutcome, ConfigError> {
        eprint!("Google Drive folder id (empty to cancel): ");
        let mut line = String::new();
        self.input
            .lock()
            .await
            .read_line(&mut line)
            .await
            .map_err(|e| ConfigError::Invalid(format!("cannot read folder id: {}", e)))?;

        let folder_id = line.trim();
        if folder_id.is_empty() {
            info!("Folder selection cancelled");
            return Ok(PickOutcome::Cancelled);
        }

        let folder = self.access.lookup_folder(folder_id).await?;
        info!(id = %folder.id, name = %folder.name, "Folder selected");
        Ok(PickOutcome::Picked(folder))
    }
}
