//! Folder mirroring on a WebDAV store (ownCloud layout: `<base>/<user id>/<save path>`).

use portal_core::SourceId;
use portal_logging::{portal_error, portal_info, portal_warn};
use reqwest::{Method, StatusCode, Url};
use thiserror::Error;

use crate::fetch::{build_client, map_reqwest_error};
use crate::{FetchError, FetchSettings};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebDavSettings {
    /// Root of the per-user file trees, e.g. `https://host/remote.php/dav/files`.
    pub base_url: String,
    pub user_id: String,
    pub username: String,
    pub token: String,
    /// Slash-separated folder under the user's root that receives the mirror.
    pub save_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderStatus {
    Created,
    AlreadyExists,
}

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("invalid WebDAV url {0}")]
    InvalidUrl(String),
    #[error("unauthorized creating {path}; check the username and token")]
    Unauthorized { path: String },
    #[error("creating {path} failed with {status}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },
    #[error("request for {path} failed: {source}")]
    Transport {
        path: String,
        #[source]
        source: FetchError,
    },
}

/// Folders touched while mirroring one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorReport {
    pub source: FolderStatus,
    /// Sub-folders that could be created or already existed.
    pub instruments: Vec<String>,
    /// Sub-folders that failed; logged and skipped.
    pub failed: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct WebDavClient {
    client: reqwest::Client,
    root: Url,
    save_path: Vec<String>,
    username: String,
    token: String,
}

impl WebDavClient {
    pub fn new(settings: &WebDavSettings, fetch: &FetchSettings) -> Result<Self, MirrorError> {
        let mut root = Url::parse(&settings.base_url)
            .map_err(|err| MirrorError::InvalidUrl(format!("{}: {err}", settings.base_url)))?;
        root.path_segments_mut()
            .map_err(|()| MirrorError::InvalidUrl(settings.base_url.clone()))?
            .pop_if_empty()
            .push(&settings.user_id);
        let client = build_client(fetch).map_err(|source| MirrorError::Transport {
            path: settings.base_url.clone(),
            source,
        })?;
        Ok(Self {
            client,
            root,
            save_path: split_path(&settings.save_path),
            username: settings.username.clone(),
            token: settings.token.clone(),
        })
    }

    pub fn save_path(&self) -> String {
        self.save_path.join("/")
    }

    /// Url of a folder given by path segments below the user's root.
    fn folder_url<'s>(
        &self,
        segments: impl IntoIterator<Item = &'s str>,
        trailing_slash: bool,
    ) -> Result<Url, MirrorError> {
        let mut url = self.root.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|()| MirrorError::InvalidUrl(self.root.to_string()))?;
            path.extend(segments);
            if trailing_slash {
                path.push("");
            }
        }
        Ok(url)
    }

    async fn send(&self, method: &'static [u8], url: Url, path: &str) -> Result<reqwest::Response, MirrorError> {
        let method = Method::from_bytes(method)
            .map_err(|err| MirrorError::InvalidUrl(format!("{path}: {err}")))?;
        self.client
            .request(method, url)
            .basic_auth(&self.username, Some(&self.token))
            .send()
            .await
            .map_err(|err| MirrorError::Transport {
                path: path.to_string(),
                source: map_reqwest_error(err),
            })
    }

    /// `PROPFIND` on the save path; 200 and 207 mean it exists.
    pub async fn save_path_exists(&self) -> Result<bool, MirrorError> {
        let url = self.folder_url(self.save_path.iter().map(String::as_str), true)?;
        let response = self.send(b"PROPFIND", url, &self.save_path()).await?;
        Ok(matches!(
            response.status(),
            StatusCode::OK | StatusCode::MULTI_STATUS
        ))
    }

    /// Creates one folder given relative to the user's root.
    pub async fn make_collection(&self, relative: &[&str]) -> Result<FolderStatus, MirrorError> {
        let path = relative.join("/");
        let url = self.folder_url(relative.iter().copied(), false)?;
        let response = self.send(b"MKCOL", url, &path).await?;

        match response.status() {
            StatusCode::CREATED => {
                portal_info!("Folder {} created", path);
                Ok(FolderStatus::Created)
            }
            StatusCode::METHOD_NOT_ALLOWED => {
                portal_info!("Folder {} already exists", path);
                Ok(FolderStatus::AlreadyExists)
            }
            StatusCode::UNAUTHORIZED => Err(MirrorError::Unauthorized { path }),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(MirrorError::Status {
                    path,
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }

    /// Makes sure the whole save path exists, creating each prefix in turn.
    pub async fn ensure_save_path(&self) -> Result<(), MirrorError> {
        if self.save_path_exists().await? {
            portal_info!("Save path {} already exists", self.save_path());
            return Ok(());
        }

        portal_info!("Creating save path {}", self.save_path());
        let segments: Vec<&str> = self.save_path.iter().map(String::as_str).collect();
        for depth in 1..=segments.len() {
            self.make_collection(&segments[..depth]).await?;
        }
        portal_info!("Save path {} ready", self.save_path());
        Ok(())
    }

    /// Creates `<save path>/<source>` and one sub-folder per instrument string.
    ///
    /// Fails only when the source folder itself cannot be created.
    pub async fn mirror_source(
        &self,
        source_id: &SourceId,
        instruments: &[String],
    ) -> Result<MirrorReport, MirrorError> {
        let source = source_id.to_string();
        let mut segments: Vec<&str> = self.save_path.iter().map(String::as_str).collect();
        segments.push(&source);

        let status = self.make_collection(&segments).await?;
        let mut report = MirrorReport {
            source: status,
            instruments: Vec::new(),
            failed: Vec::new(),
        };

        for instrument in instruments {
            let mut nested = segments.clone();
            nested.push(instrument);
            match self.make_collection(&nested).await {
                Ok(_) => report.instruments.push(instrument.clone()),
                Err(err) => {
                    portal_error!("Failed to create instrument folder {}: {}", instrument, err);
                    report.failed.push(instrument.clone());
                }
            }
        }
        if !report.failed.is_empty() {
            portal_warn!(
                "Source {}: {} of {} instrument folders failed",
                source,
                report.failed.len(),
                instruments.len()
            );
        }
        Ok(report)
    }
}

fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
        .collect()
}
