//! Fetches the SFD dust-map images when they are not on disk yet.

use std::path::{Path, PathBuf};

use portal_core::{missing_map_files, SFD_MAP_FILES};
use portal_logging::{portal_info, portal_warn};
use thiserror::Error;

use crate::{AtomicFileWriter, FetchError, Fetcher, PersistError};

/// Mirror serving `SFD_dust_4096_{ngp,sgp}.fits`.
pub const DEFAULT_DUSTMAPS_BASE_URL: &str = "https://github.com/kbarbary/sfddata/raw/master";

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("downloading {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error("downloaded {url} does not look like a FITS file")]
    NotFits { url: String },
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Downloads every missing map file under `data_dir`; returns the paths written.
pub async fn ensure_dust_maps(
    fetcher: &dyn Fetcher,
    base_url: &str,
    data_dir: &Path,
) -> Result<Vec<PathBuf>, DownloadError> {
    let missing = missing_map_files(data_dir);
    if missing.is_empty() {
        return Ok(Vec::new());
    }

    let mut written = Vec::new();
    for relative in SFD_MAP_FILES {
        let target = data_dir.join(relative);
        if !missing.contains(&target) {
            continue;
        }
        let (Some(dir), Some(name)) = (target.parent(), target.file_name()) else {
            continue;
        };
        let name = name.to_string_lossy();
        let url = format!("{}/{}", base_url.trim_end_matches('/'), name);

        portal_info!("Downloading dust map {} to {}", url, dir.display());
        let output = fetcher
            .fetch(&url)
            .await
            .map_err(|source| DownloadError::Fetch {
                url: url.clone(),
                source,
            })?;
        if !output.bytes.starts_with(b"SIMPLE  =") {
            portal_warn!("Refusing to store {}: missing FITS signature", url);
            return Err(DownloadError::NotFits { url });
        }
        written.push(AtomicFileWriter::new(dir.to_path_buf()).write(&name, &output.bytes)?);
    }
    Ok(written)
}
