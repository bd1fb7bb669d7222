//! Poll loop mirroring a folder tree for every newly saved source.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use portal_core::{GroupId, SeenSources, SourceId};
use portal_logging::{portal_error, portal_info, portal_warn};

use crate::{FetchError, Portal, WebDavClient};

/// Label used when the portal cannot name an instrument's telescope.
pub const UNKNOWN_TELESCOPE: &str = "Unknown telescope name";

/// Where the per-source instrument folder names come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstrumentSource {
    /// The same fixed list for every source.
    BaseList(Vec<String>),
    /// `<telescope>-<instrument>` for every instrument with photometry or spectra.
    PerSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherSettings {
    pub group_ids: Vec<GroupId>,
    pub poll_interval: Duration,
    pub instruments: InstrumentSource,
    /// Pause after each source when per-source lookups hit the portal.
    pub source_pause: Duration,
    /// Pause after a source whose folder could not be created.
    pub failure_pause: Duration,
}

impl Default for WatcherSettings {
    fn default() -> Self {
        Self {
            group_ids: vec![3],
            poll_interval: Duration::from_secs(60),
            instruments: InstrumentSource::BaseList(Vec::new()),
            source_pause: Duration::from_millis(300),
            failure_pause: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PollReport {
    pub new_sources: Vec<SourceId>,
    pub mirrored: Vec<SourceId>,
    pub failed: Vec<SourceId>,
}

pub struct Watcher<'a> {
    portal: &'a dyn Portal,
    store: &'a WebDavClient,
    settings: WatcherSettings,
    seen: SeenSources,
    since: DateTime<Utc>,
}

impl<'a> Watcher<'a> {
    pub fn new(
        portal: &'a dyn Portal,
        store: &'a WebDavClient,
        settings: WatcherSettings,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            portal,
            store,
            settings,
            seen: SeenSources::new(),
            since: start_time,
        }
    }

    pub fn since(&self) -> DateTime<Utc> {
        self.since
    }

    pub fn seen(&self) -> &SeenSources {
        &self.seen
    }

    /// One poll: list sources saved since the previous poll started and mirror the unseen ones.
    ///
    /// The window only advances when the listing succeeds.
    pub async fn poll_once(&mut self) -> Result<PollReport, FetchError> {
        let started = Utc::now();
        let listed = self
            .portal
            .sources_saved_after(self.since, &self.settings.group_ids)
            .await?;
        self.since = started;

        let mut report = PollReport {
            new_sources: self.seen.retain_new(listed, |id| id),
            ..PollReport::default()
        };

        for source_id in report.new_sources.clone() {
            portal_info!("New source detected: {}", source_id);
            let instruments = self.instrument_strings(&source_id).await;
            match self.store.mirror_source(&source_id, &instruments).await {
                Ok(_) => {
                    report.mirrored.push(source_id);
                    if self.settings.instruments == InstrumentSource::PerSource {
                        tokio::time::sleep(self.settings.source_pause).await;
                    }
                }
                Err(err) => {
                    portal_error!("Failed to create source folder {}: {}", source_id, err);
                    portal_info!(
                        "Waiting {:?} and skipping to the next source",
                        self.settings.failure_pause
                    );
                    report.failed.push(source_id);
                    tokio::time::sleep(self.settings.failure_pause).await;
                }
            }
        }
        Ok(report)
    }

    /// Folder names for one source's instruments.
    pub async fn instrument_strings(&self, source_id: &SourceId) -> Vec<String> {
        let InstrumentSource::BaseList(list) = &self.settings.instruments else {
            return self.lookup_instruments(source_id).await;
        };
        list.clone()
    }

    async fn lookup_instruments(&self, source_id: &SourceId) -> Vec<String> {
        let mut names = BTreeSet::new();

        let has_photometry = match self.portal.photometry_instruments(source_id).await {
            Ok(found) => {
                let any = !found.is_empty();
                names.extend(found);
                any
            }
            Err(err) => {
                portal_error!("Error fetching photometry for source {}: {}", source_id, err);
                false
            }
        };

        match self.portal.spectra_instruments(source_id).await {
            Ok(found) if found.is_empty() => {
                if has_photometry {
                    portal_warn!("Source {}: no spectroscopy", source_id);
                } else {
                    portal_warn!("Source {}: no photometry and spectroscopy", source_id);
                }
            }
            Ok(found) => names.extend(found),
            Err(err) => {
                portal_error!("Error fetching spectra for source {}: {}", source_id, err)
            }
        }

        let mut strings = Vec::with_capacity(names.len());
        for instrument in names {
            let telescope = match self.portal.telescope_for_instrument(&instrument).await {
                Ok(Some(name)) => name,
                Ok(None) => {
                    portal_error!("Instrument not found: {}", instrument);
                    UNKNOWN_TELESCOPE.to_string()
                }
                Err(err) => {
                    portal_error!("Error fetching instrument '{}': {}", instrument, err);
                    UNKNOWN_TELESCOPE.to_string()
                }
            };
            strings.push(format!("{telescope}-{instrument}"));
        }
        strings
    }

    /// Ensures the save path, then polls forever.
    pub async fn run(&mut self) {
        if let Err(err) = self.store.ensure_save_path().await {
            portal_error!("Error during base folder creation: {}", err);
        }
        portal_info!("Listening for new sources...");

        loop {
            match self.poll_once().await {
                Ok(report) if !report.new_sources.is_empty() => {
                    portal_info!(
                        "Mirrored {} of {} new sources; listening for new sources...",
                        report.mirrored.len(),
                        report.new_sources.len()
                    );
                }
                Ok(_) => {}
                Err(err) => portal_error!("Polling for new sources failed: {}", err),
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }
}
