//! Portal engine: HTTP clients, the extraction driver, table output and the folder watcher.
mod dustmaps;
mod extract;
mod fetch;
mod persist;
mod portal;
mod table;
mod types;
mod watcher;
mod webdav;

pub use dustmaps::{ensure_dust_maps, DownloadError, DEFAULT_DUSTMAPS_BASE_URL};
pub use extract::{ExtractionReport, ExtractionSettings, Extractor};
pub use fetch::{FetchSettings, Fetcher, ReqwestFetcher};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use portal::{Portal, ReqwestPortal, SourceQuery, DEFAULT_PAGE_SIZE};
pub use table::{render_table, table_filename, write_table, TableError, TABLE_HEADERS};
pub use types::{FailureKind, FetchError, FetchMetadata, FetchOutput, GroupReport, SourcePage};
pub use watcher::{InstrumentSource, PollReport, Watcher, WatcherSettings, UNKNOWN_TELESCOPE};
pub use webdav::{FolderStatus, MirrorError, MirrorReport, WebDavClient, WebDavSettings};
