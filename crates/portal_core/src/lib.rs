//! Portal core: source records, derived astrophysical quantities and the pure
//! paging state machine.
mod annotations;
mod classification;
mod colors;
mod cosmology;
mod differ;
mod distance;
mod dustmap;
mod effect;
mod enrich;
pub mod fits;
mod galactic;
mod msg;
mod record;
mod state;
mod update;

pub use annotations::{extract_annotation_fields, AnnotationFields};
pub use classification::join_classifications;
pub use colors::magnitude_color;
pub use cosmology::{Cosmology, CosmologyParams};
pub use differ::SeenSources;
pub use distance::{DistanceError, DistanceRule, MIN_HUBBLE_FLOW_VELOCITY_KM_S};
pub use dustmap::{missing_map_files, DustMapError, ExtinctionLookup, SfdDustMap, SFD_MAP_FILES};
pub use effect::{GroupOutcome, PageRequest, PagerEffect};
pub use enrich::{Deriver, EnrichedRecord};
pub use galactic::{is_galactic, CoordinateError, Galactic, GalacticFlags, GALACTIC_THRESHOLDS};
pub use msg::PagerMsg;
pub use record::{finite_number, Annotation, Classification, GroupId, SourceId, SourceRecord};
pub use state::{PaginationState, Pager, PagerPhase, RetryPolicy};
pub use update::update;
