use portal_logging::portal_warn;
use serde_json::Value;

use crate::annotations::extract_annotation_fields;
use crate::classification::join_classifications;
use crate::colors::magnitude_color;
use crate::cosmology::Cosmology;
use crate::distance::DistanceRule;
use crate::dustmap::ExtinctionLookup;
use crate::galactic::GalacticFlags;
use crate::record::{GroupId, SourceId, SourceRecord};

/// One output row: a source plus everything derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRecord {
    pub source_id: SourceId,
    pub ra: f64,
    pub dec: f64,
    pub t0: Option<Value>,
    /// E(B-V) in magnitudes.
    pub ebv: Option<f64>,
    /// Luminosity distance in Mpc.
    pub luminosity_distance: Option<f64>,
    pub photo_z: Option<Value>,
    pub w1mpro: Option<Value>,
    pub w2mpro: Option<Value>,
    pub w3mpro: Option<Value>,
    pub w1_w2: Option<f64>,
    pub w2_w3: Option<f64>,
    pub classifications: Option<String>,
    pub galactic: GalacticFlags,
    pub group_id: GroupId,
}

/// Computes derived quantities for each fetched source.
///
/// Both lookups are fixed at construction; enrichment never fails, a
/// quantity that cannot be computed is left empty.
#[derive(Debug, Clone, Default)]
pub struct Deriver {
    extinction: ExtinctionLookup,
    cosmology: Cosmology,
}

impl Deriver {
    pub fn new(extinction: ExtinctionLookup, cosmology: Cosmology) -> Self {
        Self {
            extinction,
            cosmology,
        }
    }

    pub fn luminosity_distance(&self, record: &SourceRecord) -> Option<f64> {
        match DistanceRule::select(record) {
            Ok(rule) => rule.resolve(&self.cosmology),
            Err(err) => {
                portal_warn!("Source {}: no luminosity distance: {}", record.id, err);
                None
            }
        }
    }

    pub fn enrich(&self, record: &SourceRecord, group_id: GroupId) -> EnrichedRecord {
        let annotations = extract_annotation_fields(&record.annotations);
        let w1_w2 = magnitude_color(annotations.w1mpro.as_ref(), annotations.w2mpro.as_ref());
        let w2_w3 = magnitude_color(annotations.w2mpro.as_ref(), annotations.w3mpro.as_ref());

        EnrichedRecord {
            source_id: record.id.clone(),
            ra: record.ra,
            dec: record.dec,
            t0: record.t0.clone(),
            ebv: self.extinction.ebv(record.ra, record.dec),
            luminosity_distance: self.luminosity_distance(record),
            photo_z: annotations.photo_z,
            w1mpro: annotations.w1mpro,
            w2mpro: annotations.w2mpro,
            w3mpro: annotations.w3mpro,
            w1_w2,
            w2_w3,
            classifications: join_classifications(&record.classifications),
            galactic: GalacticFlags::classify(record.ra, record.dec),
            group_id,
        }
    }
}
