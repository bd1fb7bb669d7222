//! Luminosity distance from the first available measurement of a source.

use serde_json::Value;
use thiserror::Error;

use crate::cosmology::Cosmology;
use crate::record::{finite_number, SourceRecord};

/// Redshift to recession velocity, km/s.
const REDSHIFT_TO_VELOCITY_KM_S: f64 = 2.99e5;
/// Below this recession velocity peculiar motion dominates the Hubble flow.
pub const MIN_HUBBLE_FLOW_VELOCITY_KM_S: f64 = 350.0;
/// Divisor applied to `dist_cm`, matching the portal's own conversion.
const DIST_CM_DIVISOR: f64 = 3.085e18;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DistanceError {
    #[error("altdata field {field} is not numeric: {value}")]
    NonNumeric { field: &'static str, value: String },
}

/// Source of a luminosity distance, in priority order.
///
/// Altdata measurements come first; the first field present decides the
/// rule, even when its value turns out to be unusable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DistanceRule {
    /// Distance modulus in magnitudes.
    DistanceModulus(f64),
    /// Parallax in arcseconds.
    Parallax(f64),
    Kpc(f64),
    Mpc(f64),
    Pc(f64),
    Cm(f64),
    Redshift(f64),
    Unknown,
}

type AltdataRule = (&'static str, fn(f64) -> DistanceRule);

const ALTDATA_RULES: [AltdataRule; 6] = [
    ("dm", DistanceRule::DistanceModulus),
    ("parallax", DistanceRule::Parallax),
    ("dist_kpc", DistanceRule::Kpc),
    ("dist_Mpc", DistanceRule::Mpc),
    ("dist_pc", DistanceRule::Pc),
    ("dist_cm", DistanceRule::Cm),
];

impl DistanceRule {
    /// Picks the rule for a record. Fails only when the chosen altdata field is not a number.
    pub fn select(record: &SourceRecord) -> Result<Self, DistanceError> {
        if let Some(altdata) = record.altdata_map() {
            for (field, rule) in ALTDATA_RULES {
                match altdata.get(field) {
                    None | Some(Value::Null) => continue,
                    Some(value) => {
                        return finite_number(value).map(rule).ok_or_else(|| {
                            DistanceError::NonNumeric {
                                field,
                                value: value.to_string(),
                            }
                        });
                    }
                }
            }
        }

        match record.redshift {
            Some(z) if z != 0.0 && z.is_finite() => Ok(DistanceRule::Redshift(z)),
            _ => Ok(DistanceRule::Unknown),
        }
    }

    /// Luminosity distance in Mpc; `None` when the rule cannot give a finite distance.
    pub fn resolve(self, cosmology: &Cosmology) -> Option<f64> {
        let distance = match self {
            DistanceRule::DistanceModulus(dm) => 10f64.powf(dm / 5.0) * 1e-5,
            DistanceRule::Parallax(parallax) if parallax <= 0.0 => return None,
            DistanceRule::Parallax(parallax) => 1e-6 / parallax,
            DistanceRule::Kpc(kpc) => kpc * 1e-3,
            DistanceRule::Mpc(mpc) => mpc,
            DistanceRule::Pc(pc) => pc * 1e-6,
            DistanceRule::Cm(cm) => cm / DIST_CM_DIVISOR,
            DistanceRule::Redshift(z) => {
                if z * REDSHIFT_TO_VELOCITY_KM_S < MIN_HUBBLE_FLOW_VELOCITY_KM_S {
                    return None;
                }
                cosmology.luminosity_distance_mpc(z)?
            }
            DistanceRule::Unknown => return None,
        };
        distance.is_finite().then_some(distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(altdata: Option<Value>, redshift: Option<f64>) -> SourceRecord {
        let mut record = SourceRecord::at("src", 10.0, 20.0);
        record.altdata = altdata;
        record.redshift = redshift;
        record
    }

    fn resolve(record: &SourceRecord) -> Option<f64> {
        DistanceRule::select(record)
            .ok()
            .and_then(|rule| rule.resolve(&Cosmology::planck18()))
    }

    #[test]
    fn distance_modulus_beats_everything_else() {
        let source = record(
            Some(json!({"dm": 25, "parallax": 0.5, "dist_Mpc": 3})),
            Some(0.1),
        );
        assert_eq!(DistanceRule::select(&source), Ok(DistanceRule::DistanceModulus(25.0)));
        let distance = resolve(&source).unwrap();
        assert!((distance - 1.0).abs() < 1e-12);
    }

    #[test]
    fn unit_conversions() {
        let cases = [
            (json!({"parallax": 1e-3}), 1e-3),
            (json!({"dist_kpc": 8.0}), 8e-3),
            (json!({"dist_Mpc": 10}), 10.0),
            (json!({"dist_pc": 2.0e6}), 2.0),
            (json!({"dist_cm": 6.17e18}), 2.0),
        ];
        for (altdata, expected) in cases {
            let distance = resolve(&record(Some(altdata.clone()), None)).unwrap();
            assert!(
                (distance - expected).abs() < 1e-12 * expected.max(1.0),
                "{altdata} -> {distance}"
            );
        }
    }

    #[test]
    fn identity_rule_is_exact() {
        assert_eq!(resolve(&record(Some(json!({"dist_Mpc": 10})), None)), Some(10.0));
    }

    #[test]
    fn null_fields_fall_through_to_the_next_rule() {
        let source = record(Some(json!({"dm": null, "dist_kpc": 5})), None);
        assert_eq!(DistanceRule::select(&source), Ok(DistanceRule::Kpc(5.0)));
    }

    #[test]
    fn present_field_never_falls_through() {
        let source = record(Some(json!({"parallax": 0, "dist_Mpc": 4})), Some(0.1));
        assert_eq!(DistanceRule::select(&source), Ok(DistanceRule::Parallax(0.0)));
        assert_eq!(resolve(&source), None);

        let garbage = record(Some(json!({"dm": "far", "dist_Mpc": 4})), None);
        assert!(matches!(
            DistanceRule::select(&garbage),
            Err(DistanceError::NonNumeric { field: "dm", .. })
        ));
    }

    #[test]
    fn scalar_altdata_is_ignored() {
        let source = record(Some(json!("dm=25")), Some(0.1));
        assert_eq!(DistanceRule::select(&source), Ok(DistanceRule::Redshift(0.1)));
    }

    #[test]
    fn nearby_redshift_is_outside_hubble_flow() {
        assert_eq!(resolve(&record(None, Some(0.001))), None);
    }

    #[test]
    fn zero_or_missing_redshift_is_unknown() {
        assert_eq!(DistanceRule::select(&record(None, Some(0.0))), Ok(DistanceRule::Unknown));
        assert_eq!(resolve(&record(None, None)), None);
    }

    #[test]
    fn redshift_uses_the_pinned_cosmology() {
        let distance = resolve(&record(None, Some(0.1))).unwrap();
        let expected = Cosmology::planck18().luminosity_distance_mpc(0.1).unwrap();
        assert_eq!(distance, expected);
        assert!((distance - 475.822).abs() < 0.01);
    }
}
