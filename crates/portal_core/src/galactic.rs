//! ICRS to galactic coordinate conversion and galactic-plane flags.

use thiserror::Error;

/// Galactic-latitude thresholds (degrees) reported for every source.
pub const GALACTIC_THRESHOLDS: [f64; 3] = [10.0, 15.0, 20.0];

/// Rotation from ICRS equatorial to galactic cartesian axes (Hipparcos, ESA 1997 vol. 1 §1.5.3).
const ICRS_TO_GALACTIC: [[f64; 3]; 3] = [
    [-0.054_875_560_416_215_4, -0.873_437_090_234_885_0, -0.483_835_015_548_713_2],
    [0.494_109_427_875_583_7, -0.444_829_629_960_011_2, 0.746_982_244_497_218_9],
    [-0.867_666_149_019_004_7, -0.198_076_373_431_201_5, 0.455_983_776_175_066_9],
];

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoordinateError {
    #[error("non-finite coordinate ra={ra} dec={dec}")]
    NonFinite { ra: f64, dec: f64 },
    #[error("declination {0} outside [-90, 90]")]
    DeclinationOutOfRange(f64),
}

/// Galactic longitude `l` in [0, 360) and latitude `b` in [-90, 90], degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Galactic {
    pub l: f64,
    pub b: f64,
}

impl Galactic {
    pub fn from_icrs(ra: f64, dec: f64) -> Result<Self, CoordinateError> {
        if !ra.is_finite() || !dec.is_finite() {
            return Err(CoordinateError::NonFinite { ra, dec });
        }
        if dec.abs() > 90.0 {
            return Err(CoordinateError::DeclinationOutOfRange(dec));
        }

        let (ra, dec) = (ra.to_radians(), dec.to_radians());
        let v = [dec.cos() * ra.cos(), dec.cos() * ra.sin(), dec.sin()];
        let g: [f64; 3] = std::array::from_fn(|i| {
            ICRS_TO_GALACTIC[i]
                .iter()
                .zip(v.iter())
                .map(|(m, x)| m * x)
                .sum()
        });

        let l = g[1].atan2(g[0]).to_degrees().rem_euclid(360.0);
        let b = g[2].clamp(-1.0, 1.0).asin().to_degrees();
        Ok(Self { l, b })
    }
}

/// `Some(|b| < threshold)`, or `None` when the coordinate cannot be transformed.
pub fn is_galactic(ra: f64, dec: f64, threshold: f64) -> Option<bool> {
    Galactic::from_icrs(ra, dec)
        .ok()
        .map(|galactic| galactic.b.abs() < threshold)
}

/// Galactic-plane flags at the three reported thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GalacticFlags {
    pub within_10: Option<bool>,
    pub within_15: Option<bool>,
    pub within_20: Option<bool>,
}

impl GalacticFlags {
    pub fn classify(ra: f64, dec: f64) -> Self {
        let [t10, t15, t20] = GALACTIC_THRESHOLDS;
        Self {
            within_10: is_galactic(ra, dec, t10),
            within_15: is_galactic(ra, dec, t15),
            within_20: is_galactic(ra, dec, t20),
        }
    }
}
