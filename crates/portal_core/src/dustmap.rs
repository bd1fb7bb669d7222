//! E(B-V) reddening from the Schlegel, Finkbeiner & Davis (1998) all-sky maps.

use std::path::{Path, PathBuf};

use portal_logging::{portal_info, portal_warn_once};
use thiserror::Error;

use crate::fits::{FitsError, FitsImage};
use crate::galactic::{CoordinateError, Galactic};

/// North and south galactic hemisphere maps, relative to the dust-map data directory.
pub const SFD_MAP_FILES: [&str; 2] = ["sfd/SFD_dust_4096_ngp.fits", "sfd/SFD_dust_4096_sgp.fits"];

const DEFAULT_LAM_SCALE: f64 = 2048.0;

#[derive(Debug, Error)]
pub enum DustMapError {
    #[error("fits error in {path}: {source}")]
    Fits {
        path: String,
        #[source]
        source: FitsError,
    },
    #[error("map {path} is for hemisphere {found}, expected {expected}")]
    WrongHemisphere {
        path: String,
        found: f64,
        expected: f64,
    },
    #[error(transparent)]
    Coordinate(#[from] CoordinateError),
    #[error("map value at l={l:.4} b={b:.4} is not a valid reddening")]
    InvalidValue { l: f64, b: f64 },
}

/// One hemisphere in its zenithal-equal-area projection.
#[derive(Debug, Clone)]
struct Hemisphere {
    image: FitsImage,
    crpix1: f64,
    crpix2: f64,
    scale: f64,
    /// +1 for the north galactic pole map, -1 for the south.
    pole: f64,
}

impl Hemisphere {
    fn new(image: FitsImage, pole: f64, path: &str) -> Result<Self, DustMapError> {
        if let Some(found) = image.keyword_f64("LAM_NSGP") {
            if found != pole {
                return Err(DustMapError::WrongHemisphere {
                    path: path.to_string(),
                    found,
                    expected: pole,
                });
            }
        }
        let centre_x = (image.width as f64 + 1.0) / 2.0;
        let centre_y = (image.height as f64 + 1.0) / 2.0;
        Ok(Self {
            crpix1: image.keyword_f64("CRPIX1").unwrap_or(centre_x),
            crpix2: image.keyword_f64("CRPIX2").unwrap_or(centre_y),
            scale: image.keyword_f64("LAM_SCAL").unwrap_or(DEFAULT_LAM_SCALE),
            image,
            pole,
        })
    }

    /// Zero-based pixel position of a galactic coordinate.
    fn project(&self, galactic: Galactic) -> (f64, f64) {
        let (l, b) = (galactic.l.to_radians(), galactic.b.to_radians());
        let radius = self.scale * (1.0 - self.pole * b.sin()).max(0.0).sqrt();
        let x = self.crpix1 - 1.0 + radius * l.cos();
        let y = self.crpix2 - 1.0 - self.pole * radius * l.sin();
        (x, y)
    }

    /// Bilinear interpolation, clamping to the nearest edge pixel outside the image.
    fn sample(&self, x: f64, y: f64) -> Option<f64> {
        let max_x = self.image.width.checked_sub(1)? as f64;
        let max_y = self.image.height.checked_sub(1)? as f64;
        let x = x.clamp(0.0, max_x);
        let y = y.clamp(0.0, max_y);

        let (x0, y0) = (x.floor(), y.floor());
        let (fx, fy) = (x - x0, y - y0);
        let (x0, y0) = (x0 as usize, y0 as usize);
        let x1 = (x0 + 1).min(self.image.width - 1);
        let y1 = (y0 + 1).min(self.image.height - 1);

        let at = |px: usize, py: usize| self.image.pixel(px, py).map(f64::from);
        let top = at(x0, y0)? * (1.0 - fx) + at(x1, y0)? * fx;
        let bottom = at(x0, y1)? * (1.0 - fx) + at(x1, y1)? * fx;
        Some(top * (1.0 - fy) + bottom * fy)
    }
}

/// Both SFD hemispheres, loaded once and read-only afterwards.
#[derive(Debug, Clone)]
pub struct SfdDustMap {
    north: Hemisphere,
    south: Hemisphere,
}

impl SfdDustMap {
    pub fn open(data_dir: &Path) -> Result<Self, DustMapError> {
        let [north_file, south_file] = SFD_MAP_FILES;
        let load = |file: &str| {
            let path = data_dir.join(file);
            FitsImage::open(&path).map_err(|source| DustMapError::Fits {
                path: path.display().to_string(),
                source,
            })
        };
        let north = load(north_file)?;
        let south = load(south_file)?;
        Self::from_images(north, south)
    }

    pub fn from_images(north: FitsImage, south: FitsImage) -> Result<Self, DustMapError> {
        let [north_file, south_file] = SFD_MAP_FILES;
        Ok(Self {
            north: Hemisphere::new(north, 1.0, north_file)?,
            south: Hemisphere::new(south, -1.0, south_file)?,
        })
    }

    /// E(B-V) in magnitudes at an ICRS position in degrees.
    pub fn ebv(&self, ra: f64, dec: f64) -> Result<f64, DustMapError> {
        let galactic = Galactic::from_icrs(ra, dec)?;
        let hemisphere = if galactic.b >= 0.0 {
            &self.north
        } else {
            &self.south
        };
        let (x, y) = hemisphere.project(galactic);
        hemisphere
            .sample(x, y)
            .filter(|value| value.is_finite() && *value >= 0.0)
            .ok_or(DustMapError::InvalidValue {
                l: galactic.l,
                b: galactic.b,
            })
    }
}

/// Dust-map files under `data_dir` that do not exist yet.
pub fn missing_map_files(data_dir: &Path) -> Vec<PathBuf> {
    SFD_MAP_FILES
        .iter()
        .map(|file| data_dir.join(file))
        .filter(|path| !path.is_file())
        .collect()
}

/// Extinction lookup capability, decided once at startup.
#[derive(Debug, Clone, Default)]
pub enum ExtinctionLookup {
    Enabled(SfdDustMap),
    /// Every lookup yields `None`.
    #[default]
    Disabled,
}

impl ExtinctionLookup {
    /// Loads the maps, degrading to `Disabled` with a warning when they cannot be read.
    pub fn load(data_dir: &Path) -> Self {
        match SfdDustMap::open(data_dir) {
            Ok(map) => {
                portal_info!("Loaded SFD dust maps from {:?}", data_dir);
                ExtinctionLookup::Enabled(map)
            }
            Err(err) => {
                portal_warn_once!(
                    "Could not load SFD dust maps from {:?}: {}; E(B-V) will be empty",
                    data_dir,
                    err
                );
                ExtinctionLookup::Disabled
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, ExtinctionLookup::Enabled(_))
    }

    pub fn ebv(&self, ra: f64, dec: f64) -> Option<f64> {
        match self {
            ExtinctionLookup::Enabled(map) => map.ebv(ra, dec).ok(),
            ExtinctionLookup::Disabled => None,
        }
    }
}
