use std::fs;
use std::path::Path;

mod common;

use common::encode_f32_image;
use portal_core::fits::FitsImage;
use portal_core::{missing_map_files, DustMapError, ExtinctionLookup, SfdDustMap, SFD_MAP_FILES};
use tempfile::TempDir;

const SIZE: usize = 8;

fn hemisphere(pole: i32, value_at: impl Fn(usize, usize) -> f32) -> Vec<u8> {
    let pixels: Vec<f32> = (0..SIZE * SIZE)
        .map(|i| value_at(i % SIZE, i / SIZE))
        .collect();
    encode_f32_image(
        SIZE,
        SIZE,
        &[
            ("CRPIX1", "4.5".to_string()),
            ("CRPIX2", "4.5".to_string()),
            ("LAM_SCAL", "4".to_string()),
            ("LAM_NSGP", pole.to_string()),
        ],
        &pixels,
    )
}

fn write_maps(dir: &Path) {
    let [north, south] = SFD_MAP_FILES;
    fs::create_dir_all(dir.join("sfd")).unwrap();
    // North map holds each pixel's x index so the projection can be read back.
    fs::write(dir.join(north), hemisphere(1, |x, _| x as f32)).unwrap();
    fs::write(dir.join(south), hemisphere(-1, |_, _| 0.25)).unwrap();
}

fn assert_close(actual: f64, expected: f64) {
    assert!((actual - expected).abs() < 1e-4, "expected {expected}, got {actual}");
}

#[test]
fn north_pole_maps_to_the_reference_pixel() {
    let temp = TempDir::new().unwrap();
    write_maps(temp.path());
    let map = SfdDustMap::open(temp.path()).unwrap();

    assert_close(map.ebv(192.859_48, 27.128_25).unwrap(), 3.5);
}

#[test]
fn projection_follows_galactic_latitude() {
    let temp = TempDir::new().unwrap();
    write_maps(temp.path());
    let map = SfdDustMap::open(temp.path()).unwrap();

    // l = 0, b = 30: x = 3.5 + 4 * sqrt(1 - sin b).
    assert_close(map.ebv(240.633_994_6, -11.012_405_3).unwrap(), 3.5 + 2.0 * 2f64.sqrt());
    // l = 0, b = 12 falls past the last column and is clamped.
    assert_close(map.ebv(255.351_748_7, -22.238_181_8).unwrap(), 7.0);
}

#[test]
fn southern_sky_reads_the_south_map() {
    let temp = TempDir::new().unwrap();
    write_maps(temp.path());
    let lookup = ExtinctionLookup::load(temp.path());

    assert!(lookup.is_enabled());
    assert_close(lookup.ebv(0.0, 0.0).unwrap(), 0.25);
    assert_eq!(lookup.ebv(0.0, 120.0), None);
    assert_eq!(lookup.ebv(f64::NAN, 0.0), None);
}

#[test]
fn missing_maps_disable_the_lookup() {
    let temp = TempDir::new().unwrap();
    assert_eq!(missing_map_files(temp.path()).len(), 2);

    let lookup = ExtinctionLookup::load(temp.path());
    assert!(!lookup.is_enabled());
    assert_eq!(lookup.ebv(10.0, 10.0), None);

    write_maps(temp.path());
    assert!(missing_map_files(temp.path()).is_empty());
}

#[test]
fn swapped_hemispheres_are_rejected() {
    let north = FitsImage::from_bytes(&hemisphere(-1, |_, _| 0.1)).unwrap();
    let south = FitsImage::from_bytes(&hemisphere(-1, |_, _| 0.1)).unwrap();
    assert!(matches!(
        SfdDustMap::from_images(north, south),
        Err(DustMapError::WrongHemisphere { .. })
    ));
}
