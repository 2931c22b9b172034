mod common;

use common::{MasterFile, GONIOMETER};
use nxinfo_core::{ExtractConfig, WarningKind};
use nxinfo_io::{extract, Error};

fn checked() -> ExtractConfig {
    ExtractConfig::default().with_validation(true)
}

fn with_omega(master: &MasterFile, n: usize) {
    let omega: Vec<f64> = (0..n).map(|i| i as f64 * 0.1).collect();
    master.f64s(&format!("{GONIOMETER}/omega"), &omega, Some("degree"));
}

#[test]
fn test_interrupted_collection() {
    let master = MasterFile::create();
    master
        .counts(100, 1)
        .data_file("data_000001", 50, Some((1, 50)))
        .data_file("data_000002", 40, Some((51, 90)));
    with_omega(&master, 100);
    let fixture = master.finish();

    let ex = extract(fixture.path(), None, &checked()).unwrap();
    assert!(ex.validated);
    assert_eq!(ex.effective_images, 90);
    assert_eq!(ex.warnings.count(WarningKind::SchemaInconsistency), 1);
    assert_eq!(ex.image_number, 1);
    assert_eq!(ex.image_number_offset, 0);
}

#[test]
fn test_more_images_than_declared() {
    let master = MasterFile::create();
    master
        .counts(100, 1)
        .data_file("data_000001", 60, None)
        .data_file("data_000002", 50, None);
    with_omega(&master, 100);
    let fixture = master.finish();

    let ex = extract(fixture.path(), None, &checked()).unwrap();
    assert_eq!(ex.effective_images, 100);
    assert_eq!(ex.warnings.count(WarningKind::SchemaInconsistency), 1);
}

#[test]
fn test_matching_count_has_no_warning() {
    let master = MasterFile::create();
    master.counts(8, 1).data_file("data_000001", 8, None);
    with_omega(&master, 8);
    let fixture = master.finish();

    let ex = extract(fixture.path(), Some(8), &checked()).unwrap();
    assert_eq!(ex.effective_images, 8);
    assert_eq!(ex.image_number, 8);
    assert_eq!(ex.warnings.count(WarningKind::SchemaInconsistency), 0);
}

#[test]
fn test_request_beyond_declared_uses_physical_numbers() {
    let master = MasterFile::create();
    master
        .counts(10, 1)
        .data_file("data_000011", 10, Some((101, 110)));
    with_omega(&master, 10);
    let fixture = master.finish();

    let ex = extract(fixture.path(), Some(105), &ExtractConfig::default()).unwrap();
    assert!(ex.validated);
    assert_eq!(ex.image_number, 105);
    assert_eq!(ex.image_number_offset, 100);
    assert!((ex.header.omega.start - 0.4).abs() < 1e-9);
}

#[test]
fn test_request_beyond_linked_numbers() {
    let master = MasterFile::create();
    master
        .counts(10, 1)
        .data_file("data_000011", 10, Some((101, 110)));
    let fixture = master.finish();

    let err = extract(fixture.path(), Some(111), &ExtractConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        Error::OutOfRangeImageRequest {
            requested: 111,
            available: 10
        }
    ));
}

#[test]
fn test_missing_data_file_is_fatal_when_checking() {
    let master = MasterFile::create();
    master
        .counts(10, 1)
        .dangling_link("data_000001", "run_01_data_000001.h5");
    let fixture = master.finish();

    let err = extract(fixture.path(), None, &checked()).unwrap_err();
    assert!(matches!(err, Error::ExternalLinkUnavailable { .. }));
    assert!(err.is_fatal());
}

#[test]
fn test_missing_data_file_degrades_forced_check() {
    let master = MasterFile::create();
    master
        .counts(10, 1)
        .dangling_link("data_000001", "run_01_data_000001.h5");
    let fixture = master.finish();

    let err = extract(fixture.path(), Some(20), &ExtractConfig::default()).unwrap_err();
    assert!(matches!(err, Error::OutOfRangeImageRequest { .. }));
    assert!(!err.is_fatal());
}

#[test]
fn test_no_links_keeps_declared_count() {
    let master = MasterFile::create();
    master.counts(5, 1);
    with_omega(&master, 5);
    master.group("/entry/data");
    let fixture = master.finish();

    let ex = extract(fixture.path(), None, &checked()).unwrap();
    assert_eq!(ex.effective_images, 5);
    assert_eq!(ex.warnings.count(WarningKind::SchemaInconsistency), 0);
}

#[test]
fn test_compressed_data_file_accepted() {
    let master = MasterFile::create();
    master
        .counts(6, 1)
        .compressed_data_file("data_000001", 4)
        .compressed_data_file("data_000002", 2);
    with_omega(&master, 6);
    let fixture = master.finish();

    let ex = extract(fixture.path(), None, &checked()).unwrap();
    assert!(ex.validated);
    assert_eq!(ex.effective_images, 6);
    assert_eq!(ex.warnings.count(WarningKind::SchemaInconsistency), 0);
}
