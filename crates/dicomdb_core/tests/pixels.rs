//! Pixel volume round-trips through a series.

use dicomdb_core::create::{as_series, zeros};
use dicomdb_core::{DataObject, DataSet, Database, DbError, Tag, Volume};
use std::path::Path;
use tempfile::tempdir;

fn open_db(path: &Path) -> Database {
    Database::open(&path.join("db")).unwrap()
}

#[test]
fn zeros_round_trips_with_both_axis_orders() {
    let temp = tempdir().unwrap();
    let db = open_db(temp.path());
    let series = zeros(&db, (3, 128, 128)).unwrap();

    let volume = series.pixel_array(false).unwrap();
    assert_eq!(volume.shape(), (3, 128, 128));
    assert!(volume.values().iter().all(|v| *v == 0.0));

    let volume = series.pixel_array(true).unwrap();
    assert_eq!(volume.shape(), (128, 128, 3));
}

#[test]
fn values_survive_the_round_trip() {
    let temp = tempdir().unwrap();
    let db = open_db(temp.path());

    let mut volume = Volume::zeros((2, 4, 4));
    for i in 0..2 {
        for j in 0..4 {
            for k in 0..4 {
                volume.set(i, j, k, (i * 100 + j * 10 + k) as f32);
            }
        }
    }
    let series = as_series(&db, &volume, false, &[]).unwrap();
    assert_eq!(series.pixel_array(false).unwrap(), volume);

    // pixels-first on the way in and out
    let first = volume.to_pixels_first();
    let series = as_series(&db, &first, true, &[]).unwrap();
    assert_eq!(series.pixel_array(true).unwrap(), first);
    assert_eq!(series.pixel_array(false).unwrap(), volume);
}

#[test]
fn set_pixel_array_replaces_existing_content() {
    let temp = tempdir().unwrap();
    let db = open_db(temp.path());
    let series = zeros(&db, (3, 8, 8)).unwrap();
    assert_eq!(series.instances().unwrap().len(), 3);

    series
        .set_pixel_array(&Volume::zeros((5, 8, 8)), false)
        .unwrap();
    assert_eq!(series.instances().unwrap().len(), 5);
    assert_eq!(series.pixel_array(false).unwrap().shape(), (5, 8, 8));
}

#[test]
fn header_count_mismatch_aborts_before_any_write() {
    let temp = tempdir().unwrap();
    let db = open_db(temp.path());
    let series = zeros(&db, (3, 8, 8)).unwrap();

    let mut headers = DataSet::new();
    headers.push(DataObject::new());
    headers.push(DataObject::new());

    let result = series.set_pixel_array_with(
        &Volume::zeros((3, 8, 8)),
        Some(&headers),
        false,
        &dicomdb_core::NullStatus,
    );
    assert!(matches!(
        result,
        Err(DbError::ShapeMismatch { expected: 3, actual: 2 })
    ));
    // the series is untouched
    assert_eq!(series.instances().unwrap().len(), 3);
}

#[test]
fn non_series_record_delegates_to_a_fresh_series() {
    let temp = tempdir().unwrap();
    let db = open_db(temp.path());
    let patient = db.new_patient(&[]).unwrap();

    let series = patient
        .set_pixel_array(&Volume::zeros((2, 4, 4)), false)
        .unwrap();
    assert_eq!(series.generation(), dicomdb_core::Generation::Series);
    assert_eq!(series.uids()[0], patient.uids()[0]);
    assert_eq!(series.pixel_array(false).unwrap().shape(), (2, 4, 4));
}

#[test]
fn instance_numbers_order_the_slices() {
    let temp = tempdir().unwrap();
    let db = open_db(temp.path());
    let series = db.new_series(&[]).unwrap();

    // write slices with shuffled instance numbers
    let mut dataset = DataSet::new();
    for (number, fill) in [(3i64, 30.0f32), (1, 10.0), (2, 20.0)] {
        let mut object = DataObject::new();
        object.set(Tag::InstanceNumber, number);
        object.set_pixel_data(dicomdb_core::PixelData::new(1, 1, vec![fill]).unwrap());
        dataset.push(object);
    }
    series.write(&mut dataset).unwrap();

    let volume = series.pixel_array(false).unwrap();
    assert_eq!(volume.shape(), (3, 1, 1));
    assert_eq!(volume.values(), &[10.0, 20.0, 30.0]);
}
