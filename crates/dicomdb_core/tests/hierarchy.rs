//! Navigation, round-trip and re-keying behavior across sessions.

use dicomdb_core::{DataObject, DataSet, Database, Filter, Generation, Tag, Value};
use std::collections::HashSet;
use std::path::Path;
use tempfile::tempdir;

fn open_db(path: &Path) -> Database {
    Database::open(&path.join("db")).unwrap()
}

fn instances(n: i64) -> DataSet {
    let mut dataset = DataSet::new();
    for i in 0..n {
        let mut object = DataObject::new();
        object.set(Tag::InstanceNumber, i + 1);
        object.set(Tag::SliceLocation, i as f64 * 2.5);
        dataset.push(object);
    }
    dataset
}

#[test]
fn writing_then_reading_a_series_round_trips() {
    let temp = tempdir().unwrap();
    let db = open_db(temp.path());
    let series = db
        .new_series(&[(Tag::SeriesDescription, Value::from("T2w"))])
        .unwrap();
    series.write(&mut instances(4)).unwrap();

    let listed = series.instances().unwrap();
    assert_eq!(listed.len(), 4);

    let dataset = series.read().unwrap();
    assert_eq!(dataset.len(), 4);
    for (i, object) in dataset.objects().iter().enumerate() {
        assert_eq!(object.get_int(Tag::InstanceNumber), Some(i as i64 + 1));
        assert_eq!(
            object.get(Tag::SliceLocation),
            Some(&Value::Float(i as f64 * 2.5))
        );
        assert_eq!(object.get_str(Tag::SeriesDescription), Some("T2w"));
    }
}

#[test]
fn uid_tuples_stay_unique_across_copy_and_merge() {
    let temp = tempdir().unwrap();
    let db = open_db(temp.path());
    let series_a = db.new_series(&[]).unwrap();
    series_a.write(&mut instances(3)).unwrap();
    let series_b = series_a.new_sibling(&[]).unwrap();
    series_b.write(&mut instances(2)).unwrap();

    let study = series_a.parent().unwrap();
    series_a.copy_to(&study.parent().unwrap()).unwrap();
    series_a.merge_with(&series_b).unwrap();
    series_b.copy().unwrap();

    // series_a keeps 3; series_b holds its 2 plus 3 merged in; the
    // copies add 3 (series_a) and 5 (series_b after the merge)
    let all = db.root().instances().unwrap();
    assert_eq!(all.len(), 3 + 5 + 3 + 5);
    let tuples: HashSet<Vec<String>> = all.iter().map(|r| r.uids().to_vec()).collect();
    assert_eq!(tuples.len(), all.len());
}

#[test]
fn copying_a_series_rekeys_below_the_destination() {
    let temp = tempdir().unwrap();
    let db = open_db(temp.path());
    let source = db.new_series(&[]).unwrap();
    source.write(&mut instances(3)).unwrap();
    let source_sops: HashSet<String> = source
        .instances()
        .unwrap()
        .iter()
        .map(|r| r.uids()[3].clone())
        .collect();

    let dest_study = db.new_study(&[]).unwrap();
    let copy = source.copy_to(&dest_study).unwrap();

    // destination identity preserved above the copy point
    assert_eq!(copy.uids()[0], dest_study.uids()[0]);
    assert_eq!(copy.uids()[1], dest_study.uids()[1]);
    // fresh series identifier
    assert_ne!(copy.uids()[2], source.uids()[2]);
    // every instance identifier regenerated
    let copied = copy.instances().unwrap();
    assert_eq!(copied.len(), 3);
    for record in &copied {
        assert!(!source_sops.contains(&record.uids()[3]));
    }
    // source untouched
    assert_eq!(source.instances().unwrap().len(), 3);
}

#[test]
fn copying_a_patient_preserves_nothing_shared() {
    let temp = tempdir().unwrap();
    let db = open_db(temp.path());
    let series = db.new_series(&[]).unwrap();
    series.write(&mut instances(2)).unwrap();
    let patient = db.patients().unwrap().remove(0);

    let copy = patient.copy_to(&db.root()).unwrap();
    let copied_series = copy.series_list().unwrap();
    assert_eq!(copied_series.len(), 1);
    // study and series below the copy point are re-keyed
    assert_ne!(copied_series[0].uids()[1], series.uids()[1]);
    assert_ne!(copied_series[0].uids()[2], series.uids()[2]);
}

#[test]
fn merge_folds_target_attributes_onto_copies() {
    let temp = tempdir().unwrap();
    let db = open_db(temp.path());
    let source = db.new_series(&[]).unwrap();
    source.write(&mut instances(2)).unwrap();

    let mut target = db.new_series(&[]).unwrap();
    target
        .set_attribute(Tag::SeriesDescription, "MergedSeries")
        .unwrap();
    source.merge_with(&target).unwrap();

    let merged = target.read().unwrap();
    assert_eq!(merged.len(), 2);
    for object in merged.objects() {
        assert_eq!(object.get_str(Tag::SeriesDescription), Some("MergedSeries"));
    }
    // merging into a different generation is invalid
    let patient = db.patients().unwrap().remove(0);
    assert!(source.merge_with(&patient).is_err());
}

#[test]
fn filter_studies_by_cached_description() {
    let temp = tempdir().unwrap();
    let db = open_db(temp.path());
    let patient = db.new_patient(&[]).unwrap();
    let mri = patient
        .new_study(&[(Tag::StudyDescription, Value::from("MRI"))])
        .unwrap();
    mri.new_series(&[]).unwrap().write(&mut instances(1)).unwrap();
    let xray = patient
        .new_study(&[(Tag::StudyDescription, Value::from("Xray"))])
        .unwrap();
    xray.new_series(&[]).unwrap().write(&mut instances(1)).unwrap();

    let hits = patient
        .studies_where(&Filter::new().eq(Tag::StudyDescription, "MRI"))
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].uids()[1], mri.uids()[1]);

    let all = patient.studies().unwrap();
    assert_eq!(all.len(), 2);
    // first-seen order
    assert_eq!(all[0].uids()[1], mri.uids()[1]);
    assert_eq!(all[1].uids()[1], xray.uids()[1]);
}

#[test]
fn navigation_edges() {
    let temp = tempdir().unwrap();
    let db = open_db(temp.path());
    let series = db.new_series(&[]).unwrap();
    series.write(&mut instances(1)).unwrap();
    let instance = series.instances().unwrap().remove(0);

    // children beyond the leaf generation are empty, not an error
    assert!(instance.children().unwrap().is_empty());
    // an instance's instances() is itself
    assert_eq!(instance.instances().unwrap(), vec![instance.clone()]);
    // an ancestor above the root is invalid
    assert!(db.root().parent().is_err());
    // parents are recomputed, never stored
    assert_eq!(instance.parent().unwrap(), series);
    assert_eq!(
        instance.parent().unwrap().parent().unwrap().generation(),
        Generation::Study
    );
}

#[test]
fn values_read_through_cached_and_fresh_paths() {
    let temp = tempdir().unwrap();
    let db = open_db(temp.path());
    let series = db
        .new_series(&[(Tag::SeriesDescription, Value::from("flair"))])
        .unwrap();
    let mut dataset = instances(2);
    for object in dataset.objects_mut() {
        object.set(Tag::Modality, "MR");
    }
    series.write(&mut dataset).unwrap();

    // cached column
    assert_eq!(
        series.values_of(Tag::SeriesDescription).unwrap(),
        vec![Value::from("flair")]
    );
    // uncached tag read from the files
    assert_eq!(series.values_of(Tag::Modality).unwrap(), vec![Value::from("MR")]);

    // write-through update
    let mut series = series;
    series
        .set_values(&[(Tag::SeriesDescription, Value::from("flair +c"))])
        .unwrap();
    assert_eq!(
        series.values_of(Tag::SeriesDescription).unwrap(),
        vec![Value::from("flair +c")]
    );
    for object in series.read().unwrap().objects() {
        assert_eq!(object.get_str(Tag::SeriesDescription), Some("flair +c"));
    }
}
