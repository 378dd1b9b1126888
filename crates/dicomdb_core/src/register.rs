//! The tabular register: one row per instance file.
//!
//! The register is the authoritative state of an open database. Every
//! instance file on disk is mirrored by one row carrying its relative
//! path (the primary key), its four hierarchy identifiers, a handful of
//! cached descriptive attributes for fast filtering, and the
//! `created`/`removed` staging flags resolved by `save()`/`restore()`.
//!
//! Rows keep insertion order; child enumeration relies on the order of
//! first appearance rather than any sort.

use crate::error::DbResult;
use crate::filter::Filter;
use crate::types::new_uid;
use dicomdb_codec::{read_object, DataObject, Tag, Value};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Folder for instance files allocated by this session.
const DATA_DIR: &str = "dcm";

/// File extension for instance files allocated by this session.
const DATA_EXT: &str = "dcdb";

/// One register row: the index entry for a single instance file.
#[derive(Debug, Clone, PartialEq)]
pub struct RegisterRow {
    /// Relative file path within the database folder (primary key).
    pub path: String,
    /// Hierarchy identifiers: patient, study, series, instance.
    pub uids: [String; 4],
    /// Cached patient name.
    pub patient_name: Option<String>,
    /// Cached study description.
    pub study_description: Option<String>,
    /// Cached study date.
    pub study_date: Option<String>,
    /// Cached series description.
    pub series_description: Option<String>,
    /// Cached series number.
    pub series_number: Option<i64>,
    /// Cached instance number.
    pub instance_number: Option<i64>,
    /// Cached SOP class UID.
    pub sop_class_uid: Option<String>,
    /// Staged for deletion; resolved by `save()`.
    pub removed: bool,
    /// Staged as newly added; resolved by `save()`.
    pub created: bool,
}

impl RegisterRow {
    /// Builds a row from a decoded object.
    ///
    /// Returns `None` if the object lacks a complete hierarchy tuple.
    #[must_use]
    pub fn from_object(path: String, object: &DataObject) -> Option<Self> {
        let uids = object.uid_tuple()?;
        Some(Self {
            path,
            uids,
            patient_name: object.get_str(Tag::PatientName).map(String::from),
            study_description: object.get_str(Tag::StudyDescription).map(String::from),
            study_date: object.get_str(Tag::StudyDate).map(String::from),
            series_description: object.get_str(Tag::SeriesDescription).map(String::from),
            series_number: object.get_int(Tag::SeriesNumber),
            instance_number: object.get_int(Tag::InstanceNumber),
            sop_class_uid: object.get_str(Tag::SopClassUid).map(String::from),
            removed: false,
            created: false,
        })
    }

    /// Whether this row's hierarchy tuple starts with `prefix`.
    #[must_use]
    pub fn matches_prefix(&self, prefix: &[String]) -> bool {
        prefix.len() <= 4 && self.uids.iter().zip(prefix).all(|(uid, p)| uid == p)
    }

    /// Whether `tag` is one of the columns this register caches.
    #[must_use]
    pub fn is_cached(tag: Tag) -> bool {
        matches!(
            tag,
            Tag::PatientId
                | Tag::StudyInstanceUid
                | Tag::SeriesInstanceUid
                | Tag::SopInstanceUid
                | Tag::PatientName
                | Tag::StudyDescription
                | Tag::StudyDate
                | Tag::SeriesDescription
                | Tag::SeriesNumber
                | Tag::InstanceNumber
                | Tag::SopClassUid
        )
    }

    /// Returns the cached value for `tag`, if the column is cached and
    /// present on this row.
    #[must_use]
    pub fn cached_value(&self, tag: Tag) -> Option<Value> {
        match tag {
            Tag::PatientId => Some(Value::Str(self.uids[0].clone())),
            Tag::StudyInstanceUid => Some(Value::Str(self.uids[1].clone())),
            Tag::SeriesInstanceUid => Some(Value::Str(self.uids[2].clone())),
            Tag::SopInstanceUid => Some(Value::Str(self.uids[3].clone())),
            Tag::PatientName => self.patient_name.clone().map(Value::Str),
            Tag::StudyDescription => self.study_description.clone().map(Value::Str),
            Tag::StudyDate => self.study_date.clone().map(Value::Str),
            Tag::SeriesDescription => self.series_description.clone().map(Value::Str),
            Tag::SeriesNumber => self.series_number.map(Value::Int),
            Tag::InstanceNumber => self.instance_number.map(Value::Int),
            Tag::SopClassUid => self.sop_class_uid.clone().map(Value::Str),
            _ => None,
        }
    }
}

/// The in-memory tabular index over a database folder.
///
/// Mutations are atomic with respect to a single caller; there is no
/// concurrent-writer support. The register also tracks identifiers and
/// paths handed out during the session so that `new_uid`/`new_file`
/// never collide with staged allocations.
#[derive(Debug, Default)]
pub struct Register {
    rows: Vec<RegisterRow>,
    index: HashMap<String, usize>,
    issued_uids: HashSet<String>,
    issued_paths: HashSet<String>,
}

impl Register {
    /// Creates an empty register.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a register by scanning all files under `root`.
    ///
    /// Files that fail to decode (foreign files, corrupt files, files
    /// without a complete hierarchy tuple) are dropped with a logged
    /// warning; the scan never aborts on a bad file. The volume cache
    /// folder is skipped entirely.
    pub fn scan(root: &Path) -> DbResult<Self> {
        let mut files = Vec::new();
        collect_files(root, root, &mut files)?;
        files.sort();

        let mut register = Self::new();
        for rel in files {
            match read_object(&root.join(&rel)) {
                Ok(object) => {
                    if let Some(row) = RegisterRow::from_object(rel.clone(), &object) {
                        register.push_row(row);
                    } else {
                        warn!(path = %rel, "instance lacks hierarchy identifiers, skipping");
                    }
                }
                Err(err) => {
                    warn!(path = %rel, error = %err, "failed to decode file, skipping");
                }
            }
        }
        debug!(rows = register.len(), root = %root.display(), "database scan complete");
        Ok(register)
    }

    /// Number of rows, including staged ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the register has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rows in insertion order, including staged ones.
    #[must_use]
    pub fn rows(&self) -> &[RegisterRow] {
        &self.rows
    }

    /// Looks up a row by its relative path.
    #[must_use]
    pub fn row(&self, path: &str) -> Option<&RegisterRow> {
        self.index.get(path).map(|&i| &self.rows[i])
    }

    /// Rows whose hierarchy tuple starts with `prefix`, excluding rows
    /// staged for removal, in insertion order.
    pub fn active_rows<'a>(
        &'a self,
        prefix: &'a [String],
    ) -> impl Iterator<Item = &'a RegisterRow> {
        self.rows
            .iter()
            .filter(move |row| !row.removed && row.matches_prefix(prefix))
    }

    /// Active rows matching `prefix` and satisfying `filter`.
    ///
    /// Predicates evaluate against cached columns where possible; other
    /// tags are read freshly from the file. A row whose file fails to
    /// decode during a fresh read is excluded with a logged warning.
    #[must_use]
    pub fn filter<'a>(
        &'a self,
        prefix: &'a [String],
        filter: &Filter,
        root: &Path,
    ) -> Vec<&'a RegisterRow> {
        self.active_rows(prefix)
            .filter(|row| {
                if filter.is_empty() {
                    return true;
                }
                let mut decoded: Option<Option<DataObject>> = None;
                let mut lookup = |tag: Tag| -> Option<Value> {
                    if RegisterRow::is_cached(tag) {
                        return row.cached_value(tag);
                    }
                    let object = decoded.get_or_insert_with(|| {
                        read_object(&root.join(&row.path))
                            .map_err(|err| {
                                warn!(path = %row.path, error = %err, "failed to read attributes for filter");
                                err
                            })
                            .ok()
                    });
                    object.as_ref().and_then(|o| o.get(tag).cloned())
                };
                filter.matches_with(&mut lookup)
            })
            .collect()
    }

    /// Distinct truncated hierarchy tuples of length `depth` among the
    /// active rows matching `prefix`, in order of first appearance.
    #[must_use]
    pub fn distinct_tuples(&self, prefix: &[String], depth: usize) -> Vec<Vec<String>> {
        let mut seen: HashSet<Vec<String>> = HashSet::new();
        let mut tuples = Vec::new();
        for row in self.active_rows(prefix) {
            let tuple: Vec<String> = row.uids[..depth].to_vec();
            if seen.insert(tuple.clone()) {
                tuples.push(tuple);
            }
        }
        tuples
    }

    /// Generates one fresh identifier, unique against every identifier
    /// in the register and every identifier issued this session.
    pub fn new_uid(&mut self) -> String {
        loop {
            let uid = new_uid();
            if self.issued_uids.contains(&uid) {
                continue;
            }
            if self.rows.iter().any(|row| row.uids.contains(&uid)) {
                continue;
            }
            self.issued_uids.insert(uid.clone());
            return uid;
        }
    }

    /// Generates `n` fresh identifiers.
    pub fn new_uids(&mut self, n: usize) -> Vec<String> {
        (0..n).map(|_| self.new_uid()).collect()
    }

    /// Allocates a fresh relative path that collides with no existing
    /// or staged path.
    pub fn new_file(&mut self) -> String {
        loop {
            let path = format!("{DATA_DIR}/{}.{DATA_EXT}", Uuid::new_v4().simple());
            if self.index.contains_key(&path) || self.issued_paths.contains(&path) {
                continue;
            }
            self.issued_paths.insert(path.clone());
            return path;
        }
    }

    /// Appends rows, upserting on path.
    ///
    /// An incoming row whose path is already present replaces that row
    /// in place, keeping its position; paths stay unique.
    pub fn add_rows(&mut self, rows: Vec<RegisterRow>) {
        for row in rows {
            debug_assert!(
                !(row.created && row.removed),
                "a row cannot be both created and removed"
            );
            match self.index.get(&row.path) {
                Some(&i) => self.rows[i] = row,
                None => self.push_row(row),
            }
        }
    }

    /// Removes the rows with the given paths.
    pub fn drop_rows(&mut self, paths: &[String]) {
        if paths.is_empty() {
            return;
        }
        let drop: HashSet<&String> = paths.iter().collect();
        self.rows.retain(|row| !drop.contains(&row.path));
        self.reindex();
    }

    /// Stages the given paths for removal.
    pub fn mark_removed(&mut self, paths: &[String]) {
        for path in paths {
            if let Some(&i) = self.index.get(path) {
                debug_assert!(!self.rows[i].created, "created rows are dropped, not staged");
                self.rows[i].removed = true;
            }
        }
    }

    /// Clears the removed flag on the given paths.
    pub fn clear_removed(&mut self, paths: &[String]) {
        for path in paths {
            if let Some(&i) = self.index.get(path) {
                self.rows[i].removed = false;
            }
        }
    }

    /// Clears the created flag on the given paths, promoting the rows
    /// to committed.
    pub fn clear_created(&mut self, paths: &[String]) {
        for path in paths {
            if let Some(&i) = self.index.get(path) {
                self.rows[i].created = false;
            }
        }
    }

    /// Returns the staged paths in scope: `(created, removed)` for all
    /// rows whose tuple starts with `prefix`.
    #[must_use]
    pub fn staged(&self, prefix: &[String]) -> (Vec<String>, Vec<String>) {
        let mut created = Vec::new();
        let mut removed = Vec::new();
        for row in self.rows.iter().filter(|r| r.matches_prefix(prefix)) {
            if row.created {
                created.push(row.path.clone());
            }
            if row.removed {
                removed.push(row.path.clone());
            }
        }
        (created, removed)
    }

    fn push_row(&mut self, row: RegisterRow) {
        debug_assert!(!self.index.contains_key(&row.path), "duplicate path");
        self.index.insert(row.path.clone(), self.rows.len());
        self.rows.push(row);
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (i, row) in self.rows.iter().enumerate() {
            self.index.insert(row.path.clone(), i);
        }
    }
}

/// Recursively collects relative file paths under `dir`, skipping the
/// volume cache folder.
fn collect_files(root: &Path, dir: &Path, files: &mut Vec<String>) -> std::io::Result<()> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            if entry.file_name() == crate::cache::CACHE_DIR {
                continue;
            }
            collect_files(root, &path, files)?;
        } else {
            let rel: PathBuf = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
            files.push(rel.to_string_lossy().into_owned());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicomdb_codec::write_object;
    use tempfile::tempdir;

    fn object(uids: [&str; 4], desc: &str) -> DataObject {
        let mut obj = DataObject::new();
        obj.set_uid_tuple(&uids.map(String::from));
        obj.set(Tag::StudyDescription, desc);
        obj
    }

    fn row(path: &str, uids: [&str; 4]) -> RegisterRow {
        RegisterRow::from_object(path.to_string(), &object(uids, "MRI")).unwrap()
    }

    #[test]
    fn from_object_requires_hierarchy() {
        let mut obj = DataObject::new();
        obj.set(Tag::PatientId, "p");
        assert!(RegisterRow::from_object("f".into(), &obj).is_none());
        assert!(RegisterRow::from_object("f".into(), &object(["p", "s", "se", "i"], "x")).is_some());
    }

    #[test]
    fn prefix_matching() {
        let r = row("a", ["p", "st", "se", "i"]);
        assert!(r.matches_prefix(&[]));
        assert!(r.matches_prefix(&["p".into()]));
        assert!(r.matches_prefix(&["p".into(), "st".into()]));
        assert!(!r.matches_prefix(&["q".into()]));
    }

    #[test]
    fn add_rows_upserts_on_path() {
        let mut reg = Register::new();
        reg.add_rows(vec![row("a", ["p", "st", "se", "i1"])]);
        reg.add_rows(vec![row("b", ["p", "st", "se", "i2"])]);
        assert_eq!(reg.len(), 2);

        let mut replacement = row("a", ["p", "st", "se", "i3"]);
        replacement.created = true;
        reg.add_rows(vec![replacement]);
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.row("a").unwrap().uids[3], "i3");
        // position preserved
        assert_eq!(reg.rows()[0].path, "a");
    }

    #[test]
    fn drop_rows_reindexes() {
        let mut reg = Register::new();
        reg.add_rows(vec![
            row("a", ["p", "st", "se", "i1"]),
            row("b", ["p", "st", "se", "i2"]),
            row("c", ["p", "st", "se", "i3"]),
        ]);
        reg.drop_rows(&["b".to_string()]);
        assert_eq!(reg.len(), 2);
        assert!(reg.row("b").is_none());
        assert_eq!(reg.row("c").unwrap().uids[3], "i3");
    }

    #[test]
    fn active_rows_exclude_removed() {
        let mut reg = Register::new();
        reg.add_rows(vec![
            row("a", ["p", "st", "se", "i1"]),
            row("b", ["p", "st", "se", "i2"]),
        ]);
        reg.mark_removed(&["a".to_string()]);
        let active: Vec<_> = reg.active_rows(&[]).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].path, "b");

        reg.clear_removed(&["a".to_string()]);
        assert_eq!(reg.active_rows(&[]).count(), 2);
    }

    #[test]
    fn distinct_tuples_first_seen_order() {
        let mut reg = Register::new();
        reg.add_rows(vec![
            row("a", ["p2", "st2", "se2", "i1"]),
            row("b", ["p1", "st1", "se1", "i2"]),
            row("c", ["p2", "st3", "se3", "i3"]),
        ]);
        let patients = reg.distinct_tuples(&[], 1);
        assert_eq!(patients, vec![vec!["p2".to_string()], vec!["p1".to_string()]]);

        let studies = reg.distinct_tuples(&["p2".to_string()], 2);
        assert_eq!(studies.len(), 2);
        assert_eq!(studies[0], vec!["p2".to_string(), "st2".to_string()]);
    }

    #[test]
    fn new_uid_never_repeats() {
        let mut reg = Register::new();
        let uids = reg.new_uids(100);
        let set: HashSet<_> = uids.iter().collect();
        assert_eq!(set.len(), 100);
    }

    #[test]
    fn new_file_never_repeats() {
        let mut reg = Register::new();
        let a = reg.new_file();
        let b = reg.new_file();
        assert_ne!(a, b);
        assert!(a.starts_with("dcm/"));
    }

    #[test]
    fn staged_reports_scoped_flags() {
        let mut reg = Register::new();
        let mut created = row("a", ["p", "st", "se", "i1"]);
        created.created = true;
        reg.add_rows(vec![created, row("b", ["p", "st", "se", "i2"])]);
        reg.mark_removed(&["b".to_string()]);

        let (c, r) = reg.staged(&["p".to_string()]);
        assert_eq!(c, vec!["a".to_string()]);
        assert_eq!(r, vec!["b".to_string()]);

        let (c, r) = reg.staged(&["other".to_string()]);
        assert!(c.is_empty());
        assert!(r.is_empty());
    }

    #[test]
    fn filter_on_cached_column() {
        let mut reg = Register::new();
        reg.add_rows(vec![
            RegisterRow::from_object("a".into(), &object(["p", "st1", "se1", "i1"], "MRI"))
                .unwrap(),
            RegisterRow::from_object("b".into(), &object(["p", "st2", "se2", "i2"], "Xray"))
                .unwrap(),
        ]);
        let filter = Filter::new().eq(Tag::StudyDescription, "MRI");
        let rows = reg.filter(&[], &filter, Path::new("/nonexistent"));
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].path, "a");
    }

    #[test]
    fn filter_reads_uncached_tags_from_file() {
        let dir = tempdir().unwrap();
        let mut obj = object(["p", "st", "se", "i"], "MRI");
        obj.set(Tag::Modality, "MR");
        write_object(&dir.path().join("a.dcdb"), &obj).unwrap();

        let reg = Register::scan(dir.path()).unwrap();
        let hit = reg.filter(&[], &Filter::new().eq(Tag::Modality, "MR"), dir.path());
        assert_eq!(hit.len(), 1);
        let miss = reg.filter(&[], &Filter::new().eq(Tag::Modality, "CT"), dir.path());
        assert!(miss.is_empty());
    }

    #[test]
    fn scan_drops_undecodable_files() {
        let dir = tempdir().unwrap();
        write_object(
            &dir.path().join("good.dcdb"),
            &object(["p", "st", "se", "i"], "MRI"),
        )
        .unwrap();
        std::fs::write(dir.path().join("junk.txt"), b"not a dicomdb file").unwrap();

        let reg = Register::scan(dir.path()).unwrap();
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.rows()[0].path, "good.dcdb");
    }

    #[test]
    fn scan_skips_cache_folder() {
        let dir = tempdir().unwrap();
        write_object(
            &dir.path().join("good.dcdb"),
            &object(["p", "st", "se", "i"], "MRI"),
        )
        .unwrap();
        let cache = dir.path().join(crate::cache::CACHE_DIR);
        std::fs::create_dir_all(&cache).unwrap();
        std::fs::write(cache.join("se.vol"), b"cached").unwrap();

        let reg = Register::scan(dir.path()).unwrap();
        assert_eq!(reg.len(), 1);
    }
}
