//! Database session facade.

use crate::config::Config;
use crate::error::{DbError, DbResult};
use crate::filter::Filter;
use crate::record::Record;
use crate::register::Register;
use crate::status::StatusCallback;
use crate::types::Generation;
use dicomdb_codec::{Tag, Value};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Shared session state: the root folder and the register.
///
/// The register is the single shared mutable resource of a session.
/// Every record holds an `Arc` to this state, never a private copy.
pub(crate) struct Session {
    pub(crate) root: PathBuf,
    pub(crate) config: Config,
    pub(crate) register: RwLock<Register>,
    pub(crate) open: RwLock<bool>,
}

impl Session {
    pub(crate) fn ensure_open(&self) -> DbResult<()> {
        if *self.open.read() {
            Ok(())
        } else {
            Err(DbError::DatabaseClosed)
        }
    }
}

/// An open database session.
///
/// `Database` is the primary entry point. Opening scans the folder and
/// builds the register; the session then hands out [`Record`] views
/// over it. The session is explicitly scoped: `open()` to start,
/// `close()` to end (also run on drop).
///
/// # Opening a database
///
/// ```no_run
/// use dicomdb_core::Database;
/// use std::path::Path;
///
/// let db = Database::open(Path::new("my_folder"))?;
/// for patient in db.patients()? {
///     println!("{}", patient.label());
/// }
/// db.close()?;
/// # Ok::<(), dicomdb_core::DbError>(())
/// ```
///
/// # Constraints
///
/// One logical session at a time. Two sessions (in one process or
/// two) against the same folder are unsupported and can corrupt
/// state; no locking protocol is attempted. Staging flags are held in
/// memory only, so an unsaved session that ends loses its undo
/// history, not its files.
pub struct Database {
    session: Arc<Session>,
}

impl Database {
    /// Opens a database folder with default configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` if the folder does not exist and
    /// creation is disabled, or I/O errors from the scan.
    pub fn open(path: &Path) -> DbResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens a database folder with custom configuration.
    pub fn open_with_config(path: &Path, config: Config) -> DbResult<Self> {
        if !path.exists() {
            if config.create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(DbError::invalid_format(format!(
                    "database folder does not exist: {}",
                    path.display()
                )));
            }
        }
        if !path.is_dir() {
            return Err(DbError::invalid_format(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let register = Register::scan(path)?;
        if config.error_if_exists && !register.is_empty() {
            return Err(DbError::invalid_format(
                "database already exists and error_if_exists is true",
            ));
        }

        Ok(Self {
            session: Arc::new(Session {
                root: path.to_path_buf(),
                config,
                register: RwLock::new(register),
                open: RwLock::new(true),
            }),
        })
    }

    /// The generation-0 record for this database.
    #[must_use]
    pub fn root(&self) -> Record {
        Record::new(
            self.session.clone(),
            Generation::Database,
            Vec::new(),
            BTreeMap::new(),
        )
    }

    /// A record addressed by its 0–4 element identifier tuple.
    ///
    /// Records are views: an address with no matching rows yields a
    /// record whose listings are empty.
    ///
    /// # Errors
    ///
    /// Returns `InvalidHierarchy` for tuples longer than 4.
    pub fn record_at(&self, uids: &[String]) -> DbResult<Record> {
        self.session.ensure_open()?;
        let generation = Generation::from_depth(uids.len()).ok_or_else(|| {
            DbError::invalid_hierarchy(format!(
                "a record is addressed by 0 to 4 identifiers, got {}",
                uids.len()
            ))
        })?;
        Ok(Record::new(
            self.session.clone(),
            generation,
            uids.to_vec(),
            BTreeMap::new(),
        ))
    }

    /// All patients in the database.
    pub fn patients(&self) -> DbResult<Vec<Record>> {
        self.root().patients()
    }

    /// Patients satisfying a filter.
    pub fn patients_where(&self, filter: &Filter) -> DbResult<Vec<Record>> {
        self.root().patients_where(filter)
    }

    /// All studies in the database.
    pub fn studies(&self) -> DbResult<Vec<Record>> {
        self.root().studies()
    }

    /// Studies satisfying a filter.
    pub fn studies_where(&self, filter: &Filter) -> DbResult<Vec<Record>> {
        self.root().studies_where(filter)
    }

    /// All series in the database.
    pub fn series_list(&self) -> DbResult<Vec<Record>> {
        self.root().series_list()
    }

    /// Series satisfying a filter.
    pub fn series_where(&self, filter: &Filter) -> DbResult<Vec<Record>> {
        self.root().series_where(filter)
    }

    /// Creates a new patient record.
    pub fn new_patient(&self, attrs: &[(Tag, Value)]) -> DbResult<Record> {
        self.root().new_patient(attrs)
    }

    /// Creates a new study record under a new patient.
    pub fn new_study(&self, attrs: &[(Tag, Value)]) -> DbResult<Record> {
        self.root().new_study(attrs)
    }

    /// Creates a new series record under a new patient and study.
    pub fn new_series(&self, attrs: &[(Tag, Value)]) -> DbResult<Record> {
        self.root().new_series(attrs)
    }

    /// Commits all staged changes in the database.
    pub fn save(&self) -> DbResult<()> {
        self.root().save()
    }

    /// [`Database::save`] with progress reporting.
    pub fn save_with(&self, status: &dyn StatusCallback) -> DbResult<()> {
        self.root().save_with(status)
    }

    /// Rolls all staged changes back to the last saved state.
    pub fn restore(&self) -> DbResult<()> {
        self.root().restore()
    }

    /// [`Database::restore`] with progress reporting.
    pub fn restore_with(&self, status: &dyn StatusCallback) -> DbResult<()> {
        self.root().restore_with(status)
    }

    /// Counts of entities at every generation.
    pub fn summary(&self) -> DbResult<Summary> {
        self.session.ensure_open()?;
        let register = self.session.register.read();
        Ok(Summary {
            patients: register.distinct_tuples(&[], 1).len(),
            studies: register.distinct_tuples(&[], 2).len(),
            series: register.distinct_tuples(&[], 3).len(),
            instances: register.active_rows(&[]).count(),
        })
    }

    /// Renders the database contents as an indented text tree.
    pub fn tree_text(&self) -> DbResult<String> {
        self.session.ensure_open()?;
        let mut out = String::new();
        let _ = writeln!(out, "---------- DATABASE --------------");
        let _ = writeln!(out, "Location: {}", self.session.root.display());
        for patient in self.patients()? {
            let _ = writeln!(out, "{}", patient.label());
            for study in patient.studies()? {
                let _ = writeln!(out, "    {}", study.label());
                for series in study.series_list()? {
                    let _ = writeln!(out, "        {}", series.label());
                    let count = series.instances()?.len();
                    let _ = writeln!(out, "            Nr of instances: {count}");
                }
            }
        }
        let _ = writeln!(out, "----------------------------------");
        Ok(out)
    }

    /// The database root folder.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.session.root
    }

    /// The session configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.session.config
    }

    /// Whether the session is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        *self.session.open.read()
    }

    /// Closes the session.
    ///
    /// Staged changes are neither committed nor rolled back: files
    /// already written stay on disk, and the in-memory staging flags
    /// are discarded. Call `save()` or `restore()` first to resolve
    /// them.
    pub fn close(&self) -> DbResult<()> {
        let mut open = self.session.open.write();
        *open = false;
        Ok(())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.session.root)
            .field("is_open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Entity counts at every generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    /// Number of distinct patients.
    pub patients: usize,
    /// Number of distinct studies.
    pub studies: usize,
    /// Number of distinct series.
    pub series: usize,
    /// Number of instances.
    pub instances: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{DataSet, Volume};
    use dicomdb_codec::DataObject;
    use tempfile::tempdir;

    fn create_db(dir: &Path) -> Database {
        Database::open(&dir.join("db")).unwrap()
    }

    fn three_instances() -> DataSet {
        let mut dataset = DataSet::new();
        for i in 0..3i64 {
            let mut object = DataObject::new();
            object.set(Tag::InstanceNumber, i + 1);
            dataset.push(object);
        }
        dataset
    }

    #[test]
    fn open_creates_folder() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("new_db");
        assert!(!path.exists());
        let db = Database::open(&path).unwrap();
        assert!(path.is_dir());
        assert!(db.is_open());
    }

    #[test]
    fn open_fails_if_missing_and_no_create() {
        let temp = tempdir().unwrap();
        let config = Config::new().create_if_missing(false);
        let result = Database::open_with_config(&temp.path().join("nope"), config);
        assert!(matches!(result, Err(DbError::InvalidFormat { .. })));
    }

    #[test]
    fn error_if_exists() {
        let temp = tempdir().unwrap();
        let db = create_db(temp.path());
        let series = db.new_series(&[]).unwrap();
        series.write(&mut three_instances()).unwrap();
        db.close().unwrap();

        let config = Config::new().error_if_exists(true);
        let result = Database::open_with_config(&temp.path().join("db"), config);
        assert!(matches!(result, Err(DbError::InvalidFormat { .. })));
    }

    #[test]
    fn closed_database_rejects_operations() {
        let temp = tempdir().unwrap();
        let db = create_db(temp.path());
        db.close().unwrap();
        assert!(!db.is_open());
        assert!(matches!(db.patients(), Err(DbError::DatabaseClosed)));
        assert!(matches!(db.summary(), Err(DbError::DatabaseClosed)));
    }

    #[test]
    fn summary_counts_generations() {
        let temp = tempdir().unwrap();
        let db = create_db(temp.path());
        let series = db.new_series(&[]).unwrap();
        series.write(&mut three_instances()).unwrap();

        let summary = db.summary().unwrap();
        assert_eq!(
            summary,
            Summary {
                patients: 1,
                studies: 1,
                series: 1,
                instances: 3
            }
        );
    }

    #[test]
    fn record_at_round_trips_addresses() {
        let temp = tempdir().unwrap();
        let db = create_db(temp.path());
        let series = db.new_series(&[]).unwrap();
        series.write(&mut three_instances()).unwrap();

        let record = db.record_at(series.uids()).unwrap();
        assert_eq!(record.generation(), Generation::Series);
        assert_eq!(record.instances().unwrap().len(), 3);

        let too_deep: Vec<String> = (0..5).map(|i| i.to_string()).collect();
        assert!(matches!(
            db.record_at(&too_deep),
            Err(DbError::InvalidHierarchy { .. })
        ));
    }

    #[test]
    fn rows_persist_across_sessions() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("db");
        let uids;
        {
            let db = Database::open(&path).unwrap();
            let series = db
                .new_series(&[(Tag::SeriesDescription, Value::from("T2w"))])
                .unwrap();
            series.write(&mut three_instances()).unwrap();
            uids = series.uids().to_vec();
            db.save().unwrap();
            db.close().unwrap();
        }
        {
            let db = Database::open(&path).unwrap();
            let series = db.record_at(&uids).unwrap();
            assert_eq!(series.instances().unwrap().len(), 3);
            assert_eq!(
                series.values_of(Tag::SeriesDescription).unwrap(),
                vec![Value::from("T2w")]
            );
        }
    }

    #[test]
    fn tree_text_lists_hierarchy() {
        let temp = tempdir().unwrap();
        let db = create_db(temp.path());
        let series = db
            .new_series(&[(Tag::SeriesDescription, Value::from("Localizer"))])
            .unwrap();
        series.write(&mut three_instances()).unwrap();

        let tree = db.tree_text().unwrap();
        assert!(tree.contains("DATABASE"));
        assert!(tree.contains("Localizer"));
        assert!(tree.contains("Nr of instances: 3"));
    }

    #[test]
    fn bulk_operations_report_progress() {
        use crate::status::testing::CountingStatus;
        use std::sync::atomic::Ordering;

        let temp = tempdir().unwrap();
        let db = create_db(temp.path());
        let series = db.new_series(&[]).unwrap();
        series.write(&mut three_instances()).unwrap();
        db.save().unwrap();

        series.remove().unwrap();
        let status = CountingStatus::default();
        db.save_with(&status).unwrap();
        assert_eq!(status.ticks.load(Ordering::Relaxed), 3);
        assert_eq!(status.completions.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn volume_cache_round_trip() {
        let temp = tempdir().unwrap();
        let config = Config::new().volume_cache(true);
        let db = Database::open_with_config(&temp.path().join("db"), config).unwrap();
        let series = db.new_series(&[]).unwrap();
        series
            .set_pixel_array(&Volume::zeros((2, 4, 4)), false)
            .unwrap();

        // first read builds the cache, second read hits it
        let first = series.pixel_array(false).unwrap();
        assert_eq!(first.shape(), (2, 4, 4));
        let second = series.pixel_array(false).unwrap();
        assert_eq!(second, first);
    }
}
