//! The navigable record tree.
//!
//! A [`Record`] is an addressable entity at one of the five hierarchy
//! generations, identified by a UID tuple of matching length. Records
//! are stateless views: children, parents and siblings are recomputed
//! from the shared register on every query, so a record handle never
//! goes stale after a copy, move or delete. The only state a record
//! owns is its identity and a pending-attribute map stamped onto files
//! when data is written through it.

use crate::cache;
use crate::database::Session;
use crate::dataset::{DataSet, Volume};
use crate::error::{DbError, DbResult};
use crate::filter::Filter;
use crate::register::RegisterRow;
use crate::status::{NullStatus, StatusCallback};
use crate::types::Generation;
use dicomdb_codec::{read_object, write_object, DataObject, PixelData, Tag, Value, HIERARCHY};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// An addressable entity in the Database → Patient → Study → Series →
/// Instance hierarchy.
///
/// Records hold a shared handle to the session state, never a private
/// copy of any rows, so mutation through one handle is immediately
/// visible through every other.
#[derive(Clone)]
pub struct Record {
    generation: Generation,
    uids: Vec<String>,
    attributes: BTreeMap<Tag, Value>,
    session: Arc<Session>,
}

impl Record {
    pub(crate) fn new(
        session: Arc<Session>,
        generation: Generation,
        uids: Vec<String>,
        attributes: BTreeMap<Tag, Value>,
    ) -> Self {
        debug_assert_eq!(generation.depth(), uids.len());
        Self {
            generation,
            uids,
            attributes,
            session,
        }
    }

    /// The generation of this record.
    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// The UID tuple identifying this record.
    #[must_use]
    pub fn uids(&self) -> &[String] {
        &self.uids
    }

    /// The record's own identifier: the last component of its tuple.
    #[must_use]
    pub fn uid(&self) -> Option<&str> {
        self.uids.last().map(String::as_str)
    }

    /// The pending attributes stamped onto data written through this
    /// record.
    #[must_use]
    pub fn attributes(&self) -> &BTreeMap<Tag, Value> {
        &self.attributes
    }

    /// Adds a pending attribute.
    ///
    /// # Errors
    ///
    /// Hierarchy identifiers cannot be set as attributes; they are
    /// owned by the record's identity.
    pub fn set_attribute(&mut self, tag: Tag, value: impl Into<Value>) -> DbResult<()> {
        if tag.is_hierarchy() {
            return Err(DbError::invalid_operation(
                "hierarchy identifiers cannot be set as attributes",
            ));
        }
        self.attributes.insert(tag, value.into());
        Ok(())
    }

    fn ensure_open(&self) -> DbResult<()> {
        self.session.ensure_open()
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Records at the given generation related to this one.
    ///
    /// Below this record's generation, lists all matching descendants
    /// in order of first appearance in the register; above it, returns
    /// the unique ancestor; at it, returns this record itself.
    pub fn records(&self, generation: Generation, filter: &Filter) -> DbResult<Vec<Record>> {
        self.ensure_open()?;
        let target = generation.depth();
        let own = self.generation.depth();

        if target < own {
            return Ok(vec![Record::new(
                self.session.clone(),
                generation,
                self.uids[..target].to_vec(),
                BTreeMap::new(),
            )]);
        }
        if target == own {
            return Ok(vec![self.clone()]);
        }

        let register = self.session.register.read();
        let rows = register.filter(&self.uids, filter, &self.session.root);
        let mut seen: HashSet<Vec<String>> = HashSet::new();
        let mut out = Vec::new();
        for row in rows {
            let tuple: Vec<String> = row.uids[..target].to_vec();
            if seen.insert(tuple.clone()) {
                out.push(Record::new(
                    self.session.clone(),
                    generation,
                    tuple,
                    BTreeMap::new(),
                ));
            }
        }
        Ok(out)
    }

    /// Children of this record, one generation down.
    ///
    /// An instance record has no children and yields an empty list.
    pub fn children(&self) -> DbResult<Vec<Record>> {
        self.children_where(&Filter::new())
    }

    /// Children satisfying a filter.
    pub fn children_where(&self, filter: &Filter) -> DbResult<Vec<Record>> {
        match self.generation.child() {
            None => Ok(Vec::new()),
            Some(generation) => self.records(generation, filter),
        }
    }

    /// All instances below (or at) this record.
    pub fn instances(&self) -> DbResult<Vec<Record>> {
        self.instances_where(&Filter::new())
    }

    /// Instances satisfying a filter.
    ///
    /// For an instance-level record this returns the record itself, or
    /// an empty list if its row is gone.
    pub fn instances_where(&self, filter: &Filter) -> DbResult<Vec<Record>> {
        if self.generation == Generation::Instance {
            self.ensure_open()?;
            let register = self.session.register.read();
            let exists = !register
                .filter(&self.uids, filter, &self.session.root)
                .is_empty();
            return Ok(if exists { vec![self.clone()] } else { Vec::new() });
        }
        self.records(Generation::Instance, filter)
    }

    /// Patient records related to this one.
    pub fn patients(&self) -> DbResult<Vec<Record>> {
        self.records(Generation::Patient, &Filter::new())
    }

    /// Patient records satisfying a filter.
    pub fn patients_where(&self, filter: &Filter) -> DbResult<Vec<Record>> {
        self.records(Generation::Patient, filter)
    }

    /// Study records related to this one.
    pub fn studies(&self) -> DbResult<Vec<Record>> {
        self.records(Generation::Study, &Filter::new())
    }

    /// Study records satisfying a filter.
    pub fn studies_where(&self, filter: &Filter) -> DbResult<Vec<Record>> {
        self.records(Generation::Study, filter)
    }

    /// Series records related to this one.
    pub fn series_list(&self) -> DbResult<Vec<Record>> {
        self.records(Generation::Series, &Filter::new())
    }

    /// Series records satisfying a filter.
    pub fn series_where(&self, filter: &Filter) -> DbResult<Vec<Record>> {
        self.records(Generation::Series, filter)
    }

    /// The unique ancestor one generation up.
    ///
    /// Computed from the UID tuple, never stored, so it cannot dangle
    /// after a move.
    ///
    /// # Errors
    ///
    /// The database root has no parent.
    pub fn parent(&self) -> DbResult<Record> {
        match self.generation.parent() {
            None => Err(DbError::invalid_hierarchy(
                "the database root has no parent",
            )),
            Some(generation) => Ok(Record::new(
                self.session.clone(),
                generation,
                self.uids[..generation.depth()].to_vec(),
                BTreeMap::new(),
            )),
        }
    }

    /// A human-readable label for this record.
    #[must_use]
    pub fn label(&self) -> String {
        let register = self.session.register.read();
        let row = register.active_rows(&self.uids).next().cloned();
        drop(register);

        let cached = |tag: Tag| -> Option<String> {
            row.as_ref()
                .and_then(|r| r.cached_value(tag))
                .map(|v| v.to_string())
                .or_else(|| self.attributes.get(&tag).map(Value::to_string))
        };

        match self.generation {
            Generation::Database => format!("Database {}", self.session.root.display()),
            Generation::Patient => {
                let name = cached(Tag::PatientName)
                    .unwrap_or_else(|| self.uids[0].clone());
                format!("Patient {name}")
            }
            Generation::Study => {
                let desc = cached(Tag::StudyDescription)
                    .unwrap_or_else(|| "New Study".to_string());
                match cached(Tag::StudyDate) {
                    Some(date) => format!("Study {desc} [{date}]"),
                    None => format!("Study {desc}"),
                }
            }
            Generation::Series => {
                let desc = cached(Tag::SeriesDescription)
                    .unwrap_or_else(|| "New Series".to_string());
                match cached(Tag::SeriesNumber) {
                    Some(number) => format!("Series {number:0>3} [{desc}]"),
                    None => format!("Series [{desc}]"),
                }
            }
            Generation::Instance => {
                let number = cached(Tag::InstanceNumber).unwrap_or_default();
                format!("Instance {number:0>6}")
            }
        }
    }

    // ------------------------------------------------------------------
    // Reading and writing datasets
    // ------------------------------------------------------------------

    /// Decodes the underlying files into a transient [`DataSet`].
    ///
    /// Reads are not cached beyond the call. Instances that fail to
    /// decode are skipped with a logged warning.
    pub fn read(&self) -> DbResult<DataSet> {
        self.read_with(&NullStatus)
    }

    /// [`Record::read`] with progress reporting.
    pub fn read_with(&self, status: &dyn StatusCallback) -> DbResult<DataSet> {
        self.ensure_open()?;
        let paths = self.instance_paths();
        let total = paths.len();
        let mut objects = Vec::with_capacity(total);
        for (i, path) in paths.iter().enumerate() {
            status.progress(i, total, "Reading data..");
            match read_object(&self.session.root.join(path)) {
                Ok(object) => objects.push(object),
                Err(err) => warn!(path = %path, error = %err, "failed to read instance, skipping"),
            }
        }
        status.done();
        Ok(DataSet::from_objects(objects))
    }

    /// Writes a dataset through this record.
    ///
    /// Every instance in the dataset gets this record's hierarchy
    /// identifiers stamped over its own (allocating fresh identifiers
    /// for any level below this record that is absent) and the pending
    /// attributes applied, is encoded to its file, and is upserted into
    /// the register, `created` for paths not seen before. Overwriting
    /// the hierarchy identifiers here is the mechanism by which copy,
    /// move and merge re-parent data.
    pub fn write(&self, dataset: &mut DataSet) -> DbResult<()> {
        self.write_with(dataset, &NullStatus)
    }

    /// [`Record::write`] with progress reporting.
    pub fn write_with(&self, dataset: &mut DataSet, status: &dyn StatusCallback) -> DbResult<()> {
        self.ensure_open()?;
        let total = dataset.len();
        let root = self.session.root.clone();
        let mut register = self.session.register.write();

        // Intermediate levels missing from the dataset are allocated
        // once per write so all its instances land in one branch.
        let mut fill: [Option<String>; 4] = Default::default();

        for (i, object) in dataset.objects_mut().iter_mut().enumerate() {
            status.progress(i, total, "Writing data..");

            for (tag, value) in &self.attributes {
                object.set(*tag, value.clone());
            }
            object.set_uid_tuple(&self.uids);
            for level in self.generation.depth()..4 {
                if object.get_str(HIERARCHY[level]).is_none() {
                    let uid = if level < 3 {
                        fill[level]
                            .get_or_insert_with(|| register.new_uid())
                            .clone()
                    } else {
                        register.new_uid()
                    };
                    object.set(HIERARCHY[level], uid);
                }
            }

            let Some(tuple) = object.uid_tuple() else {
                continue;
            };
            let tuple = tuple.to_vec();
            let existing = register
                .active_rows(&tuple)
                .next()
                .map(|r| (r.path.clone(), r.created, r.removed));
            let (path, created, removed) = match existing {
                Some(found) => found,
                None => (register.new_file(), true, false),
            };

            write_object(&root.join(&path), object)?;

            if let Some(mut row) = RegisterRow::from_object(path, object) {
                row.created = created;
                row.removed = removed;
                register.add_rows(vec![row]);
            }
        }
        status.done();
        Ok(())
    }

    /// Unique values of an attribute across this record's instances,
    /// in order of first appearance.
    ///
    /// Cached columns are answered from the register; other tags are
    /// read freshly from the files.
    pub fn values_of(&self, tag: Tag) -> DbResult<Vec<Value>> {
        self.ensure_open()?;
        if RegisterRow::is_cached(tag) {
            let register = self.session.register.read();
            let mut out: Vec<Value> = Vec::new();
            for row in register.active_rows(&self.uids) {
                if let Some(value) = row.cached_value(tag) {
                    if !out.contains(&value) {
                        out.push(value);
                    }
                }
            }
            return Ok(out);
        }
        let mut out: Vec<Value> = Vec::new();
        for path in self.instance_paths() {
            match read_object(&self.session.root.join(&path)) {
                Ok(object) => {
                    if let Some(value) = object.get(tag) {
                        if !out.contains(value) {
                            out.push(value.clone());
                        }
                    }
                }
                Err(err) => {
                    warn!(path = %path, error = %err, "failed to read attribute, skipping")
                }
            }
        }
        Ok(out)
    }

    /// Writes attribute values through to every instance of this record.
    ///
    /// With no instances yet, the values become pending attributes
    /// stamped when data is first written.
    pub fn set_values(&mut self, pairs: &[(Tag, Value)]) -> DbResult<()> {
        self.set_values_with(pairs, &NullStatus)
    }

    /// [`Record::set_values`] with progress reporting.
    pub fn set_values_with(
        &mut self,
        pairs: &[(Tag, Value)],
        status: &dyn StatusCallback,
    ) -> DbResult<()> {
        self.ensure_open()?;
        if pairs.iter().any(|(tag, _)| tag.is_hierarchy()) {
            return Err(DbError::invalid_operation(
                "hierarchy identifiers cannot be set as attributes",
            ));
        }

        let session = Arc::clone(&self.session);
        let targets: Vec<(String, [String; 4], bool, bool)> = session
            .register
            .read()
            .active_rows(&self.uids)
            .map(|r| (r.path.clone(), r.uids.clone(), r.created, r.removed))
            .collect();

        if targets.is_empty() {
            for (tag, value) in pairs {
                self.attributes.insert(*tag, value.clone());
            }
            return Ok(());
        }

        let mut register = session.register.write();
        let total = targets.len();
        let mut failed = 0usize;
        for (i, (path, uids, created, removed)) in targets.iter().enumerate() {
            status.progress(i, total, "Updating attributes..");
            let full = session.root.join(path);
            let mut object = match read_object(&full) {
                Ok(object) => object,
                // A staged instance may not have a file yet; start fresh.
                Err(dicomdb_codec::CodecError::Io(err))
                    if err.kind() == ErrorKind::NotFound && *created =>
                {
                    let mut object = DataObject::new();
                    object.set_uid_tuple(uids);
                    object
                }
                Err(err) => {
                    warn!(path = %path, error = %err, "failed to read instance, skipping");
                    failed += 1;
                    continue;
                }
            };
            for (tag, value) in pairs {
                object.set(*tag, value.clone());
            }
            if let Err(err) = write_object(&full, &object) {
                warn!(path = %path, error = %err, "failed to write instance");
                failed += 1;
                continue;
            }
            if let Some(mut row) = RegisterRow::from_object(path.clone(), &object) {
                row.created = *created;
                row.removed = *removed;
                register.add_rows(vec![row]);
            }
        }
        status.done();
        if failed > 0 {
            return Err(DbError::incomplete("set_values", failed));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Creating records
    // ------------------------------------------------------------------

    /// Creates a new child record with fresh identifiers.
    ///
    /// The child inherits this record's pending attributes, overridden
    /// by `attrs`. Creating an instance (leaf generation) also
    /// allocates a file path and stages a `created` register row; the
    /// file itself materializes when data is written.
    pub fn new_child(&self, attrs: &[(Tag, Value)]) -> DbResult<Record> {
        self.ensure_open()?;
        let child_generation = self.generation.child().ok_or_else(|| {
            DbError::invalid_hierarchy("an instance record has no children")
        })?;
        if attrs.iter().any(|(tag, _)| tag.is_hierarchy()) {
            return Err(DbError::invalid_operation(
                "hierarchy identifiers cannot be set as attributes",
            ));
        }

        let mut register = self.session.register.write();
        let uid = register.new_uid();
        let mut uids = self.uids.clone();
        uids.push(uid);

        let mut attributes = self.attributes.clone();
        for (tag, value) in attrs {
            attributes.insert(*tag, value.clone());
        }

        if child_generation == Generation::Instance {
            let path = register.new_file();
            let mut object = DataObject::new();
            for (tag, value) in &attributes {
                object.set(*tag, value.clone());
            }
            object.set_uid_tuple(&uids);
            if let Some(mut row) = RegisterRow::from_object(path, &object) {
                row.created = true;
                register.add_rows(vec![row]);
            }
        }
        drop(register);

        Ok(Record::new(
            self.session.clone(),
            child_generation,
            uids,
            attributes,
        ))
    }

    /// Creates a new sibling under the same parent.
    pub fn new_sibling(&self, attrs: &[(Tag, Value)]) -> DbResult<Record> {
        self.parent()?.new_child(attrs)
    }

    /// Creates a new sibling of the parent.
    pub fn new_pibling(&self, attrs: &[(Tag, Value)]) -> DbResult<Record> {
        self.parent()?.new_sibling(attrs)
    }

    /// Creates a new child of a new sibling of the parent.
    pub fn new_cousin(&self, attrs: &[(Tag, Value)]) -> DbResult<Record> {
        self.new_pibling(&[])?.new_child(attrs)
    }

    /// Creates a new patient record, wherever this record sits.
    pub fn new_patient(&self, attrs: &[(Tag, Value)]) -> DbResult<Record> {
        match self.generation {
            Generation::Database => self.new_child(attrs),
            Generation::Patient => self.new_sibling(attrs),
            Generation::Study => self.new_pibling(attrs),
            Generation::Series => self.parent()?.new_pibling(attrs),
            Generation::Instance => self.parent()?.parent()?.new_pibling(attrs),
        }
    }

    /// Creates a new study record, filling in missing ancestors.
    pub fn new_study(&self, attrs: &[(Tag, Value)]) -> DbResult<Record> {
        match self.generation {
            Generation::Database => self.new_child(&[])?.new_study(attrs),
            Generation::Patient => self.new_child(attrs),
            Generation::Study => self.new_sibling(attrs),
            Generation::Series => self.new_pibling(attrs),
            Generation::Instance => self.parent()?.new_pibling(attrs),
        }
    }

    /// Creates a new series record, filling in missing ancestors.
    pub fn new_series(&self, attrs: &[(Tag, Value)]) -> DbResult<Record> {
        match self.generation {
            Generation::Database | Generation::Patient => {
                self.new_child(&[])?.new_series(attrs)
            }
            Generation::Study => self.new_child(attrs),
            Generation::Series => self.new_sibling(attrs),
            Generation::Instance => self.new_pibling(attrs),
        }
    }

    // ------------------------------------------------------------------
    // Copy, move, merge
    // ------------------------------------------------------------------

    /// Copies this record under an ancestor-generation record.
    ///
    /// The copy gets a fresh identity padded down from the ancestor's
    /// tuple; every hierarchy level from this record's generation down
    /// to series is re-keyed per distinct source value, and every
    /// instance gets a fresh identifier and file. New rows are staged
    /// `created`.
    pub fn copy_to(&self, ancestor: &Record) -> DbResult<Record> {
        self.copy_to_with(ancestor, &NullStatus)
    }

    /// [`Record::copy_to`] with progress reporting.
    pub fn copy_to_with(
        &self,
        ancestor: &Record,
        status: &dyn StatusCallback,
    ) -> DbResult<Record> {
        self.ensure_open()?;
        if self.generation == Generation::Database {
            return Err(DbError::invalid_hierarchy("cannot copy the database root"));
        }
        if ancestor.generation.depth() >= self.generation.depth() {
            return Err(DbError::invalid_hierarchy(format!(
                "copy target for a {} must be an ancestor generation",
                self.generation
            )));
        }

        let mut target_uids = ancestor.uids.clone();
        {
            let mut register = self.session.register.write();
            while target_uids.len() < self.generation.depth() {
                target_uids.push(register.new_uid());
            }
        }
        let target = Record::new(
            self.session.clone(),
            self.generation,
            target_uids,
            BTreeMap::new(),
        );
        self.merge_rows_into(&target, status)
    }

    /// Copies this record in place, under its own parent.
    pub fn copy(&self) -> DbResult<Record> {
        self.copy_to(&self.parent()?)
    }

    /// Moves this record under an ancestor: copy, then stage-remove the
    /// source. Nothing is deleted from disk until `save()`.
    pub fn move_to(&self, ancestor: &Record) -> DbResult<Record> {
        self.move_to_with(ancestor, &NullStatus)
    }

    /// [`Record::move_to`] with progress reporting.
    pub fn move_to_with(
        &self,
        ancestor: &Record,
        status: &dyn StatusCallback,
    ) -> DbResult<Record> {
        let copy = self.copy_to_with(ancestor, status)?;
        self.remove()?;
        Ok(copy)
    }

    /// Merges this record's instances into an existing record of the
    /// same generation, folding the target's pending attributes onto
    /// every copied instance.
    pub fn merge_with(&self, target: &Record) -> DbResult<Record> {
        self.merge_with_status(target, &NullStatus)
    }

    /// [`Record::merge_with`] with progress reporting.
    pub fn merge_with_status(
        &self,
        target: &Record,
        status: &dyn StatusCallback,
    ) -> DbResult<Record> {
        self.ensure_open()?;
        if self.generation == Generation::Database {
            return Err(DbError::invalid_hierarchy("cannot merge the database root"));
        }
        if target.generation != self.generation {
            return Err(DbError::invalid_hierarchy(format!(
                "merge target must be a {}, got a {}",
                self.generation, target.generation
            )));
        }
        self.merge_rows_into(target, status)
    }

    /// The shared re-keying engine behind copy and merge.
    fn merge_rows_into(&self, target: &Record, status: &dyn StatusCallback) -> DbResult<Record> {
        let depth = self.generation.depth();
        let root = self.session.root.clone();
        let mut register = self.session.register.write();

        let source: Vec<(String, [String; 4])> = register
            .active_rows(&self.uids)
            .map(|r| (r.path.clone(), r.uids.clone()))
            .collect();
        let total = source.len();

        // One fresh identifier per distinct source value at every level
        // between this record's generation and the series level. Levels
        // above come from the target identity; instance identifiers are
        // always fresh.
        let mut rekey: [HashMap<String, String>; 4] = Default::default();
        for level in depth..3 {
            for (_, uids) in &source {
                if !rekey[level].contains_key(&uids[level]) {
                    let fresh = register.new_uid();
                    rekey[level].insert(uids[level].clone(), fresh);
                }
            }
        }

        let mut failed = 0usize;
        let mut touched_series: Vec<String> = Vec::new();
        for (i, (path, uids)) in source.iter().enumerate() {
            status.progress(i, total, "Copying..");

            let mut new_uids = uids.clone();
            for level in depth..3 {
                if let Some(fresh) = rekey[level].get(&uids[level]) {
                    new_uids[level] = fresh.clone();
                }
            }
            if depth < 4 {
                new_uids[3] = register.new_uid();
            }
            new_uids[..depth].clone_from_slice(&target.uids[..depth]);

            let mut object = match read_object(&root.join(path)) {
                Ok(object) => object,
                Err(err) => {
                    warn!(path = %path, error = %err, "failed to read source instance");
                    failed += 1;
                    continue;
                }
            };
            for (tag, value) in &target.attributes {
                object.set(*tag, value.clone());
            }
            object.set_uid_tuple(&new_uids);

            let new_path = register.new_file();
            if let Err(err) = write_object(&root.join(&new_path), &object) {
                warn!(path = %new_path, error = %err, "failed to write copied instance");
                failed += 1;
                continue;
            }
            if let Some(mut row) = RegisterRow::from_object(new_path, &object) {
                row.created = true;
                if !touched_series.contains(&row.uids[2]) {
                    touched_series.push(row.uids[2].clone());
                }
                register.add_rows(vec![row]);
            }
        }
        drop(register);

        for uid in &touched_series {
            cache::invalidate(&root, uid);
        }
        status.done();
        if failed > 0 {
            return Err(DbError::incomplete("copy", failed));
        }
        Ok(target.clone())
    }

    // ------------------------------------------------------------------
    // Staging and commit
    // ------------------------------------------------------------------

    /// Stages this record's rows for deletion.
    ///
    /// Committed rows get `removed = true` and their files stay on disk
    /// until `save()`. Rows still flagged `created` were never saved:
    /// they are dropped immediately and their files deleted.
    pub fn remove(&self) -> DbResult<()> {
        self.ensure_open()?;
        let root = self.session.root.clone();
        let mut register = self.session.register.write();

        let mut committed = Vec::new();
        let mut created = Vec::new();
        for row in register.rows().iter().filter(|r| r.matches_prefix(&self.uids)) {
            if row.created {
                created.push(row.path.clone());
            } else if !row.removed {
                committed.push(row.path.clone());
            }
        }

        let mut dropped = Vec::new();
        let mut failed = 0usize;
        for path in &created {
            match fs::remove_file(root.join(path)) {
                Ok(()) => dropped.push(path.clone()),
                Err(err) if err.kind() == ErrorKind::NotFound => dropped.push(path.clone()),
                Err(err) => {
                    warn!(path = %path, error = %err, "failed to delete staged file");
                    failed += 1;
                }
            }
        }
        register.drop_rows(&dropped);
        register.mark_removed(&committed);
        drop(register);

        if failed > 0 {
            return Err(DbError::incomplete("remove", failed));
        }
        Ok(())
    }

    /// Commits staged changes in this record's scope.
    ///
    /// Deletes every file flagged `removed` and drops those rows;
    /// promotes every `created` row to committed. Irreversible. A file
    /// that fails to delete keeps its row in the prior staged state;
    /// the failure count is reported once at the end.
    pub fn save(&self) -> DbResult<()> {
        self.save_with(&NullStatus)
    }

    /// [`Record::save`] with progress reporting.
    pub fn save_with(&self, status: &dyn StatusCallback) -> DbResult<()> {
        self.ensure_open()?;
        let root = self.session.root.clone();
        let mut register = self.session.register.write();
        let (created, removed) = register.staged(&self.uids);

        let total = removed.len();
        let mut dropped = Vec::new();
        let mut failed = 0usize;
        for (i, path) in removed.iter().enumerate() {
            status.progress(i, total, "Deleting removed files..");
            match fs::remove_file(root.join(path)) {
                Ok(()) => dropped.push(path.clone()),
                Err(err) if err.kind() == ErrorKind::NotFound => dropped.push(path.clone()),
                Err(err) => {
                    warn!(path = %path, error = %err, "failed to delete file, keeping staged");
                    failed += 1;
                }
            }
        }
        let touched = series_of(&register, &dropped);
        register.drop_rows(&dropped);
        register.clear_created(&created);
        drop(register);

        for uid in &touched {
            cache::invalidate(&root, uid);
        }
        status.done();
        if failed > 0 {
            return Err(DbError::incomplete("save", failed));
        }
        Ok(())
    }

    /// Rolls staged changes in this record's scope back to the last
    /// saved state: deletes files flagged `created` and drops those
    /// rows, and clears the `removed` flag everywhere else.
    pub fn restore(&self) -> DbResult<()> {
        self.restore_with(&NullStatus)
    }

    /// [`Record::restore`] with progress reporting.
    pub fn restore_with(&self, status: &dyn StatusCallback) -> DbResult<()> {
        self.ensure_open()?;
        let root = self.session.root.clone();
        let mut register = self.session.register.write();
        let (created, removed) = register.staged(&self.uids);

        let total = created.len();
        let mut dropped = Vec::new();
        let mut failed = 0usize;
        for (i, path) in created.iter().enumerate() {
            status.progress(i, total, "Deleting new files..");
            match fs::remove_file(root.join(path)) {
                Ok(()) => dropped.push(path.clone()),
                Err(err) if err.kind() == ErrorKind::NotFound => dropped.push(path.clone()),
                Err(err) => {
                    warn!(path = %path, error = %err, "failed to delete file, keeping staged");
                    failed += 1;
                }
            }
        }
        let touched = series_of(&register, &dropped);
        register.drop_rows(&dropped);
        register.clear_removed(&removed);
        drop(register);

        for uid in &touched {
            cache::invalidate(&root, uid);
        }
        status.done();
        if failed > 0 {
            return Err(DbError::incomplete("restore", failed));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Pixel data
    // ------------------------------------------------------------------

    /// Reads this record's instances into a pixel volume, slices
    /// ordered by instance number.
    ///
    /// With `pixels_first` the result has shape `(rows, cols, slices)`
    /// instead of `(slices, rows, cols)`. For a series with the volume
    /// cache enabled, a cached volume is used when present and written
    /// back otherwise.
    pub fn pixel_array(&self, pixels_first: bool) -> DbResult<Volume> {
        self.pixel_array_with(pixels_first, &NullStatus)
    }

    /// [`Record::pixel_array`] with progress reporting.
    pub fn pixel_array_with(
        &self,
        pixels_first: bool,
        status: &dyn StatusCallback,
    ) -> DbResult<Volume> {
        self.ensure_open()?;
        let use_cache =
            self.generation == Generation::Series && self.session.config.volume_cache;
        if use_cache {
            if let Some(volume) = cache::load_volume(&self.session.root, &self.uids[2]) {
                return Ok(if pixels_first {
                    volume.to_pixels_first()
                } else {
                    volume
                });
            }
        }

        let register = self.session.register.read();
        let mut rows: Vec<(i64, String)> = register
            .active_rows(&self.uids)
            .map(|r| (r.instance_number.unwrap_or(i64::MAX), r.path.clone()))
            .collect();
        drop(register);
        rows.sort_by_key(|(number, _)| *number);

        let total = rows.len();
        let mut slices: Vec<Vec<f32>> = Vec::new();
        let mut grid: Option<(u32, u32)> = None;
        for (i, (_, path)) in rows.iter().enumerate() {
            status.progress(i, total, "Reading pixel data..");
            let object = match read_object(&self.session.root.join(path)) {
                Ok(object) => object,
                Err(err) => {
                    warn!(path = %path, error = %err, "failed to read instance, skipping");
                    continue;
                }
            };
            let Some(pixel) = object.pixel_data() else {
                warn!(path = %path, "instance has no pixel data, skipping");
                continue;
            };
            match grid {
                None => grid = Some((pixel.rows, pixel.cols)),
                Some((r, c)) if (r, c) != (pixel.rows, pixel.cols) => {
                    return Err(DbError::ShapeMismatch {
                        expected: r as usize * c as usize,
                        actual: pixel.len(),
                    });
                }
                Some(_) => {}
            }
            slices.push(pixel.values.clone());
        }
        status.done();

        let (r, c) = grid.unwrap_or((0, 0));
        let count = slices.len();
        let volume = Volume::from_values((count, r as usize, c as usize), slices.concat())?;
        if use_cache {
            if let Err(err) = cache::save_volume(&self.session.root, &self.uids[2], &volume) {
                warn!(error = %err, "failed to write volume cache");
            }
        }
        Ok(if pixels_first {
            volume.to_pixels_first()
        } else {
            volume
        })
    }

    /// Replaces this series' pixel content with a volume.
    ///
    /// On a non-series record a fresh series is created first and
    /// returned. Slice `i` becomes instance number `i + 1`; header
    /// attributes are taken from the current instances in order (or the
    /// supplied headers), with fresh instance identities. The previous
    /// content is staged out through the normal removal protocol.
    pub fn set_pixel_array(&self, volume: &Volume, pixels_first: bool) -> DbResult<Record> {
        self.set_pixel_array_with(volume, None, pixels_first, &NullStatus)
    }

    /// [`Record::set_pixel_array`] with explicit headers and progress.
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch`, before any file is touched, when the
    /// header dataset length disagrees with the volume's slice count.
    pub fn set_pixel_array_with(
        &self,
        volume: &Volume,
        headers: Option<&DataSet>,
        pixels_first: bool,
        status: &dyn StatusCallback,
    ) -> DbResult<Record> {
        self.ensure_open()?;
        let canonical = if pixels_first {
            volume.to_pixels_last()
        } else {
            volume.clone()
        };

        if self.generation != Generation::Series {
            let series = self.new_series(&[])?;
            return series.set_pixel_array_with(&canonical, headers, false, status);
        }

        let (slices, rows, cols) = canonical.shape();
        if let Some(headers) = headers {
            if headers.len() != slices {
                return Err(DbError::ShapeMismatch {
                    expected: slices,
                    actual: headers.len(),
                });
            }
        }

        let templates: Vec<DataObject> = match headers {
            Some(dataset) => dataset.objects().to_vec(),
            None => self.read_with(status)?.into_iter().collect(),
        };

        let mut dataset = DataSet::new();
        for i in 0..slices {
            let mut object = templates.get(i).cloned().unwrap_or_default();
            // Fresh identity per slice; the old content is staged out below.
            object.remove(Tag::SopInstanceUid);
            object.set_pixel_data(PixelData::new(
                rows as u32,
                cols as u32,
                canonical.slice(i).to_vec(),
            )?);
            object.set(Tag::InstanceNumber, i as i64 + 1);
            dataset.push(object);
        }

        self.remove()?;
        self.write_with(&mut dataset, status)?;
        cache::invalidate(&self.session.root, &self.uids[2]);
        Ok(self.clone())
    }

    // ------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------

    /// Copies this record's instance files to an external folder,
    /// leaving the database untouched. Returns the number of files
    /// copied.
    pub fn export_to(&self, target: &Path) -> DbResult<usize> {
        self.export_to_with(target, &NullStatus)
    }

    /// [`Record::export_to`] with progress reporting.
    pub fn export_to_with(&self, target: &Path, status: &dyn StatusCallback) -> DbResult<usize> {
        self.ensure_open()?;
        fs::create_dir_all(target)?;
        let paths = self.instance_paths();
        let total = paths.len();
        let mut copied = 0usize;
        let mut failed = 0usize;
        for (i, path) in paths.iter().enumerate() {
            status.progress(i, total, "Exporting..");
            let source = self.session.root.join(path);
            let Some(name) = source.file_name() else {
                failed += 1;
                continue;
            };
            match fs::copy(&source, target.join(name)) {
                Ok(_) => copied += 1,
                Err(err) => {
                    warn!(path = %path, error = %err, "failed to export instance");
                    failed += 1;
                }
            }
        }
        status.done();
        if failed > 0 {
            return Err(DbError::incomplete("export", failed));
        }
        Ok(copied)
    }

    /// Relative paths of the active instance files in this record's
    /// scope, in register order.
    fn instance_paths(&self) -> Vec<String> {
        let register = self.session.register.read();
        register
            .active_rows(&self.uids)
            .map(|r| r.path.clone())
            .collect()
    }
}

/// Distinct series identifiers among the rows with the given paths.
fn series_of(register: &crate::register::Register, paths: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for path in paths {
        if let Some(row) = register.row(path) {
            if !out.contains(&row.uids[2]) {
                out.push(row.uids[2].clone());
            }
        }
    }
    out
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.generation == other.generation && self.uids == other.uids
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("generation", &self.generation)
            .field("uids", &self.uids)
            .finish_non_exhaustive()
    }
}
