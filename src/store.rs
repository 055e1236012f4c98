//! Document Store
//!
//! Generic create/read/update/delete and full-scan enumeration over any
//! [`Document`] type, backed by one embedded redb database.
//!
//! ## Responsibilities
//! - Derive the key layout from the record's descriptor
//! - Run every operation inside exactly one engine transaction
//! - Assign identifiers to records saved without one
//! - Merge partial updates with stored fields
//!
//! ## Key Layout
//! ```text
//! database
//!  └─ table "User"                      (type-bucket)
//!       ├─ ("3f0c..", "ID")    -> "3f0c.."
//!       ├─ ("3f0c..", "Email") -> "admin@localhost"   (id-bucket "3f0c..")
//!       └─ ("9a12..", "ID")    -> "9a12.."
//! ```
//! Keys sort by identifier first, then field name, so the entries of one
//! record are contiguous and records enumerate in identifier order.

use std::fs;
use std::path::Path;

use redb::{
    Database, ReadOnlyTable, ReadTransaction, ReadableTable, TableDefinition, TableError,
    TableHandle, WriteTransaction,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::codec::{decode_field, encode_field};
use crate::config::Config;
use crate::document::{Changes, Document, FieldSet};
use crate::error::{Result, StoreError};

/// Entry key: (identifier, field name)
type EntryKey = (&'static str, &'static str);

/// Entry value: encoded field
type EntryValue = &'static [u8];

fn bucket(kind: &str) -> TableDefinition<'_, EntryKey, EntryValue> {
    TableDefinition::new(kind)
}

/// The document store
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (save/update/delete): one redb write transaction each,
///   serialized by the engine. `update` reads, merges and writes inside that
///   single transaction.
/// - **Reads** (get/all/keys/exists): one read transaction each, running
///   against a snapshot; readers never see a partially committed write.
///
/// The store holds no state besides the engine handle, so it is shared
/// between threads by reference or `Arc`.
pub struct Store {
    /// Store configuration
    config: Config,

    /// Engine handle, opened once and closed with the store
    db: Database,
}

impl Store {
    /// Open or create the database file named by the config
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        // Step 1: Create the parent directory if needed
        if let Some(parent) = config.db_file.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // Step 2: Open the engine
        let db = redb::Builder::new()
            .set_cache_size(config.cache_size)
            .create(&config.db_file)?;

        info!(
            path = %config.db_file.display(),
            sync = ?config.sync_strategy,
            "document store opened"
        );

        Ok(Self { config, db })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified database file
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().db_file(path).build())
    }

    // =========================================================================
    // Record Operations
    // =========================================================================

    /// Write or overwrite a whole record.
    ///
    /// An empty identifier is replaced by a fresh UUID which is written back
    /// into `record` before any field is persisted. Declared fields the
    /// record leaves out of its serialized form lose their stored entry.
    pub fn save<T: Document>(&self, record: &mut T) -> Result<()> {
        let mut fields = FieldSet::describe(record)?;
        let assigned = fields.id().is_empty();
        if assigned {
            fields.set_id(Uuid::new_v4().to_string());
        }

        // Nothing is written unless every field reads back into `T`
        let written = fields.rebuild::<T>()?;
        if assigned {
            *record = written;
        }

        let txn = self.begin_write()?;
        let cleared = {
            // Creates the type-bucket on first save
            let mut table = txn.open_table(bucket(T::KIND))?;
            let id = fields.id();

            let omitted = omitted_fields::<T, _>(&table, &fields)?;
            for name in &omitted {
                table.remove((id, name.as_str()))?;
            }

            for (name, value) in fields.iter() {
                let bytes = encode_field(name, value)?;
                table.insert((id, name), bytes.as_slice())?;
            }
            omitted.len()
        };
        txn.commit()?;

        debug!(
            kind = T::KIND,
            id = fields.id(),
            fields = fields.len(),
            cleared,
            "saved"
        );
        Ok(())
    }

    /// Populate `record` in place from the entries stored under its
    /// identifier. Fields without an entry get their zero value.
    pub fn get<T: Document>(&self, record: &mut T) -> Result<()> {
        let fields = FieldSet::describe(record)?;
        let id = fields.id();
        if id.is_empty() {
            return Err(StoreError::MissingIdentifier { kind: T::KIND });
        }

        let txn = self.db.begin_read()?;
        let table = match open_bucket(&txn, T::KIND)? {
            Some(table) => table,
            None => return Err(not_found::<T>(id)),
        };
        if !has_record(&table, id)? {
            return Err(not_found::<T>(id));
        }

        *record = hydrate::<T, _>(&table, id)?.into_record()?;

        debug!(kind = T::KIND, id, "fetched");
        Ok(())
    }

    /// Partially update a stored record.
    ///
    /// `changes` is keyed by field name or by the field's alias. Changed
    /// fields are checked against their declared type and persisted; every
    /// other field is read back, so `record` ends up fully hydrated. The
    /// identifier is never rewritten.
    pub fn update<T: Document>(&self, record: &mut T, changes: &Changes) -> Result<()> {
        let fields = FieldSet::describe(record)?;
        let id = fields.id().to_string();
        if id.is_empty() {
            return Err(StoreError::MissingIdentifier { kind: T::KIND });
        }

        // Read, merge and write stay inside this one write transaction.
        let txn = self.begin_write()?;
        if !bucket_exists(&txn, T::KIND)? {
            return Err(not_found::<T>(&id));
        }

        let mut changed = 0usize;
        let merged = {
            let mut table = txn.open_table(bucket(T::KIND))?;
            if !has_record(&table, &id)? {
                return Err(not_found::<T>(&id));
            }

            let mut merged = hydrate::<T, _>(&table, &id)?;

            // Stored and zero-valued fields first, then names only a change
            // mentions (an optional field that was never set)
            let mut names: Vec<String> = merged.names().map(str::to_string).collect();
            let mentioned = T::ALIASES
                .iter()
                .map(|(field, _)| *field)
                .chain(changes.keys().map(String::as_str));
            for name in mentioned {
                if !names.iter().any(|known| known == name) {
                    names.push(name.to_string());
                }
            }

            for name in names {
                if name == merged.id_field() {
                    continue;
                }
                let Some(value) = merged.change_for(&name, changes).cloned() else {
                    continue;
                };
                if !merged.check_field::<T>(&name, &value)? {
                    continue;
                }

                let bytes = encode_field(&name, &value)?;
                table.insert((id.as_str(), name.as_str()), bytes.as_slice())?;
                merged.insert(&name, value);
                changed += 1;
            }

            merged
        };

        let updated = merged.into_record::<T>()?;
        txn.commit()?;
        *record = updated;

        debug!(kind = T::KIND, id = %id, changed, "updated");
        Ok(())
    }

    /// Append every stored record of type `T` to `out`, in identifier order.
    ///
    /// `out` must be empty. A type that was never saved yields no records.
    pub fn all<T: Document>(&self, out: &mut Vec<T>) -> Result<()> {
        if !out.is_empty() {
            return Err(StoreError::InvalidRecordShape {
                kind: T::KIND,
                reason: format!("expected an empty collection, got {} element(s)", out.len()),
            });
        }
        let zero = FieldSet::zeroed::<T>()?;

        let txn = self.db.begin_read()?;
        let table = match open_bucket(&txn, T::KIND)? {
            Some(table) => table,
            None => return Ok(()),
        };

        let mut records = Vec::new();
        let mut current: Option<FieldSet> = None;

        for entry in table.iter()? {
            let (key, value) = entry?;
            let (id, name) = key.value();

            if current.as_ref().map_or(true, |fields| fields.id() != id) {
                if let Some(done) = current.take() {
                    records.push(done.into_record::<T>()?);
                }
                let mut fields = zero.clone();
                fields.set_id(id);
                current = Some(fields);
            }

            if let Some(fields) = current.as_mut() {
                fields.insert(name, decode_field(name, value.value())?);
            }
        }
        if let Some(done) = current.take() {
            records.push(done.into_record::<T>()?);
        }

        debug!(kind = T::KIND, count = records.len(), "enumerated");
        out.extend(records);
        Ok(())
    }

    /// Every identifier stored for the record's type, in lexicographic order
    pub fn keys<T: Document>(&self, record: &T) -> Result<Vec<String>> {
        FieldSet::describe(record)?;

        let txn = self.db.begin_read()?;
        let table = match open_bucket(&txn, T::KIND)? {
            Some(table) => table,
            None => return Ok(Vec::new()),
        };

        let mut keys: Vec<String> = Vec::new();
        for entry in table.iter()? {
            let (key, _) = entry?;
            let (id, _) = key.value();
            if keys.last().map(String::as_str) != Some(id) {
                keys.push(id.to_string());
            }
        }

        Ok(keys)
    }

    /// Whether a record with the record's identifier is stored.
    ///
    /// An empty identifier is never stored.
    pub fn exists<T: Document>(&self, record: &T) -> Result<bool> {
        let fields = FieldSet::describe(record)?;
        let id = fields.id();
        if id.is_empty() {
            return Ok(false);
        }

        let txn = self.db.begin_read()?;
        match open_bucket(&txn, T::KIND)? {
            Some(table) => has_record(&table, id),
            None => Ok(false),
        }
    }

    /// Remove the record with the record's identifier, all fields at once.
    ///
    /// Deleting an unsaved or already deleted record is a no-op.
    pub fn delete<T: Document>(&self, record: &T) -> Result<()> {
        let fields = FieldSet::describe(record)?;
        let id = fields.id();
        if id.is_empty() {
            return Ok(());
        }

        let txn = self.begin_write()?;
        if !bucket_exists(&txn, T::KIND)? {
            return Ok(());
        }

        let removed = {
            let mut table = txn.open_table(bucket(T::KIND))?;

            let mut names = Vec::new();
            for entry in table.range((id, "")..)? {
                let (key, _) = entry?;
                let (entry_id, name) = key.value();
                if entry_id != id {
                    break;
                }
                names.push(name.to_string());
            }

            for name in &names {
                table.remove((id, name.as_str()))?;
            }
            names.len()
        };
        txn.commit()?;

        debug!(kind = T::KIND, id, removed, "deleted");
        Ok(())
    }

    /// Close the store
    ///
    /// Every commit is already durable per the sync strategy; this releases
    /// the engine handle and its file lock.
    pub fn close(self) -> Result<()> {
        let path = self.config.db_file.clone();
        drop(self.db);
        info!(path = %path.display(), "document store closed");
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.config.db_file
    }

    // =========================================================================
    // Transaction Helpers
    // =========================================================================

    fn begin_write(&self) -> Result<WriteTransaction> {
        let mut txn = self.db.begin_write()?;
        txn.set_durability(self.config.sync_strategy.durability());
        Ok(txn)
    }
}

/// Open a type-bucket for reading, `None` if it was never created
fn open_bucket(
    txn: &ReadTransaction,
    kind: &str,
) -> Result<Option<ReadOnlyTable<EntryKey, EntryValue>>> {
    match txn.open_table(bucket(kind)) {
        Ok(table) => Ok(Some(table)),
        Err(TableError::TableDoesNotExist(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Check for a type-bucket inside a write transaction without creating it
fn bucket_exists(txn: &WriteTransaction, kind: &str) -> Result<bool> {
    Ok(txn.list_tables()?.any(|table| table.name() == kind))
}

/// An id-bucket exists iff at least one entry is keyed by the identifier
fn has_record(table: &impl ReadableTable<EntryKey, EntryValue>, id: &str) -> Result<bool> {
    match table.range((id, "")..)?.next() {
        Some(entry) => {
            let (key, _) = entry?;
            Ok(key.value().0 == id)
        }
        None => Ok(false),
    }
}

/// Build the field set of one stored record, starting from zero values.
///
/// Every entry under the identifier is merged in; entries the type does not
/// declare are dropped when the set is written back into `T`.
fn hydrate<T, R>(table: &R, id: &str) -> Result<FieldSet>
where
    T: Document,
    R: ReadableTable<EntryKey, EntryValue>,
{
    let mut fields = FieldSet::zeroed::<T>()?;

    for entry in table.range((id, "")..)? {
        let (key, value) = entry?;
        let (entry_id, name) = key.value();
        if entry_id != id {
            break;
        }
        fields.insert(name, decode_field(name, value.value())?);
    }
    fields.set_id(id);

    Ok(fields)
}

/// Stored entries of the record that `T` declares but `fields` omits, such
/// as an optional field that went back to `None`.
///
/// Entries left behind by other shapes of the type are kept, as are entries
/// that no longer decode.
fn omitted_fields<T, R>(table: &R, fields: &FieldSet) -> Result<Vec<String>>
where
    T: Document,
    R: ReadableTable<EntryKey, EntryValue>,
{
    let id = fields.id();
    let mut omitted = Vec::new();

    for entry in table.range((id, "")..)? {
        let (key, value) = entry?;
        let (entry_id, name) = key.value();
        if entry_id != id {
            break;
        }
        if fields.contains(name) {
            continue;
        }
        let Ok(stored) = decode_field(name, value.value()) else {
            continue;
        };
        // A stored value the type rejects still names a declared field
        if !matches!(fields.check_field::<T>(name, &stored), Ok(false)) {
            omitted.push(name.to_string());
        }
    }

    Ok(omitted)
}

fn not_found<T: Document>(id: &str) -> StoreError {
    StoreError::NotFound {
        kind: T::KIND,
        id: id.to_string(),
    }
}
