//! Record Descriptor
//!
//! Maps an application record type onto named, independently encoded fields.
//!
//! ## Responsibilities
//! - Name the record type (the type-bucket name)
//! - Locate the identifier field
//! - Expose field name → value pairs in declaration order
//! - Write a field mapping back into a typed record
//!
//! ## How a record is described
//! A record type implements [`Document`] on top of its serde derives. The
//! serialized form must be a single keyed record whose identifier field holds
//! a string:
//! ```text
//! User { id: "u1", email: "a@b", .. }
//!   -> FieldSet(User) [ID = "u1", Email = "a@b", ..]
//! ```
//! Anything else (a sequence, a primitive, a record without an identifier)
//! is rejected with `InvalidRecordShape`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Result, StoreError};

/// Field changes handed to `Store::update`, keyed by field name or alias
pub type Changes = Map<String, Value>;

/// A record type the store can persist.
///
/// `Default` supplies the zero value every absent field falls back to.
pub trait Document: Serialize + DeserializeOwned + Default {
    /// Type-bucket name
    const KIND: &'static str;

    /// Name of the identifier field in the serialized form
    const ID_FIELD: &'static str = "ID";

    /// Alternate lookup names accepted by `update`, as `(field, alias)` pairs
    const ALIASES: &'static [(&'static str, &'static str)] = &[];
}

/// Ordered field name → value view of one record
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSet {
    kind: &'static str,
    id_field: &'static str,
    aliases: &'static [(&'static str, &'static str)],
    fields: Map<String, Value>,
}

impl FieldSet {
    /// Describe a record instance
    pub fn describe<T: Document>(record: &T) -> Result<Self> {
        let value = serde_json::to_value(record).map_err(|e| StoreError::Encode {
            field: T::KIND.to_string(),
            reason: e.to_string(),
        })?;

        let fields = match value {
            Value::Object(fields) => fields,
            other => {
                return Err(StoreError::InvalidRecordShape {
                    kind: T::KIND,
                    reason: format!("expected a single record, got {}", shape_name(&other)),
                })
            }
        };

        match fields.get(T::ID_FIELD) {
            Some(Value::String(_)) => {}
            Some(other) => {
                return Err(StoreError::InvalidRecordShape {
                    kind: T::KIND,
                    reason: format!(
                        "identifier field {} must be a string, got {}",
                        T::ID_FIELD,
                        shape_name(other)
                    ),
                })
            }
            None => {
                return Err(StoreError::InvalidRecordShape {
                    kind: T::KIND,
                    reason: format!("missing identifier field {}", T::ID_FIELD),
                })
            }
        }

        Ok(Self {
            kind: T::KIND,
            id_field: T::ID_FIELD,
            aliases: T::ALIASES,
            fields,
        })
    }

    /// Field set of a zero-valued record
    pub fn zeroed<T: Document>() -> Result<Self> {
        Self::describe(&T::default())
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn id_field(&self) -> &'static str {
        self.id_field
    }

    /// Current identifier, empty if unassigned
    pub fn id(&self) -> &str {
        self.fields
            .get(self.id_field)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.fields
            .insert(self.id_field.to_string(), Value::String(id.into()));
    }

    /// Declared field names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Overwrite a declared field. Undeclared names are ignored and
    /// reported as `false`.
    pub fn set(&mut self, name: &str, value: Value) -> bool {
        match self.fields.get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Look up the change supplied for `name`, by field name first and then
    /// by its alias.
    pub fn change_for<'c>(&self, name: &str, changes: &'c Changes) -> Option<&'c Value> {
        changes.get(name).or_else(|| {
            self.aliases
                .iter()
                .filter(|(field, _)| *field == name)
                .find_map(|(_, alias)| changes.get(*alias))
        })
    }

    /// Store a field entry read back from the engine.
    ///
    /// Unlike [`FieldSet::set`] the name need not appear in the field set
    /// yet: fields serde omits from a record's serialized form still round
    /// trip this way, and names the type does not declare are dropped when
    /// the set is written back.
    pub fn insert(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }

    /// Check that `value` fits the declared type of field `name`.
    ///
    /// Returns `Ok(false)` when `T` does not declare `name` at all.
    pub fn check_field<T: Document>(&self, name: &str, value: &Value) -> Result<bool> {
        let mut candidate = self.fields.clone();
        candidate.insert(name.to_string(), value.clone());
        let candidate = Value::Object(candidate);

        let record = T::deserialize(&candidate).map_err(|e| StoreError::Encode {
            field: name.to_string(),
            reason: e.to_string(),
        })?;

        if Self::zeroed::<T>()?.contains(name) {
            return Ok(true);
        }
        // Optional fields only show up once they hold a value
        let echoed = serde_json::to_value(&record)?;
        Ok(echoed.get(name).is_some())
    }

    /// Rebuild the record from this field set before it is written.
    ///
    /// A value the field encoding cannot carry (a NaN float serializes as
    /// `null`) fails here as an encode error instead of on a later read.
    pub fn rebuild<T: Document>(&self) -> Result<T> {
        self.clone().into_record::<T>().map_err(|e| match e {
            StoreError::Decode { field, reason } => StoreError::Encode { field, reason },
            other => other,
        })
    }

    /// Write the field set back into a typed record
    pub fn into_record<T: Document>(self) -> Result<T> {
        let value = Value::Object(self.fields);

        match T::deserialize(&value) {
            Ok(record) => Ok(record),
            Err(e) => {
                let field = match &value {
                    Value::Object(fields) => offending_field::<T>(fields),
                    _ => None,
                };
                Err(StoreError::Decode {
                    field: field.unwrap_or_else(|| T::KIND.to_string()),
                    reason: e.to_string(),
                })
            }
        }
    }
}

/// Find the first field whose value alone makes an otherwise zero-valued
/// record fail to deserialize.
fn offending_field<T: Document>(fields: &Map<String, Value>) -> Option<String> {
    let zero = FieldSet::zeroed::<T>().ok()?;

    fields
        .iter()
        .find(|(name, value)| zero.check_field::<T>(name, value).is_err())
        .map(|(name, _)| name.clone())
}

fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a record",
    }
}
