//! Routing records
//!
//! A record maps one hostname to the backend the gateway forwards it to.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::user::{unix_now, User};
use crate::document::Document;
use crate::error::{Result, StoreError};
use crate::store::Store;

/// Owner reference embedded in a record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Email")]
    pub email: String,
}

/// A single proxy record used for routing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Owner")]
    pub owner: Owner,
    #[serde(rename = "FQDN")]
    pub fqdn: String,
    #[serde(rename = "HandlerHost")]
    pub handler_host: String,
    #[serde(rename = "HandlerPort")]
    pub handler_port: u16,
    #[serde(rename = "HandlerProtocol")]
    pub handler_protocol: String,
    #[serde(rename = "UpdatedAt")]
    pub updated_at: i64,
    #[serde(rename = "CreatedAt")]
    pub created_at: i64,
    #[serde(rename = "Clients")]
    pub clients: Vec<String>,
    #[serde(rename = "Blacklist")]
    pub blacklist: bool,
}

impl Document for Record {
    const KIND: &'static str = "Record";
    const ALIASES: &'static [(&'static str, &'static str)] = &[
        ("Owner", "owner"),
        ("FQDN", "fqdn"),
        ("HandlerHost", "handler_host"),
        ("HandlerPort", "handler_port"),
        ("HandlerProtocol", "handler_protocol"),
        ("UpdatedAt", "updated_at"),
        ("CreatedAt", "created_at"),
        ("Clients", "clients"),
        ("Blacklist", "blacklist"),
    ];
}

impl Record {
    /// A new, unsaved record owned by `owner`, stamped with `now`
    pub fn new(
        owner: Owner,
        fqdn: impl Into<String>,
        handler_host: impl Into<String>,
        handler_port: u16,
        handler_protocol: impl Into<String>,
        now: i64,
    ) -> Self {
        Self {
            owner,
            fqdn: fqdn.into(),
            handler_host: handler_host.into(),
            handler_port,
            handler_protocol: handler_protocol.into(),
            created_at: now,
            updated_at: now,
            ..Self::default()
        }
    }

    /// Lookups return a zero-value record when nothing matched
    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }

    /// Backend URL the gateway forwards to, e.g. `http://10.0.0.5:8080`
    pub fn upstream_url(&self) -> String {
        format!(
            "{}://{}:{}",
            self.handler_protocol, self.handler_host, self.handler_port
        )
    }
}

/// Fields supplied when creating a record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordRequest {
    pub fqdn: String,
    pub handler_host: String,
    pub handler_port: u16,
    pub handler_protocol: String,
}

impl RecordRequest {
    fn validate(&self) -> Result<()> {
        validate_fqdn(&self.fqdn)?;
        if self.handler_host.parse::<Ipv4Addr>().is_err() {
            return Err(StoreError::InvalidRequest(
                "handler_host must be a valid IP address".to_string(),
            ));
        }
        validate_protocol(&self.handler_protocol)
    }
}

/// Changes to an existing record; `None` keeps the stored value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordEdit {
    pub fqdn: Option<String>,
    pub handler_host: Option<String>,
    pub handler_port: Option<u16>,
    pub handler_protocol: Option<String>,
    pub blacklist: Option<bool>,
    /// Reassign the record to another existing user
    pub owner_id: Option<String>,
}

// =============================================================================
// Mutations
// =============================================================================

/// Create a record owned by the user with `owner_id`.
///
/// The hostname must not be routed by any other record.
pub fn create_record(store: &Store, owner_id: &str, request: &RecordRequest) -> Result<Record> {
    request.validate()?;
    ensure_fqdn_free(store, &request.fqdn)?;
    let owner = find_owner(store, owner_id)?;

    let mut record = Record::new(
        owner,
        request.fqdn.clone(),
        request.handler_host.clone(),
        request.handler_port,
        request.handler_protocol.clone(),
        unix_now(),
    );
    store.save(&mut record)?;

    info!(id = %record.id, fqdn = %record.fqdn, owner = %record.owner.id, "record created");
    Ok(record)
}

/// Apply `edit` to the stored record with `id` and save it whole.
///
/// A new hostname must still be unique and a new owner must exist.
pub fn update_record(store: &Store, id: &str, edit: &RecordEdit) -> Result<Record> {
    let mut record = Record {
        id: id.to_string(),
        ..Record::default()
    };
    store.get(&mut record)?;

    if let Some(fqdn) = &edit.fqdn {
        validate_fqdn(fqdn)?;
        if *fqdn != record.fqdn {
            ensure_fqdn_free(store, fqdn)?;
            record.fqdn = fqdn.clone();
        }
    }
    if let Some(owner_id) = &edit.owner_id {
        if *owner_id != record.owner.id {
            record.owner = find_owner(store, owner_id)?;
        }
    }
    if let Some(host) = &edit.handler_host {
        if host.is_empty() {
            return Err(StoreError::InvalidRequest(
                "handler_host must not be empty".to_string(),
            ));
        }
        record.handler_host = host.clone();
    }
    if let Some(protocol) = &edit.handler_protocol {
        validate_protocol(protocol)?;
        record.handler_protocol = protocol.clone();
    }
    if let Some(port) = edit.handler_port {
        record.handler_port = port;
    }
    if let Some(blacklist) = edit.blacklist {
        record.blacklist = blacklist;
    }

    record.updated_at = unix_now();
    store.save(&mut record)?;

    debug!(id, fqdn = %record.fqdn, "record updated");
    Ok(record)
}

fn ensure_fqdn_free(store: &Store, fqdn: &str) -> Result<()> {
    if find_record_by_fqdn(store, fqdn)?.is_empty() {
        return Ok(());
    }
    Err(StoreError::Conflict(format!(
        "fqdn {} must be unique across the application",
        fqdn
    )))
}

/// Owner reference for an existing user, `NotFound` otherwise
fn find_owner(store: &Store, owner_id: &str) -> Result<Owner> {
    if owner_id.is_empty() {
        return Err(StoreError::InvalidRequest("owner id is required".to_string()));
    }
    let mut user = User {
        id: owner_id.to_string(),
        ..User::default()
    };
    store.get(&mut user)?;

    Ok(Owner {
        id: user.id,
        email: user.email,
    })
}

fn validate_fqdn(fqdn: &str) -> Result<()> {
    if fqdn.is_empty() {
        return Err(StoreError::InvalidRequest(
            "fqdn must be a valid hostname".to_string(),
        ));
    }
    Ok(())
}

fn validate_protocol(protocol: &str) -> Result<()> {
    match protocol {
        "http" | "https" => Ok(()),
        _ => Err(StoreError::InvalidRequest(
            "handler_protocol must be either http or https".to_string(),
        )),
    }
}

// =============================================================================
// Lookups
// =============================================================================

/// All records owned by the user with `owner_id`
pub fn find_records_for_owner(store: &Store, owner_id: &str) -> Result<Vec<Record>> {
    let mut records: Vec<Record> = Vec::new();
    store.all(&mut records)?;

    Ok(records
        .into_iter()
        .filter(|record| record.owner.id == owner_id)
        .collect())
}

/// The record routing `fqdn`.
///
/// Scans every record; when none matches the result is an empty record
/// (check [`Record::is_empty`]), not an error.
pub fn find_record_by_fqdn(store: &Store, fqdn: &str) -> Result<Record> {
    let mut records: Vec<Record> = Vec::new();
    store.all(&mut records)?;

    Ok(records
        .into_iter()
        .find(|record| record.fqdn == fqdn)
        .unwrap_or_default())
}

/// Where the gateway should forward a request for `host`.
///
/// `None` when no record routes the host or the record is blacklisted.
pub fn resolve_upstream(store: &Store, host: &str) -> Result<Option<String>> {
    let record = find_record_by_fqdn(store, host)?;

    if record.is_empty() {
        debug!(host, "no route");
        return Ok(None);
    }
    if record.blacklist {
        debug!(host, id = %record.id, "route blacklisted");
        return Ok(None);
    }

    Ok(Some(record.upstream_url()))
}
