//! Models Module
//!
//! The gateway's record types and the lookups built on the document store.
//!
//! ## Responsibilities
//! - Routing records keyed by hostname
//! - Users, password hashing and credential checks
//! - Uniqueness of user emails and record hostnames
//! - Ownership constraint between users and records
//! - First-run admin bootstrap
//!
//! Every lookup is a full scan (`Store::all` + filter); a miss returns an
//! empty value rather than an error.

mod record;
mod user;

pub use record::{
    create_record, find_record_by_fqdn, find_records_for_owner, resolve_upstream, update_record,
    Owner, Record, RecordEdit, RecordRequest,
};
pub use user::{
    authenticate, create_user, delete_user, ensure_admin, find_user_by_email, set_password,
    unix_now, User, ADMIN_EMAIL,
};
