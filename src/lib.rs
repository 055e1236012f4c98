//! # squidgate
//!
//! Persistent state for a hostname-routed gateway:
//! - Generic typed-document store over an embedded ACID key-value engine
//! - One bucket per record type, one bucket per record, one entry per field
//! - Partial updates merged inside a single write transaction
//! - Routing records and users built purely on the generic operations
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │          Consumers (hostname / email / owner lookups)        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  save / get / update / all / keys /
//!                       │  exists / delete
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                    Document Store                            │
//! │            (one engine transaction per call)                 │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │ Descriptor  │          │ Field Codec │
//!   │ (FieldSet)  │          │   (JSON)    │
//!   └─────────────┘          └──────┬──────┘
//!                                   │
//!                                   ▼
//!                           ┌─────────────┐
//!                           │    redb     │
//!                           │  (engine)   │
//!                           └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod codec;
pub mod document;
pub mod store;
pub mod models;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{StoreError, Result};
pub use config::{Config, SyncStrategy};
pub use document::{Changes, Document, FieldSet};
pub use store::Store;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of squidgate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
