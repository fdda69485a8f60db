//! fieldmark-core - Core library for Fieldmark
//!
//! This crate contains the marking models, merge engine, sync orchestration,
//! and backend adapters shared by all Fieldmark interfaces (CLI, local
//! fallback server).

pub mod db;
pub mod device;
pub mod error;
pub mod export;
pub mod merge;
pub mod models;
pub mod presence;
pub mod sync;
pub mod util;
pub mod works;

pub use error::{Error, Result};
pub use models::{DeviceLocation, LatLng, Marking, MarkingKind, MarkingProperties, Origin};
