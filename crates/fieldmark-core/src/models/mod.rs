//! Data models for Fieldmark

mod device;
pub mod epoch;
mod marking;

pub use device::DeviceLocation;
pub use marking::{
    LatLng, Marking, MarkingKind, MarkingProperties, Origin, COORD_TOLERANCE_DEG,
};
