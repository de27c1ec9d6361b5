//! Service Client Facade: the thin typed boundary over backing services
//! (spec.md §4.7, §6). The dispatcher never speaks to a backing service
//! directly — every tool goes through a trait object here, so service
//! unavailability is a first-class, non-crashing case.

pub mod facade;
pub mod mock;
pub mod types;

pub use facade::ServiceClientFacade;
pub use types::*;
