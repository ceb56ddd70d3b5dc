//! Collaborator seams
//!
//! - [`ObservationSource`]: stream of DNS answers and connections reported by
//!   the capture layer

pub mod observation_source;

pub use observation_source::{Observation, ObservationSource};
