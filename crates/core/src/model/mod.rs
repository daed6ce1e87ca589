pub mod annotation;
pub mod swimmer;

pub use annotation::{Annotation, DialogueRequest, PendingRequest};
pub use swimmer::{Fish, SwimBand, Swimmer};
