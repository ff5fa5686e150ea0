#[path = "dlock.v1alpha1.rs"]
mod generated;

pub use generated::*;
