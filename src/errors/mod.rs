mod lock_errors;

pub use lock_errors::*;
