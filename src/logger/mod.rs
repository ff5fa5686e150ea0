use std::sync::atomic::{AtomicUsize, Ordering};

mod backtrace;
mod config;
mod console;
mod drain;
pub mod entry;
mod logger;

pub use config::*;
pub use console::*;
pub use drain::*;
pub use logger::*;
pub use slog::Level;

pub use self::backtrace::*;

static LOG_LEVEL: AtomicUsize = AtomicUsize::new(usize::MAX);

pub fn get_log_level() -> Option<Level> {
    Level::from_usize(LOG_LEVEL.load(Ordering::Relaxed))
}

pub fn set_log_level(level: Level) {
    LOG_LEVEL.store(level.as_usize(), Ordering::SeqCst);
}
