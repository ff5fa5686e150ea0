use lazy_static::lazy_static;

use crate::logger::backtrace::Inner::*;
use crate::logger::backtrace::{Backtrace, BytesOrWide};
use crate::logger::entry::{Entry, ErrKind, Trace};

lazy_static! {
    pub(super) static ref JSON_FLAG: bool = std::env::var("DLOCK_LOG_JSON").is_ok();
}

#[derive(strum::ToString, Debug)]
enum Level {
    Error,
}

/// Logs an engine or session error against the shared [`super::LOG_LOGGER`],
/// tagging it with the backend and lock key it concerns.
pub fn log<Err: std::error::Error>(backend: &str, key: &str, err: Err) {
    log_with_kind(backend, key, err, ErrKind::System)
}

pub fn log_with_kind<Err: std::error::Error>(backend: &str, key: &str, err: Err, kind: ErrKind) {
    let trace = get_trace(4);
    let message = format!("{} ({})", err, std::any::type_name::<Err>());

    let entry = Entry {
        deployment_id: String::new(),
        level: Level::Error.to_string(),
        kind,
        time: humantime::format_rfc3339_nanos(std::time::SystemTime::now()).to_string(),
        backend: backend.to_owned(),
        key: key.to_owned(),
        owner: String::new(),
        message: String::new(),
        error: Some(Trace {
            message,
            source: trace,
            variables: Default::default(),
        }),
    };

    slog::error!(super::LOG_LOGGER, ""; entry);
}

// Creates and returns stack trace
fn get_trace(trace_level: usize) -> Vec<String> {
    let bt = Backtrace::capture();
    let capture = match &bt.inner {
        Unsupported => {
            return vec!["<unsupported>".to_string()];
        }
        Disabled => {
            return vec!["<disabled>".to_string()];
        }
        Captured(c) => c.force(),
    };

    let frames = &capture.frames[capture.actual_start..];

    let mut trace = Vec::new();
    for f in frames.iter().skip(trace_level) {
        if f.frame.ip().is_null() {
            continue;
        }
        for symbol in f.symbols.iter() {
            let symbol_name = symbol.name.as_ref().map(|b| backtrace::SymbolName::new(b));
            let file_name = symbol.filename.as_ref().map(|b| match b {
                BytesOrWide::Bytes(w) => backtrace::BytesOrWideString::Bytes(w).into_path_buf(),
                BytesOrWide::Wide(w) => backtrace::BytesOrWideString::Wide(w).into_path_buf(),
            });

            use std::fmt::Write;
            let mut s = String::new();
            if let (Some(file_name), Some(lineno)) = (file_name, symbol.lineno) {
                let _ = write!(s, "{:?}:{}:", file_name, lineno);
                if let Some(colno) = symbol.colno {
                    let _ = write!(s, "{}:", colno);
                }
            }
            if let Some(symbol_name) = symbol_name {
                let _ = write!(s, "{}", symbol_name);
            } else {
                let _ = write!(s, "<unknown>");
            }
            trace.push(s);
        }
    }
    trace
}

#[macro_export]
macro_rules! trace(
    ($($args:tt)*) => {
        slog::trace!($crate::logger::LOG_LOGGER, $($args)*)
    };
);

#[macro_export]
macro_rules! info(
    ($($args:tt)*) => {
        slog::info!($crate::logger::LOG_LOGGER, $($args)*)
    };
);

#[macro_export]
macro_rules! warn(
    ($($args:tt)*) => {
        slog::warn!($crate::logger::LOG_LOGGER, $($args)*)
    };
);

#[macro_export]
macro_rules! error(
    ($($args:tt)*) => {
        slog::error!($crate::logger::LOG_LOGGER, $($args)*)
    };
);

#[macro_export]
macro_rules! fatal(
    ($($args:tt)+) => {
        slog::crit!($crate::logger::LOG_LOGGER, $($args)+);
        std::process::exit(1)
    };
);
