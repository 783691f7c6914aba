// Copyright (c) Microsoft Corporation.
// License: MIT OR Apache-2.0

//! Routes `log` records from `integer-overflow-core` to the kernel debugger.

use log::{Level, LevelFilter, Log, Metadata, Record};
use wdk::println;

const MAX_LEVEL: LevelFilter = if cfg!(debug_assertions) {
    LevelFilter::Debug
} else {
    LevelFilter::Info
};

struct DbgPrintLogger;

impl Log for DbgPrintLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= MAX_LEVEL
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let marker = match record.level() {
            Level::Error | Level::Warn => "[-]",
            Level::Info | Level::Debug | Level::Trace => "[+]",
        };
        println!("{marker} {}", record.args());
    }

    fn flush(&self) {}
}

static LOGGER: DbgPrintLogger = DbgPrintLogger;

/// Installs the logger. Safe to call more than once; only the first call
/// has an effect.
pub fn init() {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(MAX_LEVEL);
    }
}
