use std::io::{self, Write};

use serde::Serialize;

use crate::app::{
    EnrichResult, MergeResult, ProgressEvent, ProgressSink, ReconcileResult, TagResult,
    UnifyResult,
};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Quiet,
    Verbose,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_reconcile(result: &ReconcileResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_merge(result: &MergeResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_enrich(result: &EnrichResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_tag(result: &TagResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_unify(result: &UnifyResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Forwards progress events to the log.
pub struct LogSink;

impl ProgressSink for LogSink {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => tracing::info!(
                elapsed_ms = elapsed.as_millis() as u64,
                "{}",
                event.message
            ),
            None => tracing::info!("{}", event.message),
        }
    }
}
