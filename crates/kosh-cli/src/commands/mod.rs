//! Command handlers grouped by resource.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::Context;
use kosh_core::{CoreResult, ErrorCategory};

use crate::client::{CliError, CliResult};

pub(crate) mod assignments;
pub(crate) mod devices;
pub(crate) mod layout;
pub(crate) mod products;
pub(crate) mod racks;

/// Read a JSON document from `path`, where `-` means stdin.
pub(crate) fn read_input(path: &Path) -> CliResult<Vec<u8>> {
    if path == Path::new("-") {
        let mut buffer = Vec::new();
        io::stdin()
            .lock()
            .read_to_end(&mut buffer)
            .context("failed to read document from stdin")
            .map_err(CliError::failure)?;
        return Ok(buffer);
    }
    fs::read(path)
        .with_context(|| format!("failed to read {}", path.display()))
        .map_err(CliError::failure)
}

/// A lookup that may come back empty: a missing entity is `None`, every
/// other failure propagates.
pub(crate) fn found_or_none<T>(result: CoreResult<T>) -> CliResult<Option<T>> {
    match result {
        Ok(entity) => Ok(Some(entity)),
        Err(err) if err.category() == ErrorCategory::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}
