use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::{fs, io};

use anyhow::{Context, Result};

pub(super) fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

pub(super) fn read_payload(
    inline: Option<String>,
    file: Option<PathBuf>,
    stdin: bool,
) -> Result<Vec<u8>> {
    validate_payload_source_selection(inline.as_deref(), file.as_deref(), stdin)?;

    if let Some(data) = inline {
        return Ok(data.into_bytes());
    }
    if let Some(path) = file {
        return fs::read(&path)
            .with_context(|| format!("failed to read payload file {}", path.display()));
    }

    let mut buffer = Vec::new();
    io::stdin()
        .read_to_end(&mut buffer)
        .context("failed to read payload from stdin")?;
    Ok(buffer)
}

pub(super) fn validate_payload_source_selection(
    inline: Option<&str>,
    file: Option<&Path>,
    stdin: bool,
) -> Result<()> {
    let selected = [inline.is_some(), file.is_some(), stdin]
        .into_iter()
        .filter(|selected| *selected)
        .count();
    match selected {
        0 => anyhow::bail!("queue push payload is required: use one of --data, --file <path>, --stdin"),
        1 => Ok(()),
        _ => anyhow::bail!(
            "queue push accepts exactly one payload source: choose one of --data, --file, --stdin"
        ),
    }
}
