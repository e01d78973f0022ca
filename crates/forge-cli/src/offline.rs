//! JSON workspace file behind `--offline --seed`, shaped like the `/files` reply.

use std::fs;
use std::io;
use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use forge_exec::backend::SimulatedBackend;
use forge_exec::contracts::ListFilesReply;

/// A missing file starts an empty workspace.
pub fn load(path: &Path) -> Result<SimulatedBackend> {
    let files = match fs::read_to_string(path) {
        Ok(text) => {
            serde_json::from_str::<ListFilesReply>(&text)
                .with_context(|| format!("parsing workspace file {}", path.display()))?
                .files
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no workspace file; starting empty");
            Default::default()
        }
        Err(err) => {
            return Err(err).with_context(|| format!("reading workspace file {}", path.display()))
        }
    };
    Ok(SimulatedBackend::with_files(files))
}

pub fn save(path: &Path, backend: &SimulatedBackend) -> Result<()> {
    let reply = ListFilesReply {
        files: backend.snapshot().into_iter().collect(),
    };
    let mut text = serde_json::to_string_pretty(&reply)?;
    text.push('\n');
    fs::write(path, text).with_context(|| format!("writing workspace file {}", path.display()))
}
