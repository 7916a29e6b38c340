//! On-disk encoding of modules and their debug symbols.
//!
//! ```text
//! module file (.jmod):   "JMOD" | u16 LE version | bincode(Module)
//! symbol file (.jsym):   "JSYM" | u16 LE version | bincode(DebugSymbols)
//! ```
//!
//! Symbols carry the SHA-256 fingerprint of the module payload they describe.
//! A module rewritten by the injector gets its symbols re-stamped so the pair
//! keeps matching.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{MonoError, Result};
use crate::model::Module;

pub const MODULE_MAGIC: &[u8; 4] = b"JMOD";
pub const SYMBOLS_MAGIC: &[u8; 4] = b"JSYM";
pub const FORMAT_VERSION: u16 = 1;

pub const MODULE_EXTENSION: &str = "jmod";
pub const SYMBOLS_EXTENSION: &str = "jsym";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencePoint {
    pub offset: u32,
    pub document: u32,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugSymbols {
    pub module_name: String,
    /// Hex SHA-256 of the module payload these symbols belong to.
    pub fingerprint: String,
    pub documents: Vec<String>,
    /// Method full name -> sequence points.
    pub methods: BTreeMap<String, Vec<SequencePoint>>,
}

fn encode_framed<T: Serialize>(magic: &[u8; 4], what: &str, value: &T) -> Result<Vec<u8>> {
    let payload = bincode::serialize(value).map_err(|e| MonoError::codec(what, e))?;
    let mut out = Vec::with_capacity(payload.len() + 6);
    out.extend_from_slice(magic);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

fn split_frame<'a>(magic: &[u8; 4], expected: &'static str, bytes: &'a [u8]) -> Result<&'a [u8]> {
    if bytes.len() < 6 || &bytes[..4] != magic {
        return Err(MonoError::BadMagic { expected });
    }
    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != FORMAT_VERSION {
        return Err(MonoError::UnsupportedVersion {
            found: version,
            supported: FORMAT_VERSION,
        });
    }
    Ok(&bytes[6..])
}

pub fn encode_module(module: &Module) -> Result<Vec<u8>> {
    encode_framed(MODULE_MAGIC, "module", module)
}

pub fn decode_module(bytes: &[u8]) -> Result<Module> {
    let payload = split_frame(MODULE_MAGIC, "module", bytes)?;
    bincode::deserialize(payload).map_err(|e| MonoError::codec("module", e))
}

pub fn encode_symbols(symbols: &DebugSymbols) -> Result<Vec<u8>> {
    encode_framed(SYMBOLS_MAGIC, "symbols", symbols)
}

pub fn decode_symbols(bytes: &[u8]) -> Result<DebugSymbols> {
    let payload = split_frame(SYMBOLS_MAGIC, "symbols", bytes)?;
    bincode::deserialize(payload).map_err(|e| MonoError::codec("symbols", e))
}

/// Hex SHA-256 over the module payload (frame header excluded).
pub fn module_fingerprint(module: &Module) -> Result<String> {
    let payload = bincode::serialize(module).map_err(|e| MonoError::codec("module", e))?;
    Ok(hex::encode(Sha256::digest(&payload)))
}

/// Sidecar symbol path for a module path (`Game.jmod` -> `Game.jsym`).
pub fn symbols_path(module_path: &Path) -> PathBuf {
    module_path.with_extension(SYMBOLS_EXTENSION)
}

pub fn read_module_file(path: &Path) -> Result<Module> {
    let bytes = std::fs::read(path).map_err(|e| MonoError::io(path, e))?;
    decode_module(&bytes)
}

pub fn write_module_file(path: &Path, module: &Module) -> Result<()> {
    let bytes = encode_module(module)?;
    std::fs::write(path, bytes).map_err(|e| MonoError::io(path, e))
}

/// Read the sidecar symbols of `module_path`, if present.
pub fn read_symbols_file(module_path: &Path) -> Result<Option<DebugSymbols>> {
    let path = symbols_path(module_path);
    if !path.exists() {
        return Ok(None);
    }
    let bytes = std::fs::read(&path).map_err(|e| MonoError::io(&path, e))?;
    decode_symbols(&bytes).map(Some)
}

pub fn write_symbols_file(module_path: &Path, symbols: &DebugSymbols) -> Result<PathBuf> {
    let path = symbols_path(module_path);
    let bytes = encode_symbols(symbols)?;
    std::fs::write(&path, bytes).map_err(|e| MonoError::io(&path, e))?;
    Ok(path)
}
