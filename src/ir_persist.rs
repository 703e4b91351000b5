/*!
JSON persistence for functions.

Functions serialize with serde; this module adds convenience wrappers for
writing to and reading from files, mirroring how analysis fixtures are
stored in tests.
*/

use crate::function::Function;
use crate::{IrError, Result};
use std::fs;
use std::path::Path;

pub fn to_json(func: &Function) -> Result<String> {
    serde_json::to_string_pretty(func)
        .map_err(|e| IrError::BuilderError(format!("serialize failed: {}", e)))
}

pub fn from_json(json: &str) -> Result<Function> {
    serde_json::from_str(json)
        .map_err(|e| IrError::BuilderError(format!("deserialize failed: {}", e)))
}

pub fn save_function(func: &Function, path: impl AsRef<Path>) -> Result<()> {
    let json = to_json(func)?;
    fs::write(path, json).map_err(|e| IrError::BuilderError(format!("write failed: {}", e)))
}

pub fn load_function(path: impl AsRef<Path>) -> Result<Function> {
    let json =
        fs::read_to_string(path).map_err(|e| IrError::BuilderError(format!("read failed: {}", e)))?;
    from_json(&json)
}
