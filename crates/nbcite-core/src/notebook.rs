use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::error::{NbciteError, Result};

pub const MARKDOWN_CELL: &str = "markdown";

/// A notebook document held as raw JSON.
///
/// Only `cells[*].cell_type`, `cells[*].source` and `cells[*].metadata` are
/// interpreted. Every other key is kept as-is and in its original order.
#[derive(Debug, Clone, PartialEq)]
pub struct Notebook {
    root: Map<String, Value>,
}

impl Notebook {
    /// Parse a notebook from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(root) = value else {
            return Err(NbciteError::MalformedNotebook(
                "top level is not a JSON object".to_string(),
            ));
        };
        match root.get("cells") {
            Some(Value::Array(_)) => Ok(Self { root }),
            Some(_) => Err(NbciteError::MalformedNotebook(
                "`cells` is not an array".to_string(),
            )),
            None => Err(NbciteError::MalformedNotebook(
                "missing `cells` array".to_string(),
            )),
        }
    }

    /// Load a notebook from a `.ipynb` file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    /// Serialize with `indent` spaces per nesting level.
    pub fn to_json(&self, indent: usize, trailing_newline: bool) -> Result<String> {
        let indent = " ".repeat(indent);
        let mut buf = Vec::new();
        let mut ser = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(indent.as_bytes()));
        self.root.serialize(&mut ser)?;
        if trailing_newline {
            buf.push(b'\n');
        }
        // serde_json only ever emits valid UTF-8.
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Overwrite `path` with the serialized notebook.
    pub fn save(&self, path: &Path, indent: usize, trailing_newline: bool) -> Result<()> {
        let json = self.to_json(indent, trailing_newline)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn cells(&self) -> &[Value] {
        match self.root.get("cells") {
            Some(Value::Array(cells)) => cells,
            _ => &[],
        }
    }

    pub fn cells_mut(&mut self) -> &mut [Value] {
        match self.root.get_mut("cells") {
            Some(Value::Array(cells)) => cells,
            _ => Default::default(),
        }
    }
}

/// The `cell_type` tag of a cell, if present.
pub fn cell_type(cell: &Value) -> Option<&str> {
    cell.get("cell_type").and_then(Value::as_str)
}

pub fn is_markdown(cell: &Value) -> bool {
    cell_type(cell) == Some(MARKDOWN_CELL)
}

/// Full text of a cell. A list `source` is concatenated in order; non-string
/// fragments and a missing `source` contribute nothing.
pub fn source_text(cell: &Value) -> String {
    match cell.get("source") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(fragments)) => fragments.iter().filter_map(Value::as_str).collect(),
        _ => String::new(),
    }
}

/// Walk `keys` below the cell's `metadata`, creating empty objects for any
/// missing level. Existing sibling keys are left alone.
pub fn ensure_metadata_path<'a>(
    cell_index: usize,
    cell: &'a mut Value,
    keys: &[&str],
) -> Result<&'a mut Map<String, Value>> {
    let Value::Object(cell_map) = cell else {
        return Err(NbciteError::MalformedNotebook(format!(
            "cell {cell_index} is not an object"
        )));
    };

    let mut current = cell_map;
    let mut path = Vec::with_capacity(keys.len() + 1);
    for key in std::iter::once("metadata").chain(keys.iter().copied()) {
        path.push(key);
        let entry = current
            .entry(key)
            .or_insert_with(|| Value::Object(Map::new()));
        let Value::Object(map) = entry else {
            return Err(NbciteError::MalformedNotebook(format!(
                "cell {cell_index}: `{}` is not an object",
                path.join(".")
            )));
        };
        current = map;
    }
    Ok(current)
}
