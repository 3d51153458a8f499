//! Decoding JSON input
//!
//! Whole documents go through SIMD-accelerated parsing with a `serde_json`
//! fallback; newline-delimited input is collected into a single array.

use crate::error::{ConvertError, ConvertResult};
use serde_json::Value;
use std::io::{BufRead, BufReader, Read};

/// Read one JSON value from `reader`
///
/// With `ndjson` set, every non-empty line is parsed as its own record and the
/// records are returned as an array.
pub fn read_json<R: Read>(reader: R, ndjson: bool) -> ConvertResult<Value> {
    let mut buf_reader = BufReader::new(reader);

    if ndjson {
        return parse_ndjson(buf_reader);
    }

    let mut content = Vec::new();
    buf_reader.read_to_end(&mut content)?;
    parse_document(&content)
}

/// Parse a complete JSON document
pub fn parse_document(bytes: &[u8]) -> ConvertResult<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ConvertError::invalid_input("no JSON value in input"));
    }

    // simd-json parses in place, so give it a scratch copy
    let mut scratch = bytes.to_vec();
    match simd_json::serde::from_slice::<Value>(&mut scratch) {
        Ok(value) => Ok(value),
        Err(_) => Ok(serde_json::from_slice(bytes)?),
    }
}

/// Parse newline-delimited JSON into an array of records
pub fn parse_ndjson<R: BufRead>(reader: R) -> ConvertResult<Value> {
    let mut records = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        records.push(serde_json::from_str(line)?);
    }

    Ok(Value::Array(records))
}
