//! Line-oriented parameter blocks.
//!
//! A saved model is a sequence of JSON documents, one per line. Every
//! trainable layer writes exactly one line, in stack order, and an optional
//! classifier block follows the last layer.

use std::io::{self, BufRead, Write};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

/// Writes `block` as a single JSON line.
pub fn write_block<T: Serialize + ?Sized>(os: &mut dyn Write, block: &T) -> Result<()> {
    serde_json::to_writer(&mut *os, block)?;
    os.write_all(b"\n")?;
    Ok(())
}

/// Reads the next non-blank line as a block; `None` at end of stream.
pub fn read_block<T: DeserializeOwned>(is: &mut dyn BufRead) -> Result<Option<T>> {
    let mut line = String::new();
    loop {
        line.clear();
        if is.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        if !line.trim().is_empty() {
            return Ok(Some(serde_json::from_str(line.trim())?));
        }
    }
}

/// Like `read_block`, but a missing block is an `UnexpectedEof` I/O error.
pub fn expect_block<T: DeserializeOwned>(is: &mut dyn BufRead, what: &str) -> Result<T> {
    read_block(is)?.ok_or_else(|| {
        io::Error::new(io::ErrorKind::UnexpectedEof, format!("missing {what} block")).into()
    })
}
