//! A line-at-a-time G-code file reader, the Rust counterpart of
//! `streamer.py`'s `GCodeStreamer`: skips blank lines and lines starting
//! with `;` or `(`, and tracks the current line number for diagnostics.

use cnc_core::{CncError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

pub struct FileLineSource {
    path: PathBuf,
    reader: Option<BufReader<File>>,
    line_number: u64,
}

impl FileLineSource {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            reader: None,
            line_number: 0,
        }
    }

    pub fn line_number(&self) -> u64 {
        self.line_number
    }
}

impl cnc_core::LineSource for FileLineSource {
    fn open(&mut self) -> Result<()> {
        if self.reader.is_none() {
            let file = File::open(&self.path)
                .map_err(|e| CncError::Executor(format!("open {:?}: {e}", self.path)))?;
            self.reader = Some(BufReader::new(file));
        }
        Ok(())
    }

    fn next_line(&mut self) -> Result<Option<String>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        loop {
            let mut buf = String::new();
            let bytes = reader
                .read_line(&mut buf)
                .map_err(|e| CncError::Executor(format!("read line: {e}")))?;
            if bytes == 0 {
                return Ok(None);
            }
            self.line_number += 1;
            let trimmed = buf.trim();
            if trimmed.is_empty() || trimmed.starts_with(';') || trimmed.starts_with('(') {
                continue;
            }
            return Ok(Some(trimmed.to_string()));
        }
    }

    fn close(&mut self) -> Result<()> {
        self.reader = None;
        Ok(())
    }
}
