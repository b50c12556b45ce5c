//! Byte streams the batching sink writes to
//!
//! The output belongs to the caller: the sink keeps a clone of the `Arc`, locks it for the
//! duration of one batch and never closes it.
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

pub type SharedOutput = Arc<Mutex<dyn Write + Send>>;

pub fn shared_output<W>(writer: W) -> SharedOutput
where
    W: Write + Send + 'static,
{
    Arc::new(Mutex::new(writer))
}

pub fn stdout_output() -> SharedOutput {
    shared_output(io::stdout())
}

/// for tests where we want to inspect the written data
#[derive(Debug, Default)]
pub struct MemoryOutput {
    data: Vec<u8>,
    writes: usize,
}

impl MemoryOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Mutex<MemoryOutput>> {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// number of `write` calls received
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// newline delimited records, without the delimiters
    pub fn lines(&self) -> Vec<String> {
        self.data
            .split(|b| *b == b'\n')
            .filter(|line| !line.is_empty())
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect()
    }
}

impl Write for MemoryOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writes += 1;
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
