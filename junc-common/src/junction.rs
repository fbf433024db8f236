// Junction position stream I/O
// Binary format: (pos: u32 LE, id: u64 LE) records, chromosome boundaries
// signalled by a separator record

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

/// Position separator value: terminates a chromosome in the stream.
pub const SEPARATOR_POS: u32 = u32::MAX;

/// Id separator value, paired with `SEPARATOR_POS`.
pub const SEPARATOR_ID: u64 = u64::MAX;

/// A junction occurrence: chromosome index, 0-based position of the k-mer's
/// first base, and the junction's stable id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JunctionPosition {
    pub chr: u32,
    pub pos: u32,
    pub id: u64,
}

impl JunctionPosition {
    pub fn new(chr: u32, pos: u32, id: u64) -> Self {
        JunctionPosition { chr, pos, id }
    }
}

/// Writes the junction stream, inserting chromosome separators as the
/// chromosome index advances. The first chromosome has index 0.
pub struct JunctionPositionWriter {
    out: BufWriter<File>,
    now_chr: u32,
}

impl JunctionPositionWriter {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path.as_ref())
            .with_context(|| format!("can't create the output file {:?}", path.as_ref()))?;
        Ok(JunctionPositionWriter {
            out: BufWriter::new(file),
            now_chr: 0,
        })
    }

    /// Write one junction. Positions must arrive grouped by chromosome in
    /// increasing chromosome order.
    pub fn write(&mut self, junction: JunctionPosition) -> Result<()> {
        while junction.chr > self.now_chr {
            self.write_record(SEPARATOR_POS, SEPARATOR_ID)?;
            self.now_chr += 1;
        }

        self.write_record(junction.pos, junction.id)
    }

    fn write_record(&mut self, pos: u32, id: u64) -> Result<()> {
        self.out
            .write_all(&pos.to_le_bytes())
            .and_then(|_| self.out.write_all(&id.to_le_bytes()))
            .context("can't write to the output file")
    }

    pub fn finish(mut self) -> Result<()> {
        self.out.flush().context("can't flush the output file")
    }
}

/// Reads the junction stream back, consuming separators and tracking the
/// current chromosome index.
pub struct JunctionPositionReader {
    input: BufReader<File>,
    now_chr: u32,
}

impl JunctionPositionReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())
            .with_context(|| format!("can't read the input file {:?}", path.as_ref()))?;
        Ok(JunctionPositionReader {
            input: BufReader::new(file),
            now_chr: 0,
        })
    }

    /// Next junction position, or `None` at end of stream.
    pub fn next_junction(&mut self) -> Result<Option<JunctionPosition>> {
        loop {
            let mut pos_buf = [0u8; 4];
            match self.input.read_exact(&mut pos_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
                Err(e) => return Err(e).context("can't read the junction stream"),
            }

            let mut id_buf = [0u8; 8];
            self.input
                .read_exact(&mut id_buf)
                .context("truncated junction record")?;

            let pos = u32::from_le_bytes(pos_buf);
            let id = u64::from_le_bytes(id_buf);
            if pos == SEPARATOR_POS && id == SEPARATOR_ID {
                self.now_chr += 1;
                continue;
            }

            return Ok(Some(JunctionPosition::new(self.now_chr, pos, id)));
        }
    }
}
