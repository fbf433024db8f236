// FASTA input
// Record-at-a-time streaming with transparent gzip and base normalisation:
// lowercase folds to uppercase, every non-ACGT character becomes 'N'.

use crate::error::JuncError;
use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use junc_common::dna;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

pub struct FastaReader {
    reader: BufReader<Box<dyn Read + Send>>,
    line: Vec<u8>,
    next_header: Option<String>,
    saw_record: bool,
}

impl FastaReader {
    /// Open a FASTA file, decompressing on the fly when the name ends in
    /// `.gz`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("can't open the input file {:?}", path))?;
        let raw: Box<dyn Read + Send> = if path.extension().is_some_and(|e| e == "gz") {
            Box::new(MultiGzDecoder::new(file))
        } else {
            Box::new(file)
        };
        Ok(FastaReader {
            reader: BufReader::with_capacity(4 << 20, raw),
            line: Vec::with_capacity(4 << 20),
            next_header: None,
            saw_record: false,
        })
    }

    /// Next record as `(header, normalised bases)`, or `None` at end of
    /// file.
    pub fn next_record(&mut self) -> Result<Option<(String, Vec<u8>)>> {
        let header = match self.take_header()? {
            Some(h) => h,
            None => return Ok(None),
        };

        let mut sequence = Vec::new();
        loop {
            self.line.clear();
            let n = self.reader.read_until(b'\n', &mut self.line)?;
            if n == 0 {
                break;
            }
            if self.line[0] == b'>' {
                self.next_header = Some(parse_header(&self.line));
                break;
            }
            sequence.extend(
                self.line
                    .iter()
                    .filter(|ch| !ch.is_ascii_whitespace())
                    .map(|&ch| dna::normalize(ch)),
            );
        }

        Ok(Some((header, sequence)))
    }

    fn take_header(&mut self) -> Result<Option<String>> {
        if let Some(h) = self.next_header.take() {
            return Ok(Some(h));
        }

        loop {
            self.line.clear();
            let n = self.reader.read_until(b'\n', &mut self.line)?;
            if n == 0 {
                return Ok(None);
            }
            let trimmed: &[u8] = trim_ascii(&self.line);
            if trimmed.is_empty() {
                continue;
            }
            if trimmed[0] != b'>' {
                return Err(JuncError::Parse(if self.saw_record {
                    "sequence data without a record header".into()
                } else {
                    "input does not start with a FASTA header".into()
                })
                .into());
            }
            self.saw_record = true;
            return Ok(Some(parse_header(&self.line)));
        }
    }
}

fn parse_header(line: &[u8]) -> String {
    let text = String::from_utf8_lossy(line);
    text.trim_start_matches('>').trim().to_string()
}

fn trim_ascii(line: &[u8]) -> &[u8] {
    let start = line.iter().position(|c| !c.is_ascii_whitespace());
    match start {
        Some(s) => {
            let end = line.iter().rposition(|c| !c.is_ascii_whitespace()).unwrap();
            &line[s..=end]
        }
        None => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fasta(dir: &Path, name: &str, text: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(text.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_reads_records_normalised() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fasta(
            dir.path(),
            "in.fa",
            ">chr1 description\nacgt\nNRYA\n>chr2\nGG\ngg\n",
        );
        let mut reader = FastaReader::open(&path).unwrap();

        let (name, seq) = reader.next_record().unwrap().unwrap();
        assert_eq!(name, "chr1 description");
        assert_eq!(seq, b"ACGTNNNA");

        let (name, seq) = reader.next_record().unwrap().unwrap();
        assert_eq!(name, "chr2");
        assert_eq!(seq, b"GGGG");

        assert!(reader.next_record().unwrap().is_none());
    }

    #[test]
    fn test_rejects_headerless_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fasta(dir.path(), "bad.fa", "ACGT\n");
        let mut reader = FastaReader::open(&path).unwrap();
        assert!(reader.next_record().is_err());
    }

    #[test]
    fn test_empty_record_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_fasta(dir.path(), "empty.fa", ">a\n>b\nACG\n");
        let mut reader = FastaReader::open(&path).unwrap();
        let (_, seq) = reader.next_record().unwrap().unwrap();
        assert!(seq.is_empty());
        let (_, seq) = reader.next_record().unwrap().unwrap();
        assert_eq!(seq, b"ACG");
    }
}
