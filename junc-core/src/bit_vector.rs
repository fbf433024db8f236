// Concurrent bit vector
// Fixed-size bit array with atomic set/test and a flat file dump

use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct ConcurrentBitVector {
    bits: Vec<AtomicU64>,
    size: u64,
}

impl ConcurrentBitVector {
    /// A zeroed bit vector holding `size` bits.
    pub fn new(size: u64) -> Self {
        let words = ((size + 63) / 64) as usize;
        let mut bits = Vec::with_capacity(words);
        bits.resize_with(words, || AtomicU64::new(0));
        ConcurrentBitVector { bits, size }
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Set bit `idx`. Idempotent; safe to race with other setters and
    /// testers.
    #[inline]
    pub fn set(&self, idx: u64) {
        debug_assert!(idx < self.size);
        self.bits[(idx / 64) as usize].fetch_or(1u64 << (idx % 64), Ordering::Relaxed);
    }

    #[inline]
    pub fn test(&self, idx: u64) -> bool {
        debug_assert!(idx < self.size);
        self.bits[(idx / 64) as usize].load(Ordering::Relaxed) & (1u64 << (idx % 64)) != 0
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())
            .with_context(|| format!("can't create {:?}", path.as_ref()))?;
        let mut out = BufWriter::new(file);
        out.write_all(&self.size.to_le_bytes())?;
        for word in &self.bits {
            out.write_all(&word.load(Ordering::Relaxed).to_le_bytes())?;
        }
        out.flush().context("can't write the bit vector dump")
    }

    pub fn read_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())
            .with_context(|| format!("can't open {:?}", path.as_ref()))?;
        let mut input = BufReader::new(file);
        let mut buf = [0u8; 8];
        input.read_exact(&mut buf)?;
        let size = u64::from_le_bytes(buf);
        if size == 0 {
            bail!("empty bit vector dump {:?}", path.as_ref());
        }
        let vector = ConcurrentBitVector::new(size);
        for word in &vector.bits {
            input.read_exact(&mut buf)?;
            word.store(u64::from_le_bytes(buf), Ordering::Relaxed);
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_test() {
        let v = ConcurrentBitVector::new(1000);
        assert!(!v.test(0));
        v.set(0);
        v.set(63);
        v.set(64);
        v.set(999);
        assert!(v.test(0) && v.test(63) && v.test(64) && v.test(999));
        assert!(!v.test(1) && !v.test(65));
        // idempotent
        v.set(64);
        assert!(v.test(64));
    }

    #[test]
    fn test_concurrent_set() {
        let v = std::sync::Arc::new(ConcurrentBitVector::new(4096));
        std::thread::scope(|scope| {
            for t in 0..4 {
                let v = std::sync::Arc::clone(&v);
                scope.spawn(move || {
                    for i in (t..4096).step_by(4) {
                        v.set(i as u64);
                    }
                });
            }
        });
        for i in 0..4096 {
            assert!(v.test(i));
        }
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filter.bin");
        let v = ConcurrentBitVector::new(300);
        for idx in [0, 1, 77, 128, 299] {
            v.set(idx);
        }
        v.write_to_file(&path).unwrap();
        let back = ConcurrentBitVector::read_from_file(&path).unwrap();
        assert_eq!(back.size(), 300);
        for idx in 0..300 {
            assert_eq!(back.test(idx), v.test(idx));
        }
    }
}
