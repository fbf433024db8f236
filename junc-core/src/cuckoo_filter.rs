// Cuckoo filter
// Approximate membership for 64-bit keys with 32-bit fingerprints.
// Lookups are lock-free over atomic slots; inserts serialise on an internal
// mutex so the eviction walk never races another writer.

use crate::error::JuncError;
use anyhow::{Context, Result};
use junc_common::MurMur64Hash;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

const SLOTS_PER_BUCKET: usize = 4;
const MAX_KICKS: usize = 500;
const EMPTY_SLOT: u32 = 0;

pub struct CuckooFilter {
    slots: Vec<AtomicU32>,
    bucket_mask: u64,
    len: AtomicU64,
    write_lock: Mutex<u64>, // eviction walk rng state
}

impl CuckooFilter {
    /// A filter sized for roughly `max_keys` insertions.
    pub fn new(max_keys: u64) -> Self {
        let buckets = ((max_keys + SLOTS_PER_BUCKET as u64 - 1) / SLOTS_PER_BUCKET as u64)
            .next_power_of_two()
            .max(1);
        let mut slots = Vec::with_capacity((buckets as usize) * SLOTS_PER_BUCKET);
        slots.resize_with((buckets as usize) * SLOTS_PER_BUCKET, || {
            AtomicU32::new(EMPTY_SLOT)
        });
        CuckooFilter {
            slots,
            bucket_mask: buckets - 1,
            len: AtomicU64::new(0),
            write_lock: Mutex::new(0x853c49e6748fea9b),
        }
    }

    #[inline]
    fn fingerprint(key: u64) -> u32 {
        let fp = (MurMur64Hash::hash(key) >> 32) as u32;
        if fp == EMPTY_SLOT {
            1
        } else {
            fp
        }
    }

    #[inline]
    fn index(&self, key: u64) -> u64 {
        MurMur64Hash::hash(key) & self.bucket_mask
    }

    #[inline]
    fn alt_index(&self, index: u64, fp: u32) -> u64 {
        (index ^ MurMur64Hash::hash(fp as u64)) & self.bucket_mask
    }

    #[inline]
    fn bucket(&self, index: u64) -> &[AtomicU32] {
        let start = index as usize * SLOTS_PER_BUCKET;
        &self.slots[start..start + SLOTS_PER_BUCKET]
    }

    /// True if `key` may be in the set; never false for an inserted key.
    pub fn contains(&self, key: u64) -> bool {
        let fp = Self::fingerprint(key);
        let i1 = self.index(key);
        let i2 = self.alt_index(i1, fp);
        self.bucket(i1)
            .iter()
            .chain(self.bucket(i2).iter())
            .any(|slot| slot.load(Ordering::Relaxed) == fp)
    }

    /// Insert `key`. Fails with `FilterOverflow` when the eviction walk
    /// exhausts `MAX_KICKS`; the filter was sized too small for its round.
    pub fn add(&self, key: u64) -> Result<(), JuncError> {
        let mut rng = self.write_lock.lock().unwrap();

        let mut fp = Self::fingerprint(key);
        let i1 = self.index(key);
        let i2 = self.alt_index(i1, fp);
        for index in [i1, i2] {
            if self.try_place(index, fp) {
                self.len.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
        }

        // Both buckets full: random-walk eviction.
        let mut index = if xorshift(&mut rng) & 1 == 0 { i1 } else { i2 };
        for _ in 0..MAX_KICKS {
            let victim = (xorshift(&mut rng) as usize) % SLOTS_PER_BUCKET;
            let slot = &self.bucket(index)[victim];
            let displaced = slot.swap(fp, Ordering::Relaxed);
            fp = displaced;
            index = self.alt_index(index, fp);
            if self.try_place(index, fp) {
                self.len.fetch_add(1, Ordering::Relaxed);
                return Ok(());
            }
        }

        Err(JuncError::FilterOverflow)
    }

    fn try_place(&self, index: u64, fp: u32) -> bool {
        for slot in self.bucket(index) {
            if slot.load(Ordering::Relaxed) == EMPTY_SLOT {
                slot.store(fp, Ordering::Relaxed);
                return true;
            }
        }
        false
    }

    /// Number of successful insertions.
    pub fn len(&self) -> u64 {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path.as_ref())
            .with_context(|| format!("can't create {:?}", path.as_ref()))?;
        let mut out = BufWriter::new(file);
        out.write_all(&(self.bucket_mask + 1).to_le_bytes())?;
        out.write_all(&self.len().to_le_bytes())?;
        for slot in &self.slots {
            out.write_all(&slot.load(Ordering::Relaxed).to_le_bytes())?;
        }
        out.flush().context("can't write the cuckoo filter")
    }

    /// Reload a filter written by `write_to_file`. With `partial`, a missing
    /// file yields an empty filter instead of an error.
    pub fn read_from_file<P: AsRef<Path>>(path: P, partial: bool) -> Result<Self> {
        let file = match File::open(path.as_ref()) {
            Ok(f) => f,
            Err(e) if partial && e.kind() == ErrorKind::NotFound => {
                return Ok(CuckooFilter::new(1));
            }
            Err(e) => {
                return Err(e).with_context(|| format!("can't open {:?}", path.as_ref()));
            }
        };

        let mut input = BufReader::new(file);
        let mut word = [0u8; 8];
        input.read_exact(&mut word)?;
        let buckets = u64::from_le_bytes(word);
        input.read_exact(&mut word)?;
        let len = u64::from_le_bytes(word);

        let filter = CuckooFilter::new(buckets * SLOTS_PER_BUCKET as u64);
        let mut slot_buf = [0u8; 4];
        for slot in &filter.slots {
            input.read_exact(&mut slot_buf)?;
            slot.store(u32::from_le_bytes(slot_buf), Ordering::Relaxed);
        }
        filter.len.store(len, Ordering::Relaxed);
        Ok(filter)
    }
}

#[inline]
fn xorshift(state: &mut u64) -> u64 {
    let mut x = *state;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    *state = x;
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_false_negatives() {
        let filter = CuckooFilter::new(10_000);
        for key in 0..5_000u64 {
            filter.add(key.wrapping_mul(0x9e3779b97f4a7c15)).unwrap();
        }
        for key in 0..5_000u64 {
            assert!(filter.contains(key.wrapping_mul(0x9e3779b97f4a7c15)));
        }
    }

    #[test]
    fn test_mostly_rejects_absent_keys() {
        let filter = CuckooFilter::new(1 << 16);
        for key in 0..10_000u64 {
            filter.add(key).unwrap();
        }
        let false_positives = (1_000_000u64..1_010_000)
            .filter(|&key| filter.contains(key))
            .count();
        // 32-bit fingerprints: false positives should be vanishingly rare.
        assert!(false_positives < 10, "fp = {false_positives}");
    }

    #[test]
    fn test_overflow_is_reported() {
        let filter = CuckooFilter::new(4);
        let mut result = Ok(());
        for key in 0..10_000u64 {
            result = filter.add(key);
            if result.is_err() {
                break;
            }
        }
        assert!(matches!(result, Err(JuncError::FilterOverflow)));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edges.cf");
        let filter = CuckooFilter::new(1 << 12);
        for key in 0..1000u64 {
            filter.add(key * 7 + 1).unwrap();
        }
        filter.write_to_file(&path).unwrap();

        let back = CuckooFilter::read_from_file(&path, false).unwrap();
        assert_eq!(back.len(), filter.len());
        for key in 0..1000u64 {
            assert!(back.contains(key * 7 + 1));
        }
    }

    #[test]
    fn test_partial_read_of_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.cf");
        let filter = CuckooFilter::read_from_file(&missing, true).unwrap();
        assert!(filter.is_empty());
        assert!(CuckooFilter::read_from_file(&missing, false).is_err());
    }
}
