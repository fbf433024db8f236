// Bifurcation storage
// Build-once mapping from canonical packed k-mer to a dense junction id,
// bulk-loaded in parallel from the serialised bifurcation list.

use crate::dna_string::DnaString;
use ahash::AHashMap;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::io::Read;

/// Id returned for k-mers that are not junctions.
pub const INVALID_VERTEX: i64 = -1;

#[derive(Default)]
pub struct BifurcationStorage {
    vertex_length: usize,
    ids: AHashMap<DnaString, u64>,
}

impl BifurcationStorage {
    /// Load `vertices_count` packed canonical k-mers and index them with
    /// dense ids `[0, vertices_count)` in file order.
    pub fn init<R: Read>(
        reader: &mut R,
        vertices_count: u64,
        vertex_length: usize,
        threads: usize,
    ) -> Result<Self> {
        let mut vertices = Vec::with_capacity(vertices_count as usize);
        for _ in 0..vertices_count {
            vertices.push(
                DnaString::read_from(reader, vertex_length)
                    .context("can't read the bifurcation temp file")?,
            );
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .context("can't build the indexing thread pool")?;

        let chunk = (vertices.len() / threads.max(1)).max(1);
        let ids = pool.install(|| {
            vertices
                .par_chunks(chunk)
                .enumerate()
                .map(|(chunk_index, chunk_vertices)| {
                    let base = (chunk_index * chunk) as u64;
                    chunk_vertices
                        .iter()
                        .enumerate()
                        .map(|(offset, vertex)| (vertex.clone(), base + offset as u64))
                        .collect::<AHashMap<_, _>>()
                })
                .reduce(AHashMap::new, |mut acc, part| {
                    acc.extend(part);
                    acc
                })
        });

        Ok(BifurcationStorage { vertex_length, ids })
    }

    /// Junction id of the k-mer starting at `window`, or `INVALID_VERTEX`.
    /// The lookup canonicalises the window first, so both strands resolve to
    /// the same id. Thread-safe: the index is read-only after `init`.
    pub fn get_id_of_window(&self, window: &[u8]) -> i64 {
        debug_assert_eq!(window.len(), self.vertex_length);
        let (canonical, _) = DnaString::from_bytes(window).canonical_form();
        match self.ids.get(&canonical) {
            Some(&id) => id as i64,
            None => INVALID_VERTEX,
        }
    }

    /// String-keyed lookup for external callers.
    pub fn get_id(&self, vertex: &str) -> i64 {
        if vertex.len() != self.vertex_length {
            return INVALID_VERTEX;
        }
        self.get_id_of_window(vertex.as_bytes())
    }

    pub fn distinct_vertices_count(&self) -> u64 {
        self.ids.len() as u64
    }

    pub fn vertex_length(&self) -> usize {
        self.vertex_length
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use junc_common::dna::reverse_complement;

    fn storage_of(kmers: &[&[u8]], k: usize) -> BifurcationStorage {
        let mut blob = Vec::new();
        for kmer in kmers {
            let (canonical, _) = DnaString::from_bytes(kmer).canonical_form();
            canonical.write_to(&mut blob).unwrap();
        }
        BifurcationStorage::init(&mut blob.as_slice(), kmers.len() as u64, k, 2).unwrap()
    }

    #[test]
    fn test_ids_are_dense_and_stable() {
        let storage = storage_of(&[b"ACGTA", b"TTTTT", b"GGGCC"], 5);
        assert_eq!(storage.distinct_vertices_count(), 3);
        let mut seen: Vec<i64> = [b"ACGTA".as_slice(), b"TTTTT", b"GGGCC"]
            .iter()
            .map(|w| storage.get_id_of_window(w))
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn test_both_strands_resolve() {
        let storage = storage_of(&[b"AACGT"], 5);
        let id = storage.get_id_of_window(b"AACGT");
        assert_ne!(id, INVALID_VERTEX);
        assert_eq!(storage.get_id_of_window(&reverse_complement(b"AACGT")), id);
    }

    #[test]
    fn test_absent_vertex_is_invalid() {
        let storage = storage_of(&[b"AAAAA"], 5);
        assert_eq!(storage.get_id_of_window(b"CCCCC"), INVALID_VERTEX);
        assert_eq!(storage.get_id("AAAA"), INVALID_VERTEX);
        assert_eq!(storage.get_id("AAAAA"), 0);
    }

    #[test]
    fn test_empty_storage() {
        let storage = storage_of(&[], 5);
        assert_eq!(storage.distinct_vertices_count(), 0);
        assert_eq!(storage.get_id_of_window(b"ACGTT"), INVALID_VERTEX);
    }
}
