// Candidate occurrences
// One record per distinct candidate k-mer of the current round, keyed by the
// canonical packed form. The bifurcation flag is monotone false -> true and
// flips when two occurrences of the same k-mer disagree about their
// neighbourhood.

use crate::dna_string::DnaString;
use dashmap::DashMap;
use junc_common::dna;

/// A single observed occurrence of a candidate k-mer, already canonicalised:
/// when the reverse strand is the canonical one, prev/next swap roles and
/// complement.
#[derive(Debug, Clone)]
pub struct Occurrence {
    base: DnaString,
    hash_pos: u64,
    hash_neg: u64,
    prev: u8,
    next: u8,
}

impl Occurrence {
    pub fn new(hash_pos: u64, hash_neg: u64, window: &[u8], prev: u8, next: u8) -> Self {
        let packed = DnaString::from_bytes(window);
        let (base, reversed) = packed.canonical_form();
        if reversed {
            Occurrence {
                base,
                hash_pos: hash_neg,
                hash_neg: hash_pos,
                prev: dna::complement(next),
                next: dna::complement(prev),
            }
        } else {
            Occurrence {
                base,
                hash_pos,
                hash_neg,
                prev,
                next,
            }
        }
    }

    pub fn base(&self) -> &DnaString {
        &self.base
    }

    /// Raw positive-strand hash, relative to the canonical orientation.
    pub fn hash_pos(&self) -> u64 {
        self.hash_pos
    }

    /// Raw negative-strand hash, relative to the canonical orientation.
    pub fn hash_neg(&self) -> u64 {
        self.hash_neg
    }

    pub fn prev(&self) -> u8 {
        self.prev
    }

    pub fn next(&self) -> u8 {
        self.next
    }
}

#[derive(Debug)]
struct OccurrenceInfo {
    prev: u8,
    next: u8,
    is_bifurcation: bool,
}

/// Concurrent set of the round's candidate occurrences. Insertion merges
/// under the map shard's guard, so the flag flip is an atomic
/// read-modify-write rather than a racy store.
pub struct OccurrenceSet {
    map: DashMap<DnaString, OccurrenceInfo, ahash::RandomState>,
}

impl OccurrenceSet {
    pub fn new(capacity: usize) -> Self {
        OccurrenceSet {
            map: DashMap::with_capacity_and_hasher(capacity, ahash::RandomState::new()),
        }
    }

    /// Record one occurrence. A first sighting stores the record; a repeat
    /// sighting of a non-bifurcation compares neighbourhoods and flips the
    /// flag when the k-mer cannot lie inside a single non-branching path.
    pub fn insert(&self, occurrence: Occurrence) {
        use dashmap::mapref::entry::Entry;

        match self.map.entry(occurrence.base) {
            Entry::Vacant(slot) => {
                slot.insert(OccurrenceInfo {
                    prev: occurrence.prev,
                    next: occurrence.next,
                    is_bifurcation: false,
                });
            }
            Entry::Occupied(mut slot) => {
                let info = slot.get_mut();
                if info.is_bifurcation {
                    return;
                }

                let mut in_unknown = usize::from(!dna::is_definite(occurrence.prev));
                let mut out_unknown = usize::from(!dna::is_definite(occurrence.next));
                in_unknown += usize::from(!dna::is_definite(info.prev));
                out_unknown += usize::from(!dna::is_definite(info.next));
                if info.next != occurrence.next
                    || info.prev != occurrence.prev
                    || in_unknown > 1
                    || out_unknown > 1
                {
                    info.is_bifurcation = true;
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Visit every record as `(base, is_bifurcation)`. Call after the worker
    /// pool has joined.
    pub fn for_each<F: FnMut(&DnaString, bool)>(&self, mut visit: F) {
        for entry in self.map.iter() {
            visit(entry.key(), entry.value().is_bifurcation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bifurcations(set: &OccurrenceSet) -> usize {
        let mut n = 0;
        set.for_each(|_, bif| n += usize::from(bif));
        n
    }

    #[test]
    fn test_single_occurrence_is_not_a_bifurcation() {
        let set = OccurrenceSet::new(16);
        set.insert(Occurrence::new(1, 2, b"ACG", b'T', b'C'));
        assert_eq!(set.len(), 1);
        assert_eq!(bifurcations(&set), 0);
    }

    #[test]
    fn test_identical_context_stays_clean() {
        let set = OccurrenceSet::new(16);
        set.insert(Occurrence::new(1, 2, b"ACG", b'T', b'C'));
        set.insert(Occurrence::new(1, 2, b"ACG", b'T', b'C'));
        assert_eq!(set.len(), 1);
        assert_eq!(bifurcations(&set), 0);
    }

    #[test]
    fn test_differing_prev_flips_the_flag() {
        let set = OccurrenceSet::new(16);
        set.insert(Occurrence::new(1, 2, b"AAA", b'A', b'A'));
        set.insert(Occurrence::new(1, 2, b"AAA", b'C', b'A'));
        assert_eq!(bifurcations(&set), 1);
    }

    #[test]
    fn test_reverse_strand_swaps_hashes_and_context() {
        // CGT canonicalises to ACG, so the strand hashes and the flanking
        // bases swap and complement.
        let occ = Occurrence::new(10, 20, b"CGT", b'G', b'A');
        assert_eq!(occ.base().to_string(), "ACG");
        assert_eq!(occ.hash_pos(), 20);
        assert_eq!(occ.hash_neg(), 10);
        assert_eq!(occ.prev(), b'T');
        assert_eq!(occ.next(), b'C');
    }

    #[test]
    fn test_reverse_strand_occurrence_merges() {
        // CGT's reverse complement is ACG; both occurrences describe the
        // same canonical vertex with a consistent neighbourhood:
        // T·ACG·C  ==  revcomp(G·CGT·A).
        let set = OccurrenceSet::new(16);
        set.insert(Occurrence::new(1, 2, b"ACG", b'T', b'C'));
        set.insert(Occurrence::new(2, 1, b"CGT", b'G', b'A'));
        assert_eq!(set.len(), 1);
        assert_eq!(bifurcations(&set), 0);
    }

    #[test]
    fn test_two_unknown_neighbours_force_a_bifurcation() {
        // Two distinct occurrences next to 'N' cannot be collapsed.
        let set = OccurrenceSet::new(16);
        set.insert(Occurrence::new(1, 2, b"AAC", b'N', b'G'));
        set.insert(Occurrence::new(1, 2, b"AAC", b'N', b'G'));
        assert_eq!(bifurcations(&set), 1);
    }
}
