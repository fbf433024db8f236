// junc core library
// Memory-bounded, multi-threaded enumeration of compacted de Bruijn graph
// junctions: canonical k-mer codec, rolling hashes, cuckoo filters, the
// chunked task pipeline, the two-pass per-round enumerator, and the sealed
// bifurcation index.

pub mod bifurcation_storage;
pub mod bit_vector;
pub mod candidate_mask;
pub mod cuckoo_filter;
pub mod dna_string;
pub mod enumerator;
pub mod error;
pub mod genome_io;
pub mod occurrence;
pub mod pipeline;
pub mod rolling_hash;
pub mod rounds;
pub mod task;

// Re-export commonly used types
pub use bifurcation_storage::{BifurcationStorage, INVALID_VERTEX};
pub use bit_vector::ConcurrentBitVector;
pub use candidate_mask::CandidateMask;
pub use cuckoo_filter::CuckooFilter;
pub use dna_string::{canonical_edge_key, DnaString, MAX_CAPACITY_BASES};
pub use enumerator::{EnumeratorConfig, VertexEnumerator};
pub use error::JuncError;
pub use genome_io::FastaReader;
pub use occurrence::{Occurrence, OccurrenceSet};
pub use pipeline::{distribute_tasks, task_queues, ErrorSlot};
pub use rolling_hash::{RollingHash, RollingHashSeed};
pub use rounds::RoundPlanner;
pub use task::{Task, GAME_OVER, QUEUE_CAPACITY, TASK_SIZE};
