// Junction enumeration
// Per round: fill the edge cuckoo filter, mark per-position candidates,
// confirm candidates into the occurrence set, write out bifurcations. After
// all rounds the bifurcation index is sealed and a final pass re-reads the
// input and emits junction positions in piece order.

use crate::bifurcation_storage::{BifurcationStorage, INVALID_VERTEX};
use crate::bit_vector::ConcurrentBitVector;
use crate::candidate_mask::{mask_file_name, CandidateMask};
use crate::cuckoo_filter::CuckooFilter;
use crate::dna_string::{canonical_edge_key, MAX_CAPACITY_BASES};
use crate::error::JuncError;
use crate::occurrence::{Occurrence, OccurrenceSet};
use crate::pipeline::{distribute_tasks, pop_task, task_queues, ErrorSlot, TaskReceiver};
use crate::rolling_hash::{RollingHash, RollingHashSeed};
use crate::rounds::{RoundPlanner, RoundRange};
use crate::task::Task;
use anyhow::{Context, Result};
use junc_common::dna;
use junc_common::{JunctionPosition, JunctionPositionWriter};
use log::info;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Instant;

/// Sentinel base pair standing in for an undefined neighbour: a k-mer next
/// to an `N` or a sequence boundary gets dummy edges on that side, which
/// forces it over the degree threshold.
const DUMMY_CHAR: u8 = b'A';
const REV_DUMMY_CHAR: u8 = b'T';

/// Offset of the first stub vertex id above the true junction count. Kept
/// verbatim for downstream consumers.
const STUB_VERTEX_OFFSET: u64 = 42;

#[derive(Debug, Clone)]
pub struct EnumeratorConfig {
    pub input: Vec<PathBuf>,
    pub k: usize,
    pub filter_bits: u32,
    pub hash_functions: usize,
    pub rounds: usize,
    pub threads: usize,
    pub tmp_dir: PathBuf,
    pub output: PathBuf,
}

impl Default for EnumeratorConfig {
    fn default() -> Self {
        EnumeratorConfig {
            input: Vec::new(),
            k: 25,
            filter_bits: 34,
            hash_functions: 5,
            rounds: 1,
            threads: num_cpus::get(),
            tmp_dir: PathBuf::from("."),
            output: PathBuf::from("junctions.bin"),
        }
    }
}

impl EnumeratorConfig {
    pub fn validate(&self) -> Result<(), JuncError> {
        if self.input.is_empty() {
            return Err(JuncError::Config("no input files".into()));
        }
        if self.k < 2 || self.k + 1 > MAX_CAPACITY_BASES {
            return Err(JuncError::Config(format!(
                "k must be between 2 and {}",
                MAX_CAPACITY_BASES - 1
            )));
        }
        if self.filter_bits == 0 || self.filter_bits > 40 {
            return Err(JuncError::Config(
                "filter bits must be between 1 and 40".into(),
            ));
        }
        if self.threads == 0 {
            return Err(JuncError::Config("at least one thread is required".into()));
        }
        if self.rounds == 0 {
            return Err(JuncError::Config("at least one round is required".into()));
        }
        if self.hash_functions == 0 {
            return Err(JuncError::Config(
                "at least one hash function is required".into(),
            ));
        }
        Ok(())
    }
}

/// The sealed result of an enumeration run: the junction index plus the
/// reloadable edge-digest filter dump.
pub struct VertexEnumerator {
    storage: BifurcationStorage,
    seed: RollingHashSeed,
    filter_dump: PathBuf,
}

impl VertexEnumerator {
    /// Run the whole pipeline and emit the junction position stream to
    /// `config.output`.
    pub fn enumerate(config: &EnumeratorConfig) -> Result<Self> {
        config.validate()?;
        let k = config.k;
        let overlap = k + 1;
        let real_size = 1u64 << config.filter_bits;
        let seed = RollingHashSeed::new(config.hash_functions, k, config.filter_bits);

        info!("threads = {}", config.threads);
        info!("vertex length = {}", k);
        info!("hash functions = {}", config.hash_functions);
        info!("filter size = {}", real_size);
        for file in &config.input {
            info!("input: {}", file.display());
        }

        let (senders, receivers) = task_queues(config.threads);
        let errors = ErrorSlot::new();

        // Round planning: one preparatory pass over the input when the
        // occurrence set has to be split.
        let ranges: Vec<RoundRange> = if config.rounds > 1 {
            info!("splitting the input k-mer set...");
            let planner = RoundPlanner::new(config.filter_bits);
            let dedup_filter = CuckooFilter::new(real_size + 1);
            thread::scope(|scope| {
                for receiver in &receivers {
                    let receiver = receiver.clone();
                    let errors = errors.clone();
                    let planner = &planner;
                    let dedup_filter = &dedup_filter;
                    let seed = &seed;
                    scope.spawn(move || {
                        initial_filter_filler(receiver, k, seed, dedup_filter, planner, errors)
                    });
                }
                distribute_tasks(&config.input, overlap, &senders, &errors);
            });
            raise_if_failed(&errors)?;
            planner.plan(config.rounds)
        } else {
            vec![(0, real_size)]
        };

        // Union of in-range edge-endpoint digests across all rounds,
        // dumped for `reload_filter`.
        let digest_dump = ConcurrentBitVector::new(real_size);

        let bifurcation_path = config.tmp_dir.join("bifurcations.bin");
        let bifurcation_file = File::create(&bifurcation_path)
            .with_context(|| format!("can't create a temp file in {:?}", config.tmp_dir))?;
        let mut bifurcation_writer = BufWriter::new(bifurcation_file);

        let mut vertices_count = 0u64;
        let mut total_false_positives = 0u64;

        for (round, &(low, high)) in ranges.iter().enumerate() {
            info!("round {}, {}:{}", round, low, high);
            let mut mark = Instant::now();

            let edge_filter = CuckooFilter::new(real_size);
            thread::scope(|scope| {
                for receiver in &receivers {
                    let receiver = receiver.clone();
                    let errors = errors.clone();
                    let edge_filter = &edge_filter;
                    let digest_dump = &digest_dump;
                    let seed = &seed;
                    scope.spawn(move || {
                        filter_filler(
                            receiver,
                            k,
                            seed,
                            edge_filter,
                            digest_dump,
                            low,
                            high,
                            errors,
                        )
                    });
                }
                distribute_tasks(&config.input, overlap, &senders, &errors);
            });
            raise_if_failed(&errors)?;
            info!(
                "pass 1: filling {:.1}s ({} edges)",
                mark.elapsed().as_secs_f64(),
                edge_filter.len()
            );

            mark = Instant::now();
            let marks_count = AtomicU64::new(0);
            thread::scope(|scope| {
                for receiver in &receivers {
                    let receiver = receiver.clone();
                    let errors = errors.clone();
                    let edge_filter = &edge_filter;
                    let marks_count = &marks_count;
                    let seed = &seed;
                    let tmp_dir = config.tmp_dir.as_path();
                    scope.spawn(move || {
                        candidate_checker(
                            receiver,
                            k,
                            seed,
                            edge_filter,
                            tmp_dir,
                            marks_count,
                            round,
                            low,
                            high,
                            errors,
                        )
                    });
                }
                distribute_tasks(&config.input, overlap, &senders, &errors);
            });
            raise_if_failed(&errors)?;
            info!("pass 1: filtering {:.1}s", mark.elapsed().as_secs_f64());

            mark = Instant::now();
            let occurrence_set = OccurrenceSet::new(1 << 20);
            thread::scope(|scope| {
                for receiver in &receivers {
                    let receiver = receiver.clone();
                    let errors = errors.clone();
                    let occurrence_set = &occurrence_set;
                    let seed = &seed;
                    let tmp_dir = config.tmp_dir.as_path();
                    scope.spawn(move || {
                        final_filter(receiver, k, seed, occurrence_set, tmp_dir, round, errors)
                    });
                }
                distribute_tasks(&config.input, overlap, &senders, &errors);
            });
            raise_if_failed(&errors)?;
            info!("pass 2: {:.1}s", mark.elapsed().as_secs_f64());

            let mut true_positives = 0u64;
            let mut false_positives = 0u64;
            let mut write_result = Ok(());
            occurrence_set.for_each(|base, is_bifurcation| {
                if write_result.is_err() {
                    return;
                }
                if is_bifurcation {
                    true_positives += 1;
                    write_result = base.write_to(&mut bifurcation_writer);
                } else {
                    false_positives += 1;
                }
            });
            write_result.context("can't write to the bifurcation temp file")?;

            info!("true junctions count = {}", true_positives);
            info!("false junctions count = {}", false_positives);
            info!("hash table size = {}", occurrence_set.len());
            info!("candidate marks count = {}", marks_count.load(Ordering::Relaxed));
            vertices_count += true_positives;
            total_false_positives += false_positives;
        }

        bifurcation_writer
            .flush()
            .context("can't write to the bifurcation temp file")?;
        drop(bifurcation_writer);
        info!(
            "total: {} junctions, {} false positives",
            vertices_count, total_false_positives
        );

        let mark = Instant::now();
        let storage = {
            let file = File::open(&bifurcation_path).context("can't open the temp file")?;
            let mut reader = BufReader::new(file);
            BifurcationStorage::init(&mut reader, vertices_count, k, config.threads)?
        };
        std::fs::remove_file(&bifurcation_path).ok();
        info!(
            "reallocating bifurcations: {:.1}s",
            mark.elapsed().as_secs_f64()
        );

        let filter_dump = config.tmp_dir.join("filter.bin");
        digest_dump.write_to_file(&filter_dump)?;

        // Final pass: emit ordered junction positions.
        let mark = Instant::now();
        let writer = Mutex::new(JunctionPositionWriter::create(&config.output)?);
        let current_piece = AtomicU64::new(0);
        let emitted = AtomicU64::new(0);
        let stub_vertex_id = Mutex::new(vertices_count + STUB_VERTEX_OFFSET);
        thread::scope(|scope| {
            for receiver in &receivers {
                let receiver = receiver.clone();
                let errors = errors.clone();
                let storage = &storage;
                let writer = &writer;
                let current_piece = &current_piece;
                let emitted = &emitted;
                let stub_vertex_id = &stub_vertex_id;
                let tmp_dir = config.tmp_dir.as_path();
                let rounds = ranges.len();
                scope.spawn(move || {
                    edge_constructor(
                        receiver,
                        k,
                        storage,
                        writer,
                        current_piece,
                        emitted,
                        stub_vertex_id,
                        tmp_dir,
                        rounds,
                        errors,
                    )
                });
            }
            distribute_tasks(&config.input, overlap, &senders, &errors);
        });
        raise_if_failed(&errors)?;
        writer
            .into_inner()
            .map_err(|_| JuncError::Internal("poisoned output writer".into()))?
            .finish()?;
        info!(
            "edges construction: {:.1}s, {} positions",
            mark.elapsed().as_secs_f64(),
            emitted.load(Ordering::Relaxed)
        );

        remove_mask_files(&config.tmp_dir, ranges.len());

        Ok(VertexEnumerator {
            storage,
            seed,
            filter_dump,
        })
    }

    pub fn vertices_count(&self) -> u64 {
        self.storage.distinct_vertices_count()
    }

    /// Junction id of a vertex given as text, or `INVALID_VERTEX`.
    pub fn get_id(&self, vertex: &str) -> i64 {
        self.storage.get_id(vertex)
    }

    pub fn hash_seed(&self) -> &RollingHashSeed {
        &self.seed
    }

    /// Reload the dumped edge-digest filter.
    pub fn reload_filter(&self) -> Result<ConcurrentBitVector> {
        ConcurrentBitVector::read_from_file(&self.filter_dump)
    }
}

impl Drop for VertexEnumerator {
    fn drop(&mut self) {
        std::fs::remove_file(&self.filter_dump).ok();
    }
}

#[inline]
fn within(digest: u64, low: u64, high: u64) -> bool {
    digest >= low && digest <= high
}

fn raise_if_failed(errors: &ErrorSlot) -> Result<()> {
    match errors.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Run `process` for every task until the sentinel; after the first failure
/// the worker keeps draining so the producer and its siblings never stall.
fn drive_worker<F: FnMut(&Task) -> Result<()>>(
    receiver: TaskReceiver,
    errors: &ErrorSlot,
    mut process: F,
) {
    let mut failed = false;
    loop {
        let task = pop_task(&receiver);
        if task.is_game_over() {
            break;
        }
        if failed || errors.is_set() {
            continue;
        }
        if let Err(e) = process(&task) {
            errors.report(e);
            failed = true;
        }
    }
}

/// Preparatory pass: count each distinct definite edge into the round
/// planner's bin histogram.
fn initial_filter_filler(
    receiver: TaskReceiver,
    k: usize,
    seed: &RollingHashSeed,
    dedup_filter: &CuckooFilter,
    planner: &RoundPlanner,
    errors: ErrorSlot,
) {
    drive_worker(receiver, &errors, |task| {
        let buf = &task.buf;
        let n = buf.len();
        if n < k + 2 {
            return Ok(());
        }

        let mut definite = buf[..k].iter().filter(|&&c| dna::is_definite(c)).count();
        let mut prefix_hash = RollingHash::new(seed, &buf[..k]);
        let mut suffix_hash = RollingHash::new(seed, &buf[1..k + 1]);
        let mut pos = 0usize;
        loop {
            let next_ch = buf[pos + k];
            if definite == k && dna::is_definite(next_ch) {
                let key = canonical_edge_key(&buf[pos..pos + k + 1]);
                if !dedup_filter.contains(key) {
                    dedup_filter.add(key)?;
                    planner.count_edge(prefix_hash.digest(), suffix_hash.digest());
                }
            }

            if pos + k + 1 < n {
                definite += usize::from(dna::is_definite(buf[pos + k]));
                definite -= usize::from(dna::is_definite(buf[pos]));
                prefix_hash.update(buf[pos], buf[pos + k]);
                suffix_hash.update(buf[pos + 1], buf[pos + k + 1]);
                pos += 1;
            } else {
                break;
            }
        }
        Ok(())
    });
}

/// Pass 1a: insert every in-range edge into the round's cuckoo filter, with
/// dummy edges standing in for undefined neighbours, and record the endpoint
/// digests in the reloadable bit vector.
#[allow(clippy::too_many_arguments)]
fn filter_filler(
    receiver: TaskReceiver,
    k: usize,
    seed: &RollingHashSeed,
    edge_filter: &CuckooFilter,
    digest_dump: &ConcurrentBitVector,
    low: u64,
    high: u64,
    errors: ErrorSlot,
) {
    let mut edge_buf: Vec<u8> = Vec::with_capacity(k + 1);
    let mut put = |key: u64| -> Result<(), JuncError> {
        if !edge_filter.contains(key) {
            edge_filter.add(key)?;
        }
        Ok(())
    };

    drive_worker(receiver, &errors, |task| {
        let buf = &task.buf;
        let n = buf.len();
        if n < k + 2 {
            return Ok(());
        }

        let mut definite = buf[..k].iter().filter(|&&c| dna::is_definite(c)).count();
        let mut prefix_hash = RollingHash::new(seed, &buf[..k]);
        let mut suffix_hash = RollingHash::new(seed, &buf[1..k + 1]);
        let mut pos = 0usize;
        loop {
            let next_ch = buf[pos + k];
            if definite == k {
                let vertex = &buf[pos..pos + k];
                let prefix_digest = prefix_hash.digest();
                if dna::is_definite(next_ch) {
                    let suffix_digest = suffix_hash.digest();
                    if within(prefix_digest, low, high) || within(suffix_digest, low, high) {
                        put(canonical_edge_key(&buf[pos..pos + k + 1]))?;
                        if within(prefix_digest, low, high) {
                            digest_dump.set(prefix_digest);
                        }
                        if within(suffix_digest, low, high) {
                            digest_dump.set(suffix_digest);
                        }
                    }
                } else if within(prefix_digest, low, high) {
                    for dummy in [DUMMY_CHAR, REV_DUMMY_CHAR] {
                        edge_buf.clear();
                        edge_buf.extend_from_slice(vertex);
                        edge_buf.push(dummy);
                        put(canonical_edge_key(&edge_buf))?;
                    }
                    digest_dump.set(prefix_digest);
                }

                if pos > 0 && !dna::is_definite(buf[pos - 1]) && within(prefix_digest, low, high) {
                    for dummy in [DUMMY_CHAR, REV_DUMMY_CHAR] {
                        edge_buf.clear();
                        edge_buf.push(dummy);
                        edge_buf.extend_from_slice(vertex);
                        put(canonical_edge_key(&edge_buf))?;
                    }
                    digest_dump.set(prefix_digest);
                }
            }

            if pos + k + 1 < n {
                definite += usize::from(dna::is_definite(buf[pos + k]));
                definite -= usize::from(dna::is_definite(buf[pos]));
                prefix_hash.update(buf[pos], buf[pos + k]);
                suffix_hash.update(buf[pos + 1], buf[pos + k + 1]);
                pos += 1;
            } else {
                break;
            }
        }
        Ok(())
    });
}

/// Pass 1b: probe the eight neighbour edges of every in-range definite
/// k-mer; positions with in- or out-degree above one go into the task's
/// candidate mask, persisted for pass 2.
#[allow(clippy::too_many_arguments)]
fn candidate_checker(
    receiver: TaskReceiver,
    k: usize,
    seed: &RollingHashSeed,
    edge_filter: &CuckooFilter,
    tmp_dir: &Path,
    marks_count: &AtomicU64,
    round: usize,
    low: u64,
    high: u64,
    errors: ErrorSlot,
) {
    let mut probe_buf: Vec<u8> = Vec::with_capacity(k + 1);

    drive_worker(receiver, &errors, |task| {
        let buf = &task.buf;
        let n = buf.len();
        if n < k + 2 {
            return Ok(());
        }

        let mut mask = CandidateMask::new(n);
        let mut definite = buf[1..k + 1].iter().filter(|&&c| dna::is_definite(c)).count();
        let mut hash = RollingHash::new(seed, &buf[1..k + 1]);
        let mut pos = 1usize;
        loop {
            let pos_prev = buf[pos - 1];
            let pos_extend = buf[pos + k];
            if definite == k && within(hash.digest(), low, high) {
                let vertex = &buf[pos..pos + k];
                let mut in_count = if dna::is_definite(pos_prev) { 0 } else { 2 };
                let mut out_count = if dna::is_definite(pos_extend) { 0 } else { 2 };
                for &ch in dna::LITERAL.iter() {
                    if in_count >= 2 || out_count >= 2 {
                        break;
                    }
                    probe_buf.clear();
                    probe_buf.push(ch);
                    probe_buf.extend_from_slice(vertex);
                    if ch == pos_prev || edge_filter.contains(canonical_edge_key(&probe_buf)) {
                        in_count += 1;
                    }

                    probe_buf.clear();
                    probe_buf.extend_from_slice(vertex);
                    probe_buf.push(ch);
                    if ch == pos_extend || edge_filter.contains(canonical_edge_key(&probe_buf)) {
                        out_count += 1;
                    }
                }

                if in_count > 1 || out_count > 1 {
                    marks_count.fetch_add(1, Ordering::Relaxed);
                    mask.set(pos);
                }
            }

            if pos + k + 1 < n {
                definite += usize::from(dna::is_definite(buf[pos + k]));
                definite -= usize::from(dna::is_definite(buf[pos]));
                hash.update(buf[pos], buf[pos + k]);
                pos += 1;
            } else {
                break;
            }
        }

        if !mask.is_empty() {
            mask.write_to_file(mask_file_name(tmp_dir, task.seq_id, task.start, round))?;
        }
        Ok(())
    });
}

/// Pass 2: reload the candidate mask and fold each marked position into the
/// shared occurrence set.
fn final_filter(
    receiver: TaskReceiver,
    k: usize,
    seed: &RollingHashSeed,
    occurrence_set: &OccurrenceSet,
    tmp_dir: &Path,
    round: usize,
    errors: ErrorSlot,
) {
    drive_worker(receiver, &errors, |task| {
        let buf = &task.buf;
        let n = buf.len();
        if n < k + 2 {
            return Ok(());
        }

        let mask_path = mask_file_name(tmp_dir, task.seq_id, task.start, round);
        let mask = match CandidateMask::read_from_file(&mask_path, true)? {
            Some(mask) => mask,
            None => return Ok(()), // the round produced no marks here
        };

        let mut hash = RollingHash::new(seed, &buf[1..k + 1]);
        let mut pos = 1usize;
        loop {
            if mask.test(pos) {
                occurrence_set.insert(Occurrence::new(
                    hash.raw_positive(0),
                    hash.raw_negative(0),
                    &buf[pos..pos + k],
                    buf[pos - 1],
                    buf[pos + k],
                ));
            }

            if pos + k + 1 < n {
                hash.update(buf[pos], buf[pos + k]);
                debug_assert!(hash.verify(&buf[pos + 1..pos + 1 + k]));
                pos += 1;
            } else {
                break;
            }
        }
        Ok(())
    });
}

struct EdgeResult {
    piece: u64,
    junctions: Vec<JunctionPosition>,
}

/// Flush the head of a worker's parked results when its piece is next in
/// the global order.
fn flush_edge_results(
    results: &mut VecDeque<EdgeResult>,
    writer: &Mutex<JunctionPositionWriter>,
    current_piece: &AtomicU64,
) -> Result<bool> {
    if let Some(front) = results.front() {
        if front.piece == current_piece.load(Ordering::SeqCst) {
            let mut out = writer.lock().unwrap();
            for junction in &front.junctions {
                out.write(*junction)?;
            }
            current_piece.fetch_add(1, Ordering::SeqCst);
            results.pop_front();
            return Ok(true);
        }
    }
    Ok(false)
}

/// Final pass: OR-merge the per-round masks, look up every candidate
/// position in the bifurcation storage, and emit positions serialised by
/// piece index. Sequence-terminal positions without a real junction receive
/// stub ids.
#[allow(clippy::too_many_arguments)]
fn edge_constructor(
    receiver: TaskReceiver,
    k: usize,
    storage: &BifurcationStorage,
    writer: &Mutex<JunctionPositionWriter>,
    current_piece: &AtomicU64,
    emitted: &AtomicU64,
    stub_vertex_id: &Mutex<u64>,
    tmp_dir: &Path,
    rounds: usize,
    errors: ErrorSlot,
) {
    let mut results: VecDeque<EdgeResult> = VecDeque::new();

    drive_worker(receiver, &errors, |task| {
        let buf = &task.buf;
        let n = buf.len();
        if n < k + 2 {
            return Ok(());
        }

        let mut mask = CandidateMask::new(n);
        for round in 0..rounds {
            let path = mask_file_name(tmp_dir, task.seq_id, task.start, round);
            if let Some(round_mask) = CandidateMask::read_from_file(&path, true)? {
                if round_mask.positions() != mask.positions() {
                    return Err(JuncError::Internal(format!(
                        "candidate mask size mismatch in {:?}",
                        path
                    ))
                    .into());
                }
                mask.or_assign(&round_mask);
            }
        }

        let mut current = EdgeResult {
            piece: task.piece,
            junctions: Vec::new(),
        };
        let mut definite = buf[1..k + 1].iter().filter(|&&c| dna::is_definite(c)).count();
        let mut pos = 1usize;
        loop {
            while flush_edge_results(&mut results, writer, current_piece)? {}

            let mut bif_id = INVALID_VERTEX;
            if definite == k && mask.test(pos) {
                bif_id = storage.get_id_of_window(&buf[pos..pos + k]);
                if bif_id != INVALID_VERTEX {
                    emitted.fetch_add(1, Ordering::Relaxed);
                    current.junctions.push(JunctionPosition::new(
                        task.seq_id as u32,
                        (task.start + pos as u64 - 1) as u32,
                        bif_id as u64,
                    ));
                }
            }

            let terminal = (task.start == 0 && pos == 1)
                || (task.is_final && pos == n - k - 1);
            if terminal && bif_id == INVALID_VERTEX {
                emitted.fetch_add(1, Ordering::Relaxed);
                let mut stub = stub_vertex_id.lock().unwrap();
                current.junctions.push(JunctionPosition::new(
                    task.seq_id as u32,
                    (task.start + pos as u64 - 1) as u32,
                    *stub,
                ));
                *stub += 1;
            }

            if pos + k + 1 < n {
                definite += usize::from(dna::is_definite(buf[pos + k]));
                definite -= usize::from(dna::is_definite(buf[pos]));
                pos += 1;
            } else {
                break;
            }
        }

        results.push_back(current);
        Ok(())
    });

    // Everything is parked; spin the remaining results out in piece order.
    while !results.is_empty() && !errors.is_set() {
        match flush_edge_results(&mut results, writer, current_piece) {
            Ok(true) => {}
            Ok(false) => thread::yield_now(),
            Err(e) => {
                errors.report(e);
                break;
            }
        }
    }
}

/// Remove the per-task candidate masks left in the temp directory.
fn remove_mask_files(tmp_dir: &Path, rounds: usize) {
    let entries = match std::fs::read_dir(tmp_dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(stem) = name.strip_suffix(".tmp") else { continue };
        let parts: Vec<&str> = stem.split('_').collect();
        let numeric = parts.len() == 3 && parts.iter().all(|p| p.parse::<u64>().is_ok());
        let round_in_range = parts
            .last()
            .and_then(|p| p.parse::<usize>().ok())
            .is_some_and(|r| r < rounds);
        if numeric && round_in_range {
            std::fs::remove_file(entry.path()).ok();
        }
    }
}
