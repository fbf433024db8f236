// Sequence-chunk producer
// A single producer streams every FASTA record, cuts overlapping buffers of
// up to TASK_SIZE, and hands them to per-worker bounded queues round-robin,
// skipping full queues. Each queue receives exactly one GAME_OVER sentinel.

use crate::genome_io::FastaReader;
use crate::task::{Task, QUEUE_CAPACITY, TASK_SIZE};
use anyhow::Result;
use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

pub type TaskSender = Sender<Task>;
pub type TaskReceiver = Receiver<Task>;

/// First-error-wins slot shared by the producer and all workers.
#[derive(Clone, Default)]
pub struct ErrorSlot {
    inner: Arc<Mutex<Option<anyhow::Error>>>,
}

impl ErrorSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error; later reports are dropped.
    pub fn report(&self, error: anyhow::Error) {
        let mut slot = self.inner.lock().unwrap();
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    pub fn is_set(&self) -> bool {
        self.inner.lock().unwrap().is_some()
    }

    /// Take the recorded error, leaving the slot empty.
    pub fn take(&self) -> Option<anyhow::Error> {
        self.inner.lock().unwrap().take()
    }
}

/// One bounded queue per worker.
pub fn task_queues(workers: usize) -> (Vec<TaskSender>, Vec<TaskReceiver>) {
    (0..workers).map(|_| bounded(QUEUE_CAPACITY)).unzip()
}

/// Read every record of every input file and distribute overlapping chunks.
/// All failures (the producer's own and those observed in the error slot)
/// leave the function early, but the sentinels are always delivered so
/// workers drain and exit. Errors travel through the slot, not the return
/// value.
pub fn distribute_tasks(
    files: &[PathBuf],
    overlap: usize,
    queues: &[TaskSender],
    errors: &ErrorSlot,
) {
    if let Err(e) = produce(files, overlap, queues, errors) {
        errors.report(e);
    }

    for queue in queues {
        // Workers are draining; a blocking send cannot stall forever.
        let _ = queue.send(Task::game_over());
    }
}

fn produce(
    files: &[PathBuf],
    overlap: usize,
    queues: &[TaskSender],
    errors: &ErrorSlot,
) -> Result<()> {
    let mut seq_id = 0u64;
    let mut piece = 0u64;
    let mut now_queue = 0usize;

    for path in files {
        let mut reader = FastaReader::open(path)?;
        while let Some((_, sequence)) = reader.next_record()? {
            if errors.is_set() {
                return Ok(());
            }

            let mut buf = vec![b'N'];
            let mut prev = 0u64;
            let mut start = 0u64;
            let mut bases = sequence.iter();
            loop {
                let next = bases.next();
                let over = next.is_none();
                if let Some(&ch) = next {
                    start += 1;
                    buf.push(ch);
                }

                if buf.len() >= overlap && (buf.len() == TASK_SIZE || over) {
                    let mut carry = Vec::new();
                    if over {
                        buf.push(b'N');
                    } else {
                        carry.extend_from_slice(&buf[buf.len() - overlap..]);
                    }

                    push_with_skip(
                        queues,
                        &mut now_queue,
                        Task::new(seq_id, prev, piece, over, std::mem::replace(&mut buf, carry)),
                    );
                    piece += 1;
                    if !over {
                        prev = start + 1 - overlap as u64;
                    }
                }

                if over {
                    break;
                }
            }

            seq_id += 1;
        }
    }

    Ok(())
}

/// Round-robin with skip: try the current queue, advance past full ones,
/// yield briefly when every queue is full.
fn push_with_skip(queues: &[TaskSender], now_queue: &mut usize, task: Task) {
    let mut task = task;
    loop {
        for _ in 0..queues.len() {
            let queue = &queues[*now_queue];
            *now_queue = (*now_queue + 1) % queues.len();
            match queue.try_send(task) {
                Ok(()) => return,
                Err(TrySendError::Full(t)) | Err(TrySendError::Disconnected(t)) => task = t,
            }
        }
        std::thread::yield_now();
    }
}

/// Non-blocking worker-side pop; `None` while the queue is momentarily
/// empty.
#[inline]
pub fn try_pop(queue: &TaskReceiver) -> Option<Task> {
    queue.try_recv().ok()
}

/// The next task, spinning with yields until one arrives. The stream always
/// terminates with GAME_OVER, so this cannot hang.
pub fn pop_task(queue: &TaskReceiver) -> Task {
    loop {
        match try_pop(queue) {
            Some(task) => return task,
            None => std::thread::yield_now(),
        }
    }
}
