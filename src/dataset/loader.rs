use std::collections::{BTreeMap, VecDeque};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::dataset::config::LoaderConfig;
use crate::dataset::data::{collate, Batch};
use crate::dataset::vqa::VQADataset;
use crate::error::{Result, VQAError};

/// Batches a [`VQADataset`], optionally over several worker threads.
///
/// Each worker loads whole batches through its own forked dataset view, so region
/// features are read through one store handle per worker.
pub struct DataLoader {
    dataset: VQADataset,
    config: LoaderConfig,
}

impl DataLoader {
    pub fn new(dataset: &VQADataset, config: LoaderConfig) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(VQAError::Config("batch_size must be positive".to_string()));
        }
        Ok(DataLoader {
            dataset: dataset.fork(),
            config,
        })
    }

    pub fn num_batches(&self) -> usize {
        (self.dataset.len() + self.config.batch_size - 1) / self.config.batch_size
    }

    fn batch_indices(&self) -> Vec<Vec<usize>> {
        let mut indices: Vec<usize> = (0..self.dataset.len()).collect();
        if self.config.shuffle {
            let mut rng = match self.config.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            indices.shuffle(&mut rng);
        }
        indices.chunks(self.config.batch_size).map(<[usize]>::to_vec).collect()
    }

    pub fn iter(&self) -> BatchIter {
        let jobs = self.batch_indices();
        if self.config.num_workers == 0 {
            return BatchIter::Inline {
                dataset: self.dataset.fork(),
                jobs: jobs.into(),
            };
        }

        let total = jobs.len();
        let window = self.config.num_workers * self.config.prefetch_factor.max(1);
        let (job_tx, job_rx) = bounded::<(usize, Vec<usize>)>(window);
        let (result_tx, result_rx) = bounded(window);

        let workers = (0..self.config.num_workers.min(total.max(1)))
            .map(|worker| {
                let dataset = self.dataset.fork();
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                thread::Builder::new()
                    .name(format!("vqa-loader-{}", worker))
                    .spawn(move || {
                        for (batch_no, indices) in job_rx.iter() {
                            let batch = load_batch(&dataset, &indices);
                            if result_tx.send((batch_no, batch)).is_err() {
                                break;
                            }
                        }
                    })
            })
            .collect::<std::io::Result<Vec<_>>>();

        match workers {
            Ok(workers) => {
                let mut iter = BatchIter::Workers {
                    queued: jobs.into_iter().enumerate().collect(),
                    job_tx: Some(job_tx),
                    results: result_rx,
                    pending: BTreeMap::new(),
                    next: 0,
                    total,
                    workers,
                };
                for _ in 0..window {
                    iter.dispatch();
                }
                iter
            }
            Err(e) => BatchIter::Failed(Some(VQAError::io("loader worker", e))),
        }
    }
}

fn load_batch(dataset: &VQADataset, indices: &[usize]) -> Result<Batch> {
    let samples = indices
        .iter()
        .map(|&i| dataset.get(i))
        .collect::<Result<Vec<_>>>()?;
    collate(samples)
}

/// Yields batches in the order their indices were drawn.
///
/// With workers, a job is handed out only when an earlier batch is taken, so at
/// most `num_workers * prefetch_factor` batches are loading or waiting at a time.
pub enum BatchIter {
    Inline {
        dataset: VQADataset,
        jobs: VecDeque<Vec<usize>>,
    },
    Workers {
        queued: VecDeque<(usize, Vec<usize>)>,
        job_tx: Option<Sender<(usize, Vec<usize>)>>,
        results: Receiver<(usize, Result<Batch>)>,
        pending: BTreeMap<usize, Result<Batch>>,
        next: usize,
        total: usize,
        workers: Vec<JoinHandle<()>>,
    },
    Failed(Option<VQAError>),
}

impl BatchIter {
    // Hands the next queued job to the workers; the sender is closed once the
    // queue is empty so idle workers exit.
    fn dispatch(&mut self) {
        if let BatchIter::Workers { queued, job_tx, .. } = self {
            if let (Some(job), Some(tx)) = (queued.pop_front(), job_tx.as_ref()) {
                // never blocks: at most `window` jobs are outstanding
                if tx.send(job).is_err() {
                    queued.clear();
                }
            }
            if queued.is_empty() {
                job_tx.take();
            }
        }
    }

    /// Batches loaded or being loaded but not yet returned.
    pub fn in_flight(&self) -> usize {
        match self {
            BatchIter::Workers {
                queued,
                next,
                total,
                ..
            } => total - next - queued.len(),
            _ => 0,
        }
    }

    /// Loaded batches waiting to be returned.
    pub fn buffered(&self) -> usize {
        match self {
            BatchIter::Workers { results, pending, .. } => results.len() + pending.len(),
            _ => 0,
        }
    }
}

impl Iterator for BatchIter {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            BatchIter::Inline { dataset, jobs } => jobs.pop_front().map(|indices| load_batch(dataset, &indices)),
            BatchIter::Workers {
                results,
                pending,
                next,
                total,
                ..
            } => {
                if *next >= *total {
                    return None;
                }
                while !pending.contains_key(next) {
                    match results.recv() {
                        Ok((batch_no, batch)) => {
                            pending.insert(batch_no, batch);
                        }
                        Err(_) => {
                            *next = *total;
                            return Some(Err(VQAError::Config("loader workers exited early".to_string())));
                        }
                    }
                }
                let batch = pending.remove(next);
                *next += 1;
                self.dispatch();
                batch
            }
            BatchIter::Failed(err) => err.take().map(Err),
        }
    }
}

impl Drop for BatchIter {
    fn drop(&mut self) {
        if let BatchIter::Workers {
            queued,
            job_tx,
            results,
            workers,
            ..
        } = self
        {
            // Workers stop after their current batch once the job channel closes.
            queued.clear();
            job_tx.take();
            while results.try_recv().is_ok() {}
            for handle in workers.drain(..) {
                if handle.join().is_err() {
                    log::warn!("a loader worker panicked");
                }
            }
        }
    }
}
