// ─────────────────────────────────────────────────────────────────────
// Radial Plasma Kernel — Rank Context and Collectives
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Rank context and the collective primitives the kernel relies on.
//!
//! The kernel is agnostic to the underlying collective library: every
//! distributed component takes an opaque [`Communicator`] capability.
//! Backends: [`SelfComm`] for single-process runs, [`LocalCluster`]
//! for deterministic in-process multi-rank execution (one thread per
//! rank, used heavily by the test suite), and an rsmpi adapter behind
//! the `mpi` cargo feature.
//!
//! Collectives on one communicator are totally ordered across ranks.
//! A collective either completes on every rank or the program dies;
//! there is no partial-failure recovery.

use std::sync::{Arc, Barrier, Mutex};

/// Collective primitives over a fixed set of ranks.
///
/// `f64` payloads carry particle data and reductions; count payloads
/// carry exchange sizes and the splitter histogram. Reduction order is
/// backend-defined but must be identical across repeated calls on the
/// same backend, so a run is reproducible against itself.
pub trait Communicator {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    /// Rendezvous: returns only when every rank has arrived.
    fn barrier(&self);

    /// Sum of `value` over all ranks, same result on every rank.
    fn allreduce_sum(&self, value: f64) -> f64;

    /// Minimum of `value` over all ranks.
    fn allreduce_min(&self, value: f64) -> f64;

    /// Maximum of `value` over all ranks.
    fn allreduce_max(&self, value: f64) -> f64;

    /// Element-wise sum of a count vector over all ranks.
    fn allreduce_sum_counts(&self, local: &[u64]) -> Vec<u64>;

    /// Exclusive prefix sum: rank r receives the sum over ranks
    /// `[0, r)`; rank 0 receives 0.
    fn exscan_sum(&self, value: f64) -> f64;

    /// Each rank sends one count to every other; entry `i` of the
    /// result is the count rank `i` addressed to the caller.
    fn alltoall_counts(&self, send_counts: &[usize]) -> Vec<usize>;

    /// Variable-length exchange. `send` holds the segments for ranks
    /// `0..size` back to back, sized by `send_counts`; the result
    /// holds the received segments in source-rank order, sized by
    /// `recv_counts` (obtained from [`Communicator::alltoall_counts`]).
    fn alltoallv(&self, send: &[f64], send_counts: &[usize], recv_counts: &[usize]) -> Vec<f64>;

    /// Gather one count per rank, everywhere.
    fn allgather_count(&self, value: usize) -> Vec<usize>;

    /// Concatenate every rank's buffer in rank order, everywhere.
    fn allgatherv(&self, send: &[f64]) -> Vec<f64>;

    /// Gather one count per rank on rank 0; `None` elsewhere.
    fn gather_count_to_root(&self, value: usize) -> Option<Vec<usize>>;

    /// Concatenate every rank's buffer in rank order on rank 0;
    /// `None` elsewhere.
    fn gatherv_to_root(&self, send: &[f64]) -> Option<Vec<f64>>;
}

impl<C: Communicator> Communicator for &C {
    fn rank(&self) -> usize {
        (**self).rank()
    }

    fn size(&self) -> usize {
        (**self).size()
    }

    fn barrier(&self) {
        (**self).barrier()
    }

    fn allreduce_sum(&self, value: f64) -> f64 {
        (**self).allreduce_sum(value)
    }

    fn allreduce_min(&self, value: f64) -> f64 {
        (**self).allreduce_min(value)
    }

    fn allreduce_max(&self, value: f64) -> f64 {
        (**self).allreduce_max(value)
    }

    fn allreduce_sum_counts(&self, local: &[u64]) -> Vec<u64> {
        (**self).allreduce_sum_counts(local)
    }

    fn exscan_sum(&self, value: f64) -> f64 {
        (**self).exscan_sum(value)
    }

    fn alltoall_counts(&self, send_counts: &[usize]) -> Vec<usize> {
        (**self).alltoall_counts(send_counts)
    }

    fn alltoallv(&self, send: &[f64], send_counts: &[usize], recv_counts: &[usize]) -> Vec<f64> {
        (**self).alltoallv(send, send_counts, recv_counts)
    }

    fn allgather_count(&self, value: usize) -> Vec<usize> {
        (**self).allgather_count(value)
    }

    fn allgatherv(&self, send: &[f64]) -> Vec<f64> {
        (**self).allgatherv(send)
    }

    fn gather_count_to_root(&self, value: usize) -> Option<Vec<usize>> {
        (**self).gather_count_to_root(value)
    }

    fn gatherv_to_root(&self, send: &[f64]) -> Option<Vec<f64>> {
        (**self).gatherv_to_root(send)
    }
}

/// The degenerate single-rank communicator.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfComm;

impl Communicator for SelfComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn barrier(&self) {}

    fn allreduce_sum(&self, value: f64) -> f64 {
        value
    }

    fn allreduce_min(&self, value: f64) -> f64 {
        value
    }

    fn allreduce_max(&self, value: f64) -> f64 {
        value
    }

    fn allreduce_sum_counts(&self, local: &[u64]) -> Vec<u64> {
        local.to_vec()
    }

    fn exscan_sum(&self, _value: f64) -> f64 {
        0.0
    }

    fn alltoall_counts(&self, send_counts: &[usize]) -> Vec<usize> {
        send_counts.to_vec()
    }

    fn alltoallv(&self, send: &[f64], _send_counts: &[usize], _recv_counts: &[usize]) -> Vec<f64> {
        send.to_vec()
    }

    fn allgather_count(&self, value: usize) -> Vec<usize> {
        vec![value]
    }

    fn allgatherv(&self, send: &[f64]) -> Vec<f64> {
        send.to_vec()
    }

    fn gather_count_to_root(&self, value: usize) -> Option<Vec<usize>> {
        Some(vec![value])
    }

    fn gatherv_to_root(&self, send: &[f64]) -> Option<Vec<f64>> {
        Some(send.to_vec())
    }
}

/// Shared exchange board for the in-process cluster: one publication
/// slot per rank, fenced by a reusable barrier. Every collective is a
/// publish / fence / read / fence cycle, so slot reuse between
/// consecutive collectives cannot race.
struct ExchangeBoard {
    barrier: Barrier,
    floats: Mutex<Vec<Vec<f64>>>,
    counts: Mutex<Vec<Vec<u64>>>,
}

impl ExchangeBoard {
    fn new(size: usize) -> Self {
        ExchangeBoard {
            barrier: Barrier::new(size),
            floats: Mutex::new(vec![Vec::new(); size]),
            counts: Mutex::new(vec![Vec::new(); size]),
        }
    }
}

/// One rank of an in-process cluster. All inter-rank traffic goes
/// through the shared board; reductions walk ranks in ascending order,
/// so results are bit-identical between repeated runs.
pub struct LocalComm {
    rank: usize,
    size: usize,
    board: Arc<ExchangeBoard>,
}

/// Deterministic in-process multi-rank harness: spawns one thread per
/// rank and hands each a [`LocalComm`]. Results come back in rank
/// order.
pub struct LocalCluster;

impl LocalCluster {
    pub fn run<T, F>(size: usize, body: F) -> Vec<T>
    where
        T: Send,
        F: Fn(&LocalComm) -> T + Sync,
    {
        assert!(size >= 1, "cluster needs at least one rank");
        let board = Arc::new(ExchangeBoard::new(size));
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..size)
                .map(|rank| {
                    let comm = LocalComm {
                        rank,
                        size,
                        board: Arc::clone(&board),
                    };
                    let body = &body;
                    scope.spawn(move || body(&comm))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("rank thread panicked"))
                .collect()
        })
    }
}

impl LocalComm {
    fn publish_floats(&self, data: Vec<f64>) {
        self.board.floats.lock().expect("exchange board poisoned")[self.rank] = data;
    }

    fn publish_counts(&self, data: Vec<u64>) {
        self.board.counts.lock().expect("exchange board poisoned")[self.rank] = data;
    }

    /// Publish, fence, fold the board in rank order, fence again.
    fn reduce_floats<T>(&self, value: Vec<f64>, fold: impl FnOnce(&[Vec<f64>]) -> T) -> T {
        self.publish_floats(value);
        self.board.barrier.wait();
        let out = {
            let slots = self.board.floats.lock().expect("exchange board poisoned");
            fold(&slots)
        };
        self.board.barrier.wait();
        out
    }
}

impl Communicator for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn barrier(&self) {
        self.board.barrier.wait();
    }

    fn allreduce_sum(&self, value: f64) -> f64 {
        self.reduce_floats(vec![value], |slots| {
            slots.iter().fold(0.0, |acc, s| acc + s[0])
        })
    }

    fn allreduce_min(&self, value: f64) -> f64 {
        self.reduce_floats(vec![value], |slots| {
            slots.iter().fold(f64::INFINITY, |acc, s| acc.min(s[0]))
        })
    }

    fn allreduce_max(&self, value: f64) -> f64 {
        self.reduce_floats(vec![value], |slots| {
            slots.iter().fold(f64::NEG_INFINITY, |acc, s| acc.max(s[0]))
        })
    }

    fn allreduce_sum_counts(&self, local: &[u64]) -> Vec<u64> {
        self.publish_counts(local.to_vec());
        self.board.barrier.wait();
        let out = {
            let slots = self.board.counts.lock().expect("exchange board poisoned");
            let mut sum = vec![0u64; local.len()];
            for slot in slots.iter() {
                for (acc, &v) in sum.iter_mut().zip(slot.iter()) {
                    *acc += v;
                }
            }
            sum
        };
        self.board.barrier.wait();
        out
    }

    fn exscan_sum(&self, value: f64) -> f64 {
        let rank = self.rank;
        self.reduce_floats(vec![value], |slots| {
            slots[..rank].iter().fold(0.0, |acc, s| acc + s[0])
        })
    }

    fn alltoall_counts(&self, send_counts: &[usize]) -> Vec<usize> {
        assert_eq!(send_counts.len(), self.size);
        self.publish_counts(send_counts.iter().map(|&c| c as u64).collect());
        self.board.barrier.wait();
        let out = {
            let slots = self.board.counts.lock().expect("exchange board poisoned");
            (0..self.size).map(|src| slots[src][self.rank] as usize).collect()
        };
        self.board.barrier.wait();
        out
    }

    fn alltoallv(&self, send: &[f64], send_counts: &[usize], recv_counts: &[usize]) -> Vec<f64> {
        assert_eq!(send_counts.len(), self.size);
        assert_eq!(send_counts.iter().sum::<usize>(), send.len());
        self.publish_counts(send_counts.iter().map(|&c| c as u64).collect());
        self.publish_floats(send.to_vec());
        self.board.barrier.wait();
        let out = {
            let counts = self.board.counts.lock().expect("exchange board poisoned");
            let floats = self.board.floats.lock().expect("exchange board poisoned");
            let mut recv = Vec::with_capacity(recv_counts.iter().sum());
            for src in 0..self.size {
                let offset: u64 = counts[src][..self.rank].iter().sum();
                let len = counts[src][self.rank] as usize;
                let start = offset as usize;
                recv.extend_from_slice(&floats[src][start..start + len]);
            }
            recv
        };
        self.board.barrier.wait();
        debug_assert_eq!(out.len(), recv_counts.iter().sum::<usize>());
        out
    }

    fn allgather_count(&self, value: usize) -> Vec<usize> {
        self.publish_counts(vec![value as u64]);
        self.board.barrier.wait();
        let out = {
            let slots = self.board.counts.lock().expect("exchange board poisoned");
            slots.iter().map(|s| s[0] as usize).collect()
        };
        self.board.barrier.wait();
        out
    }

    fn allgatherv(&self, send: &[f64]) -> Vec<f64> {
        self.reduce_floats(send.to_vec(), |slots| {
            let mut all = Vec::with_capacity(slots.iter().map(Vec::len).sum());
            for slot in slots {
                all.extend_from_slice(slot);
            }
            all
        })
    }

    fn gather_count_to_root(&self, value: usize) -> Option<Vec<usize>> {
        let all = self.allgather_count(value);
        (self.rank == 0).then_some(all)
    }

    fn gatherv_to_root(&self, send: &[f64]) -> Option<Vec<f64>> {
        let rank = self.rank;
        self.reduce_floats(send.to_vec(), |slots| {
            (rank == 0).then(|| {
                let mut all = Vec::with_capacity(slots.iter().map(Vec::len).sum());
                for slot in slots {
                    all.extend_from_slice(slot);
                }
                all
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_comm_is_identity() {
        let comm = SelfComm;
        assert_eq!(comm.rank(), 0);
        assert_eq!(comm.size(), 1);
        assert_eq!(comm.allreduce_sum(3.5), 3.5);
        assert_eq!(comm.exscan_sum(7.0), 0.0);
        assert_eq!(comm.alltoall_counts(&[4]), vec![4]);
        assert_eq!(comm.allgatherv(&[1.0, 2.0]), vec![1.0, 2.0]);
        assert_eq!(comm.gatherv_to_root(&[9.0]), Some(vec![9.0]));
    }

    #[test]
    fn test_allreduce_sum_across_ranks() {
        let sums = LocalCluster::run(4, |comm| comm.allreduce_sum(comm.rank() as f64 + 1.0));
        assert_eq!(sums, vec![10.0; 4]);
    }

    #[test]
    fn test_allreduce_extrema() {
        let out = LocalCluster::run(3, |comm| {
            let v = (comm.rank() as f64 - 1.0) * 2.5;
            (comm.allreduce_min(v), comm.allreduce_max(v))
        });
        for (lo, hi) in out {
            assert_eq!(lo, -2.5);
            assert_eq!(hi, 2.5);
        }
    }

    #[test]
    fn test_exscan_rank0_gets_identity() {
        let prefixes = LocalCluster::run(4, |comm| comm.exscan_sum(comm.rank() as f64 + 1.0));
        assert_eq!(prefixes, vec![0.0, 1.0, 3.0, 6.0]);
    }

    #[test]
    fn test_alltoall_counts_transposes() {
        // Rank r sends count r*10 + dest to rank dest.
        let received = LocalCluster::run(3, |comm| {
            let send: Vec<usize> = (0..3).map(|dest| comm.rank() * 10 + dest).collect();
            comm.alltoall_counts(&send)
        });
        for (rank, recv) in received.iter().enumerate() {
            let expected: Vec<usize> = (0..3).map(|src| src * 10 + rank).collect();
            assert_eq!(recv, &expected);
        }
    }

    #[test]
    fn test_alltoallv_routes_segments() {
        // Rank r sends one value (r*10 + dest) to every dest.
        let received = LocalCluster::run(3, |comm| {
            let send: Vec<f64> = (0..3).map(|dest| (comm.rank() * 10 + dest) as f64).collect();
            let counts = vec![1usize; 3];
            let recv_counts = comm.alltoall_counts(&counts);
            comm.alltoallv(&send, &counts, &recv_counts)
        });
        for (rank, recv) in received.iter().enumerate() {
            let expected: Vec<f64> = (0..3).map(|src| (src * 10 + rank) as f64).collect();
            assert_eq!(recv, &expected);
        }
    }

    #[test]
    fn test_alltoallv_with_empty_segments() {
        // Only rank 0 sends, and only to rank 1.
        let received = LocalCluster::run(2, |comm| {
            let (send, counts) = if comm.rank() == 0 {
                (vec![42.0, 43.0], vec![0usize, 2])
            } else {
                (Vec::new(), vec![0usize, 0])
            };
            let recv_counts = comm.alltoall_counts(&counts);
            comm.alltoallv(&send, &counts, &recv_counts)
        });
        assert!(received[0].is_empty());
        assert_eq!(received[1], vec![42.0, 43.0]);
    }

    #[test]
    fn test_allgatherv_concatenates_in_rank_order() {
        let gathered = LocalCluster::run(3, |comm| {
            let send = vec![comm.rank() as f64; comm.rank() + 1];
            comm.allgatherv(&send)
        });
        for g in gathered {
            assert_eq!(g, vec![0.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
        }
    }

    #[test]
    fn test_gatherv_only_root_receives() {
        let gathered =
            LocalCluster::run(3, |comm| comm.gatherv_to_root(&[comm.rank() as f64]));
        assert_eq!(gathered[0], Some(vec![0.0, 1.0, 2.0]));
        assert_eq!(gathered[1], None);
        assert_eq!(gathered[2], None);
    }

    #[test]
    fn test_reduction_is_bit_reproducible() {
        // Values chosen so that summation order matters in f64.
        let run = || {
            LocalCluster::run(4, |comm| {
                let v = match comm.rank() {
                    0 => 1e16,
                    1 => 1.0,
                    2 => -1e16,
                    _ => 1.0,
                };
                comm.allreduce_sum(v)
            })
        };
        let a = run();
        let b = run();
        assert_eq!(a, b, "fixed-order reduction must be bit-identical");
    }
}
