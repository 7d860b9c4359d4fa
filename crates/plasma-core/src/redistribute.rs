// ─────────────────────────────────────────────────────────────────────
// Radial Plasma Kernel — Shell Redistributor
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Global re-sort of particles across ranks, once per timestep.
//!
//! Histogram-based sample sort: every rank bins its r² values into a
//! shared 1024-bin histogram, derives identical splitters from the
//! allreduced histogram (no broadcast needed), exchanges particles as
//! interleaved 9-double records, and k-way merges the received chunks
//! into a locally sorted shell. After return the concatenation of
//! shells in rank order is globally sorted and load is balanced to
//! within the histogram grain.

use crate::comm::Communicator;
use crate::shell::ParticleShell;
use plasma_types::constants::{NUM_HISTOGRAM_BINS, R2_DEGENERATE_WIDTH};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Doubles per particle in the exchange record:
/// x, y, z, vx, vy, vz, q, Er, r².
pub const FIELDS_PER_PARTICLE: usize = 9;

/// Per-rank traffic of one redistribution, for diagnostics and the
/// re-sort idempotence law (a second pass on unchanged positions
/// sends every particle to its current rank).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeReport {
    /// Particles addressed to each destination rank.
    pub sent: Vec<usize>,
    /// Particles received from each source rank.
    pub received: Vec<usize>,
}

impl ExchangeReport {
    /// True when no particle crossed a rank boundary.
    pub fn is_identity(&self, rank: usize) -> bool {
        self.sent
            .iter()
            .enumerate()
            .all(|(dest, &count)| dest == rank || count == 0)
    }
}

/// Re-sort and redistribute one species. Restores invariants I1–I4;
/// scratch buffers live only for the duration of the call.
pub fn redistribute<C: Communicator>(shell: &mut ParticleShell, comm: &C) -> ExchangeReport {
    shell.recompute_r2();
    sort_local(shell);

    let size = comm.size();
    let n = shell.len();
    if size == 1 {
        return ExchangeReport {
            sent: vec![n],
            received: vec![n],
        };
    }

    let r2_min = comm.allreduce_min(shell.r2.first().copied().unwrap_or(f64::INFINITY));
    let r2_max = comm.allreduce_max(shell.r2.last().copied().unwrap_or(f64::NEG_INFINITY));

    // Every rank empty: nothing to route, but the collective sequence
    // above already kept all ranks in step.
    if r2_min > r2_max {
        return ExchangeReport {
            sent: vec![0; size],
            received: vec![0; size],
        };
    }

    // All particles at one radius: value splitters cannot separate
    // equal keys, so split by global position quota instead. Shell
    // ordering across ranks holds trivially.
    let dest: Vec<usize> = if r2_min == r2_max {
        quota_destinations(n, size, comm)
    } else {
        // Widen a degenerate range by one unit so bin indexing stays
        // well-defined.
        let width = if r2_max - r2_min < R2_DEGENERATE_WIDTH {
            1.0
        } else {
            r2_max - r2_min
        };
        let histogram = local_histogram(&shell.r2, r2_min, width);
        let global = comm.allreduce_sum_counts(&histogram);
        let splitters = select_splitters(&global, r2_min, width, r2_max, size);
        shell
            .r2
            .iter()
            .map(|&v| destination_rank(v, &splitters))
            .collect()
    };

    let mut send_counts = vec![0usize; size];
    for &d in &dest {
        send_counts[d] += 1;
    }
    let recv_counts = comm.alltoall_counts(&send_counts);
    let total_recv: usize = recv_counts.iter().sum();

    // Pack in destination order. Walking particles in ascending local
    // order keeps each destination chunk internally sorted.
    let mut cursor = exclusive_prefix(&send_counts);
    let mut send_buf = vec![0.0f64; n * FIELDS_PER_PARTICLE];
    for i in 0..n {
        let slot = cursor[dest[i]];
        cursor[dest[i]] += 1;
        let base = slot * FIELDS_PER_PARTICLE;
        send_buf[base] = shell.x[i];
        send_buf[base + 1] = shell.y[i];
        send_buf[base + 2] = shell.z[i];
        send_buf[base + 3] = shell.vx[i];
        send_buf[base + 4] = shell.vy[i];
        send_buf[base + 5] = shell.vz[i];
        send_buf[base + 6] = shell.q[i];
        send_buf[base + 7] = shell.er[i];
        send_buf[base + 8] = shell.r2[i];
    }

    let send_scaled: Vec<usize> = send_counts.iter().map(|&c| c * FIELDS_PER_PARTICLE).collect();
    let recv_scaled: Vec<usize> = recv_counts.iter().map(|&c| c * FIELDS_PER_PARTICLE).collect();
    let recv_buf = comm.alltoallv(&send_buf, &send_scaled, &recv_scaled);
    drop(send_buf);

    // Demultiplex the interleaved records.
    let mut rx = vec![0.0f64; total_recv];
    let mut ry = vec![0.0f64; total_recv];
    let mut rz = vec![0.0f64; total_recv];
    let mut rvx = vec![0.0f64; total_recv];
    let mut rvy = vec![0.0f64; total_recv];
    let mut rvz = vec![0.0f64; total_recv];
    let mut rq = vec![0.0f64; total_recv];
    let mut rer = vec![0.0f64; total_recv];
    let mut rr2 = vec![0.0f64; total_recv];
    for p in 0..total_recv {
        let base = p * FIELDS_PER_PARTICLE;
        rx[p] = recv_buf[base];
        ry[p] = recv_buf[base + 1];
        rz[p] = recv_buf[base + 2];
        rvx[p] = recv_buf[base + 3];
        rvy[p] = recv_buf[base + 4];
        rvz[p] = recv_buf[base + 5];
        rq[p] = recv_buf[base + 6];
        rer[p] = recv_buf[base + 7];
        rr2[p] = recv_buf[base + 8];
    }
    drop(recv_buf);

    // Each received chunk is sorted; merge the `size` chunks.
    let perm = merge_permutation(&rr2, &recv_counts);

    shell.resize(total_recv);
    for (out, &src) in perm.iter().enumerate() {
        shell.x[out] = rx[src];
        shell.y[out] = ry[src];
        shell.z[out] = rz[src];
        shell.vx[out] = rvx[src];
        shell.vy[out] = rvy[src];
        shell.vz[out] = rvz[src];
        shell.q[out] = rq[src];
        shell.er[out] = rer[src];
        shell.r2[out] = rr2[src];
    }
    debug_assert!(shell.is_sorted_by_r2());

    ExchangeReport {
        sent: send_counts,
        received: recv_counts,
    }
}

/// Sort the shell in place by r², applying one index permutation to
/// all nine arrays. Stable, so equal radii keep their relative order.
fn sort_local(shell: &mut ParticleShell) {
    let mut perm: Vec<usize> = (0..shell.len()).collect();
    perm.sort_by(|&a, &b| shell.r2[a].total_cmp(&shell.r2[b]));
    permute(&mut shell.x, &perm);
    permute(&mut shell.y, &perm);
    permute(&mut shell.z, &perm);
    permute(&mut shell.vx, &perm);
    permute(&mut shell.vy, &perm);
    permute(&mut shell.vz, &perm);
    permute(&mut shell.q, &perm);
    permute(&mut shell.er, &perm);
    permute(&mut shell.r2, &perm);
}

fn permute(values: &mut Vec<f64>, perm: &[usize]) {
    let old = std::mem::take(values);
    *values = perm.iter().map(|&i| old[i]).collect();
}

fn exclusive_prefix(counts: &[usize]) -> Vec<usize> {
    let mut out = Vec::with_capacity(counts.len());
    let mut acc = 0usize;
    for &c in counts {
        out.push(acc);
        acc += c;
    }
    out
}

/// Bin local r² values over `[lo, lo + width]` into 1024 equal-width
/// 64-bit counters.
fn local_histogram(r2: &[f64], lo: f64, width: f64) -> Vec<u64> {
    let delta = width / NUM_HISTOGRAM_BINS as f64;
    let mut hist = vec![0u64; NUM_HISTOGRAM_BINS];
    for &v in r2 {
        let bin = (((v - lo) / delta) as isize).clamp(0, NUM_HISTOGRAM_BINS as isize - 1);
        hist[bin as usize] += 1;
    }
    hist
}

/// Derive `size − 1` splitters from the global histogram. Splitter k
/// is the upper edge of the first bin where the cumulative count
/// reaches `(k + 1) · ⌈total/size⌉`; unreachable splitters are padded
/// with `r2_max`. Every rank holds the same histogram, so every rank
/// derives identical splitters.
fn select_splitters(
    global_hist: &[u64],
    lo: f64,
    width: f64,
    r2_max: f64,
    size: usize,
) -> Vec<f64> {
    let delta = width / NUM_HISTOGRAM_BINS as f64;
    let total: u64 = global_hist.iter().sum();
    let target = total.div_ceil(size as u64).max(1);

    let mut splitters = Vec::with_capacity(size - 1);
    let mut cumsum = 0u64;
    for (bin, &count) in global_hist.iter().enumerate() {
        cumsum += count;
        while splitters.len() < size - 1 && cumsum >= (splitters.len() as u64 + 1) * target {
            splitters.push(lo + (bin as f64 + 1.0) * delta);
        }
        if splitters.len() == size - 1 {
            break;
        }
    }
    // Extreme concentration in the last bins: trailing ranks end up
    // empty rather than the cut moving below r2_max.
    while splitters.len() < size - 1 {
        splitters.push(r2_max);
    }
    splitters
}

/// Lower-bound destination lookup: a particle with r² ≤ splitter[k]
/// goes to rank k; above the last splitter, to rank size − 1.
fn destination_rank(r2: f64, splitters: &[f64]) -> usize {
    splitters.partition_point(|&s| s < r2)
}

/// Destination assignment for a degenerate radius distribution: the
/// j-th particle in global rank-concatenation order goes to rank
/// `min(j / ⌈total/size⌉, size − 1)`.
fn quota_destinations<C: Communicator>(n: usize, size: usize, comm: &C) -> Vec<usize> {
    let counts = comm.allgather_count(n);
    let total: usize = counts.iter().sum();
    let target = total.div_ceil(size).max(1);
    let start: usize = counts[..comm.rank()].iter().sum();
    (0..n).map(|j| ((start + j) / target).min(size - 1)).collect()
}

#[derive(Debug, Clone, Copy)]
struct ChunkHead {
    r2: f64,
    chunk: usize,
    index: usize,
}

impl PartialEq for ChunkHead {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ChunkHead {}

impl PartialOrd for ChunkHead {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ChunkHead {
    fn cmp(&self, other: &Self) -> Ordering {
        // Tie-break on chunk id keeps the merge a strict total order.
        self.r2
            .total_cmp(&other.r2)
            .then_with(|| self.chunk.cmp(&other.chunk))
    }
}

/// Merge `chunk_counts.len()` internally sorted runs of `r2` into one
/// ascending permutation of `0..r2.len()`, using a min-heap keyed by
/// (r², chunk id). O(n log k) for k chunks.
fn merge_permutation(r2: &[f64], chunk_counts: &[usize]) -> Vec<usize> {
    let starts = exclusive_prefix(chunk_counts);
    let mut heap: BinaryHeap<Reverse<ChunkHead>> = BinaryHeap::with_capacity(chunk_counts.len());
    for (chunk, (&start, &count)) in starts.iter().zip(chunk_counts.iter()).enumerate() {
        if count > 0 {
            heap.push(Reverse(ChunkHead {
                r2: r2[start],
                chunk,
                index: start,
            }));
        }
    }

    let mut perm = Vec::with_capacity(r2.len());
    while let Some(Reverse(head)) = heap.pop() {
        perm.push(head.index);
        let next = head.index + 1;
        let chunk_end = starts[head.chunk] + chunk_counts[head.chunk];
        if next < chunk_end {
            heap.push(Reverse(ChunkHead {
                r2: r2[next],
                chunk: head.chunk,
                index: next,
            }));
        }
    }
    perm
}
