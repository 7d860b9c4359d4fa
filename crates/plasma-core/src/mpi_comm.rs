// ─────────────────────────────────────────────────────────────────────
// Radial Plasma Kernel — MPI Communicator Backend
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! rsmpi-backed [`Communicator`](crate::comm::Communicator).
//!
//! Thin adapter over `MPI_COMM_WORLD`. Counts cross the wire as MPI's
//! `i32` convention; per-rank payloads beyond `i32::MAX` doubles are
//! out of contract. Any MPI-level failure aborts the program, which is
//! exactly the kernel's failure model.

use crate::comm::Communicator;
use mpi::collective::SystemOperation;
use mpi::datatype::{Partition, PartitionMut};
use mpi::environment::Universe;
use mpi::topology::SimpleCommunicator;
use mpi::traits::{Communicator as MpiCommunicator, CommunicatorCollectives, Root};

pub struct MpiComm {
    world: SimpleCommunicator,
}

impl MpiComm {
    /// Initialize MPI and wrap the world communicator. The returned
    /// [`Universe`] must stay alive for the duration of the run;
    /// dropping it finalizes MPI.
    pub fn initialize() -> Option<(Universe, MpiComm)> {
        let universe = mpi::initialize()?;
        let world = universe.world();
        Some((universe, MpiComm { world }))
    }

    pub fn from_world(world: SimpleCommunicator) -> Self {
        MpiComm { world }
    }
}

fn displacements(counts: &[i32]) -> Vec<i32> {
    let mut displs = Vec::with_capacity(counts.len());
    let mut acc = 0i32;
    for &c in counts {
        displs.push(acc);
        acc += c;
    }
    displs
}

impl Communicator for MpiComm {
    fn rank(&self) -> usize {
        MpiCommunicator::rank(&self.world) as usize
    }

    fn size(&self) -> usize {
        MpiCommunicator::size(&self.world) as usize
    }

    fn barrier(&self) {
        self.world.barrier();
    }

    fn allreduce_sum(&self, value: f64) -> f64 {
        let mut out = 0.0f64;
        self.world
            .all_reduce_into(&value, &mut out, SystemOperation::sum());
        out
    }

    fn allreduce_min(&self, value: f64) -> f64 {
        let mut out = 0.0f64;
        self.world
            .all_reduce_into(&value, &mut out, SystemOperation::min());
        out
    }

    fn allreduce_max(&self, value: f64) -> f64 {
        let mut out = 0.0f64;
        self.world
            .all_reduce_into(&value, &mut out, SystemOperation::max());
        out
    }

    fn allreduce_sum_counts(&self, local: &[u64]) -> Vec<u64> {
        let mut out = vec![0u64; local.len()];
        self.world
            .all_reduce_into(local, &mut out[..], SystemOperation::sum());
        out
    }

    fn exscan_sum(&self, value: f64) -> f64 {
        let mut out = 0.0f64;
        self.world
            .exclusive_scan_into(&value, &mut out, SystemOperation::sum());
        // MPI leaves rank 0's receive buffer undefined after Exscan.
        if self.rank() == 0 {
            out = 0.0;
        }
        out
    }

    fn alltoall_counts(&self, send_counts: &[usize]) -> Vec<usize> {
        let send: Vec<i32> = send_counts.iter().map(|&c| c as i32).collect();
        let mut recv = vec![0i32; self.size()];
        self.world.all_to_all_into(&send[..], &mut recv[..]);
        recv.into_iter().map(|c| c as usize).collect()
    }

    fn alltoallv(&self, send: &[f64], send_counts: &[usize], recv_counts: &[usize]) -> Vec<f64> {
        let send_counts: Vec<i32> = send_counts.iter().map(|&c| c as i32).collect();
        let recv_counts: Vec<i32> = recv_counts.iter().map(|&c| c as i32).collect();
        let send_displs = displacements(&send_counts);
        let recv_displs = displacements(&recv_counts);
        let total: i32 = recv_counts.iter().sum();

        let mut recv = vec![0.0f64; total as usize];
        let send_part = Partition::new(send, &send_counts[..], &send_displs[..]);
        let mut recv_part = PartitionMut::new(&mut recv[..], &recv_counts[..], &recv_displs[..]);
        self.world.all_to_all_varcount_into(&send_part, &mut recv_part);
        recv
    }

    fn allgather_count(&self, value: usize) -> Vec<usize> {
        let mut all = vec![0i32; self.size()];
        self.world.all_gather_into(&(value as i32), &mut all[..]);
        all.into_iter().map(|c| c as usize).collect()
    }

    fn allgatherv(&self, send: &[f64]) -> Vec<f64> {
        let counts: Vec<i32> = self
            .allgather_count(send.len())
            .into_iter()
            .map(|c| c as i32)
            .collect();
        let displs = displacements(&counts);
        let total: i32 = counts.iter().sum();

        let mut all = vec![0.0f64; total as usize];
        let mut part = PartitionMut::new(&mut all[..], &counts[..], &displs[..]);
        self.world.all_gather_varcount_into(send, &mut part);
        all
    }

    fn gather_count_to_root(&self, value: usize) -> Option<Vec<usize>> {
        let root = self.world.process_at_rank(0);
        if self.rank() == 0 {
            let mut all = vec![0i32; self.size()];
            root.gather_into_root(&(value as i32), &mut all[..]);
            Some(all.into_iter().map(|c| c as usize).collect())
        } else {
            root.gather_into(&(value as i32));
            None
        }
    }

    fn gatherv_to_root(&self, send: &[f64]) -> Option<Vec<f64>> {
        let counts = self.gather_count_to_root(send.len());
        let root = self.world.process_at_rank(0);
        match counts {
            Some(counts) => {
                let counts: Vec<i32> = counts.into_iter().map(|c| c as i32).collect();
                let displs = displacements(&counts);
                let total: i32 = counts.iter().sum();
                let mut all = vec![0.0f64; total as usize];
                let mut part = PartitionMut::new(&mut all[..], &counts[..], &displs[..]);
                root.gather_varcount_into_root(send, &mut part);
                Some(all)
            }
            None => {
                root.gather_varcount_into(send);
                None
            }
        }
    }
}
