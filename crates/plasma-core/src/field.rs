// ─────────────────────────────────────────────────────────────────────
// Radial Plasma Kernel — Radial Field Solver
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Mean radial electric field from the enclosed charge.
//!
//! With shells globally sorted by r², the enclosed charge of particle
//! i is a prefix sum: the exclusive scan over lower ranks plus the
//! running local sum. Er[i] = Q_enc(i) / r²(i), zeroed at the origin.

use crate::comm::Communicator;
use crate::shell::ParticleShell;
use plasma_types::constants::R2_ORIGIN_GUARD;

/// Update `er` for every local particle. Requires the shell ordering
/// invariants (call after redistribution, before the position push).
pub fn update_electric_field<C: Communicator>(shell: &mut ParticleShell, comm: &C) {
    let local_sum: f64 = shell.q.iter().sum();
    let prefix = comm.exscan_sum(local_sum);

    let mut cumulative = prefix;
    for i in 0..shell.len() {
        cumulative += shell.q[i];
        shell.er[i] = if shell.r2[i] > R2_ORIGIN_GUARD {
            cumulative / shell.r2[i]
        } else {
            0.0
        };
    }
}
