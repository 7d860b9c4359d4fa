// ─────────────────────────────────────────────────────────────────────
// Radial Plasma Kernel — Energy Evaluator
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Total energy via distributed reductions.
//!
//! Kinetic energy is a plain allreduced sum. Potential energy has two
//! evaluators: the exact O(N²) pair sum (each rank owns its index
//! range of the allgathered positions) and an O(N) approximation that
//! exploits the sorted shell structure: with charge enclosed strictly
//! inside particle i written Q_in(i), U ≈ Σ q·Q_in/r. The build picks
//! one at compile time through the `fast-energy` feature; both stay
//! public so they can be compared directly.

use crate::comm::Communicator;
use crate::shell::ParticleShell;
use plasma_types::constants::R_SINGULARITY_GUARD;

/// Kinetic energy Σ ½·|iqom·q|·v², allreduced.
pub fn kinetic_energy<C: Communicator>(shell: &ParticleShell, comm: &C) -> f64 {
    let mut local = 0.0;
    for i in 0..shell.len() {
        let v2 = shell.vx[i] * shell.vx[i]
            + shell.vy[i] * shell.vy[i]
            + shell.vz[i] * shell.vz[i];
        local += 0.5 * (shell.iqom * shell.q[i]).abs() * v2;
    }
    comm.allreduce_sum(local)
}

/// Exact O(N²) potential energy. Allgathers positions and charges;
/// each rank sums pairs whose first index falls in its owned range.
/// The ½ factor compensates for counting each pair twice.
pub fn potential_energy_exact<C: Communicator>(shell: &ParticleShell, comm: &C) -> f64 {
    let counts = comm.allgather_count(shell.len());
    let my_start: usize = counts[..comm.rank()].iter().sum();
    let my_end = my_start + counts[comm.rank()];

    let all_x = comm.allgatherv(&shell.x);
    let all_y = comm.allgatherv(&shell.y);
    let all_z = comm.allgatherv(&shell.z);
    let all_q = comm.allgatherv(&shell.q);
    let total = all_x.len();

    let mut local = 0.0;
    for i in my_start..my_end {
        for j in 0..total {
            if i == j {
                continue;
            }
            let dx = all_x[i] - all_x[j];
            let dy = all_y[i] - all_y[j];
            let dz = all_z[i] - all_z[j];
            let rij = (dx * dx + dy * dy + dz * dz).sqrt();
            if rij > R_SINGULARITY_GUARD {
                local += 0.5 * all_q[i] * all_q[j] / rij;
            }
        }
    }
    comm.allreduce_sum(local)
}

/// O(N) potential energy from the shell structure: every particle
/// interacts with the charge strictly inside its radius as if it were
/// a point charge at the origin. Valid once shells are globally
/// sorted by r².
pub fn potential_energy_gauss<C: Communicator>(shell: &ParticleShell, comm: &C) -> f64 {
    let local_charge: f64 = shell.q.iter().sum();
    let mut enclosed = comm.exscan_sum(local_charge);

    let mut local = 0.0;
    for i in 0..shell.len() {
        let r = shell.r2[i].sqrt();
        if r > R_SINGULARITY_GUARD {
            local += shell.q[i] * enclosed / r;
        }
        enclosed += shell.q[i];
    }
    comm.allreduce_sum(local)
}

/// Total energy in the compile-time-selected mode.
pub fn total_energy<C: Communicator>(shell: &ParticleShell, comm: &C) -> f64 {
    #[cfg(feature = "fast-energy")]
    {
        kinetic_energy(shell, comm) + potential_energy_gauss(shell, comm)
    }
    #[cfg(not(feature = "fast-energy"))]
    {
        kinetic_energy(shell, comm) + potential_energy_exact(shell, comm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::SelfComm;
    use crate::shell::ParticleShell;

    #[test]
    fn test_kinetic_energy_of_known_state() {
        let mut shell = ParticleShell::from_positions(&[(1.0, 0.0, 0.0)], 1, 2.0);
        shell.vx[0] = 3.0;
        shell.vy[0] = 4.0;
        // m = |iqom * q| = 2, v² = 25.
        let ke = kinetic_energy(&shell, &SelfComm);
        assert!((ke - 25.0).abs() < 1e-12);
    }

    #[test]
    fn test_kinetic_energy_zero_at_rest() {
        let shell = ParticleShell::from_positions(&[(1.0, 0.0, 0.0), (2.0, 0.0, 0.0)], 2, 1.0);
        assert_eq!(kinetic_energy(&shell, &SelfComm), 0.0);
    }

    #[test]
    fn test_exact_potential_of_a_pair() {
        // Two unit charges 2 apart: U = 1/2.
        let shell =
            ParticleShell::from_positions(&[(1.0, 0.0, 0.0), (3.0, 0.0, 0.0)], 2, 1.0);
        let u = potential_energy_exact(&shell, &SelfComm);
        assert!((u - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_exact_potential_skips_coincident_pairs() {
        let shell =
            ParticleShell::from_positions(&[(1.0, 0.0, 0.0), (1.0, 0.0, 0.0)], 2, 1.0);
        let u = potential_energy_exact(&shell, &SelfComm);
        assert_eq!(u, 0.0);
    }

    #[test]
    fn test_gauss_potential_matches_concentric_charges() {
        // Unit charges at r = 1, 2, 4, well separated and sorted.
        // U = q1*0/1 + q2*(q1)/2 + q3*(q1+q2)/4.
        let shell = ParticleShell::from_positions(
            &[(1.0, 0.0, 0.0), (2.0, 0.0, 0.0), (4.0, 0.0, 0.0)],
            3,
            1.0,
        );
        let u = potential_energy_gauss(&shell, &SelfComm);
        let expected = 0.0 + 1.0 / 2.0 + 2.0 / 4.0;
        assert!((u - expected).abs() < 1e-12);
    }

    #[test]
    fn test_gauss_skips_origin_particles() {
        let shell =
            ParticleShell::from_positions(&[(0.0, 0.0, 0.0), (2.0, 0.0, 0.0)], 2, 1.0);
        let u = potential_energy_gauss(&shell, &SelfComm);
        assert!((u - 1.0 / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_gauss_tracks_exact_on_separated_radial_ladder() {
        // Widely separated radii on different axes: the shell
        // approximation should land within a few percent of the pair
        // sum.
        let shell = ParticleShell::from_positions(
            &[
                (1.0, 0.0, 0.0),
                (0.0, 4.0, 0.0),
                (0.0, 0.0, 16.0),
                (64.0, 0.0, 0.0),
            ],
            4,
            1.0,
        );
        let exact = potential_energy_exact(&shell, &SelfComm);
        let gauss = potential_energy_gauss(&shell, &SelfComm);
        let rel = ((gauss - exact) / exact).abs();
        assert!(rel < 0.15, "relative deviation {rel} too large");
    }
}
