//! Symplectic-Euler update of velocities and positions.
//!
//! Purely local: velocities get the radial field kick projected onto
//! the position direction, then positions drift with the updated
//! velocities. Sortedness and the r² cache are invalidated here and
//! restored by the next redistribution.

use crate::shell::ParticleShell;
use plasma_types::constants::R_SINGULARITY_GUARD;

pub fn push_particles(shell: &mut ParticleShell, dt: f64) {
    let qom = 1.0 / shell.iqom;
    for i in 0..shell.len() {
        let r = shell.r2[i].sqrt();
        if r > R_SINGULARITY_GUARD {
            let f = dt * qom * shell.er[i] / r;
            shell.vx[i] += f * shell.x[i];
            shell.vy[i] += f * shell.y[i];
            shell.vz[i] += f * shell.z[i];
        }
        shell.x[i] += dt * shell.vx[i];
        shell.y[i] += dt * shell.vy[i];
        shell.z[i] += dt * shell.vz[i];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::SelfComm;
    use crate::field::update_electric_field;
    use crate::shell::ParticleShell;

    #[test]
    fn test_positive_charge_accelerates_outward() {
        let mut shell = ParticleShell::from_positions(&[(1.0, 0.0, 0.0)], 1, 1.0);
        update_electric_field(&mut shell, &SelfComm);
        push_particles(&mut shell, 0.1);
        assert!(shell.vx[0] > 0.0, "radial field should push the charge outward");
        assert!(shell.x[0] > 1.0);
        assert_eq!(shell.vy[0], 0.0);
        assert_eq!(shell.vz[0], 0.0);
    }

    #[test]
    fn test_origin_particles_stay_finite_and_still() {
        // Both particles at the origin: zero field, zero kick, no NaN.
        let mut shell =
            ParticleShell::from_positions(&[(0.0, 0.0, 0.0), (0.0, 0.0, 0.0)], 2, 1.0);
        update_electric_field(&mut shell, &SelfComm);
        push_particles(&mut shell, 0.1);
        for i in 0..2 {
            assert_eq!(shell.x[i], 0.0);
            assert_eq!(shell.vx[i], 0.0);
            assert!(shell.x[i].is_finite());
            assert!(shell.y[i].is_finite());
            assert!(shell.z[i].is_finite());
        }
    }

    #[test]
    fn test_drift_uses_updated_velocity() {
        let mut shell = ParticleShell::from_positions(&[(2.0, 0.0, 0.0)], 1, 1.0);
        shell.er[0] = 0.0;
        shell.vx[0] = 1.0;
        push_particles(&mut shell, 0.5);
        assert!((shell.x[0] - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_heavy_species_kicks_less() {
        let make = |iqom: f64| {
            let mut s = ParticleShell::from_positions(&[(1.0, 0.0, 0.0)], 1, iqom);
            update_electric_field(&mut s, &SelfComm);
            push_particles(&mut s, 0.1);
            s.vx[0]
        };
        let light = make(1.0);
        let heavy = make(1836.0);
        assert!(light > heavy, "larger iqom means smaller charge-to-mass kick");
    }
}
