//! Binned observables for the optional distribution outputs.

use crate::shell::ParticleShell;
use ndarray::Array1;

/// Per-particle kinetic energies ½·|iqom·q|·v² of the local shell.
pub fn particle_kinetic_energies(shell: &ParticleShell) -> Vec<f64> {
    (0..shell.len())
        .map(|i| {
            let v2 = shell.vx[i] * shell.vx[i]
                + shell.vy[i] * shell.vy[i]
                + shell.vz[i] * shell.vz[i];
            0.5 * (shell.iqom * shell.q[i]).abs() * v2
        })
        .collect()
}

/// Histogram of sample values over `[0, max(samples)]` in `n_bins`
/// equal-width bins. Returns bin centers and counts; both are zero
/// arrays when the input is empty or all-zero.
pub fn value_histogram(samples: &[f64], n_bins: usize) -> (Array1<f64>, Array1<u64>) {
    let mut counts = Array1::zeros(n_bins);
    let top = samples.iter().copied().fold(0.0f64, f64::max);
    if top <= 0.0 {
        return (Array1::zeros(n_bins), counts);
    }
    let delta = top / n_bins as f64;
    for &v in samples {
        let bin = ((v / delta) as usize).min(n_bins - 1);
        counts[bin] += 1;
    }
    let centers = Array1::from_shape_fn(n_bins, |b| (b as f64 + 0.5) * delta);
    (centers, counts)
}

/// Radial number density: particle count per spherical shell divided
/// by the shell volume, over `n_bins` equal-width radius bins up to
/// `radius`. Particles beyond `radius` accumulate in the last bin.
pub fn radial_density_profile(
    r2: &[f64],
    radius: f64,
    n_bins: usize,
) -> (Array1<f64>, Array1<f64>) {
    let dr = radius / n_bins as f64;
    let mut counts = vec![0u64; n_bins];
    for &v in r2 {
        let r = v.sqrt();
        let bin = ((r / dr) as usize).min(n_bins - 1);
        counts[bin] += 1;
    }
    let centers = Array1::from_shape_fn(n_bins, |b| (b as f64 + 0.5) * dr);
    let density = Array1::from_shape_fn(n_bins, |b| {
        let r_in = b as f64 * dr;
        let r_out = r_in + dr;
        let volume = 4.0 / 3.0 * std::f64::consts::PI * (r_out.powi(3) - r_in.powi(3));
        counts[b] as f64 / volume
    });
    (centers, density)
}
