// ─────────────────────────────────────────────────────────────────────
// Radial Plasma Kernel — Particle Shell
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Local particle storage for the radial shell owned by one rank.
//!
//! Structure-of-arrays: nine parallel `f64` sequences of common local
//! length. Between redistribution and the next position update the
//! shell is sorted ascending by cached r², and shells are radially
//! contiguous across ranks (the concatenation in rank order is
//! globally sorted).

use rand::Rng;
use rand_distr::{Distribution, UnitBall};

/// Particles owned by one rank, as parallel coordinate arrays.
#[derive(Debug, Clone)]
pub struct ParticleShell {
    /// Species label, used in output file names.
    pub name: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    pub vx: Vec<f64>,
    pub vy: Vec<f64>,
    pub vz: Vec<f64>,
    /// Per-particle charge.
    pub q: Vec<f64>,
    /// Radial electric field at the particle, Q_enc / r².
    pub er: Vec<f64>,
    /// Cached squared radius; moves with its particle through every
    /// exchange.
    pub r2: Vec<f64>,
    /// Inverse charge-over-mass ratio; mass is |iqom * q|.
    pub iqom: f64,
    /// Global particle count across all ranks, constant for a run.
    pub n_global: u64,
}

impl ParticleShell {
    pub fn new(n_local: usize, n_global: u64, name: &str, iqom: f64) -> Self {
        ParticleShell {
            name: name.to_string(),
            x: vec![0.0; n_local],
            y: vec![0.0; n_local],
            z: vec![0.0; n_local],
            vx: vec![0.0; n_local],
            vy: vec![0.0; n_local],
            vz: vec![0.0; n_local],
            q: vec![0.0; n_local],
            er: vec![0.0; n_local],
            r2: vec![0.0; n_local],
            iqom,
            n_global,
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Grow or shrink all nine arrays to `n`, zero-filling new slots.
    pub fn resize(&mut self, n: usize) {
        self.x.resize(n, 0.0);
        self.y.resize(n, 0.0);
        self.z.resize(n, 0.0);
        self.vx.resize(n, 0.0);
        self.vy.resize(n, 0.0);
        self.vz.resize(n, 0.0);
        self.q.resize(n, 0.0);
        self.er.resize(n, 0.0);
        self.r2.resize(n, 0.0);
    }

    /// Rebuild the r² cache from current positions.
    pub fn recompute_r2(&mut self) {
        for i in 0..self.len() {
            self.r2[i] = self.x[i] * self.x[i] + self.y[i] * self.y[i] + self.z[i] * self.z[i];
        }
    }

    /// Largest cached r² on this rank, −∞ when the shell is empty.
    pub fn max_r2_local(&self) -> f64 {
        self.r2.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    /// Smallest cached r² on this rank, +∞ when the shell is empty.
    pub fn min_r2_local(&self) -> f64 {
        self.r2.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// True when the r² cache is non-decreasing.
    pub fn is_sorted_by_r2(&self) -> bool {
        self.r2.windows(2).all(|w| w[0] <= w[1])
    }

    /// Fill the shell with particles sampled uniformly inside the
    /// sphere of the given radius, at rest, each carrying
    /// `charge_per_particle`. The r² cache is left consistent.
    pub fn seed_uniform_sphere<R: Rng>(
        &mut self,
        radius: f64,
        charge_per_particle: f64,
        rng: &mut R,
    ) {
        for i in 0..self.len() {
            let p: [f64; 3] = UnitBall.sample(rng);
            self.x[i] = p[0] * radius;
            self.y[i] = p[1] * radius;
            self.z[i] = p[2] * radius;
            self.vx[i] = 0.0;
            self.vy[i] = 0.0;
            self.vz[i] = 0.0;
            self.q[i] = charge_per_particle;
            self.er[i] = 0.0;
            self.r2[i] =
                self.x[i] * self.x[i] + self.y[i] * self.y[i] + self.z[i] * self.z[i];
        }
    }

    /// Test-support constructor: a shell from explicit positions, unit
    /// charge, zero velocity.
    pub fn from_positions(positions: &[(f64, f64, f64)], n_global: u64, iqom: f64) -> Self {
        let mut shell = ParticleShell::new(positions.len(), n_global, "test", iqom);
        for (i, &(px, py, pz)) in positions.iter().enumerate() {
            shell.x[i] = px;
            shell.y[i] = py;
            shell.z[i] = pz;
            shell.q[i] = 1.0;
        }
        shell.recompute_r2();
        shell
    }
}
