// ─────────────────────────────────────────────────────────────────────
// Radial Plasma Kernel — Step Driver
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Timestep sequencing: redistribute → field → push for each species,
//! energy and output at the save cadence, drift report from rank 0.

use crate::comm::Communicator;
use crate::energy::total_energy;
use crate::field::update_electric_field;
use crate::output::{
    append_species_row, save_distributions, save_positions, species_log_path, write_provenance,
    OutputFlags,
};
use crate::pusher::push_particles;
use crate::redistribute::redistribute;
use crate::shell::ParticleShell;
use plasma_types::config::SimConfig;
use plasma_types::error::PlasmaResult;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use std::time::Instant;

/// Bins used by the optional distribution outputs.
const DISTRIBUTION_BINS: usize = 64;

/// Throughput estimate printed at shutdown. The FLOP model is ~25
/// floating operations per particle per step (sort comparisons, field
/// sweep, push); traffic assumes the nine-double record is read and
/// written a few times per step.
#[derive(Debug, Clone, Copy)]
pub struct PerfSummary {
    pub total_time: f64,
    pub gflops: f64,
    pub memory_bandwidth: f64,
}

impl PerfSummary {
    pub fn estimate(steps: usize, n_global: u64, num_species: usize, total_time: f64) -> Self {
        let flops_per_step = 25.0 * n_global as f64 * num_species as f64;
        let bytes_per_step = 72.0 * n_global as f64 * num_species as f64 * 4.0;
        PerfSummary {
            total_time,
            gflops: flops_per_step * steps as f64 / (total_time * 1e9),
            memory_bandwidth: bytes_per_step * steps as f64 / (total_time * 1e9),
        }
    }
}

/// Result of a completed run.
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    pub steps: usize,
    pub initial_energy: f64,
    pub final_energy: f64,
    /// Relative energy drift |E − E₀| / |E₀| in percent.
    pub drift_percent: f64,
    pub perf: PerfSummary,
}

/// One complete simulation: configuration, species shells, and the
/// communicator they live on.
pub struct Simulation<C: Communicator> {
    config: SimConfig,
    flags: OutputFlags,
    output_dir: PathBuf,
    comm: C,
    species: Vec<ParticleShell>,
    initial_energy: f64,
}

impl<C: Communicator> Simulation<C> {
    /// Seed every species (uniform sphere, at rest), perform the
    /// initial sort and field update, record E(0), and write the
    /// t = 0 output rows.
    pub fn new(
        config: SimConfig,
        flags: OutputFlags,
        output_dir: PathBuf,
        comm: C,
    ) -> PlasmaResult<Self> {
        let rank = comm.rank();
        let size = comm.size();
        let per_rank = (config.n_total / size as u64) as usize;
        let remainder = (config.n_total % size as u64) as usize;
        let local_n = per_rank + usize::from(rank < remainder);

        let mut rng = StdRng::seed_from_u64(10 + 12_345 * rank as u64);
        let charge = config.charge_per_particle();

        let mut species = Vec::with_capacity(config.species.len());
        for sp in &config.species {
            let mut shell = ParticleShell::new(local_n, config.n_total, &sp.name, sp.iqom);
            shell.seed_uniform_sphere(config.radius, charge, &mut rng);
            redistribute(&mut shell, &comm);
            update_electric_field(&mut shell, &comm);
            species.push(shell);
        }

        let mut sim = Simulation {
            config,
            flags,
            output_dir,
            comm,
            species,
            initial_energy: 0.0,
        };

        if rank == 0 && sim.flags.any() {
            if let Err(err) = write_provenance(&sim.output_dir, &sim.config) {
                log::warn!("skipping provenance dump: {err}");
            }
        }

        let mut initial = 0.0;
        for i in 0..sim.species.len() {
            let energy = total_energy(&sim.species[i], &sim.comm);
            initial += energy;
            sim.save_interval_outputs(i, 0, 0.0, energy)?;
        }
        sim.initial_energy = initial;
        Ok(sim)
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    pub fn species(&self) -> &[ParticleShell] {
        &self.species
    }

    pub fn initial_energy(&self) -> f64 {
        self.initial_energy
    }

    /// Advance every species one timestep: re-sort across ranks,
    /// refresh the radial field, push velocities and positions.
    pub fn step(&mut self) {
        for shell in &mut self.species {
            redistribute(shell, &self.comm);
            update_electric_field(shell, &self.comm);
            push_particles(shell, self.config.dt);
        }
    }

    /// Run all ⌈tend/dt⌉ steps with the configured save cadence.
    pub fn run(&mut self) -> PlasmaResult<RunSummary> {
        let nt = self.config.n_steps();
        let save_interval = self.config.save_interval;
        let rank = self.comm.rank();
        let start = Instant::now();

        for it in 0..nt {
            let saving = it % save_interval == 0;
            let mut step_energy = 0.0;

            for i in 0..self.species.len() {
                {
                    let shell = &mut self.species[i];
                    redistribute(shell, &self.comm);
                    update_electric_field(shell, &self.comm);
                    push_particles(shell, self.config.dt);
                }

                if saving {
                    if self.flags.positions {
                        if let Err(err) = save_positions(
                            &self.output_dir,
                            &self.species[i],
                            it,
                            &self.comm,
                            self.config.buffer_size,
                        ) {
                            log::warn!("skipping position dump at step {it}: {err}");
                        }
                    }
                    let energy = total_energy(&self.species[i], &self.comm);
                    step_energy += energy;
                    self.save_interval_outputs(i, it, it as f64 * self.config.dt, energy)?;
                }
            }

            if saving && rank == 0 {
                let drift = relative_drift(step_energy, self.initial_energy);
                println!(
                    "Step {it:>6} | Time {:.4} | Energy error: {drift:.6}%",
                    it as f64 * self.config.dt
                );
            }
        }

        // Final energy for the summary, outside the save cadence.
        let final_energy: f64 = (0..self.species.len())
            .map(|i| total_energy(&self.species[i], &self.comm))
            .sum();

        self.comm.barrier();
        let total_time = start.elapsed().as_secs_f64();
        let perf = PerfSummary::estimate(
            nt,
            self.config.n_total,
            self.species.len(),
            total_time.max(1e-9),
        );

        Ok(RunSummary {
            steps: nt,
            initial_energy: self.initial_energy,
            final_energy,
            drift_percent: relative_drift(final_energy, self.initial_energy),
            perf,
        })
    }

    /// Per-species outputs at one save point. The CSV row carries the
    /// allreduced global maximum r², so the gather below is collective
    /// on every rank even though only rank 0 writes.
    fn save_interval_outputs(
        &mut self,
        species_index: usize,
        step: usize,
        time: f64,
        energy: f64,
    ) -> PlasmaResult<()> {
        if self.flags.sim_data {
            let max_r2 = self
                .comm
                .allreduce_max(self.species[species_index].max_r2_local());
            if self.comm.rank() == 0 {
                let path = species_log_path(&self.output_dir, &self.species[species_index].name);
                if let Err(err) = append_species_row(
                    &path,
                    time,
                    energy,
                    max_r2,
                    self.config.n_total,
                    self.comm.size(),
                ) {
                    log::warn!("skipping simulation log row at step {step}: {err}");
                }
            }
        }
        if self.flags.energy_dist {
            if let Err(err) = save_distributions(
                &self.output_dir,
                &self.species[species_index],
                step,
                &self.comm,
                self.config.radius,
                DISTRIBUTION_BINS,
            ) {
                log::warn!("skipping distribution output at step {step}: {err}");
            }
        }
        Ok(())
    }

    /// Rank-0 shutdown report.
    pub fn report_performance(&self, summary: &RunSummary) {
        if self.comm.rank() != 0 {
            return;
        }
        println!("\n=== Performance Summary ===");
        println!("Total execution time: {:.3} seconds", summary.perf.total_time);
        println!("Throughput: {:.3} GFLOPS", summary.perf.gflops);
        println!("Memory bandwidth: {:.3} GB/s", summary.perf.memory_bandwidth);
        println!("MPI processes: {}", self.comm.size());
        println!("===========================\n");
    }
}

fn relative_drift(energy: f64, reference: f64) -> f64 {
    if reference.abs() < f64::EPSILON {
        return 0.0;
    }
    (energy - reference).abs() / reference.abs() * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::SelfComm;
    use plasma_types::config::SimConfig;

    fn small_config() -> SimConfig {
        SimConfig::from_str(
            "N = 8\nR = 1.0\ndt = 0.001\ntend = 0.01\nSAVE_INTERVAL = 5\nspecies ions 1.0\n",
        )
        .expect("deck should parse")
    }

    #[test]
    fn test_initialization_balances_and_sorts() {
        let sim = Simulation::new(
            small_config(),
            OutputFlags::none(),
            std::env::temp_dir(),
            SelfComm,
        )
        .expect("init");
        assert_eq!(sim.species().len(), 1);
        assert_eq!(sim.species()[0].len(), 8);
        assert!(sim.species()[0].is_sorted_by_r2());
        assert!(sim.initial_energy() > 0.0);
    }

    #[test]
    fn test_energy_drift_stays_under_one_percent() {
        // Uniform sphere, N = 8, dt = 1e-3 out to t = 0.01 (exact
        // energy mode unless fast-energy is switched on).
        let mut sim = Simulation::new(
            small_config(),
            OutputFlags::none(),
            std::env::temp_dir(),
            SelfComm,
        )
        .expect("init");
        let summary = sim.run().expect("run");
        assert_eq!(summary.steps, 10);
        assert!(
            summary.drift_percent < 1.0,
            "energy drift {}% exceeds 1%",
            summary.drift_percent
        );
    }

    #[test]
    fn test_runs_are_deterministic() {
        let run = || {
            let mut sim = Simulation::new(
                small_config(),
                OutputFlags::none(),
                std::env::temp_dir(),
                SelfComm,
            )
            .expect("init");
            sim.step();
            let shell = &sim.species()[0];
            (shell.x.clone(), shell.vx.clone())
        };
        let (xa, va) = run();
        let (xb, vb) = run();
        assert_eq!(xa, xb);
        assert_eq!(va, vb);
    }

    #[test]
    fn test_step_breaks_then_restores_sortedness() {
        let mut sim = Simulation::new(
            small_config(),
            OutputFlags::none(),
            std::env::temp_dir(),
            SelfComm,
        )
        .expect("init");
        sim.step();
        // Positions moved; the next step's redistribution re-sorts.
        sim.step();
        // After push the r² cache is stale by design; recompute and
        // re-sort explicitly to observe the restored invariant.
        let mut shell = sim.species()[0].clone();
        crate::redistribute::redistribute(&mut shell, &SelfComm);
        assert!(shell.is_sorted_by_r2());
    }

    #[test]
    fn test_perf_estimate_scales_with_work() {
        let a = PerfSummary::estimate(100, 1000, 1, 2.0);
        let b = PerfSummary::estimate(100, 2000, 1, 2.0);
        assert!((b.gflops / a.gflops - 2.0).abs() < 1e-12);
        assert!(a.total_time == 2.0);
    }
}
