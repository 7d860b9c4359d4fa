// ─────────────────────────────────────────────────────────────────────
// Radial Plasma Kernel — Output
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Persisted outputs: per-species CSV log, binary position dumps,
//! distribution CSVs, and the JSON provenance record.
//!
//! Gathers are collective; writing is rank 0's job. Open failures are
//! reported to the caller, which logs and continues — a missing
//! output file never aborts a run.

use crate::comm::Communicator;
use crate::diagnostics::{particle_kinetic_energies, radial_density_profile, value_histogram};
use crate::shell::ParticleShell;
use plasma_types::config::SimConfig;
use plasma_types::error::PlasmaResult;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Which outputs a run produces. `-n` on the command line clears all
/// three.
#[derive(Debug, Clone, Copy)]
pub struct OutputFlags {
    pub positions: bool,
    pub sim_data: bool,
    pub energy_dist: bool,
}

impl OutputFlags {
    pub fn none() -> Self {
        OutputFlags {
            positions: false,
            sim_data: false,
            energy_dist: false,
        }
    }

    pub fn any(&self) -> bool {
        self.positions || self.sim_data || self.energy_dist
    }
}

impl Default for OutputFlags {
    fn default() -> Self {
        OutputFlags {
            positions: false,
            sim_data: true,
            energy_dist: false,
        }
    }
}

pub fn species_log_path(dir: &Path, species: &str) -> PathBuf {
    dir.join(format!("simulation_output_{species}.txt"))
}

/// Append one row to the per-species CSV log; at `time == 0` the file
/// is created and the header written.
pub fn append_species_row(
    path: &Path,
    time: f64,
    energy: f64,
    max_r2: f64,
    n_total: u64,
    ranks: usize,
) -> PlasmaResult<()> {
    let mut file = if time == 0.0 {
        let mut f = File::create(path)?;
        writeln!(f, "Time(s),   Energy,   MaxR2,  NumParticles,  MPI_Ranks")?;
        f
    } else {
        OpenOptions::new().append(true).open(path)?
    };
    writeln!(
        file,
        "{time:.6}, {energy:.6e}, {max_r2:.6e}, {n_total}, {ranks}"
    )?;
    Ok(())
}

/// Gather positions to rank 0 and dump them in the binary layout:
/// `i32` step, `i32` total count, then x, y, z as contiguous
/// little-endian `f64` arrays. Collective; only rank 0 touches disk.
pub fn save_positions<C: Communicator>(
    dir: &Path,
    shell: &ParticleShell,
    step: usize,
    comm: &C,
    buffer_size: usize,
) -> PlasmaResult<()> {
    let all_x = comm.gatherv_to_root(&shell.x);
    let all_y = comm.gatherv_to_root(&shell.y);
    let all_z = comm.gatherv_to_root(&shell.z);

    let (Some(all_x), Some(all_y), Some(all_z)) = (all_x, all_y, all_z) else {
        return Ok(());
    };

    let path = dir.join(format!("positions_{}_step_{}.bin", shell.name, step));
    let file = File::create(path)?;
    let mut out = BufWriter::with_capacity(buffer_size.max(1), file);
    out.write_all(&(step as i32).to_le_bytes())?;
    out.write_all(&(all_x.len() as i32).to_le_bytes())?;
    for axis in [&all_x, &all_y, &all_z] {
        for v in axis.iter() {
            out.write_all(&v.to_le_bytes())?;
        }
    }
    out.flush()?;
    Ok(())
}

/// Gather per-particle kinetic energies and radii to rank 0 and write
/// the energy-distribution and radial-density CSVs for this step.
pub fn save_distributions<C: Communicator>(
    dir: &Path,
    shell: &ParticleShell,
    step: usize,
    comm: &C,
    radius: f64,
    n_bins: usize,
) -> PlasmaResult<()> {
    let energies = comm.gatherv_to_root(&particle_kinetic_energies(shell));
    let all_r2 = comm.gatherv_to_root(&shell.r2);

    let (Some(energies), Some(all_r2)) = (energies, all_r2) else {
        return Ok(());
    };

    let (centers, counts) = value_histogram(&energies, n_bins);
    let path = dir.join(format!("energy_distribution_{}_step_{}.csv", shell.name, step));
    let mut file = File::create(path)?;
    writeln!(file, "Energy, Count")?;
    for (c, n) in centers.iter().zip(counts.iter()) {
        writeln!(file, "{c:.6e}, {n}")?;
    }

    let (centers, density) = radial_density_profile(&all_r2, radius, n_bins);
    let path = dir.join(format!("radial_density_{}_step_{}.csv", shell.name, step));
    let mut file = File::create(path)?;
    writeln!(file, "Radius, Density")?;
    for (c, d) in centers.iter().zip(density.iter()) {
        writeln!(file, "{c:.6e}, {d:.6e}")?;
    }
    Ok(())
}

/// Dump the resolved configuration as JSON next to the other outputs.
pub fn write_provenance(dir: &Path, config: &SimConfig) -> PlasmaResult<()> {
    let path = dir.join("run_config.json");
    std::fs::write(path, config.to_json()?)?;
    Ok(())
}
