// ─────────────────────────────────────────────────────────────────────
// Radial Plasma Kernel — CLI
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! `radial-plasma <input_file> [-p] [-s] [-e] [-n]`
//!
//! Runs the radial plasma simulation described by the input deck.
//! Builds single-process by default; the `mpi` feature switches the
//! communicator to MPI_COMM_WORLD (launch under mpirun).

use clap::Parser;
use plasma_core::comm::Communicator;
use plasma_core::driver::Simulation;
use plasma_core::output::OutputFlags;
use plasma_types::config::SimConfig;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "radial-plasma", version, about = "Distributed radial N-body plasma simulation")]
struct Args {
    /// Simulation input deck.
    input_file: PathBuf,
    /// Save particle positions at every save interval.
    #[arg(short = 'p')]
    save_positions: bool,
    /// Save simulation data (on by default).
    #[arg(short = 's')]
    save_simulation_data: bool,
    /// Save energy and radial-density distributions.
    #[arg(short = 'e')]
    save_energy_distribution: bool,
    /// Do not save any data.
    #[arg(short = 'n')]
    no_save: bool,
}

impl Args {
    fn output_flags(&self) -> OutputFlags {
        if self.no_save {
            return OutputFlags::none();
        }
        OutputFlags {
            positions: self.save_positions,
            // -s is the default; the flag exists so decks stay
            // script-compatible.
            sim_data: true,
            energy_dist: self.save_energy_distribution,
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    #[cfg(feature = "mpi")]
    {
        let Some((_universe, comm)) = plasma_core::mpi_comm::MpiComm::initialize() else {
            eprintln!("Error initializing MPI");
            return ExitCode::from(1);
        };
        drive(&args, comm)
    }
    #[cfg(not(feature = "mpi"))]
    {
        drive(&args, plasma_core::comm::SelfComm)
    }
}

fn drive<C: Communicator>(args: &Args, comm: C) -> ExitCode {
    let rank = comm.rank();
    let size = comm.size();
    let flags = args.output_flags();

    let config = match SimConfig::from_file(&args.input_file) {
        Ok(config) => config,
        Err(err) => {
            if rank == 0 {
                eprintln!("Error reading {}: {err}", args.input_file.display());
            }
            return ExitCode::from(1);
        }
    };

    let output_dir = PathBuf::from("output");
    if rank == 0 && flags.any() {
        if let Err(err) = std::fs::create_dir_all(&output_dir) {
            log::warn!("cannot create output directory: {err}");
        }
    }
    comm.barrier();

    if rank == 0 {
        println!("=== Radial Plasma Simulation ===");
        println!("Total particles: {}", config.n_total);
        println!("Ranks: {size}");
        println!(
            "Particles per rank (approx): {}",
            config.n_total / size as u64
        );
        println!("Time steps: {}", config.n_steps());
        println!("Species: {}", config.species.len());
        println!("================================\n");
    }

    let mut sim = match Simulation::new(config, flags, output_dir, comm) {
        Ok(sim) => sim,
        Err(err) => {
            if rank == 0 {
                eprintln!("Error during initialization: {err}");
            }
            return ExitCode::from(1);
        }
    };

    if rank == 0 {
        println!("Initial energy: {:.6e}\n", sim.initial_energy());
    }

    match sim.run() {
        Ok(summary) => {
            sim.report_performance(&summary);
            ExitCode::SUCCESS
        }
        Err(err) => {
            if rank == 0 {
                eprintln!("Run failed: {err}");
            }
            ExitCode::from(1)
        }
    }
}
