// ─────────────────────────────────────────────────────────────────────
// Radial Plasma Kernel — Multi-Rank Driver Tests
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Full simulation runs on the in-process cluster, including the
//! rank-0 output path.

use plasma_core::comm::LocalCluster;
use plasma_core::driver::Simulation;
use plasma_core::output::OutputFlags;
use plasma_types::config::SimConfig;
use std::path::PathBuf;

fn deck(n: u64) -> SimConfig {
    SimConfig::from_str(&format!(
        "N = {n}\nR = 1.0\ndt = 0.001\ntend = 0.01\nSAVE_INTERVAL = 5\nspecies ions 1.0\n"
    ))
    .expect("deck should parse")
}

fn temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("plasma-driver-{tag}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("temp dir");
    dir
}

#[test]
fn two_rank_run_conserves_energy_and_count() {
    let outcomes = LocalCluster::run(2, |comm| {
        let mut sim = Simulation::new(deck(16), OutputFlags::none(), std::env::temp_dir(), comm)
            .expect("init");
        let summary = sim.run().expect("run");
        (summary.drift_percent, sim.species()[0].len(), summary.steps)
    });

    let total: usize = outcomes.iter().map(|o| o.1).sum();
    assert_eq!(total, 16, "particles lost across ranks");
    for (drift, _, steps) in outcomes {
        assert_eq!(steps, 10);
        assert!(drift < 1.0, "energy drift {drift}% exceeds 1%");
    }
}

#[test]
fn uneven_particle_counts_are_distributed() {
    // 10 particles over 3 ranks: 4/3/3 before the first re-sort.
    let lens = LocalCluster::run(3, |comm| {
        let sim = Simulation::new(deck(10), OutputFlags::none(), std::env::temp_dir(), comm)
            .expect("init");
        sim.species()[0].len()
    });
    assert_eq!(lens.iter().sum::<usize>(), 10);
}

#[test]
fn rank_zero_writes_the_species_log() {
    let dir = temp_dir("csv");
    let flags = OutputFlags {
        positions: false,
        sim_data: true,
        energy_dist: false,
    };
    let dir_ref = &dir;
    LocalCluster::run(2, |comm| {
        let mut sim =
            Simulation::new(deck(12), flags, dir_ref.clone(), comm).expect("init");
        sim.run().expect("run");
    });

    let log = std::fs::read_to_string(dir.join("simulation_output_ions.txt"))
        .expect("rank 0 must have written the species log");
    let lines: Vec<&str> = log.lines().collect();
    assert!(lines[0].starts_with("Time(s),"));
    // Header plus saves at steps 0 and 5.
    assert_eq!(lines.len(), 3);
    for row in &lines[1..] {
        assert!(row.ends_with("12, 2"), "unexpected row: {row}");
    }
    let provenance = std::fs::read_to_string(dir.join("run_config.json")).expect("provenance");
    assert!(provenance.contains("\"n_total\": 12"));
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn position_dumps_cover_all_ranks() {
    let dir = temp_dir("pos");
    let flags = OutputFlags {
        positions: true,
        sim_data: false,
        energy_dist: false,
    };
    let dir_ref = &dir;
    LocalCluster::run(2, |comm| {
        let mut sim =
            Simulation::new(deck(10), flags, dir_ref.clone(), comm).expect("init");
        sim.run().expect("run");
    });

    let bytes = std::fs::read(dir.join("positions_ions_step_0.bin")).expect("dump exists");
    let n = i32::from_le_bytes(bytes[4..8].try_into().unwrap());
    assert_eq!(n, 10, "dump must gather every rank's particles");
    assert_eq!(bytes.len(), 8 + 3 * 10 * 8);
    std::fs::remove_dir_all(&dir).ok();
}
