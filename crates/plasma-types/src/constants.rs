// ─────────────────────────────────────────────────────────────────────
// Radial Plasma Kernel — Constants
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
/// Number of equal-width bins in the global r² histogram used for
/// splitter selection. Load imbalance after a redistribution pass is
/// bounded by the population of a single bin.
pub const NUM_HISTOGRAM_BINS: usize = 1024;

/// Below this width the global r² range is considered degenerate
/// (all particles at one radius) and is widened by one unit so bin
/// indexing stays well-defined.
pub const R2_DEGENERATE_WIDTH: f64 = 1e-15;

/// Particles with r² at or below this are treated as sitting at the
/// origin: their radial field is zeroed instead of divided.
pub const R2_ORIGIN_GUARD: f64 = 1e-30;

/// Radius guard for force application and pair potentials. Pairs
/// closer than this are skipped; a particle this close to the origin
/// receives no velocity kick.
pub const R_SINGULARITY_GUARD: f64 = 1e-15;
