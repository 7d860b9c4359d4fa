// ─────────────────────────────────────────────────────────────────────
// Radial Plasma Kernel — Plasma Core
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Distributed radial N-body kernel.
//!
//! Particles confined to a sphere evolve under the radially symmetric
//! mean electric field of the enclosed charge. Shells stay sorted by
//! r² across ranks so the field reduces to a distributed prefix scan.

pub mod comm;
pub mod diagnostics;
pub mod driver;
pub mod energy;
pub mod field;
#[cfg(feature = "mpi")]
pub mod mpi_comm;
pub mod output;
pub mod pusher;
pub mod redistribute;
pub mod shell;
