// ─────────────────────────────────────────────────────────────────────
// Radial Plasma Kernel — Config
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Simulation configuration and the line-based input-deck parser.
//!
//! The input format is text, one assignment per line. Lines starting
//! with `#` and blank lines are skipped, leading whitespace is
//! ignored. Scalar keys are assigned with `=`; species are declared
//! as `species <name> <iqom>`, one per line.

use crate::error::{PlasmaError, PlasmaResult};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::path::Path;

/// One particle species: a display name and the inverse
/// charge-over-mass ratio (mass is recovered as |iqom * q|).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesConfig {
    pub name: String,
    pub iqom: f64,
}

/// Full run configuration. Immutable once parsed; threaded through
/// the driver instead of living in process globals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Global particle count per species.
    pub n_total: u64,
    /// Sphere radius containing the initial positions.
    pub radius: f64,
    /// Timestep size.
    pub dt: f64,
    /// End time; the step count is ceil(tend / dt).
    pub tend: f64,
    /// Report/save cadence in steps.
    pub save_interval: usize,
    /// Capacity bound for the species table.
    pub max_species: usize,
    /// I/O buffer size hint for binary dumps.
    pub buffer_size: usize,
    pub species: Vec<SpeciesConfig>,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            n_total: 0,
            radius: 0.0,
            dt: 0.0,
            tend: 0.0,
            save_interval: 100,
            max_species: 10,
            buffer_size: 32_768,
            species: Vec::new(),
        }
    }
}

impl SimConfig {
    /// Parse an input deck from a string. Unknown keys are ignored so
    /// decks can carry site-specific annotations.
    pub fn from_str(text: &str) -> PlasmaResult<Self> {
        let mut cfg = SimConfig::default();

        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim_start();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(rest) = line.strip_prefix("species") {
                let mut fields = rest.split_whitespace();
                let name = fields.next().ok_or_else(|| {
                    PlasmaError::ConfigError(format!(
                        "line {}: species declaration needs a name",
                        lineno + 1
                    ))
                })?;
                let iqom = fields
                    .next()
                    .ok_or_else(|| {
                        PlasmaError::ConfigError(format!(
                            "line {}: species '{}' needs an iqom value",
                            lineno + 1,
                            name
                        ))
                    })
                    .and_then(|s| {
                        s.parse::<f64>().map_err(|_| {
                            PlasmaError::ConfigError(format!(
                                "line {}: species '{}' has non-numeric iqom '{}'",
                                lineno + 1,
                                name,
                                s
                            ))
                        })
                    })?;
                cfg.species.push(SpeciesConfig {
                    name: name.to_string(),
                    iqom,
                });
                continue;
            }

            let Some(eq) = line.find('=') else {
                continue;
            };
            let key = line[..eq].trim();
            let value = line[eq + 1..].trim();

            match key {
                "N" => cfg.n_total = parse_value(key, value, lineno)?,
                "R" => cfg.radius = parse_value(key, value, lineno)?,
                "dt" => cfg.dt = parse_value(key, value, lineno)?,
                "tend" => cfg.tend = parse_value(key, value, lineno)?,
                "SAVE_INTERVAL" => cfg.save_interval = parse_value(key, value, lineno)?,
                "MAX_SPECIES" => cfg.max_species = parse_value(key, value, lineno)?,
                "BUFFER_SIZE" => cfg.buffer_size = parse_value(key, value, lineno)?,
                _ => {}
            }
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Load and parse an input deck from disk.
    pub fn from_file<P: AsRef<Path>>(path: P) -> PlasmaResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_str(&contents)
    }

    fn validate(&self) -> PlasmaResult<()> {
        if self.n_total == 0
            || self.radius == 0.0
            || self.dt == 0.0
            || self.tend == 0.0
            || self.species.is_empty()
        {
            return Err(PlasmaError::ConfigError(
                "Missing or invalid parameters: N, R, dt, tend and at least one species are required"
                    .to_string(),
            ));
        }
        if self.species.len() > self.max_species {
            return Err(PlasmaError::ConfigError(format!(
                "{} species declared, MAX_SPECIES is {}",
                self.species.len(),
                self.max_species
            )));
        }
        if self.save_interval == 0 {
            return Err(PlasmaError::ConfigError(
                "SAVE_INTERVAL must be >= 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of timesteps: ceil(tend / dt).
    pub fn n_steps(&self) -> usize {
        (self.tend / self.dt).ceil() as usize
    }

    /// Total charge of one species, the volume of the initial sphere.
    pub fn total_charge(&self) -> f64 {
        4.0 / 3.0 * PI * self.radius.powi(3)
    }

    /// Charge carried by a single particle.
    pub fn charge_per_particle(&self) -> f64 {
        self.total_charge() / self.n_total as f64
    }

    /// Resolved configuration as pretty JSON, for provenance dumps.
    pub fn to_json(&self) -> PlasmaResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str, lineno: usize) -> PlasmaResult<T> {
    value.parse::<T>().map_err(|_| {
        PlasmaError::ConfigError(format!(
            "line {}: cannot parse value '{}' for key '{}'",
            lineno + 1,
            value,
            key
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DECK: &str = "\
# radial expansion test deck
N = 1000
R = 1.0
dt = 0.001
tend = 0.1
SAVE_INTERVAL = 10
MAX_SPECIES = 4
BUFFER_SIZE = 65536

species electrons -1.0
species ions 1836.0
";

    #[test]
    fn test_parse_full_deck() {
        let cfg = SimConfig::from_str(DECK).expect("deck should parse");
        assert_eq!(cfg.n_total, 1000);
        assert!((cfg.radius - 1.0).abs() < 1e-12);
        assert!((cfg.dt - 0.001).abs() < 1e-12);
        assert!((cfg.tend - 0.1).abs() < 1e-12);
        assert_eq!(cfg.save_interval, 10);
        assert_eq!(cfg.max_species, 4);
        assert_eq!(cfg.buffer_size, 65536);
        assert_eq!(cfg.species.len(), 2);
        assert_eq!(cfg.species[0].name, "electrons");
        assert!((cfg.species[1].iqom - 1836.0).abs() < 1e-12);
    }

    #[test]
    fn test_step_count_is_ceiling() {
        let cfg = SimConfig::from_str(DECK).expect("deck should parse");
        assert_eq!(cfg.n_steps(), 100);

        let deck = DECK.replace("tend = 0.1", "tend = 0.1005");
        let cfg = SimConfig::from_str(&deck).expect("deck should parse");
        assert_eq!(cfg.n_steps(), 101);
    }

    #[test]
    fn test_defaults_apply_when_keys_absent() {
        let deck = "N = 10\nR = 2.0\ndt = 0.01\ntend = 1.0\nspecies e -1.0\n";
        let cfg = SimConfig::from_str(deck).expect("deck should parse");
        assert_eq!(cfg.save_interval, 100);
        assert_eq!(cfg.max_species, 10);
        assert_eq!(cfg.buffer_size, 32_768);
    }

    #[test]
    fn test_missing_required_keys_rejected() {
        for deck in [
            "R = 1.0\ndt = 0.001\ntend = 0.1\nspecies e -1.0\n",
            "N = 10\ndt = 0.001\ntend = 0.1\nspecies e -1.0\n",
            "N = 10\nR = 1.0\ntend = 0.1\nspecies e -1.0\n",
            "N = 10\nR = 1.0\ndt = 0.001\nspecies e -1.0\n",
            "N = 10\nR = 1.0\ndt = 0.001\ntend = 0.1\n",
        ] {
            let err = SimConfig::from_str(deck).expect_err("incomplete deck must fail");
            match err {
                PlasmaError::ConfigError(msg) => {
                    assert!(msg.contains("Missing or invalid"), "unexpected message: {msg}")
                }
                other => panic!("Unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn test_species_capacity_enforced() {
        let deck = "N = 10\nR = 1.0\ndt = 0.001\ntend = 0.1\nMAX_SPECIES = 1\n\
                    species a 1.0\nspecies b 2.0\n";
        let err = SimConfig::from_str(deck).expect_err("over-capacity deck must fail");
        match err {
            PlasmaError::ConfigError(msg) => assert!(msg.contains("MAX_SPECIES")),
            other => panic!("Unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_species_rejected() {
        let deck = "N = 10\nR = 1.0\ndt = 0.001\ntend = 0.1\nspecies broken abc\n";
        let err = SimConfig::from_str(deck).expect_err("non-numeric iqom must fail");
        match err {
            PlasmaError::ConfigError(msg) => assert!(msg.contains("non-numeric iqom")),
            other => panic!("Unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_comments_and_unknown_keys_ignored() {
        let deck = "# header\n  # indented comment\nN = 4\nR = 1.0\ndt = 0.5\ntend = 1.0\n\
                    CLUSTER_NODES = 12\nspecies e -1.0\n";
        let cfg = SimConfig::from_str(deck).expect("deck should parse");
        assert_eq!(cfg.n_total, 4);
        assert_eq!(cfg.n_steps(), 2);
    }

    #[test]
    fn test_charge_per_particle_fills_sphere() {
        let cfg = SimConfig::from_str(DECK).expect("deck should parse");
        let expected = 4.0 / 3.0 * PI;
        assert!((cfg.total_charge() - expected).abs() < 1e-12);
        assert!((cfg.charge_per_particle() * 1000.0 - expected).abs() < 1e-9);
    }

    #[test]
    fn test_json_roundtrip() {
        let cfg = SimConfig::from_str(DECK).expect("deck should parse");
        let json = cfg.to_json().expect("serialization should succeed");
        let back: SimConfig = serde_json::from_str(&json).expect("roundtrip should parse");
        assert_eq!(back.n_total, cfg.n_total);
        assert_eq!(back.species.len(), cfg.species.len());
    }
}
