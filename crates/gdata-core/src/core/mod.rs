//! # Core Module
//!
//! Stateless building blocks shared by the dataset container.
//!
//! - **Reference data** ([`elements`]) - Atomic number, symbol and mass lookups
//! - **Molecule data** ([`models`]) - Padded per-molecule records, series identifiers
//!   and the charge scheme tag
//! - **File I/O** ([`io`]) - Gaussian log, z-matrix and xyz parsers, the xyz writer and
//!   the `.npy` array codec
//! - **Geometry** ([`utils`]) - Internal-coordinate placement and inertia calculations

pub mod elements;
pub mod io;
pub mod models;
pub mod utils;
