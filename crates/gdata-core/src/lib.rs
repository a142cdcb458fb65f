//! # Gdata Core Library
//!
//! A container for quantum-chemistry datasets: batches of molecules read from Gaussian
//! output, Gaussian input (z-matrix) and xyz files, normalised into fixed-shape padded
//! arrays for machine-learning pipelines.
//!
//! ## Architecture
//!
//! - **[`core`]: The Foundation.** Stateless pieces: the element reference table,
//!   per-molecule records, the format parsers, the `.npy` codec and geometric helpers.
//!
//! - **[`dataset`]: The Container.** The [`Dataset`](dataset::Dataset) keeps five
//!   parallel series (structures, charges, names, topologies, dipoles) consistent
//!   under insertion, deletion, resizing, ingestion, persistence and merging, and
//!   offers geometric and graph projections of its contents.

pub mod core;
pub mod dataset;
