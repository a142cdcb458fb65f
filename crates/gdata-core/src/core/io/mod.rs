//! Readers and writers for the molecule file formats and the binary array format.
//!
//! The text formats (`log`, `zmat`, `xyz`) implement [`traits::MoleculeFile`] and
//! produce padded [`MoleculeRecord`](crate::core::models::record::MoleculeRecord)s.
//! The `npy` module is the array codec used for dataset persistence.

pub mod log;
pub mod npy;
pub mod traits;
pub mod xyz;
pub mod zmat;
