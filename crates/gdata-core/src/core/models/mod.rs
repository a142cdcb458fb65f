//! Data models shared by the parsers and the dataset container.

pub mod charge;
pub mod record;
pub mod series;
