//! Pieces shared by the server crate and the binaries: response types and
//! logging initialisation.

pub mod types;
pub mod utils;
