//! Types shared between the minesweeper server and its HTTP clients.
//!
//! [`models`] holds the resources the API hands back, [`protocol`] the
//! request bodies it accepts and the error envelope it answers with.

pub mod models;
pub mod protocol;
