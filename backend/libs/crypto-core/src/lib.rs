//! Cryptographic helpers shared by hub services.
//!
//! Currently a single module: the RS256 codec used to sign and verify
//! capability tokens exchanged between hubs.

pub mod jwt;
