//! handcast gameplay library
//!
//! Hand-gesture recognition for tracked VR hands and navigation recovery for
//! AI characters, exposed for the CLI and for host engines.

pub mod config;
pub mod game;
