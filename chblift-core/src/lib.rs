//! chblift core
//!
//! Lifts analyzed ARM functions into a pair of C-like syntax trees: a low-level
//! tree that mirrors each machine instruction and a high-level tree rebuilt from
//! the analyzer's symbolic facts, cross-linked so every high-level statement can
//! be traced back to the instructions it came from.

pub mod config;
pub mod lifter;
