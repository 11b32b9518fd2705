//! Lifter
//!
//! - [`ast`]: arena-backed syntax tree, C-like renderer, wire records
//! - [`xdata`]: per-instruction analysis facts and their typed layouts
//! - [`builder`]: node construction and cross-reference tables
//! - [`arm`]: per-opcode lifting rules
//! - [`pipeline`]: function and program level driver

pub mod arm;
pub mod ast;
pub mod builder;
pub mod error;
pub mod pipeline;
pub mod xdata;

pub use builder::AstBuilder;
pub use error::{LiftError, LiftResult};
pub use pipeline::{FunctionLifter, FunctionRecord, LiftStats, LiftedFunction, ProgramRecord};
