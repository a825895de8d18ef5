//! maze-core: SOP decision-graph model.
//!
//! A Standard Operating Procedure (SOP) is a branching decision structure:
//! a set of decision points, each offering candidate actions, only some of
//! which are correct given the case facts and the choices made so far.
//! This crate owns the definition-side types -- it parses a SOP definition
//! from JSON into a validated, immutable [`SopGraph`] and provides the
//! canonical traversal order used for alignment.
//!
//! Runtime evaluation (case contexts, response matching, scoring) lives in
//! `maze-eval`; this crate stays free of any matching strategy.
//!
//! # Public API
//!
//! - [`SopGraph::load`] -- parse + structurally validate a definition
//! - [`SopGraph::traversal_order`] -- deterministic top-down visiting order
//! - [`Condition`] -- declarative correctness rule over facts and history
//! - [`Value`] -- fact/literal value model
//! - [`MalformedSop`] -- the only fatal error class in the engine

pub mod condition;
pub mod error;
pub mod graph;
pub mod value;

pub use condition::{CompareOp, Condition};
pub use error::MalformedSop;
pub use graph::{CandidateAction, DecisionPoint, SopGraph};
pub use value::{normalize, Value};
