//! Structural errors in SOP definitions.
//!
//! `MalformedSop` is the only hard failure in the engine: a defective
//! definition aborts loading that SOP and requires operator correction.
//! Everything downstream (missing case facts, matcher failures) degrades
//! into `Unknown` outcomes instead.

/// A structural defect found while loading a SOP definition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedSop {
    /// A required field is missing or has the wrong JSON type.
    #[error("invalid definition: {message}")]
    Invalid { message: String },

    /// Two decision points (or two actions within one point) share an id.
    #[error("duplicate id '{id}'")]
    DuplicateId { id: String },

    /// A root, prerequisite, or action `next` reference names a decision
    /// point that does not exist.
    #[error("dangling reference '{target}' from '{referrer}'")]
    DanglingReference { referrer: String, target: String },

    /// A decision point declares no candidate actions.
    #[error("decision point '{point}' has no candidate actions")]
    NoActions { point: String },

    /// A traversal path revisits a decision point.
    #[error("cycle through decision point '{point}'")]
    Cycle { point: String },

    /// The definition declares no root decision points.
    #[error("definition '{sop_id}' has no roots")]
    NoRoots { sop_id: String },
}

impl MalformedSop {
    pub fn invalid(message: impl Into<String>) -> Self {
        MalformedSop::Invalid {
            message: message.into(),
        }
    }
}
