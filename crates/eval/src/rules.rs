//! Three-valued correctness-rule evaluation.
//!
//! A rule that reads a fact absent from the case context must not resolve
//! to false -- "case data absent" is not "model chose wrong". Conditions
//! therefore evaluate to a Kleene ternary: `True`, `False`, or
//! `Indeterminate`. The evaluator maps `Indeterminate` to the `Unknown`
//! outcome.

use std::collections::BTreeMap;

use maze_core::{CompareOp, Condition, Value};

use crate::context::CaseContext;

/// Kleene three-valued truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ternary {
    True,
    False,
    Indeterminate,
}

impl Ternary {
    fn from_bool(b: bool) -> Ternary {
        if b {
            Ternary::True
        } else {
            Ternary::False
        }
    }

    fn not(self) -> Ternary {
        match self {
            Ternary::True => Ternary::False,
            Ternary::False => Ternary::True,
            Ternary::Indeterminate => Ternary::Indeterminate,
        }
    }
}

/// Choices recorded at earlier decision points, in traversal order:
/// point id -> chosen action id.
pub type History = BTreeMap<String, String>;

/// Evaluate a correctness rule against the case facts and prior choices.
///
/// `Indeterminate` is produced exactly when the rule reads a fact key
/// absent from the context, references a point with no recorded choice,
/// or applies an ordering comparison to non-numeric operands.
pub fn eval_condition(cond: &Condition, ctx: &CaseContext, history: &History) -> Ternary {
    match cond {
        Condition::Fact { key, op, value } => match ctx.get(key) {
            None => Ternary::Indeterminate,
            Some(actual) => compare(actual, *op, value),
        },

        Condition::All(children) => {
            let mut indeterminate = false;
            for child in children {
                match eval_condition(child, ctx, history) {
                    Ternary::False => return Ternary::False,
                    Ternary::Indeterminate => indeterminate = true,
                    Ternary::True => {}
                }
            }
            if indeterminate {
                Ternary::Indeterminate
            } else {
                Ternary::True
            }
        }

        Condition::Any(children) => {
            let mut indeterminate = false;
            for child in children {
                match eval_condition(child, ctx, history) {
                    Ternary::True => return Ternary::True,
                    Ternary::Indeterminate => indeterminate = true,
                    Ternary::False => {}
                }
            }
            if indeterminate {
                Ternary::Indeterminate
            } else {
                Ternary::False
            }
        }

        Condition::Not(inner) => eval_condition(inner, ctx, history).not(),

        Condition::Chose { point, action } => match history.get(point) {
            None => Ternary::Indeterminate,
            Some(chosen) => Ternary::from_bool(chosen == action),
        },

        Condition::Always(b) => Ternary::from_bool(*b),
    }
}

fn compare(actual: &Value, op: CompareOp, expected: &Value) -> Ternary {
    match op {
        CompareOp::Eq => Ternary::from_bool(actual.loose_eq(expected)),
        CompareOp::Ne => Ternary::from_bool(!actual.loose_eq(expected)),
        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
            match actual.partial_cmp_numeric(expected) {
                // Ordering on non-numeric operands is a rule defect; the
                // point degrades to Unknown instead of crashing the run.
                None => Ternary::Indeterminate,
                Some(ord) => {
                    let holds = match op {
                        CompareOp::Lt => ord == std::cmp::Ordering::Less,
                        CompareOp::Le => ord != std::cmp::Ordering::Greater,
                        CompareOp::Gt => ord == std::cmp::Ordering::Greater,
                        CompareOp::Ge => ord != std::cmp::Ordering::Less,
                        CompareOp::Eq | CompareOp::Ne => unreachable!(),
                    };
                    Ternary::from_bool(holds)
                }
            }
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
