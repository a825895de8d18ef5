//! The SOP decision graph.
//!
//! Decision points are held in an arena indexed by stable id; branching is
//! expressed as tagged edges (a candidate action optionally names the next
//! decision point). Construction validates the whole structure up front --
//! dangling references, duplicate ids, empty action sets, and cycles along
//! any traversal path are all `MalformedSop` -- so downstream evaluation
//! never has to handle a defective graph.

use std::collections::BTreeMap;

use crate::condition::Condition;
use crate::error::MalformedSop;

/// One selectable action at a decision point.
#[derive(Debug, Clone)]
pub struct CandidateAction {
    pub id: String,
    /// Canonical phrasing of the action, shown in reports and prompts.
    pub text: String,
    /// Match anchors for the baseline keyword matcher. Defaults to the
    /// action text when the definition omits them.
    pub keywords: Vec<String>,
    /// Correctness rule: the action is a correct choice iff this holds.
    /// Omitted in the definition means unconditionally acceptable.
    pub when: Condition,
    /// Decision point this action leads to, if any (branching edge).
    pub next: Option<String>,
}

/// One step of the SOP where an action must be chosen.
#[derive(Debug, Clone)]
pub struct DecisionPoint {
    pub id: String,
    /// Decision points that should have been resolved before this one.
    pub prerequisites: Vec<String>,
    /// Ordered, non-empty candidate actions.
    pub actions: Vec<CandidateAction>,
}

impl DecisionPoint {
    pub fn action(&self, id: &str) -> Option<&CandidateAction> {
        self.actions.iter().find(|a| a.id == id)
    }
}

/// A validated, immutable SOP definition.
#[derive(Debug, Clone)]
pub struct SopGraph {
    pub id: String,
    pub roots: Vec<String>,
    points: Vec<DecisionPoint>,
    index: BTreeMap<String, usize>,
}

impl SopGraph {
    /// Parse and validate a SOP definition from JSON.
    pub fn load(definition: &serde_json::Value) -> Result<SopGraph, MalformedSop> {
        let id = get_str(definition, "id")?;

        let roots: Vec<String> = definition
            .get("roots")
            .and_then(|r| r.as_array())
            .ok_or_else(|| MalformedSop::invalid("definition missing 'roots' array"))?
            .iter()
            .map(|r| {
                r.as_str()
                    .map(|s| s.to_string())
                    .ok_or_else(|| MalformedSop::invalid("'roots' entries must be strings"))
            })
            .collect::<Result<_, _>>()?;
        if roots.is_empty() {
            return Err(MalformedSop::NoRoots { sop_id: id });
        }

        let points_arr = definition
            .get("decision_points")
            .and_then(|p| p.as_array())
            .ok_or_else(|| MalformedSop::invalid("definition missing 'decision_points' array"))?;

        let mut points = Vec::with_capacity(points_arr.len());
        let mut index = BTreeMap::new();
        for point_json in points_arr {
            let point = parse_point(point_json)?;
            if index.contains_key(&point.id) {
                return Err(MalformedSop::DuplicateId {
                    id: point.id.clone(),
                });
            }
            index.insert(point.id.clone(), points.len());
            points.push(point);
        }

        let graph = SopGraph {
            id,
            roots,
            points,
            index,
        };
        graph.validate_references()?;
        graph.validate_acyclic()?;
        Ok(graph)
    }

    /// Look up a decision point by id.
    pub fn get(&self, id: &str) -> Option<&DecisionPoint> {
        self.index.get(id).map(|&i| &self.points[i])
    }

    /// All decision points in declaration order.
    pub fn points(&self) -> &[DecisionPoint] {
        &self.points
    }

    /// Canonical top-down visiting order: breadth-first from the roots in
    /// declaration order, each reachable point exactly once. Deterministic
    /// for a given graph; used to align response traces and reports.
    pub fn traversal_order(&self) -> Vec<&DecisionPoint> {
        let mut order = Vec::new();
        let mut seen = BTreeMap::new();
        let mut queue: std::collections::VecDeque<&str> =
            self.roots.iter().map(|r| r.as_str()).collect();

        while let Some(id) = queue.pop_front() {
            if seen.insert(id.to_string(), ()).is_some() {
                continue;
            }
            // load() guarantees every referenced id resolves
            let point = &self.points[self.index[id]];
            order.push(point);
            for action in &point.actions {
                if let Some(next) = &action.next {
                    if !seen.contains_key(next.as_str()) {
                        queue.push_back(next);
                    }
                }
            }
        }
        order
    }

    fn validate_references(&self) -> Result<(), MalformedSop> {
        for root in &self.roots {
            if !self.index.contains_key(root) {
                return Err(MalformedSop::DanglingReference {
                    referrer: format!("{}.roots", self.id),
                    target: root.clone(),
                });
            }
        }
        for point in &self.points {
            if point.actions.is_empty() {
                return Err(MalformedSop::NoActions {
                    point: point.id.clone(),
                });
            }
            for prereq in &point.prerequisites {
                if !self.index.contains_key(prereq) {
                    return Err(MalformedSop::DanglingReference {
                        referrer: point.id.clone(),
                        target: prereq.clone(),
                    });
                }
            }
            let mut action_ids: Vec<&str> = Vec::new();
            for action in &point.actions {
                if action_ids.contains(&action.id.as_str()) {
                    return Err(MalformedSop::DuplicateId {
                        id: format!("{}.{}", point.id, action.id),
                    });
                }
                action_ids.push(&action.id);
                if let Some(next) = &action.next {
                    if !self.index.contains_key(next) {
                        return Err(MalformedSop::DanglingReference {
                            referrer: format!("{}.{}", point.id, action.id),
                            target: next.clone(),
                        });
                    }
                }
                for chose_point in action.when.chose_points() {
                    if !self.index.contains_key(chose_point) {
                        return Err(MalformedSop::DanglingReference {
                            referrer: format!("{}.{}", point.id, action.id),
                            target: chose_point.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Depth-first check that no traversal path revisits a decision point.
    /// Diamond shapes (two branches rejoining) are legal; a back edge on
    /// the current path is not.
    fn validate_acyclic(&self) -> Result<(), MalformedSop> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            OnPath,
            Done,
        }
        let mut marks: BTreeMap<&str, Mark> = BTreeMap::new();

        fn visit<'a>(
            graph: &'a SopGraph,
            id: &'a str,
            marks: &mut BTreeMap<&'a str, Mark>,
        ) -> Result<(), MalformedSop> {
            match marks.get(id) {
                Some(Mark::OnPath) => {
                    return Err(MalformedSop::Cycle {
                        point: id.to_string(),
                    })
                }
                Some(Mark::Done) => return Ok(()),
                None => {}
            }
            marks.insert(id, Mark::OnPath);
            let point = &graph.points[graph.index[id]];
            for action in &point.actions {
                if let Some(next) = &action.next {
                    visit(graph, next, marks)?;
                }
            }
            marks.insert(id, Mark::Done);
            Ok(())
        }

        for root in &self.roots {
            visit(self, root, &mut marks)?;
        }
        Ok(())
    }
}

// ──────────────────────────────────────────────
// Definition JSON parsing
// ──────────────────────────────────────────────

fn get_str(obj: &serde_json::Value, field: &str) -> Result<String, MalformedSop> {
    obj.get(field)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| MalformedSop::invalid(format!("missing string field '{}'", field)))
}

fn parse_point(v: &serde_json::Value) -> Result<DecisionPoint, MalformedSop> {
    let id = get_str(v, "id")?;
    let prerequisites: Vec<String> = v
        .get("prerequisites")
        .and_then(|p| p.as_array())
        .unwrap_or(&Vec::new())
        .iter()
        .map(|p| {
            p.as_str().map(|s| s.to_string()).ok_or_else(|| {
                MalformedSop::invalid(format!("'{}' prerequisites must be strings", id))
            })
        })
        .collect::<Result<_, _>>()?;
    let actions_arr = v
        .get("actions")
        .and_then(|a| a.as_array())
        .ok_or_else(|| MalformedSop::invalid(format!("decision point '{}' missing 'actions'", id)))?;
    let actions: Vec<CandidateAction> = actions_arr
        .iter()
        .map(|a| parse_action(a, &id))
        .collect::<Result<_, _>>()?;
    if actions.is_empty() {
        return Err(MalformedSop::NoActions { point: id });
    }
    Ok(DecisionPoint {
        id,
        prerequisites,
        actions,
    })
}

fn parse_action(v: &serde_json::Value, point_id: &str) -> Result<CandidateAction, MalformedSop> {
    let id = get_str(v, "id")?;
    let text = get_str(v, "text")?;
    let keywords: Vec<String> = match v.get("keywords") {
        Some(k) => k
            .as_array()
            .ok_or_else(|| {
                MalformedSop::invalid(format!("'{}.{}' keywords must be an array", point_id, id))
            })?
            .iter()
            .map(|k| {
                k.as_str().map(|s| s.to_string()).ok_or_else(|| {
                    MalformedSop::invalid(format!(
                        "'{}.{}' keywords must be strings",
                        point_id, id
                    ))
                })
            })
            .collect::<Result<_, _>>()?,
        None => vec![text.clone()],
    };
    if keywords.is_empty() {
        return Err(MalformedSop::invalid(format!(
            "'{}.{}' has an empty keyword list",
            point_id, id
        )));
    }
    let when = match v.get("when") {
        Some(serde_json::Value::Null) | None => Condition::Always(true),
        Some(w) => Condition::from_json(w)?,
    };
    let next = match v.get("next") {
        Some(serde_json::Value::Null) | None => None,
        Some(n) => Some(
            n.as_str()
                .map(|s| s.to_string())
                .ok_or_else(|| MalformedSop::invalid("'next' must be a string or null"))?,
        ),
    };
    Ok(CandidateAction {
        id,
        text,
        keywords,
        when,
        next,
    })
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
