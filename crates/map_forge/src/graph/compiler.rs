//! Compiler for operator graph specifications.
//!
//! Turns a [`GraphSpec`] into a [`CompiledGraph`]: every input reference is checked, every
//! operator tag is resolved through the [`OperatorRegistry`] and kind-checked against its
//! inputs, and a topological order is computed. The order is deterministic: among ready
//! vertices the smallest id comes first.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::graph::registry::{Operator, OperatorRegistry};
use crate::graph::spec::GraphSpec;
use crate::graph::VertexId;
use crate::mask::MaskKind;

/// A graph with resolved operators and its evaluation order.
#[derive(Clone)]
pub struct CompiledGraph {
    /// Topological order of vertex evaluation.
    pub order: Vec<VertexId>,
    /// Resolved operator per vertex.
    pub operators: BTreeMap<VertexId, Arc<dyn Operator>>,
}

impl fmt::Debug for CompiledGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledGraph")
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}

pub struct GraphCompiler;

impl GraphCompiler {
    /// Compiles a graph specification, resolving operators from `registry`.
    pub fn compile(spec: &GraphSpec, registry: &OperatorRegistry) -> Result<CompiledGraph> {
        let mut operators = BTreeMap::new();

        for (id, vertex) in &spec.vertices {
            let mut kinds: Vec<MaskKind> = Vec::with_capacity(vertex.inputs.len());
            for input in &vertex.inputs {
                let Some(source) = spec.vertices.get(input) else {
                    return Err(Error::Compile(format!(
                        "Vertex '{}' of '{}' references unknown input '{}'",
                        id, spec.name, input
                    )));
                };
                kinds.push(source.kind);
            }

            let operator = registry.get(&vertex.op).ok_or_else(|| {
                Error::Compile(format!(
                    "Vertex '{}' of '{}' uses unknown operator '{}'",
                    id, spec.name, vertex.op
                ))
            })?;
            operator.check(&kinds, vertex.kind).map_err(|message| {
                Error::Compile(format!(
                    "Vertex '{}' ({}) of '{}': {}",
                    id, vertex.op, spec.name, message
                ))
            })?;
            operators.insert(id.clone(), operator);
        }

        let order = topo_sort(spec)?;
        Ok(CompiledGraph { order, operators })
    }
}

fn topo_sort(spec: &GraphSpec) -> Result<Vec<VertexId>> {
    let mut indeg: BTreeMap<&str, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&str, BTreeMap<&str, usize>> = BTreeMap::new();

    for (id, vertex) in &spec.vertices {
        indeg.insert(id.as_str(), vertex.inputs.len());
        for input in &vertex.inputs {
            *dependents
                .entry(input.as_str())
                .or_default()
                .entry(id.as_str())
                .or_insert(0) += 1;
        }
    }

    let mut ready: BTreeSet<&str> = indeg
        .iter()
        .filter_map(|(k, &v)| (v == 0).then_some(*k))
        .collect();
    let mut out: Vec<VertexId> = Vec::with_capacity(spec.vertices.len());

    while let Some(n) = ready.pop_first() {
        out.push(n.to_string());
        if let Some(children) = dependents.get(n) {
            for (child, count) in children {
                if let Some(e) = indeg.get_mut(child) {
                    *e = e.saturating_sub(*count);
                    if *e == 0 {
                        ready.insert(*child);
                    }
                }
            }
        }
    }

    if out.len() != spec.vertices.len() {
        let stuck: Vec<&str> = indeg
            .iter()
            .filter_map(|(k, &v)| (v > 0).then_some(*k))
            .collect();
        return Err(Error::Compile(format!(
            "Cycle detected in '{}' involving {:?}",
            spec.name, stuck
        )));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::spec::VertexSpec;

    fn compile(spec: &GraphSpec) -> Result<CompiledGraph> {
        GraphCompiler::compile(spec, &OperatorRegistry::with_builtins())
    }

    #[test]
    fn compile_orders_vertices_topologically() {
        let mut spec = GraphSpec::new("terrain");
        spec.add("z_noise", VertexSpec::new("noise", MaskKind::Float));
        spec.add(
            "a_smooth",
            VertexSpec::new("smooth", MaskKind::Float).with_input("z_noise"),
        );
        spec.add(
            "m_slope",
            VertexSpec::new("slope", MaskKind::Float).with_input("a_smooth"),
        );
        spec.add(
            "Slope",
            VertexSpec::port(MaskKind::Float).with_input("m_slope"),
        );

        let program = compile(&spec).expect("compile succeeds");
        assert_eq!(program.order, vec!["z_noise", "a_smooth", "m_slope", "Slope"]);
        assert_eq!(program.operators.len(), 4);
    }

    #[test]
    fn order_is_stable_among_independent_vertices() {
        let mut spec = GraphSpec::new("g");
        for id in ["c", "a", "b"] {
            spec.add(id, VertexSpec::new("noise", MaskKind::Float));
        }
        spec.add(
            "sum",
            VertexSpec::new("add", MaskKind::Float).with_inputs(&["c", "b", "a"]),
        );
        let first = compile(&spec).unwrap().order;
        assert_eq!(first, vec!["a", "b", "c", "sum"]);
        assert_eq!(compile(&spec).unwrap().order, first);
    }

    #[test]
    fn compile_detects_unknown_inputs() {
        let mut spec = GraphSpec::new("g");
        spec.add(
            "bad",
            VertexSpec::new("smooth", MaskKind::Float).with_input("missing"),
        );
        let err = compile(&spec).expect_err("unknown input");
        assert!(matches!(err, Error::Compile(ref m) if m.contains("missing")));
    }

    #[test]
    fn compile_detects_unknown_operators() {
        let mut spec = GraphSpec::new("g");
        spec.add("x", VertexSpec::new("erosion", MaskKind::Float));
        let err = compile(&spec).expect_err("unknown operator");
        assert!(matches!(err, Error::Compile(ref m) if m.contains("erosion")));
    }

    #[test]
    fn compile_rejects_kind_mismatches() {
        let mut spec = GraphSpec::new("g");
        spec.add("h", VertexSpec::new("noise", MaskKind::Float));
        spec.add(
            "bad",
            VertexSpec::new("invert", MaskKind::Boolean).with_input("h"),
        );
        assert!(matches!(compile(&spec), Err(Error::Compile(_))));
    }

    #[test]
    fn compile_detects_cycles() {
        let mut spec = GraphSpec::new("g");
        spec.add("a", VertexSpec::new("smooth", MaskKind::Float).with_input("b"));
        spec.add("b", VertexSpec::new("smooth", MaskKind::Float).with_input("a"));
        let err = compile(&spec).expect_err("cycle should fail");
        assert!(matches!(err, Error::Compile(ref m) if m.contains("Cycle")));
    }

    #[test]
    fn compile_handles_duplicate_inputs() {
        let mut spec = GraphSpec::new("g");
        spec.add("a", VertexSpec::new("noise", MaskKind::Float));
        spec.add(
            "square",
            VertexSpec::new("multiply", MaskKind::Float).with_inputs(&["a", "a"]),
        );
        let program = compile(&spec).expect("compile succeeds");
        assert_eq!(program.order, vec!["a", "square"]);
    }
}
