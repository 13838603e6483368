//! Specification types for authoring operator graphs.
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::graph::VertexId;
use crate::mask::MaskKind;

/// Operator tag of endpoint vertices.
pub const PORT: &str = "port";

/// Named scalar parameters of a vertex.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Params(BTreeMap<String, f32>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value of `name`, or `default` when unset.
    pub fn get(&self, name: &str, default: f32) -> f32 {
        self.0.get(name).copied().unwrap_or(default)
    }

    pub fn set(&mut self, name: impl Into<String>, value: f32) -> &mut Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// One vertex: an operator tag, its ordered inputs, output kind and parameters.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct VertexSpec {
    pub op: String,
    pub inputs: Vec<VertexId>,
    pub kind: MaskKind,
    #[cfg_attr(feature = "serde", serde(default))]
    pub params: Params,
}

impl VertexSpec {
    pub fn new(op: impl Into<String>, kind: MaskKind) -> Self {
        Self {
            op: op.into(),
            inputs: Vec::new(),
            kind,
            params: Params::new(),
        }
    }

    /// An endpoint vertex without producer.
    pub fn port(kind: MaskKind) -> Self {
        Self::new(PORT, kind)
    }

    pub fn with_input(mut self, id: impl Into<VertexId>) -> Self {
        self.inputs.push(id.into());
        self
    }

    pub fn with_inputs(mut self, ids: &[&str]) -> Self {
        self.inputs.extend(ids.iter().map(|id| id.to_string()));
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: f32) -> Self {
        self.params.set(name, value);
        self
    }

    /// `true` for a port vertex whose value is bound from outside the graph.
    pub fn is_input_port(&self) -> bool {
        self.op == PORT && self.inputs.is_empty()
    }
}

/// A specification of an operator graph.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub struct GraphSpec {
    pub name: String,
    pub vertices: BTreeMap<VertexId, VertexSpec>,
}

impl GraphSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vertices: BTreeMap::new(),
        }
    }

    /// Add or replace a vertex.
    pub fn add(&mut self, id: &str, spec: VertexSpec) -> &mut Self {
        self.vertices.insert(id.to_string(), spec);
        self
    }

    pub fn contains(&self, id: &str) -> bool {
        self.vertices.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&VertexSpec> {
        self.vertices.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut VertexSpec> {
        self.vertices.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }
}
