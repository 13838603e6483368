//! Stage graphs: operator graphs with named endpoints and a scheduling lifecycle.
//!
//! A [`StageGraph`] moves through [`StageState`] in order:
//!
//! 1. `Unbuilt`: endpoints declared with [`StageGraph::create_new`]; stage builders add internal
//!    vertices and wire output ports.
//! 2. `Wired`: after [`StageGraph::finish_wiring`] (or [`StageGraph::from_graph_and_map`]); every
//!    referenced vertex exists.
//! 3. `Initialized`: upstream outputs bound to input ports, endpoints verified, graph compiled.
//! 4. `Scheduled`: every vertex registered with the pipeline. Nothing has run yet.
//! 5. `Finalized`: output values read back after the pipeline completed.
//!
//! Calling an operation out of order is [`Error::InvalidState`].
use std::collections::BTreeMap;
use std::panic::Location;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::graph::compiler::{CompiledGraph, GraphCompiler};
use crate::graph::registry::{OpContext, OperatorRegistry};
use crate::graph::spec::{GraphSpec, VertexSpec};
use crate::graph::{vertex_seed, VertexId};
use crate::mask::{MapMask, MaskId, MaskKind};
use crate::pipeline::Pipeline;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum StageState {
    Unbuilt,
    Wired,
    Initialized,
    Scheduled,
    Finalized,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndpointRole {
    Input,
    Output,
}

/// Declaration of a named port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub name: String,
    pub role: EndpointRole,
    pub kind: MaskKind,
}

impl Endpoint {
    pub fn input(name: impl Into<String>, kind: MaskKind) -> Self {
        Self {
            name: name.into(),
            role: EndpointRole::Input,
            kind,
        }
    }

    pub fn output(name: impl Into<String>, kind: MaskKind) -> Self {
        Self {
            name: name.into(),
            role: EndpointRole::Output,
            kind,
        }
    }
}

/// A scheduled mask exposed under an endpoint name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Binding {
    pub mask: MaskId,
    pub kind: MaskKind,
}

/// Output endpoint name to scheduled mask.
pub type OutputBindings = BTreeMap<String, Binding>;

/// Shared inputs for scheduling a stage.
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    pub pipeline: &'a Pipeline<MapMask>,
    pub operators: &'a OperatorRegistry,
    pub seed: u64,
    pub width: usize,
    pub height: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct EndpointBinding {
    vertex: VertexId,
    role: EndpointRole,
}

/// One generation stage as an operator graph. See the [module documentation](self).
#[derive(Debug)]
pub struct StageGraph {
    stage: String,
    spec: GraphSpec,
    endpoints: BTreeMap<String, EndpointBinding>,
    state: StageState,
    inputs: BTreeMap<String, Binding>,
    compiled: Option<CompiledGraph>,
    masks: BTreeMap<VertexId, MaskId>,
    outputs: BTreeMap<String, MapMask>,
    // Where each vertex was added; reported as the call site of its pipeline entry.
    sites: BTreeMap<VertexId, &'static Location<'static>>,
    origin: &'static Location<'static>,
}

impl StageGraph {
    /// A graph holding only the declared endpoint vertices, each named after its endpoint.
    #[track_caller]
    pub fn create_new(stage: impl Into<String>, endpoints: &[Endpoint]) -> Self {
        let origin = Location::caller();
        let stage = stage.into();
        let mut spec = GraphSpec::new(stage.clone());
        let mut bindings = BTreeMap::new();
        for endpoint in endpoints {
            spec.add(&endpoint.name, VertexSpec::port(endpoint.kind));
            bindings.insert(
                endpoint.name.clone(),
                EndpointBinding {
                    vertex: endpoint.name.clone(),
                    role: endpoint.role,
                },
            );
        }
        Self::with_parts(stage, spec, bindings, StageState::Unbuilt, origin)
    }

    /// Rebind endpoint names onto a previously built graph. A mapped vertex that is a port
    /// without producer becomes an input endpoint, any other vertex an output endpoint.
    /// Entries of the rebound vertices report this call as their call site.
    #[track_caller]
    pub fn from_graph_and_map(
        stage: impl Into<String>,
        spec: GraphSpec,
        name_to_vertex: BTreeMap<String, VertexId>,
    ) -> Result<Self> {
        let origin = Location::caller();
        let stage = stage.into();
        let mut bindings = BTreeMap::new();
        for (name, vertex) in name_to_vertex {
            let role = match spec.get(&vertex) {
                Some(v) if v.is_input_port() => EndpointRole::Input,
                _ => EndpointRole::Output,
            };
            bindings.insert(name, EndpointBinding { vertex, role });
        }
        let graph = Self::with_parts(stage, spec, bindings, StageState::Wired, origin);
        graph.verify_contains()?;
        Ok(graph)
    }

    fn with_parts(
        stage: String,
        spec: GraphSpec,
        endpoints: BTreeMap<String, EndpointBinding>,
        state: StageState,
        origin: &'static Location<'static>,
    ) -> Self {
        Self {
            stage,
            spec,
            endpoints,
            state,
            inputs: BTreeMap::new(),
            compiled: None,
            masks: BTreeMap::new(),
            outputs: BTreeMap::new(),
            sites: BTreeMap::new(),
            origin,
        }
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    pub fn state(&self) -> StageState {
        self.state
    }

    pub fn spec(&self) -> &GraphSpec {
        &self.spec
    }

    fn expect_state(&self, expected: StageState, action: &str) -> Result<()> {
        if self.state != expected {
            return Err(Error::InvalidState(format!(
                "stage '{}' cannot {} in state {:?} (expected {:?})",
                self.stage, action, self.state, expected
            )));
        }
        Ok(())
    }

    /// Add an internal vertex.
    #[track_caller]
    pub fn add_vertex(&mut self, id: &str, vertex: VertexSpec) -> Result<&mut Self> {
        let site = Location::caller();
        self.expect_state(StageState::Unbuilt, "add vertices")?;
        if self.endpoints.values().any(|e| e.vertex == id) {
            return Err(Error::Wiring(format!(
                "vertex '{}' of stage '{}' is an endpoint",
                id, self.stage
            )));
        }
        self.spec.add(id, vertex);
        self.sites.insert(id.to_string(), site);
        Ok(self)
    }

    /// Connect output endpoint `endpoint` to the vertex producing its value.
    #[track_caller]
    pub fn wire_output(&mut self, endpoint: &str, producer: &str) -> Result<&mut Self> {
        let site = Location::caller();
        self.expect_state(StageState::Unbuilt, "wire outputs")?;
        let binding = match self.endpoints.get(endpoint) {
            Some(b) if b.role == EndpointRole::Output => b.vertex.clone(),
            Some(_) => {
                return Err(Error::Wiring(format!(
                    "endpoint '{}' of stage '{}' is an input",
                    endpoint, self.stage
                )))
            }
            None => {
                return Err(Error::Wiring(format!(
                    "stage '{}' has no endpoint '{}'",
                    self.stage, endpoint
                )))
            }
        };
        if let Some(port) = self.spec.get_mut(&binding) {
            port.inputs = vec![producer.to_string()];
        }
        self.sites.insert(binding, site);
        Ok(self)
    }

    /// Close the building phase.
    pub fn finish_wiring(&mut self) -> Result<()> {
        self.expect_state(StageState::Unbuilt, "finish wiring")?;
        self.verify_contains()?;
        self.state = StageState::Wired;
        Ok(())
    }

    /// Endpoint name to vertex id.
    pub fn endpoint_map(&self) -> BTreeMap<String, VertexId> {
        self.endpoints
            .iter()
            .map(|(name, b)| (name.clone(), b.vertex.clone()))
            .collect()
    }

    fn endpoint_names(&self, role: EndpointRole) -> Vec<&str> {
        self.endpoints
            .iter()
            .filter(|(_, b)| b.role == role)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn input_names(&self) -> Vec<&str> {
        self.endpoint_names(EndpointRole::Input)
    }

    pub fn output_names(&self) -> Vec<&str> {
        self.endpoint_names(EndpointRole::Output)
    }

    /// Every endpoint vertex and every referenced input vertex exists.
    pub fn verify_contains(&self) -> Result<()> {
        let missing = |vertex: &str| Error::MissingVertex {
            graph: self.stage.clone(),
            vertex: vertex.to_string(),
        };
        for binding in self.endpoints.values() {
            if !self.spec.contains(&binding.vertex) {
                return Err(missing(&binding.vertex));
            }
        }
        for vertex in self.spec.vertices.values() {
            if let Some(input) = vertex.inputs.iter().find(|i| !self.spec.contains(i)) {
                return Err(missing(input));
            }
        }
        Ok(())
    }

    /// Every input endpoint is bound, every output endpoint has a producer and no other
    /// vertex is a port left without a producer.
    pub fn verify_defined(&self) -> Result<()> {
        for (name, binding) in &self.endpoints {
            let defined = match binding.role {
                EndpointRole::Input => self.inputs.contains_key(name),
                EndpointRole::Output => self
                    .spec
                    .get(&binding.vertex)
                    .is_some_and(|v| !v.is_input_port()),
            };
            if !defined {
                return Err(Error::UnwiredEndpoint {
                    graph: self.stage.clone(),
                    endpoint: name.clone(),
                });
            }
        }
        let dangling = self.spec.vertices.iter().find(|(id, vertex)| {
            vertex.is_input_port() && !self.endpoints.values().any(|b| &b.vertex == *id)
        });
        if let Some((id, _)) = dangling {
            return Err(Error::UnwiredEndpoint {
                graph: self.stage.clone(),
                endpoint: id.clone(),
            });
        }
        Ok(())
    }

    /// Bind upstream outputs to this graph's input ports, verify endpoints and compile.
    /// Upstream bindings without a matching input port are ignored.
    pub fn initialize_pipeline(
        &mut self,
        operators: &OperatorRegistry,
        upstream: &OutputBindings,
    ) -> Result<()> {
        self.expect_state(StageState::Wired, "initialize")?;
        for (name, binding) in &self.endpoints {
            if binding.role != EndpointRole::Input {
                continue;
            }
            let Some(bound) = upstream.get(name) else {
                continue;
            };
            let expected = self
                .spec
                .get(&binding.vertex)
                .map(|v| v.kind)
                .ok_or_else(|| Error::MissingVertex {
                    graph: self.stage.clone(),
                    vertex: binding.vertex.clone(),
                })?;
            if bound.kind != expected {
                return Err(Error::Wiring(format!(
                    "input '{}' of stage '{}' expects a {:?} mask but was given {:?}",
                    name, self.stage, expected, bound.kind
                )));
            }
            self.inputs.insert(name.clone(), *bound);
        }
        self.verify_defined()?;
        self.compiled = Some(GraphCompiler::compile(&self.spec, operators)?);
        self.state = StageState::Initialized;
        Ok(())
    }

    /// Register every vertex with the pipeline in topological order. Non-blocking.
    ///
    /// On error the graph stays `Initialized` and keeps its compiled form, but entries
    /// declared before the failure remain in the pipeline. Retry on a fresh pipeline.
    pub fn schedule(&mut self, ctx: &StageContext<'_>) -> Result<()> {
        self.expect_state(StageState::Initialized, "schedule")?;
        let compiled = self
            .compiled
            .as_ref()
            .ok_or_else(|| Error::InvalidState("stage graph was not compiled".into()))?;

        let bound_ports: BTreeMap<&str, MaskId> = self
            .endpoints
            .iter()
            .filter_map(|(name, b)| self.inputs.get(name).map(|i| (b.vertex.as_str(), i.mask)))
            .collect();

        let mut masks: BTreeMap<VertexId, MaskId> = BTreeMap::new();
        for id in &compiled.order {
            let vertex = self.spec.get(id).ok_or_else(|| Error::MissingVertex {
                graph: self.stage.clone(),
                vertex: id.clone(),
            })?;
            if let Some(mask) = bound_ports.get(id.as_str()) {
                masks.insert(id.clone(), *mask);
                continue;
            }

            let target = ctx.pipeline.register_mask(
                format!("{}/{}", self.stage, id),
                MapMask::empty(vertex.kind, ctx.width, ctx.height),
            );

            let mut dependencies: Vec<MaskId> = Vec::new();
            let mut positions: Vec<usize> = Vec::with_capacity(vertex.inputs.len());
            for input in &vertex.inputs {
                let mask = masks.get(input).copied().ok_or_else(|| {
                    Error::Compile(format!("vertex '{}' scheduled before '{}'", id, input))
                })?;
                let position = match dependencies.iter().position(|m| *m == mask) {
                    Some(p) => p,
                    None => {
                        dependencies.push(mask);
                        dependencies.len() - 1
                    }
                };
                positions.push(position);
            }

            let operator = compiled.operators.get(id).cloned().ok_or_else(|| {
                Error::Compile(format!("vertex '{}' has no resolved operator", id))
            })?;
            let op_ctx = OpContext {
                stage: self.stage.clone(),
                vertex: id.clone(),
                seed: vertex_seed(ctx.seed, &self.stage, id),
                params: vertex.params.clone(),
            };

            let site = self.sites.get(id).copied().unwrap_or(self.origin);
            ctx.pipeline.declare_at(
                site,
                format!("{}::{}({})", self.stage, id, vertex.op),
                target,
                &dependencies,
                move |value, resolved| {
                    let inputs = if positions.len() == resolved.len()
                        && positions.iter().enumerate().all(|(i, p)| i == *p)
                    {
                        resolved
                    } else {
                        positions.iter().map(|p| resolved[*p].clone()).collect()
                    };
                    operator.apply(&op_ctx, value, inputs)
                },
            )?;
            masks.insert(id.clone(), target);
        }

        debug!(
            "Stage '{}' scheduled {} vertices.",
            self.stage,
            compiled.order.len()
        );
        self.compiled = None;
        self.masks = masks;
        self.state = StageState::Scheduled;
        Ok(())
    }

    /// [`StageGraph::initialize_pipeline`] followed by [`StageGraph::schedule`].
    pub fn setup_pipeline(
        &mut self,
        ctx: &StageContext<'_>,
        upstream: &OutputBindings,
    ) -> Result<()> {
        self.initialize_pipeline(ctx.operators, upstream)?;
        self.schedule(ctx)?;
        info!(
            "Stage '{}' set up with {} inputs and {} outputs.",
            self.stage,
            self.inputs.len(),
            self.output_names().len()
        );
        Ok(())
    }

    /// Scheduled masks of the output endpoints, for wiring into downstream stages.
    pub fn output_bindings(&self) -> Result<OutputBindings> {
        self.expect_state(StageState::Scheduled, "expose output bindings")?;
        let mut bindings = OutputBindings::new();
        for (name, binding) in &self.endpoints {
            if binding.role != EndpointRole::Output {
                continue;
            }
            let mask = self.masks.get(&binding.vertex).copied();
            let kind = self.spec.get(&binding.vertex).map(|v| v.kind);
            if let (Some(mask), Some(kind)) = (mask, kind) {
                bindings.insert(name.clone(), Binding { mask, kind });
            }
        }
        Ok(bindings)
    }

    /// Read every output value back from the completed pipeline.
    pub fn finalize_pipeline(&mut self, pipeline: &Pipeline<MapMask>) -> Result<()> {
        self.expect_state(StageState::Scheduled, "finalize")?;
        let bindings = self.output_bindings()?;
        let mut outputs = BTreeMap::new();
        for (name, binding) in bindings {
            let value = pipeline.get_result(binding.mask, binding.mask)?;
            outputs.insert(name, value);
        }
        self.outputs = outputs;
        self.state = StageState::Finalized;
        Ok(())
    }

    /// Finalized output by endpoint name.
    pub fn output(&self, name: &str) -> Result<&MapMask> {
        self.expect_state(StageState::Finalized, "read outputs")?;
        self.outputs.get(name).ok_or_else(|| {
            Error::Wiring(format!("stage '{}' has no output '{}'", self.stage, name))
        })
    }

    /// All finalized outputs, consuming the graph.
    pub fn into_outputs(self) -> Result<BTreeMap<String, MapMask>> {
        self.expect_state(StageState::Finalized, "hand out outputs")?;
        Ok(self.outputs)
    }
}
