//! Operator graphs: DAGs of named vertices, each computing one mask.
//!
//! A graph is authored as a [`GraphSpec`], compiled against an [`OperatorRegistry`] and, wrapped
//! in a [`StageGraph`], scheduled onto a [`crate::pipeline::Pipeline`]: every vertex becomes one
//! pipeline entry. Endpoint vertices are named ports through which stage graphs are wired
//! together.
pub mod compiler;
mod ops;
pub mod registry;
pub mod spec;
pub mod stage;

pub use compiler::{CompiledGraph, GraphCompiler};
pub use registry::{OpContext, Operator, OperatorRegistry};
pub use spec::{GraphSpec, Params, VertexSpec, PORT};
pub use stage::{
    Binding, Endpoint, EndpointRole, OutputBindings, StageContext, StageGraph, StageState,
};

pub type VertexId = String;

/// RNG seed of one vertex, derived from the run seed, stage name and vertex id.
pub fn vertex_seed(run_seed: u64, stage: &str, vertex: &str) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&run_seed.to_le_bytes());
    hasher.update(stage.as_bytes());
    hasher.update(&[0]);
    hasher.update(vertex.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hasher.finalize().as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}
