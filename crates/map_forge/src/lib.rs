#![forbid(unsafe_code)]
//! map_forge: Deterministic RTS map generation on a concurrent dataflow pipeline.
//!
//! Modules:
//! - pipeline: two-phase scheduler of mutating operations on shared masks, with fan-out copies
//!   and a per-entry determinism hash log
//! - mask: float, boolean and four-channel grids carried by the pipeline
//! - graph: operator graphs, the operator registry and stage graphs with named endpoints
//! - sampling: point generation for scatter operators (Poisson disk, jitter grid)
//! - stages: the seven built-in stage graphs and their registry
//! - generator: configuration, pipeline composer, map generator and events
pub mod error;
pub mod generator;
pub mod graph;
pub mod mask;
pub mod pipeline;
pub mod sampling;
pub mod stages;

/// Convenient re-exports for common types. Import with `use map_forge::prelude::*;`.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::generator::{
        CivilianOptions, DecalOptions, EventSink, FnSink, GeneratedMap, GenerationConfig,
        GenerationEvent, GenerationEventKind, MapArtifact, MapGenerator, MultiSink,
        PipelineComposer, PropOptions, ResourceOptions, TerrainOptions, VecSink, WreckOptions,
    };
    pub use crate::graph::{
        Endpoint, GraphCompiler, GraphSpec, OpContext, Operator, OperatorRegistry, StageGraph,
        StageState, VertexSpec,
    };
    pub use crate::mask::{BooleanMask, FloatMask, MapMask, Mask, MaskId, MaskKind, Vector4Mask};
    pub use crate::pipeline::{
        DeterminismWarning, EntryId, HashLog, HashRecord, Phase, Pipeline, PipelineConfig,
    };
    pub use crate::sampling::{JitterGridSampling, PointSampling, PoissonDiskSampling};
    pub use crate::stages::{endpoints, StageKind, StageRegistry};
}
