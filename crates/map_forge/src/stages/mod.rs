//! The seven generation stages and the registry that builds them.
//!
//! Terrain depends only on the seed. Every other stage consumes a subset of Terrain's outputs
//! and nothing else, so all six can be scheduled independently of each other.
//!
//! | Stage    | Inputs            | Outputs                                     |
//! |----------|-------------------|---------------------------------------------|
//! | Terrain  |                   | Heightmap, Slope, Passable, Land            |
//! | Texture  | Heightmap, Slope  | Shadow, Normal, Textures Low, Textures High |
//! | Resource | Passable, Land    | Mexes, Hydros                               |
//! | Prop     | Passable, Slope   | Trees, Rocks, Boulders                      |
//! | Decal    | Land, Slope       | Field Decals, Slope Decals                  |
//! | Wreck    | Passable, Land    | Land Wrecks, Navy Wrecks                    |
//! | Civilian | Passable, Land    | Bases, Civilians                            |
use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::generator::config::GenerationConfig;
use crate::graph::StageGraph;

pub mod civilian;
pub mod decal;
pub mod prop;
pub mod resource;
pub mod terrain;
pub mod texture;
pub mod wreck;

/// Endpoint names shared between stages.
pub mod endpoints {
    pub const HEIGHTMAP: &str = "Heightmap";
    pub const SLOPE: &str = "Slope";
    pub const PASSABLE: &str = "Passable";
    pub const LAND: &str = "Land";

    pub const SHADOW: &str = "Shadow";
    pub const NORMAL: &str = "Normal";
    pub const TEXTURES_LOW: &str = "Textures Low";
    pub const TEXTURES_HIGH: &str = "Textures High";

    pub const MEXES: &str = "Mexes";
    pub const HYDROS: &str = "Hydros";

    pub const TREES: &str = "Trees";
    pub const ROCKS: &str = "Rocks";
    pub const BOULDERS: &str = "Boulders";

    pub const FIELD_DECALS: &str = "Field Decals";
    pub const SLOPE_DECALS: &str = "Slope Decals";

    pub const LAND_WRECKS: &str = "Land Wrecks";
    pub const NAVY_WRECKS: &str = "Navy Wrecks";

    pub const BASES: &str = "Bases";
    pub const CIVILIANS: &str = "Civilians";
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StageKind {
    Terrain,
    Texture,
    Resource,
    Prop,
    Decal,
    Wreck,
    Civilian,
}

impl StageKind {
    /// Every stage, Terrain first.
    pub const ALL: [StageKind; 7] = [
        StageKind::Terrain,
        StageKind::Texture,
        StageKind::Resource,
        StageKind::Prop,
        StageKind::Decal,
        StageKind::Wreck,
        StageKind::Civilian,
    ];

    /// Stages fed by Terrain, in scheduling order.
    pub const DEPENDENT: [StageKind; 6] = [
        StageKind::Texture,
        StageKind::Resource,
        StageKind::Prop,
        StageKind::Decal,
        StageKind::Wreck,
        StageKind::Civilian,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StageKind::Terrain => "terrain",
            StageKind::Texture => "texture",
            StageKind::Resource => "resource",
            StageKind::Prop => "prop",
            StageKind::Decal => "decal",
            StageKind::Wreck => "wreck",
            StageKind::Civilian => "civilian",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Builds the wired graph of one stage.
pub type StageConstructor = fn(&GenerationConfig) -> Result<StageGraph>;

/// Registry mapping stage kinds to graph constructors.
#[non_exhaustive]
pub struct StageRegistry {
    constructors: BTreeMap<StageKind, StageConstructor>,
}

impl StageRegistry {
    /// Creates a new, empty [`StageRegistry`].
    pub fn new() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Registry holding the built-in constructor of every stage.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(StageKind::Terrain, terrain::build);
        registry.register(StageKind::Texture, texture::build);
        registry.register(StageKind::Resource, resource::build);
        registry.register(StageKind::Prop, prop::build);
        registry.register(StageKind::Decal, decal::build);
        registry.register(StageKind::Wreck, wreck::build);
        registry.register(StageKind::Civilian, civilian::build);
        registry
    }

    /// Registers a constructor, replacing any previous one for `kind`.
    pub fn register(&mut self, kind: StageKind, constructor: StageConstructor) {
        self.constructors.insert(kind, constructor);
    }

    pub fn contains(&self, kind: StageKind) -> bool {
        self.constructors.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// Build the graph of `kind` from `config`.
    pub fn build(&self, kind: StageKind, config: &GenerationConfig) -> Result<StageGraph> {
        let constructor = self.constructors.get(&kind).ok_or_else(|| {
            Error::InvalidState(format!("no constructor registered for stage '{kind}'"))
        })?;
        constructor(config)
    }
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::graph::{Binding, OperatorRegistry, OutputBindings, StageContext, StageState};
    use crate::mask::MapMask;
    use crate::pipeline::{Pipeline, PipelineConfig};

    /// Builds `kind`, feeds it `inputs` as pre-registered masks, runs it alone and returns
    /// its outputs.
    pub(crate) fn run_stage(
        kind: StageKind,
        config: &GenerationConfig,
        inputs: Vec<(&str, MapMask)>,
    ) -> BTreeMap<String, MapMask> {
        let pipeline: Pipeline<MapMask> =
            Pipeline::new(PipelineConfig::default().with_worker_threads(2)).unwrap();
        let operators = OperatorRegistry::with_builtins();
        let mut upstream = OutputBindings::new();
        for (name, value) in inputs {
            let kind = value.kind();
            let mask = pipeline.register_mask(name, value);
            upstream.insert(name.to_string(), Binding { mask, kind });
        }

        let mut graph = StageRegistry::with_builtins().build(kind, config).unwrap();
        assert_eq!(graph.state(), StageState::Wired);
        let ctx = StageContext {
            pipeline: &pipeline,
            operators: &operators,
            seed: config.seed,
            width: config.width,
            height: config.height,
        };
        graph.setup_pipeline(&ctx, &upstream).unwrap();
        pipeline.start().unwrap();
        pipeline.join().unwrap();
        graph.finalize_pipeline(&pipeline).unwrap();
        graph.into_outputs().unwrap()
    }

    #[test]
    fn registry_builds_every_stage() {
        let registry = StageRegistry::with_builtins();
        assert_eq!(registry.len(), StageKind::ALL.len());
        let config = GenerationConfig::new(32, 32);
        for kind in StageKind::ALL {
            let graph = registry.build(kind, &config).unwrap();
            assert_eq!(graph.stage(), kind.name());
            graph.verify_contains().unwrap();
        }
    }

    #[test]
    fn dependent_stages_only_read_terrain_outputs() {
        let registry = StageRegistry::with_builtins();
        let config = GenerationConfig::new(16, 16);
        let terrain = registry.build(StageKind::Terrain, &config).unwrap();
        let provided = terrain.output_names();
        assert!(terrain.input_names().is_empty());

        for kind in StageKind::DEPENDENT {
            let graph = registry.build(kind, &config).unwrap();
            for input in graph.input_names() {
                assert!(provided.contains(&input), "{kind} reads unknown '{input}'");
            }
        }
    }

    #[test]
    fn missing_constructor_is_an_error() {
        let registry = StageRegistry::new();
        assert!(registry.is_empty());
        let err = registry
            .build(StageKind::Wreck, &GenerationConfig::default())
            .expect_err("nothing registered");
        assert!(matches!(err, Error::InvalidState(_)));
    }

    #[test]
    fn stage_names_are_lowercase() {
        assert_eq!(StageKind::Civilian.to_string(), "civilian");
    }
}
