//! Generation configuration.
//!
//! [`GenerationConfig`] carries the seed, map size, worker pool settings and one option block
//! per stage. Every block has a [`Default`], builder-style setters and a `validate` method;
//! [`GenerationConfig::validate`] checks all of them.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pipeline::PipelineConfig;

/// Largest accepted map edge in cells.
pub const MAX_MAP_SIZE: usize = 4096;

fn ensure_positive(name: &str, value: f32) -> Result<()> {
    if !(value.is_finite() && value > 0.0) {
        return Err(Error::InvalidConfig(format!("{name} must be > 0")));
    }
    Ok(())
}

fn ensure_unit(name: &str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(Error::InvalidConfig(format!("{name} must be in [0, 1]")));
    }
    Ok(())
}

/// Heightmap synthesis and land classification.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq)]
pub struct TerrainOptions {
    /// Lattice spacing of the coarsest noise octave, in cells.
    pub noise_scale: f32,
    pub octaves: u32,
    /// Amplitude falloff per octave.
    pub persistence: f32,
    /// Box blur radius applied to the raw heightmap.
    pub smoothing: usize,
    /// Normalized height below which cells are water.
    pub water_level: f32,
    /// Steepest slope still passable by units.
    pub max_passable_slope: f32,
}

impl Default for TerrainOptions {
    fn default() -> Self {
        Self {
            noise_scale: 32.0,
            octaves: 4,
            persistence: 0.5,
            smoothing: 2,
            water_level: 0.3,
            max_passable_slope: 0.05,
        }
    }
}

impl TerrainOptions {
    pub fn with_noise_scale(mut self, noise_scale: f32) -> Self {
        self.noise_scale = noise_scale;
        self
    }

    pub fn with_water_level(mut self, water_level: f32) -> Self {
        self.water_level = water_level;
        self
    }

    pub fn with_max_passable_slope(mut self, max_passable_slope: f32) -> Self {
        self.max_passable_slope = max_passable_slope;
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure_positive("terrain.noise_scale", self.noise_scale)?;
        if self.octaves == 0 {
            return Err(Error::InvalidConfig("terrain.octaves must be > 0".into()));
        }
        ensure_unit("terrain.persistence", self.persistence)?;
        ensure_unit("terrain.water_level", self.water_level)?;
        ensure_positive("terrain.max_passable_slope", self.max_passable_slope)
    }
}

/// Mass extractor and hydrocarbon spots.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceOptions {
    pub mex_count: usize,
    /// Minimum distance between mexes.
    pub mex_spacing: f32,
    pub hydro_count: usize,
    pub hydro_spacing: f32,
    /// Cells of buildable ground required around a spot.
    pub build_margin: usize,
}

impl Default for ResourceOptions {
    fn default() -> Self {
        Self {
            mex_count: 16,
            mex_spacing: 10.0,
            hydro_count: 4,
            hydro_spacing: 24.0,
            build_margin: 1,
        }
    }
}

impl ResourceOptions {
    pub fn with_mex_count(mut self, mex_count: usize) -> Self {
        self.mex_count = mex_count;
        self
    }

    pub fn with_hydro_count(mut self, hydro_count: usize) -> Self {
        self.hydro_count = hydro_count;
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure_positive("resources.mex_spacing", self.mex_spacing)?;
        ensure_positive("resources.hydro_spacing", self.hydro_spacing)
    }
}

/// Trees, rocks and boulders.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq)]
pub struct PropOptions {
    pub tree_spacing: f32,
    pub tree_density: f32,
    pub rock_spacing: f32,
    pub rock_density: f32,
    /// Slope above which rocks may appear.
    pub rock_slope: f32,
    pub boulder_spacing: f32,
    pub boulder_density: f32,
}

impl Default for PropOptions {
    fn default() -> Self {
        Self {
            tree_spacing: 3.0,
            tree_density: 0.6,
            rock_spacing: 5.0,
            rock_density: 0.5,
            rock_slope: 0.03,
            boulder_spacing: 12.0,
            boulder_density: 0.3,
        }
    }
}

impl PropOptions {
    pub fn with_tree_density(mut self, tree_density: f32) -> Self {
        self.tree_density = tree_density;
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure_positive("props.tree_spacing", self.tree_spacing)?;
        ensure_positive("props.rock_spacing", self.rock_spacing)?;
        ensure_positive("props.boulder_spacing", self.boulder_spacing)?;
        ensure_unit("props.tree_density", self.tree_density)?;
        ensure_unit("props.rock_density", self.rock_density)?;
        ensure_unit("props.boulder_density", self.boulder_density)
    }
}

/// Ground decals.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq)]
pub struct DecalOptions {
    pub field_spacing: f32,
    pub field_density: f32,
    /// Slope above which slope decals are placed.
    pub slope_threshold: f32,
    pub slope_spacing: f32,
}

impl Default for DecalOptions {
    fn default() -> Self {
        Self {
            field_spacing: 12.0,
            field_density: 0.5,
            slope_threshold: 0.03,
            slope_spacing: 6.0,
        }
    }
}

impl DecalOptions {
    pub fn validate(&self) -> Result<()> {
        ensure_positive("decals.field_spacing", self.field_spacing)?;
        ensure_positive("decals.slope_spacing", self.slope_spacing)?;
        ensure_unit("decals.field_density", self.field_density)
    }
}

/// Unit wrecks on land and in water.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq)]
pub struct WreckOptions {
    pub land_count: usize,
    pub navy_count: usize,
    pub spacing: f32,
}

impl Default for WreckOptions {
    fn default() -> Self {
        Self {
            land_count: 8,
            navy_count: 4,
            spacing: 8.0,
        }
    }
}

impl WreckOptions {
    pub fn validate(&self) -> Result<()> {
        ensure_positive("wrecks.spacing", self.spacing)
    }
}

/// Civilian bases and scattered civilian structures.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, PartialEq)]
pub struct CivilianOptions {
    pub base_count: usize,
    pub base_spacing: f32,
    /// Cells of open ground required around a base.
    pub base_margin: usize,
    pub civilian_count: usize,
    pub civilian_spacing: f32,
}

impl Default for CivilianOptions {
    fn default() -> Self {
        Self {
            base_count: 2,
            base_spacing: 24.0,
            base_margin: 3,
            civilian_count: 6,
            civilian_spacing: 10.0,
        }
    }
}

impl CivilianOptions {
    pub fn validate(&self) -> Result<()> {
        ensure_positive("civilians.base_spacing", self.base_spacing)?;
        ensure_positive("civilians.civilian_spacing", self.civilian_spacing)
    }
}

/// Configuration for generating one map.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[non_exhaustive]
#[derive(Clone, Debug)]
pub struct GenerationConfig {
    pub seed: u64,
    /// Map width in cells.
    pub width: usize,
    /// Map height in cells.
    pub height: usize,
    pub pipeline: PipelineConfig,
    pub terrain: TerrainOptions,
    pub resources: ResourceOptions,
    pub props: PropOptions,
    pub decals: DecalOptions,
    pub wrecks: WreckOptions,
    pub civilians: CivilianOptions,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            width: 256,
            height: 256,
            pipeline: PipelineConfig::default(),
            terrain: TerrainOptions::default(),
            resources: ResourceOptions::default(),
            props: PropOptions::default(),
            decals: DecalOptions::default(),
            wrecks: WreckOptions::default(),
            civilians: CivilianOptions::default(),
        }
    }
}

impl GenerationConfig {
    /// Creates a new [`GenerationConfig`] for a map of the given size.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_terrain(mut self, terrain: TerrainOptions) -> Self {
        self.terrain = terrain;
        self
    }

    pub fn with_resources(mut self, resources: ResourceOptions) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_props(mut self, props: PropOptions) -> Self {
        self.props = props;
        self
    }

    pub fn with_decals(mut self, decals: DecalOptions) -> Self {
        self.decals = decals;
        self
    }

    pub fn with_wrecks(mut self, wrecks: WreckOptions) -> Self {
        self.wrecks = wrecks;
        self
    }

    pub fn with_civilians(mut self, civilians: CivilianOptions) -> Self {
        self.civilians = civilians;
        self
    }

    /// Validates the configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidConfig(
                "width and height must be > 0".into(),
            ));
        }
        if self.width > MAX_MAP_SIZE || self.height > MAX_MAP_SIZE {
            return Err(Error::InvalidConfig(format!(
                "width and height must be <= {MAX_MAP_SIZE}"
            )));
        }
        self.pipeline.validate()?;
        self.terrain.validate()?;
        self.resources.validate()?;
        self.props.validate()?;
        self.decals.validate()?;
        self.wrecks.validate()?;
        self.civilians.validate()
    }
}
