//! Terrain: heightmap synthesis and land classification. Depends only on the seed.
use crate::error::Result;
use crate::generator::config::GenerationConfig;
use crate::graph::{Endpoint, StageGraph, VertexSpec};
use crate::mask::MaskKind::{Boolean, Float};
use crate::stages::endpoints::{HEIGHTMAP, LAND, PASSABLE, SLOPE};
use crate::stages::StageKind;

pub fn build(config: &GenerationConfig) -> Result<StageGraph> {
    let opts = &config.terrain;
    let mut graph = StageGraph::create_new(
        StageKind::Terrain.name(),
        &[
            Endpoint::output(HEIGHTMAP, Float),
            Endpoint::output(SLOPE, Float),
            Endpoint::output(PASSABLE, Boolean),
            Endpoint::output(LAND, Boolean),
        ],
    );

    graph
        .add_vertex(
            "base_noise",
            VertexSpec::new("noise", Float)
                .with_param("scale", opts.noise_scale)
                .with_param("octaves", opts.octaves as f32)
                .with_param("persistence", opts.persistence),
        )?
        .add_vertex(
            "detail_noise",
            VertexSpec::new("noise", Float)
                .with_param("scale", (opts.noise_scale / 4.0).max(1.0))
                .with_param("octaves", 2.0)
                .with_param("amplitude", 0.25),
        )?
        .add_vertex(
            "combined",
            VertexSpec::new("add", Float).with_inputs(&["base_noise", "detail_noise"]),
        )?
        .add_vertex(
            "smoothed",
            VertexSpec::new("smooth", Float)
                .with_input("combined")
                .with_param("radius", opts.smoothing as f32),
        )?
        .add_vertex(
            "height",
            VertexSpec::new("normalize", Float).with_input("smoothed"),
        )?
        .add_vertex("slope", VertexSpec::new("slope", Float).with_input("height"))?
        .add_vertex(
            "land",
            VertexSpec::new("threshold", Boolean)
                .with_input("height")
                .with_param("min", opts.water_level),
        )?
        .add_vertex(
            "flat",
            VertexSpec::new("threshold", Boolean)
                .with_input("slope")
                .with_param("max", opts.max_passable_slope),
        )?
        .add_vertex(
            "passable",
            VertexSpec::new("and", Boolean).with_inputs(&["land", "flat"]),
        )?;

    graph
        .wire_output(HEIGHTMAP, "height")?
        .wire_output(SLOPE, "slope")?
        .wire_output(PASSABLE, "passable")?
        .wire_output(LAND, "land")?;
    graph.finish_wiring()?;
    Ok(graph)
}
