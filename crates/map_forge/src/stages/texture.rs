//! Texture: lighting and splat layers derived from the heightmap and slope.
use crate::error::Result;
use crate::generator::config::GenerationConfig;
use crate::graph::{Endpoint, StageGraph, VertexSpec};
use crate::mask::MaskKind::{Float, Vector4};
use crate::stages::endpoints::{HEIGHTMAP, NORMAL, SHADOW, SLOPE, TEXTURES_HIGH, TEXTURES_LOW};
use crate::stages::StageKind;

/// Height lost per cell by the light ray in the shadow sweep.
const SHADOW_DROP: f32 = 0.01;

pub fn build(config: &GenerationConfig) -> Result<StageGraph> {
    let mut graph = StageGraph::create_new(
        StageKind::Texture.name(),
        &[
            Endpoint::input(HEIGHTMAP, Float),
            Endpoint::input(SLOPE, Float),
            Endpoint::output(SHADOW, Float),
            Endpoint::output(NORMAL, Vector4),
            Endpoint::output(TEXTURES_LOW, Vector4),
            Endpoint::output(TEXTURES_HIGH, Vector4),
        ],
    );

    // Normals are computed on a heightmap normalized to [0, 1], so scale by the map extent.
    let relief = config.width.max(config.height) as f32 / 16.0;

    graph
        .add_vertex(
            "shadow",
            VertexSpec::new("shadow", Float)
                .with_input(HEIGHTMAP)
                .with_param("drop", SHADOW_DROP),
        )?
        .add_vertex(
            "normal",
            VertexSpec::new("normal", Vector4)
                .with_input(HEIGHTMAP)
                .with_param("strength", relief),
        )?
        .add_vertex(
            "steepness",
            VertexSpec::new("normalize", Float).with_input(SLOPE),
        )?
        .add_vertex(
            "flatness",
            VertexSpec::new("one_minus", Float).with_input("steepness"),
        )?
        .add_vertex(
            "lowland",
            VertexSpec::new("one_minus", Float).with_input(HEIGHTMAP),
        )?
        .add_vertex(
            "ground",
            VertexSpec::new("multiply", Float).with_inputs(&["lowland", "flatness"]),
        )?
        .add_vertex(
            "upland",
            VertexSpec::new("multiply", Float).with_inputs(&[HEIGHTMAP, "flatness"]),
        )?
        .add_vertex(
            "low_layers",
            VertexSpec::new("splat", Vector4).with_inputs(&["ground", "lowland", "steepness"]),
        )?
        .add_vertex(
            "high_layers",
            VertexSpec::new("splat", Vector4).with_inputs(&["upland", HEIGHTMAP, "shadow"]),
        )?;

    graph
        .wire_output(SHADOW, "shadow")?
        .wire_output(NORMAL, "normal")?
        .wire_output(TEXTURES_LOW, "low_layers")?
        .wire_output(TEXTURES_HIGH, "high_layers")?;
    graph.finish_wiring()?;
    Ok(graph)
}
