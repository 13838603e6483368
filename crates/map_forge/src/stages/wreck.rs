//! Wreck: unit wrecks on passable land and in open water.
use crate::error::Result;
use crate::generator::config::GenerationConfig;
use crate::graph::{Endpoint, StageGraph, VertexSpec};
use crate::mask::MaskKind::Boolean;
use crate::stages::endpoints::{LAND, LAND_WRECKS, NAVY_WRECKS, PASSABLE};
use crate::stages::StageKind;

/// Cells of water required around a navy wreck.
const SHORE_CLEARANCE: f32 = 2.0;

pub fn build(config: &GenerationConfig) -> Result<StageGraph> {
    let opts = &config.wrecks;
    let mut graph = StageGraph::create_new(
        StageKind::Wreck.name(),
        &[
            Endpoint::input(PASSABLE, Boolean),
            Endpoint::input(LAND, Boolean),
            Endpoint::output(LAND_WRECKS, Boolean),
            Endpoint::output(NAVY_WRECKS, Boolean),
        ],
    );

    graph
        .add_vertex("water", VertexSpec::new("invert", Boolean).with_input(LAND))?
        .add_vertex(
            "open_water",
            VertexSpec::new("erode", Boolean)
                .with_input("water")
                .with_param("radius", SHORE_CLEARANCE),
        )?
        .add_vertex(
            "land_wrecks",
            VertexSpec::new("scatter_poisson", Boolean)
                .with_input(PASSABLE)
                .with_param("radius", opts.spacing)
                .with_param("limit", opts.land_count as f32),
        )?
        .add_vertex(
            "navy_wrecks",
            VertexSpec::new("scatter_poisson", Boolean)
                .with_input("open_water")
                .with_param("radius", opts.spacing)
                .with_param("limit", opts.navy_count as f32),
        )?;

    graph
        .wire_output(LAND_WRECKS, "land_wrecks")?
        .wire_output(NAVY_WRECKS, "navy_wrecks")?;
    graph.finish_wiring()?;
    Ok(graph)
}
