//! Decal: ground decals on flat land and on slopes.
use crate::error::Result;
use crate::generator::config::GenerationConfig;
use crate::graph::{Endpoint, StageGraph, VertexSpec};
use crate::mask::MaskKind::{Boolean, Float};
use crate::stages::endpoints::{FIELD_DECALS, LAND, SLOPE, SLOPE_DECALS};
use crate::stages::StageKind;

pub fn build(config: &GenerationConfig) -> Result<StageGraph> {
    let opts = &config.decals;
    let mut graph = StageGraph::create_new(
        StageKind::Decal.name(),
        &[
            Endpoint::input(LAND, Boolean),
            Endpoint::input(SLOPE, Float),
            Endpoint::output(FIELD_DECALS, Boolean),
            Endpoint::output(SLOPE_DECALS, Boolean),
        ],
    );

    graph
        .add_vertex(
            "sloped",
            VertexSpec::new("threshold", Boolean)
                .with_input(SLOPE)
                .with_param("min", opts.slope_threshold),
        )?
        .add_vertex(
            "field_ground",
            VertexSpec::new("and_not", Boolean).with_inputs(&[LAND, "sloped"]),
        )?
        .add_vertex(
            "slope_ground",
            VertexSpec::new("and", Boolean).with_inputs(&[LAND, "sloped"]),
        )?
        .add_vertex(
            "field_decals",
            VertexSpec::new("scatter_jitter", Boolean)
                .with_input("field_ground")
                .with_param("spacing", opts.field_spacing)
                .with_param("jitter", 1.0)
                .with_param("density", opts.field_density),
        )?
        .add_vertex(
            "slope_decals",
            VertexSpec::new("scatter_poisson", Boolean)
                .with_input("slope_ground")
                .with_param("radius", opts.slope_spacing),
        )?;

    graph
        .wire_output(FIELD_DECALS, "field_decals")?
        .wire_output(SLOPE_DECALS, "slope_decals")?;
    graph.finish_wiring()?;
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::{BooleanMask, FloatMask};
    use crate::stages::tests::run_stage;

    #[test]
    fn decals_split_by_slope() {
        let mut slope = FloatMask::new(48, 48);
        for y in 24..48 {
            for x in 0..48 {
                slope.set(x, y, 1.0);
            }
        }
        let config = GenerationConfig::new(48, 48).with_seed(4);
        let outputs = run_stage(
            StageKind::Decal,
            &config,
            vec![
                (LAND, BooleanMask::filled(48, 48, true).into()),
                (SLOPE, slope.into()),
            ],
        );

        let field = outputs[FIELD_DECALS].as_boolean().unwrap();
        let sloped = outputs[SLOPE_DECALS].as_boolean().unwrap();
        assert!(sloped.count() > 0);
        assert!(field.positions().iter().all(|(_, y)| *y < 24));
        assert!(sloped.positions().iter().all(|(_, y)| *y >= 24));
    }
}
