//! Prop: trees and boulders on open ground, rocks on steep slopes.
use crate::error::Result;
use crate::generator::config::GenerationConfig;
use crate::graph::{Endpoint, StageGraph, VertexSpec};
use crate::mask::MaskKind::{Boolean, Float};
use crate::stages::endpoints::{BOULDERS, PASSABLE, ROCKS, SLOPE, TREES};
use crate::stages::StageKind;

pub fn build(config: &GenerationConfig) -> Result<StageGraph> {
    let opts = &config.props;
    let mut graph = StageGraph::create_new(
        StageKind::Prop.name(),
        &[
            Endpoint::input(PASSABLE, Boolean),
            Endpoint::input(SLOPE, Float),
            Endpoint::output(TREES, Boolean),
            Endpoint::output(ROCKS, Boolean),
            Endpoint::output(BOULDERS, Boolean),
        ],
    );

    graph
        .add_vertex(
            "steep",
            VertexSpec::new("threshold", Boolean)
                .with_input(SLOPE)
                .with_param("min", opts.rock_slope),
        )?
        .add_vertex(
            "trees",
            VertexSpec::new("scatter_poisson", Boolean)
                .with_input(PASSABLE)
                .with_param("radius", opts.tree_spacing)
                .with_param("density", opts.tree_density),
        )?
        .add_vertex(
            "open_ground",
            VertexSpec::new("and_not", Boolean).with_inputs(&[PASSABLE, "trees"]),
        )?
        .add_vertex(
            "boulders",
            VertexSpec::new("scatter_jitter", Boolean)
                .with_input("open_ground")
                .with_param("spacing", opts.boulder_spacing)
                .with_param("jitter", 0.8)
                .with_param("density", opts.boulder_density),
        )?
        .add_vertex(
            "rocks",
            VertexSpec::new("scatter_poisson", Boolean)
                .with_input("steep")
                .with_param("radius", opts.rock_spacing)
                .with_param("density", opts.rock_density),
        )?;

    graph
        .wire_output(TREES, "trees")?
        .wire_output(ROCKS, "rocks")?
        .wire_output(BOULDERS, "boulders")?;
    graph.finish_wiring()?;
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::{BooleanMask, FloatMask};
    use crate::stages::tests::run_stage;

    #[test]
    fn props_follow_passability_and_slope() {
        let mut slope = FloatMask::new(40, 40);
        for y in 0..40 {
            for x in 20..40 {
                slope.set(x, y, 0.5);
            }
        }
        let mut passable = BooleanMask::new(40, 40);
        for y in 0..40 {
            for x in 0..20 {
                passable.set(x, y, true);
            }
        }
        let config = GenerationConfig::new(40, 40).with_seed(12);
        let outputs = run_stage(
            StageKind::Prop,
            &config,
            vec![(PASSABLE, passable.into()), (SLOPE, slope.into())],
        );

        let trees = outputs[TREES].as_boolean().unwrap();
        let boulders = outputs[BOULDERS].as_boolean().unwrap();
        let rocks = outputs[ROCKS].as_boolean().unwrap();
        assert!(trees.count() > 0);
        assert!(rocks.count() > 0);
        assert!(trees.positions().iter().all(|(x, _)| *x < 20));
        assert!(boulders.positions().iter().all(|(x, y)| *x < 20
            && !trees.get(*x as isize, *y as isize)));
        assert!(rocks.positions().iter().all(|(x, _)| *x >= 20));
    }
}
