//! Resource: mass extractor and hydrocarbon spots on buildable land.
use crate::error::Result;
use crate::generator::config::GenerationConfig;
use crate::graph::{Endpoint, StageGraph, VertexSpec};
use crate::mask::MaskKind::Boolean;
use crate::stages::endpoints::{HYDROS, LAND, MEXES, PASSABLE};
use crate::stages::StageKind;

pub fn build(config: &GenerationConfig) -> Result<StageGraph> {
    let opts = &config.resources;
    let mut graph = StageGraph::create_new(
        StageKind::Resource.name(),
        &[
            Endpoint::input(PASSABLE, Boolean),
            Endpoint::input(LAND, Boolean),
            Endpoint::output(MEXES, Boolean),
            Endpoint::output(HYDROS, Boolean),
        ],
    );

    graph
        .add_vertex(
            "dry_ground",
            VertexSpec::new("and", Boolean).with_inputs(&[PASSABLE, LAND]),
        )?
        .add_vertex(
            "buildable",
            VertexSpec::new("erode", Boolean)
                .with_input("dry_ground")
                .with_param("radius", opts.build_margin as f32),
        )?
        .add_vertex(
            "mexes",
            VertexSpec::new("scatter_poisson", Boolean)
                .with_input("buildable")
                .with_param("radius", opts.mex_spacing)
                .with_param("limit", opts.mex_count as f32),
        )?
        .add_vertex(
            "hydro_ground",
            VertexSpec::new("and_not", Boolean).with_inputs(&["buildable", "mexes"]),
        )?
        .add_vertex(
            "hydros",
            VertexSpec::new("scatter_poisson", Boolean)
                .with_input("hydro_ground")
                .with_param("radius", opts.hydro_spacing)
                .with_param("limit", opts.hydro_count as f32),
        )?;

    graph
        .wire_output(MEXES, "mexes")?
        .wire_output(HYDROS, "hydros")?;
    graph.finish_wiring()?;
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::config::ResourceOptions;
    use crate::mask::BooleanMask;
    use crate::stages::tests::run_stage;

    #[test]
    fn resources_respect_counts_and_ground() {
        let mut passable = BooleanMask::filled(64, 64, true);
        for y in 0..64 {
            for x in 32..64 {
                passable.set(x, y, false);
            }
        }
        let config = GenerationConfig::new(64, 64)
            .with_seed(5)
            .with_resources(ResourceOptions {
                mex_spacing: 6.0,
                hydro_spacing: 6.0,
                ..ResourceOptions::default().with_mex_count(6).with_hydro_count(2)
            });
        let outputs = run_stage(
            StageKind::Resource,
            &config,
            vec![
                (PASSABLE, passable.into()),
                (LAND, BooleanMask::filled(64, 64, true).into()),
            ],
        );

        let mexes = outputs[MEXES].as_boolean().unwrap();
        let hydros = outputs[HYDROS].as_boolean().unwrap();
        assert_eq!(mexes.count(), 6);
        assert_eq!(hydros.count(), 2);
        for (x, y) in mexes.positions().into_iter().chain(hydros.positions()) {
            assert!(x < 31, "spot at ({x}, {y}) is off buildable ground");
        }
        assert!(mexes
            .positions()
            .iter()
            .all(|(x, y)| !hydros.get(*x as isize, *y as isize)));
    }

    #[test]
    fn zero_counts_place_nothing() {
        let config = GenerationConfig::new(32, 32)
            .with_resources(ResourceOptions::default().with_mex_count(0).with_hydro_count(0));
        let outputs = run_stage(
            StageKind::Resource,
            &config,
            vec![
                (PASSABLE, BooleanMask::filled(32, 32, true).into()),
                (LAND, BooleanMask::filled(32, 32, true).into()),
            ],
        );
        assert_eq!(outputs[MEXES].as_boolean().unwrap().count(), 0);
        assert_eq!(outputs[HYDROS].as_boolean().unwrap().count(), 0);
    }
}
