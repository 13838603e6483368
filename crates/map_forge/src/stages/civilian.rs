//! Civilian: bases on roomy open land, loose civilian structures elsewhere.
use crate::error::Result;
use crate::generator::config::GenerationConfig;
use crate::graph::{Endpoint, StageGraph, VertexSpec};
use crate::mask::MaskKind::Boolean;
use crate::stages::endpoints::{BASES, CIVILIANS, LAND, PASSABLE};
use crate::stages::StageKind;

pub fn build(config: &GenerationConfig) -> Result<StageGraph> {
    let opts = &config.civilians;
    let mut graph = StageGraph::create_new(
        StageKind::Civilian.name(),
        &[
            Endpoint::input(PASSABLE, Boolean),
            Endpoint::input(LAND, Boolean),
            Endpoint::output(BASES, Boolean),
            Endpoint::output(CIVILIANS, Boolean),
        ],
    );

    graph
        .add_vertex(
            "open_land",
            VertexSpec::new("and", Boolean).with_inputs(&[PASSABLE, LAND]),
        )?
        .add_vertex(
            "base_sites",
            VertexSpec::new("erode", Boolean)
                .with_input("open_land")
                .with_param("radius", opts.base_margin as f32),
        )?
        .add_vertex(
            "bases",
            VertexSpec::new("scatter_poisson", Boolean)
                .with_input("base_sites")
                .with_param("radius", opts.base_spacing)
                .with_param("limit", opts.base_count as f32),
        )?
        .add_vertex(
            "free_land",
            VertexSpec::new("and_not", Boolean).with_inputs(&["open_land", "bases"]),
        )?
        .add_vertex(
            "civilians",
            VertexSpec::new("scatter_jitter", Boolean)
                .with_input("free_land")
                .with_param("spacing", opts.civilian_spacing)
                .with_param("jitter", 0.6)
                .with_param("limit", opts.civilian_count as f32),
        )?;

    graph
        .wire_output(BASES, "bases")?
        .wire_output(CIVILIANS, "civilians")?;
    graph.finish_wiring()?;
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::config::CivilianOptions;
    use crate::mask::BooleanMask;
    use crate::stages::tests::run_stage;

    #[test]
    fn bases_keep_their_margin() {
        let config = GenerationConfig::new(64, 64)
            .with_seed(8)
            .with_civilians(CivilianOptions {
                base_spacing: 12.0,
                ..CivilianOptions::default()
            });
        let outputs = run_stage(
            StageKind::Civilian,
            &config,
            vec![
                (PASSABLE, BooleanMask::filled(64, 64, true).into()),
                (LAND, BooleanMask::filled(64, 64, true).into()),
            ],
        );

        let bases = outputs[BASES].as_boolean().unwrap();
        let civilians = outputs[CIVILIANS].as_boolean().unwrap();
        let margin = config.civilians.base_margin;
        assert_eq!(bases.count(), config.civilians.base_count);
        assert_eq!(civilians.count(), config.civilians.civilian_count);
        for (x, y) in bases.positions() {
            assert!(x >= margin && y >= margin && x < 64 - margin && y < 64 - margin);
            assert!(!civilians.get(x as isize, y as isize));
        }
    }
}
