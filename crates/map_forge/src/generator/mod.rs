//! Map generation front end.
//!
//! [`MapGenerator`] owns the operator and stage registries and produces one [`GeneratedMap`]
//! per seed. Every map runs on its own fresh [`Pipeline`], so maps generated in the same batch
//! never share entries, masks or hash records.
use tracing::info;

use crate::error::Result;
use crate::graph::OperatorRegistry;
use crate::mask::MapMask;
use crate::pipeline::{DeterminismWarning, HashLog, Pipeline};
use crate::stages::StageRegistry;

pub mod composer;
pub mod config;
pub mod events;

pub use composer::{MapArtifact, PipelineComposer};
pub use config::{
    CivilianOptions, DecalOptions, GenerationConfig, PropOptions, ResourceOptions,
    TerrainOptions, WreckOptions,
};
pub use events::{EventSink, FnSink, GenerationEvent, GenerationEventKind, MultiSink, VecSink};

/// Result of generating one map.
#[derive(Clone, Debug)]
pub struct GeneratedMap {
    /// Outputs of every stage.
    pub artifact: MapArtifact,
    /// Per-entry content hashes in declaration order.
    pub hash_log: HashLog,
    /// Determinism warnings raised while scheduling.
    pub warnings: Vec<DeterminismWarning>,
}

impl GeneratedMap {
    pub fn seed(&self) -> u64 {
        self.artifact.seed()
    }

    /// Whether the run is guaranteed reproducible from its seed.
    pub fn is_deterministic(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Generates maps from a validated [`GenerationConfig`].
pub struct MapGenerator {
    config: GenerationConfig,
    operators: OperatorRegistry,
    stages: StageRegistry,
}

impl MapGenerator {
    /// Creates a generator with the built-in operators and stages.
    pub fn try_new(config: GenerationConfig) -> Result<Self> {
        Self::with_registries(
            config,
            OperatorRegistry::with_builtins(),
            StageRegistry::with_builtins(),
        )
    }

    /// Creates a generator with custom registries, e.g. to replace a stage's graph.
    pub fn with_registries(
        config: GenerationConfig,
        operators: OperatorRegistry,
        stages: StageRegistry,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            operators,
            stages,
        })
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn operators(&self) -> &OperatorRegistry {
        &self.operators
    }

    /// Generates the map for the configured seed.
    pub fn generate(&self) -> Result<GeneratedMap> {
        self.generate_with_events(&mut ())
    }

    /// Generates the map for the configured seed, reporting progress to `sink`.
    pub fn generate_with_events(&self, sink: &mut dyn EventSink) -> Result<GeneratedMap> {
        generate_map(&self.config, &self.operators, &self.stages, sink)
    }

    /// Generates one map per seed, each on its own pipeline.
    pub fn generate_batch(&self, seeds: &[u64]) -> Result<Vec<GeneratedMap>> {
        seeds
            .iter()
            .map(|&seed| {
                let config = self.config.clone().with_seed(seed);
                generate_map(&config, &self.operators, &self.stages, &mut ())
            })
            .collect()
    }
}

fn generate_map(
    config: &GenerationConfig,
    operators: &OperatorRegistry,
    stages: &StageRegistry,
    sink: &mut dyn EventSink,
) -> Result<GeneratedMap> {
    info!(
        "Generating {}x{} map with seed {}.",
        config.width, config.height, config.seed
    );
    if sink.wants(GenerationEventKind::GenerationStarted) {
        sink.send(GenerationEvent::GenerationStarted {
            seed: config.seed,
            width: config.width,
            height: config.height,
        });
    }

    let pipeline: Pipeline<MapMask> = Pipeline::new(config.pipeline.clone())?;
    let artifact = PipelineComposer::new(config, operators, stages).run(&pipeline, sink)?;
    let hash_log = pipeline.hash_log();
    let warnings = pipeline.warnings();

    let content_hash = artifact.content_hash().to_hex().to_string();
    info!(
        "Generated map {} from {} entries.",
        content_hash,
        hash_log.len()
    );
    if sink.wants(GenerationEventKind::GenerationFinished) {
        sink.send(GenerationEvent::GenerationFinished {
            seed: config.seed,
            content_hash,
            entries: hash_log.len(),
        });
    }

    Ok(GeneratedMap {
        artifact,
        hash_log,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::error::Error;
    use crate::pipeline::PipelineConfig;
    use crate::stages::{endpoints, StageKind};

    fn generator(seed: u64) -> MapGenerator {
        MapGenerator::try_new(
            GenerationConfig::new(40, 40)
                .with_seed(seed)
                .with_pipeline(PipelineConfig::default().with_worker_threads(3)),
        )
        .unwrap()
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = MapGenerator::try_new(GenerationConfig::new(0, 16))
            .err()
            .expect("zero width must fail");
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn same_seed_reproduces_hash_log_and_artifact() {
        let a = generator(42).generate().unwrap();
        let b = generator(42).generate().unwrap();

        assert!(a.is_deterministic());
        assert_eq!(a.hash_log, b.hash_log);
        assert_eq!(a.hash_log.first_divergence(&b.hash_log), None);
        assert_eq!(a.hash_log.completed(), a.hash_log.len());
        assert_eq!(a.artifact, b.artifact);
        assert_eq!(a.artifact.content_hash(), b.artifact.content_hash());
    }

    #[test]
    fn different_seeds_diverge() {
        let a = generator(1).generate().unwrap();
        let b = generator(2).generate().unwrap();
        assert_eq!(a.hash_log.len(), b.hash_log.len());
        assert!(a.hash_log.first_divergence(&b.hash_log).is_some());
    }

    #[test]
    fn batch_runs_are_isolated() {
        let generator = generator(0);
        let batch = generator.generate_batch(&[5, 6, 5]).unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch[0].seed(), 5);
        assert_eq!(batch[0].hash_log, batch[2].hash_log);
        assert_ne!(
            batch[0].artifact.content_hash(),
            batch[1].artifact.content_hash()
        );

        let single = MapGenerator::try_new(generator.config().clone().with_seed(6))
            .unwrap()
            .generate()
            .unwrap();
        assert_eq!(single.hash_log, batch[1].hash_log);
    }

    #[test]
    fn hash_log_lines_name_mask_and_label() {
        let map = generator(7).generate().unwrap();
        let mut out = Vec::new();
        map.hash_log.write_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), map.hash_log.len());
        let fields: Vec<&str> = lines[0].split(",\t").collect();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0].len(), 64);
        assert!(fields[1].contains(".rs:"));
        assert!(fields[2].starts_with("terrain/"));
        assert!(fields[3].starts_with("terrain::"));
    }

    #[test]
    fn hash_log_identifies_every_vertex() {
        let map = MapGenerator::try_new(GenerationConfig::new(32, 32).with_seed(4))
            .unwrap()
            .generate()
            .unwrap();
        let records: Vec<_> = map.hash_log.records().iter().flatten().collect();
        assert_eq!(records.len(), map.hash_log.len());

        let sites: BTreeSet<&str> = records.iter().map(|r| r.call_site.as_str()).collect();
        let hashes: BTreeSet<&str> = records.iter().map(|r| r.hash.as_str()).collect();
        assert_eq!(sites.len(), records.len());
        assert_eq!(hashes.len(), records.len());
        assert!(sites.iter().all(|site| site.contains("stages")));
    }

    #[test]
    fn events_bracket_the_generation() {
        let mut sink = VecSink::new();
        let map = generator(3).generate_with_events(&mut sink).unwrap();

        let events = sink.into_inner();
        assert!(matches!(
            events.first(),
            Some(GenerationEvent::GenerationStarted { seed: 3, .. })
        ));
        match events.last() {
            Some(GenerationEvent::GenerationFinished {
                content_hash,
                entries,
                ..
            }) => {
                assert_eq!(*content_hash, map.artifact.content_hash().to_hex().to_string());
                assert_eq!(*entries, map.hash_log.len());
            }
            other => panic!("unexpected last event {other:?}"),
        }
    }

    #[test]
    fn resources_stay_on_passable_land() {
        let map = generator(11).generate().unwrap();
        let passable = map
            .artifact
            .get(StageKind::Terrain, endpoints::PASSABLE)
            .unwrap()
            .as_boolean()
            .unwrap();
        let mexes = map
            .artifact
            .get(StageKind::Resource, endpoints::MEXES)
            .unwrap()
            .as_boolean()
            .unwrap();
        for (x, y) in mexes.positions() {
            assert!(passable.get(x as isize, y as isize));
        }
    }
}
