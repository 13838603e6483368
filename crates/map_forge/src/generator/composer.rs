//! Wires the seven stage graphs onto one pipeline and collects their outputs.
use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::generator::config::GenerationConfig;
use crate::generator::events::{EventSink, GenerationEvent, GenerationEventKind};
use crate::graph::{OperatorRegistry, OutputBindings, StageContext, StageGraph};
use crate::mask::{MapMask, Mask};
use crate::pipeline::Pipeline;
use crate::stages::{StageKind, StageRegistry};

/// Outputs of every stage of one generated map, keyed by stage and endpoint name.
#[derive(Clone, Debug, PartialEq)]
pub struct MapArtifact {
    seed: u64,
    width: usize,
    height: usize,
    stages: BTreeMap<StageKind, BTreeMap<String, MapMask>>,
}

impl MapArtifact {
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn stage(&self, kind: StageKind) -> Option<&BTreeMap<String, MapMask>> {
        self.stages.get(&kind)
    }

    /// Output `name` of stage `kind`.
    pub fn get(&self, kind: StageKind, name: &str) -> Option<&MapMask> {
        self.stages.get(&kind).and_then(|outputs| outputs.get(name))
    }

    pub fn stages(&self) -> impl Iterator<Item = (StageKind, &BTreeMap<String, MapMask>)> {
        self.stages.iter().map(|(kind, outputs)| (*kind, outputs))
    }

    /// Number of output masks across all stages.
    pub fn output_count(&self) -> usize {
        self.stages.values().map(BTreeMap::len).sum()
    }

    /// Hash over every output, visited in stage then name order.
    pub fn content_hash(&self) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed.to_le_bytes());
        for (kind, outputs) in &self.stages {
            hasher.update(kind.name().as_bytes());
            hasher.update(&[0]);
            for (name, mask) in outputs {
                hasher.update(name.as_bytes());
                hasher.update(&[0]);
                mask.hash_content(&mut hasher);
            }
        }
        hasher.finalize()
    }
}

/// Builds Terrain and the dependent stages, schedules them on one pipeline and assembles
/// the [`MapArtifact`].
pub struct PipelineComposer<'a> {
    config: &'a GenerationConfig,
    operators: &'a OperatorRegistry,
    stages: &'a StageRegistry,
}

impl<'a> PipelineComposer<'a> {
    pub fn new(
        config: &'a GenerationConfig,
        operators: &'a OperatorRegistry,
        stages: &'a StageRegistry,
    ) -> Self {
        Self {
            config,
            operators,
            stages,
        }
    }

    /// Construct every stage graph, Terrain first.
    pub fn build_graphs(&self) -> Result<Vec<(StageKind, StageGraph)>> {
        StageKind::ALL
            .into_iter()
            .map(|kind| Ok((kind, self.stages.build(kind, self.config)?)))
            .collect()
    }

    /// Register every vertex of `graphs` with `pipeline`. Terrain is scheduled first and its
    /// outputs are bound into the inputs of every other stage. Nothing runs.
    pub fn schedule(
        &self,
        pipeline: &Pipeline<MapMask>,
        graphs: &mut [(StageKind, StageGraph)],
        sink: &mut dyn EventSink,
    ) -> Result<()> {
        let ctx = StageContext {
            pipeline,
            operators: self.operators,
            seed: self.config.seed,
            width: self.config.width,
            height: self.config.height,
        };

        let mut terrain_outputs: Option<OutputBindings> = None;
        for (kind, graph) in graphs.iter_mut() {
            let upstream = match (*kind, &terrain_outputs) {
                (StageKind::Terrain, _) => OutputBindings::new(),
                (_, Some(outputs)) => outputs.clone(),
                (_, None) => {
                    return Err(Error::InvalidState(format!(
                        "stage '{kind}' scheduled before terrain"
                    )))
                }
            };

            let before = pipeline.entry_count();
            graph.setup_pipeline(&ctx, &upstream)?;
            let entries = pipeline.entry_count() - before;
            debug!("Scheduled stage '{}' with {} entries.", kind, entries);
            if sink.wants(GenerationEventKind::StageScheduled) {
                sink.send(GenerationEvent::StageScheduled {
                    stage: *kind,
                    entries,
                });
            }

            if *kind == StageKind::Terrain {
                terrain_outputs = Some(graph.output_bindings()?);
            }
        }
        Ok(())
    }

    /// Build, schedule and run every stage on `pipeline`, which must be fresh.
    pub fn run(
        &self,
        pipeline: &Pipeline<MapMask>,
        sink: &mut dyn EventSink,
    ) -> Result<MapArtifact> {
        if pipeline.is_started() || pipeline.entry_count() > 0 {
            return Err(Error::InvalidState(
                "composer needs a fresh pipeline".into(),
            ));
        }

        let mut graphs = self.build_graphs()?;
        self.schedule(pipeline, &mut graphs, sink)?;

        let entries = pipeline.entry_count();
        if sink.wants(GenerationEventKind::PipelineStarted) {
            sink.send(GenerationEvent::PipelineStarted { entries });
        }
        pipeline.start()?;
        pipeline.join()?;
        if sink.wants(GenerationEventKind::PipelineFinished) {
            sink.send(GenerationEvent::PipelineFinished { entries });
        }

        for warning in pipeline.warnings() {
            warn!(
                "Entry #{} on '{}' declared after start at {}.",
                warning.index, warning.mask, warning.call_site
            );
            if sink.wants(GenerationEventKind::Warning) {
                sink.send(GenerationEvent::Warning {
                    context: warning.mask.clone(),
                    message: format!(
                        "entry #{} declared after start at {}",
                        warning.index, warning.call_site
                    ),
                });
            }
        }

        let mut stages = BTreeMap::new();
        for (kind, mut graph) in graphs {
            graph.finalize_pipeline(pipeline)?;
            let outputs = graph.into_outputs()?;
            if sink.wants(GenerationEventKind::StageFinalized) {
                sink.send(GenerationEvent::StageFinalized {
                    stage: kind,
                    outputs: outputs.keys().cloned().collect(),
                });
            }
            stages.insert(kind, outputs);
        }

        let artifact = MapArtifact {
            seed: self.config.seed,
            width: self.config.width,
            height: self.config.height,
            stages,
        };
        info!(
            "Composed {} outputs from {} stages.",
            artifact.output_count(),
            artifact.stages.len()
        );
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::events::VecSink;
    use crate::pipeline::PipelineConfig;
    use crate::stages::endpoints;

    fn small_config(seed: u64) -> GenerationConfig {
        GenerationConfig::new(48, 48)
            .with_seed(seed)
            .with_pipeline(PipelineConfig::default().with_worker_threads(2))
    }

    fn compose(config: &GenerationConfig, sink: &mut dyn EventSink) -> Result<MapArtifact> {
        let operators = OperatorRegistry::with_builtins();
        let stages = StageRegistry::with_builtins();
        let pipeline = Pipeline::new(config.pipeline.clone())?;
        PipelineComposer::new(config, &operators, &stages).run(&pipeline, sink)
    }

    #[test]
    fn artifact_holds_every_stage_output() {
        let config = small_config(1);
        let artifact = compose(&config, &mut ()).unwrap();

        assert_eq!(artifact.stages().count(), StageKind::ALL.len());
        assert_eq!(artifact.output_count(), 19);
        assert_eq!(artifact.size(), (48, 48));
        let heightmap = artifact
            .get(StageKind::Terrain, endpoints::HEIGHTMAP)
            .unwrap();
        assert_eq!(heightmap.size(), (48, 48));
        assert!(artifact.get(StageKind::Texture, endpoints::NORMAL).is_some());
        assert!(artifact.get(StageKind::Terrain, endpoints::NORMAL).is_none());
    }

    #[test]
    fn events_follow_the_run() {
        let config = small_config(2);
        let mut sink = VecSink::new();
        compose(&config, &mut sink).unwrap();

        let scheduled = sink.of_kind(GenerationEventKind::StageScheduled);
        assert_eq!(scheduled.len(), 7);
        assert!(matches!(
            scheduled[0],
            GenerationEvent::StageScheduled {
                stage: StageKind::Terrain,
                ..
            }
        ));
        assert_eq!(sink.of_kind(GenerationEventKind::PipelineStarted).len(), 1);
        assert_eq!(sink.of_kind(GenerationEventKind::StageFinalized).len(), 7);
        assert!(sink.of_kind(GenerationEventKind::Warning).is_empty());
    }

    #[test]
    fn same_seed_gives_same_content_hash() {
        let a = compose(&small_config(9), &mut ()).unwrap();
        let b = compose(&small_config(9), &mut ()).unwrap();
        let c = compose(&small_config(10), &mut ()).unwrap();
        assert_eq!(a.content_hash(), b.content_hash());
        assert_ne!(a.content_hash(), c.content_hash());
    }

    #[test]
    fn used_pipeline_is_rejected() {
        let config = small_config(3);
        let operators = OperatorRegistry::with_builtins();
        let stages = StageRegistry::with_builtins();
        let pipeline = Pipeline::new(config.pipeline.clone()).unwrap();
        pipeline.register_mask("stray", MapMask::empty(crate::mask::MaskKind::Float, 1, 1));
        pipeline.start().unwrap();

        let err = PipelineComposer::new(&config, &operators, &stages)
            .run(&pipeline, &mut ())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
    }
}
