use anyhow::bail;
use map_forge::prelude::*;
use map_forge_examples::{config_from_args, init_tracing};
use tracing::{info, warn};

const RUNS: usize = 3;

fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = config_from_args()?;
    let generator = MapGenerator::try_new(config)?;

    let reference = generator.generate()?;
    let dir = std::env::temp_dir();
    reference.hash_log.save(dir.join("map_forge_audit_0.hashlog"))?;

    for run in 1..RUNS {
        let map = generator.generate()?;
        let path = dir.join(format!("map_forge_audit_{run}.hashlog"));
        map.hash_log.save(&path)?;

        if let Some(index) = reference.hash_log.first_divergence(&map.hash_log) {
            let record = map.hash_log.get(index);
            warn!("Run {run} diverged at entry #{index}: {record:?}");
            bail!(
                "run {run} diverged from run 0 at entry #{index}, see {}",
                path.display()
            );
        }
        if map.artifact.content_hash() != reference.artifact.content_hash() {
            bail!("run {run} produced a different artifact with an identical hash log");
        }
        info!("Run {run} matches ({} entries).", map.hash_log.len());
    }

    if !reference.is_deterministic() {
        warn!(
            "{} entries were declared after start; reproducibility is not guaranteed.",
            reference.warnings.len()
        );
    }
    println!(
        "{RUNS} runs of seed {} agree on {} entries, logs in {}",
        reference.seed(),
        reference.hash_log.len(),
        dir.display()
    );
    Ok(())
}
