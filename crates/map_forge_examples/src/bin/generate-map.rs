use map_forge::prelude::*;
use map_forge_examples::{config_from_args, init_tracing, summarize};
use tracing::info;

fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = config_from_args()?;
    let generator = MapGenerator::try_new(config)?;

    let mut warnings = 0usize;
    let mut sink = FnSink::new(|event| match event {
        GenerationEvent::StageScheduled { stage, entries } => {
            info!("{stage}: {entries} entries scheduled");
        }
        GenerationEvent::Warning { context, message } => {
            warnings += 1;
            info!("warning in {context}: {message}");
        }
        _ => {}
    });
    let map = generator.generate_with_events(&mut sink)?;

    for line in summarize(&map) {
        println!("{line}");
    }
    println!(
        "seed {} | {} entries | {} warnings | content {}",
        map.seed(),
        map.hash_log.len(),
        warnings,
        map.artifact.content_hash().to_hex()
    );

    let out = std::env::temp_dir().join(format!("map_forge_{}.hashlog", map.seed()));
    map.hash_log.save(&out)?;
    println!("hash log written to {}", out.display());
    Ok(())
}
