use super::{GlobalOptions, Runner};
use crate::cli::InitialVolumeArgs;
use crate::error::Result;
use crate::utils::progress::CliProgressHandler;
use helixkit::core::models::helix::HelicalParams;
use helixkit::engine::config::{InitialVolumeConfig, InitialVolumeConfigBuilder};
use helixkit::engine::error::EngineError;
use helixkit::{engine::progress::ProgressReporter, workflows};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

fn build_config(args: &InitialVolumeArgs, threads: Option<usize>) -> Result<InitialVolumeConfig> {
    let mut builder = InitialVolumeConfigBuilder::new()
        .averages(args.averages.iter().cloned())
        .particles(args.particles.clone())
        .output_dir(args.output_dir.clone())
        .sampling(args.sampling)
        .helix(HelicalParams::new(args.helix.rotation, args.helix.rise));
    if let Some(fraction) = args.helix.height_fraction {
        builder = builder.height_fraction(fraction);
    }
    if let Some(width) = args.mask_width {
        builder = builder.mask_width(width);
    }
    if let Some(threads) = threads {
        builder = builder.threads(threads);
    }
    if let Some(seed) = args.seed {
        builder = builder.seed(seed);
    }
    Ok(builder.build().map_err(EngineError::from)?)
}

pub fn run(args: InitialVolumeArgs, globals: &GlobalOptions) -> Result<()> {
    let config = build_config(&args, globals.threads)?;
    let runner = Runner::new(globals.dry_run, globals.program_dir.as_deref());

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    let mut rng = match config.seed {
        Some(seed) => {
            info!("Seeding the rotation sampler with {}", seed);
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_entropy(),
    };

    println!(
        "Building an initial volume from {} class average(s)...",
        config.averages.len()
    );
    let result = workflows::initial_volume::run(&runner, &config, &mut rng, &reporter)?;

    runner.print_recorded();
    println!(
        "✓ {} particle(s) set to side views, written to: {}",
        result.particles,
        result.paths.particles.display()
    );
    println!("  Helical volume: {}", result.paths.helical_volume.display());
    Ok(())
}
