use super::{GlobalOptions, Runner};
use crate::cli::RefineArgs;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use helixkit::core::models::helix::HelicalParams;
use helixkit::engine::config::{HelicalRefineConfig, HelicalRefineConfigBuilder, RelionRefineOptions};
use helixkit::engine::error::EngineError;
use helixkit::engine::runner::JobRunner;
use helixkit::workflows::helical_refine::last_iteration;
use helixkit::{engine::progress::ProgressReporter, workflows};
use std::fs;
use std::path::Path;
use tracing::info;

fn load_relion_options(path: &Path) -> Result<RelionRefineOptions> {
    let content = fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| CliError::FileParsing {
        path: path.to_path_buf(),
        source: e.into(),
    })
}

fn build_config(args: &RefineArgs, threads: Option<usize>, completed: u32) -> Result<HelicalRefineConfig> {
    let mut relion = match &args.relion_config {
        Some(path) => load_relion_options(path)?,
        None => RelionRefineOptions::default(),
    };
    if let Some(threads) = threads {
        relion.threads = threads;
    }

    let mut builder = HelicalRefineConfigBuilder::new()
        .run_dir(args.run_dir.clone())
        .solvent_mask(args.solvent_mask.clone())
        .continue_from(completed, args.iterations)
        .sampling(args.sampling)
        .image_size(args.image_size)
        .helix(HelicalParams::new(args.helix.rotation, args.helix.rise))
        .dihedral(args.dihedral)
        .relion(relion);
    if let Some(n) = args.references {
        builder = builder.references(n);
    }
    if let Some(fraction) = args.helix.height_fraction {
        builder = builder.height_fraction(fraction);
    }
    if let Some(r) = args.inner_radius {
        builder = builder.inner_radius(r);
    }
    if let Some(r) = args.outer_radius {
        builder = builder.outer_radius(r);
    }
    Ok(builder.build().map_err(EngineError::from)?)
}

pub fn run(args: RefineArgs, globals: &GlobalOptions) -> Result<()> {
    // `iter_000` holds the refinement being continued.
    let completed = last_iteration(&args.run_dir)?.unwrap_or(0);
    info!("Last completed iteration in {:?}: {}", args.run_dir, completed);
    let config = build_config(&args, globals.threads, completed)?;
    let runner = Runner::new(globals.dry_run, globals.program_dir.as_deref());

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Refining iterations {} to {} of {} reference(s)...",
        config.first_iteration, config.last_iteration, config.references
    );
    let result = workflows::helical_refine::run(&runner, &config, &reporter)?;

    runner.print_recorded();
    if runner.executes() {
        for (reference, params) in (1..).zip(result.final_params()) {
            println!(
                "✓ Reference {}: rotation {:.4} deg, rise {:.4} Å",
                reference, params.rotation, params.rise
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::HelixArgs;
    use helixkit::engine::config::ConfigError;
    use tempfile::tempdir;

    fn args(run_dir: &Path) -> RefineArgs {
        RefineArgs {
            run_dir: run_dir.to_path_buf(),
            solvent_mask: run_dir.join("mask.mrc"),
            iterations: 3,
            references: None,
            sampling: 1.2,
            image_size: 200,
            helix: HelixArgs {
                rotation: 22.03,
                rise: 1.408,
                height_fraction: None,
            },
            dihedral: false,
            inner_radius: None,
            outer_radius: None,
            relion_config: None,
        }
    }

    #[test]
    fn relion_options_file_is_merged_with_global_threads() {
        let dir = tempdir().unwrap();
        let options = dir.path().join("relion.toml");
        fs::write(&options, "tau2-fudge = 4.0\nhealpix-order = 3\n").unwrap();
        let mut refine = args(dir.path());
        refine.relion_config = Some(options);

        let config = build_config(&refine, Some(16), 1).unwrap();

        assert_eq!(config.relion.tau2_fudge, 4.0);
        assert_eq!(config.relion.healpix_order, 3);
        assert_eq!(config.relion.oversampling, 1);
        assert_eq!(config.relion.threads, 16);
        assert_eq!((config.first_iteration, config.last_iteration), (2, 3));
    }

    #[test]
    fn malformed_relion_options_report_the_file() {
        let dir = tempdir().unwrap();
        let options = dir.path().join("relion.toml");
        fs::write(&options, "tau2-fudge = \"high\"\n").unwrap();
        let mut refine = args(dir.path());
        refine.relion_config = Some(options.clone());

        let err = build_config(&refine, None, 0).unwrap_err();

        assert!(matches!(err, CliError::FileParsing { ref path, .. } if *path == options));
    }

    #[test]
    fn finished_run_is_a_config_error() {
        let dir = tempdir().unwrap();
        let err = build_config(&args(dir.path()), None, 3).unwrap_err();
        assert!(matches!(
            err,
            CliError::Engine(EngineError::Config {
                source: ConfigError::Invalid { .. }
            })
        ));
    }

    #[test]
    fn dry_run_continues_after_the_last_iteration_directory() {
        let dir = tempdir().unwrap();
        for name in ["iter_000", "iter_001"] {
            fs::create_dir(dir.path().join(name)).unwrap();
        }
        let globals = GlobalOptions {
            dry_run: true,
            ..Default::default()
        };

        run(args(dir.path()), &globals).unwrap();

        assert!(dir.path().join("iter_002").is_dir());
        assert!(dir.path().join("iter_003").is_dir());
    }
}
