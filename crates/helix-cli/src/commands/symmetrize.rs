use super::{GlobalOptions, Runner};
use crate::cli::SymmetrizeArgs;
use crate::config;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use helixkit::core::models::helix::HelicalParams;
use helixkit::{engine::progress::ProgressReporter, workflows};
use std::fs;
use std::path::Path;
use tracing::info;

pub fn run(args: SymmetrizeArgs, globals: &GlobalOptions) -> Result<()> {
    let app = config::build_symmetrize_config(&args, globals.threads, globals.program_dir.as_deref())?;
    let sym_config = app.core_config;
    let runner = Runner::new(globals.dry_run, app.program_dir.as_deref());

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!(
        "Searching helical symmetry of {}...",
        sym_config.input_volume.display()
    );
    info!("Invoking the symmetrization workflow...");
    let result = workflows::symmetrize::run(&runner, &sym_config, &reporter)?;

    runner.print_recorded();

    let Some(params) = result.params else {
        println!("Fine search and symmetrization need the coarse search output; stopping here.");
        return Ok(());
    };

    if let Some(coarse) = result.coarse {
        println!(
            "  Coarse search: rotation {:.4} deg, rise {:.4} Å",
            coarse.rotation, coarse.rise
        );
    }
    println!(
        "✓ Imposed rotation {:.4} deg, rise {:.4} Å ({:.4} voxels)",
        params.rotation,
        params.rise,
        params.rise_in_voxels(sym_config.sampling)
    );
    println!("  Symmetrized volume: {}", result.paths.volume.display());

    if let Some(path) = &args.params_out {
        write_params(path, &params)?;
        println!("  Parameters written to: {}", path.display());
    }
    Ok(())
}

fn write_params(path: &Path, params: &HelicalParams) -> Result<()> {
    let content = toml::to_string(params).map_err(|e| CliError::Other(e.into()))?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(())
}
