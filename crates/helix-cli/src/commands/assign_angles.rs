use crate::cli::AssignAnglesArgs;
use crate::error::{CliError, Result};
use helixkit::core::alignment::AngleAssignment;
use helixkit::engine::config::AngleAssignConfig;
use helixkit::workflows;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

pub fn run(args: AssignAnglesArgs) -> Result<()> {
    let config = AngleAssignConfig {
        assignment: AngleAssignment {
            assign_tilt_90: args.tilt_90,
            randomize_rot: args.random_rot,
        },
        table: args.table,
        seed: args.seed,
    };
    if config.assignment.is_noop() {
        return Err(CliError::Argument(
            "nothing to assign; pass --tilt-90 and/or --random-rot".to_string(),
        ));
    }

    let mut rng = match config.seed {
        Some(seed) => {
            info!("Seeding the rotation sampler with {}", seed);
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_entropy(),
    };

    let updated = workflows::assign_angles::run(&args.input, &args.output, &config, &mut rng)?;
    println!(
        "✓ Assigned angles to {} particle(s), written to: {}",
        updated,
        args.output.display()
    );
    Ok(())
}
