use std::error::Error;
use std::fs::File;
use std::path::PathBuf;

use clap::Parser;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use minimax_lqr::config::ExperimentConfig;
use minimax_lqr::control::{evaluate, rollout, synthesize};
use minimax_lqr::data::write_sample_sets;
use minimax_lqr::LqrError;

/// Evaluates the distributionally robust LQR objective over a list of risk
/// parameters and simulates the resulting policies.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// JSON experiment file; the built-in cart-pole is used when absent
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Risk parameters to evaluate, overriding the configuration
    #[arg(short, long, num_args = 1..)]
    lam: Vec<f64>,

    /// Seed for sample generation and the adversary
    #[arg(short, long)]
    seed: Option<u64>,

    /// Write the disturbance samples used to this CSV file
    #[arg(long)]
    dump_samples: Option<PathBuf>,

    /// Skip the closed-loop simulation
    #[arg(long)]
    no_rollout: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ExperimentConfig::load(path)?,
        None => ExperimentConfig::default(),
    };
    if !cli.lam.is_empty() {
        config.lams = cli.lam.clone();
    }
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    config.validate()?;

    let model = config.model()?;
    let x0 = config.initial_state();
    let mut rng = StdRng::seed_from_u64(config.seed);
    let sample_sets = config.sample_sets(&mut rng)?;
    info!(
        "{} stages, {} sample sets, theta = {}",
        config.stage_number,
        sample_sets.len(),
        config.theta
    );

    if let Some(path) = &cli.dump_samples {
        write_sample_sets(File::create(path)?, &sample_sets)?;
        info!("wrote samples to {}", path.display());
    }

    println!("{:>14} {:>24}", "lam", "objective");
    for &lam in &config.lams {
        let cost = evaluate(
            &model,
            lam,
            config.theta,
            config.stage_number,
            &x0,
            &sample_sets,
        )?;
        println!("{lam:>14.6} {:>24}", cost.to_string());
    }

    if cli.no_rollout {
        return Ok(());
    }
    let horizon = sample_sets
        .get(..config.stage_number)
        .ok_or(LqrError::InvalidHorizon {
            stage_number: config.stage_number,
            available: sample_sets.len(),
        })?;
    for &lam in &config.lams {
        let policy = match synthesize(&model, lam, horizon) {
            Ok(policy) => policy,
            Err(LqrError::Infeasible { stage, .. }) => {
                warn!("no policy for lam = {lam}: infeasible at stage {stage}");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let trajectory = rollout(&model, &policy, &x0, horizon, &mut rng)?;
        let final_state = trajectory.states.last().map_or(0.0, |x| x.norm());
        println!(
            "lam = {lam}: rollout cost {:.6}, final |x| {final_state:.6}",
            trajectory.cost
        );
    }
    Ok(())
}
