use std::error::Error;
use std::time::Instant;

use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::SeedableRng;

extern crate minimax_lqr;
use minimax_lqr::config::ExperimentConfig;
use minimax_lqr::control::lqr::{control_gain, dare};
use minimax_lqr::control::model::{DiscreteModel, LinearModel};
use minimax_lqr::control::worst_case::sample_worst_case;
use minimax_lqr::control::{evaluate, rollout, synthesize, MinimaxPolicy};
use minimax_lqr::utils::sampling::SampleSet;

/// Infinite-horizon LQR on the nominal model, pushed by the same adversary
/// the minimax policy plays against.
fn run_nominal(
    model: &DiscreteModel,
    policy: &MinimaxPolicy,
    x0: &DVector<f64>,
    sample_sets: &[SampleSet],
    rng: &mut StdRng,
) -> Result<f64, Box<dyn Error>> {
    let max_iter = 500;
    let epsilon = 1e-9;
    let nominal = model.without_disturbance();
    let p = dare(&nominal, max_iter, epsilon)?;
    let k = control_gain(nominal.a(), nominal.b(), &p, nominal.r())?;

    let mut x = x0.clone();
    let mut cost = 0.0;
    for (step, gain) in policy.stages.iter().enumerate() {
        let u = &k * &x;
        let stages_to_go = policy.len() - step;
        let w = sample_worst_case(
            &sample_sets[stages_to_go - 1],
            &x,
            &u,
            model,
            &gain.next_value,
            policy.lam,
            rng,
        )?;
        cost += model.stage_cost(&x, &u)?;
        x = model.step(&x, &u, &w)?;
    }
    Ok(cost + model.terminal_cost(&x)?)
}

fn main() -> Result<(), Box<dyn Error>> {
    let config = ExperimentConfig::default();
    let model = config.model()?;
    let x0 = config.initial_state();
    let sample_sets = config.sample_sets(&mut StdRng::seed_from_u64(config.seed))?;

    for &lam in &config.lams {
        let start = Instant::now();
        let cost = evaluate(
            &model,
            lam,
            config.theta,
            config.stage_number,
            &x0,
            &sample_sets,
        )?;
        println!("lam = {lam:>10}: objective {cost} ({:?})", start.elapsed());
        if !cost.is_feasible() {
            continue;
        }

        let policy = synthesize(&model, lam, &sample_sets)?;
        let robust = rollout(
            &model,
            &policy,
            &x0,
            &sample_sets,
            &mut StdRng::seed_from_u64(1),
        )?;
        let nominal = run_nominal(
            &model,
            &policy,
            &x0,
            &sample_sets,
            &mut StdRng::seed_from_u64(1),
        )?;
        println!(
            "    minimax rollout {:.4}, nominal lqr rollout {:.4}",
            robust.cost, nominal
        );
        for (t, x) in robust.states.iter().enumerate().step_by(5) {
            println!(
                "    t = {:>4.1}  x = {:>8.4}  theta = {:>8.4}",
                t as f64 * config.dt.unwrap_or(1.0),
                x[0],
                x[2]
            );
        }
    }
    Ok(())
}
