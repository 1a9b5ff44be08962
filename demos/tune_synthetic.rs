use ndarray::s;
use survival_tune::{
    synthetic_dataset, train::train_on, tune_hyperparameters, FixedSettings, HyperparameterRanges,
    SolverKind, SurvivalData, TuningResult,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("info"))
        .init();

    println!("Deep Cox Survival Net - Hyperparameter Search Example");
    println!("====================================================\n");

    // x0 and x1 drive the hazard, x0 enters nonlinearly
    let (features, outcomes) = synthetic_dataset(400, 6, 42)?;

    // hold out the last 20% for a final check
    let train_size = (features.nrows() as f64 * 0.8) as usize;
    let train_x = features.slice(s![..train_size, ..]).to_owned();
    let train_y = outcomes.slice(s![..train_size, ..]);
    let train_data = SurvivalData::from_arrays(train_x.clone(), train_y)?;
    let test_data = SurvivalData::from_arrays(
        features.slice(s![train_size.., ..]).to_owned(),
        outcomes.slice(s![train_size.., ..]),
    )?;

    println!("Dataset created:");
    println!("  - Samples: {} ({} train / {} held out)",
             features.nrows(), train_data.n_samples(), test_data.n_samples());
    println!("  - Features: {}", train_data.n_features());
    println!("  - Training events: {}", train_data.n_events());
    println!("  - Training censored: {}", train_data.n_samples() - train_data.n_events());
    println!();

    let ranges = HyperparameterRanges::default();
    let fixed = FixedSettings {
        epochs: 20,
        batch_size: 32,
        parallel: true,
        ..Default::default()
    };

    println!("{:<16} {:>10} {:>8} {:>10}", "Solver", "CV C-idx", "Evals", "Seconds");
    println!("{:-<47}", "");

    let mut best = None;
    for kind in SolverKind::ALL {
        let result = tune_hyperparameters(
            train_x.clone(),
            train_y,
            kind.name(),
            3,
            12,
            &ranges,
            &fixed,
        )?;

        println!("{:<16} {:>10.4} {:>8} {:>10.1}",
                 kind.name(), result.optimum, result.log.num_evals(), result.log.elapsed_secs);

        if best.as_ref().map_or(true, |(_, b): &(SolverKind, TuningResult)| result.optimum > b.optimum) {
            best = Some((kind, result));
        }
    }
    println!();

    let Some((kind, result)) = best else {
        return Ok(());
    };

    println!("Best search: {}", kind);
    result.print();
    println!();

    // retrain on all training rows w/ the winner, score the held-out rows
    let params = result.train_params(&fixed)?;
    let model = train_on(&train_data, &params)?;

    println!("Training Set Performance:");
    model.evaluate(&train_data)?.print();
    println!();

    println!("Held-out Set Performance:");
    model.evaluate(&test_data)?.print();

    Ok(())
}
