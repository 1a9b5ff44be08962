use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use survival_tune::{
    concordance_index, maximize, synthetic_dataset, train, tune_hyperparameters, FixedSettings,
    HyperparameterRanges, ParameterSet, SearchSpace, SolverKind, SurvivalData, TrainParams,
};
use survival_tune::search::{SearchOptions, SobolSequence};

fn generate_synthetic_data(n_samples: usize, n_features: usize) -> SurvivalData {
    let (features, outcomes) = synthetic_dataset(n_samples, n_features, 42).unwrap();
    SurvivalData::from_arrays(features, outcomes.view()).unwrap()
}

fn benchmark_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10);

    for &n_samples in [100, 300].iter() {
        for &hidden in [8, 32].iter() {
            group.bench_with_input(
                BenchmarkId::from_parameter(format!("{}x{}", n_samples, hidden)),
                &(n_samples, hidden),
                |b, &(n_samples, hidden)| {
                    let data = generate_synthetic_data(n_samples, 6);
                    let params = TrainParams {
                        hidden_width_1: hidden,
                        hidden_width_2: hidden / 2,
                        epochs: 10,
                        ..Default::default()
                    };
                    b.iter(|| {
                        train(data.covariates(), data.times(), data.events(), black_box(&params)).unwrap();
                    });
                },
            );
        }
    }
    group.finish();
}

fn benchmark_c_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("c_index");

    for &n_samples in [100, 500, 1000].iter() {
        let data = generate_synthetic_data(n_samples, 4);
        let risk = data.covariates().column(0).to_owned();

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_samples", n_samples)),
            &n_samples,
            |b, &_n_samples| {
                b.iter(|| {
                    concordance_index(black_box(risk.view()), data.times(), data.events()).unwrap();
                });
            },
        );
    }
    group.finish();
}

fn benchmark_solvers(c: &mut Criterion) {
    let mut group = c.benchmark_group("solvers");

    let mut space = SearchSpace::new();
    for k in 0..6 {
        space.add(format!("x{}", k), (-1.0, 1.0)).unwrap();
    }
    let sphere = |p: &ParameterSet| Ok(-p.values().map(|v| v * v).sum::<f64>());

    for kind in SolverKind::ALL {
        group.bench_function(kind.name(), |b| {
            b.iter(|| {
                maximize(sphere, black_box(500), kind.name(), &space, &SearchOptions::default()).unwrap();
            });
        });
    }

    group.bench_function("sobol_sequence_1024x16", |b| {
        b.iter(|| {
            let points: Vec<Vec<f64>> = SobolSequence::new(16).unwrap().take(1024).collect();
            black_box(points);
        });
    });

    group.finish();
}

fn benchmark_tuning(c: &mut Criterion) {
    let mut group = c.benchmark_group("tuning");
    group.sample_size(10);

    let (features, outcomes) = synthetic_dataset(150, 5, 7).unwrap();
    let fixed = FixedSettings { epochs: 5, batch_size: 32, ..Default::default() };

    for &parallel in [false, true].iter() {
        group.bench_function(if parallel { "pso_parallel" } else { "pso_serial" }, |b| {
            let fixed = FixedSettings { parallel, ..fixed };
            b.iter(|| {
                tune_hyperparameters(
                    features.clone(),
                    outcomes.view(),
                    "particle swarm",
                    3,
                    black_box(8),
                    &HyperparameterRanges::default(),
                    &fixed,
                ).unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_training,
    benchmark_c_index,
    benchmark_solvers,
    benchmark_tuning
);
criterion_main!(benches);
