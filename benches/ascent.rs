//! Run these benches with `cargo bench --bench ascent -- --verbose`

use criterion::{criterion_group, criterion_main, Criterion};
use metfor::{Celsius, HectoPascal, Meters, MetersPSec};
use parcel_ascent::{
    run_ascent, AscentConfig, DynamicSchemeKind, Environment, PseudoAdiabaticSchemeKind,
};

fn build_tester() -> Criterion {
    Criterion::default()
        .sample_size(100)
        .measurement_time(std::time::Duration::from_secs(10))
        .noise_threshold(0.03)
        .significance_level(0.01)
}

criterion_main!(ascent_benches);

criterion_group!(
    name = ascent_benches;
    config = build_tester();
    targets = finite_difference_bench, runge_kutta_bench, saturated_ascent_bench
);

fn build_environment() -> Environment {
    let heights: Vec<_> = (0..=30).map(|i| Meters(i as f64 * 250.0)).collect();
    let pressures: Vec<_> = (0..=30)
        .map(|i| HectoPascal(1000.0 * (-(i as f64 * 250.0) / 8000.0).exp()))
        .collect();
    let temperatures: Vec<_> = (0..=30).map(|i| Celsius(15.0 - i as f64 * 2.5)).collect();
    let dew_points: Vec<_> = (0..=30).map(|i| Celsius(9.0 - i as f64 * 2.5)).collect();

    Environment::new(heights, pressures, temperatures, dew_points)
        .expect("bad synthetic sounding")
}

fn build_config(dynamic_scheme: DynamicSchemeKind) -> AscentConfig {
    AscentConfig {
        initial_height: Meters(100.0),
        initial_velocity: MetersPSec(1.0),
        initial_temperature: Celsius(17.0),
        initial_dew_point: Celsius(9.0),
        time_step: 1.0,
        period: 0.5,
        dynamic_scheme,
        pseudoadiabatic_scheme: PseudoAdiabaticSchemeKind::Numerical,
    }
}

fn finite_difference_bench(c: &mut Criterion) {
    let env = build_environment();
    let config = build_config(DynamicSchemeKind::FiniteDifference);

    c.bench_function("finite_difference_ascent", |b| {
        b.iter(|| {
            let _x = run_ascent(&config, &env).expect("oops");
        });
    });
}

fn runge_kutta_bench(c: &mut Criterion) {
    let env = build_environment();
    let config = build_config(DynamicSchemeKind::RungeKutta);

    c.bench_function("runge_kutta_ascent", |b| {
        b.iter(|| {
            let _x = run_ascent(&config, &env).expect("oops");
        });
    });
}

fn saturated_ascent_bench(c: &mut Criterion) {
    let env = build_environment();
    let config = AscentConfig {
        initial_dew_point: Celsius(17.0),
        ..build_config(DynamicSchemeKind::FiniteDifference)
    };

    c.bench_function("saturated_ascent", |b| {
        b.iter(|| {
            let _x = run_ascent(&config, &env).expect("oops");
        });
    });
}
