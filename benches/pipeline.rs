use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::prelude::*;
use wavesense::controllers::{TransformController, TransformParams};
use wavesense::data::formula::Formula;
use wavesense::data::generator::{generate, Channel, GeneratorParams};
use wavesense::{IngestionPipeline, Sample};

fn benchmark(c: &mut Criterion) {
    let mut rng = rand::thread_rng();
    let params = GeneratorParams {
        noise: 0.1,
        ..Default::default()
    };

    c.bench_function("generate triangle", |b| {
        let mut n = 0u64;
        b.iter(|| {
            n += 1;
            generate(black_box(n), Channel::Triangle, &params, &mut rng)
        })
    });

    let formula = Formula::parse("sqrt(abs(x)) * 1000 - 2(x + pi)").unwrap();
    c.bench_function("formula eval", |b| {
        b.iter(|| formula.eval(black_box(0.42)))
    });

    let mut pipeline = IngestionPipeline::new(TransformController::new(TransformParams {
        offset: 0.1,
        filter_enabled: true,
        formula: "x*1000".into(),
        subsampling: 2,
        ..Default::default()
    }));
    let values: Vec<f64> = (0..1024).map(|_| rng.gen_range(-1.0..1.0)).collect();
    c.bench_function("pipeline on_sample", |b| {
        let mut n = 0u64;
        b.iter(|| {
            n += 1;
            pipeline.on_sample(Sample::new(n, values[(n % 1024) as usize]))
        })
    });

    c.bench_function("pipeline on_message", |b| {
        b.iter(|| pipeline.on_message(black_box(r#"{"n":12,"signal":0.5}"#)))
    });

    #[cfg(feature = "fft")]
    {
        use wavesense::data::fft::{welch, FFTWindow, DEFAULT_NFFT};
        let signal: Vec<f64> = (0..8192).map(|_| rng.gen_range(-1.0..1.0)).collect();
        c.bench_function("welch 8192", |b| {
            b.iter(|| welch(black_box(&signal), 10.0, DEFAULT_NFFT, FFTWindow::Hann))
        });
    }
}

criterion_group!(benches, benchmark);
criterion_main!(benches);
