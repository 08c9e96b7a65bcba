// Trains a small DBN on synthetic "bars" images and reports its accuracy.
//
//   ferrite-dbn [spec.json] [model-out]
//
// Without a network description a 16-12-8-2 binary stack is used. Set RUST_LOG=debug to see
// per-epoch reconstruction errors.
use rand::{rngs::StdRng, Rng, SeedableRng};

use ferrite_dbn::classifier::SvmParameters;
use ferrite_dbn::{DbnConfig, DbnSpec, LayerSpec, RbmConfig, UnitType};

const SIDE: usize = 4;

fn default_spec() -> DbnSpec {
    let rbm = |visible, hidden, seed| LayerSpec::Rbm {
        visible,
        hidden,
        visible_unit: UnitType::Binary,
        hidden_unit: UnitType::Binary,
        config: RbmConfig { seed: Some(seed), batch_size: 5, ..RbmConfig::default() },
    };
    DbnSpec {
        name: "bars".into(),
        layers: vec![rbm(SIDE * SIDE, 12, 1), rbm(12, 8, 2), rbm(8, 2, 3)],
        config: DbnConfig { learning_rate: 0.1, ..DbnConfig::default() },
    }
}

/// Horizontal bars are class 0, vertical bars class 1, with a little pixel noise.
fn bars(count: usize, rng: &mut StdRng) -> (Vec<Vec<f64>>, Vec<usize>) {
    let mut samples = Vec::with_capacity(count);
    let mut labels = Vec::with_capacity(count);
    for _ in 0..count {
        let label = rng.gen_range(0..2);
        let line = rng.gen_range(0..SIDE);
        let mut image = vec![0.0; SIDE * SIDE];
        for k in 0..SIDE {
            let (row, col) = if label == 0 { (line, k) } else { (k, line) };
            image[row * SIDE + col] = 1.0;
        }
        for pixel in image.iter_mut() {
            if rng.gen::<f64>() < 0.05 {
                *pixel = 1.0 - *pixel;
            }
        }
        samples.push(image);
        labels.push(label);
    }
    (samples, labels)
}

fn main() -> ferrite_dbn::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let spec = match args.next() {
        Some(path) => DbnSpec::load_json(&path)?,
        None => default_spec(),
    };

    let mut rng = StdRng::seed_from_u64(42);
    let (train_x, train_y) = bars(200, &mut rng);
    let (test_x, test_y) = bars(50, &mut rng);

    let mut dbn = spec.build()?;
    dbn.display();

    dbn.pretrain(&train_x, 20);
    let error = dbn.fine_tune(&train_x, &train_y, 30, 10);
    log::info!("Fine-tuning finished with error {error:.5}");

    let correct = test_x.iter().zip(&test_y)
        .filter(|(x, &y)| dbn.predict(x) == y)
        .count();
    log::info!("DBN test accuracy: {}/{}", correct, test_x.len());

    if dbn.svm_train(&train_x, &train_y, &SvmParameters::default()) {
        let correct = test_x.iter().zip(&test_y)
            .filter(|(x, &y)| dbn.svm_predict(x) == Some(y))
            .count();
        log::info!("SVM test accuracy: {}/{}", correct, test_x.len());
    }

    if let Some(path) = args.next() {
        dbn.save(&path)?;
        log::info!("Model written to {path}");
    }

    Ok(())
}
