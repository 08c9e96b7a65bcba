use std::io::{BufRead, Cursor, Write};
use std::sync::{mpsc, Arc, Mutex};

use ferrite_dbn::classifier::{Grid, SvmParameters};
use ferrite_dbn::layers::{Pooling, Rbm, RbmConfig, TrainingContext, UnitLayer};
use ferrite_dbn::{Dbn, DbnConfig, DbnError, DbnWatcher, SgdFineTuner, SilentWatcher, UnitType, LABEL_PRIOR};

/// Deterministic layer whose training changes nothing; it records what it
/// was trained on.
struct StubLayer {
    input: usize,
    output: usize,
    pretrain_last: bool,
    log: Arc<Mutex<Vec<String>>>,
    seen: Arc<Mutex<Vec<Vec<f64>>>>,
}

impl StubLayer {
    fn new(input: usize, output: usize, log: &Arc<Mutex<Vec<String>>>) -> StubLayer {
        StubLayer { input, output, pretrain_last: true, log: log.clone(), seen: Arc::new(Mutex::new(Vec::new())) }
    }
}

impl UnitLayer for StubLayer {
    fn input_size(&self) -> usize {
        self.input
    }

    fn output_size(&self) -> usize {
        self.output
    }

    fn pretrain_last(&self) -> bool {
        self.pretrain_last
    }

    fn parameters(&self) -> usize {
        0
    }

    fn describe(&self) -> String {
        format!("stub {} -> {}", self.input, self.output)
    }

    /// out[j] = sum of in[k] for every k ≡ j (mod output), scaled down.
    fn activate_one(&self, input: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.output];
        for (k, x) in input.iter().enumerate() {
            out[k % self.output] += 0.25 * x;
        }
        out
    }

    fn activate_visible(&self, hidden: &[f64]) -> Vec<f64> {
        (0..self.input).map(|k| hidden[k % self.output]).collect()
    }

    fn train_sub(&mut self, batch: &[Vec<f64>], context: &mut TrainingContext) {
        self.seen.lock().unwrap().extend(batch.iter().cloned());
        context.samples += batch.len();
    }

    fn finalize_epoch(&mut self, epoch: usize, context: &TrainingContext) {
        self.log.lock().unwrap().push(format!("{}x{} epoch {} on {}", self.input, self.output, epoch, context.samples));
    }

    fn backward(&self, _input: &[f64], _output: &[f64], _delta: &[f64]) -> (Vec<f64>, Vec<f64>) {
        (Vec::new(), vec![0.0; self.input])
    }

    fn store(&self, _os: &mut dyn Write) -> ferrite_dbn::Result<()> {
        Ok(())
    }

    fn load(&mut self, _is: &mut dyn BufRead) -> ferrite_dbn::Result<()> {
        Ok(())
    }
}

/// Top layer with a known reconstruction: the hidden pair is
/// `[input[3], input[0]]` and the visible side is three large feature values
/// followed by the hidden pair in the label slots.
struct ReconstructingTop {
    queried: Arc<Mutex<Vec<Vec<f64>>>>,
}

impl UnitLayer for ReconstructingTop {
    fn input_size(&self) -> usize {
        5
    }

    fn output_size(&self) -> usize {
        2
    }

    fn parameters(&self) -> usize {
        0
    }

    fn describe(&self) -> String {
        "reconstructing top".to_string()
    }

    fn activate_one(&self, input: &[f64]) -> Vec<f64> {
        self.queried.lock().unwrap().push(input.to_vec());
        vec![input[3], input[0]]
    }

    fn activate_visible(&self, hidden: &[f64]) -> Vec<f64> {
        vec![9.0, 9.0, 9.0, hidden[0], hidden[1]]
    }

    fn train_sub(&mut self, _batch: &[Vec<f64>], _context: &mut TrainingContext) {}

    fn backward(&self, _input: &[f64], _output: &[f64], _delta: &[f64]) -> (Vec<f64>, Vec<f64>) {
        (Vec::new(), vec![0.0; 5])
    }

    fn store(&self, _os: &mut dyn Write) -> ferrite_dbn::Result<()> {
        Ok(())
    }

    fn load(&mut self, _is: &mut dyn BufRead) -> ferrite_dbn::Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct RecordingWatcher {
    events: Vec<String>,
}

impl DbnWatcher for RecordingWatcher {
    fn pretraining_begin(&mut self, _dbn: &Dbn, max_epochs: usize) {
        self.events.push(format!("begin {max_epochs}"));
    }

    fn pretrain_layer(&mut self, _dbn: &Dbn, index: usize, layer: &dyn UnitLayer, samples: usize) {
        self.events.push(format!("layer {index} ({}) {samples}", layer.describe()));
    }

    fn pretraining_end(&mut self, _dbn: &Dbn) {
        self.events.push("end".to_string());
    }
}

fn dummy_data() -> Vec<Vec<f64>> {
    vec![
        vec![1.0, 0.0, 0.0, 1.0],
        vec![0.0, 1.0, 1.0, 0.0],
        vec![1.0, 1.0, 0.0, 0.0],
    ]
}

fn rbm(visible: usize, hidden: usize, seed: u64) -> Box<dyn UnitLayer> {
    Box::new(Rbm::new(visible, hidden, RbmConfig { seed: Some(seed), batch_size: 3, learning_rate: 0.3, ..RbmConfig::default() }))
}

fn binary_data(count: usize) -> Vec<Vec<f64>> {
    (0..count)
        .map(|i| (0..6).map(|b| if (i >> (b % 3)) & 1 == 1 { 1.0 } else { 0.0 }).collect())
        .collect()
}

#[test]
fn stub_stack_runs_the_whole_chain() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut dbn = Dbn::new(
        vec![Box::new(StubLayer::new(4, 3, &log)), Box::new(StubLayer::new(3, 2, &log))],
        DbnConfig::default(),
    ).unwrap();

    let mut watcher = RecordingWatcher::default();
    dbn.pretrain_with(&dummy_data(), 5, &mut watcher);

    assert_eq!(watcher.events, vec![
        "begin 5".to_string(),
        "layer 0 (stub 4 -> 3) 3".to_string(),
        "layer 1 (stub 3 -> 2) 3".to_string(),
        "end".to_string(),
    ]);

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 10);
    assert_eq!(log[0], "4x3 epoch 0 on 3");
    assert_eq!(log[9], "3x2 epoch 4 on 3");

    // [1, 0, 0, 1] -> [0.5, 0, 0] -> [0.125, 0]
    let sample = [1.0, 0.0, 0.0, 1.0];
    assert_eq!(dbn.activation_probabilities(&sample), vec![0.125, 0.0]);
    assert_eq!(dbn.full_activation_probabilities(&sample), vec![0.5, 0.0, 0.0, 0.125, 0.0]);
    let first = dbn.predict(&sample);
    assert_eq!(first, 0);
    assert_eq!(dbn.predict(&sample), first);
}

#[test]
fn second_layer_learns_from_first_layer_output() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let top = StubLayer::new(3, 2, &log);
    let seen = top.seen.clone();
    let mut dbn = Dbn::new(vec![Box::new(StubLayer::new(4, 3, &log)), Box::new(top)], DbnConfig::default()).unwrap();

    dbn.pretrain_with(&dummy_data(), 1, &mut SilentWatcher);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[0], vec![0.5, 0.0, 0.0]);
    assert_eq!(seen[1], vec![0.0, 0.25, 0.25]);
}

#[test]
fn batched_mode_feeds_the_same_inputs_in_big_batches() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let top = StubLayer::new(3, 2, &log);
    let seen = top.seen.clone();
    let config = DbnConfig { save_memory: true, batch_size: 2, ..DbnConfig::default() };
    let mut dbn = Dbn::new(vec![Box::new(StubLayer::new(4, 3, &log)), Box::new(top)], config).unwrap();

    dbn.pretrain_with(&dummy_data(), 2, &mut SilentWatcher);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 6);
    assert_eq!(seen[0], vec![0.5, 0.0, 0.0]);
    assert_eq!(seen[3], vec![0.5, 0.0, 0.0]);
    // the per-epoch context survives across big batches
    assert!(log.lock().unwrap().contains(&"3x2 epoch 1 on 3".to_string()));
}

#[test]
fn batched_and_full_pretraining_agree() {
    let data = binary_data(23);

    let mut full = Dbn::new(vec![rbm(6, 4, 1), rbm(4, 3, 2)], DbnConfig::default()).unwrap();
    let mut batched = Dbn::new(
        vec![rbm(6, 4, 1), rbm(4, 3, 2)],
        DbnConfig { save_memory: true, batch_size: 2, parallel: true, threads: Some(2), ..DbnConfig::default() },
    ).unwrap();

    full.pretrain_with(&data, 4, &mut SilentWatcher);
    batched.pretrain_with(&data, 4, &mut SilentWatcher);

    let mut full_bytes = Vec::new();
    let mut batched_bytes = Vec::new();
    full.store(&mut full_bytes).unwrap();
    batched.store(&mut batched_bytes).unwrap();
    assert_eq!(full_bytes, batched_bytes);
}

#[test]
fn pooling_layers_are_skipped_and_not_persisted() {
    let mut dbn = Dbn::new(
        vec![rbm(6, 4, 3), Box::new(Pooling::max(4, 2)), rbm(2, 2, 4)],
        DbnConfig::default(),
    ).unwrap();

    let mut watcher = RecordingWatcher::default();
    dbn.pretrain_with(&binary_data(12), 3, &mut watcher);
    assert_eq!(watcher.events.len(), 4);
    assert!(watcher.events[1].starts_with("layer 0 "));
    assert!(watcher.events[2].starts_with("layer 2 "));

    let mut bytes = Vec::new();
    dbn.store(&mut bytes).unwrap();
    let text = String::from_utf8(bytes).unwrap();
    assert_eq!(text.lines().count(), 2);
}

#[test]
fn reloaded_network_activates_identically() {
    let data = binary_data(20);
    let mut trained = Dbn::new(vec![rbm(6, 5, 7), rbm(5, 3, 8)], DbnConfig::default()).unwrap();
    trained.pretrain_with(&data, 5, &mut SilentWatcher);

    let mut bytes = Vec::new();
    trained.store(&mut bytes).unwrap();

    let mut fresh = Dbn::new(vec![rbm(6, 5, 70), rbm(5, 3, 80)], DbnConfig::default()).unwrap();
    fresh.load_from(&mut Cursor::new(bytes)).unwrap();

    for sample in &data {
        assert_eq!(fresh.activation_probabilities(sample), trained.activation_probabilities(sample));
    }
}

#[test]
fn truncated_stream_reports_the_missing_layer() {
    let dbn = Dbn::new(vec![rbm(6, 5, 1)], DbnConfig::default()).unwrap();
    let mut bytes = Vec::new();
    dbn.store(&mut bytes).unwrap();

    let mut bigger = Dbn::new(vec![rbm(6, 5, 1), rbm(5, 2, 2)], DbnConfig::default()).unwrap();
    match bigger.load_from(&mut Cursor::new(bytes)) {
        Err(DbnError::MissingBlock { index: 1 }) => {}
        result => panic!("unexpected result: {result:?}"),
    }
}

#[test]
fn labels_are_appended_before_the_top_layer() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let top = StubLayer::new(3 + 3, 2, &log);
    let seen = top.seen.clone();
    let mut dbn = Dbn::new(vec![Box::new(StubLayer::new(4, 3, &log)), Box::new(top)], DbnConfig::default()).unwrap();

    dbn.train_with_labels(&dummy_data(), &[1, 0, 2], 3, 1);

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0][3..], [0.0, 1.0, 0.0]);
    assert_eq!(seen[1][3..], [1.0, 0.0, 0.0]);
    assert_eq!(seen[2][3..], [0.0, 0.0, 1.0]);
    assert_eq!(seen[0][..3], [0.5, 0.0, 0.0]);
}

#[test]
#[should_panic(expected = "same number of values than labels")]
fn label_count_mismatch_panics() {
    let mut dbn = Dbn::new(vec![rbm(6, 4, 1), rbm(4 + 2, 3, 2)], DbnConfig::default()).unwrap();
    dbn.train_with_labels(&binary_data(4), &[0, 1, 0], 2, 1);
}

#[test]
#[should_panic(expected = "no room for the labels units")]
fn missing_label_units_panic() {
    let mut dbn = Dbn::new(vec![rbm(6, 4, 1), rbm(4, 3, 2)], DbnConfig::default()).unwrap();
    dbn.train_with_labels(&binary_data(4), &[0, 1, 0, 1], 2, 1);
}

#[test]
fn label_augmented_network_predicts_labels() {
    let data = binary_data(16);
    let labels: Vec<usize> = (0..16).map(|i| i % 2).collect();
    let mut dbn = Dbn::new(vec![rbm(6, 4, 5), rbm(4 + 2, 5, 6)], DbnConfig::default()).unwrap();
    dbn.train_with_labels(&data, &labels, 2, 10);

    for sample in &data {
        let label = dbn.predict_labels(sample, 2);
        assert!(label < 2);
        assert_eq!(dbn.predict_labels(sample, 2), label);
    }
}

#[test]
fn fine_tuning_reports_every_epoch() {
    let data = binary_data(16);
    let labels: Vec<usize> = (0..16).map(|i| i % 2).collect();
    let config = DbnConfig { learning_rate: 0.1, ..DbnConfig::default() };
    let mut dbn = Dbn::new(vec![rbm(6, 4, 5), Box::new(Pooling::average(4, 2)), rbm(2, 2, 6)], config).unwrap();
    dbn.pretrain_with(&data, 3, &mut SilentWatcher);

    let (tx, rx) = mpsc::channel();
    let mut tuner = SgdFineTuner::with_progress(tx);
    let error = dbn.fine_tune_with(&mut tuner, &data, &labels, 4, 5);
    drop(tuner);

    let stats: Vec<_> = rx.iter().collect();
    assert_eq!(stats.len(), 4);
    assert_eq!(stats[3].epoch, 4);
    assert_eq!(stats[3].error, error);
    assert!(error.is_finite() && error >= 0.0);
}

#[test]
fn classifier_model_is_persisted_after_the_layers() {
    let data = binary_data(24);
    let labels: Vec<usize> = data.iter().map(|s| s[0] as usize).collect();
    let config = DbnConfig { concatenate: true, ..DbnConfig::default() };
    let mut dbn = Dbn::new(vec![rbm(6, 4, 9), rbm(4, 3, 10)], config.clone()).unwrap();
    dbn.pretrain_with(&data, 3, &mut SilentWatcher);

    assert_eq!(dbn.features(&data[0]).len(), 7);
    assert_eq!(dbn.svm_predict(&data[0]), None);
    assert!(!dbn.svm_train(&data, &vec![0; 24], &SvmParameters::default()));
    assert!(dbn.svm_train(&data, &labels, &SvmParameters::default()));
    let predicted = dbn.svm_predict(&data[0]);
    assert!(predicted.is_some());

    let mut bytes = Vec::new();
    dbn.store(&mut bytes).unwrap();
    assert_eq!(String::from_utf8(bytes.clone()).unwrap().lines().count(), 3);

    let mut fresh = Dbn::new(vec![rbm(6, 4, 1), rbm(4, 3, 1)], config).unwrap();
    fresh.load_from(&mut Cursor::new(bytes)).unwrap();
    assert_eq!(fresh.svm_predict(&data[0]), predicted);
}

#[test]
fn batched_mode_skips_pooling_layers() {
    let data = binary_data(23);
    let stack = || vec![rbm(6, 4, 11), Box::new(Pooling::max(4, 2)) as Box<dyn UnitLayer>, rbm(2, 3, 12)];

    let mut full = Dbn::new(stack(), DbnConfig::default()).unwrap();
    let mut batched = Dbn::new(stack(), DbnConfig { save_memory: true, batch_size: 2, ..DbnConfig::default() }).unwrap();

    let mut full_watcher = RecordingWatcher::default();
    let mut batched_watcher = RecordingWatcher::default();
    full.pretrain_with(&data, 4, &mut full_watcher);
    batched.pretrain_with(&data, 4, &mut batched_watcher);

    assert_eq!(batched_watcher.events, full_watcher.events);
    assert_eq!(batched_watcher.events.len(), 4);
    assert!(batched_watcher.events[1].starts_with("layer 0 "));
    assert!(batched_watcher.events[2].starts_with("layer 2 "));

    let mut full_bytes = Vec::new();
    let mut batched_bytes = Vec::new();
    full.store(&mut full_bytes).unwrap();
    batched.store(&mut batched_bytes).unwrap();
    assert_eq!(full_bytes, batched_bytes);
}

#[test]
fn batched_mode_leaves_a_top_layer_without_pretrain_last_alone() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut top = StubLayer::new(3, 2, &log);
    top.pretrain_last = false;
    let seen = top.seen.clone();
    let config = DbnConfig { save_memory: true, batch_size: 2, ..DbnConfig::default() };
    let mut dbn = Dbn::new(vec![Box::new(StubLayer::new(4, 3, &log)), Box::new(top)], config).unwrap();

    let mut watcher = RecordingWatcher::default();
    dbn.pretrain_with(&dummy_data(), 2, &mut watcher);

    assert_eq!(watcher.events, vec![
        "begin 2".to_string(),
        "layer 0 (stub 4 -> 3) 3".to_string(),
        "end".to_string(),
    ]);
    assert!(seen.lock().unwrap().is_empty());
    assert!(log.lock().unwrap().iter().all(|line| line.starts_with("4x3 ")));
}

#[test]
fn label_prediction_reads_only_the_reconstructed_label_units() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let queried = Arc::new(Mutex::new(Vec::new()));
    let dbn = Dbn::new(
        vec![Box::new(StubLayer::new(4, 3, &log)), Box::new(ReconstructingTop { queried: queried.clone() })],
        DbnConfig::default(),
    ).unwrap();

    // [1, 0, 0, 1] -> [0.5, 0, 0] -> hidden [0.1, 0.5] -> labels [0.1, 0.5]
    assert_eq!(dbn.predict_labels(&[1.0, 0.0, 0.0, 1.0], 2), 1);
    // [0, 0, 0, 0] -> hidden [0.1, 0] -> labels [0.1, 0]
    assert_eq!(dbn.predict_labels(&[0.0; 4], 2), 0);

    let queried = queried.lock().unwrap();
    assert_eq!(queried.len(), 2);
    assert_eq!(queried[0], vec![0.5, 0.0, 0.0, LABEL_PRIOR, LABEL_PRIOR]);
    assert_eq!(queried[1], vec![0.0, 0.0, 0.0, LABEL_PRIOR, LABEL_PRIOR]);
}

#[test]
fn scaled_features_are_kept_with_the_classifier() {
    let data: Vec<Vec<f64>> = binary_data(24).into_iter()
        .map(|s| s.into_iter().map(|x| x * 100.0).collect())
        .collect();
    let labels: Vec<usize> = (0..24).map(|i| i % 2).collect();
    let layers = |seed: u64| -> Vec<Box<dyn UnitLayer>> {
        let config = RbmConfig { seed: Some(seed), ..RbmConfig::default() };
        vec![
            Box::new(Rbm::with_units(6, 4, UnitType::Binary, UnitType::Gaussian, config.clone())),
            Box::new(Rbm::new(4, 3, config)),
        ]
    };
    let config = DbnConfig { concatenate: true, scale: true, ..DbnConfig::default() };
    let mut dbn = Dbn::new(layers(21), config.clone()).unwrap();

    let raw: Vec<Vec<f64>> = data.iter().map(|s| dbn.features(s)).collect();
    assert!(raw.iter().flatten().any(|&x| !(0.0..=1.0).contains(&x)));

    let problem = dbn.make_problem(&data, &labels);
    assert!(problem.features.iter().flatten().all(|&x| (0.0..=1.0).contains(&x)));
    let scaling = problem.scaling.clone().unwrap();
    assert_eq!(scaling.min.len(), 7);
    for (column, (&lo, &hi)) in scaling.min.iter().zip(&scaling.max).enumerate() {
        assert_eq!(lo, raw.iter().map(|f| f[column]).fold(f64::INFINITY, f64::min));
        assert_eq!(hi, raw.iter().map(|f| f[column]).fold(f64::NEG_INFINITY, f64::max));
    }

    assert!(dbn.svm_train(&data, &labels, &SvmParameters::default()));
    assert_eq!(dbn.svm_model().unwrap().scaling.as_ref(), Some(&scaling));
    let predictions: Vec<_> = data.iter().map(|s| dbn.svm_predict(s)).collect();

    let mut bytes = Vec::new();
    dbn.store(&mut bytes).unwrap();
    let mut fresh = Dbn::new(layers(99), config).unwrap();
    fresh.load_from(&mut Cursor::new(bytes)).unwrap();

    assert_eq!(fresh.svm_model().unwrap().scaling.as_ref(), Some(&scaling));
    let reloaded: Vec<_> = data.iter().map(|s| fresh.svm_predict(s)).collect();
    assert_eq!(reloaded, predictions);
}

#[test]
fn grid_search_with_too_few_folds_is_refused() {
    let data = binary_data(12);
    let labels: Vec<usize> = data.iter().map(|s| s[0] as usize).collect();
    let dbn = Dbn::new(vec![rbm(6, 4, 1)], DbnConfig::default()).unwrap();

    assert!(dbn.svm_grid_search(&data, &labels, 1, &Grid::default()).is_none());
    assert!(dbn.svm_grid_search(&data, &labels, 13, &Grid::default()).is_none());
    assert!(dbn.svm_grid_search(&data, &labels, 3, &Grid { lambdas: vec![1e-2] }).is_some());
}
