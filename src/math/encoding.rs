/// One-hot vector of width `classes`; a label outside the range encodes as
/// all zeros.
pub fn one_hot(label: usize, classes: usize) -> Vec<f64> {
    (0..classes).map(|l| if l == label { 1.0 } else { 0.0 }).collect()
}

/// Index of the largest value; ties go to the first occurrence.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &x) in values.iter().enumerate() {
        if x > values[best] {
            best = i;
        }
    }
    best
}
