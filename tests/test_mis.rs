use approx::assert_relative_eq;

use lumen::path::{mis_weight, PdfVertex};
use lumen::Float;

fn weight_sum(pdfs: &[PdfVertex]) -> Float {
    (0..pdfs.len()).map(|s| mis_weight(pdfs, s)).sum()
}

#[test]
fn weights_partition_unity() {
    let pdfs = vec![
        PdfVertex::new(0.25, 1.0),
        PdfVertex::new(0.5, 0.75),
        PdfVertex::new(2.0, 0.3),
        PdfVertex::new(1.0, 0.125),
    ];
    assert_relative_eq!(weight_sum(&pdfs), 1.0, max_relative = 1e-5);
}

#[test]
fn weights_partition_unity_with_sentinels() {
    // Negative entries are delta sentinels carrying the geometry term
    let pdfs = vec![
        PdfVertex::new(0.25, 1.0),
        PdfVertex::new(-0.7, 0.75),
        PdfVertex::new(2.0, -0.4),
        PdfVertex::new(1.0, 0.125),
    ];
    assert_relative_eq!(weight_sum(&pdfs), 1.0, max_relative = 1e-5);
}

#[test]
fn weights_partition_unity_long_path() {
    // Pseudo random positive pdfs over the maximum strategy count
    let mut state = 11u64;
    let mut next = || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        0.05 + (state >> 33) as Float / (1u64 << 31) as Float
    };
    let pdfs: Vec<PdfVertex> = (0..16).map(|_| PdfVertex::new(next(), next())).collect();
    assert_relative_eq!(weight_sum(&pdfs), 1.0, max_relative = 1e-5);
}

#[test]
fn zero_pdf_strategy_cannot_be_sampled() {
    // Strategy 2 and above need pdf_fwd[1] which is exactly zero
    let pdfs = vec![
        PdfVertex::new(0.25, 1.0),
        PdfVertex::new(0.0, 0.75),
        PdfVertex::new(2.0, 0.3),
        PdfVertex::new(1.0, 0.125),
    ];
    assert_eq!(mis_weight(&pdfs, 2), 0.0);
    assert_eq!(mis_weight(&pdfs, 3), 0.0);
    // The remaining strategies still partition unity
    let partial: Float = mis_weight(&pdfs, 0) + mis_weight(&pdfs, 1);
    assert_relative_eq!(partial, 1.0, max_relative = 1e-5);
}

#[test]
fn all_zero_array_yields_zero_weight() {
    let pdfs = vec![PdfVertex::zero(); 4];
    for s in 0..pdfs.len() {
        assert_eq!(mis_weight(&pdfs, s), 0.0);
    }
}

#[test]
fn single_strategy_takes_full_weight() {
    let pdfs = vec![PdfVertex::new(0.0, 1.0), PdfVertex::new(1.0, 0.5)];
    // Only s = 0 is sampleable: strategy 1 needs the zero forward pdf
    assert_relative_eq!(mis_weight(&pdfs, 0), 1.0, max_relative = 1e-5);
    assert_eq!(mis_weight(&pdfs, 1), 0.0);
}

#[test]
fn sentinel_magnitude_matches_plain_value() {
    // A sentinel of -g must weigh exactly like a plain pdf of g
    let plain = vec![
        PdfVertex::new(0.25, 1.0),
        PdfVertex::new(0.7, 0.75),
        PdfVertex::new(2.0, 0.3),
    ];
    let sentinel = vec![
        PdfVertex::new(0.25, 1.0),
        PdfVertex::new(-0.7, 0.75),
        PdfVertex::new(2.0, 0.3),
    ];
    for s in 0..3 {
        assert_relative_eq!(
            mis_weight(&plain, s),
            mis_weight(&sentinel, s),
            max_relative = 1e-12
        );
    }
}
