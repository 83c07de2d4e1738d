use ecurve::ThresholdMatrix;
use std::io::Cursor;

#[test]
fn test_protein_cutoff_clamps_to_last_row() {
    let values: Vec<f64> = (0..5000).map(|r| r as f64).collect();
    let t = ThresholdMatrix::new(5000, 1, values).unwrap();
    assert_eq!(t.protein_cutoff(10), 10.0);
    assert_eq!(t.protein_cutoff(10_000), 4999.0);
    assert_eq!(t.get(10_000, 0), None);
    assert_eq!(t.get(4999, 0), Some(4999.0));
}

#[test]
fn test_orf_cutoff_uses_gc_percent_and_length() {
    let (rows, cols) = (101, 50);
    let values: Vec<f64> = (0..rows * cols)
        .map(|i| ((i / cols) * 1000 + i % cols) as f64)
        .collect();
    let t = ThresholdMatrix::new(rows, cols, values).unwrap();
    assert_eq!(t.orf_cutoff(0.5, 10), 50_010.0);
    assert_eq!(t.orf_cutoff(0.25, 80), 25_049.0);
    assert_eq!(t.orf_cutoff(1.5, 0), 100_000.0);
    assert_eq!(t.orf_cutoff(-0.5, 3), 3.0);
}

#[test]
fn test_rejects_inconsistent_dimensions() {
    assert!(ThresholdMatrix::new(0, 1, vec![]).is_err());
    assert!(ThresholdMatrix::new(2, 2, vec![1.0; 3]).is_err());
}

#[test]
fn test_text_round_trip_and_comments() {
    let t = ThresholdMatrix::new(2, 3, vec![0.5, 1.25, -3.0, 1e-7, 42.0, 7.125]).unwrap();
    let mut buf = Vec::new();
    t.store(&mut buf).unwrap();
    assert_eq!(ThresholdMatrix::load(Cursor::new(&buf)).unwrap(), t);

    let text = "# calibrated\n2 2\n1 2\n# second row\n3 4\n";
    let t = ThresholdMatrix::load(Cursor::new(text)).unwrap();
    assert_eq!(t.get(1, 0), Some(3.0));

    assert!(ThresholdMatrix::load(Cursor::new("2 2\n1 2 3\n")).is_err());
    assert!(ThresholdMatrix::load(Cursor::new("2 x\n")).is_err());
    assert!(ThresholdMatrix::load(Cursor::new("")).is_err());
}
