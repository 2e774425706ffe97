use briny_matrix::*;

fn sample() -> Matrix {
    Matrix::with_initializer(4, 5, |row, column| ((row * 13 + column * 7) % 9) as f64 / 4.0 - 1.0)
}

fn with_empty_mask(matrix: &Matrix) -> Matrix {
    let mut masked = matrix.copy().unwrap();
    masked.set_mask(Mask::new(matrix.rows(), matrix.columns())).unwrap();
    masked
}

#[test]
fn test_probability_zero_masks_nothing() {
    let mut mask: Mask = Mask::with_probability(30, 30, 0.0).unwrap();
    mask.mask_by_probability();
    mask.mask_row_by_probability();
    assert!(mask.is_empty());
}

#[test]
fn test_probability_one_masks_everything() {
    let mut mask: Mask = Mask::with_probability(30, 30, 1.0).unwrap();
    mask.mask_by_probability();
    assert_eq!(mask.excluded_count(), 900);
}

#[test]
fn test_masking_rate_tracks_probability() {
    let mut mask: Mask = Mask::with_seed(100, 100, 7);
    mask.set_probability(0.3).unwrap();
    mask.mask_by_probability();
    let rate = mask.excluded_count() as f64 / 10_000.0;
    assert!((rate - 0.3).abs() < 0.03, "rate {rate}");
}

#[test]
fn test_invalid_probability_is_rejected() {
    assert!(matches!(
        Mask::<RowMajor>::with_probability(2, 2, 1.5),
        Err(MatrixError::InvalidProbability(_))
    ));
    let mut mask: Mask = Mask::new(2, 2);
    assert!(mask.set_probability(f64::NAN).is_err());
    assert_eq!(mask.probability(), 0.0);
}

#[test]
fn test_empty_mask_gives_identical_results() {
    let a = sample();
    let b = sample().apply(|x| x * 0.5 + 0.25);
    let masked_a = with_empty_mask(&a);
    let masked_b = with_empty_mask(&b);

    assert_eq!(a.add(&b).unwrap().to_vec(), masked_a.add(&masked_b).unwrap().to_vec());
    assert_eq!(
        a.dot(&b.transpose()).unwrap().to_vec(),
        masked_a.dot(&masked_b.transpose()).unwrap().to_vec()
    );

    let filter = matrix!([[1.0, -0.5], [0.25, 2.0]]);
    assert_eq!(
        a.crosscorrelate(&filter).unwrap().to_vec(),
        masked_a.crosscorrelate(&filter).unwrap().to_vec()
    );
    assert_eq!(a.sum(), masked_a.sum());
    assert_eq!(a.variance(), masked_a.variance());

    let column = a.slice(0, 0, 3, 0).unwrap().copy().unwrap();
    let masked_column = with_empty_mask(&column);
    assert_eq!(column.softmax().unwrap().to_vec(), masked_column.softmax().unwrap().to_vec());
}

#[test]
fn test_masked_cells_keep_result_values() {
    let mut a = matrix!([[1.0, 2.0], [3.0, 4.0]]);
    let mut mask: Mask = Mask::new(2, 2);
    mask.set_column_mask(1, true);
    a.set_mask(mask).unwrap();
    let doubled = a.apply(|x| 2.0 * x);
    assert_eq!(doubled.to_vec(), vec![2.0, 0.0, 6.0, 0.0]);
    assert_eq!(a.count(), 2);
    assert_eq!(a.mean(), 2.0);
}

#[test]
fn test_transpose_carries_mask() {
    let mut a = matrix!([[1.0, 2.0, 3.0]]);
    let mut mask: Mask = Mask::new(1, 3);
    mask.set_mask(0, 2, true);
    a.set_mask(mask).unwrap();
    let t = a.transpose();
    assert!(t.mask().is_some_and(|mask| mask.excludes(2, 0)));
    assert_eq!(t.sum(), 3.0);
}

#[test]
fn test_masking_through_a_reference_reaches_the_source() {
    let mut a = matrix!([[1.0, 2.0], [3.0, 4.0]]);
    a.set_mask(Mask::new(2, 2)).unwrap();
    let mut view = a.reference();
    view.mask_mut().unwrap().set_mask(0, 0, true);
    assert_eq!(a.sum(), view.sum());
    assert_eq!(a.sum(), 9.0);

    let mut t = a.transpose();
    t.mask_mut().unwrap().set_row_mask(1, true);
    assert_eq!(a.sum(), 3.0);
    assert_eq!(t.sum(), 3.0);
}

#[test]
fn test_copy_detaches_the_mask() {
    let mut a = matrix!([[1.0, 2.0], [3.0, 4.0]]);
    a.set_mask(Mask::new(2, 2)).unwrap();
    let mut c = a.copy().unwrap();
    c.mask_mut().unwrap().set_mask(1, 1, true);
    assert_eq!(a.sum(), 10.0);
    assert_eq!(c.sum(), 6.0);
}

#[test]
fn test_mask_shape_must_match() {
    let mut a = matrix!([[1.0, 2.0]]);
    assert!(a.set_mask(Mask::new(2, 1)).is_err());
}

#[test]
fn test_dropout_scales_and_masks() {
    let a: Matrix = Matrix::with_initializer(10, 10, |_, _| 1.0);
    let dropped = a.dropout_with_seed(0.5, 3).unwrap();
    assert!(dropped.to_vec().iter().all(|&x| x == 2.0));
    assert!(dropped.mask().is_some());
    assert!(a.dropout(2.0).is_err());
}
