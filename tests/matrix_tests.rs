use approx::assert_abs_diff_eq;
use briny_matrix::*;

fn counting(rows: usize, columns: usize) -> Matrix {
    Matrix::with_initializer(rows, columns, |row, column| (row * columns + column + 1) as f64)
}

#[test]
fn test_out_of_bounds_access_panics() {
    let result = std::panic::catch_unwind(|| {
        let m: Matrix = Matrix::new(2, 2);
        m.value(2, 0)
    });
    assert!(result.is_err());
}

#[test]
fn test_ragged_rows_are_rejected() {
    let rows: [&[f64]; 2] = [&[1.0, 2.0], &[3.0]];
    assert!(Matrix::<RowMajor>::from_rows(&rows).is_err());
    assert!(Matrix::<RowMajor>::from_vec(2, 2, vec![1.0, 2.0, 3.0]).is_err());
}

#[test]
fn test_add_then_subtract_restores_values() {
    let a = counting(3, 2);
    let b: Matrix = Matrix::with_initializer(3, 2, |row, column| 0.5 * row as f64 - column as f64);
    let back = a.add(&b).unwrap().subtract(&b).unwrap();
    for (x, y) in back.to_vec().iter().zip(a.to_vec()) {
        assert_abs_diff_eq!(*x, y, epsilon = 1e-12);
    }
}

#[test]
fn test_scalar_broadcast_matches_apply() {
    let a = counting(2, 3);
    let five = Matrix::scalar(5.0);
    assert_eq!(a.add(&five).unwrap(), a.apply(|x| x + 5.0));
    assert_eq!(five.multiply(&a).unwrap(), a.apply(|x| 5.0 * x));
}

#[test]
fn test_shape_mismatch_is_an_error() {
    let a = counting(2, 3);
    let b = counting(3, 2);
    match a.add(&b) {
        Err(MatrixError::DimensionMismatch { expected, found, .. }) => {
            assert_eq!(expected, (2, 3));
            assert_eq!(found, (3, 2));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_double_transpose_shares_storage() {
    let a = counting(2, 3);
    let tt = a.transpose().transpose();
    assert!(tt.shares_storage(&a));
    assert_eq!(tt, a);
    tt.set_value(1, 2, -1.0);
    assert_eq!(a.value(1, 2), -1.0);
    assert_eq!(a.transpose().value(2, 1), -1.0);
}

#[test]
fn test_column_major_matches_row_major() {
    let r = counting(2, 3);
    let c: Matrix<ColumnMajor> = Matrix::with_initializer(2, 3, |row, column| (row * 3 + column + 1) as f64);
    assert_eq!(r.to_vec(), c.to_vec());
    let rd = r.dot(&r.transpose()).unwrap();
    let cd = c.dot(&c.transpose()).unwrap();
    assert_eq!(rd.to_vec(), cd.to_vec());
}

#[test]
fn test_slice_writes_through_and_unslices() {
    let a = counting(3, 3);
    let mut s = a.slice(1, 1, 2, 2).unwrap();
    assert_eq!(s.to_vec(), vec![5.0, 6.0, 8.0, 9.0]);
    s.set_value(0, 0, 0.0);
    assert_eq!(a.value(1, 1), 0.0);
    s.unslice();
    assert_eq!(s.shape(), (3, 3));
    assert!(matches!(a.slice(2, 0, 1, 0), Err(MatrixError::InvalidSlice { .. })));
    assert!(a.slice(0, 0, 3, 0).is_err());
}

#[test]
fn test_copy_is_independent() {
    let a = counting(2, 2);
    let b = a.copy().unwrap();
    b.set_value(0, 0, 100.0);
    assert_eq!(a.value(0, 0), 1.0);
    assert!(!a.shares_storage(&b));
}

#[test]
fn test_dot_against_hand_computed() {
    let a = matrix!([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
    let b = matrix!([[7.0, 8.0], [9.0, 10.0], [11.0, 12.0]]);
    assert_eq!(a.dot(&b).unwrap().to_vec(), vec![58.0, 64.0, 139.0, 154.0]);
}

#[test]
fn test_scaling_constant_scales_results() {
    let mut a = counting(2, 2);
    a.set_scaling_constant(0.5);
    assert_eq!(a.apply(|x| x).to_vec(), vec![0.5, 1.0, 1.5, 2.0]);
    a.unset_scaling_constant();
    assert_eq!(a.scaling_constant(), 1.0);
}

#[test]
fn test_divide_by_zero_gives_infinity() {
    let a = counting(1, 2);
    let b = matrix!([[0.0, 2.0]]);
    let q = a.divide(&b).unwrap();
    assert!(q.value(0, 0).is_infinite());
    assert_eq!(q.value(0, 1), 1.0);
}

#[test]
fn test_reductions() {
    let a = counting(2, 2);
    assert_eq!(a.sum(), 10.0);
    assert_eq!(a.mean(), 2.5);
    assert_abs_diff_eq!(a.variance(), 1.25, epsilon = 1e-12);
    assert_abs_diff_eq!(a.standard_deviation(), (5.0_f64 / 3.0).sqrt(), epsilon = 1e-12);
    assert_abs_diff_eq!(a.norm(2.0), 30.0_f64.sqrt(), epsilon = 1e-12);
    assert_eq!(a.argmax(), Some((1, 1)));
    assert_eq!(a.argmin(), Some((0, 0)));
    assert!(a.sum_as_matrix().is_scalar());
}

#[test]
fn test_normalize_has_zero_mean() {
    let a = counting(3, 3);
    let n = a.normalize();
    assert_abs_diff_eq!(n.mean(), 0.0, epsilon = 1e-12);
    assert_abs_diff_eq!(n.standard_deviation(), 1.0, epsilon = 1e-12);
}

#[test]
fn test_min_max_rescales_range() {
    let a = counting(1, 5);
    let s = a.min_max(-1.0, 1.0);
    assert_eq!(s.min_value(), Some(-1.0));
    assert_eq!(s.max_value(), Some(1.0));
}

#[test]
fn test_invalid_window_parameters() {
    let mut a = counting(2, 2);
    assert!(matches!(a.set_stride(0), Err(MatrixError::InvalidConfiguration(_))));
    assert!(a.set_dilation(0).is_err());
    assert!(a.set_filter_size(0, 2).is_err());
    assert_eq!(a.stride(), 1);
}

#[test]
fn test_initialization_respects_scale() {
    let m: Matrix = Matrix::with_initialization(20, 30, Initialization::UniformXavier, 20, 30);
    let bound = (6.0_f64 / 50.0).sqrt();
    assert!(m.to_vec().iter().all(|x| x.abs() <= bound));
    let i: Matrix = Matrix::with_initialization(3, 3, Initialization::Identity, 3, 3);
    assert_eq!(i.to_vec(), vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
}

#[test]
fn test_named_functions() {
    let a = matrix!([[-1.0, 0.0, 2.0]]);
    let relu = UnaryFunction::new(UnaryFunctionType::relu()).unwrap();
    assert_eq!(a.apply_function(&relu).unwrap().to_vec(), vec![0.0, 0.0, 2.0]);

    let mse = BinaryFunction::new(BinaryFunctionType::MeanSquaredError).unwrap();
    let target = matrix!([[0.0, 0.0, 0.0]]);
    let loss = a.apply_bi_function(&target, &mse).unwrap();
    assert_eq!(loss.shape(), (1, 3));
}

#[test]
fn test_exponential_moving_average() {
    let a = matrix!([[2.0, 4.0]]);
    let first = a.exponential_moving_average(None, 0.9).unwrap();
    assert_eq!(first, a);
    let zero = matrix!([[0.0, 0.0]]);
    let next = a.exponential_moving_average(Some(&zero), 0.5).unwrap();
    assert_abs_diff_eq!(next.value(0, 1), 2.0, epsilon = 1e-12);
}

#[test]
fn test_softmax_sums_to_one() {
    let logits = matrix!([[1000.0], [999.0], [-3.0], [0.5]]);
    let probabilities = logits.softmax().unwrap();
    assert_abs_diff_eq!(probabilities.sum(), 1.0, epsilon = 1e-9);
    assert!(probabilities.to_vec().iter().all(|p| p.is_finite()));

    let gumbel = logits.gumbel_softmax(0.5).unwrap();
    assert_abs_diff_eq!(gumbel.sum(), 1.0, epsilon = 1e-9);
    assert!(logits.gumbel_softmax(0.0).is_err());
    assert!(matrix!([[1.0, 2.0]]).softmax().is_err());
}
