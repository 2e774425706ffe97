use briny_matrix::backend::{Backend, set_backend};
use briny_matrix::*;

fn counting(rows: usize, columns: usize) -> Matrix {
    Matrix::with_initializer(rows, columns, |row, column| (row * columns + column + 1) as f64)
}

fn flipped(filter: &Matrix) -> Matrix {
    let (rows, columns) = filter.shape();
    Matrix::with_initializer(rows, columns, |row, column| {
        filter.value(rows - 1 - row, columns - 1 - column)
    })
}

#[test]
fn test_crosscorrelate_is_convolve_with_flipped_filter() {
    let input = counting(5, 4);
    let filter = matrix!([[1.0, -2.0], [0.5, 3.0], [-1.0, 0.0]]);
    let correlated = input.crosscorrelate(&filter).unwrap();
    let convolved = input.convolve(&flipped(&filter)).unwrap();
    assert_eq!(correlated.shape(), (3, 3));
    assert_eq!(correlated, convolved);
}

#[test]
fn test_convolution_output_shape_and_values() {
    let input = counting(4, 4);
    let ones: Matrix = Matrix::with_initializer(3, 3, |_, _| 1.0);
    let out = input.convolve(&ones).unwrap();
    assert_eq!(out.shape(), (2, 2));
    assert_eq!(out.to_vec(), vec![54.0, 63.0, 90.0, 99.0]);
}

#[test]
fn test_filter_gradient_sums_receptive_fields() {
    let input = counting(4, 4);
    let gradient: Matrix = Matrix::with_initializer(2, 2, |_, _| 1.0);
    let filter_gradient = gradient.crosscorrelation_filter_gradient(&input).unwrap();
    assert_eq!(filter_gradient.shape(), (3, 3));
    assert_eq!(filter_gradient.value(0, 0), 14.0);
    assert_eq!(filter_gradient.value(2, 2), 54.0);
    let total: f64 = filter_gradient.to_vec().iter().sum();
    assert_eq!(total, 54.0 + 63.0 + 90.0 + 99.0);
}

#[test]
fn test_input_gradient_has_input_shape() {
    let gradient: Matrix = Matrix::with_initializer(2, 2, |_, _| 1.0);
    let filter: Matrix = Matrix::with_initializer(3, 3, |_, _| 1.0);
    let input_gradient = gradient.convolution_input_gradient(&filter).unwrap();
    assert_eq!(input_gradient.shape(), (4, 4));
    assert_eq!(input_gradient.value(0, 0), 1.0);
    assert_eq!(input_gradient.value(1, 1), 4.0);
}

#[test]
fn test_max_pool_routes_gradient_to_winner() {
    let mut input = matrix!([[1.0, 5.0], [3.0, 2.0]]);
    input.set_filter_size(2, 2).unwrap();
    let (output, positions) = input.max_pool().unwrap();
    assert_eq!(output.to_vec(), vec![5.0]);
    assert_eq!(positions.get(0, 0), Some(GradientPosition { row: 0, column: 1 }));
    assert_eq!(positions.input_shape(), (2, 2));

    let gradient = matrix!([[7.0]]);
    let input_gradient = gradient.max_pool_gradient(&positions).unwrap();
    assert_eq!(input_gradient.to_vec(), vec![0.0, 7.0, 0.0, 0.0]);
}

#[test]
fn test_cyclic_pool_walks_window_positions() {
    let mut input = counting(3, 3);
    input.set_filter_size(2, 2).unwrap();
    let (output, positions) = input.cyclic_pool().unwrap();
    assert_eq!(output.to_vec(), vec![1.0, 5.0, 5.0, 9.0]);

    let ones: Matrix = Matrix::with_initializer(2, 2, |_, _| 1.0);
    let input_gradient = ones.positional_pool_gradient(&positions).unwrap();
    assert_eq!(input_gradient.to_vec(), vec![1.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 1.0]);
}

#[test]
fn test_cyclic_pool_skips_masked_cells() {
    let mut input = counting(3, 3);
    input.set_filter_size(2, 2).unwrap();
    let mut mask: Mask = Mask::new(3, 3);
    mask.set_mask(1, 1, true);
    input.set_mask(mask).unwrap();
    let (output, positions) = input.cyclic_pool().unwrap();
    assert_eq!(output.to_vec(), vec![1.0, 3.0, 8.0, 8.0]);
    assert_eq!(positions.get(0, 1), Some(GradientPosition { row: 0, column: 2 }));
}

#[test]
fn test_random_pool_draws_from_its_window() {
    let mut input = counting(4, 4);
    input.set_filter_size(2, 2).unwrap();
    let (output, positions) = input.random_pool().unwrap();
    assert_eq!(output.shape(), (3, 3));
    for row in 0..3 {
        for column in 0..3 {
            let position = positions.get(row, column).unwrap();
            assert!((row..row + 2).contains(&position.row));
            assert!((column..column + 2).contains(&position.column));
            assert_eq!(output.value(row, column), input.value(position.row, position.column));
        }
    }

    let ones: Matrix = Matrix::with_initializer(3, 3, |_, _| 1.0);
    assert_eq!(ones.positional_pool_gradient(&positions).unwrap().sum(), 9.0);
}

#[test]
fn test_pool_with_stride() {
    let mut input = counting(4, 4);
    input.set_sliding_window(WindowParameters::default().with_filter(2, 2)).unwrap();
    input.set_stride(2).unwrap();
    let (output, _) = input.max_pool().unwrap();
    assert_eq!(output.shape(), (3, 3));
    assert_eq!(output.to_vec(), vec![6.0, 0.0, 8.0, 0.0, 0.0, 0.0, 14.0, 0.0, 16.0]);
    let average = input.average_pool().unwrap();
    assert_eq!(average.to_vec(), vec![3.5, 0.0, 5.5, 0.0, 0.0, 0.0, 11.5, 0.0, 13.5]);
}

#[test]
fn test_average_pool_gradient_spreads_evenly() {
    let mut gradient = matrix!([[4.0]]);
    gradient.set_filter_size(2, 2).unwrap();
    let input_gradient = gradient.average_pool_gradient();
    assert_eq!(input_gradient.to_vec(), vec![1.0, 1.0, 1.0, 1.0]);
}

#[test]
fn test_parallel_backend_matches_sequential() {
    let a: Matrix = Matrix::with_initializer(17, 9, |row, column| ((row * 7 + column * 3) % 11) as f64 / 3.0);
    let b: Matrix = Matrix::with_initializer(9, 13, |row, column| ((row + 2 * column) % 5) as f64 - 1.5);
    let filter = matrix!([[0.25, -1.0, 0.5], [2.0, 0.0, -0.75]]);

    set_backend(Backend::Sequential);
    let dot_sequential = a.dot(&b).unwrap();
    let conv_sequential = a.convolve(&filter).unwrap();

    set_backend(Backend::Parallel);
    let dot_parallel = a.dot(&b).unwrap();
    let conv_parallel = a.convolve(&filter).unwrap();
    set_backend(Backend::Sequential);

    assert_eq!(dot_sequential.to_vec(), dot_parallel.to_vec());
    assert_eq!(conv_sequential.to_vec(), conv_parallel.to_vec());
}
