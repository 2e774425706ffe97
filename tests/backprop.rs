use std::cell::RefCell;
use std::rc::Rc;

use approx::assert_abs_diff_eq;
use briny_matrix::backprop;
use briny_matrix::*;

#[test]
fn test_dot_backprop() {
    let a = matrix!([[1.0, 2.0], [3.0, 4.0]]);
    let b = matrix!([[5.0], [6.0]]);
    let (out, back) = backprop::dot(&a, &b).unwrap();
    assert_eq!(out.to_vec(), vec![17.0, 39.0]);

    let (grad_a, grad_b) = back(&matrix!([[1.0], [2.0]])).unwrap();
    assert_eq!(grad_a.to_vec(), vec![5.0, 6.0, 10.0, 12.0]);
    assert_eq!(grad_b.to_vec(), vec![7.0, 10.0]);
}

#[test]
fn test_crosscorrelate_backprop() {
    let input: Matrix = Matrix::with_initializer(4, 4, |row, column| (row * 4 + column + 1) as f64);
    let filter: Matrix = Matrix::with_initializer(3, 3, |_, _| 1.0);
    let (out, back) = backprop::crosscorrelate(&input, &filter).unwrap();
    assert_eq!(out.shape(), (2, 2));

    let ones: Matrix = Matrix::with_initializer(2, 2, |_, _| 1.0);
    let (grad_input, grad_filter) = back(&ones).unwrap();
    assert_eq!(grad_input.shape(), (4, 4));
    assert_eq!(grad_filter.value(0, 0), 14.0);
}

#[test]
fn test_max_pool_backprop() {
    let mut input = matrix!([[1.0, 5.0], [3.0, 2.0]]);
    input.set_filter_size(2, 2).unwrap();
    let (out, back) = backprop::max_pool(&input).unwrap();
    assert_eq!(out.value(0, 0), 5.0);
    assert_eq!(back(&matrix!([[7.0]])).unwrap().to_vec(), vec![0.0, 7.0, 0.0, 0.0]);
}

#[test]
fn test_cyclic_and_random_pool_backprop() {
    let mut input = matrix!([[1.0, 2.0], [3.0, 4.0]]);
    input.set_filter_size(2, 2).unwrap();
    let (out, back) = backprop::cyclic_pool(&input).unwrap();
    assert_eq!(out.value(0, 0), 1.0);
    assert_eq!(back(&matrix!([[3.0]])).unwrap().to_vec(), vec![3.0, 0.0, 0.0, 0.0]);

    let (out, back) = backprop::random_pool(&input).unwrap();
    let gradient = back(&matrix!([[3.0]])).unwrap();
    assert_eq!(gradient.sum(), 3.0);
    let routed = gradient.argmax().unwrap();
    assert_eq!(input.value(routed.0, routed.1), out.value(0, 0));
}

#[test]
fn test_average_pool_backprop_uses_input_window() {
    let mut input = matrix!([[1.0, 2.0], [3.0, 4.0]]);
    input.set_filter_size(2, 2).unwrap();
    let (out, back) = backprop::average_pool(&input).unwrap();
    assert_eq!(out.value(0, 0), 2.5);
    assert_eq!(back(&matrix!([[2.0]])).unwrap().to_vec(), vec![0.5, 0.5, 0.5, 0.5]);
}

#[test]
fn test_softmax_backprop_sums_to_one() {
    let input = matrix!([[1.0], [2.0], [3.0]]);
    let (out, back) = backprop::softmax(&input).unwrap();
    assert_abs_diff_eq!(out.sum(), 1.0, epsilon = 1e-9);
    let gradient = back(&matrix!([[1.0], [0.0], [0.0]])).unwrap();
    assert_eq!(gradient.shape(), (3, 1));
}

#[test]
fn test_unary_backprop_matches_derivative() {
    let sigmoid = UnaryFunction::new(UnaryFunctionType::Sigmoid).unwrap();
    let input = matrix!([[0.0, 2.0]]);
    let (out, back) = backprop::unary(&sigmoid, &input).unwrap();
    assert_abs_diff_eq!(out.value(0, 0), 0.5, epsilon = 1e-12);
    let gradient = back(&matrix!([[1.0, 1.0]])).unwrap();
    assert_abs_diff_eq!(gradient.value(0, 0), 0.25, epsilon = 1e-12);
    assert_abs_diff_eq!(gradient.value(0, 1), sigmoid.derivative(2.0), epsilon = 1e-12);
}

#[test]
fn test_binary_backprop_for_squared_error() {
    let mse = BinaryFunction::new(BinaryFunctionType::MeanSquaredError).unwrap();
    let prediction = matrix!([[1.0, 3.0]]);
    let target = matrix!([[0.0, 1.0]]);
    let (loss, back) = backprop::binary(&mse, &prediction, &target).unwrap();
    assert_eq!(loss.to_vec(), vec![0.5, 2.0]);
    assert_eq!(back(&matrix!([[1.0, 1.0]])).unwrap().to_vec(), vec![1.0, 2.0]);
}

#[derive(Default)]
struct Counter(RefCell<usize>);

impl ProcedureFactory for Counter {
    fn create_expression(&self, _: &Expression<'_>) {
        *self.0.borrow_mut() += 1;
    }
}

#[test]
fn test_backward_pass_does_not_record() {
    let counter = Rc::new(Counter::default());
    let mut a = matrix!([[1.0, 2.0]]);
    let shared: SharedProcedureFactory = counter.clone();
    a.set_procedure_factory(shared);
    let b = matrix!([[3.0], [4.0]]);

    let (_, back) = backprop::dot(&a, &b).unwrap();
    assert_eq!(*counter.0.borrow(), 1);
    let _ = back(&matrix!([[1.0]])).unwrap();
    assert_eq!(*counter.0.borrow(), 1);
}
