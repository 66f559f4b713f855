use dml_cpu::{device_with_config, Backend, Config, DmlError, Shape};
use rand::{rngs::SmallRng, Rng, SeedableRng};

fn naive_sum(data: &[f64]) -> f64 {
    data.iter().sum()
}

#[test]
fn sum_matches_naive_sum() -> Result<(), DmlError> {
    let dev = device_with_config(&Config::default())?;
    let mut rng = SmallRng::seed_from_u64(42);
    for (rows, cols) in [(10, 1), (10, 10), (1, 1000), (37, 53)] {
        let data: Vec<f64> = (0..rows * cols).map(|_| rng.gen_range(-10.0..10.0)).collect();
        let x = dev.store(data.clone(), Shape::matrix(rows, cols))?;
        assert!((x.sum()? - naive_sum(&data)).abs() < 1e-10);
    }
    Ok(())
}

#[test]
fn row_and_col_sums() -> Result<(), DmlError> {
    let dev = device_with_config(&Config { threads: 2, ..Config::default() })?;
    let x = dev.store(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], Shape::matrix(2, 3))?;
    let r = x.row_sums()?;
    assert_eq!(r.shape(), Shape::matrix(2, 1));
    assert_eq!(r.to_vec()?, vec![6.0, 15.0]);
    let c = x.col_sums()?;
    assert_eq!(c.shape(), Shape::matrix(1, 3));
    assert_eq!(c.to_vec()?, vec![5.0, 7.0, 9.0]);
    assert_eq!(r.sum()?, c.sum()?);
    Ok(())
}

#[test]
fn max_min_mean() -> Result<(), DmlError> {
    let dev = device_with_config(&Config::default())?;
    let x = dev.store(vec![-3.0, 7.5, 0.0, 2.5], Shape::matrix(2, 2))?;
    assert_eq!(x.max()?, 7.5);
    assert_eq!(x.min()?, -3.0);
    assert_eq!(x.mean()?, 1.75);
    Ok(())
}

#[test]
fn empty_matrix_aggregates() -> Result<(), DmlError> {
    let dev = device_with_config(&Config::default())?;
    let x = dev.store(Vec::new(), Shape::matrix(0, 3))?;
    assert_eq!(x.sum()?, 0.0);
    assert_eq!(x.max()?, f64::NEG_INFINITY);
    assert_eq!(x.col_sums()?.to_vec()?, vec![0.0; 3]);
    assert!(x.mean()?.is_nan());
    Ok(())
}

#[test]
fn lazy_graph_is_evaluated_on_load() -> Result<(), DmlError> {
    let dev = device_with_config(&Config::default())?;
    let x = dev.store(vec![1.0, 4.0, 9.0, 16.0], Shape::matrix(2, 2))?;
    let y = x.sqrt()?.mul_scalar(2.0, false)?.add(&x)?;
    assert_eq!(y.to_vec()?, vec![3.0, 8.0, 15.0, 24.0]);
    let z = x.sub_scalar(1.0, true)?.neg()?;
    assert_eq!(z.to_vec()?, vec![0.0, 3.0, 8.0, 15.0]);
    assert_eq!(y.sum()?, 50.0);
    let graph = dev.plot_graph([&y]);
    assert!(graph.starts_with("strict digraph"));
    Ok(())
}

#[test]
fn scalar_broadcast_and_shape_errors() -> Result<(), DmlError> {
    let dev = device_with_config(&Config::default())?;
    let x = dev.store(vec![1.0, 2.0], Shape::matrix(2, 1))?;
    let one = dev.full(10.0, Shape::matrix(1, 1))?;
    assert_eq!(one.add(&x)?.to_vec()?, vec![11.0, 12.0]);
    let y = dev.store(vec![1.0, 2.0, 3.0], Shape::matrix(1, 3))?;
    assert!(matches!(x.add(&y), Err(DmlError::ShapeError(_))));
    assert!(matches!(y.as_scalar(), Err(DmlError::ShapeError(_))));
    assert_eq!(one.as_scalar()?, 10.0);
    Ok(())
}

#[test]
fn rand_respects_range_sparsity_and_seed() -> Result<(), DmlError> {
    let dev = device_with_config(&Config::default())?;
    let a = dev.rand(Shape::matrix(10, 10), -10.0, 10.0, 0.4, 7)?.to_vec()?;
    let b = dev.rand(Shape::matrix(10, 10), -10.0, 10.0, 0.4, 7)?.to_vec()?;
    assert_eq!(a, b);
    assert!(a.iter().all(|x| (-10.0..=10.0).contains(x)));
    let nnz = a.iter().filter(|x| **x != 0.0).count();
    assert!(nnz > 10 && nnz < 80);
    let dense = dev.rand(Shape::matrix(10, 1), 0.0, 1.0, 1.0, -1)?.to_vec()?;
    assert_eq!(dense.len(), 10);
    assert!(dense.iter().all(|x| (0.0..=1.0).contains(x)));
    assert!(dev.rand(Shape::matrix(2, 2), 1.0, 0.0, 1.0, 1).is_err());
    Ok(())
}
