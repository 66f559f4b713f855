use dml::{DmlError, ErrorKind};
use dml_test::{AutomatedTest, TestConfiguration, SCRIPTS_DIR};

const TEST_DIR: &str = "functions/aggregate";
const TEST_GENERAL: &str = "SumTest";
const TEST_SCALAR: &str = "SumScalarTest";
const TEST_ROW_SUMS: &str = "RowSumsTest";
const TEST_COL_SUMS: &str = "ColSumsTest";
const TEST_EMPTY: &str = "SumEmptyTest";

const ROWS: usize = 10;
const COLS: usize = 10;
const EPS: f64 = 5e-14;

fn setup() -> Result<AutomatedTest, DmlError> {
    let mut t = AutomatedTest::new(SCRIPTS_DIR)?;
    t.add_test_configuration(
        TEST_GENERAL,
        TestConfiguration::new(TEST_DIR, TEST_GENERAL, &["vector_sum", "matrix_sum"]),
    );
    t.add_test_configuration(
        TEST_SCALAR,
        TestConfiguration::new(TEST_DIR, TEST_SCALAR, &["scalar_sum"]),
    );
    t.add_test_configuration(
        TEST_ROW_SUMS,
        TestConfiguration::new(TEST_DIR, TEST_ROW_SUMS, &["row_sums"]),
    );
    t.add_test_configuration(
        TEST_COL_SUMS,
        TestConfiguration::new(TEST_DIR, TEST_COL_SUMS, &["col_sums"]),
    );
    t.add_test_configuration(
        TEST_EMPTY,
        TestConfiguration::new(TEST_DIR, TEST_EMPTY, &["empty_sum"]),
    );
    Ok(t)
}

/// Sum in row major order without compensation
fn naive_sum(m: &[Vec<f64>]) -> f64 {
    let mut sum = 0.0;
    for row in m {
        for x in row {
            sum += x;
        }
    }
    sum
}

#[test]
fn test_general() -> Result<(), DmlError> {
    let mut t = setup()?;
    let mut config = t.get_test_configuration(TEST_GENERAL)?;
    config.add_variable("rows", ROWS);
    config.add_variable("cols", COLS);
    t.load_test_configuration(config)?;
    t.create_helper_matrix()?;

    let vector = AutomatedTest::get_random_matrix(ROWS, 1, 0.0, 1.0, 1.0, -1)?;
    t.write_input_matrix("vector", &vector)?;
    t.write_expected_helper_matrix("vector_sum", naive_sum(&vector))?;

    let matrix = AutomatedTest::get_random_matrix(ROWS, COLS, -10.0, 10.0, 0.4, 7)?;
    t.write_input_matrix("matrix", &matrix)?;
    t.write_expected_helper_matrix("matrix_sum", naive_sum(&matrix))?;

    t.run_test(None)?;
    t.compare_results(EPS)
}

#[test]
fn test_scalar() -> Result<(), DmlError> {
    let mut t = setup()?;
    let mut config = t.get_test_configuration(TEST_SCALAR)?;
    config.add_variable("scalar", 3);
    t.load_test_configuration(config)?;
    t.create_helper_matrix()?;

    let outputs = t.run_test(Some(ErrorKind::Language))?;
    assert!(outputs.is_none());
    // Validation fails before anything is written
    assert!(!t.output_dir()?.join("scalar_sum").exists());
    Ok(())
}

#[test]
fn test_row_sums() -> Result<(), DmlError> {
    let mut t = setup()?;
    let mut config = t.get_test_configuration(TEST_ROW_SUMS)?;
    config.add_variable("rows", ROWS);
    config.add_variable("cols", COLS);
    t.load_test_configuration(config)?;
    t.create_helper_matrix()?;

    let matrix = AutomatedTest::get_random_matrix(ROWS, COLS, -10.0, 10.0, 0.4, 7)?;
    t.write_input_matrix("matrix", &matrix)?;
    let expected: Vec<Vec<f64>> = matrix.iter().map(|row| vec![row.iter().sum::<f64>()]).collect();
    t.write_expected_matrix("row_sums", &expected)?;

    t.run_test(None)?;
    t.compare_results(EPS)
}

#[test]
fn test_col_sums() -> Result<(), DmlError> {
    let mut t = setup()?;
    let mut config = t.get_test_configuration(TEST_COL_SUMS)?;
    config.add_variable("rows", ROWS);
    config.add_variable("cols", 7);
    t.load_test_configuration(config)?;
    t.create_helper_matrix()?;

    let matrix = AutomatedTest::get_random_matrix(ROWS, 7, -10.0, 10.0, 0.7, 11)?;
    t.write_input_matrix("matrix", &matrix)?;
    let expected: Vec<Vec<f64>> =
        vec![(0..7).map(|j| matrix.iter().map(|row| row[j]).sum::<f64>()).collect()];
    t.write_expected_matrix("col_sums", &expected)?;

    t.run_test(None)?;
    t.compare_results(EPS)
}

#[test]
fn test_empty() -> Result<(), DmlError> {
    let mut t = setup()?;
    let mut config = t.get_test_configuration(TEST_EMPTY)?;
    config.add_variable("rows", 0);
    config.add_variable("cols", 3);
    t.load_test_configuration(config)?;
    t.create_helper_matrix()?;
    t.write_expected_helper_matrix("empty_sum", 0.0)?;

    let outputs = t.run_test(None)?;
    assert_eq!(outputs.map(|o| o.written.len()), Some(1));
    t.compare_results(0.0)
}
