//! # dml-test
//!
//! Harness for tests that run dml scripts against files. Each test gets a
//! sandbox with `in/`, `out/` and `expected/` directories. Inputs and expected
//! results are written there, the script reads the inputs and writes its
//! outputs, and [AutomatedTest::compare_results] checks outputs against
//! expected results cell by cell.
//!
//! Scripts are found at `<scripts_root>/<test_class_dir>/<test_script>.dml`
//! and get the variables `indir`, `outdir` and `expecteddir` in addition to
//! the ones added to their [TestConfiguration].
//!
#![forbid(unsafe_code)]
#![forbid(rustdoc::broken_intra_doc_links)]
#![forbid(rustdoc::private_intra_doc_links)]
#![forbid(missing_docs)]
#![forbid(rustdoc::missing_crate_level_docs)]
#![forbid(rustdoc::private_doc_tests)]
#![forbid(rustdoc::invalid_codeblock_attributes)]
#![forbid(rustdoc::invalid_html_tags)]
#![forbid(rustdoc::invalid_rust_codeblocks)]
#![forbid(rustdoc::bare_urls)]
#![forbid(rustdoc::unescaped_backticks)]
#![forbid(rustdoc::redundant_explicit_links)]

use dml::{DmlError, ErrorKind, Outputs};
use dml_core::config::Config;
use dml_core::io::{self, Format};
use dml_core::runtime::random_data;
use dml_core::shape::Shape;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Directory with the scripts of this crate
pub const SCRIPTS_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/scripts");

/// Which script a test runs, with which variables and what it writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestConfiguration {
    test_class_dir: String,
    test_script: String,
    output_files: Vec<String>,
    variables: BTreeMap<String, String>,
}

impl TestConfiguration {
    /// New configuration for script `<test_class_dir>/<test_script>.dml`
    /// which writes `output_files` into its output directory.
    pub fn new(test_class_dir: &str, test_script: &str, output_files: &[&str]) -> Self {
        Self {
            test_class_dir: test_class_dir.into(),
            test_script: test_script.into(),
            output_files: output_files.iter().map(|f| (*f).to_string()).collect(),
            variables: BTreeMap::new(),
        }
    }

    /// Add script variable, referenced as `$name` in the script
    pub fn add_variable(&mut self, name: &str, value: impl ToString) {
        self.variables.insert(name.into(), value.to_string());
    }

    /// Script variables
    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    /// Files the script writes
    pub fn output_files(&self) -> &[String] {
        &self.output_files
    }
}

/// Sandboxed run of configured dml scripts
pub struct AutomatedTest {
    scripts_root: PathBuf,
    sandbox: TempDir,
    configurations: BTreeMap<String, TestConfiguration>,
    loaded: Option<(TestConfiguration, PathBuf)>,
}

impl AutomatedTest {
    /// Create harness with fresh sandbox, scripts are searched in `scripts_root`
    pub fn new(scripts_root: impl Into<PathBuf>) -> Result<Self, DmlError> {
        Ok(Self {
            scripts_root: scripts_root.into(),
            sandbox: tempfile::Builder::new().prefix("dml-test").tempdir()?,
            configurations: BTreeMap::new(),
            loaded: None,
        })
    }

    /// Register configuration under name
    pub fn add_test_configuration(&mut self, name: &str, config: TestConfiguration) {
        self.configurations.insert(name.into(), config);
    }

    /// Get copy of registered configuration
    pub fn get_test_configuration(&self, name: &str) -> Result<TestConfiguration, DmlError> {
        self.configurations
            .get(name)
            .cloned()
            .ok_or_else(|| DmlError::runtime_error(format!("No test configuration named {name}")))
    }

    /// Prepare sandbox directories for configuration and make it the one
    /// used by following calls. Adds `indir`, `outdir` and `expecteddir`
    /// variables.
    pub fn load_test_configuration(&mut self, config: TestConfiguration) -> Result<(), DmlError> {
        let mut config = config;
        let dir = self
            .sandbox
            .path()
            .join(&config.test_class_dir)
            .join(&config.test_script);
        for (var, sub) in [("indir", "in"), ("outdir", "out"), ("expecteddir", "expected")] {
            let path = dir.join(sub);
            std::fs::create_dir_all(&path)?;
            config.add_variable(var, path.display());
        }
        self.loaded = Some((config, dir));
        Ok(())
    }

    fn loaded(&self) -> Result<&(TestConfiguration, PathBuf), DmlError> {
        self.loaded
            .as_ref()
            .ok_or_else(|| DmlError::runtime_error("No test configuration is loaded"))
    }

    fn dir(&self, sub: &str) -> Result<PathBuf, DmlError> {
        Ok(self.loaded()?.1.join(sub))
    }

    /// Directory with script inputs
    pub fn input_dir(&self) -> Result<PathBuf, DmlError> {
        self.dir("in")
    }

    /// Directory the script writes to
    pub fn output_dir(&self) -> Result<PathBuf, DmlError> {
        self.dir("out")
    }

    /// Directory with expected results
    pub fn expected_dir(&self) -> Result<PathBuf, DmlError> {
        self.dir("expected")
    }

    /// Make sure directory for expected helper matrices exists
    pub fn create_helper_matrix(&self) -> Result<(), DmlError> {
        std::fs::create_dir_all(self.expected_dir()?)?;
        Ok(())
    }

    /// Random rows x cols matrix, see [random_data].
    /// Seed -1 uses system entropy, other seeds always give the same matrix.
    pub fn get_random_matrix(
        rows: usize,
        cols: usize,
        min: f64,
        max: f64,
        sparsity: f64,
        seed: i64,
    ) -> Result<Vec<Vec<f64>>, DmlError> {
        let data = random_data(&Shape::checked_matrix(rows, cols)?, min, max, sparsity, seed)?;
        Ok(if cols == 0 {
            vec![Vec::new(); rows]
        } else {
            data.chunks(cols).map(<[f64]>::to_vec).collect()
        })
    }

    /// Write matrix as script input
    pub fn write_input_matrix(&self, name: &str, matrix: &[Vec<f64>]) -> Result<(), DmlError> {
        write_rows(&self.input_dir()?.join(name), matrix)
    }

    /// Write matrix as expected result
    pub fn write_expected_matrix(&self, name: &str, matrix: &[Vec<f64>]) -> Result<(), DmlError> {
        write_rows(&self.expected_dir()?.join(name), matrix)
    }

    /// Write single value as expected result
    pub fn write_expected_helper_matrix(&self, name: &str, value: f64) -> Result<(), DmlError> {
        write_rows(&self.expected_dir()?.join(name), &[vec![value]])
    }

    /// Run script of loaded configuration. With `expected_error` the run must
    /// fail with an error of that kind, otherwise it must succeed.
    /// # Panics
    /// Panics when outcome of the run differs from the expected one.
    pub fn run_test(&self, expected_error: Option<ErrorKind>) -> Result<Option<Outputs>, DmlError> {
        let (config, _) = self.loaded()?;
        let script = self
            .scripts_root
            .join(&config.test_class_dir)
            .join(format!("{}.dml", config.test_script));
        let source = std::fs::read_to_string(&script)?;
        if dml_core::debug(dml_core::DEBUG_IO) {
            println!("Running {} with {:?}", script.display(), config.variables);
        }
        let res = dml::run_script_with_config(&source, &config.variables, &Config::default());
        match (res, expected_error) {
            (Ok(outputs), None) => Ok(Some(outputs)),
            (Err(e), Some(kind)) if e.kind() == kind => Ok(None),
            (Ok(_), Some(kind)) => panic!(
                "Script {} was expected to fail with {kind:?}, but it succeeded",
                script.display()
            ),
            (Err(e), expected) => panic!(
                "Script {} failed with {e}, expected {expected:?}",
                script.display()
            ),
        }
    }

    /// Compare every output file of loaded configuration with its expected
    /// file. Cells missing in one of the files count as zero.
    /// # Panics
    /// Panics when a cell differs by more than tolerance.
    pub fn compare_results(&self, tolerance: f64) -> Result<(), DmlError> {
        let (config, _) = self.loaded()?;
        let (out, expected) = (self.output_dir()?, self.expected_dir()?);
        for file in &config.output_files {
            let actual_cells = io::read_cells(out.join(file))?;
            let expected_cells = io::read_cells(expected.join(file))?;
            let keys: BTreeSet<&(usize, usize)> =
                actual_cells.keys().chain(expected_cells.keys()).collect();
            for key in keys {
                let a = actual_cells.get(key).copied().unwrap_or(0.0);
                let e = expected_cells.get(key).copied().unwrap_or(0.0);
                assert!(
                    (e - a).abs() <= tolerance,
                    "{file} cell {key:?}: expected {e:e}, actual {a:e}, difference {:e} exceeds {tolerance:e}",
                    (e - a).abs()
                );
            }
        }
        Ok(())
    }
}

fn write_rows(path: &Path, rows: &[Vec<f64>]) -> Result<(), DmlError> {
    let cols = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|r| r.len() != cols) {
        return Err(DmlError::shape_error(format!(
            "Rows of matrix written to {} have different lengths",
            path.display()
        )));
    }
    let data: Vec<f64> = rows.iter().flatten().copied().collect();
    io::write_matrix(path, &data, &Shape::matrix(rows.len(), cols), Format::Text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_matrix_is_deterministic_for_seed() -> Result<(), DmlError> {
        let a = AutomatedTest::get_random_matrix(10, 10, -10.0, 10.0, 0.4, 7)?;
        let b = AutomatedTest::get_random_matrix(10, 10, -10.0, 10.0, 0.4, 7)?;
        assert_eq!(a, b);
        assert_eq!(a.len(), 10);
        assert!(a.iter().all(|row| row.len() == 10));
        let c = AutomatedTest::get_random_matrix(10, 10, -10.0, 10.0, 0.4, 8)?;
        assert_ne!(a, c);
        Ok(())
    }

    #[test]
    fn configuration_is_loaded_into_sandbox() -> Result<(), DmlError> {
        let mut t = AutomatedTest::new(SCRIPTS_DIR)?;
        let mut config = TestConfiguration::new("functions/aggregate", "SumTest", &["x"]);
        config.add_variable("rows", 3);
        t.add_test_configuration("SumTest", config);
        assert!(t.get_test_configuration("Missing").is_err());
        assert!(t.input_dir().is_err());
        t.load_test_configuration(t.get_test_configuration("SumTest")?)?;
        let (config, _) = t.loaded()?;
        assert_eq!(config.variables()["rows"], "3");
        assert_eq!(PathBuf::from(&config.variables()["indir"]), t.input_dir()?);
        assert!(t.input_dir()?.is_dir());
        assert!(t.output_dir()?.is_dir());
        t.create_helper_matrix()?;
        assert!(t.expected_dir()?.is_dir());
        Ok(())
    }

    #[test]
    fn compare_treats_missing_cells_as_zero() -> Result<(), DmlError> {
        let mut t = AutomatedTest::new(SCRIPTS_DIR)?;
        t.load_test_configuration(TestConfiguration::new("none", "none", &["z", "m"]))?;
        t.write_expected_helper_matrix("z", 0.0)?;
        io::write_scalar(t.output_dir()?.join("z"), &dml_core::scalar::Scalar::Double(0.0))?;
        let m = vec![vec![1.0, 0.0], vec![0.0, 2.5]];
        t.write_expected_matrix("m", &m)?;
        write_rows(&t.output_dir()?.join("m"), &m)?;
        t.compare_results(0.0)
    }

    #[test]
    #[should_panic(expected = "exceeds")]
    fn compare_detects_differences() {
        let run = || -> Result<(), DmlError> {
            let mut t = AutomatedTest::new(SCRIPTS_DIR)?;
            t.load_test_configuration(TestConfiguration::new("none", "none", &["v"]))?;
            t.write_expected_helper_matrix("v", 1.0)?;
            write_rows(&t.output_dir()?.join("v"), &[vec![1.0 + 1e-9]])?;
            t.compare_results(1e-12)
        };
        if let Err(e) = run() {
            panic!("Comparison setup failed: {e}");
        }
    }
}
