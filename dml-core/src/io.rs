use crate::dtype::{DataType, ValueType};
use crate::error::DmlError;
use crate::scalar::Scalar;
use crate::shape::Shape;
use nanoserde::{DeJson, SerJson};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt::Write as FmtWrite;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Format of matrix files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// One `i j v` triple per line for each non zero value, indices start at one
    Text,
    /// One comma separated row per line, no header
    Csv,
}

impl Format {
    /// Parse format name as used in scripts
    #[track_caller]
    pub fn parse(name: &str) -> Result<Self, DmlError> {
        match name {
            "text" => Ok(Format::Text),
            "csv" => Ok(Format::Csv),
            _ => Err(DmlError::parse_error(format!("Unknown matrix format {name:?}"))),
        }
    }

    /// Name of format as used in scripts and metadata
    pub fn name(self) -> &'static str {
        match self {
            Format::Text => "text",
            Format::Csv => "csv",
        }
    }
}

/// Metadata written next to every matrix and scalar file as `<file>.mtd`
#[derive(Debug, Clone, PartialEq, SerJson, DeJson)]
pub struct MetaData {
    /// `matrix` or `scalar`
    pub data_type: String,
    /// Value type, `double` for matrices
    pub value_type: String,
    /// Number of rows
    pub rows: Option<usize>,
    /// Number of columns
    pub cols: Option<usize>,
    /// Number of non zero values
    pub nnz: Option<usize>,
    /// File format
    pub format: String,
}

/// Path of metadata file belonging to path
pub fn mtd_path(path: impl AsRef<Path>) -> PathBuf {
    let mut p: OsString = path.as_ref().as_os_str().to_owned();
    p.push(".mtd");
    PathBuf::from(p)
}

/// Read metadata of file at path, if there is any
pub fn read_metadata(path: impl AsRef<Path>) -> Result<Option<MetaData>, DmlError> {
    let mtd = mtd_path(path);
    if !mtd.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&mtd)?;
    MetaData::deserialize_json(&text)
        .map(Some)
        .map_err(|e| DmlError::parse_error(format!("Could not parse {}: {e}", mtd.display())))
}

fn write_metadata(path: &Path, mtd: &MetaData) -> Result<(), DmlError> {
    std::fs::write(mtd_path(path), mtd.serialize_json())?;
    Ok(())
}

fn create_parent(path: &Path) -> Result<(), DmlError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Write row major matrix data into path with metadata sidecar.
/// Values are written in shortest round trip form, so reading them back is exact.
/// # Errors
/// Returns io error if there was problem writing file to filesystem.
pub fn write_matrix(
    path: impl AsRef<Path>,
    data: &[f64],
    shape: &Shape,
    format: Format,
) -> Result<(), DmlError> {
    let path = path.as_ref();
    if data.len() != shape.numel() {
        return Err(DmlError::shape_error(format!(
            "Cannot write {} values as matrix with shape {shape}",
            data.len()
        )));
    }
    create_parent(path)?;
    let cols = shape.cols();
    let rows = data.chunks(cols.max(1));
    let nnz = data.iter().filter(|v| **v != 0.0).count();
    let file = BufWriter::new(File::create(path)?);
    match format {
        Format::Text => {
            let mut f = file;
            let mut line = String::new();
            for (i, row) in rows.enumerate() {
                line.clear();
                for (j, v) in row.iter().enumerate().filter(|(_, v)| **v != 0.0) {
                    let _ = writeln!(line, "{} {} {v}", i + 1, j + 1);
                }
                f.write_all(line.as_bytes())?;
            }
            f.flush()?;
        }
        Format::Csv => {
            let mut w = csv::WriterBuilder::new().has_headers(false).from_writer(file);
            for row in rows {
                w.write_record(row.iter().map(ToString::to_string))
                    .map_err(|e| csv_error(&e, path))?;
            }
            w.flush()?;
        }
    }
    write_metadata(
        path,
        &MetaData {
            data_type: DataType::Matrix.mtd_name().into(),
            value_type: ValueType::Double.mtd_name().into(),
            rows: Some(shape.rows()),
            cols: Some(cols),
            nnz: Some(nnz),
            format: format.name().into(),
        },
    )?;
    if crate::debug(crate::DEBUG_IO) {
        println!("Wrote {shape} matrix with {nnz} non zeros to {}", path.display());
    }
    Ok(())
}

/// Write scalar into path with metadata sidecar
pub fn write_scalar(path: impl AsRef<Path>, value: &Scalar) -> Result<(), DmlError> {
    let path = path.as_ref();
    create_parent(path)?;
    std::fs::write(path, format!("{value}\n"))?;
    write_metadata(
        path,
        &MetaData {
            data_type: DataType::Scalar.mtd_name().into(),
            value_type: value.value_type().mtd_name().into(),
            rows: None,
            cols: None,
            nnz: None,
            format: Format::Text.name().into(),
        },
    )?;
    if crate::debug(crate::DEBUG_IO) {
        println!("Wrote scalar {value} to {}", path.display());
    }
    Ok(())
}

#[track_caller]
fn parse_f64(text: &str, path: &Path, line: usize) -> Result<f64, DmlError> {
    text.trim().parse().map_err(|_| {
        DmlError::parse_error(format!(
            "Could not parse value {text:?} at {}:{line}",
            path.display()
        ))
    })
}

#[track_caller]
fn parse_index(text: &str, path: &Path, line: usize) -> Result<usize, DmlError> {
    match text.parse::<usize>() {
        Ok(i) if i > 0 => Ok(i),
        _ => Err(DmlError::parse_error(format!(
            "Could not parse index {text:?} at {}:{line}, indices start at 1",
            path.display()
        ))),
    }
}

fn read_ijv(path: &Path) -> Result<Vec<(usize, usize, f64)>, DmlError> {
    let f = BufReader::new(File::open(path)?);
    let mut cells = Vec::new();
    for (n, line) in f.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        let [i, j, v] = parts.as_slice() else {
            return Err(DmlError::parse_error(format!(
                "Expected `i j v` triple at {}:{}, found {line:?}",
                path.display(),
                n + 1
            )));
        };
        cells.push((
            parse_index(i, path, n + 1)?,
            parse_index(j, path, n + 1)?,
            parse_f64(v, path, n + 1)?,
        ));
    }
    Ok(cells)
}

fn csv_error(e: &csv::Error, path: &Path) -> DmlError {
    DmlError::parse_error(format!("Invalid csv in {}: {e}", path.display()))
}

fn read_csv(path: &Path) -> Result<Vec<Vec<f64>>, DmlError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(File::open(path)?);
    let mut rows = Vec::new();
    for (n, record) in reader.records().enumerate() {
        let record = record.map_err(|e| csv_error(&e, path))?;
        let row = record
            .iter()
            .map(|v| parse_f64(v, path, n + 1))
            .collect::<Result<Vec<f64>, DmlError>>()?;
        rows.push(row);
    }
    Ok(rows)
}

fn resolve_dim(
    name: &str,
    given: Option<usize>,
    mtd: Option<usize>,
    path: &Path,
) -> Result<Option<usize>, DmlError> {
    match (given, mtd) {
        (Some(g), Some(m)) if g != m => Err(DmlError::shape_error(format!(
            "Read of {} with {name}={g}, but metadata says {name}={m}",
            path.display()
        ))),
        (Some(g), _) => Ok(Some(g)),
        (None, m) => Ok(m),
    }
}

/// Read matrix from path. Dimensions come from the arguments, the metadata
/// sidecar or, when both are missing, from the data itself.
/// # Errors
/// Returns io error or parse error if the file is missing or malformed,
/// shape error if given dimensions contradict the file.
pub fn read_matrix(
    path: impl AsRef<Path>,
    format: Option<Format>,
    rows: Option<usize>,
    cols: Option<usize>,
) -> Result<(Shape, Vec<f64>), DmlError> {
    let path = path.as_ref();
    let mtd = read_metadata(path)?;
    if let Some(mtd) = &mtd {
        if DataType::from_mtd_name(&mtd.data_type) != Some(DataType::Matrix) {
            return Err(DmlError::runtime_error(format!(
                "{} does not hold a matrix but {}",
                path.display(),
                mtd.data_type
            )));
        }
    }
    let format = match (format, &mtd) {
        (Some(f), _) => f,
        (None, Some(mtd)) => Format::parse(&mtd.format)?,
        (None, None) => Format::Text,
    };
    let rows = resolve_dim("rows", rows, mtd.as_ref().and_then(|m| m.rows), path)?;
    let cols = resolve_dim("cols", cols, mtd.as_ref().and_then(|m| m.cols), path)?;
    let (shape, data) = match format {
        Format::Text => {
            let cells = read_ijv(path)?;
            let rows = rows.unwrap_or_else(|| cells.iter().map(|c| c.0).max().unwrap_or(0));
            let cols = cols.unwrap_or_else(|| cells.iter().map(|c| c.1).max().unwrap_or(0));
            let shape = Shape::checked_matrix(rows, cols)?;
            let mut data = vec![0.0; shape.numel()];
            for (i, j, v) in cells {
                if i > rows || j > cols {
                    return Err(DmlError::parse_error(format!(
                        "Cell ({i}, {j}) is out of bounds of {rows}x{cols} matrix in {}",
                        path.display()
                    )));
                }
                data[(i - 1) * cols + (j - 1)] = v;
            }
            (shape, data)
        }
        Format::Csv => {
            let values = read_csv(path)?;
            let r = values.len();
            let c = values.first().map_or(0, Vec::len);
            if values.iter().any(|row| row.len() != c) {
                return Err(DmlError::parse_error(format!(
                    "Rows of {} have different lengths",
                    path.display()
                )));
            }
            if rows.is_some_and(|rows| rows != r) || cols.is_some_and(|cols| cols != c) {
                return Err(DmlError::shape_error(format!(
                    "{} holds {r}x{c} matrix, expected {}x{}",
                    path.display(),
                    rows.unwrap_or(r),
                    cols.unwrap_or(c)
                )));
            }
            (Shape::matrix(r, c), values.into_iter().flatten().collect())
        }
    };
    if crate::debug(crate::DEBUG_IO) {
        println!("Read {shape} matrix from {}", path.display());
    }
    Ok((shape, data))
}

/// Read cells of a result file for comparison.
/// The file holds either `i j v` triples or a single scalar value,
/// which is returned as cell (1, 1).
pub fn read_cells(path: impl AsRef<Path>) -> Result<BTreeMap<(usize, usize), f64>, DmlError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    if let [line] = lines.as_slice() {
        if line.split_whitespace().count() == 1 {
            let value = match *line {
                "TRUE" => 1.0,
                "FALSE" => 0.0,
                _ => parse_f64(line, path, 1)?,
            };
            return Ok(BTreeMap::from([((1, 1), value)]));
        }
    }
    Ok(read_ijv(path)?
        .into_iter()
        .map(|(i, j, v)| ((i, j), v))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_write_read_is_exact() -> Result<(), DmlError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("x");
        let data = vec![0.1, 0.0, -7.123456789012345, 1e-300, 0.0, 3.0];
        write_matrix(&path, &data, &Shape::matrix(2, 3), Format::Text)?;
        let (shape, read) = read_matrix(&path, None, None, None)?;
        assert_eq!(shape, Shape::matrix(2, 3));
        assert_eq!(read, data);
        let mtd = read_metadata(&path)?.ok_or_else(|| DmlError::runtime_error("no mtd"))?;
        assert_eq!(mtd.nnz, Some(4));
        assert_eq!(mtd.format, "text");
        Ok(())
    }

    #[test]
    fn csv_infers_dimensions() -> Result<(), DmlError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("x.csv");
        std::fs::write(&path, "1,2\n3,4\n5,6\n")?;
        let (shape, data) = read_matrix(&path, Some(Format::Csv), None, None)?;
        assert_eq!(shape, Shape::matrix(3, 2));
        assert_eq!(data, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        Ok(())
    }

    #[test]
    fn given_dims_must_match_metadata() -> Result<(), DmlError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("x");
        write_matrix(&path, &[1.0, 2.0], &Shape::matrix(2, 1), Format::Text)?;
        let err = read_matrix(&path, None, Some(3), Some(1)).err();
        assert!(matches!(err, Some(DmlError::ShapeError(_))));
        Ok(())
    }

    #[test]
    fn huge_dims_without_metadata_are_rejected() -> Result<(), DmlError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("x");
        std::fs::write(&path, "1 1 2.5\n")?;
        let err = read_matrix(&path, None, Some(1 << 32), Some((1 << 32) + 1)).err();
        assert!(matches!(err, Some(DmlError::ShapeError(_))));
        Ok(())
    }

    #[test]
    fn all_zero_text_matrix_keeps_dimensions() -> Result<(), DmlError> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("zeros");
        write_matrix(&path, &[0.0; 4], &Shape::matrix(2, 2), Format::Text)?;
        assert_eq!(std::fs::read_to_string(&path)?, "");
        let (shape, data) = read_matrix(&path, None, None, None)?;
        assert_eq!(shape, Shape::matrix(2, 2));
        assert_eq!(data, vec![0.0; 4]);
        Ok(())
    }

    #[test]
    fn cells_of_scalar_and_matrix() -> Result<(), DmlError> {
        let dir = tempfile::tempdir()?;
        let s = dir.path().join("s");
        write_scalar(&s, &Scalar::Double(-2.5))?;
        assert_eq!(read_cells(&s)?, BTreeMap::from([((1, 1), -2.5)]));
        let m = dir.path().join("m");
        write_matrix(&m, &[0.0, 4.0], &Shape::matrix(1, 2), Format::Text)?;
        assert_eq!(read_cells(&m)?, BTreeMap::from([((1, 2), 4.0)]));
        Ok(())
    }
}
