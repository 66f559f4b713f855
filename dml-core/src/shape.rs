use crate::axes::Axes;
use crate::error::DmlError;

/// Shape of matrix
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Shape(Box<[usize]>);

impl Shape {
    /// Shape of a rows x cols matrix
    #[must_use]
    pub fn matrix(rows: usize, cols: usize) -> Self {
        Shape(Box::new([rows, cols]))
    }

    /// Shape of a rows x cols matrix whose element count must fit in usize.
    /// Use this for dimensions coming from scripts and files.
    #[track_caller]
    pub fn checked_matrix(rows: usize, cols: usize) -> Result<Self, DmlError> {
        if rows.checked_mul(cols).is_none() {
            return Err(DmlError::shape_error(format!(
                "Matrix with {rows} rows and {cols} cols has too many elements"
            )));
        }
        Ok(Shape::matrix(rows, cols))
    }

    /// Get shape's rank
    #[must_use]
    pub const fn rank(&self) -> usize {
        self.0.len()
    }

    /// Number of rows, the first dimension
    #[must_use]
    pub fn rows(&self) -> usize {
        self.0.first().copied().unwrap_or(1)
    }

    /// Number of columns, the last dimension
    #[must_use]
    pub fn cols(&self) -> usize {
        if self.rank() < 2 {
            1
        } else {
            self.0[self.rank() - 1]
        }
    }

    /// Get number of elements in matrix with this shape
    /// (a product of it's dimensions).
    #[must_use]
    pub fn numel(&self) -> usize {
        self.0.iter().product()
    }

    /// Iter
    pub fn iter(&self) -> impl Iterator<Item = &usize> {
        self.into_iter()
    }

    /// Reduce self along axes
    #[must_use]
    pub fn reduce(self, axes: &Axes) -> Shape {
        let mut shape = self;
        for a in axes {
            shape.0[*a] = 1;
        }
        shape
    }
}

impl core::fmt::Display for Shape {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let dims: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&dims.join("x"))
    }
}

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(value: [usize; N]) -> Self {
        Shape(value.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Shape {
    type IntoIter = <&'a [usize] as IntoIterator>::IntoIter;
    type Item = &'a usize;
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[test]
fn reduce_keeps_rank() {
    let sh = Shape::matrix(3, 4);
    assert_eq!(sh.numel(), 12);
    assert_eq!(sh.clone().reduce(&Axes::from([1])), Shape::matrix(3, 1));
    assert_eq!(sh.reduce(&Axes::from([0, 1])), Shape::matrix(1, 1));
    assert_eq!(Shape::matrix(10, 1).to_string(), "10x1");
}

#[test]
fn checked_matrix_rejects_overflow() {
    assert_eq!(Shape::checked_matrix(3, 4).ok(), Some(Shape::matrix(3, 4)));
    assert_eq!(Shape::checked_matrix(usize::MAX, 0).map(|s| s.numel()).ok(), Some(0));
    let e = Shape::checked_matrix(1 << 32, (1 << 32) + 1);
    assert!(matches!(e, Err(DmlError::ShapeError(_))));
}
