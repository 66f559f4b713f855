use crate::dtype::ValueType;
use crate::error::DmlError;

/// Scalar value of a script.
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    /// 64 bit floating point
    Double(f64),
    /// 64 bit integer
    Int(i64),
    /// Boolean
    Boolean(bool),
    /// String
    String(Box<str>),
}

impl Scalar {
    /// Get value type of self
    pub fn value_type(&self) -> ValueType {
        match self {
            Scalar::Double(_) => ValueType::Double,
            Scalar::Int(_) => ValueType::Int,
            Scalar::Boolean(_) => ValueType::Boolean,
            Scalar::String(_) => ValueType::String,
        }
    }

    /// Convert self into f64, booleans map to 0 and 1
    #[track_caller]
    pub fn as_f64(&self) -> Result<f64, DmlError> {
        match self {
            Scalar::Double(x) => Ok(*x),
            #[allow(clippy::cast_precision_loss)]
            Scalar::Int(x) => Ok(*x as f64),
            Scalar::Boolean(x) => Ok(if *x { 1.0 } else { 0.0 }),
            Scalar::String(x) => x
                .parse()
                .map_err(|_| DmlError::runtime_error(format!("Cannot cast string {x:?} to double"))),
        }
    }

    /// Convert self into i64, doubles must be integral
    #[track_caller]
    pub fn as_i64(&self) -> Result<i64, DmlError> {
        match self {
            Scalar::Int(x) => Ok(*x),
            Scalar::Boolean(x) => Ok(i64::from(*x)),
            #[allow(clippy::cast_possible_truncation)]
            Scalar::Double(x) if x.fract() == 0.0 && x.is_finite() => Ok(*x as i64),
            Scalar::Double(x) => Err(DmlError::runtime_error(format!(
                "Cannot cast non integral double {x} to int"
            ))),
            Scalar::String(x) => x
                .parse()
                .map_err(|_| DmlError::runtime_error(format!("Cannot cast string {x:?} to int"))),
        }
    }

    /// Neg
    pub fn neg(self) -> Result<Self, DmlError> {
        match self {
            Scalar::Int(x) => Ok(Scalar::Int(x.wrapping_neg())),
            x => Ok(Scalar::Double(-x.as_f64()?)),
        }
    }

    /// Add, strings are concatenated
    pub fn add(self, rhs: Self) -> Result<Self, DmlError> {
        match (self, rhs) {
            (Scalar::String(x), y) => Ok(Scalar::String(format!("{x}{y}").into())),
            (x, Scalar::String(y)) => Ok(Scalar::String(format!("{x}{y}").into())),
            (Scalar::Int(x), Scalar::Int(y)) => Ok(Scalar::Int(x.wrapping_add(y))),
            (x, y) => Ok(Scalar::Double(x.as_f64()? + y.as_f64()?)),
        }
    }

    /// Sub
    pub fn sub(self, rhs: Self) -> Result<Self, DmlError> {
        match (self, rhs) {
            (Scalar::Int(x), Scalar::Int(y)) => Ok(Scalar::Int(x.wrapping_sub(y))),
            (x, y) => Ok(Scalar::Double(x.as_f64()? - y.as_f64()?)),
        }
    }

    /// Mul
    pub fn mul(self, rhs: Self) -> Result<Self, DmlError> {
        match (self, rhs) {
            (Scalar::Int(x), Scalar::Int(y)) => Ok(Scalar::Int(x.wrapping_mul(y))),
            (x, y) => Ok(Scalar::Double(x.as_f64()? * y.as_f64()?)),
        }
    }

    /// Div, always produces double
    pub fn div(self, rhs: Self) -> Result<Self, DmlError> {
        Ok(Scalar::Double(self.as_f64()? / rhs.as_f64()?))
    }

    /// Pow, always produces double
    pub fn pow(self, rhs: Self) -> Result<Self, DmlError> {
        Ok(Scalar::Double(self.as_f64()?.powf(rhs.as_f64()?)))
    }
}

impl core::fmt::Display for Scalar {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            // Integral doubles keep their decimal point, so 3.0 stays 3.0
            Scalar::Double(x) if x.fract() == 0.0 && x.is_finite() => {
                f.write_fmt(format_args!("{x:.1}"))
            }
            Scalar::Double(x) => f.write_fmt(format_args!("{x}")),
            Scalar::Int(x) => f.write_fmt(format_args!("{x}")),
            Scalar::Boolean(x) => f.write_str(if *x { "TRUE" } else { "FALSE" }),
            Scalar::String(x) => f.write_str(x),
        }
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Double(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Int(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Boolean(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::String(value.into())
    }
}

#[test]
fn scalar_arithmetic() -> Result<(), DmlError> {
    assert_eq!(Scalar::Int(3).add(Scalar::Int(4))?, Scalar::Int(7));
    assert_eq!(Scalar::Int(3).div(Scalar::Int(2))?, Scalar::Double(1.5));
    assert_eq!(Scalar::Double(0.5).mul(Scalar::Int(4))?, Scalar::Double(2.0));
    assert_eq!(Scalar::from("n=").add(Scalar::Int(3))?, Scalar::from("n=3"));
    assert_eq!(Scalar::Int(2).pow(Scalar::Int(10))?, Scalar::Double(1024.0));
    assert_eq!(Scalar::Int(5).neg()?, Scalar::Int(-5));
    Ok(())
}

#[test]
fn int_arithmetic_wraps() -> Result<(), DmlError> {
    let min = Scalar::Int(0).sub(Scalar::Int(i64::MAX))?.sub(Scalar::Int(1))?;
    assert_eq!(min, Scalar::Int(i64::MIN));
    assert_eq!(min.neg()?, Scalar::Int(i64::MIN));
    assert_eq!(Scalar::Int(i64::MAX).add(Scalar::Int(1))?, Scalar::Int(i64::MIN));
    Ok(())
}

#[test]
fn scalar_display() {
    assert_eq!(Scalar::Double(3.0).to_string(), "3.0");
    assert_eq!(Scalar::Double(0.25).to_string(), "0.25");
    assert_eq!(Scalar::Int(3).to_string(), "3");
    assert_eq!(Scalar::Boolean(true).to_string(), "TRUE");
}

#[test]
fn scalar_casts() {
    assert!(Scalar::Double(2.5).as_i64().is_err());
    assert_eq!(Scalar::Double(2.0).as_i64().ok(), Some(2));
    assert_eq!(Scalar::from("1.5").as_f64().ok(), Some(1.5));
    assert_eq!(Scalar::Boolean(true).as_f64().ok(), Some(1.0));
}
