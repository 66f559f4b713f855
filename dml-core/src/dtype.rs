/// Data type of a script value: is it a scalar or a matrix?
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum DataType {
    /// Single value
    Scalar,
    /// Two dimensional matrix of doubles
    Matrix,
}

/// Value type of a script value.
/// Matrices are always [ValueType::Double].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ValueType {
    /// 64 bit floating point
    Double,
    /// 64 bit integer
    Int,
    /// Boolean
    Boolean,
    /// String
    String,
    /// Not known before execution
    Unknown,
}

impl DataType {
    /// Name used in metadata files
    pub fn mtd_name(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::Matrix => "matrix",
        }
    }

    /// Parse name used in metadata files
    pub fn from_mtd_name(name: &str) -> Option<Self> {
        match name {
            "scalar" => Some(Self::Scalar),
            "matrix" => Some(Self::Matrix),
            _ => None,
        }
    }
}

impl ValueType {
    /// Name used in metadata files
    pub fn mtd_name(self) -> &'static str {
        match self {
            Self::Double => "double",
            Self::Int => "int",
            Self::Boolean => "boolean",
            Self::String => "string",
            Self::Unknown => "unknown",
        }
    }

    /// Is this a numeric value type (booleans count as 0/1)?
    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Double | Self::Int | Self::Boolean | Self::Unknown)
    }
}

impl core::fmt::Display for DataType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> Result<(), core::fmt::Error> {
        f.write_str(self.mtd_name())
    }
}

impl core::fmt::Display for ValueType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> Result<(), core::fmt::Error> {
        f.write_str(self.mtd_name())
    }
}
