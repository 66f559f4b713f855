//! # dml-core
//!
//! dml-core is the core part of dml, a small matrix scripting runtime.
//! dml-core contains definitions and functions for matrix, backend, lazy
//! runtime, scalar values, data and value types, shape, axes, errors,
//! configuration and the matrix file formats.
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

/// See [Axes](axes::Axes)
pub mod axes;
/// See [Backend](backend::Backend)
pub mod backend;
/// See [Config](config::Config)
pub mod config;
/// See [DataType](dtype::DataType) and [ValueType](dtype::ValueType)
pub mod dtype;
/// See [DmlError](error::DmlError)
pub mod error;
/// Reading and writing of matrices and scalars from disk
pub mod io;
/// See [Matrix](matrix::Matrix)
pub mod matrix;
/// See [Node](node::Node)
pub mod node;
/// See [Runtime](runtime::Runtime)
pub mod runtime;
/// See [Scalar](scalar::Scalar)
pub mod scalar;
/// See [Shape](shape::Shape)
pub mod shape;
/// Some common utilities.
pub mod utils;

/// Debug flag for parse and validation trace
pub const DEBUG_PARSE: u32 = 1;
/// Debug flag for graph dumps and evaluation order
pub const DEBUG_GRAPH: u32 = 2;
/// Debug flag for files read and written
pub const DEBUG_IO: u32 = 4;
/// Debug flag for config lookup
pub const DEBUG_CONFIG: u32 = 8;

/// Debug bitmask read from `DML_DEBUG`, zero when unset or unparsable.
pub fn debug_mask() -> u32 {
    static MASK: std::sync::OnceLock<u32> = std::sync::OnceLock::new();
    *MASK.get_or_init(|| {
        std::env::var("DML_DEBUG")
            .ok()
            .and_then(|x| x.parse::<u32>().ok())
            .unwrap_or(0)
    })
}

/// Is given debug flag enabled?
pub fn debug(flag: u32) -> bool {
    debug_mask() & flag != 0
}
