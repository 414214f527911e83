//! tiercache core
//!
//! Value model, coercion engine and error taxonomy shared by every tiercache
//! crate. Nothing in here performs I/O.

pub mod coerce;
pub mod error;
pub mod shape;
pub mod time;
pub mod typed;
pub mod value;

pub use coerce::{
    case_insensitive_name_indexer, coerce, convert, exact_name_indexer, Converter, NameIndexer,
    TimeFormatter, TimeParser, DEFAULT_SEQUENCE_DELIMITER,
};
pub use error::{CacheError, CacheResult, CoerceError, ConfigError, ValidationError};
pub use shape::{FieldSchema, RecordSchema, Shape};
pub use typed::Coercible;
pub use value::{Category, Complex, Mapping, RecordValue, Value};
