//! # wiremodel — Binary wire-format modeling, codec, and template matching
//!
//! Declare a protocol's on-wire layout once (field types, variant-dispatched
//! headers, option lists) and get for free: decoding of raw bytes into a
//! structured value tree, re-encoding back to bytes, template-based matching
//! for conformance testing, and human-readable descriptions of values and
//! mismatches.
//!
//! ## Layout vocabulary
//!
//! - Primitives: fixed-width unsigned integers, single-bit booleans, byte
//!   strings, UTF-8 text
//! - `length_of(field)` fields governing the byte scope of a later field
//! - Nested records, discriminator-selected variants, ordered option lists
//!   with per-tag dispatch, terminator tags, and fallback layouts
//!
//! ## Example
//!
//! ```
//! use wiremodel::{Codec, FieldDescriptor, RecordSchema, Template, Value};
//!
//! let ping = RecordSchema::define(
//!     "Ping",
//!     vec![
//!         FieldDescriptor::uint("kind", 8),
//!         FieldDescriptor::uint("sequence", 16),
//!     ],
//! )
//! .unwrap();
//!
//! let codec = Codec::default();
//! let record = codec.decode(&ping, &[0x01, 0x00, 0x2a]).unwrap();
//! assert_eq!(record.field("sequence").and_then(Value::as_u64), Some(42));
//!
//! let expect = Template::record(vec![("sequence", Template::exact(Value::u16(42)))]);
//! assert!(expect.matches(&wiremodel::Value::Record(record)).unwrap());
//! ```
//!
//! Decode, encode, and match are pure functions over frozen definitions; every
//! public type is immutable after construction and shareable across threads.

pub mod bits;
pub mod codec;
pub mod frame;
pub mod report;
pub mod schema;
pub mod template;
pub mod value;

pub use bits::{BitSlice, OutOfRange};
pub use codec::{Codec, DecodeError, Encoded, EncodeError, Endianness, VariantPolicy};
pub use frame::{decode_frame, recognize, FrameDecodeResult, FrameError};
pub use report::{describe_record, render_mismatches, render_value, Expectation, Mismatch};
pub use schema::{
    FieldDescriptor, FieldType, OptionCase, OptionTable, Protocol, RecordSchema, SchemaError,
    TailPolicy, VariantCase, VariantTable,
};
pub use template::{ForbiddenOption, Template, TemplateError};
pub use value::{
    OptionItem, OptionListValue, RecordValue, UintValue, Value, VariantBody, VariantValue,
};
