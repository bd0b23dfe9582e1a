//! Encode/decode binary records from wire-format definitions.
//!
//! Handles primitives (with configurable endianness for whole-byte widths),
//! length-governed scopes, nested records, variant dispatch, and option lists.
//! Decode is atomic per record: a failing nested field aborts the enclosing
//! record and no partial value is ever returned.

use std::collections::HashMap;
use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::bits::{BitSlice, OutOfRange};
use crate::schema::{FieldDescriptor, FieldType, OptionTable, RecordSchema, TailPolicy};
use crate::value::{
    OptionItem, OptionListValue, RecordValue, Value, VariantBody, VariantValue,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Big,
    Little,
}

/// What decode does with an unregistered variant discriminator or option tag:
/// fall back to the generic representation, or fail with `NoMatchingVariant`.
/// Explicit per `Codec`; neither choice is silent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantPolicy {
    Fallback,
    Strict,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error(transparent)]
    OutOfRange(#[from] OutOfRange),
    #[error("truncated input in {record}.{field}: {source}")]
    TruncatedInput {
        record: String,
        field: String,
        #[source]
        source: OutOfRange,
    },
    #[error("truncated option #{index} in {table}: {source}")]
    TruncatedOption {
        table: String,
        index: usize,
        #[source]
        source: Box<DecodeError>,
    },
    #[error("malformed length in {record}.{field}: {declared} bytes declared at bit {at}, {available_bits} bits available")]
    MalformedLength {
        record: String,
        field: String,
        declared: u64,
        at: usize,
        available_bits: usize,
    },
    #[error("no matching variant in {table} for discriminator {values} at bit {at}")]
    NoMatchingVariant {
        table: String,
        values: String,
        at: usize,
    },
    #[error("invalid utf-8 text in {record}.{field} at bit {at}")]
    InvalidText {
        record: String,
        field: String,
        at: usize,
    },
}

impl DecodeError {
    /// Bit offset of the failure within the decoded buffer, when obtainable.
    pub fn offset_bits(&self) -> Option<usize> {
        match self {
            DecodeError::OutOfRange(e) => Some(e.at),
            DecodeError::TruncatedInput { source, .. } => Some(source.at),
            DecodeError::TruncatedOption { source, .. } => source.offset_bits(),
            DecodeError::MalformedLength { at, .. } => Some(*at),
            DecodeError::NoMatchingVariant { at, .. } => Some(*at),
            DecodeError::InvalidText { at, .. } => Some(*at),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("{record}.{field}: value {value} does not fit in {bits} bits")]
    WidthOverflow {
        record: String,
        field: String,
        bits: u32,
        value: u64,
    },
    #[error("{record}.{field}: missing value and no default")]
    MissingField { record: String, field: String },
    #[error("{record}: unknown field key `{key}`")]
    UnknownField { record: String, key: String },
    #[error("{record}.{field}: value kind `{found}` does not match the declared field type")]
    KindMismatch {
        record: String,
        field: String,
        found: &'static str,
    },
    #[error("{record}.{field}: encoded length {actual} bytes exceeds a {bits}-bit length field")]
    LengthOverflow {
        record: String,
        field: String,
        actual: usize,
        bits: u32,
    },
}

/// Encode output: concatenated bytes plus the exact bit length (the last byte
/// is zero-padded when the total is not byte-aligned).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub bit_len: usize,
}

/// The codec: endianness for whole-byte integer widths plus the variant
/// policy. Stateless across calls; decode/encode are pure functions of the
/// input and the frozen schemas.
#[derive(Debug, Clone, Copy)]
pub struct Codec {
    pub endianness: Endianness,
    pub policy: VariantPolicy,
}

impl Default for Codec {
    fn default() -> Self {
        Codec {
            endianness: Endianness::Big,
            policy: VariantPolicy::Fallback,
        }
    }
}

/// Per-record decode scope: numeric field values (for discriminators) and
/// pending length declarations. Reset for every nested record.
#[derive(Default)]
struct ScopeCtx {
    numeric: HashMap<String, u64>,
    lengths: HashMap<String, u64>,
}

impl Codec {
    pub fn new(endianness: Endianness, policy: VariantPolicy) -> Self {
        Codec { endianness, policy }
    }

    /// Decode one record from the start of a byte buffer. Trailing bytes are
    /// allowed and ignored; use [`Codec::decode_slice`] to recover them.
    pub fn decode(
        &self,
        schema: &Arc<RecordSchema>,
        bytes: &[u8],
    ) -> Result<RecordValue, DecodeError> {
        let (record, _rest) = self.decode_slice(schema, BitSlice::new(bytes))?;
        Ok(record)
    }

    /// Decode one record from a bit slice, returning the remainder.
    pub fn decode_slice<'a>(
        &self,
        schema: &Arc<RecordSchema>,
        slice: BitSlice<'a>,
    ) -> Result<(RecordValue, BitSlice<'a>), DecodeError> {
        let mut ctx = ScopeCtx::default();
        let mut fields = Vec::with_capacity(schema.fields.len());
        let mut rest = slice;
        for fd in &schema.fields {
            let (v, after) = self.decode_field(schema, fd, rest, &mut ctx)?;
            fields.push(v);
            rest = after;
        }
        Ok((
            RecordValue {
                schema: Arc::clone(schema),
                fields,
            },
            rest,
        ))
    }

    fn decode_field<'a>(
        &self,
        schema: &RecordSchema,
        fd: &FieldDescriptor,
        slice: BitSlice<'a>,
        ctx: &mut ScopeCtx,
    ) -> Result<(Value, BitSlice<'a>), DecodeError> {
        // A preceding length field bounds this field's scope in bytes.
        let scoped = match ctx.lengths.get(&fd.key) {
            Some(&n) => {
                let need = (n as usize) * 8;
                if need > slice.bit_len() {
                    return Err(DecodeError::MalformedLength {
                        record: schema.name.clone(),
                        field: fd.key.clone(),
                        declared: n,
                        at: slice.origin_bit(),
                        available_bits: slice.bit_len(),
                    });
                }
                Some((slice.slice(0, need)?, slice.shift_bits(need)?))
            }
            None => None,
        };

        match &fd.ty {
            FieldType::Uint { bits } => {
                let (v, rest) = self
                    .read_uint(slice, *bits)
                    .map_err(|e| truncated(schema, fd, e))?;
                ctx.numeric.insert(fd.key.clone(), v);
                Ok((Value::uint(*bits, v), rest))
            }
            FieldType::LengthOf { bits, field } => {
                let (v, rest) = self
                    .read_uint(slice, *bits)
                    .map_err(|e| truncated(schema, fd, e))?;
                ctx.numeric.insert(fd.key.clone(), v);
                ctx.lengths.insert(field.clone(), v);
                Ok((Value::uint(*bits, v), rest))
            }
            FieldType::Bool => {
                let (v, rest) = slice
                    .take_bits(1)
                    .map_err(|e| truncated(schema, fd, e))?;
                Ok((Value::Bool(v != 0), rest))
            }
            FieldType::Bytes { tail } => {
                let (raw, rest) = self.take_string_scope(slice, scoped, *tail)?;
                Ok((Value::Bytes(raw), rest))
            }
            FieldType::Text { tail } => {
                let at = slice.origin_bit();
                let (raw, rest) = self.take_string_scope(slice, scoped, *tail)?;
                let s = String::from_utf8(raw).map_err(|_| DecodeError::InvalidText {
                    record: schema.name.clone(),
                    field: fd.key.clone(),
                    at,
                })?;
                Ok((Value::Text(s), rest))
            }
            FieldType::Record(sub) => {
                let (record, rest) = self.decode_slice(sub, slice)?;
                Ok((Value::Record(record), rest))
            }
            FieldType::Options(table) => match scoped {
                Some((scope, after)) => {
                    let (list, _leftover) = self.decode_options(table, scope)?;
                    Ok((Value::Options(list), after))
                }
                None => {
                    let (list, rest) = self.decode_options(table, slice)?;
                    Ok((Value::Options(list), rest))
                }
            },
            FieldType::Variant(table) => {
                let values = table
                    .discriminators
                    .iter()
                    .map(|k| ctx.numeric.get(k).copied())
                    .collect::<Option<Vec<u64>>>()
                    .ok_or_else(|| DecodeError::NoMatchingVariant {
                        table: table.name.clone(),
                        values: "<undecoded discriminator>".to_string(),
                        at: slice.origin_bit(),
                    })?;
                match table.case_for(&values) {
                    Some((index, case)) => {
                        let (record, rest) = self.decode_slice(&case.body, slice)?;
                        Ok((
                            Value::Variant(VariantValue {
                                table: Arc::clone(table),
                                body: VariantBody::Case { index, record },
                            }),
                            rest,
                        ))
                    }
                    None => match self.policy {
                        VariantPolicy::Strict => Err(DecodeError::NoMatchingVariant {
                            table: table.name.clone(),
                            values: format!("{:?}", values),
                            at: slice.origin_bit(),
                        }),
                        VariantPolicy::Fallback => {
                            // Generic representation: the raw remainder, so an
                            // evolving protocol decodes instead of crashing.
                            let raw = slice.bytes();
                            let rest = slice.shift_bits(slice.bit_len())?;
                            Ok((
                                Value::Variant(VariantValue {
                                    table: Arc::clone(table),
                                    body: VariantBody::Unknown {
                                        discriminator: values,
                                        raw,
                                    },
                                }),
                                rest,
                            ))
                        }
                    },
                }
            }
        }
    }

    /// Byte payload of a string field: the length-governed scope when one was
    /// declared, otherwise the whole-byte remainder of the record scope. The
    /// tail policy decides whether a trailing sub-byte stays in the remainder.
    fn take_string_scope<'a>(
        &self,
        slice: BitSlice<'a>,
        scoped: Option<(BitSlice<'a>, BitSlice<'a>)>,
        tail: TailPolicy,
    ) -> Result<(Vec<u8>, BitSlice<'a>), DecodeError> {
        if let Some((scope, after)) = scoped {
            return Ok((scope.bytes(), after));
        }
        let whole = slice.bit_len() / 8;
        let value = slice.slice(0, whole * 8)?.bytes();
        let rest = match tail {
            TailPolicy::CarryForward => slice.shift_bits(whole * 8)?,
            TailPolicy::Truncate => slice.shift_bits(slice.bit_len())?,
        };
        Ok((value, rest))
    }

    /// Decode options until terminator, scope exhaustion, or an empty slice.
    fn decode_options<'a>(
        &self,
        table: &Arc<OptionTable>,
        scope: BitSlice<'a>,
    ) -> Result<(OptionListValue, BitSlice<'a>), DecodeError> {
        let mut items = Vec::new();
        let mut s = scope;
        while !s.is_empty() {
            let index = items.len();
            let tag = s
                .peek_bits(table.tag_bits as usize)
                .map_err(|e| DecodeError::TruncatedOption {
                    table: table.name.clone(),
                    index,
                    source: Box::new(e.into()),
                })?;
            let schema = match table.case_for(tag) {
                Some(case) => &case.schema,
                None => match (self.policy, &table.fallback) {
                    (VariantPolicy::Fallback, Some(fb)) => fb,
                    _ => {
                        return Err(DecodeError::NoMatchingVariant {
                            table: table.name.clone(),
                            values: format!("[{}]", tag),
                            at: s.origin_bit(),
                        })
                    }
                },
            };
            let (record, rest) =
                self.decode_slice(schema, s)
                    .map_err(|e| DecodeError::TruncatedOption {
                        table: table.name.clone(),
                        index,
                        source: Box::new(e),
                    })?;
            if rest.bit_len() == s.bit_len() {
                // An empty option layout would never advance; stop rather than spin.
                break;
            }
            items.push(OptionItem { tag, record });
            s = rest;
            if table.terminator == Some(tag) {
                break;
            }
        }
        Ok((
            OptionListValue {
                table: Arc::clone(table),
                items,
            },
            s,
        ))
    }

    fn read_uint<'a>(
        &self,
        slice: BitSlice<'a>,
        bits: u32,
    ) -> Result<(u64, BitSlice<'a>), OutOfRange> {
        if bits % 8 == 0 {
            let n = (bits / 8) as usize;
            let mut buf = [0u8; 8];
            let mut s = slice;
            for b in buf.iter_mut().take(n) {
                let (v, rest) = s.take_bits(8)?;
                *b = v as u8;
                s = rest;
            }
            Ok((self.bytes_to_u64(&buf[..n]), s))
        } else {
            slice.take_bits(bits as usize)
        }
    }

    // ---- encode ----

    /// Encode a value tree to bytes plus exact bit length.
    pub fn encode(&self, value: &Value) -> Result<Encoded, EncodeError> {
        let mut w = BitWriter::default();
        self.encode_value(value, &mut w)?;
        Ok(w.finish())
    }

    /// Encode a record (decoded or assembled) in declared field order.
    pub fn encode_record(&self, record: &RecordValue) -> Result<Encoded, EncodeError> {
        let mut w = BitWriter::default();
        self.encode_record_into(record, &mut w)?;
        Ok(w.finish())
    }

    /// Assemble a record value from a key-to-value map, filling declared
    /// defaults and type defaults for absent keys. Unknown keys are rejected.
    pub fn make_record(
        &self,
        schema: &Arc<RecordSchema>,
        values: &HashMap<String, Value>,
    ) -> Result<RecordValue, EncodeError> {
        for key in values.keys() {
            if schema.field_index(key).is_none() {
                return Err(EncodeError::UnknownField {
                    record: schema.name.clone(),
                    key: key.clone(),
                });
            }
        }
        let mut fields = Vec::with_capacity(schema.fields.len());
        for fd in &schema.fields {
            let v = values
                .get(&fd.key)
                .cloned()
                .or_else(|| fd.default.clone())
                .or_else(|| default_for(&fd.ty))
                .ok_or_else(|| EncodeError::MissingField {
                    record: schema.name.clone(),
                    field: fd.key.clone(),
                })?;
            fields.push(v);
        }
        Ok(RecordValue {
            schema: Arc::clone(schema),
            fields,
        })
    }

    fn encode_value(&self, v: &Value, w: &mut BitWriter) -> Result<(), EncodeError> {
        match v {
            Value::Uint(u) => {
                self.write_uint(w, u.value, u.bits);
                Ok(())
            }
            Value::Bool(b) => {
                w.push_bits(*b as u64, 1);
                Ok(())
            }
            Value::Bytes(b) => {
                w.push_bytes(b);
                Ok(())
            }
            Value::Text(s) => {
                w.push_bytes(s.as_bytes());
                Ok(())
            }
            Value::Record(r) => self.encode_record_into(r, w),
            Value::Variant(var) => self.encode_variant(var, w),
            Value::Options(list) => self.encode_options(list, w),
        }
    }

    fn encode_record_into(&self, r: &RecordValue, w: &mut BitWriter) -> Result<(), EncodeError> {
        for (i, fd) in r.schema.fields.iter().enumerate() {
            let v = r.fields.get(i).ok_or_else(|| EncodeError::MissingField {
                record: r.schema.name.clone(),
                field: fd.key.clone(),
            })?;
            match (&fd.ty, v) {
                (FieldType::Uint { bits }, Value::Uint(u)) => {
                    self.check_width(r, fd, u.value, *bits)?;
                    self.write_uint(w, u.value, *bits);
                }
                (FieldType::LengthOf { bits, field }, _) => {
                    // Recomputed from the governed field's actual encoding so a
                    // mutated tree keeps consistent framing.
                    let n = self.governed_byte_len(r, field)?;
                    let max = if *bits >= 64 { u64::MAX } else { (1u64 << *bits) - 1 };
                    if n as u64 > max {
                        return Err(EncodeError::LengthOverflow {
                            record: r.schema.name.clone(),
                            field: fd.key.clone(),
                            actual: n,
                            bits: *bits,
                        });
                    }
                    self.write_uint(w, n as u64, *bits);
                }
                (FieldType::Bool, Value::Bool(b)) => w.push_bits(*b as u64, 1),
                (FieldType::Bytes { .. }, Value::Bytes(b)) => w.push_bytes(b),
                (FieldType::Text { .. }, Value::Text(s)) => w.push_bytes(s.as_bytes()),
                (FieldType::Record(_), Value::Record(sub)) => {
                    self.encode_record_into(sub, w)?;
                }
                (FieldType::Variant(_), Value::Variant(var)) => {
                    self.encode_variant(var, w)?;
                }
                (FieldType::Options(_), Value::Options(list)) => {
                    self.encode_options(list, w)?;
                }
                (_, other) => {
                    return Err(EncodeError::KindMismatch {
                        record: r.schema.name.clone(),
                        field: fd.key.clone(),
                        found: other.kind(),
                    })
                }
            }
        }
        Ok(())
    }

    fn encode_variant(&self, var: &VariantValue, w: &mut BitWriter) -> Result<(), EncodeError> {
        match &var.body {
            VariantBody::Case { record, .. } => self.encode_record_into(record, w),
            VariantBody::Unknown { raw, .. } => {
                w.push_bytes(raw);
                Ok(())
            }
        }
    }

    fn encode_options(&self, list: &OptionListValue, w: &mut BitWriter) -> Result<(), EncodeError> {
        for item in &list.items {
            self.encode_record_into(&item.record, w)?;
        }
        Ok(())
    }

    fn governed_byte_len(&self, r: &RecordValue, target: &str) -> Result<usize, EncodeError> {
        let idx = r
            .schema
            .field_index(target)
            .ok_or_else(|| EncodeError::UnknownField {
                record: r.schema.name.clone(),
                key: target.to_string(),
            })?;
        let governed = r.fields.get(idx).ok_or_else(|| EncodeError::MissingField {
            record: r.schema.name.clone(),
            field: target.to_string(),
        })?;
        let sub = self.encode(governed)?;
        Ok((sub.bit_len + 7) / 8)
    }

    fn check_width(
        &self,
        r: &RecordValue,
        fd: &FieldDescriptor,
        value: u64,
        bits: u32,
    ) -> Result<(), EncodeError> {
        if bits < 64 && (value >> bits) != 0 {
            return Err(EncodeError::WidthOverflow {
                record: r.schema.name.clone(),
                field: fd.key.clone(),
                bits,
                value,
            });
        }
        Ok(())
    }

    fn write_uint(&self, w: &mut BitWriter, value: u64, bits: u32) {
        if bits % 8 == 0 {
            let buf = self.u64_to_bytes(value, (bits / 8) as usize);
            w.push_bytes(&buf);
        } else {
            w.push_bits(value, bits);
        }
    }

    fn bytes_to_u64(&self, buf: &[u8]) -> u64 {
        match self.endianness {
            Endianness::Big => BigEndian::read_uint(buf, buf.len()),
            Endianness::Little => LittleEndian::read_uint(buf, buf.len()),
        }
    }

    fn u64_to_bytes(&self, v: u64, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        match self.endianness {
            Endianness::Big => BigEndian::write_uint(&mut buf, v, len),
            Endianness::Little => LittleEndian::write_uint(&mut buf, v, len),
        }
        buf
    }
}

fn truncated(schema: &RecordSchema, fd: &FieldDescriptor, e: OutOfRange) -> DecodeError {
    DecodeError::TruncatedInput {
        record: schema.name.clone(),
        field: fd.key.clone(),
        source: e,
    }
}

fn default_for(ty: &FieldType) -> Option<Value> {
    match ty {
        FieldType::Uint { bits } | FieldType::LengthOf { bits, .. } => Some(Value::uint(*bits, 0)),
        FieldType::Bool => Some(Value::Bool(false)),
        FieldType::Bytes { .. } => Some(Value::Bytes(Vec::new())),
        FieldType::Text { .. } => Some(Value::Text(String::new())),
        FieldType::Options(table) => Some(Value::Options(OptionListValue {
            table: Arc::clone(table),
            items: Vec::new(),
        })),
        FieldType::Record(_) | FieldType::Variant(_) => None,
    }
}

/// MSB-first bit accumulator. Bits are written from the high bit of each byte
/// down, so a single boolean encodes as `0x80`/`0x00` with bit length 1 and
/// packed flags fill a byte top to bottom.
#[derive(Default)]
struct BitWriter {
    out: Vec<u8>,
    bit_len: usize,
}

impl BitWriter {
    fn push_bit(&mut self, bit: bool) {
        let idx = self.bit_len / 8;
        if idx == self.out.len() {
            self.out.push(0);
        }
        if bit {
            self.out[idx] |= 0x80 >> (self.bit_len % 8);
        }
        self.bit_len += 1;
    }

    fn push_bits(&mut self, value: u64, bits: u32) {
        for i in (0..bits).rev() {
            self.push_bit((value >> i) & 1 != 0);
        }
    }

    fn push_bytes(&mut self, bytes: &[u8]) {
        if self.bit_len % 8 == 0 {
            self.out.extend_from_slice(bytes);
            self.bit_len += bytes.len() * 8;
        } else {
            for &b in bytes {
                self.push_bits(b as u64, 8);
            }
        }
    }

    fn finish(self) -> Encoded {
        Encoded {
            bytes: self.out,
            bit_len: self.bit_len,
        }
    }
}
