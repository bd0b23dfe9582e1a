//! Runtime values for encoding/decoding (the decoded value tree).
//!
//! Primitives are a closed enum: every wire scalar is one of unsigned integer,
//! boolean, byte string, or text. Composites carry their schema by `Arc` so a
//! decoded tree stays introspectable (field lookup, rendering) without any
//! global registry.

use std::sync::Arc;

use crate::schema::{FieldType, OptionTable, RecordSchema, VariantTable};

/// A single decoded value (scalar or compound).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Uint(UintValue),
    Bool(bool),
    Bytes(Vec<u8>),
    Text(String),
    Record(RecordValue),
    Variant(VariantValue),
    Options(OptionListValue),
}

/// Fixed-width unsigned integer. Equality compares the numeric value only;
/// the declared width is representation, not identity.
#[derive(Debug, Clone, Copy)]
pub struct UintValue {
    pub bits: u32,
    pub value: u64,
}

impl PartialEq for UintValue {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Value {
    pub fn u8(v: u8) -> Value {
        Value::Uint(UintValue { bits: 8, value: v as u64 })
    }

    pub fn u16(v: u16) -> Value {
        Value::Uint(UintValue { bits: 16, value: v as u64 })
    }

    pub fn u32(v: u32) -> Value {
        Value::Uint(UintValue { bits: 32, value: v as u64 })
    }

    pub fn u64(v: u64) -> Value {
        Value::Uint(UintValue { bits: 64, value: v })
    }

    pub fn uint(bits: u32, value: u64) -> Value {
        Value::Uint(UintValue { bits, value })
    }

    pub fn bytes(b: &[u8]) -> Value {
        Value::Bytes(b.to_vec())
    }

    pub fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Uint(u) => Some(u.value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&RecordValue> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_variant(&self) -> Option<&VariantValue> {
        match self {
            Value::Variant(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_options(&self) -> Option<&OptionListValue> {
        match self {
            Value::Options(o) => Some(o),
            _ => None,
        }
    }

    /// Kind name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Uint(_) => "uint",
            Value::Bool(_) => "bool",
            Value::Bytes(_) => "bytes",
            Value::Text(_) => "text",
            Value::Record(_) => "record",
            Value::Variant(_) => "variant",
            Value::Options(_) => "options",
        }
    }
}

/// Decoded record: field values in declaration (wire) order, parallel to the
/// schema's descriptors. The tree owns its field values exclusively.
#[derive(Debug, Clone)]
pub struct RecordValue {
    pub schema: Arc<RecordSchema>,
    pub fields: Vec<Value>,
}

impl PartialEq for RecordValue {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name == other.schema.name && self.fields == other.fields
    }
}

impl RecordValue {
    /// Field value by accessor key. A miss delegates into any resolved variant
    /// case body, so `record.field("identifier")` works on a record whose
    /// echo-specific fields live behind a variant dispatch.
    pub fn field(&self, key: &str) -> Option<&Value> {
        if let Some(i) = self.schema.field_index(key) {
            return self.fields.get(i);
        }
        for v in &self.fields {
            if let Value::Variant(var) = v {
                if let Some(record) = var.record() {
                    if let Some(found) = record.field(key) {
                        return Some(found);
                    }
                }
            }
        }
        None
    }

    pub fn field_mut(&mut self, key: &str) -> Option<&mut Value> {
        if let Some(i) = self.schema.field_index(key) {
            return self.fields.get_mut(i);
        }
        for v in &mut self.fields {
            if let Value::Variant(var) = v {
                if let VariantBody::Case { record, .. } = &mut var.body {
                    if let Some(found) = record.field_mut(key) {
                        return Some(found);
                    }
                }
            }
        }
        None
    }

    /// First field whose declared type has the same shape as `ty` (same enum
    /// case, widths ignored), delegating like [`RecordValue::field`].
    pub fn field_of_type(&self, ty: &FieldType) -> Option<&Value> {
        let want = std::mem::discriminant(ty);
        for (fd, v) in self.schema.fields.iter().zip(&self.fields) {
            if std::mem::discriminant(&fd.ty) == want {
                return Some(v);
            }
        }
        for v in &self.fields {
            if let Value::Variant(var) = v {
                if let Some(record) = var.record() {
                    if let Some(found) = record.field_of_type(ty) {
                        return Some(found);
                    }
                }
            }
        }
        None
    }
}

/// Resolved variant dispatch: either a registered case body, or the generic
/// unknown representation (raw remainder bytes) when the discriminator was
/// unregistered and the codec runs in fallback mode.
#[derive(Debug, Clone)]
pub struct VariantValue {
    pub table: Arc<VariantTable>,
    pub body: VariantBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VariantBody {
    Case { index: usize, record: RecordValue },
    Unknown { discriminator: Vec<u64>, raw: Vec<u8> },
}

impl PartialEq for VariantValue {
    fn eq(&self, other: &Self) -> bool {
        self.table.name == other.table.name && self.body == other.body
    }
}

impl VariantValue {
    pub fn case_name(&self) -> Option<&str> {
        match &self.body {
            VariantBody::Case { index, .. } => {
                self.table.cases.get(*index).map(|c| c.name.as_str())
            }
            VariantBody::Unknown { .. } => None,
        }
    }

    pub fn record(&self) -> Option<&RecordValue> {
        match &self.body {
            VariantBody::Case { record, .. } => Some(record),
            VariantBody::Unknown { .. } => None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.body, VariantBody::Unknown { .. })
    }
}

/// One decoded option: its dispatch tag and full option record (tag field
/// included).
#[derive(Debug, Clone, PartialEq)]
pub struct OptionItem {
    pub tag: u64,
    pub record: RecordValue,
}

/// Ordered option list. Encode reproduces the items in this exact order.
#[derive(Debug, Clone)]
pub struct OptionListValue {
    pub table: Arc<OptionTable>,
    pub items: Vec<OptionItem>,
}

impl PartialEq for OptionListValue {
    fn eq(&self, other: &Self) -> bool {
        self.table.name == other.table.name && self.items == other.items
    }
}

impl OptionListValue {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Options with the given tag in list order. Lazy and restartable: each
    /// call re-scans the list, no cursor state is retained.
    pub fn find_by_tag(&self, tag: u64) -> impl Iterator<Item = &OptionItem> + '_ {
        self.items.iter().filter(move |o| o.tag == tag)
    }
}
