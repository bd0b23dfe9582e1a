//! Wire-format definitions: field descriptors, record schemas, variant tables,
//! option tables, and the protocol registry.
//!
//! Definitions are built once at startup through the constructors here, frozen
//! behind `Arc`, and shared read-only with the codec and templates. Every
//! configuration error (duplicate keys, duplicate discriminators, bad widths)
//! is detected at definition time, before any decode runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::value::Value;

/// Definition-time configuration error. Halts protocol registration.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("record {record}: duplicate field key `{key}`")]
    DuplicateField { record: String, key: String },
    #[error("record {record}: field `{field}` has invalid width {bits} (must be 1..=64)")]
    BadWidth { record: String, field: String, bits: u32 },
    #[error("record {record}: length field `{field}` refers to unknown field `{target}`")]
    UnknownLengthTarget { record: String, field: String, target: String },
    #[error("record {record}: length field `{field}` must precede `{target}`, which must be a bytes, text, or options field")]
    BadLengthTarget { record: String, field: String, target: String },
    #[error("record {record}: variant field `{field}` discriminator `{key}` does not name an earlier numeric field")]
    UnknownDiscriminator { record: String, field: String, key: String },
    #[error("variant table {table}: case `{case}` has {got} discriminator values, table declares {want}")]
    DiscriminatorArity { table: String, case: String, got: usize, want: usize },
    #[error("variant table {table}: duplicate registration for discriminator {values}")]
    DuplicateDiscriminator { table: String, values: String },
    #[error("option table {table}: duplicate tag {tag}")]
    DuplicateTag { table: String, tag: u64 },
    #[error("option table {table}: tag {tag} does not fit in {bits} tag bits")]
    TagWidth { table: String, tag: u64, bits: u32 },
    #[error("option table {table}: terminator tag {tag} is not a registered case")]
    UnknownTerminator { table: String, tag: u64 },
    #[error("protocol {protocol}: duplicate record name `{name}`")]
    DuplicateRecord { protocol: String, name: String },
}

/// What happens to a trailing partial byte when a string field's scope is not
/// byte-aligned: leave the sub-byte bits for the next field, or consume and
/// drop them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailPolicy {
    CarryForward,
    Truncate,
}

/// Field type specification.
#[derive(Debug, Clone)]
pub enum FieldType {
    /// Fixed-width unsigned integer, 1..=64 bits.
    Uint { bits: u32 },
    /// Single bit, packed high-first.
    Bool,
    /// Byte string: consumes a length-governed scope or the rest of the record.
    Bytes { tail: TailPolicy },
    /// UTF-8 text with the same scoping as `Bytes`.
    Text { tail: TailPolicy },
    /// Unsigned integer whose value is the byte length of a later field.
    LengthOf { bits: u32, field: String },
    Record(Arc<RecordSchema>),
    Options(Arc<OptionTable>),
    Variant(Arc<VariantTable>),
}

impl FieldType {
    fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Uint { .. } | FieldType::LengthOf { .. })
    }

    fn is_scopeable(&self) -> bool {
        matches!(
            self,
            FieldType::Bytes { .. } | FieldType::Text { .. } | FieldType::Options(_)
        )
    }
}

/// One field of a record: wire name, accessor key, type, optional default,
/// optional value-to-description table (rendering only).
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub key: String,
    pub ty: FieldType,
    pub default: Option<Value>,
    pub describe: Option<BTreeMap<u64, String>>,
}

impl FieldDescriptor {
    pub fn new(name: &str, ty: FieldType) -> Self {
        FieldDescriptor {
            name: name.to_string(),
            key: name.to_string(),
            ty,
            default: None,
            describe: None,
        }
    }

    pub fn uint(name: &str, bits: u32) -> Self {
        Self::new(name, FieldType::Uint { bits })
    }

    pub fn boolean(name: &str) -> Self {
        Self::new(name, FieldType::Bool)
    }

    pub fn bytes(name: &str) -> Self {
        Self::new(name, FieldType::Bytes { tail: TailPolicy::CarryForward })
    }

    pub fn text(name: &str) -> Self {
        Self::new(name, FieldType::Text { tail: TailPolicy::CarryForward })
    }

    pub fn length_of(name: &str, bits: u32, target: &str) -> Self {
        Self::new(name, FieldType::LengthOf { bits, field: target.to_string() })
    }

    pub fn record(name: &str, schema: Arc<RecordSchema>) -> Self {
        Self::new(name, FieldType::Record(schema))
    }

    pub fn options(name: &str, table: Arc<OptionTable>) -> Self {
        Self::new(name, FieldType::Options(table))
    }

    pub fn variant(name: &str, table: Arc<VariantTable>) -> Self {
        Self::new(name, FieldType::Variant(table))
    }

    /// Accessor key distinct from the wire name.
    pub fn with_key(mut self, key: &str) -> Self {
        self.key = key.to_string();
        self
    }

    pub fn with_default(mut self, v: Value) -> Self {
        self.default = Some(v);
        self
    }

    /// Human-readable names for well-known values, used when rendering.
    pub fn with_describe(mut self, entries: &[(u64, &str)]) -> Self {
        self.describe = Some(
            entries
                .iter()
                .map(|(v, s)| (*v, s.to_string()))
                .collect(),
        );
        self
    }

    pub fn with_tail(mut self, tail: TailPolicy) -> Self {
        match &mut self.ty {
            FieldType::Bytes { tail: t } | FieldType::Text { tail: t } => *t = tail,
            _ => {}
        }
        self
    }
}

/// Ordered, named composite wire layout. Field order is wire order.
#[derive(Debug)]
pub struct RecordSchema {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
}

impl RecordSchema {
    /// Validate and freeze a record layout.
    pub fn define(name: &str, fields: Vec<FieldDescriptor>) -> Result<Arc<Self>, SchemaError> {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for (i, f) in fields.iter().enumerate() {
            if seen.insert(f.key.as_str(), i).is_some() {
                return Err(SchemaError::DuplicateField {
                    record: name.to_string(),
                    key: f.key.clone(),
                });
            }
            match &f.ty {
                FieldType::Uint { bits } | FieldType::LengthOf { bits, .. } => {
                    if *bits == 0 || *bits > 64 {
                        return Err(SchemaError::BadWidth {
                            record: name.to_string(),
                            field: f.key.clone(),
                            bits: *bits,
                        });
                    }
                }
                _ => {}
            }
        }
        for (i, f) in fields.iter().enumerate() {
            match &f.ty {
                FieldType::LengthOf { field: target, .. } => {
                    let j = match fields.iter().position(|g| g.key == *target) {
                        Some(j) => j,
                        None => {
                            return Err(SchemaError::UnknownLengthTarget {
                                record: name.to_string(),
                                field: f.key.clone(),
                                target: target.clone(),
                            })
                        }
                    };
                    if j <= i || !fields[j].ty.is_scopeable() {
                        return Err(SchemaError::BadLengthTarget {
                            record: name.to_string(),
                            field: f.key.clone(),
                            target: target.clone(),
                        });
                    }
                }
                FieldType::Variant(table) => {
                    for key in &table.discriminators {
                        let ok = fields[..i]
                            .iter()
                            .any(|g| g.key == *key && g.ty.is_numeric());
                        if !ok {
                            return Err(SchemaError::UnknownDiscriminator {
                                record: name.to_string(),
                                field: f.key.clone(),
                                key: key.clone(),
                            });
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(Arc::new(RecordSchema {
            name: name.to_string(),
            fields,
        }))
    }

    pub fn field_index(&self, key: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.key == key)
    }

    pub fn descriptor(&self, key: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.key == key)
    }
}

/// One concrete subtype of a variant dispatch.
#[derive(Debug)]
pub struct VariantCase {
    pub name: String,
    /// Discriminator values, one per declared discriminator field.
    pub when: Vec<u64>,
    /// Remaining fields decoded after the shared prefix.
    pub body: Arc<RecordSchema>,
}

impl VariantCase {
    pub fn new(name: &str, when: &[u64], body: Arc<RecordSchema>) -> Self {
        VariantCase {
            name: name.to_string(),
            when: when.to_vec(),
            body,
        }
    }
}

/// Discriminator-driven selection among record subtypes. The discriminator
/// fields are decoded by the enclosing record's own layout; the table only
/// maps their values to a case body. First registration wins is made
/// deterministic by rejecting duplicates outright.
#[derive(Debug)]
pub struct VariantTable {
    pub name: String,
    /// Keys of earlier fields in the enclosing record.
    pub discriminators: Vec<String>,
    pub cases: Vec<VariantCase>,
    by_value: HashMap<Vec<u64>, usize>,
}

impl VariantTable {
    pub fn define(
        name: &str,
        discriminators: &[&str],
        cases: Vec<VariantCase>,
    ) -> Result<Arc<Self>, SchemaError> {
        let mut by_value = HashMap::new();
        for (i, c) in cases.iter().enumerate() {
            if c.when.len() != discriminators.len() {
                return Err(SchemaError::DiscriminatorArity {
                    table: name.to_string(),
                    case: c.name.clone(),
                    got: c.when.len(),
                    want: discriminators.len(),
                });
            }
            if by_value.insert(c.when.clone(), i).is_some() {
                return Err(SchemaError::DuplicateDiscriminator {
                    table: name.to_string(),
                    values: format!("{:?}", c.when),
                });
            }
        }
        Ok(Arc::new(VariantTable {
            name: name.to_string(),
            discriminators: discriminators.iter().map(|s| s.to_string()).collect(),
            cases,
            by_value,
        }))
    }

    pub fn case_for(&self, values: &[u64]) -> Option<(usize, &VariantCase)> {
        self.by_value
            .get(values)
            .map(|&i| (i, &self.cases[i]))
    }
}

/// One registered option kind: leading tag value and the full option layout
/// (the tag field included, so encode reproduces it).
#[derive(Debug)]
pub struct OptionCase {
    pub name: String,
    pub tag: u64,
    pub schema: Arc<RecordSchema>,
}

impl OptionCase {
    pub fn new(name: &str, tag: u64, schema: Arc<RecordSchema>) -> Self {
        OptionCase {
            name: name.to_string(),
            tag,
            schema,
        }
    }
}

/// Ordered, heterogeneous option-list layout: leading tag width, registered
/// cases, optional terminator tag, optional fallback layout for unregistered
/// tags (without one, an unknown tag's extent is unknowable).
#[derive(Debug)]
pub struct OptionTable {
    pub name: String,
    pub tag_bits: u32,
    pub cases: Vec<OptionCase>,
    pub terminator: Option<u64>,
    pub fallback: Option<Arc<RecordSchema>>,
    by_tag: HashMap<u64, usize>,
}

impl OptionTable {
    pub fn define(
        name: &str,
        tag_bits: u32,
        cases: Vec<OptionCase>,
        terminator: Option<u64>,
        fallback: Option<Arc<RecordSchema>>,
    ) -> Result<Arc<Self>, SchemaError> {
        let max = if tag_bits >= 64 { u64::MAX } else { (1u64 << tag_bits) - 1 };
        let mut by_tag = HashMap::new();
        for (i, c) in cases.iter().enumerate() {
            if c.tag > max {
                return Err(SchemaError::TagWidth {
                    table: name.to_string(),
                    tag: c.tag,
                    bits: tag_bits,
                });
            }
            if by_tag.insert(c.tag, i).is_some() {
                return Err(SchemaError::DuplicateTag {
                    table: name.to_string(),
                    tag: c.tag,
                });
            }
        }
        if let Some(t) = terminator {
            if !by_tag.contains_key(&t) {
                return Err(SchemaError::UnknownTerminator {
                    table: name.to_string(),
                    tag: t,
                });
            }
        }
        Ok(Arc::new(OptionTable {
            name: name.to_string(),
            tag_bits,
            cases,
            terminator,
            fallback,
            by_tag,
        }))
    }

    pub fn case_for(&self, tag: u64) -> Option<&OptionCase> {
        self.by_tag.get(&tag).map(|&i| &self.cases[i])
    }
}

/// Frozen registry of record schemas by name. Built once at startup, then
/// shared read-only; there is no process-wide registration state.
#[derive(Debug)]
pub struct Protocol {
    pub name: String,
    records: HashMap<String, Arc<RecordSchema>>,
}

impl Protocol {
    pub fn new(name: &str, records: Vec<Arc<RecordSchema>>) -> Result<Self, SchemaError> {
        let mut map: HashMap<String, Arc<RecordSchema>> = HashMap::new();
        for r in records {
            if map.contains_key(&r.name) {
                return Err(SchemaError::DuplicateRecord {
                    protocol: name.to_string(),
                    name: r.name.clone(),
                });
            }
            map.insert(r.name.clone(), r);
        }
        Ok(Protocol {
            name: name.to_string(),
            records: map,
        })
    }

    pub fn record(&self, name: &str) -> Option<&Arc<RecordSchema>> {
        self.records.get(name)
    }
}
