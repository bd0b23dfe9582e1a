//! Mismatch diagnostics and human-readable rendering of values.
//!
//! A [`Mismatch`] tree mirrors the structural position where a value diverged
//! from a template; rendering produces "observed / expected" lines a
//! conformance-test author can act on. Field description tables from the
//! schema are applied when rendering well-known values.

use std::fmt;

use crate::value::{RecordValue, Value, VariantBody};

/// What a failed expectation wanted at its position.
#[derive(Debug, Clone, PartialEq)]
pub enum Expectation {
    /// A specific value.
    Value(Value),
    /// A declared expectation with no counterpart in the actual value.
    Present,
    /// An item that should not have been there (extra or forbidden).
    Absent,
    /// A value of a different structural kind.
    Kind(&'static str),
    /// A composite sub-template; detail lives in the nested mismatches.
    Structure(&'static str),
}

impl fmt::Display for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expectation::Value(v) => write!(f, "{}", render_value(v)),
            Expectation::Present => write!(f, "<present>"),
            Expectation::Absent => write!(f, "<absent>"),
            Expectation::Kind(k) => write!(f, "a {} value", k),
            Expectation::Structure(k) => write!(f, "<matching {} template>", k),
        }
    }
}

/// One divergence between a decoded value and a template, with the nested
/// divergences that produced it. Created fresh per failed match call.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    /// Structural position, e.g. `body.identifier` or `opts[tag 3 #1]`.
    pub context: String,
    /// What was found; `None` when the expected item was missing entirely.
    pub observed: Option<Value>,
    pub expected: Expectation,
    pub nested: Vec<Mismatch>,
}

impl Mismatch {
    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        let pad = "  ".repeat(indent);
        let observed = match &self.observed {
            Some(v) => render_value(v),
            None => "<missing>".to_string(),
        };
        writeln!(
            f,
            "{}{}: observed: {} / expected: {}",
            pad, self.context, observed, self.expected
        )?;
        for m in &self.nested {
            m.fmt_indented(f, indent + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

/// Render a full mismatch list the way a test harness would print it.
pub fn render_mismatches(mismatches: &[Mismatch]) -> String {
    mismatches
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join("")
}

fn hex_string(b: &[u8]) -> String {
    b.iter()
        .map(|x| format!("{:02x}", x))
        .collect::<Vec<_>>()
        .join(" ")
}

/// One-line rendering of a value.
pub fn render_value(v: &Value) -> String {
    match v {
        Value::Uint(u) => format!("{}", u.value),
        Value::Bool(b) => format!("{}", b),
        Value::Bytes(b) => format!("hex({})", hex_string(b)),
        Value::Text(s) => format!("{:?}", s),
        Value::Record(r) => {
            let inner = r
                .schema
                .fields
                .iter()
                .zip(&r.fields)
                .map(|(fd, fv)| format!("{}: {}", fd.key, render_field(r, &fd.key, fv)))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{} {{ {} }}", r.schema.name, inner)
        }
        Value::Variant(var) => match &var.body {
            VariantBody::Case { record, .. } => {
                let name = var.case_name().unwrap_or("?");
                format!("{}:{}", name, render_value(&Value::Record(record.clone())))
            }
            VariantBody::Unknown { discriminator, raw } => {
                format!("unknown({:?}, hex({}))", discriminator, hex_string(raw))
            }
        },
        Value::Options(list) => {
            let inner = list
                .items
                .iter()
                .map(|o| render_value(&Value::Record(o.record.clone())))
                .collect::<Vec<_>>()
                .join(", ");
            format!("[{}]", inner)
        }
    }
}

/// Field value with its descriptor's description table applied, e.g.
/// `8 (Echo Request)`.
fn render_field(r: &RecordValue, key: &str, v: &Value) -> String {
    if let (Some(fd), Some(n)) = (r.schema.descriptor(key), v.as_u64()) {
        if let Some(table) = &fd.describe {
            if let Some(name) = table.get(&n) {
                return format!("{} ({})", n, name);
            }
        }
    }
    render_value(v)
}

/// Multi-line indented tree of a decoded record, for dump output.
pub fn describe_record(r: &RecordValue) -> String {
    let mut out = String::new();
    describe_record_into(r, 0, &mut out);
    out
}

fn describe_record_into(r: &RecordValue, indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);
    out.push_str(&format!("{}{} {{\n", pad, r.schema.name));
    for (fd, fv) in r.schema.fields.iter().zip(&r.fields) {
        match fv {
            Value::Record(sub) => {
                out.push_str(&format!("{}  {}:\n", pad, fd.key));
                describe_record_into(sub, indent + 1, out);
            }
            Value::Variant(var) => match &var.body {
                VariantBody::Case { record, .. } => {
                    let name = var.case_name().unwrap_or("?");
                    out.push_str(&format!("{}  {} ({}):\n", pad, fd.key, name));
                    describe_record_into(record, indent + 1, out);
                }
                VariantBody::Unknown { discriminator, raw } => {
                    out.push_str(&format!(
                        "{}  {}: unknown variant {:?}, hex({})\n",
                        pad,
                        fd.key,
                        discriminator,
                        hex_string(raw)
                    ));
                }
            },
            Value::Options(list) if !list.is_empty() => {
                out.push_str(&format!("{}  {}:\n", pad, fd.key));
                for o in &list.items {
                    describe_record_into(&o.record, indent + 2, out);
                }
            }
            other => {
                out.push_str(&format!(
                    "{}  {}: {}\n",
                    pad,
                    fd.key,
                    render_field(r, &fd.key, other)
                ));
            }
        }
    }
    out.push_str(&format!("{}}}\n", pad));
}
