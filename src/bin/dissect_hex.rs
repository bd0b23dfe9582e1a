//! Decode hex-encoded bytes against a sample ICMP layout and dump the tree.
//!
//! Usage: `dissect_hex "08 00 f7 ff 00 01 00 01"` or pipe hex on stdin.
//! The ICMP tables here are demo input for the engine, not part of it.

use std::io::Read;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use wiremodel::{
    describe_record, recognize, Codec, FieldDescriptor, RecordSchema, VariantCase, VariantTable,
};

fn icmp_schema() -> Result<Arc<RecordSchema>> {
    let echo = RecordSchema::define(
        "IcmpEcho",
        vec![
            FieldDescriptor::uint("identifier", 16),
            FieldDescriptor::uint("sequence", 16),
            FieldDescriptor::bytes("payload"),
        ],
    )?;
    let unreachable = RecordSchema::define(
        "IcmpDestinationUnreachable",
        vec![
            FieldDescriptor::uint("unused", 32),
            FieldDescriptor::bytes("original_datagram"),
        ],
    )?;
    let body = VariantTable::define(
        "IcmpBody",
        &["type"],
        vec![
            VariantCase::new("EchoReply", &[0], Arc::clone(&echo)),
            VariantCase::new("DestinationUnreachable", &[3], unreachable),
            VariantCase::new("EchoRequest", &[8], echo),
        ],
    )?;
    let schema = RecordSchema::define(
        "Icmp",
        vec![
            FieldDescriptor::uint("type", 8).with_describe(&[
                (0, "Echo Reply"),
                (3, "Destination Unreachable"),
                (8, "Echo Request"),
            ]),
            FieldDescriptor::uint("code", 8),
            FieldDescriptor::uint("checksum", 16),
            FieldDescriptor::variant("body", body),
        ],
    )?;
    Ok(schema)
}

fn parse_hex(s: &str) -> Result<Vec<u8>> {
    let cleaned: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.len() % 2 != 0 {
        bail!("odd number of hex digits");
    }
    (0..cleaned.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&cleaned[i..i + 2], 16)
                .with_context(|| format!("bad hex at offset {}", i))
        })
        .collect()
}

fn main() -> Result<()> {
    let input = match std::env::args().nth(1) {
        Some(arg) => arg,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading stdin")?;
            buf
        }
    };
    let bytes = parse_hex(&input)?;
    let schema = icmp_schema()?;
    let codec = Codec::default();
    let record = recognize(&codec, &schema, &bytes)?;
    print!("{}", describe_record(&record));
    let encoded = codec.encode_record(&record)?;
    println!(
        "re-encoded: {} bytes ({} bits)",
        encoded.bytes.len(),
        encoded.bit_len
    );
    Ok(())
}
