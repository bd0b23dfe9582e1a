//! Decoder fuzz target: feed arbitrary bytes to a variant+options layout.
//! The decoder must not panic; every successful decode must re-encode.
//! Build with: cargo fuzz run decode_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
fn schema() -> &'static std::sync::Arc<wiremodel::RecordSchema> {
    use wiremodel::{FieldDescriptor, OptionCase, OptionTable, RecordSchema, VariantCase, VariantTable};

    static SCHEMA: std::sync::OnceLock<std::sync::Arc<RecordSchema>> = std::sync::OnceLock::new();
    SCHEMA.get_or_init(|| {
        let pad = RecordSchema::define("Pad", vec![FieldDescriptor::uint("tag", 8)])
            .expect("pad option");
        let data = RecordSchema::define(
            "Data",
            vec![
                FieldDescriptor::uint("tag", 8),
                FieldDescriptor::length_of("len", 8, "body"),
                FieldDescriptor::bytes("body"),
            ],
        )
        .expect("data option");
        let raw = RecordSchema::define(
            "Raw",
            vec![
                FieldDescriptor::uint("tag", 8),
                FieldDescriptor::length_of("len", 8, "body"),
                FieldDescriptor::bytes("body"),
            ],
        )
        .expect("raw option");
        let opts = OptionTable::define(
            "Opts",
            8,
            vec![OptionCase::new("Pad", 0, pad), OptionCase::new("Data", 1, data)],
            Some(0),
            Some(raw),
        )
        .expect("option table");
        let echo = RecordSchema::define(
            "Echo",
            vec![
                FieldDescriptor::uint("sequence", 16),
                FieldDescriptor::options("opts", opts),
            ],
        )
        .expect("echo schema");
        let body = VariantTable::define("Body", &["kind"], vec![VariantCase::new("Echo", &[1], echo)])
            .expect("body table");
        RecordSchema::define(
            "Frame",
            vec![
                FieldDescriptor::uint("kind", 8),
                FieldDescriptor::variant("body", body),
            ],
        )
        .expect("frame schema")
    })
}

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    use wiremodel::{Codec, Endianness, VariantPolicy};

    let schema = schema();
    for policy in [VariantPolicy::Fallback, VariantPolicy::Strict] {
        let codec = Codec::new(Endianness::Big, policy);
        if let Ok(record) = codec.decode(schema, data) {
            codec.encode_record(&record).expect("decoded record must re-encode");
        }
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run decode_fuzz");
}
