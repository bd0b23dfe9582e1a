//! Benchmark: compare decode, decode+match, and decode+encode round-trip over
//! a batch of synthetic probe frames (variant header plus an option list).
//! Template matching runs one record template with an option expectation, the
//! shape a conformance suite applies per captured frame.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use wiremodel::{
    Codec, FieldDescriptor, OptionCase, OptionTable, RecordSchema, Template, Value, VariantCase,
    VariantTable,
};

fn probe_schema() -> Arc<RecordSchema> {
    let echo = RecordSchema::define(
        "ProbeEcho",
        vec![
            FieldDescriptor::uint("sequence", 16),
            FieldDescriptor::length_of("opt_len", 8, "opts"),
            FieldDescriptor::options("opts", probe_options()),
        ],
    )
    .expect("echo schema");
    let status = RecordSchema::define(
        "ProbeStatus",
        vec![FieldDescriptor::uint("load", 32)],
    )
    .expect("status schema");
    let body = VariantTable::define(
        "ProbeBody",
        &["kind"],
        vec![
            VariantCase::new("Echo", &[1], echo),
            VariantCase::new("Status", &[2], status),
        ],
    )
    .expect("body table");
    RecordSchema::define(
        "Probe",
        vec![
            FieldDescriptor::uint("kind", 8),
            FieldDescriptor::uint("checksum", 16),
            FieldDescriptor::variant("body", body),
        ],
    )
    .expect("probe schema")
}

fn probe_options() -> Arc<OptionTable> {
    let deadline = RecordSchema::define(
        "DeadlineOption",
        vec![
            FieldDescriptor::uint("tag", 8),
            FieldDescriptor::uint("millis", 16),
        ],
    )
    .expect("deadline option");
    let label = RecordSchema::define(
        "LabelOption",
        vec![
            FieldDescriptor::uint("tag", 8),
            FieldDescriptor::length_of("len", 8, "text"),
            FieldDescriptor::text("text"),
        ],
    )
    .expect("label option");
    OptionTable::define(
        "ProbeOptions",
        8,
        vec![
            OptionCase::new("Deadline", 1, deadline),
            OptionCase::new("Label", 2, label),
        ],
        None,
        None,
    )
    .expect("option table")
}

fn frames(count: usize) -> Vec<Vec<u8>> {
    (0..count)
        .map(|i| {
            let seq = (i as u16).to_be_bytes();
            let millis = (100 + i as u16 % 400).to_be_bytes();
            let mut frame = vec![0x01, 0xab, 0xcd, seq[0], seq[1], 0x08];
            frame.extend_from_slice(&[0x01, millis[0], millis[1]]);
            frame.extend_from_slice(&[0x02, 0x03]);
            frame.extend_from_slice(b"net");
            frame
        })
        .collect()
}

fn bench_codec(c: &mut Criterion) {
    let schema = probe_schema();
    let codec = Codec::default();
    let batch = frames(256);
    let template = Template::record(vec![
        ("kind", Template::exact(Value::u8(1))),
        (
            "opts",
            Template::options(
                vec![(2, Template::record(vec![("text", Template::exact(Value::text("net")))]))],
                true,
            ),
        ),
    ]);

    c.bench_function("decode_256", |b| {
        b.iter(|| {
            for f in &batch {
                black_box(codec.decode(&schema, f).expect("decode"));
            }
        })
    });

    c.bench_function("decode_match_256", |b| {
        b.iter(|| {
            for f in &batch {
                let record = codec.decode(&schema, f).expect("decode");
                let ok = template
                    .matches(&Value::Record(record))
                    .expect("record template");
                black_box(ok);
            }
        })
    });

    c.bench_function("decode_encode_256", |b| {
        b.iter(|| {
            for f in &batch {
                let record = codec.decode(&schema, f).expect("decode");
                black_box(codec.encode_record(&record).expect("encode"));
            }
        })
    });
}

criterion_group!(benches, bench_codec);
criterion_main!(benches);
