//! Template matching tests: exact values, record don't-care semantics, the
//! option-list algebra (ordering, superset, accumulation), absence assertions,
//! and mismatch reporting.

use std::sync::Arc;

use wiremodel::{
    Codec, FieldDescriptor, ForbiddenOption, OptionCase, OptionItem, OptionListValue,
    OptionTable, RecordSchema, RecordValue, Template, TemplateError, Value, VariantCase,
    VariantTable,
};

fn stamp_schema() -> Arc<RecordSchema> {
    RecordSchema::define(
        "StampOption",
        vec![
            FieldDescriptor::uint("tag", 8),
            FieldDescriptor::uint("value", 16),
        ],
    )
    .expect("stamp schema")
}

fn flag_schema() -> Arc<RecordSchema> {
    RecordSchema::define("FlagOption", vec![FieldDescriptor::uint("tag", 8)])
        .expect("flag schema")
}

fn opts_table() -> Arc<OptionTable> {
    OptionTable::define(
        "TestOptions",
        8,
        vec![
            OptionCase::new("Stamp", 3, stamp_schema()),
            OptionCase::new("Flag", 5, flag_schema()),
        ],
        None,
        None,
    )
    .expect("option table")
}

fn stamp(value: u16) -> OptionItem {
    OptionItem {
        tag: 3,
        record: RecordValue {
            schema: stamp_schema(),
            fields: vec![Value::u8(3), Value::u16(value)],
        },
    }
}

fn flag() -> OptionItem {
    OptionItem {
        tag: 5,
        record: RecordValue {
            schema: flag_schema(),
            fields: vec![Value::u8(5)],
        },
    }
}

fn opts_value(table: &Arc<OptionTable>, items: Vec<OptionItem>) -> Value {
    Value::Options(OptionListValue {
        table: Arc::clone(table),
        items,
    })
}

fn stamp_tpl(value: u16) -> Template {
    Template::record(vec![("value", Template::exact(Value::u16(value)))])
}

// ==================== Exact ====================

#[test]
fn exact_match_primitive() {
    let t = Template::exact(Value::u16(42));
    assert!(t.matches(&Value::u16(42)).expect("match"));
    assert!(!t.matches(&Value::u16(41)).expect("match"));
}

#[test]
fn exact_equality_ignores_width_not_kind() {
    // Same numeric value in different declared widths is equal;
    // a different kind never is.
    let t = Template::exact(Value::u8(7));
    assert!(t.matches(&Value::u32(7)).expect("match"));
    assert!(!t.matches(&Value::Bool(true)).expect("match"));
}

#[test]
fn exact_mismatch_reports_pair() {
    let t = Template::exact(Value::u8(1));
    let mut out = Vec::new();
    assert!(!t.match_into(&Value::u8(2), &mut out).expect("match"));
    assert_eq!(out.len(), 1);
    let rendered = out[0].to_string();
    assert!(rendered.contains("observed: 2"), "{}", rendered);
    assert!(rendered.contains("expected: 1"), "{}", rendered);
}

// ==================== Record templates ====================

#[test]
fn record_template_absent_fields_are_dont_care() {
    let schema = RecordSchema::define(
        "Msg",
        vec![
            FieldDescriptor::uint("kind", 8),
            FieldDescriptor::uint("seq", 16),
        ],
    )
    .expect("schema");
    let codec = Codec::default();
    let record = codec.decode(&schema, &[1, 0, 9]).expect("decode");
    let t = Template::record(vec![("kind", Template::exact(Value::u8(1)))]);
    assert!(t.matches(&Value::Record(record)).expect("match"));
}

#[test]
fn record_template_missing_field_is_mismatch() {
    let schema = RecordSchema::define("Msg", vec![FieldDescriptor::uint("kind", 8)])
        .expect("schema");
    let codec = Codec::default();
    let record = codec.decode(&schema, &[1]).expect("decode");
    let t = Template::record(vec![("seq", Template::exact(Value::u16(1)))]);
    let mut out = Vec::new();
    assert!(!t.match_into(&Value::Record(record), &mut out).expect("match"));
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].context, "seq");
    assert!(out[0].observed.is_none());
}

#[test]
fn record_template_delegates_into_variant_case() {
    let echo = RecordSchema::define(
        "Echo",
        vec![FieldDescriptor::uint("identifier", 16)],
    )
    .expect("echo schema");
    let body = VariantTable::define("Body", &["kind"], vec![VariantCase::new("Echo", &[1], echo)])
        .expect("body table");
    let schema = RecordSchema::define(
        "Msg",
        vec![
            FieldDescriptor::uint("kind", 8),
            FieldDescriptor::variant("body", body),
        ],
    )
    .expect("schema");
    let codec = Codec::default();
    let record = codec.decode(&schema, &[1, 0, 42]).expect("decode");
    let t = Template::record(vec![("identifier", Template::exact(Value::u16(42)))]);
    assert!(t.matches(&Value::Record(record)).expect("match"));
}

// ==================== Option templates ====================

#[test]
fn opt_rejects_extra_instance_of_templated_tag() {
    let table = opts_table();
    let actual = opts_value(&table, vec![stamp(1), stamp(2)]);

    let strict = Template::options(vec![(3, stamp_tpl(1))], false);
    assert!(!strict.matches(&actual).expect("match"));

    let superset = Template::options(vec![(3, stamp_tpl(1))], true);
    assert!(superset.matches(&actual).expect("match"));
}

#[test]
fn opt_declared_expectation_must_be_satisfied() {
    let table = opts_table();
    let actual = opts_value(&table, vec![stamp(1)]);
    for superset in [false, true] {
        let t = Template::options(vec![(3, stamp_tpl(1)), (3, stamp_tpl(2))], superset);
        let mut out = Vec::new();
        assert!(!t.match_into(&actual, &mut out).expect("match"));
        assert!(out.iter().any(|m| m.observed.is_none()), "missing entry reported");
    }
}

#[test]
fn opt_zips_same_tag_instances_in_order() {
    let table = opts_table();
    let actual = opts_value(&table, vec![stamp(1), stamp(2)]);

    let in_order = Template::options(vec![(3, stamp_tpl(1)), (3, stamp_tpl(2))], false);
    assert!(in_order.matches(&actual).expect("match"));

    let reversed = Template::options(vec![(3, stamp_tpl(2)), (3, stamp_tpl(1))], false);
    let mut out = Vec::new();
    assert!(!reversed.match_into(&actual, &mut out).expect("match"));
    assert_eq!(out.len(), 2);
}

#[test]
fn opt_untemplated_tags_are_ignored() {
    let table = opts_table();
    let actual = opts_value(&table, vec![stamp(1), flag()]);
    // Tag 5 never mentioned: outside the template's concern even without superset.
    let t = Template::options(vec![(3, stamp_tpl(1))], false);
    assert!(t.matches(&actual).expect("match"));
}

#[test]
fn opt_accumulates_across_tags_without_short_circuit() {
    let table = opts_table();
    let actual = opts_value(&table, vec![stamp(1), flag()]);
    let t = Template::options(
        vec![
            (3, stamp_tpl(9)),
            (5, Template::record(vec![("tag", Template::exact(Value::u8(6)))])),
        ],
        false,
    );
    let mut out = Vec::new();
    assert!(!t.match_into(&actual, &mut out).expect("match"));
    assert!(out.iter().any(|m| m.context.contains("tag 3")), "tag 3 reported");
    assert!(out.iter().any(|m| m.context.contains("tag 5")), "tag 5 reported");
}

#[test]
fn opt_empty_template_matches_anything() {
    let table = opts_table();
    let actual = opts_value(&table, vec![stamp(1), flag()]);
    let t = Template::options(vec![], false);
    assert!(t.matches(&actual).expect("match"));
}

// ==================== Absence templates ====================

#[test]
fn noopt_forbidden_tag_fails_regardless_of_value() {
    let table = opts_table();
    let t = Template::no_options(vec![ForbiddenOption::tag(5)]);

    let clean = opts_value(&table, vec![stamp(1)]);
    assert!(t.matches(&clean).expect("match"));

    let dirty = opts_value(&table, vec![stamp(1), flag()]);
    let mut out = Vec::new();
    assert!(!t.match_into(&dirty, &mut out).expect("match"));
    assert_eq!(out.len(), 1);
    assert!(out[0].context.contains("tag 5"), "{}", out[0].context);
}

#[test]
fn noopt_forbidden_template_only_hits_matching_values() {
    let table = opts_table();
    let t = Template::no_options(vec![ForbiddenOption::matching(3, stamp_tpl(1))]);

    let ok = opts_value(&table, vec![stamp(2)]);
    assert!(t.matches(&ok).expect("match"));

    let bad = opts_value(&table, vec![stamp(1)]);
    assert!(!t.matches(&bad).expect("match"));
}

// ==================== Kind errors ====================

#[test]
fn template_kind_mismatch_is_an_error_not_a_mismatch() {
    let t = Template::options(vec![], false);
    let err = t.matches(&Value::u8(1)).unwrap_err();
    assert!(matches!(err, TemplateError::KindMismatch { .. }));

    let t = Template::record(vec![]);
    let table = opts_table();
    let err = t.matches(&opts_value(&table, vec![])).unwrap_err();
    assert!(matches!(err, TemplateError::KindMismatch { .. }));
}

#[test]
fn matching_does_not_mutate_template_across_calls() {
    let table = opts_table();
    let t = Template::options(vec![(3, stamp_tpl(1))], false);
    let good = opts_value(&table, vec![stamp(1)]);
    let bad = opts_value(&table, vec![stamp(2)]);
    for _ in 0..3 {
        assert!(t.matches(&good).expect("match"));
        assert!(!t.matches(&bad).expect("match"));
    }
}
