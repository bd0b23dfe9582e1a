//! Templates: reusable, stateless expectation objects matched against decoded
//! values.
//!
//! A template is built once, independently of any concrete value, and reused
//! across many `match` calls. Structural mismatch is a normal result (false
//! plus a [`Mismatch`] list), never an error; only matching a template against
//! a value of the wrong top-level kind — a programming error in the calling
//! test — is a [`TemplateError`].

use crate::report::{Expectation, Mismatch};
use crate::value::{OptionItem, Value};

/// Top-level template kind does not fit the value it was asked to match.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("{template} template cannot match a value of kind `{found}`")]
    KindMismatch {
        template: &'static str,
        found: &'static str,
    },
}

#[derive(Debug, Clone)]
pub enum Template {
    /// Structural equality against one concrete value.
    Exact(Value),
    /// Per-field expectations; fields absent from the template always pass.
    Record(RecordTemplate),
    /// Ordered option expectations with superset control.
    Options(OptTemplate),
    /// Absence assertion: no option may match any forbidden entry.
    NoOptions(NoOptTemplate),
}

#[derive(Debug, Clone)]
pub struct RecordTemplate {
    pub fields: Vec<(String, Template)>,
}

#[derive(Debug, Clone)]
pub struct OptTemplate {
    /// Expected options in order; the tag selects which actual options the
    /// entry is compared against.
    pub expected: Vec<(u64, Template)>,
    /// Permit extra untemplated instances of templated tags.
    pub superset: bool,
}

#[derive(Debug, Clone)]
pub struct NoOptTemplate {
    pub forbidden: Vec<ForbiddenOption>,
}

/// A forbidden option: by tag alone, or by tag plus a value template.
#[derive(Debug, Clone)]
pub struct ForbiddenOption {
    pub tag: u64,
    pub template: Option<Template>,
}

impl ForbiddenOption {
    /// Forbid every option of this tag, regardless of value.
    pub fn tag(tag: u64) -> Self {
        ForbiddenOption { tag, template: None }
    }

    /// Forbid options of this tag whose value matches the template.
    pub fn matching(tag: u64, template: Template) -> Self {
        ForbiddenOption {
            tag,
            template: Some(template),
        }
    }
}

impl Template {
    pub fn exact(v: Value) -> Template {
        Template::Exact(v)
    }

    pub fn record(fields: Vec<(&str, Template)>) -> Template {
        Template::Record(RecordTemplate {
            fields: fields
                .into_iter()
                .map(|(k, t)| (k.to_string(), t))
                .collect(),
        })
    }

    pub fn options(expected: Vec<(u64, Template)>, superset: bool) -> Template {
        Template::Options(OptTemplate { expected, superset })
    }

    pub fn no_options(forbidden: Vec<ForbiddenOption>) -> Template {
        Template::NoOptions(NoOptTemplate { forbidden })
    }

    /// Match against a decoded value. `Ok(false)` means structural mismatch;
    /// call [`Template::match_into`] to collect the mismatch tree.
    pub fn matches(&self, value: &Value) -> Result<bool, TemplateError> {
        let mut scratch = Vec::new();
        self.match_into(value, &mut scratch)
    }

    /// Match and accumulate mismatches. Matching never mutates the template
    /// and never short-circuits across option tags, so the report is complete.
    pub fn match_into(
        &self,
        value: &Value,
        out: &mut Vec<Mismatch>,
    ) -> Result<bool, TemplateError> {
        match self {
            Template::Exact(_) => {}
            Template::Record(_) => {
                if value.as_record().is_none() {
                    return Err(TemplateError::KindMismatch {
                        template: "record",
                        found: value.kind(),
                    });
                }
            }
            Template::Options(_) => {
                if value.as_options().is_none() {
                    return Err(TemplateError::KindMismatch {
                        template: "options",
                        found: value.kind(),
                    });
                }
            }
            Template::NoOptions(_) => {
                if value.as_options().is_none() {
                    return Err(TemplateError::KindMismatch {
                        template: "no-options",
                        found: value.kind(),
                    });
                }
            }
        }
        Ok(self.match_inner(value, "value", out))
    }

    /// Depth-level matching: below the top level a kind disagreement is data
    /// (e.g. a fallback variant changed the tree shape), so it accumulates as
    /// a mismatch instead of erroring.
    fn match_inner(&self, value: &Value, ctx: &str, out: &mut Vec<Mismatch>) -> bool {
        match self {
            Template::Exact(expected) => {
                if expected == value {
                    true
                } else {
                    out.push(Mismatch {
                        context: ctx.to_string(),
                        observed: Some(value.clone()),
                        expected: Expectation::Value(expected.clone()),
                        nested: Vec::new(),
                    });
                    false
                }
            }
            Template::Record(rt) => self.match_record(rt, value, ctx, out),
            Template::Options(ot) => self.match_options(ot, value, ctx, out),
            Template::NoOptions(nt) => self.match_no_options(nt, value, ctx, out),
        }
    }

    fn match_record(
        &self,
        rt: &RecordTemplate,
        value: &Value,
        ctx: &str,
        out: &mut Vec<Mismatch>,
    ) -> bool {
        let record = match value.as_record() {
            Some(r) => r,
            None => {
                out.push(Mismatch {
                    context: ctx.to_string(),
                    observed: Some(value.clone()),
                    expected: Expectation::Kind("record"),
                    nested: Vec::new(),
                });
                return false;
            }
        };
        let mut ok = true;
        for (key, sub) in &rt.fields {
            let child_ctx = if ctx == "value" {
                key.clone()
            } else {
                format!("{}.{}", ctx, key)
            };
            match record.field(key) {
                Some(fv) => {
                    ok &= sub.match_inner(fv, &child_ctx, out);
                }
                None => {
                    ok = false;
                    out.push(Mismatch {
                        context: child_ctx,
                        observed: None,
                        expected: Expectation::Present,
                        nested: Vec::new(),
                    });
                }
            }
        }
        ok
    }

    fn match_options(
        &self,
        ot: &OptTemplate,
        value: &Value,
        ctx: &str,
        out: &mut Vec<Mismatch>,
    ) -> bool {
        let list = match value.as_options() {
            Some(l) => l,
            None => {
                out.push(Mismatch {
                    context: ctx.to_string(),
                    observed: Some(value.clone()),
                    expected: Expectation::Kind("options"),
                    nested: Vec::new(),
                });
                return false;
            }
        };
        // Partition the template by tag, first-appearance order. Tags never
        // mentioned in the template are outside its concern entirely.
        let mut tags: Vec<u64> = Vec::new();
        for (tag, _) in &ot.expected {
            if !tags.contains(tag) {
                tags.push(*tag);
            }
        }
        let mut ok = true;
        for &tag in &tags {
            let expected: Vec<&Template> = ot
                .expected
                .iter()
                .filter(|(t, _)| *t == tag)
                .map(|(_, tpl)| tpl)
                .collect();
            let actual: Vec<&OptionItem> = list.find_by_tag(tag).collect();
            let n = expected.len().max(actual.len());
            for i in 0..n {
                let child_ctx = format!("{}[tag {} #{}]", ctx, tag, i);
                match (actual.get(i), expected.get(i)) {
                    (Some(item), Some(tpl)) => {
                        ok &= tpl.match_inner(
                            &Value::Record(item.record.clone()),
                            &child_ctx,
                            out,
                        );
                    }
                    // Extra instance of a templated tag: rejected unless the
                    // template was built in superset mode.
                    (Some(item), None) => {
                        if !ot.superset {
                            ok = false;
                            out.push(Mismatch {
                                context: child_ctx,
                                observed: Some(Value::Record(item.record.clone())),
                                expected: Expectation::Absent,
                                nested: Vec::new(),
                            });
                        }
                    }
                    // A declared expectation must be satisfied regardless of
                    // superset mode.
                    (None, Some(_)) => {
                        ok = false;
                        out.push(Mismatch {
                            context: child_ctx,
                            observed: None,
                            expected: Expectation::Present,
                            nested: Vec::new(),
                        });
                    }
                    (None, None) => {}
                }
            }
        }
        ok
    }

    fn match_no_options(
        &self,
        nt: &NoOptTemplate,
        value: &Value,
        ctx: &str,
        out: &mut Vec<Mismatch>,
    ) -> bool {
        let list = match value.as_options() {
            Some(l) => l,
            None => {
                out.push(Mismatch {
                    context: ctx.to_string(),
                    observed: Some(value.clone()),
                    expected: Expectation::Kind("options"),
                    nested: Vec::new(),
                });
                return false;
            }
        };
        for (i, item) in list.items.iter().enumerate() {
            for f in &nt.forbidden {
                if item.tag != f.tag {
                    continue;
                }
                let hit = match &f.template {
                    None => true,
                    Some(tpl) => {
                        let mut scratch = Vec::new();
                        tpl.match_inner(
                            &Value::Record(item.record.clone()),
                            "forbidden",
                            &mut scratch,
                        )
                    }
                };
                if hit {
                    out.push(Mismatch {
                        context: format!("{}[tag {} #{}]", ctx, item.tag, i),
                        observed: Some(Value::Record(item.record.clone())),
                        expected: Expectation::Absent,
                        nested: Vec::new(),
                    });
                    return false;
                }
            }
        }
        true
    }
}
