//! render_json.rs: report JSON renderer
//! Sections: cover → placement → offerings → ranks → fallback_causes → unallottable → integrity.
//!
//! The renderer only reshapes the model; formatting (percent strings, engine
//! label) is prepared by the mappers. Key order inside objects follows
//! `serde_json::Map` (sorted), which is what the canonical writer emits anyway.

use serde_json::{Map as JsonMap, Value};

use crate::{Cover, FooterIntegrity, OfferingFill, Placement, RankRow, ReportModel, UnallottableRow};

/// Build the top-level report object.
pub fn render_report_json(m: &ReportModel) -> Value {
    let mut root = obj();
    root.insert("cover".into(), cover_json(&m.cover));
    root.insert("placement".into(), placement_json(&m.placement));
    root.insert("offerings".into(), Value::Array(m.offerings.iter().map(offering_json).collect()));
    root.insert("ranks".into(), Value::Array(m.ranks.iter().map(rank_json).collect()));
    root.insert(
        "fallback_causes".into(),
        Value::Object(
            m.fallback_causes
                .iter()
                .map(|(k, v)| (k.clone(), Value::from(*v)))
                .collect(),
        ),
    );
    root.insert(
        "unallottable".into(),
        Value::Array(m.unallottable.iter().map(unallottable_json).collect()),
    );
    root.insert("integrity".into(), integrity_json(&m.footer));
    Value::Object(root)
}

/* ----------------------------------- sections ----------------------------------- */

fn cover_json(c: &Cover) -> Value {
    let mut o = obj();
    o.insert("title".into(), Value::String(format!("Elective allotment: {}", c.subject_id)));
    o.insert("subject_id".into(), Value::String(c.subject_id.clone()));
    o.insert("mode".into(), Value::String(c.mode.clone()));
    put_opt_str(&mut o, "timestamp_utc", c.timestamp_utc.as_deref());
    put_opt_str(&mut o, "engine", c.engine.as_deref());

    let mut params = obj();
    if let Some(n) = c.max_preferences {
        params.insert("max_preferences".into(), Value::from(n));
    }
    put_opt_str(&mut params, "fallback", c.fallback_policy.as_deref());
    if !params.is_empty() {
        o.insert("params".into(), Value::Object(params));
    }
    Value::Object(o)
}

fn placement_json(p: &Placement) -> Value {
    let mut o = obj();
    o.insert("students".into(), Value::from(p.students));
    o.insert("by_preference".into(), Value::from(p.by_preference));
    o.insert("by_fallback".into(), Value::from(p.by_fallback));
    o.insert("unallottable".into(), Value::from(p.unallottable));
    o.insert("preference_rate".into(), Value::String(p.preference_rate.clone()));
    o.insert("seats_remaining".into(), Value::from(p.seats_remaining));
    Value::Object(o)
}

fn offering_json(f: &OfferingFill) -> Value {
    let mut o = obj();
    o.insert("kind".into(), Value::String(f.kind.clone()));
    o.insert("id".into(), Value::String(f.id.clone()));
    o.insert("total_seats".into(), Value::from(f.total_seats));
    o.insert("remaining_seats".into(), Value::from(f.remaining_seats));
    o.insert("committed".into(), Value::from(f.committed));
    o.insert("allotted_this_run".into(), Value::from(f.allotted_this_run));
    o.insert("fill".into(), Value::String(f.fill.clone()));
    Value::Object(o)
}

fn rank_json(r: &RankRow) -> Value {
    let mut o = obj();
    o.insert("rank".into(), Value::from(r.rank));
    o.insert("count".into(), Value::from(r.count));
    o.insert("share".into(), Value::String(r.share.clone()));
    Value::Object(o)
}

fn unallottable_json(u: &UnallottableRow) -> Value {
    let mut o = obj();
    o.insert("student_id".into(), Value::String(u.student_id.clone()));
    o.insert("registration_number".into(), Value::String(u.registration_number.clone()));
    o.insert("reason".into(), Value::String(u.reason.clone()));
    put_opt_str(&mut o, "cause", u.cause.as_deref());
    Value::Object(o)
}

fn integrity_json(f: &FooterIntegrity) -> Value {
    let mut o = obj();
    o.insert("result_id".into(), Value::String(f.result_id.clone()));
    put_opt_str(&mut o, "run_id", f.run_id.as_deref());
    if !f.inputs.is_empty() {
        o.insert(
            "inputs".into(),
            Value::Object(f.inputs.iter().map(|(k, v)| (k.clone(), Value::String(v.clone()))).collect()),
        );
    }
    Value::Object(o)
}

/* ----------------------------------- helpers ----------------------------------- */

#[inline]
fn obj() -> JsonMap<String, Value> {
    JsonMap::new()
}

fn put_opt_str(o: &mut JsonMap<String, Value>, key: &str, v: Option<&str>) {
    if let Some(s) = v.filter(|s| !s.is_empty()) {
        o.insert(key.into(), Value::String(s.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_report_model;
    use crate::tests::{sample_result, sample_run};
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    #[test]
    fn renders_all_sections() {
        let v = render_report_json(&build_report_model(&sample_result(), Some(&sample_run())));
        let keys: Vec<&String> = v.as_object().unwrap().keys().collect();
        for k in ["cover", "placement", "offerings", "ranks", "fallback_causes", "unallottable", "integrity"] {
            assert!(keys.iter().any(|x| x.as_str() == k), "missing section {k}");
        }
        assert_json_eq!(
            v["cover"],
            json!({
                "title": "Elective allotment: OE-1",
                "subject_id": "OE-1",
                "mode": "full",
                "timestamp_utc": "2026-01-15T09:30:00Z",
                "engine": "ea-engine 0.1.0 (dev)",
                "params": {"max_preferences": 3, "fallback": "least_filled"}
            })
        );
        assert_json_eq!(
            v["unallottable"],
            json!([{"student_id":"s3","registration_number":"3","reason":"no_capacity","cause":"no_submission"}])
        );
    }

    #[test]
    fn optional_fields_are_omitted() {
        let v = render_report_json(&build_report_model(&sample_result(), None));
        assert!(v["cover"].get("timestamp_utc").is_none());
        assert!(v["integrity"].get("run_id").is_none());
        assert!(v["integrity"].get("inputs").is_none());
    }
}
