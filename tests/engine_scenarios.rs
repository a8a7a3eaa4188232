//! End-to-end decode → analyze → encode scenarios.
use std::collections::HashSet;

use content_keymap::{
    Analyzer, DecodeError, DescriptorSet, FieldDescriptor, FieldFault, InputKind, JsonDecoder, KeyMap, Rule,
    RuleEntry, RuleTable, Setter, StructuralDecoder, Value, Violation,
};
use once_cell::sync::Lazy;
use proptest::prelude::*;
use rayon::prelude::*;
use serde_json::json;

#[derive(Debug, Default)]
struct Tank {
    name: String,
}

static TANK_RULES: Lazy<RuleTable<Tank>> = Lazy::new(|| {
    RuleTable::new(vec![
        RuleEntry::new("name", InputKind::String, Rule::MustExist).setter(Setter::string(|t: &mut Tank, v| t.name = v)),
    ])
    .expect("tank rules")
});

#[derive(Debug, Default)]
struct Readings {
    values: Vec<f64>,
}

static READING_FIELDS: Lazy<DescriptorSet> = Lazy::new(|| {
    DescriptorSet::new(vec![
        FieldDescriptor::new("readings", 0, InputKind::ArrayObject),
        FieldDescriptor::new("port", 1, InputKind::Integer32),
        FieldDescriptor::new("value", 1, InputKind::Real).omittable(),
    ])
    .expect("reading fields")
});

static READING_RULES: Lazy<RuleTable<Readings>> = Lazy::new(|| {
    RuleTable::new(vec![
        RuleEntry::new("readings", InputKind::ArrayObject, Rule::MustExist),
        RuleEntry::new("value", InputKind::ArrayReal, Rule::MustExist)
            .under("readings")
            .broadcast()
            .setter(Setter::array_real(|r: &mut Readings, v| r.values = v)),
    ])
    .expect("reading rules")
});

fn tank_fields(omittable: bool) -> DescriptorSet {
    let name = FieldDescriptor::new("name", 0, InputKind::String);
    let name = if omittable { name.omittable() } else { name };
    DescriptorSet::new(vec![name]).unwrap()
}

#[test]
fn minimal_object() {
    let content = JsonDecoder::new().decode(r#"{"name": "tank-1"}"#, &tank_fields(false)).unwrap();
    assert_eq!(content.len(), 1);
    let mut tank = Tank::default();
    TANK_RULES.analyze(&content, &mut tank).unwrap();
    assert_eq!(tank.name, "tank-1");
}

#[test]
fn missing_required_field() {
    let decoder = JsonDecoder::new();
    let content = decoder.decode("{}", &tank_fields(true)).unwrap();
    assert!(content.is_empty());
    let err = TANK_RULES.analyze(&content, &mut Tank::default()).unwrap_err();
    assert_eq!(err.key, "name");
    assert!(matches!(err.violation, Violation::Missing));

    let err = decoder.decode("{}", &tank_fields(false)).unwrap_err();
    assert!(matches!(err, DecodeError::Field { ref key, fault: FieldFault::Missing, .. } if key == "name"));
}

#[test]
fn broadcast_with_one_mismatched_element() {
    for missing in 0..3 {
        let readings: Vec<_> = (0..3)
            .map(|i| if i == missing { json!({"port": i}) } else { json!({"port": i, "value": 1.5}) })
            .collect();
        let text = json!({ "readings": readings }).to_string();
        let content = JsonDecoder::new().decode(&text, &READING_FIELDS).unwrap();
        let err = READING_RULES.analyze(&content, &mut Readings::default()).unwrap_err();
        assert_eq!(err.key, "value");
        assert_eq!(err.parent, "readings");
        assert!(matches!(err.violation, Violation::IncompleteBroadcast { index } if index == missing));
    }
}

#[test]
fn fail_fast_reports_the_first_entry() {
    let table = RuleTable::<Tank>::new(vec![
        RuleEntry::new("a", InputKind::Integer32, Rule::MustExist),
        RuleEntry::new("name", InputKind::String, Rule::MustExist),
        RuleEntry::new("c", InputKind::Boolean, Rule::MustEqual(Value::Bool(true))),
    ])
    .unwrap();
    let mut content = KeyMap::new();
    content.set("name", "tank-1");
    content.set("c", false);
    let err = table.analyze(&content, &mut Tank::default()).unwrap_err();
    assert_eq!(err.key, "a");
}

/// Analyzer over a shared static table, the way callers usually wrap one.
struct TankAnalyzer;

impl Analyzer for TankAnalyzer {
    type Target = Tank;
    fn rules(&self) -> &RuleTable<Tank> {
        &TANK_RULES
    }
}

#[test]
fn analyzer_trait_delegates_to_its_table() {
    let content = JsonDecoder::new().decode(r#"{"name": "tank-2"}"#, &tank_fields(false)).unwrap();
    let mut tank = Tank::default();
    TankAnalyzer.analyze(&content, &mut tank).unwrap();
    assert_eq!(tank.name, "tank-2");
    let err = TankAnalyzer.analyze(&KeyMap::new(), &mut tank).unwrap_err();
    assert_eq!(err.key, "name");
}

#[test]
fn kind_strictness() {
    let fields = DescriptorSet::new(vec![FieldDescriptor::new("count", 0, InputKind::Integer32)]).unwrap();
    let err = JsonDecoder::new().decode(r#"{"count": "12"}"#, &fields).unwrap_err();
    assert_eq!(err.key(), "count");
    assert!(matches!(err, DecodeError::Field { fault: FieldFault::Kind { expected: InputKind::Integer32, .. }, .. }));
}

#[test]
fn shared_tables_across_threads() {
    let texts: Vec<String> = (0..64)
        .map(|n| json!({ "readings": [{"port": n, "value": 0.5}, {"port": n + 1, "value": 1.25}] }).to_string())
        .collect();
    let totals: Vec<f64> = texts
        .par_iter()
        .map(|text| {
            let content = JsonDecoder::new().decode(text, &READING_FIELDS).unwrap();
            let mut readings = Readings::default();
            READING_RULES.analyze(&content, &mut readings).unwrap();
            readings.values.iter().sum()
        })
        .collect();
    assert!(totals.iter().all(|t| *t == 1.75));
}

// ---- Properties ----

fn cell() -> impl Strategy<Value = (InputKind, Value)> {
    prop_oneof![
        "[a-zA-Z0-9_ ]{1,16}".prop_map(|s| (InputKind::String, Value::String(s))),
        any::<i32>().prop_map(|n| (InputKind::Integer32, Value::Int32(n))),
        any::<i64>().prop_map(|n| (InputKind::Integer64, Value::Int64(n))),
        any::<bool>().prop_map(|b| (InputKind::Boolean, Value::Bool(b))),
        // quarter steps are exact in binary, so text round-trips are lossless
        (-40_000i32..40_000).prop_map(|k| (InputKind::Real, Value::Real(f64::from(k) / 4.0))),
        prop::collection::vec(any::<i32>(), 0..6).prop_map(|xs| (InputKind::ArrayInteger32, Value::from(xs))),
        prop::collection::vec("[a-z]{1,6}", 0..6).prop_map(|xs| (InputKind::ArrayString, Value::from(xs))),
    ]
}

/// Distinct keys in first-seen order with their descriptors at `depth`.
fn build(cells: Vec<(String, (InputKind, Value))>, depth: usize) -> (Vec<FieldDescriptor>, KeyMap, Vec<String>) {
    let mut seen = HashSet::new();
    let mut fields = Vec::new();
    let mut map = KeyMap::new();
    let mut order = Vec::new();
    for (key, (kind, value)) in cells {
        if !seen.insert(key.clone()) {
            continue;
        }
        fields.push(FieldDescriptor::new(key.clone(), depth, kind));
        map.set(key.clone(), value);
        order.push(key);
    }
    (fields, map, order)
}

proptest! {
    /// Encoding follows the order of the `set` calls.
    #[test]
    fn order_preservation(cells in prop::collection::vec(("[a-z]{1,8}", cell()), 1..24)) {
        let (_, map, order) = build(cells, 0);
        let text = JsonDecoder::new().encode(&map).unwrap();
        let parsed: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&text).unwrap();
        let keys: Vec<&String> = parsed.keys().collect();
        let expected: Vec<&String> = order.iter().collect();
        prop_assert_eq!(keys, expected);
    }

    /// decode(encode(M)) == M, flat and nested one level down.
    #[test]
    fn round_trip(cells in prop::collection::vec(("[a-z]{1,8}", cell()), 1..16)) {
        let decoder = JsonDecoder::new();

        let (fields, map, _) = build(cells.clone(), 0);
        let set = DescriptorSet::new(fields).unwrap();
        let back = decoder.decode(&decoder.encode(&map).unwrap(), &set).unwrap();
        prop_assert!(back.keys().eq(map.keys()));
        prop_assert_eq!(&back, &map);

        let (children, inner, _) = build(cells, 1);
        let mut nested_fields = vec![FieldDescriptor::new("outer", 0, InputKind::Object)];
        nested_fields.extend(children);
        let mut outer = KeyMap::new();
        outer.set_object("outer", inner);
        let set = DescriptorSet::new(nested_fields).unwrap();
        let back = decoder.decode(&decoder.encode(&outer).unwrap(), &set).unwrap();
        prop_assert_eq!(back, outer);
    }

    /// A broadcast MUST_EXIST over K complete elements yields K values in element order.
    #[test]
    fn broadcast_collects_in_element_order(steps in prop::collection::vec(-4_000i32..4_000, 1..12)) {
        let values: Vec<f64> = steps.iter().map(|k| f64::from(*k) / 4.0).collect();
        let readings: Vec<_> = values.iter().enumerate().map(|(i, v)| json!({"port": i, "value": v})).collect();
        let text = json!({ "readings": readings }).to_string();
        let content = JsonDecoder::new().decode(&text, &READING_FIELDS).unwrap();
        let mut out = Readings::default();
        READING_RULES.analyze(&content, &mut out).unwrap();
        prop_assert_eq!(out.values, values);
    }
}
