//! Integration tests for the value codec working against a sink
//!
//! Values are read through [`PropertySink`], decomposed, adjusted and written back.

use cadence_core::{
    CssCodec, Decomposed, MemorySink, PropertyKind, PropertySink, RawValue, TargetId, UnitConverter,
    ValueCodec, ValueKind,
};

const EL: TargetId = TargetId(7);

#[test]
fn test_unit_value_halfway_recomposes_with_unit() {
    let from = CssCodec.decompose(&RawValue::from("10px")).unwrap();
    let to = CssCodec.decompose(&RawValue::from("20px")).unwrap();
    assert_eq!(from.kind, ValueKind::Unit);

    let mid = Decomposed {
        number: from.number + (to.number - from.number) * 0.5,
        ..from
    };
    assert_eq!(CssCodec.recompose(&mid), RawValue::from("15px"));
}

#[test]
fn test_read_modify_write_through_the_sink() {
    let mut sink = MemorySink::new().with(EL, "color", PropertyKind::Style, "#ff0000");
    let kind = sink.resolve(EL, "color").unwrap();
    let raw = sink.read(EL, "color", kind).unwrap();
    let mut value = CssCodec.decompose(&raw).unwrap();
    assert_eq!(value.kind, ValueKind::Color);
    value.numbers[2] = 255.0;
    sink.write(EL, "color", kind, CssCodec.recompose(&value));
    assert_eq!(sink.get(EL, "color"), Some(&RawValue::from("rgba(255,0,255,1)")));
    assert_eq!(sink.write_count(EL, "color"), 1);
}

#[test]
fn test_measured_units_convert_through_the_sink() {
    let mut sink = MemorySink::new().with(EL, "width", PropertyKind::Style, "2em");
    sink.set_unit_scale("em", 16.0);
    let mut units = UnitConverter::new();
    let px = units.convert(&sink, EL, "width", 2.0, "em", "px");
    assert_eq!(px, 32.0);
    let back = units.convert(&sink, EL, "width", 32.0, "px", "em");
    assert_eq!(back, 2.0);
    assert_eq!(units.cached_pairs(), 2);
}
