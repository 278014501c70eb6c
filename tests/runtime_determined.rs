mod common;

use common::{arm64_context, define, placeholder, render_instance, x64_context};
use expect_test::expect;
use shared_layout::layout::{
    ConcreteFieldLayoutAlgorithm, FieldLayoutAlgorithm, InstanceLayoutKind,
    RuntimeDeterminedFieldLayoutAlgorithm, StaticLayoutKind, ValueTypeShapeCharacteristics,
    layout_algorithm_for,
};
use shared_layout::type_system::{
    DefType, FieldDesc, LayoutKind, PrimitiveType, TypeCategory,
};
use shared_layout::{Error, LayoutOperation, TypeId, TypeSystemContext};

/// `struct C { long a; double b; }` plus a placeholder over it.
fn pair_of_wide_scalars(ctx: &mut TypeSystemContext) -> (TypeId, TypeId) {
    let long = ctx.primitive(PrimitiveType::I64);
    let double = ctx.primitive(PrimitiveType::F64);
    let canonical = define(
        ctx,
        "C<__Canon>",
        DefType::value_type()
            .with_field(FieldDesc::instance("a", long))
            .with_field(FieldDesc::instance("b", double)),
    );
    let rd = placeholder(ctx, "C<T>", canonical);
    (canonical, rd)
}

fn assert_unsupported(err: &Error, expected: LayoutOperation, type_name: &str) {
    match err {
        Error::UnsupportedOperation {
            operation,
            type_name: actual,
        } => {
            assert_eq!(*operation, expected);
            assert_eq!(actual, type_name);
        }
        other => panic!("expected unsupported {expected}, got {other}"),
    }
}

#[test]
fn placeholder_reports_canonical_size_without_offsets() {
    let mut ctx = x64_context();
    let (canonical, rd) = pair_of_wide_scalars(&mut ctx);

    let full = ctx
        .instance_layout(canonical, InstanceLayoutKind::WithOffsets)
        .unwrap_or_else(|err| panic!("canonical layout: {err}"));
    expect![[r#"
        size=16 align=8 field_size=16 field_align=8 abi_stable=true
          a @ 0
          b @ 8
    "#]]
    .assert_eq(&render_instance(&ctx, &full));

    let shared = ctx
        .instance_layout(rd, InstanceLayoutKind::TypeOnly)
        .unwrap_or_else(|err| panic!("placeholder layout: {err}"));
    expect![[r#"
        size=16 align=8 field_size=16 field_align=8 abi_stable=true
    "#]]
    .assert_eq(&render_instance(&ctx, &shared));

    assert_eq!(ctx.contains_gc_pointers(rd).ok(), Some(false));
    assert_eq!(ctx.contains_byrefs(rd).ok(), Some(false));
    assert_eq!(ctx.instance_byte_count(rd).ok(), Some(16));
}

#[test]
fn type_only_layout_equals_canonical_for_every_declaration_style() {
    let mut ctx = x64_context();
    let int = ctx.primitive(PrimitiveType::I32);
    let byte = ctx.primitive(PrimitiveType::U8);
    let object = define(&mut ctx, "object", DefType::reference_type());

    let styles = [
        (
            "Auto<__Canon>",
            DefType::value_type()
                .with_layout(LayoutKind::Auto)
                .with_field(FieldDesc::instance("flag", byte))
                .with_field(FieldDesc::instance("target", object))
                .with_field(FieldDesc::instance("count", int)),
        ),
        (
            "Explicit<__Canon>",
            DefType::value_type()
                .with_layout(LayoutKind::Explicit)
                .with_field(FieldDesc::instance("low", int).at_offset(0))
                .with_field(FieldDesc::instance("high", int).at_offset(2)),
        ),
        (
            "Packed<__Canon>",
            DefType::value_type()
                .with_packing(1)
                .with_field(FieldDesc::instance("tag", byte))
                .with_field(FieldDesc::instance("value", int)),
        ),
        (
            "Node<__Canon>",
            DefType::reference_type()
                .with_base(object)
                .with_field(FieldDesc::instance("next", object))
                .with_field(FieldDesc::instance("depth", int)),
        ),
    ];

    for (name, def) in styles {
        let canonical = define(&mut ctx, name, def);
        let rd = placeholder(&mut ctx, &format!("{name}#shared"), canonical);
        let expected = ctx
            .instance_layout(canonical, InstanceLayoutKind::WithOffsets)
            .unwrap_or_else(|err| panic!("{name}: {err}"));
        let actual = ctx
            .instance_layout(rd, InstanceLayoutKind::TypeOnly)
            .unwrap_or_else(|err| panic!("{name} placeholder: {err}"));

        assert!(actual.offsets.is_empty(), "{name} leaked offsets");
        assert_eq!(actual.byte_count_unaligned, expected.byte_count_unaligned, "{name}");
        assert_eq!(actual.byte_count_alignment, expected.byte_count_alignment, "{name}");
        assert_eq!(actual.field_alignment, expected.field_alignment, "{name}");
        assert_eq!(actual.field_size, expected.field_size, "{name}");
        assert_eq!(actual.layout_abi_stable, expected.layout_abi_stable, "{name}");
        assert_eq!(actual.shape_identity(), expected.shape_identity(), "{name}");
    }
}

#[test]
fn offsets_are_refused() {
    let mut ctx = x64_context();
    let (_, rd) = pair_of_wide_scalars(&mut ctx);
    let err = ctx
        .instance_layout(rd, InstanceLayoutKind::WithOffsets)
        .expect_err("offsets must not be exposed");
    assert_unsupported(&err, LayoutOperation::InstanceFieldOffsets, "C<T>");
    assert!(err.is_unsupported());
    assert_eq!(
        err.to_string(),
        "unsupported operation: instance field offsets for `C<T>`"
    );
}

#[test]
fn static_layout_is_refused_even_without_statics() {
    let mut ctx = x64_context();
    let int = ctx.primitive(PrimitiveType::I32);
    let with_statics = define(
        &mut ctx,
        "Counter<__Canon>",
        DefType::reference_type().with_field(FieldDesc::static_field("hits", int)),
    );
    let rd_with = placeholder(&mut ctx, "Counter<T>", with_statics);
    let (_, rd_without) = pair_of_wide_scalars(&mut ctx);

    for (rd, name) in [(rd_with, "Counter<T>"), (rd_without, "C<T>")] {
        for kind in [
            StaticLayoutKind::RegionSizes,
            StaticLayoutKind::RegionSizesAndFields,
        ] {
            let err = ctx
                .static_field_layout(rd, kind)
                .expect_err("static layout must not be exposed");
            assert_unsupported(&err, LayoutOperation::StaticFieldLayout, name);
        }
    }

    // The canonical type itself still answers.
    let statics = ctx
        .static_field_layout(with_statics, StaticLayoutKind::RegionSizes)
        .unwrap_or_else(|err| panic!("canonical statics: {err}"));
    assert_eq!(statics.non_gc_statics.size, 4);
}

#[test]
fn reference_and_byref_facts_follow_the_canonical_type() {
    let mut ctx = x64_context();
    let int = ctx.primitive(PrimitiveType::I32);
    let byref = ctx.byref_type();
    let object = define(&mut ctx, "object", DefType::reference_type());

    let holder = define(
        &mut ctx,
        "Holder<__Canon>",
        DefType::value_type()
            .with_field(FieldDesc::instance("item", object))
            .with_field(FieldDesc::instance("count", int)),
    );
    let span = define(
        &mut ctx,
        "Span<__Canon>",
        DefType::value_type()
            .byref_like()
            .with_field(FieldDesc::instance("reference", byref))
            .with_field(FieldDesc::instance("length", int)),
    );
    let holder_rd = placeholder(&mut ctx, "Holder<T>", holder);
    let span_rd = placeholder(&mut ctx, "Span<T>", span);

    assert_eq!(ctx.contains_gc_pointers(holder_rd).ok(), Some(true));
    assert_eq!(ctx.contains_byrefs(holder_rd).ok(), Some(false));
    assert_eq!(ctx.contains_gc_pointers(span_rd).ok(), Some(false));
    assert_eq!(ctx.contains_byrefs(span_rd).ok(), Some(true));
    assert!(ctx.is_byref_like(span_rd));
    assert_eq!(
        ctx.instance_field_size(span_rd).ok(),
        ctx.instance_field_size(span).ok()
    );
}

#[test]
fn aggregate_shape_follows_the_canonical_type() {
    let mut arm = arm64_context();
    let float = arm.primitive(PrimitiveType::F32);
    let vector = define(
        &mut arm,
        "Vector3<__Canon>",
        DefType::value_type()
            .with_field(FieldDesc::instance("x", float))
            .with_field(FieldDesc::instance("y", float))
            .with_field(FieldDesc::instance("z", float)),
    );
    let rd = placeholder(&mut arm, "Vector3<T>", vector);
    let shape = arm
        .value_type_shape_characteristics(rd)
        .unwrap_or_else(|err| panic!("shape: {err}"));
    assert_eq!(shape, ValueTypeShapeCharacteristics::HOMOGENOUS_FLOAT_AGGREGATE);
    assert_eq!(arm.value_type_shape_characteristics(vector).ok(), Some(shape));

    let mut x64 = x64_context();
    let float = x64.primitive(PrimitiveType::F32);
    let vector = define(
        &mut x64,
        "Vector3<__Canon>",
        DefType::value_type()
            .with_field(FieldDesc::instance("x", float))
            .with_field(FieldDesc::instance("y", float))
            .with_field(FieldDesc::instance("z", float)),
    );
    let rd = placeholder(&mut x64, "Vector3<T>", vector);
    assert_eq!(
        x64.value_type_shape_characteristics(rd).ok(),
        Some(ValueTypeShapeCharacteristics::NONE)
    );
}

#[test]
fn unsafe_value_type_follows_the_canonical_type() {
    let mut ctx = x64_context();
    let byte = ctx.primitive(PrimitiveType::U8);
    let buffer = define(
        &mut ctx,
        "Buffer<__Canon>",
        DefType::value_type()
            .marked_unsafe()
            .with_class_size(32)
            .with_field(FieldDesc::instance("first", byte)),
    );
    let plain = define(
        &mut ctx,
        "Plain<__Canon>",
        DefType::value_type().with_field(FieldDesc::instance("first", byte)),
    );
    let buffer_rd = placeholder(&mut ctx, "Buffer<T>", buffer);
    let plain_rd = placeholder(&mut ctx, "Plain<T>", plain);

    assert_eq!(ctx.is_unsafe_value_type(buffer_rd).ok(), Some(true));
    assert_eq!(ctx.is_unsafe_value_type(plain_rd).ok(), Some(false));
    assert_eq!(ctx.instance_byte_count_unaligned(buffer_rd).ok(), Some(32));
}

#[test]
fn repeated_queries_return_equal_results() {
    let mut ctx = x64_context();
    let (_, rd) = pair_of_wide_scalars(&mut ctx);

    let first = ctx
        .instance_layout(rd, InstanceLayoutKind::TypeOnly)
        .unwrap_or_else(|err| panic!("first: {err}"));
    for _ in 0..8 {
        let again = ctx
            .instance_layout(rd, InstanceLayoutKind::TypeOnly)
            .unwrap_or_else(|err| panic!("again: {err}"));
        assert_eq!(again, first);
        assert_eq!(again.shape_identity(), first.shape_identity());
        assert_eq!(ctx.contains_gc_pointers(rd).ok(), Some(false));
        assert_eq!(
            ctx.value_type_shape_characteristics(rd).ok(),
            Some(ValueTypeShapeCharacteristics::NONE)
        );
    }
}

#[test]
fn placeholder_reflects_canonical_redefinition() {
    let mut ctx = x64_context();
    let int = ctx.primitive(PrimitiveType::I32);
    let object = define(&mut ctx, "object", DefType::reference_type());
    let (canonical, rd) = pair_of_wide_scalars(&mut ctx);
    assert_eq!(ctx.contains_gc_pointers(rd).ok(), Some(false));

    ctx.define_fields(
        canonical,
        vec![
            FieldDesc::instance("a", int),
            FieldDesc::instance("b", object),
        ],
    )
    .unwrap_or_else(|err| panic!("redefine: {err}"));

    assert_eq!(ctx.contains_gc_pointers(rd).ok(), Some(true));
    assert_eq!(ctx.instance_byte_count_unaligned(rd).ok(), Some(16));
}

#[test]
fn canonical_layout_errors_pass_through() {
    let mut ctx = x64_context();
    let cycle = define(&mut ctx, "Cycle<__Canon>", DefType::value_type());
    ctx.define_fields(cycle, vec![FieldDesc::instance("inner", cycle)])
        .unwrap_or_else(|err| panic!("define cycle: {err}"));
    let rd = placeholder(&mut ctx, "Cycle<T>", cycle);

    let err = ctx
        .instance_layout(rd, InstanceLayoutKind::TypeOnly)
        .expect_err("recursive canonical");
    assert!(!err.is_unsupported(), "{err}");
    assert_eq!(
        err.to_string(),
        "invalid layout for `Cycle<__Canon>`: layout depends on itself"
    );
}

#[test]
fn placeholders_embed_like_their_canonical_type() {
    let mut ctx = x64_context();
    let int = ctx.primitive(PrimitiveType::I32);
    let (_, value_rd) = pair_of_wide_scalars(&mut ctx);
    let list = define(&mut ctx, "List<__Canon>", DefType::reference_type());
    let list_rd = placeholder(&mut ctx, "List<T>", list);

    let outer = define(
        &mut ctx,
        "Outer",
        DefType::value_type()
            .with_field(FieldDesc::instance("tag", int))
            .with_field(FieldDesc::instance("value", value_rd))
            .with_field(FieldDesc::instance("items", list_rd)),
    );
    let layout = ctx
        .instance_layout(outer, InstanceLayoutKind::WithOffsets)
        .unwrap_or_else(|err| panic!("outer: {err}"));
    expect![[r#"
        size=32 align=8 field_size=32 field_align=8 abi_stable=true
          tag @ 0
          value @ 8
          items @ 24
    "#]]
    .assert_eq(&render_instance(&ctx, &layout));
    assert_eq!(ctx.contains_gc_pointers(outer).ok(), Some(true));
}

#[test]
fn dispatcher_routes_placeholders_to_the_runtime_determined_algorithm() {
    let mut ctx = x64_context();
    let (canonical, rd) = pair_of_wide_scalars(&mut ctx);
    assert_eq!(ctx.category(rd), TypeCategory::RuntimeDetermined);
    assert_eq!(ctx.category(canonical), TypeCategory::Def);

    let algorithm = layout_algorithm_for(TypeCategory::RuntimeDetermined);
    let err = algorithm
        .compute_static_field_layout(&ctx, rd, StaticLayoutKind::RegionSizes)
        .expect_err("placeholder statics");
    assert_unsupported(&err, LayoutOperation::StaticFieldLayout, "C<T>");

    let direct = RuntimeDeterminedFieldLayoutAlgorithm
        .compute_instance_layout(&ctx, rd, InstanceLayoutKind::TypeOnly)
        .unwrap_or_else(|err| panic!("direct: {err}"));
    assert_eq!(
        ctx.instance_layout(rd, InstanceLayoutKind::TypeOnly).ok(),
        Some(direct)
    );
}

#[test]
#[should_panic(expected = "routed to the concrete layout algorithm")]
fn concrete_algorithm_rejects_placeholders() {
    let mut ctx = x64_context();
    let (_, rd) = pair_of_wide_scalars(&mut ctx);
    let _ = ConcreteFieldLayoutAlgorithm.compute_instance_layout(
        &ctx,
        rd,
        InstanceLayoutKind::TypeOnly,
    );
}

#[test]
#[should_panic(expected = "routed to the runtime-determined layout algorithm")]
fn runtime_determined_algorithm_rejects_concrete_types() {
    let mut ctx = x64_context();
    let (canonical, _) = pair_of_wide_scalars(&mut ctx);
    let _ = RuntimeDeterminedFieldLayoutAlgorithm.compute_contains_byrefs(&ctx, canonical);
}
