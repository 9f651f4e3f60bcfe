//! Byte-level checks on the reflection blobs: record layouts, patch
//! wiring, and the invariants the running program depends on.

mod common;

use common::{file, function, ident, local, sp};
use libonyx::ast::{ForeignBlock, NodeFlags, NumValue, PolySolutionDecl, StructDecl, StructMemberDecl, TypeExprKind};
use libonyx::emit::{self, DataId, DatumPatchKind, ModuleData};
use libonyx::program::EntityKind;
use libonyx::sem;
use libonyx::sem::scope::Symbol;
use libonyx::types::{type_from_expr, BasicKind, TypeId, TypeKind};
use libonyx::Program;

fn read_u32(bytes: &[u8], offset: u32) -> u32 {
    let offset = offset as usize;
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

fn read_str(bytes: &[u8], ptr: u32, len: u32) -> &str {
    std::str::from_utf8(&bytes[ptr as usize..(ptr + len) as usize]).unwrap()
}

/// The pointer-table segment a descriptor points at.
fn table_of(module: &ModuleData, descriptor: DataId) -> DataId {
    module
        .patches
        .iter()
        .find(|patch| patch.kind == DatumPatchKind::Data && patch.index == descriptor)
        .expect("descriptor has a table patch")
        .data_id
}

/// The content offset a pointer-table slot resolves to.
fn slot_offset(module: &ModuleData, table: DataId, slot: u32) -> u32 {
    module
        .patches
        .iter()
        .find(|patch| {
            patch.kind == DatumPatchKind::Data && patch.index == table && patch.location == slot * 4
        })
        .expect("slot has a patch")
        .offset
}

/// The content segment behind a pointer table.
fn content_of(module: &ModuleData, table: DataId) -> DataId {
    module
        .patches
        .iter()
        .find(|patch| patch.kind == DatumPatchKind::Data && patch.index == table)
        .expect("table points into content")
        .data_id
}

fn basic_type_expr(program: &mut Program, kind: BasicKind) -> libonyx::ast::TypeExprId {
    let ty = program.types.basic(kind);
    program
        .ast
        .new_type_expr(TypeExprKind::Basic(ty), libonyx::span::Span::builtin())
}

fn two_field_struct(program: &mut Program, name: &str, constructed_from: Option<TypeId>, poly: Vec<PolySolutionDecl>) -> TypeId {
    let src = file(name);
    let te_a = basic_type_expr(program, BasicKind::I32);
    let te_b = basic_type_expr(program, BasicKind::I32);
    let decl = program.ast.push_struct(StructDecl {
        name: ident(&src, name),
        members: vec![
            StructMemberDecl { name: ident(&src, "a"), type_expr: te_a, default: None, meta_tags: vec![], used: true },
            StructMemberDecl { name: ident(&src, "b"), type_expr: te_b, default: None, meta_tags: vec![], used: true },
        ],
        meta_tags: vec![],
        poly_solutions: poly,
        constructed_from,
        scope: None,
        built: None,
        flags: NodeFlags::none(),
    });
    let te = program
        .ast
        .new_type_expr(TypeExprKind::Struct(decl), libonyx::span::Span::builtin());
    type_from_expr(&mut program.ast, &mut program.types, te).unwrap()
}

#[test]
fn every_type_record_leads_with_its_kind() {
    let mut program = Program::new();
    let i32_id = program.types.basic(BasicKind::I32);
    program.types.pointer_to(i32_id);
    program.types.intern(TypeKind::Slice { elem: i32_id });
    two_field_struct(&mut program, "Vec2", None, vec![]);

    let mut module = ModuleData::new();
    let descriptors = emit::emit_reflection(&program, &mut module);

    let table = table_of(&module, descriptors.type_table);
    let content_id = content_of(&module, table);
    let content = &module.segment(content_id).unwrap().data;

    for ty in program.types.iter() {
        let offset = slot_offset(&module, table, ty.id.0);
        assert!(offset != 0, "type {:?} has a record", ty.id);
        assert_eq!(
            read_u32(content, offset),
            ty.kind.discriminant(),
            "record kind for {:?}",
            ty.id
        );
        assert_eq!(read_u32(content, offset + 4), program.types.size_of(ty.id));
        assert_eq!(read_u32(content, offset + 8), program.types.alignment_of(ty.id));
    }
}

/// A program exercising all three emitters: a struct type, a foreign block
/// and a tagged procedure.
fn fixture() -> (Program, ModuleData) {
    let src = file("Vec2 :: struct { a: i32, b: i32 }; foreign \"host\" { puts :: (data: rawptr) -> void }; #tag 7 job :: () -> void {}");
    let mut program = Program::new();
    let pkg = program.add_package("main");

    two_field_struct(&mut program, "Vec2", None, vec![]);

    let data = local(&mut program, &src, "data", "rawptr");
    let puts = function(&mut program, &src, "puts", vec![data], "void", None);
    program.ast.function_mut(puts).flags |= NodeFlags::Foreign;
    program.ast.function_mut(puts).foreign_name = Some(ident(&src, "puts"));
    program.introduce(pkg, "puts", Symbol::Function(puts));
    let block = program.ast.push_foreign_block(ForeignBlock {
        module_name: ident(&src, "host"),
        funcs: vec![puts],
    });
    program.add_entity(EntityKind::ForeignBlock(block), pkg);

    let i32_id = program.types.basic(BasicKind::I32);
    let tag = program.ast.new_num_lit(NumValue::I32(7), i32_id, sp(&src, "7"));
    let job = function(&mut program, &src, "job", vec![], "void", Some(vec![]));
    program.ast.function_mut(job).tags.push(tag);
    program.introduce(pkg, "job", Symbol::Function(job));
    program.add_entity(EntityKind::Function(job), pkg);

    let diagnostics = sem::analyze(&mut program);
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics.render_plain());

    let mut module = ModuleData::new();
    module.foreign_blocks.push(block);
    module.tagged_procedures.push(job);
    (program, module)
}

#[test]
fn content_segments_reserve_their_first_eight_bytes() {
    let (program, mut module) = fixture();
    let descriptors = emit::emit_reflection(&program, &mut module);

    for descriptor in [descriptors.type_table, descriptors.foreign_blocks, descriptors.tagged_procedures] {
        let table = table_of(&module, descriptor);
        let content_id = content_of(&module, table);
        let content = &module.segment(content_id).unwrap().data;
        assert!(content.len() >= 8);
        assert_eq!(&content[0..8], &[0u8; 8], "reserved header of {content_id:?}");
    }
}

#[test]
fn every_patched_offset_lands_inside_its_segment() {
    let (program, mut module) = fixture();
    emit::emit_reflection(&program, &mut module);

    for patch in &module.patches {
        let target = module.segment(patch.data_id).expect("patch target segment exists");
        let site = module.segment(patch.index).expect("patch site segment exists");

        assert!(
            patch.offset == 0 || (patch.offset as usize) < target.data.len(),
            "offset {} outside segment {:?}",
            patch.offset,
            patch.data_id
        );
        assert!(
            (patch.location as usize) + 4 <= site.data.len(),
            "patch location outside segment {:?}",
            patch.index
        );

        if patch.kind == DatumPatchKind::Relative {
            // The written offset must itself be in range, or the absent
            // sentinel.
            let written = read_u32(&site.data, patch.location);
            assert!(written == 0 || (written as usize) < target.data.len());
        }
    }
}

#[test]
fn struct_members_round_trip_through_the_table() {
    let mut program = Program::new();
    let i32_id = program.types.basic(BasicKind::I32);
    let ty = two_field_struct(&mut program, "Vec2", None, vec![]);

    let mut module = ModuleData::new();
    let descriptors = emit::emit_reflection(&program, &mut module);

    let table = table_of(&module, descriptors.type_table);
    let content_id = content_of(&module, table);
    let content = &module.segment(content_id).unwrap().data;

    let record = slot_offset(&module, table, ty.0);
    assert_eq!(read_u32(content, record), 10); // struct kind
    assert_eq!(read_u32(content, record + 4), 8); // size
    assert_eq!(read_u32(content, record + 8), 4); // alignment
    assert_eq!(read_u32(content, record + 12), 0); // not polymorphic

    let name_ptr = read_u32(content, record + 16);
    let name_len = read_u32(content, record + 20);
    assert_eq!(read_str(content, name_ptr, name_len), "Vec2");

    let members_ptr = read_u32(content, record + 24);
    let member_count = read_u32(content, record + 28);
    assert_eq!(member_count, 2);

    let expected = [("a", 0u32), ("b", 4u32)];
    for (index, (expected_name, expected_offset)) in expected.iter().enumerate() {
        let member = members_ptr + index as u32 * 32;
        let member_name_ptr = read_u32(content, member);
        let member_name_len = read_u32(content, member + 4);
        assert_eq!(read_str(content, member_name_ptr, member_name_len), *expected_name);
        assert_eq!(read_u32(content, member + 8), *expected_offset);
        assert_eq!(read_u32(content, member + 12), i32_id.0);
        assert_eq!(content[(member + 16) as usize], 1); // used flag
    }
}

#[test]
fn solidified_polymorphic_structs_point_at_their_template() {
    let mut program = Program::new();
    let i32_id = program.types.basic(BasicKind::I32);
    let type_index_id = program.types.basic(BasicKind::TypeIndex);

    let poly = program.types.add(TypeKind::PolyStruct { name: "Pair".into(), meta_tags: vec![] });
    let te_solution = basic_type_expr(&mut program, BasicKind::I32);
    let ty = two_field_struct(
        &mut program,
        "Pair(i32)",
        Some(poly),
        vec![PolySolutionDecl::Type(te_solution)],
    );

    let mut module = ModuleData::new();
    let descriptors = emit::emit_reflection(&program, &mut module);

    let table = table_of(&module, descriptors.type_table);
    let content_id = content_of(&module, table);
    let content = &module.segment(content_id).unwrap().data;

    // The template's own record is a poly-struct with zero size.
    let poly_record = slot_offset(&module, table, poly.0);
    assert_eq!(read_u32(content, poly_record), 11);
    assert_eq!(read_u32(content, poly_record + 4), 0);

    let record = slot_offset(&module, table, ty.0);
    assert_eq!(read_u32(content, record + 12), poly.0, "constructed_from");

    // Members a and b, ascending offsets, both i32.
    let members_ptr = read_u32(content, record + 24);
    assert_eq!(read_u32(content, record + 28), 2);
    let offset_a = read_u32(content, members_ptr + 8);
    let offset_b = read_u32(content, members_ptr + 32 + 8);
    assert!(offset_a < offset_b);
    assert_eq!(read_u32(content, members_ptr + 12), i32_id.0);
    assert_eq!(read_u32(content, members_ptr + 32 + 12), i32_id.0);

    // One poly solution: the solved type id payload, tagged type_expr.
    let params_ptr = read_u32(content, record + 32);
    let params_count = read_u32(content, record + 36);
    assert_eq!(params_count, 1);
    let solution_ptr = read_u32(content, params_ptr);
    assert_eq!(read_u32(content, solution_ptr), i32_id.0);
    assert_eq!(read_u32(content, params_ptr + 4), type_index_id.0);
}

#[test]
fn foreign_blocks_describe_their_functions() {
    let src = file("foreign \"host\" { puts :: (data: rawptr) -> void }");
    let mut program = Program::new();
    let pkg = program.add_package("main");

    let data = local(&mut program, &src, "data", "rawptr");
    let puts = function(&mut program, &src, "puts", vec![data], "void", None);
    program.ast.function_mut(puts).flags |= NodeFlags::Foreign;
    program.ast.function_mut(puts).foreign_name = Some(ident(&src, "puts"));
    program.introduce(pkg, "puts", Symbol::Function(puts));

    let block = program.ast.push_foreign_block(ForeignBlock {
        module_name: ident(&src, "host"),
        funcs: vec![puts],
    });
    program.add_entity(EntityKind::ForeignBlock(block), pkg);

    let diagnostics = sem::analyze(&mut program);
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics.render_plain());
    let func_type = program.ast.function(puts).ty.unwrap();

    let mut module = ModuleData::new();
    module.foreign_blocks.push(block);
    let descriptor = emit::build_foreign_blocks(&program, &mut module);

    // Descriptor count matches the block count.
    let descriptor_bytes = &module.segment(descriptor).unwrap().data;
    assert_eq!(read_u32(descriptor_bytes, 4), 1);

    let table = table_of(&module, descriptor);
    let content_id = content_of(&module, table);
    let content = &module.segment(content_id).unwrap().data;

    let record = slot_offset(&module, table, 0);
    let module_name_ptr = read_u32(content, record);
    let module_name_len = read_u32(content, record + 4);
    assert_eq!(read_str(content, module_name_ptr, module_name_len), "host");

    let funcs_ptr = read_u32(content, record + 8);
    let funcs_count = read_u32(content, record + 12);
    assert_eq!(funcs_count, 1);

    let func_name_ptr = read_u32(content, funcs_ptr);
    let func_name_len = read_u32(content, funcs_ptr + 4);
    assert_eq!(read_str(content, func_name_ptr, func_name_len), "puts");
    assert_eq!(read_u32(content, funcs_ptr + 8), func_type.0);
}

#[test]
fn tagged_procedures_encode_their_tags_and_skip_unemittable_ones() {
    let src = file("#tag 7 job :: () -> void {}; ext :: () -> void #foreign");
    let mut program = Program::new();
    let pkg = program.add_package("main");

    let i32_id = program.types.basic(BasicKind::I32);
    let tag = program.ast.new_num_lit(NumValue::I32(7), i32_id, sp(&src, "7"));

    let job = function(&mut program, &src, "job", vec![], "void", Some(vec![]));
    program.ast.function_mut(job).tags.push(tag);
    program.introduce(pkg, "job", Symbol::Function(job));
    program.add_entity(EntityKind::Function(job), pkg);

    let ext = function(&mut program, &src, "ext", vec![], "void", None);
    program.ast.function_mut(ext).flags |= NodeFlags::Foreign;
    program.ast.function_mut(ext).tags.push(tag);
    program.introduce(pkg, "ext", Symbol::Function(ext));
    program.add_entity(EntityKind::Function(ext), pkg);

    let diagnostics = sem::analyze(&mut program);
    assert!(!diagnostics.has_errors(), "{:?}", diagnostics.render_plain());
    let job_type = program.ast.function(job).ty.unwrap();

    let mut module = ModuleData::new();
    module.register_func_index(job, 3);
    module.tagged_procedures.push(job);
    module.tagged_procedures.push(ext);
    let descriptor = emit::build_tagged_procedures(&program, &mut module);

    // The foreign procedure was skipped and the count decremented with it.
    let descriptor_bytes = &module.segment(descriptor).unwrap().data;
    assert_eq!(read_u32(descriptor_bytes, 4), 1);

    let table = table_of(&module, descriptor);
    let content_id = content_of(&module, table);
    let content = &module.segment(content_id).unwrap().data;

    let record = slot_offset(&module, table, 0);
    assert_eq!(read_u32(content, record), 3, "element-table index");
    assert_eq!(read_u32(content, record + 4), job_type.0);

    let tags_ptr = read_u32(content, record + 8);
    let tags_count = read_u32(content, record + 12);
    assert_eq!(tags_count, 1);
    assert_eq!(read_u32(content, record + 16), pkg.0 as u32);

    // The tag entry points at the encoded payload.
    let tag_offset = read_u32(content, tags_ptr);
    assert_eq!(read_u32(content, tags_ptr + 4), i32_id.0);
    assert_eq!(read_u32(content, tag_offset), 7);
}
