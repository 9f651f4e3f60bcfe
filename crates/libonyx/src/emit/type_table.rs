//! The type-info table.
//!
//! Serialises a variant record for every type in the type table, in
//! insertion order, into one content segment. A pointer table with one slot
//! per type id and a `{pointer, count}` descriptor wrap the content; every
//! inter-segment reference is recorded as a patch. Byte 0 of the content is
//! reserved so that offset 0 unambiguously means "absent".

use crate::ast::ExprId;
use crate::emit::{
    emit_constexpr, ConstExprContext, DataBuffer, DataId, DatumPatch, DatumPatchKind, ModuleData,
};
use crate::program::Program;
use crate::sem::scope::Symbol;
use crate::types::{BasicKind, PolySolution, TypeKind, POINTER_SIZE};

struct MethodData {
    name_loc: u32,
    name_len: u32,
    type_id: u32,
    data_loc: u32,
}

/// Encodes one compile-time value at the tail of the buffer, aligned to its
/// type. Returns the value's location, or 0 when it cannot be encoded.
fn encode_comptime(
    program: &Program,
    module: &mut ModuleData,
    content_id: DataId,
    buffer: &mut DataBuffer,
    expr: ExprId,
) -> u32 {
    let Some(ty) = program.ast.expr(expr).ty else {
        return 0;
    };
    buffer.align(program.types.alignment_of(ty));
    let location = buffer.len();
    let size = program.types.size_of(ty) as usize;
    buffer.grow_to(location as usize + size);

    let mut ctx = ConstExprContext { module, data_id: content_id };
    if emit_constexpr(program, &mut ctx, buffer.bytes_mut(), expr, location as usize) {
        location
    } else {
        buffer.truncate(location);
        0
    }
}

fn type_id_of_expr(program: &Program, expr: ExprId) -> u32 {
    program.ast.expr(expr).ty.map(|ty| ty.0).unwrap_or(0)
}

pub fn build_type_table(program: &Program, module: &mut ModuleData) -> DataId {
    let type_count = program.types.max_id() + 1;
    let mut table_info = vec![0u32; type_count as usize];

    let mut buffer = DataBuffer::new();
    let content_id = module.reserve_data_id();

    // Reserve the first bytes so no record lands at offset 0.
    buffer.write_u64(0);

    for ty in program.types.iter() {
        let type_idx = ty.id.0 as usize;
        match &ty.kind {
            TypeKind::Basic(basic) => {
                table_info[type_idx] = buffer.len();
                buffer.write_u32(ty.kind.discriminant());
                buffer.write_u32(program.types.size_of(ty.id));
                buffer.write_u32(program.types.alignment_of(ty.id));
                buffer.write_u32(basic_kind_id(*basic));
            }

            TypeKind::Pointer { elem } => {
                table_info[type_idx] = buffer.len();
                buffer.write_u32(ty.kind.discriminant());
                buffer.write_u32(program.types.size_of(ty.id));
                buffer.write_u32(program.types.alignment_of(ty.id));
                buffer.write_u32(elem.0);
            }

            TypeKind::Array { elem, count } => {
                table_info[type_idx] = buffer.len();
                buffer.write_u32(ty.kind.discriminant());
                buffer.write_u32(program.types.size_of(ty.id));
                buffer.write_u32(program.types.alignment_of(ty.id));
                buffer.write_u32(elem.0);
                buffer.write_u32(*count);
            }

            TypeKind::Slice { elem } | TypeKind::DynArray { elem } | TypeKind::VarArgs { elem } => {
                table_info[type_idx] = buffer.len();
                buffer.write_u32(ty.kind.discriminant());
                buffer.write_u32(program.types.size_of(ty.id));
                buffer.write_u32(program.types.alignment_of(ty.id));
                buffer.write_u32(elem.0);
            }

            TypeKind::Compound { types } => {
                let components_base = buffer.len();
                for component in types {
                    buffer.write_u32(component.0);
                }

                buffer.align(8);
                table_info[type_idx] = buffer.len();
                buffer.write_u32(ty.kind.discriminant());
                buffer.write_u32(program.types.size_of(ty.id));
                buffer.write_u32(program.types.alignment_of(ty.id));
                buffer.write_slice(components_base, types.len() as u32);
            }

            TypeKind::Function { params, ret, has_vararg } => {
                let parameters_base = buffer.len();
                for param in params {
                    buffer.write_u32(param.0);
                }

                table_info[type_idx] = buffer.len();
                buffer.write_u32(ty.kind.discriminant());
                buffer.write_u32(program.types.size_of(ty.id));
                buffer.write_u32(program.types.alignment_of(ty.id));
                buffer.write_u32(ret.0);
                buffer.write_slice(parameters_base, params.len() as u32);
                buffer.write_u32(u32::from(*has_vararg));
            }

            TypeKind::Enum { backing, name, members, is_flags } => {
                let mut name_locations = Vec::with_capacity(members.len());
                for member in members {
                    name_locations.push(buffer.len());
                    buffer.append(member.name.as_bytes());
                }
                buffer.align(8);

                let member_base = buffer.len();
                for (member, name_loc) in members.iter().zip(name_locations.iter()) {
                    buffer.align(8);
                    buffer.write_slice(*name_loc, member.name.len() as u32);
                    buffer.write_u64(member.value);
                }

                let name_base = buffer.len();
                buffer.append(name.as_bytes());
                buffer.align(8);

                table_info[type_idx] = buffer.len();
                buffer.write_u32(ty.kind.discriminant());
                buffer.write_u32(program.types.size_of(ty.id));
                buffer.write_u32(program.types.alignment_of(ty.id));
                buffer.write_u32(backing.0);
                buffer.write_slice(name_base, name.len() as u32);
                buffer.write_slice(member_base, members.len() as u32);
                buffer.write_u32(u32::from(*is_flags));
            }

            TypeKind::Struct(body) => {
                // Member names
                let mut name_locations = Vec::with_capacity(body.members.len());
                for member in &body.members {
                    name_locations.push(buffer.len());
                    buffer.append(member.name.as_bytes());
                }
                buffer.align(8);

                // Polymorphic solutions
                let mut param_locations = Vec::with_capacity(body.poly_solutions.len());
                for solution in &body.poly_solutions {
                    buffer.align(8);
                    match solution {
                        PolySolution::Type(solution_ty) => {
                            let location = buffer.len();
                            buffer.append(&solution_ty.0.to_le_bytes());
                            param_locations.push(location);
                        }
                        PolySolution::Value(expr) => {
                            let location = buffer.len();
                            let Some(value_ty) = program.ast.expr(*expr).ty else {
                                param_locations.push(0);
                                continue;
                            };
                            let size = program.types.size_of(value_ty) as usize;
                            buffer.grow_to(location as usize + size);
                            let mut ctx = ConstExprContext { module: &mut *module, data_id: content_id };
                            if emit_constexpr(program, &mut ctx, buffer.bytes_mut(), *expr, location as usize) {
                                param_locations.push(location);
                            } else {
                                buffer.truncate(location);
                                param_locations.push(0);
                            }
                        }
                    }
                }
                buffer.align(8);

                // Member default values
                let mut value_locations = vec![0u32; body.members.len()];
                for (index, member) in body.members.iter().enumerate() {
                    let Some(default) = member.default else { continue };
                    value_locations[index] = encode_comptime(program, module, content_id, &mut buffer, default);
                }

                // Member tags
                let mut meta_locations = vec![0u32; body.members.len()];
                for (index, member) in body.members.iter().enumerate() {
                    if member.meta_tags.is_empty() {
                        continue;
                    }
                    let mut tag_locations = Vec::with_capacity(member.meta_tags.len());
                    for tag in &member.meta_tags {
                        tag_locations.push(encode_comptime(program, module, content_id, &mut buffer, *tag));
                    }
                    buffer.align(8);
                    meta_locations[index] = buffer.len();
                    for (tag, location) in member.meta_tags.iter().zip(tag_locations.iter()) {
                        buffer.write_slice(*location, type_id_of_expr(program, *tag));
                    }
                }

                // Member array
                buffer.align(8);
                let members_base = buffer.len();
                for (index, member) in body.members.iter().enumerate() {
                    buffer.write_slice(name_locations[index], member.name.len() as u32);
                    buffer.write_u32(member.offset);
                    buffer.write_u32(member.ty.0);
                    buffer.write_u8(u8::from(member.used));
                    buffer.write_ptr(value_locations[index]);
                    buffer.write_slice(meta_locations[index], member.meta_tags.len() as u32);
                }

                // Polymorphic solution any-array
                buffer.align(8);
                let params_base = buffer.len();
                for (solution, location) in body.poly_solutions.iter().zip(param_locations.iter()) {
                    buffer.write_ptr(*location);
                    match solution {
                        PolySolution::Type(_) => {
                            buffer.write_u32(program.types.basic(BasicKind::TypeIndex).0);
                        }
                        PolySolution::Value(expr) => {
                            buffer.write_u32(type_id_of_expr(program, *expr));
                        }
                    }
                }

                // Struct tag payloads
                let mut struct_tag_locations = Vec::with_capacity(body.meta_tags.len());
                for tag in &body.meta_tags {
                    struct_tag_locations.push(encode_comptime(program, module, content_id, &mut buffer, *tag));
                }

                // Struct methods
                let mut method_data = Vec::new();
                if let Some(scope) = body.scope {
                    let methods: Vec<(String, crate::ast::FuncId)> = program
                        .scopes
                        .get(scope)
                        .symbols
                        .iter()
                        .filter_map(|(name, symbol)| match symbol {
                            Symbol::Function(func) => Some((name.clone(), *func)),
                            _ => None,
                        })
                        .collect();
                    for (name, func) in methods {
                        let name_loc = buffer.len();
                        let name_len = name.len() as u32;
                        buffer.append(name.as_bytes());

                        buffer.align(4);
                        let data_loc = buffer.len();
                        let func_idx = module.func_index(func);
                        buffer.write_u32(func_idx);

                        method_data.push(MethodData {
                            name_loc,
                            name_len,
                            type_id: program.ast.function(func).ty.map(|ty| ty.0).unwrap_or(0),
                            data_loc,
                        });
                    }
                }

                buffer.align(4);
                let method_data_base = buffer.len();
                for method in &method_data {
                    buffer.write_slice(method.name_loc, method.name_len);
                    buffer.write_ptr(method.data_loc);
                    buffer.write_u32(method.type_id);
                }

                buffer.align(8);
                let struct_tag_base = buffer.len();
                for (tag, location) in body.meta_tags.iter().zip(struct_tag_locations.iter()) {
                    buffer.write_slice(*location, type_id_of_expr(program, *tag));
                }

                // Struct name
                let mut name_base = 0;
                let mut name_length = 0;
                if !body.name.is_empty() {
                    name_length = body.name.len() as u32;
                    name_base = buffer.len();
                    buffer.append(body.name.as_bytes());
                }

                buffer.align(8);
                table_info[type_idx] = buffer.len();
                buffer.write_u32(ty.kind.discriminant());
                buffer.write_u32(program.types.size_of(ty.id));
                buffer.write_u32(program.types.alignment_of(ty.id));
                buffer.write_u32(body.constructed_from.map(|from| from.0).unwrap_or(0));
                buffer.write_slice(name_base, name_length);
                buffer.write_slice(members_base, body.members.len() as u32);
                buffer.write_slice(params_base, body.poly_solutions.len() as u32);
                buffer.write_slice(struct_tag_base, body.meta_tags.len() as u32);
                buffer.write_slice(method_data_base, method_data.len() as u32);
            }

            TypeKind::PolyStruct { name, meta_tags } => {
                let name_base = buffer.len();
                buffer.append(name.as_bytes());

                // Tags may only be encodable on solidified structures, so
                // unencodable payloads shrink the emitted count.
                let mut emitted = Vec::new();
                for tag in meta_tags {
                    if !program
                        .ast
                        .expr(*tag)
                        .flags
                        .contains(crate::ast::NodeFlags::Comptime)
                    {
                        continue;
                    }
                    let location = encode_comptime(program, module, content_id, &mut buffer, *tag);
                    emitted.push((location, type_id_of_expr(program, *tag)));
                }

                buffer.align(8);
                let tags_base = buffer.len();
                for (location, tag_type) in &emitted {
                    buffer.write_slice(*location, *tag_type);
                }

                buffer.align(8);
                table_info[type_idx] = buffer.len();
                buffer.write_u32(ty.kind.discriminant());
                buffer.write_u32(0);
                buffer.write_u32(0);
                buffer.write_slice(name_base, name.len() as u32);
                buffer.write_slice(tags_base, emitted.len() as u32);
            }

            TypeKind::Distinct { name, base } => {
                let name_base = buffer.len();
                buffer.append(name.as_bytes());
                buffer.align(8);

                table_info[type_idx] = buffer.len();
                buffer.write_u32(ty.kind.discriminant());
                buffer.write_u32(program.types.size_of(ty.id));
                buffer.write_u32(program.types.alignment_of(ty.id));
                buffer.write_u32(base.0);
                buffer.write_slice(name_base, name.len() as u32);
            }
        }
    }

    log::info!("Type table size: {} bytes.", buffer.len());

    let patch_locations = buffer.patch_locations().to_vec();
    module.add_datum_reserved(content_id, 8, buffer.into_bytes());
    for location in patch_locations {
        module.push_patch(DatumPatch {
            kind: DatumPatchKind::Relative,
            data_id: content_id,
            index: content_id,
            offset: 0,
            location,
        });
    }

    let mut table_bytes = Vec::with_capacity(table_info.len() * POINTER_SIZE as usize);
    for slot in &table_info {
        table_bytes.extend_from_slice(&slot.to_le_bytes());
    }
    let table_id = module.add_datum(POINTER_SIZE, table_bytes);
    for (index, slot) in table_info.iter().enumerate() {
        module.push_patch(DatumPatch {
            kind: DatumPatchKind::Data,
            data_id: content_id,
            offset: *slot,
            index: table_id,
            location: index as u32 * POINTER_SIZE,
        });
    }

    let mut descriptor = Vec::with_capacity(2 * POINTER_SIZE as usize);
    descriptor.extend_from_slice(&0u32.to_le_bytes());
    descriptor.extend_from_slice(&type_count.to_le_bytes());
    let descriptor_id = module.add_datum(POINTER_SIZE, descriptor);
    module.push_patch(DatumPatch {
        kind: DatumPatchKind::Data,
        data_id: table_id,
        offset: 0,
        index: descriptor_id,
        location: 0,
    });

    descriptor_id
}

fn basic_kind_id(kind: BasicKind) -> u32 {
    match kind {
        BasicKind::Void => 0,
        BasicKind::Bool => 1,
        BasicKind::I8 => 2,
        BasicKind::U8 => 3,
        BasicKind::I16 => 4,
        BasicKind::U16 => 5,
        BasicKind::I32 => 6,
        BasicKind::U32 => 7,
        BasicKind::I64 => 8,
        BasicKind::U64 => 9,
        BasicKind::F32 => 10,
        BasicKind::F64 => 11,
        BasicKind::Rawptr => 12,
        BasicKind::TypeIndex => 13,
    }
}
