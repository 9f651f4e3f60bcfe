//! The tagged-procedure table.
//!
//! One record per procedure that carries tags and passes the emission
//! predicate: the tag payloads (encoded at their type's alignment), a tag
//! array of `{data offset, type id}` pairs, then the procedure record. The
//! count is decremented for skipped procedures so the descriptor count
//! always matches the number of written records.

use crate::ast::NodeFlags;
use crate::emit::{
    emit_constexpr, ConstExprContext, DataBuffer, DataId, DatumPatch, DatumPatchKind, ModuleData,
};
use crate::program::Program;
use crate::types::POINTER_SIZE;

/// Only procedures that actually end up in the module may appear in the
/// table: foreign and intrinsic functions have no element-table index.
fn should_emit_procedure(program: &Program, func: crate::ast::FuncId) -> bool {
    let flags = program.ast.function(func).flags;
    !flags.contains(NodeFlags::Foreign) && !flags.contains(NodeFlags::Intrinsic)
}

pub fn build_tagged_procedures(program: &Program, module: &mut ModuleData) -> DataId {
    let mut proc_count = module.tagged_procedures.len() as u32;
    let mut tag_proc_info = vec![0u32; proc_count as usize];

    let mut buffer = DataBuffer::new();
    let content_id = module.reserve_data_id();

    // Offset 0 maps to the null pointer, so nothing may live there.
    buffer.write_u64(0);

    let mut index = 0usize;
    let procedures = module.tagged_procedures.clone();
    for func_id in procedures {
        if !should_emit_procedure(program, func_id) {
            proc_count -= 1;
            continue;
        }

        let tags = program.ast.function(func_id).tags.clone();
        let mut tag_data_offsets = Vec::with_capacity(tags.len());
        let mut tag_data_types = Vec::with_capacity(tags.len());

        for tag in &tags {
            let Some(tag_ty) = program.ast.expr(*tag).ty else {
                tag_data_offsets.push(0);
                tag_data_types.push(0);
                continue;
            };
            buffer.align(program.types.alignment_of(tag_ty));
            let location = buffer.len();
            tag_data_offsets.push(location);
            tag_data_types.push(tag_ty.0);

            let size = program.types.size_of(tag_ty) as usize;
            buffer.grow_to(location as usize + size);
            let mut ctx = ConstExprContext { module: &mut *module, data_id: content_id };
            emit_constexpr(program, &mut ctx, buffer.bytes_mut(), *tag, location as usize);
        }

        buffer.align(4);
        let tag_array_base = buffer.len();
        for tag_index in 0..tags.len() {
            buffer.patch_here();
            buffer.write_u32(tag_data_offsets[tag_index]);
            buffer.write_u32(tag_data_types[tag_index]);
        }

        buffer.align(4);
        tag_proc_info[index] = buffer.len();
        index += 1;

        let func = program.ast.function(func_id);
        let package = func.package.expect("tagged procedure without a package");
        let func_type_id = func.ty.map(|ty| ty.0).unwrap_or(0);
        let func_idx = module.func_index(func_id);
        buffer.write_u32(func_idx);
        buffer.write_u32(func_type_id);
        buffer.write_slice(tag_array_base, tags.len() as u32);
        buffer.write_u32(package.0 as u32);
    }

    log::info!("Tagged procedure size: {} bytes.", buffer.len());

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

    tag_proc_info.truncate(proc_count as usize);
    let mut table_bytes = Vec::with_capacity(tag_proc_info.len() * POINTER_SIZE as usize);
    for slot in &tag_proc_info {
        table_bytes.extend_from_slice(&slot.to_le_bytes());
    }
    let table_id = module.add_datum(POINTER_SIZE, table_bytes);
    for (slot_index, slot) in tag_proc_info.iter().enumerate() {
        module.push_patch(DatumPatch {
            kind: DatumPatchKind::Data,
            data_id: content_id,
            offset: *slot,
            index: table_id,
            location: slot_index as u32 * POINTER_SIZE,
        });
    }

    let mut descriptor = Vec::with_capacity(2 * POINTER_SIZE as usize);
    descriptor.extend_from_slice(&0u32.to_le_bytes());
    descriptor.extend_from_slice(&proc_count.to_le_bytes());
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
