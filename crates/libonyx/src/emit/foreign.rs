//! The foreign-block table.
//!
//! One record per foreign block: the functions it declares (name plus
//! function-type id) and the host module name, wrapped into a pointer table
//! and a `{pointer, count}` descriptor exactly like the type-info table.

use crate::emit::{DataBuffer, DataId, DatumPatch, DatumPatchKind, ModuleData};
use crate::program::Program;
use crate::types::POINTER_SIZE;

pub fn build_foreign_blocks(program: &Program, module: &mut ModuleData) -> DataId {
    let block_count = module.foreign_blocks.len() as u32;
    let mut foreign_info = vec![0u32; block_count as usize];

    let mut buffer = DataBuffer::new();

    // Offset 0 maps to the null pointer, so nothing may live there.
    buffer.write_u64(0);

    let blocks = module.foreign_blocks.clone();
    for (index, block_id) in blocks.iter().enumerate() {
        let block = program.ast.foreign_block(*block_id);

        let mut name_offsets = Vec::with_capacity(block.funcs.len());
        let mut name_lengths = Vec::with_capacity(block.funcs.len());
        let mut func_types = Vec::with_capacity(block.funcs.len());
        for func_id in &block.funcs {
            let func = program.ast.function(*func_id);
            let name = func.foreign_name.as_ref().unwrap_or(&func.name);

            name_offsets.push(buffer.len());
            name_lengths.push(name.text.len() as u32);
            func_types.push(func.ty.map(|ty| ty.0).unwrap_or(0));
            buffer.append(name.text.as_bytes());
        }

        buffer.align(8);
        let funcs_base = buffer.len();
        for func_index in 0..block.funcs.len() {
            buffer.align(POINTER_SIZE);
            buffer.write_slice(name_offsets[func_index], name_lengths[func_index]);
            buffer.write_u32(func_types[func_index]);
        }

        let name_base = buffer.len();
        let name_length = block.module_name.text.len() as u32;
        buffer.append(block.module_name.text.as_bytes());
        buffer.align(8);

        foreign_info[index] = buffer.len();
        buffer.write_slice(name_base, name_length);
        buffer.write_slice(funcs_base, block.funcs.len() as u32);
    }

    log::info!("Foreign blocks size: {} bytes.", buffer.len());

    let patch_locations = buffer.patch_locations().to_vec();
    let content_id = module.add_datum(8, buffer.into_bytes());
    for location in patch_locations {
        module.push_patch(DatumPatch {
            kind: DatumPatchKind::Relative,
            data_id: content_id,
            index: content_id,
            offset: 0,
            location,
        });
    }

    let mut table_bytes = Vec::with_capacity(foreign_info.len() * POINTER_SIZE as usize);
    for slot in &foreign_info {
        table_bytes.extend_from_slice(&slot.to_le_bytes());
    }
    let table_id = module.add_datum(POINTER_SIZE, table_bytes);
    for (index, slot) in foreign_info.iter().enumerate() {
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
    descriptor.extend_from_slice(&block_count.to_le_bytes());
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
