//! Constant-expression encoding into data segments.
//!
//! The reflection emitters call [`emit_constexpr`] to deposit
//! compile-time-known typed values (poly-solution values, member defaults,
//! meta-tag payloads) directly into a content buffer. A `false` return means
//! the value cannot be encoded; callers then store the 0 "absent" sentinel
//! instead.

use crate::ast::{ExprId, ExprKind, NodeFlags};
use crate::emit::{DataId, ModuleData};
use crate::program::Program;

/// Target context for constant emission: the module and the id of the data
/// segment the bytes will belong to, so pointer-valued constants could be
/// patched against it.
pub struct ConstExprContext<'m> {
    pub module: &'m mut ModuleData,
    pub data_id: DataId,
}

/// Writes `expr`'s compile-time value into `data` at `offset`. The buffer
/// must already be grown to `offset + size_of(expr.ty)`.
pub fn emit_constexpr(
    program: &Program,
    _ctx: &mut ConstExprContext<'_>,
    data: &mut [u8],
    expr: ExprId,
    offset: usize,
) -> bool {
    let node = program.ast.expr(expr);
    if !node.flags.contains(NodeFlags::Comptime) {
        return false;
    }
    let Some(ty) = node.ty else {
        return false;
    };
    let size = program.types.size_of(ty) as usize;
    if offset + size > data.len() {
        return false;
    }

    match &node.kind {
        ExprKind::NumLit(value) => {
            let raw = value.as_u64().to_le_bytes();
            data[offset..offset + size].copy_from_slice(&raw[..size]);
            true
        }
        // String and aggregate constants would need pointer patches into
        // other segments; they are reported as unencodable and the caller
        // stores the absent sentinel.
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NumValue;
    use crate::span::Span;
    use crate::types::BasicKind;

    fn program_with_literal(value: NumValue, kind: BasicKind) -> (Program, ExprId) {
        let mut program = Program::new();
        let ty = program.types.basic(kind);
        let expr = program.ast.new_num_lit(value, ty, Span::builtin());
        (program, expr)
    }

    #[test]
    fn encodes_i32_little_endian() {
        let (program, expr) = program_with_literal(NumValue::I32(0x0102_0304), BasicKind::I32);
        let mut module = ModuleData::new();
        let data_id = module.reserve_data_id();
        let mut ctx = ConstExprContext { module: &mut module, data_id };
        let mut data = vec![0u8; 8];

        assert!(emit_constexpr(&program, &mut ctx, &mut data, expr, 4));
        assert_eq!(&data[4..8], &[0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn encodes_f64_bits() {
        let (program, expr) = program_with_literal(NumValue::F64(1.5), BasicKind::F64);
        let mut module = ModuleData::new();
        let data_id = module.reserve_data_id();
        let mut ctx = ConstExprContext { module: &mut module, data_id };
        let mut data = vec![0u8; 8];

        assert!(emit_constexpr(&program, &mut ctx, &mut data, expr, 0));
        assert_eq!(data, 1.5f64.to_bits().to_le_bytes());
    }

    #[test]
    fn non_comptime_values_are_unencodable() {
        let mut program = Program::new();
        let ty = program.types.basic(BasicKind::I32);
        let expr = program.ast.push_expr(crate::ast::Expr {
            kind: ExprKind::NumLit(NumValue::I32(1)),
            span: Span::builtin(),
            flags: NodeFlags::none(),
            ty: Some(ty),
            type_expr: None,
        });
        let mut module = ModuleData::new();
        let data_id = module.reserve_data_id();
        let mut ctx = ConstExprContext { module: &mut module, data_id };
        let mut data = vec![0u8; 4];

        assert!(!emit_constexpr(&program, &mut ctx, &mut data, expr, 0));
    }

    #[test]
    fn out_of_bounds_offset_is_rejected() {
        let (program, expr) = program_with_literal(NumValue::I32(1), BasicKind::I32);
        let mut module = ModuleData::new();
        let data_id = module.reserve_data_id();
        let mut ctx = ConstExprContext { module: &mut module, data_id };
        let mut data = vec![0u8; 2];

        assert!(!emit_constexpr(&program, &mut ctx, &mut data, expr, 0));
    }
}
