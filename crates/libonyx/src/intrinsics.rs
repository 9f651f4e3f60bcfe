//! The closed set of intrinsic procedures.
//!
//! An intrinsic is a function whose body is replaced by a fixed WASM
//! instruction. The checker rewrites a call to an intrinsic-flagged function
//! into an intrinsic call, selecting the enumerator below from the function's
//! declared intrinsic name. The set is closed: a name outside this table maps
//! to [`Intrinsic::Undefined`] and is reported as an error.

use std::str::FromStr;

use strum_macros::EnumString;

/// Enumerators for every recognised intrinsic name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
pub enum Intrinsic {
    #[strum(disabled)]
    Undefined,

    #[strum(serialize = "memory_size")]
    MemorySize,
    #[strum(serialize = "memory_grow")]
    MemoryGrow,

    #[strum(serialize = "clz_i32")]
    I32Clz,
    #[strum(serialize = "ctz_i32")]
    I32Ctz,
    #[strum(serialize = "popcnt_i32")]
    I32Popcnt,
    #[strum(serialize = "and_i32")]
    I32And,
    #[strum(serialize = "or_i32")]
    I32Or,
    #[strum(serialize = "xor_i32")]
    I32Xor,
    #[strum(serialize = "shl_i32")]
    I32Shl,
    #[strum(serialize = "slr_i32")]
    I32Slr,
    #[strum(serialize = "sar_i32")]
    I32Sar,
    #[strum(serialize = "rotl_i32")]
    I32Rotl,
    #[strum(serialize = "rotr_i32")]
    I32Rotr,

    #[strum(serialize = "clz_i64")]
    I64Clz,
    #[strum(serialize = "ctz_i64")]
    I64Ctz,
    #[strum(serialize = "popcnt_i64")]
    I64Popcnt,
    #[strum(serialize = "and_i64")]
    I64And,
    #[strum(serialize = "or_i64")]
    I64Or,
    #[strum(serialize = "xor_i64")]
    I64Xor,
    #[strum(serialize = "shl_i64")]
    I64Shl,
    #[strum(serialize = "slr_i64")]
    I64Slr,
    #[strum(serialize = "sar_i64")]
    I64Sar,
    #[strum(serialize = "rotl_i64")]
    I64Rotl,
    #[strum(serialize = "rotr_i64")]
    I64Rotr,

    #[strum(serialize = "abs_f32")]
    F32Abs,
    #[strum(serialize = "ceil_f32")]
    F32Ceil,
    #[strum(serialize = "floor_f32")]
    F32Floor,
    #[strum(serialize = "trunc_f32")]
    F32Trunc,
    #[strum(serialize = "nearest_f32")]
    F32Nearest,
    #[strum(serialize = "sqrt_f32")]
    F32Sqrt,
    #[strum(serialize = "min_f32")]
    F32Min,
    #[strum(serialize = "max_f32")]
    F32Max,
    #[strum(serialize = "copysign_f32")]
    F32Copysign,

    #[strum(serialize = "abs_f64")]
    F64Abs,
    #[strum(serialize = "ceil_f64")]
    F64Ceil,
    #[strum(serialize = "floor_f64")]
    F64Floor,
    #[strum(serialize = "trunc_f64")]
    F64Trunc,
    #[strum(serialize = "nearest_f64")]
    F64Nearest,
    #[strum(serialize = "sqrt_f64")]
    F64Sqrt,
    #[strum(serialize = "min_f64")]
    F64Min,
    #[strum(serialize = "max_f64")]
    F64Max,
    #[strum(serialize = "copysign_f64")]
    F64Copysign,
}

impl Intrinsic {
    /// Static name-to-enumerator lookup. Unknown names map to `Undefined`.
    pub fn lookup(name: &str) -> Intrinsic {
        Intrinsic::from_str(name).unwrap_or(Intrinsic::Undefined)
    }
}
