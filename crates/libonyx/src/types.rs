//! The type representation and the process-wide type table.
//!
//! Every [`Type`] gets a unique, monotonically assigned [`TypeId`] at
//! construction and lives in the [`TypeTable`] for the whole compilation.
//! Cross references between types are ids, never owning handles, so
//! self-referential types (a struct holding a pointer to itself) need no
//! special casing. Iteration order of the table is insertion order, which is
//! what the reflection emitter serialises.

use indexmap::IndexMap;

use crate::ast::{Ast, ExprId, ExprKind, NumValue, TypeExprId, TypeExprKind};
use crate::sem::scope::ScopeId;

/// Pointer width of the compilation target in bytes. Layout decisions in the
/// type table and the reflection emitters key off this constant.
pub const POINTER_SIZE: u32 = 4;

/// Stable identifier of a type within one compilation. Ids start at 1; slot 0
/// of the reflection pointer table is left empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

impl TypeId {
    pub const UNDEFINED: Self = TypeId(u32::MAX);
}

/// The primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicKind {
    Void,
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    Rawptr,
    /// The type of type values, used for polymorphic solution records.
    TypeIndex,
}

impl BasicKind {
    pub fn size(self) -> u32 {
        match self {
            BasicKind::Void => 0,
            BasicKind::Bool | BasicKind::I8 | BasicKind::U8 => 1,
            BasicKind::I16 | BasicKind::U16 => 2,
            BasicKind::I32 | BasicKind::U32 | BasicKind::F32 | BasicKind::TypeIndex => 4,
            BasicKind::I64 | BasicKind::U64 | BasicKind::F64 => 8,
            BasicKind::Rawptr => POINTER_SIZE,
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            BasicKind::I8
                | BasicKind::U8
                | BasicKind::I16
                | BasicKind::U16
                | BasicKind::I32
                | BasicKind::U32
                | BasicKind::I64
                | BasicKind::U64
        )
    }

    pub fn is_signed(self) -> bool {
        matches!(self, BasicKind::I8 | BasicKind::I16 | BasicKind::I32 | BasicKind::I64)
    }

    pub fn is_float(self) -> bool {
        matches!(self, BasicKind::F32 | BasicKind::F64)
    }

    pub fn name(self) -> &'static str {
        match self {
            BasicKind::Void => "void",
            BasicKind::Bool => "bool",
            BasicKind::I8 => "i8",
            BasicKind::U8 => "u8",
            BasicKind::I16 => "i16",
            BasicKind::U16 => "u16",
            BasicKind::I32 => "i32",
            BasicKind::U32 => "u32",
            BasicKind::I64 => "i64",
            BasicKind::U64 => "u64",
            BasicKind::F32 => "f32",
            BasicKind::F64 => "f64",
            BasicKind::Rawptr => "rawptr",
            BasicKind::TypeIndex => "type_expr",
        }
    }
}

/// One member of an enum type.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    pub name: String,
    pub value: u64,
}

/// One member of a struct type, fully laid out.
#[derive(Debug, Clone, PartialEq)]
pub struct StructMember {
    pub name: String,
    pub offset: u32,
    pub ty: TypeId,
    pub used: bool,
    pub default: Option<ExprId>,
    pub meta_tags: Vec<ExprId>,
}

/// A solution for one polymorphic parameter of a solidified struct.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PolySolution {
    Type(TypeId),
    Value(ExprId),
}

/// Body of a solidified struct type.
#[derive(Debug, Clone, PartialEq)]
pub struct StructType {
    pub name: String,
    pub size: u32,
    pub alignment: u32,
    pub members: Vec<StructMember>,
    pub poly_solutions: Vec<PolySolution>,
    pub meta_tags: Vec<ExprId>,
    pub scope: Option<ScopeId>,
    pub constructed_from: Option<TypeId>,
}

/// The type variants.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Basic(BasicKind),
    Pointer { elem: TypeId },
    Array { elem: TypeId, count: u32 },
    Slice { elem: TypeId },
    DynArray { elem: TypeId },
    VarArgs { elem: TypeId },
    Compound { types: Vec<TypeId> },
    Function { params: Vec<TypeId>, ret: TypeId, has_vararg: bool },
    Enum { backing: TypeId, name: String, members: Vec<EnumMember>, is_flags: bool },
    Struct(StructType),
    PolyStruct { name: String, meta_tags: Vec<ExprId> },
    Distinct { name: String, base: TypeId },
}

impl TypeKind {
    /// Numeric discriminant written as the leading `kind` field of every
    /// reflection record. The numbering is part of the module's reflection
    /// format.
    pub fn discriminant(&self) -> u32 {
        match self {
            TypeKind::Basic(_) => 1,
            TypeKind::Pointer { .. } => 2,
            TypeKind::Array { .. } => 3,
            TypeKind::Slice { .. } => 4,
            TypeKind::DynArray { .. } => 5,
            TypeKind::VarArgs { .. } => 6,
            TypeKind::Compound { .. } => 7,
            TypeKind::Function { .. } => 8,
            TypeKind::Enum { .. } => 9,
            TypeKind::Struct(_) => 10,
            TypeKind::PolyStruct { .. } => 11,
            TypeKind::Distinct { .. } => 12,
        }
    }
}

/// A type together with its stable id.
#[derive(Debug, Clone, PartialEq)]
pub struct Type {
    pub id: TypeId,
    pub kind: TypeKind,
}

/// The process-wide table of all types, indexed by id.
#[derive(Debug, Clone)]
pub struct TypeTable {
    map: IndexMap<TypeId, Type>,
    next_id: u32,
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeTable {
    /// Creates the table and registers all basic types so that they always
    /// exist with the lowest ids.
    pub fn new() -> Self {
        let mut table = Self { map: IndexMap::new(), next_id: 1 };
        for kind in [
            BasicKind::Void,
            BasicKind::Bool,
            BasicKind::I8,
            BasicKind::U8,
            BasicKind::I16,
            BasicKind::U16,
            BasicKind::I32,
            BasicKind::U32,
            BasicKind::I64,
            BasicKind::U64,
            BasicKind::F32,
            BasicKind::F64,
            BasicKind::Rawptr,
            BasicKind::TypeIndex,
        ] {
            table.add(TypeKind::Basic(kind));
        }
        table
    }

    /// Registers a new type and assigns the next id.
    pub fn add(&mut self, kind: TypeKind) -> TypeId {
        let id = TypeId(self.next_id);
        self.next_id += 1;
        self.map.insert(id, Type { id, kind });
        id
    }

    /// Reserves an id with a placeholder body so that a type under
    /// construction can refer to itself. The caller must [`TypeTable::update`]
    /// the entry once the body is known.
    pub fn reserve(&mut self, name: impl Into<String>) -> TypeId {
        self.add(TypeKind::Struct(StructType {
            name: name.into(),
            size: 0,
            alignment: 1,
            members: Vec::new(),
            poly_solutions: Vec::new(),
            meta_tags: Vec::new(),
            scope: None,
            constructed_from: None,
        }))
    }

    pub fn update(&mut self, id: TypeId, kind: TypeKind) {
        let entry = self.map.get_mut(&id).expect("updating a type that was never reserved");
        entry.kind = kind;
    }

    pub fn get(&self, id: TypeId) -> &Type {
        self.map.get(&id).expect("type id out of table")
    }

    pub fn try_get(&self, id: TypeId) -> Option<&Type> {
        self.map.get(&id)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterates all types in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Type> {
        self.map.values()
    }

    /// Highest id handed out so far.
    pub fn max_id(&self) -> u32 {
        self.next_id - 1
    }

    /// Id of a basic type. Basic types are registered in [`TypeTable::new`],
    /// so this never fails.
    pub fn basic(&self, kind: BasicKind) -> TypeId {
        self.iter()
            .find(|ty| matches!(ty.kind, TypeKind::Basic(k) if k == kind))
            .map(|ty| ty.id)
            .expect("basic types are registered at table construction")
    }

    /// Interns a pointer type to `elem`, reusing an existing entry so that
    /// two pointers to the same pointee compare id-equal.
    pub fn pointer_to(&mut self, elem: TypeId) -> TypeId {
        self.intern(TypeKind::Pointer { elem })
    }

    /// Interns a structural (non-nominal) type: an existing entry with the
    /// same shape is reused. Nominal types (structs, enums, distincts) must
    /// go through [`TypeTable::add`] instead.
    pub fn intern(&mut self, kind: TypeKind) -> TypeId {
        debug_assert!(!matches!(
            kind,
            TypeKind::Struct(_) | TypeKind::Enum { .. } | TypeKind::Distinct { .. } | TypeKind::PolyStruct { .. }
        ));
        if let Some(existing) = self.iter().find(|ty| ty.kind == kind) {
            return existing.id;
        }
        self.add(kind)
    }

    pub fn size_of(&self, id: TypeId) -> u32 {
        match &self.get(id).kind {
            TypeKind::Basic(kind) => kind.size(),
            TypeKind::Pointer { .. } => POINTER_SIZE,
            TypeKind::Array { elem, count } => self.size_of(*elem) * count,
            TypeKind::Slice { .. } | TypeKind::VarArgs { .. } => 2 * POINTER_SIZE,
            TypeKind::DynArray { .. } => 4 * POINTER_SIZE,
            TypeKind::Compound { types } => {
                let mut offset = 0;
                for ty in types {
                    offset = align_up(offset, self.alignment_of(*ty));
                    offset += self.size_of(*ty);
                }
                align_up(offset, self.alignment_of(id))
            }
            TypeKind::Function { .. } => 4,
            TypeKind::Enum { backing, .. } => self.size_of(*backing),
            TypeKind::Struct(body) => body.size,
            TypeKind::PolyStruct { .. } => 0,
            TypeKind::Distinct { base, .. } => self.size_of(*base),
        }
    }

    pub fn alignment_of(&self, id: TypeId) -> u32 {
        match &self.get(id).kind {
            TypeKind::Basic(kind) => kind.size().max(1),
            TypeKind::Pointer { .. } => POINTER_SIZE,
            TypeKind::Array { elem, .. } => self.alignment_of(*elem),
            TypeKind::Slice { .. } | TypeKind::VarArgs { .. } | TypeKind::DynArray { .. } => POINTER_SIZE,
            TypeKind::Compound { types } => {
                types.iter().map(|ty| self.alignment_of(*ty)).max().unwrap_or(1)
            }
            TypeKind::Function { .. } => 4,
            TypeKind::Enum { backing, .. } => self.alignment_of(*backing),
            TypeKind::Struct(body) => body.alignment,
            TypeKind::PolyStruct { .. } => 1,
            TypeKind::Distinct { base, .. } => self.alignment_of(*base),
        }
    }

    pub fn is_pointer(&self, id: TypeId) -> bool {
        matches!(self.get(id).kind, TypeKind::Pointer { .. })
            || matches!(self.get(id).kind, TypeKind::Basic(BasicKind::Rawptr))
    }

    pub fn is_rawptr(&self, id: TypeId) -> bool {
        matches!(self.get(id).kind, TypeKind::Basic(BasicKind::Rawptr))
    }

    pub fn is_bool(&self, id: TypeId) -> bool {
        matches!(self.get(id).kind, TypeKind::Basic(BasicKind::Bool))
    }

    /// The compatibility predicate used by the checker. It permits identical
    /// ids, pointer/rawptr interchange, and coercion between a distinct type
    /// and its declared base. Widening between basic numerics (same
    /// signedness for integers, `f32` to `f64` for floats) applies only when
    /// `literal` is set, which the checker takes from the parser's
    /// compile-time mark on the value; two plain variables of different
    /// widths never coerce.
    pub fn compatible(&self, from: TypeId, to: TypeId, literal: bool) -> bool {
        if from == to {
            return true;
        }
        match (&self.get(from).kind, &self.get(to).kind) {
            (TypeKind::Basic(a), TypeKind::Basic(b)) => literal && basic_compatible(*a, *b),
            (TypeKind::Distinct { base, .. }, _) => *base == to,
            (_, TypeKind::Distinct { base, .. }) => *base == from,
            (TypeKind::Pointer { .. }, TypeKind::Basic(BasicKind::Rawptr)) => true,
            (TypeKind::Basic(BasicKind::Rawptr), TypeKind::Pointer { .. }) => true,
            _ => false,
        }
    }

    /// Human-readable name for diagnostics.
    pub fn name_of(&self, id: TypeId) -> String {
        match &self.get(id).kind {
            TypeKind::Basic(kind) => kind.name().to_string(),
            TypeKind::Pointer { elem } => format!("^{}", self.name_of(*elem)),
            TypeKind::Array { elem, count } => format!("[{}] {}", count, self.name_of(*elem)),
            TypeKind::Slice { elem } => format!("[] {}", self.name_of(*elem)),
            TypeKind::DynArray { elem } => format!("[..] {}", self.name_of(*elem)),
            TypeKind::VarArgs { elem } => format!("..{}", self.name_of(*elem)),
            TypeKind::Compound { types } => {
                let inner: Vec<String> = types.iter().map(|ty| self.name_of(*ty)).collect();
                format!("({})", inner.join(", "))
            }
            TypeKind::Function { params, ret, .. } => {
                let inner: Vec<String> = params.iter().map(|ty| self.name_of(*ty)).collect();
                format!("({}) -> {}", inner.join(", "), self.name_of(*ret))
            }
            TypeKind::Enum { name, .. } => name.clone(),
            TypeKind::Struct(body) => body.name.clone(),
            TypeKind::PolyStruct { name, .. } => name.clone(),
            TypeKind::Distinct { name, .. } => name.clone(),
        }
    }
}

fn basic_compatible(from: BasicKind, to: BasicKind) -> bool {
    if from == to {
        return true;
    }
    if from.is_integer() && to.is_integer() {
        return from.is_signed() == to.is_signed() && from.size() <= to.size();
    }
    if from.is_float() && to.is_float() {
        return from.size() <= to.size();
    }
    false
}

pub fn align_up(value: u32, alignment: u32) -> u32 {
    if alignment <= 1 {
        return value;
    }
    value.div_ceil(alignment) * alignment
}

/// Builds a concrete [`Type`] from a resolved type expression, caching the
/// result on the node. Returns `None` when the expression is still
/// unresolved, which the checker reports as an unresolved type.
pub fn type_from_expr(ast: &mut Ast, types: &mut TypeTable, te: TypeExprId) -> Option<TypeId> {
    let kind = ast.type_expr(te).kind.clone();
    match kind {
        TypeExprKind::Basic(id) => Some(id),
        TypeExprKind::Pointer { elem } => {
            let elem = type_from_expr(ast, types, elem)?;
            Some(types.pointer_to(elem))
        }
        TypeExprKind::Array { elem, count } => {
            let elem = type_from_expr(ast, types, elem)?;
            let count = count.and_then(|expr| const_count(ast, expr))?;
            Some(types.intern(TypeKind::Array { elem, count }))
        }
        TypeExprKind::Slice { elem } => {
            let elem = type_from_expr(ast, types, elem)?;
            Some(types.intern(TypeKind::Slice { elem }))
        }
        TypeExprKind::DynArray { elem } => {
            let elem = type_from_expr(ast, types, elem)?;
            Some(types.intern(TypeKind::DynArray { elem }))
        }
        TypeExprKind::Function { params, ret } => {
            let mut param_ids = Vec::with_capacity(params.len());
            for param in params {
                param_ids.push(type_from_expr(ast, types, param)?);
            }
            let ret = type_from_expr(ast, types, ret)?;
            Some(types.intern(TypeKind::Function { params: param_ids, ret, has_vararg: false }))
        }
        TypeExprKind::Struct(struct_id) => {
            if let Some(built) = ast.struct_decl(struct_id).built {
                return Some(built);
            }

            // Reserve the id first so members may point back at this struct.
            let name = ast.struct_decl(struct_id).name.text.clone();
            let id = types.reserve(name.clone());
            ast.struct_decl_mut(struct_id).built = Some(id);

            let decl_members = ast.struct_decl(struct_id).members.clone();
            let mut members = Vec::with_capacity(decl_members.len());
            let mut offset = 0u32;
            let mut alignment = 1u32;
            for decl in &decl_members {
                let ty = type_from_expr(ast, types, decl.type_expr)?;
                let member_align = types.alignment_of(ty);
                alignment = alignment.max(member_align);
                offset = align_up(offset, member_align);
                members.push(StructMember {
                    name: decl.name.text.clone(),
                    offset,
                    ty,
                    used: decl.used,
                    default: decl.default,
                    meta_tags: decl.meta_tags.clone(),
                });
                offset += types.size_of(ty);
            }
            let size = align_up(offset, alignment);

            let decl = ast.struct_decl(struct_id);
            let mut poly_solutions = Vec::with_capacity(decl.poly_solutions.len());
            let scope = decl.scope;
            let constructed_from = decl.constructed_from;
            let meta_tags = decl.meta_tags.clone();
            let decl_solutions = decl.poly_solutions.clone();
            for solution in decl_solutions {
                match solution {
                    crate::ast::PolySolutionDecl::Type(solution_te) => {
                        let solution_ty = type_from_expr(ast, types, solution_te)?;
                        poly_solutions.push(PolySolution::Type(solution_ty));
                    }
                    crate::ast::PolySolutionDecl::Value(expr) => {
                        poly_solutions.push(PolySolution::Value(expr));
                    }
                }
            }

            types.update(
                id,
                TypeKind::Struct(StructType {
                    name,
                    size,
                    alignment,
                    members,
                    poly_solutions,
                    meta_tags,
                    scope,
                    constructed_from,
                }),
            );
            Some(id)
        }
        TypeExprKind::Symbol(_) | TypeExprKind::Qualified { .. } => None,
    }
}

fn const_count(ast: &Ast, expr: ExprId) -> Option<u32> {
    match &ast.expr(expr).kind {
        ExprKind::NumLit(value) => Some(value.as_u64() as u32),
        _ => None,
    }
}
