//! Abstract syntax tree arenas.
//!
//! The parser (an external collaborator) produces these nodes; the semantic
//! pass resolves and mutates them in place. Nodes live in `Vec`-backed arenas
//! inside [`Ast`] and refer to each other through `Copy` index newtypes, so
//! the graph shape of the original tree (symbols rewritten to point at their
//! declarations, shared declaration nodes) costs nothing to express.
//!
//! Every syntactic category is its own sum type; the shared header data
//! (span, flags, resolved type handle, unresolved type expression handle)
//! lives directly on the node structs.

use bitmask_enum::bitmask;

use crate::intrinsics::Intrinsic;
use crate::span::{Ident, Span};
use crate::types::TypeId;

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub usize);

        impl $name {
            pub const UNDEFINED: Self = $name(usize::MAX);
        }

        impl From<usize> for $name {
            fn from(index: usize) -> Self {
                $name(index)
            }
        }
    };
}

define_id!(/// Index of an expression node
    ExprId);
define_id!(/// Index of a statement node
    StmtId);
define_id!(/// Index of a block node
    BlockId);
define_id!(/// Index of a type expression node
    TypeExprId);
define_id!(/// Index of a local (or parameter) declaration
    LocalId);
define_id!(/// Index of a function declaration
    FuncId);
define_id!(/// Index of a global declaration
    GlobalId);
define_id!(/// Index of an overload set
    OverloadId);
define_id!(/// Index of a struct declaration
    StructId);
define_id!(/// Index of a foreign block
    ForeignBlockId);
define_id!(/// Index of a use-package item
    UsePackageId);
define_id!(/// Index of a string literal
    StrLitId);

/// Shared node flags.
#[bitmask(u16)]
pub enum NodeFlags {
    Const,
    Exported,
    Foreign,
    Intrinsic,
    Inline,
    Comptime,
    ExprIgnored,
    TypeResolved,
}

/// What a resolved name points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclRef {
    Local(LocalId),
    Global(GlobalId),
    Function(FuncId),
    Overload(OverloadId),
    Package(crate::program::PackageId),
    /// A type used by name; illegal in expression position.
    Type(TypeExprId),
}

/// Literal numeric value. The parser decides the variant together with the
/// literal's type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NumValue {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl NumValue {
    /// The raw integer view used when encoding into data segments and enum
    /// member records.
    pub fn as_u64(self) -> u64 {
        match self {
            NumValue::I32(v) => v as u32 as u64,
            NumValue::I64(v) => v as u64,
            NumValue::F32(v) => v.to_bits() as u64,
            NumValue::F64(v) => v.to_bits(),
        }
    }
}

/// Binary operators, including the compound assignment forms the checker
/// desugars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Assign,
    AssignAdd,
    AssignSub,
    AssignMul,
    AssignDiv,
    AssignMod,
}

impl BinaryOp {
    pub fn is_assignment(self) -> bool {
        matches!(
            self,
            BinaryOp::Assign
                | BinaryOp::AssignAdd
                | BinaryOp::AssignSub
                | BinaryOp::AssignMul
                | BinaryOp::AssignDiv
                | BinaryOp::AssignMod
        )
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::Less
                | BinaryOp::LessEqual
                | BinaryOp::Greater
                | BinaryOp::GreaterEqual
        )
    }

    /// The plain operator a compound assignment desugars to.
    pub fn desugared(self) -> Option<BinaryOp> {
        match self {
            BinaryOp::AssignAdd => Some(BinaryOp::Add),
            BinaryOp::AssignSub => Some(BinaryOp::Sub),
            BinaryOp::AssignMul => Some(BinaryOp::Mul),
            BinaryOp::AssignDiv => Some(BinaryOp::Div),
            BinaryOp::AssignMod => Some(BinaryOp::Mod),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
    /// Carries its target type on the expression's `type_expr` handle.
    Cast,
}

/// An expression node. `ty` is filled by the checker; `type_expr` is the
/// unresolved type expression, where the grammar allows one.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    pub flags: NodeFlags,
    pub ty: Option<TypeId>,
    pub type_expr: Option<TypeExprId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Unresolved identifier; replaced with `Decl` during symbol resolution.
    Symbol(Ident),
    /// A resolved reference to a declaration.
    Decl(DeclRef),
    NumLit(NumValue),
    StrLit(StrLitId),
    Binary { op: BinaryOp, left: ExprId, right: ExprId },
    Unary { op: UnaryOp, expr: ExprId },
    Call { callee: ExprId, args: Vec<ExprId> },
    /// A call rewritten by the checker because the callee was intrinsic.
    IntrinsicCall { op: Intrinsic, args: Vec<ExprId> },
    FieldAccess { base: ExprId, field: Ident },
    AddressOf { expr: ExprId },
    Deref { expr: ExprId },
    ArrayAccess { base: ExprId, index: ExprId, elem_size: u32 },
    SizeOf { target: TypeExprId, size: u32 },
}

/// A statement node.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// A local declaration; removed from its block once the local has been
    /// introduced during symbol resolution.
    Local(LocalId),
    Return { expr: Option<ExprId> },
    If { cond: ExprId, then_stmt: StmtId, else_stmt: Option<StmtId> },
    While { cond: ExprId, body: StmtId },
    For {
        var: LocalId,
        start: ExprId,
        end: ExprId,
        step: Option<ExprId>,
        body: StmtId,
        scope: Option<crate::sem::scope::ScopeId>,
    },
    Block(BlockId),
    Expr(ExprId),
    Break,
    Continue,
}

/// A block: an ordered statement list with its own scope.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub body: Vec<StmtId>,
    pub scope: Option<crate::sem::scope::ScopeId>,
    pub span: Span,
}

/// A type expression node. Symbolic forms are rewritten to the declaration's
/// type node during symbol resolution; `Basic` and `Struct` are terminal.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub span: Span,
    pub flags: NodeFlags,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExprKind {
    /// A pre-resolved basic type node, as seeded for the builtin names.
    Basic(TypeId),
    Symbol(Ident),
    /// `package.Type`
    Qualified { package: Ident, name: Ident },
    Pointer { elem: TypeExprId },
    Array { elem: TypeExprId, count: Option<ExprId> },
    Slice { elem: TypeExprId },
    DynArray { elem: TypeExprId },
    Function { params: Vec<TypeExprId>, ret: TypeExprId },
    Struct(StructId),
}

/// A local variable or parameter declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Local {
    pub name: Ident,
    pub type_expr: Option<TypeExprId>,
    pub ty: Option<TypeId>,
    pub flags: NodeFlags,
}

/// A function declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: Ident,
    pub params: Vec<LocalId>,
    pub return_type: TypeExprId,
    pub ty: Option<TypeId>,
    pub body: Option<BlockId>,
    pub scope: Option<crate::sem::scope::ScopeId>,
    /// Filled during symbol resolution and the local collapse pass: every
    /// local declared anywhere in the body, hoisted to function level.
    pub locals: Vec<LocalId>,
    pub flags: NodeFlags,
    pub exported_name: Option<Ident>,
    pub foreign_name: Option<Ident>,
    pub intrinsic_name: Option<Ident>,
    /// Compile-time tag expressions attached to the procedure.
    pub tags: Vec<ExprId>,
    /// Back pointer to the owning package, set when the entity is added.
    pub package: Option<crate::program::PackageId>,
}

/// A global declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    pub name: Ident,
    pub type_expr: Option<TypeExprId>,
    pub ty: Option<TypeId>,
    pub flags: NodeFlags,
    pub exported_name: Option<Ident>,
}

/// A named group of functions sharing one name. Resolution picks the first
/// compatible overload in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct OverloadSet {
    pub name: Ident,
    /// Symbol expressions naming the overloads; resolved in place.
    pub overloads: Vec<ExprId>,
}

/// Declared poly-parameter solution on a solidified struct.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PolySolutionDecl {
    Type(TypeExprId),
    Value(ExprId),
}

/// One field of a struct declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct StructMemberDecl {
    pub name: Ident,
    pub type_expr: TypeExprId,
    pub default: Option<ExprId>,
    pub meta_tags: Vec<ExprId>,
    pub used: bool,
}

/// A struct declaration. `built` caches the concrete type once the type
/// builder has laid the struct out.
#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub name: Ident,
    pub members: Vec<StructMemberDecl>,
    pub meta_tags: Vec<ExprId>,
    pub poly_solutions: Vec<PolySolutionDecl>,
    pub constructed_from: Option<TypeId>,
    pub scope: Option<crate::sem::scope::ScopeId>,
    pub built: Option<TypeId>,
    pub flags: NodeFlags,
}

/// A foreign block: functions imported from one host module.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignBlock {
    pub module_name: Ident,
    pub funcs: Vec<FuncId>,
}

/// A `use package` item.
#[derive(Debug, Clone, PartialEq)]
pub struct UsePackage {
    pub package: Ident,
    pub alias: Option<Ident>,
    pub only: Vec<Ident>,
}

/// A string literal entity.
#[derive(Debug, Clone, PartialEq)]
pub struct StrLit {
    pub value: String,
    pub ty: Option<TypeId>,
}

/// All AST arenas for one program.
#[derive(Debug, Clone, Default)]
pub struct Ast {
    pub exprs: Vec<Expr>,
    pub stmts: Vec<Stmt>,
    pub blocks: Vec<Block>,
    pub type_exprs: Vec<TypeExpr>,
    pub locals: Vec<Local>,
    pub functions: Vec<Function>,
    pub globals: Vec<Global>,
    pub overloads: Vec<OverloadSet>,
    pub structs: Vec<StructDecl>,
    pub foreign_blocks: Vec<ForeignBlock>,
    pub use_packages: Vec<UsePackage>,
    pub str_lits: Vec<StrLit>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.0]
    }

    pub fn expr_mut(&mut self, id: ExprId) -> &mut Expr {
        &mut self.exprs[id.0]
    }

    pub fn push_expr(&mut self, expr: Expr) -> ExprId {
        self.exprs.push(expr);
        ExprId(self.exprs.len() - 1)
    }

    /// Convenience constructor used by the builders: no flags, no type.
    pub fn new_expr(&mut self, kind: ExprKind, span: Span) -> ExprId {
        self.push_expr(Expr { kind, span, flags: NodeFlags::none(), ty: None, type_expr: None })
    }

    /// A numeric literal with its type already decided, as the parser
    /// delivers them. Literals are compile-time known.
    pub fn new_num_lit(&mut self, value: NumValue, ty: TypeId, span: Span) -> ExprId {
        self.push_expr(Expr {
            kind: ExprKind::NumLit(value),
            span,
            flags: NodeFlags::Comptime,
            ty: Some(ty),
            type_expr: None,
        })
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.0]
    }

    pub fn stmt_mut(&mut self, id: StmtId) -> &mut Stmt {
        &mut self.stmts[id.0]
    }

    pub fn push_stmt(&mut self, stmt: Stmt) -> StmtId {
        self.stmts.push(stmt);
        StmtId(self.stmts.len() - 1)
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.0]
    }

    pub fn push_block(&mut self, block: Block) -> BlockId {
        self.blocks.push(block);
        BlockId(self.blocks.len() - 1)
    }

    pub fn type_expr(&self, id: TypeExprId) -> &TypeExpr {
        &self.type_exprs[id.0]
    }

    pub fn type_expr_mut(&mut self, id: TypeExprId) -> &mut TypeExpr {
        &mut self.type_exprs[id.0]
    }

    pub fn push_type_expr(&mut self, node: TypeExpr) -> TypeExprId {
        self.type_exprs.push(node);
        TypeExprId(self.type_exprs.len() - 1)
    }

    pub fn new_type_expr(&mut self, kind: TypeExprKind, span: Span) -> TypeExprId {
        self.push_type_expr(TypeExpr { kind, span, flags: NodeFlags::none() })
    }

    pub fn local(&self, id: LocalId) -> &Local {
        &self.locals[id.0]
    }

    pub fn local_mut(&mut self, id: LocalId) -> &mut Local {
        &mut self.locals[id.0]
    }

    pub fn push_local(&mut self, local: Local) -> LocalId {
        self.locals.push(local);
        LocalId(self.locals.len() - 1)
    }

    pub fn function(&self, id: FuncId) -> &Function {
        &self.functions[id.0]
    }

    pub fn function_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.functions[id.0]
    }

    pub fn push_function(&mut self, func: Function) -> FuncId {
        self.functions.push(func);
        FuncId(self.functions.len() - 1)
    }

    pub fn global(&self, id: GlobalId) -> &Global {
        &self.globals[id.0]
    }

    pub fn global_mut(&mut self, id: GlobalId) -> &mut Global {
        &mut self.globals[id.0]
    }

    pub fn push_global(&mut self, global: Global) -> GlobalId {
        self.globals.push(global);
        GlobalId(self.globals.len() - 1)
    }

    pub fn overload(&self, id: OverloadId) -> &OverloadSet {
        &self.overloads[id.0]
    }

    pub fn overload_mut(&mut self, id: OverloadId) -> &mut OverloadSet {
        &mut self.overloads[id.0]
    }

    pub fn push_overload(&mut self, set: OverloadSet) -> OverloadId {
        self.overloads.push(set);
        OverloadId(self.overloads.len() - 1)
    }

    pub fn struct_decl(&self, id: StructId) -> &StructDecl {
        &self.structs[id.0]
    }

    pub fn struct_decl_mut(&mut self, id: StructId) -> &mut StructDecl {
        &mut self.structs[id.0]
    }

    pub fn push_struct(&mut self, decl: StructDecl) -> StructId {
        self.structs.push(decl);
        StructId(self.structs.len() - 1)
    }

    pub fn foreign_block(&self, id: ForeignBlockId) -> &ForeignBlock {
        &self.foreign_blocks[id.0]
    }

    pub fn push_foreign_block(&mut self, block: ForeignBlock) -> ForeignBlockId {
        self.foreign_blocks.push(block);
        ForeignBlockId(self.foreign_blocks.len() - 1)
    }

    pub fn use_package(&self, id: UsePackageId) -> &UsePackage {
        &self.use_packages[id.0]
    }

    pub fn push_use_package(&mut self, item: UsePackage) -> UsePackageId {
        self.use_packages.push(item);
        UsePackageId(self.use_packages.len() - 1)
    }

    pub fn str_lit(&self, id: StrLitId) -> &StrLit {
        &self.str_lits[id.0]
    }

    pub fn push_str_lit(&mut self, lit: StrLit) -> StrLitId {
        self.str_lits.push(lit);
        StrLitId(self.str_lits.len() - 1)
    }
}
