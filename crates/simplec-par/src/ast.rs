//! simplec-par - AST node definitions.
//!
//! The AST is a closed set of variants: every node owns its children,
//! and cross-references (calls to functions, methods to their artifact)
//! are by name only. The validator builds name-keyed side tables over
//! this tree; nothing here points back up.

use simplec_lex::Token;
use simplec_util::Pos;

/// Per-binding mutability flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mutability {
    /// Declared with `:`.
    Mutable,
    /// Declared with `::`.
    Immutable,
}

/// One array/list dimension, outer-first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeDim {
    /// `T[]` - growable list.
    List,
    /// `T[k]` - fixed-size array.
    Fixed(u32),
}

impl TypeDim {
    pub fn is_list(&self) -> bool {
        matches!(self, TypeDim::List)
    }
}

/// The canonical type value used throughout the validator and emitter.
///
/// A scalar type has `pointer_depth == 0`, no `type_args`, no `dims`,
/// and `is_proc == false`. `void` is only valid as a return type.
#[derive(Clone, Debug, Default)]
pub struct TypeRef {
    /// Primitive name, user-declared type name, or generic parameter.
    pub name: String,
    /// Source position of the annotation (diagnostics only; never part
    /// of type equality).
    pub pos: Pos,
    /// Indirection count (`*T` = 1, `**T` = 2).
    pub pointer_depth: u32,
    /// Generic arguments, e.g. `Map<string, i32>`.
    pub type_args: Vec<TypeRef>,
    /// Array/list shape, outer-first.
    pub dims: Vec<TypeDim>,
    /// Procedure-typed form.
    pub is_proc: bool,
    pub proc_params: Vec<TypeRef>,
    /// `None` on the bare `fn` shorthand (filled from the initializer)
    /// and on `callback`.
    pub proc_return: Option<Box<TypeRef>>,
    /// `callback` - procedure of unknown arity, compatible with any
    /// procedure value at call sites.
    pub proc_is_callback: bool,
    pub proc_return_mutability: Mutability,
}

impl Default for Mutability {
    fn default() -> Self {
        Mutability::Mutable
    }
}

impl TypeRef {
    /// A plain named type with no shape.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// The effective type of a binding, resolving the bare `fn`
    /// shorthand from a shorthand fn-literal initializer.
    pub fn resolve_fn_shorthand(&self, init: Option<&Expr>) -> TypeRef {
        if !self.is_fn_shorthand() {
            return self.clone();
        }
        let Some(Expr::FnLiteral(lit)) = init else {
            return self.clone();
        };
        let Some(ret) = &lit.return_type else {
            return self.clone();
        };
        TypeRef {
            pos: self.pos,
            is_proc: true,
            proc_params: lit.params.iter().map(|p| p.ty.clone()).collect(),
            proc_return: Some(Box::new(ret.clone())),
            proc_return_mutability: Mutability::Mutable,
            ..Default::default()
        }
    }

    pub fn void() -> Self {
        Self::named("void")
    }

    /// A single-dimension list type, e.g. `i32[]`.
    pub fn list_of(name: impl Into<String>) -> Self {
        let mut ty = Self::named(name);
        ty.dims.push(TypeDim::List);
        ty
    }

    /// Scalar = no pointer, no proc, no args, no dims.
    pub fn is_scalar(&self) -> bool {
        self.pointer_depth == 0 && !self.is_proc && self.type_args.is_empty() && self.dims.is_empty()
    }

    pub fn is_void(&self) -> bool {
        self.name == "void" && self.is_scalar()
    }

    /// The bare `fn` shorthand: a proc type to be filled from the
    /// initializer expression.
    pub fn is_fn_shorthand(&self) -> bool {
        self.is_proc && !self.proc_is_callback && self.proc_return.is_none()
    }

    /// The element type of the outermost dimension.
    pub fn element_type(&self) -> Option<TypeRef> {
        if self.dims.is_empty() {
            return None;
        }
        let mut elem = self.clone();
        elem.dims.remove(0);
        Some(elem)
    }

    /// Rendered type name for diagnostics.
    pub fn display(&self) -> String {
        let mut out = String::new();
        for _ in 0..self.pointer_depth {
            out.push('*');
        }
        if self.is_proc {
            if self.proc_is_callback {
                out.push_str("callback");
                return out;
            }
            out.push('(');
            for (i, p) in self.proc_params.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&p.display());
            }
            out.push_str(") : ");
            match &self.proc_return {
                Some(ret) => out.push_str(&ret.display()),
                None => out.push_str("fn"),
            }
            return out;
        }
        out.push_str(&self.name);
        if !self.type_args.is_empty() {
            out.push('<');
            for (i, arg) in self.type_args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&arg.display());
            }
            out.push('>');
        }
        for dim in &self.dims {
            match dim {
                TypeDim::List => out.push_str("[]"),
                TypeDim::Fixed(n) => out.push_str(&format!("[{}]", n)),
            }
        }
        out
    }
}

/// Structural type equality (`TypeEquals`). Ignores return mutability;
/// two procedure types that differ only in whether their result may be
/// assigned through are the same type.
pub fn type_equals(a: &TypeRef, b: &TypeRef) -> bool {
    if a.name != b.name
        || a.pointer_depth != b.pointer_depth
        || a.is_proc != b.is_proc
        || a.proc_is_callback != b.proc_is_callback
        || a.dims != b.dims
    {
        return false;
    }
    if a.type_args.len() != b.type_args.len() || a.proc_params.len() != b.proc_params.len() {
        return false;
    }
    if !a
        .type_args
        .iter()
        .zip(&b.type_args)
        .all(|(x, y)| type_equals(x, y))
    {
        return false;
    }
    if !a
        .proc_params
        .iter()
        .zip(&b.proc_params)
        .all(|(x, y)| type_equals(x, y))
    {
        return false;
    }
    match (&a.proc_return, &b.proc_return) {
        (None, None) => true,
        (Some(x), Some(y)) => type_equals(x, y),
        _ => false,
    }
}

/// The top-level value the validator and emitter process.
#[derive(Clone, Debug, Default)]
pub struct Program {
    pub decls: Vec<Decl>,
    pub top_level_stmts: Vec<Stmt>,
}

/// Top-level declaration.
#[derive(Clone, Debug)]
pub enum Decl {
    Import(ImportDecl),
    Extern(ExternDecl),
    Enum(EnumDecl),
    Artifact(ArtifactDecl),
    Module(ModuleDecl),
    Function(FuncDecl),
    Variable(VarDecl),
}

#[derive(Clone, Debug)]
pub struct ImportDecl {
    pub path: String,
    pub alias: Option<String>,
    pub pos: Pos,
}

#[derive(Clone, Debug)]
pub struct ExternDecl {
    /// `extern Ray.InitWindow : ...` has module `Ray`.
    pub module: Option<String>,
    pub name: String,
    pub params: Vec<ParamDecl>,
    pub return_type: TypeRef,
    pub return_mutability: Mutability,
    pub pos: Pos,
}

#[derive(Clone, Debug)]
pub struct EnumDecl {
    pub name: String,
    pub members: Vec<EnumMember>,
    pub pos: Pos,
}

#[derive(Clone, Debug)]
pub struct EnumMember {
    pub name: String,
    /// Explicit value lexeme (`= 3`, `= 0x10`); validation requires one
    /// for every member.
    pub value: Option<String>,
    pub pos: Pos,
}

#[derive(Clone, Debug)]
pub struct ArtifactDecl {
    pub name: String,
    pub generics: Vec<String>,
    pub fields: Vec<VarDecl>,
    pub methods: Vec<FuncDecl>,
    pub pos: Pos,
}

#[derive(Clone, Debug)]
pub struct ModuleDecl {
    pub name: String,
    pub variables: Vec<VarDecl>,
    pub functions: Vec<FuncDecl>,
    pub pos: Pos,
}

#[derive(Clone, Debug)]
pub struct FuncDecl {
    pub name: String,
    pub generics: Vec<String>,
    pub params: Vec<ParamDecl>,
    pub return_type: TypeRef,
    pub return_mutability: Mutability,
    pub body: Vec<Stmt>,
    pub pos: Pos,
}

#[derive(Clone, Debug)]
pub struct ParamDecl {
    pub name: String,
    pub ty: TypeRef,
    pub mutability: Mutability,
    pub pos: Pos,
}

#[derive(Clone, Debug)]
pub struct VarDecl {
    pub name: String,
    pub ty: TypeRef,
    pub mutability: Mutability,
    pub init: Option<Expr>,
    pub pos: Pos,
}

/// Statement.
#[derive(Clone, Debug)]
pub enum Stmt {
    VarDecl(VarDecl),
    Assign(AssignStmt),
    Expr(Expr),
    Return(ReturnStmt),
    If(IfStmt),
    IfChain(IfChainStmt),
    While(WhileStmt),
    For(Box<ForStmt>),
    Break(Pos),
    Skip(Pos),
}

impl Stmt {
    pub fn pos(&self) -> Pos {
        match self {
            Stmt::VarDecl(v) => v.pos,
            Stmt::Assign(a) => a.pos,
            Stmt::Expr(e) => e.pos(),
            Stmt::Return(r) => r.pos,
            Stmt::If(s) => s.pos,
            Stmt::IfChain(s) => s.pos,
            Stmt::While(s) => s.pos,
            Stmt::For(s) => s.pos,
            Stmt::Break(pos) | Stmt::Skip(pos) => *pos,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AssignStmt {
    pub target: Expr,
    pub op: AssignOp,
    pub value: Expr,
    pub pos: Pos,
}

#[derive(Clone, Debug)]
pub struct ReturnStmt {
    pub value: Option<Expr>,
    pub pos: Pos,
}

#[derive(Clone, Debug)]
pub struct IfStmt {
    pub cond: Expr,
    pub then_body: Vec<Stmt>,
    pub else_body: Vec<Stmt>,
    pub pos: Pos,
}

/// `|> cond { } |> cond { } |> default { }`.
#[derive(Clone, Debug)]
pub struct IfChainStmt {
    pub branches: Vec<(Expr, Vec<Stmt>)>,
    pub else_body: Vec<Stmt>,
    pub pos: Pos,
}

#[derive(Clone, Debug)]
pub struct WhileStmt {
    pub cond: Expr,
    pub body: Vec<Stmt>,
    pub pos: Pos,
}

/// `for init; cond; step { body }` and the range forms.
///
/// The range form `for i [: T] [= e]; a..b { }` is desugared by the
/// parser into `cond = i <= b`, `step = i++`, with `a` seeding the
/// declaration's initializer when none was written.
#[derive(Clone, Debug)]
pub struct ForStmt {
    /// Loop variable declared in the header, scoped to the loop.
    pub var_decl: Option<VarDecl>,
    /// Non-declaring init expression (assignment form); emitted and
    /// discarded before the loop.
    pub init: Option<Expr>,
    pub cond: Expr,
    pub step: Expr,
    pub body: Vec<Stmt>,
    pub pos: Pos,
}

/// Assignment operator family (statement and expression forms).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl AssignOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
            AssignOp::Rem => "%=",
            AssignOp::BitAnd => "&=",
            AssignOp::BitOr => "|=",
            AssignOp::BitXor => "^=",
            AssignOp::Shl => "<<=",
            AssignOp::Shr => ">>=",
        }
    }

    /// The binary operator a compound assignment applies, `None` for
    /// plain `=`.
    pub fn binary_op(&self) -> Option<BinOp> {
        let op = match self {
            AssignOp::Assign => return None,
            AssignOp::Add => BinOp::Add,
            AssignOp::Sub => BinOp::Sub,
            AssignOp::Mul => BinOp::Mul,
            AssignOp::Div => BinOp::Div,
            AssignOp::Rem => BinOp::Rem,
            AssignOp::BitAnd => BinOp::BitAnd,
            AssignOp::BitOr => BinOp::BitOr,
            AssignOp::BitXor => BinOp::BitXor,
            AssignOp::Shl => BinOp::Shl,
            AssignOp::Shr => BinOp::Shr,
        };
        Some(op)
    }
}

/// Binary operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LogicalAnd,
    LogicalOr,
}

impl BinOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::LogicalAnd => "&&",
            BinOp::LogicalOr => "||",
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }

    pub fn is_bitwise(&self) -> bool {
        matches!(
            self,
            BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::Shl | BinOp::Shr
        )
    }
}

/// Unary operators (prefix and postfix).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

impl UnOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnOp::Neg => "-",
            UnOp::Not => "!",
            UnOp::PreInc => "++",
            UnOp::PreDec => "--",
            UnOp::PostInc => "post++",
            UnOp::PostDec => "post--",
        }
    }

    pub fn is_inc_dec(&self) -> bool {
        !matches!(self, UnOp::Neg | UnOp::Not)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LiteralKind {
    Integer,
    Float,
    String,
    Char,
    Bool,
}

/// Expression.
#[derive(Clone, Debug)]
pub enum Expr {
    Literal(LiteralExpr),
    Identifier(IdentExpr),
    Unary(Box<UnaryExpr>),
    Binary(Box<BinaryExpr>),
    Assign(Box<AssignExpr>),
    Call(Box<CallExpr>),
    Member(Box<MemberExpr>),
    Index(Box<IndexExpr>),
    /// `[e, e, ...]` - array or list literal; which one is decided by
    /// the target type, not syntax.
    Bracket(BracketLiteral),
    /// `{ positional, .name = value, ... }`.
    Artifact(Box<ArtifactLiteralExpr>),
    FnLiteral(Box<FnLiteralExpr>),
    SelfRef(Pos),
}

impl Expr {
    pub fn pos(&self) -> Pos {
        match self {
            Expr::Literal(l) => l.pos,
            Expr::Identifier(i) => i.pos,
            Expr::Unary(u) => u.pos,
            Expr::Binary(b) => b.pos,
            Expr::Assign(a) => a.pos,
            Expr::Call(c) => c.pos,
            Expr::Member(m) => m.pos,
            Expr::Index(i) => i.pos,
            Expr::Bracket(b) => b.pos,
            Expr::Artifact(a) => a.pos,
            Expr::FnLiteral(f) => f.pos,
            Expr::SelfRef(pos) => *pos,
        }
    }

    pub fn is_integer_literal(&self) -> bool {
        matches!(
            self,
            Expr::Literal(LiteralExpr {
                kind: LiteralKind::Integer,
                ..
            })
        )
    }

    pub fn is_float_literal(&self) -> bool {
        matches!(
            self,
            Expr::Literal(LiteralExpr {
                kind: LiteralKind::Float,
                ..
            })
        )
    }

    pub fn is_string_literal(&self) -> bool {
        matches!(
            self,
            Expr::Literal(LiteralExpr {
                kind: LiteralKind::String,
                ..
            })
        )
    }
}

#[derive(Clone, Debug)]
pub struct LiteralExpr {
    pub kind: LiteralKind,
    /// Raw lexeme for numbers; decoded value for strings and chars;
    /// `true`/`false` for bools.
    pub text: String,
    pub pos: Pos,
}

#[derive(Clone, Debug)]
pub struct IdentExpr {
    pub name: String,
    pub pos: Pos,
}

#[derive(Clone, Debug)]
pub struct UnaryExpr {
    pub op: UnOp,
    pub operand: Expr,
    pub pos: Pos,
}

#[derive(Clone, Debug)]
pub struct BinaryExpr {
    pub op: BinOp,
    pub lhs: Expr,
    pub rhs: Expr,
    pub pos: Pos,
}

/// Assignment in expression position (`(x = 1)`, for-loop steps).
#[derive(Clone, Debug)]
pub struct AssignExpr {
    pub target: Expr,
    pub op: AssignOp,
    pub value: Expr,
    pub pos: Pos,
}

#[derive(Clone, Debug)]
pub struct CallExpr {
    pub callee: Expr,
    pub args: Vec<Expr>,
    /// Explicit type arguments: `f<T1, ...>(...)`.
    pub type_args: Vec<TypeRef>,
    pub pos: Pos,
}

#[derive(Clone, Debug)]
pub struct MemberExpr {
    pub base: Expr,
    pub name: String,
    pub pos: Pos,
}

#[derive(Clone, Debug)]
pub struct IndexExpr {
    pub base: Expr,
    pub index: Expr,
    pub pos: Pos,
}

#[derive(Clone, Debug)]
pub struct BracketLiteral {
    pub elems: Vec<Expr>,
    pub pos: Pos,
}

#[derive(Clone, Debug)]
pub struct ArtifactLiteralExpr {
    pub positional: Vec<Expr>,
    pub named: Vec<(String, Expr)>,
    pub pos: Pos,
}

/// A function literal. The body tokens are captured verbatim and
/// re-parsed by the emitter once the target procedure type is known.
#[derive(Clone, Debug)]
pub struct FnLiteralExpr {
    pub params: Vec<ParamDecl>,
    /// Present on the shorthand form `Ret (params) { body }` used to
    /// initialize a bare `fn` binding.
    pub return_type: Option<TypeRef>,
    pub body_tokens: Vec<Token>,
    pub pos: Pos,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_equals_is_structural() {
        let a = TypeRef::list_of("i32");
        let b = a.clone();
        assert!(type_equals(&a, &b));

        let c = TypeRef::named("i32");
        assert!(!type_equals(&a, &c));
    }

    #[test]
    fn test_type_equals_ignores_return_mutability() {
        let mut a = TypeRef {
            is_proc: true,
            proc_return: Some(Box::new(TypeRef::named("i32"))),
            ..Default::default()
        };
        let mut b = a.clone();
        a.proc_return_mutability = Mutability::Mutable;
        b.proc_return_mutability = Mutability::Immutable;
        assert!(type_equals(&a, &b));
    }

    #[test]
    fn test_clone_preserves_type_equality() {
        let mut ty = TypeRef::named("Map");
        ty.type_args.push(TypeRef::named("string"));
        ty.type_args.push(TypeRef::list_of("i32"));
        let cloned = ty.clone();
        assert!(type_equals(&ty, &cloned));
    }

    #[test]
    fn test_scalar_classification() {
        assert!(TypeRef::named("i32").is_scalar());
        assert!(!TypeRef::list_of("i32").is_scalar());
        let mut ptr = TypeRef::named("void");
        ptr.pointer_depth = 1;
        assert!(!ptr.is_scalar());
    }

    #[test]
    fn test_element_type_strips_outer_dim() {
        let mut grid = TypeRef::named("i32");
        grid.dims.push(TypeDim::Fixed(2));
        grid.dims.push(TypeDim::List);
        let row = grid.element_type().unwrap();
        assert_eq!(row.dims, vec![TypeDim::List]);
        assert!(grid.element_type().unwrap().element_type().unwrap().dims.is_empty());
    }

    #[test]
    fn test_display_renders_shapes() {
        let mut ty = TypeRef::named("Box");
        ty.type_args.push(TypeRef::named("i32"));
        assert_eq!(ty.display(), "Box<i32>");
        assert_eq!(TypeRef::list_of("i32").display(), "i32[]");
    }

    #[test]
    fn test_assign_op_round_trip() {
        assert_eq!(AssignOp::Shl.as_str(), "<<=");
        assert_eq!(AssignOp::Shl.binary_op(), Some(BinOp::Shl));
        assert_eq!(AssignOp::Assign.binary_op(), None);
    }
}
