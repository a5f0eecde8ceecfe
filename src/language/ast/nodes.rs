use super::{AttachPointId, ExprId, ProbeId, StmtId, SubprogId};
use crate::language::{span::Location, typecheck::TypeSource, types::SizedType};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Eq,
    Ne,
    Le,
    Ge,
    Lt,
    Gt,
    Left,
    Right,
    LAnd,
    LOr,
    Plus,
    Minus,
    Mul,
    Div,
    Mod,
    BAnd,
    BOr,
    BXor,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Left => "<<",
            BinaryOp::Right => ">>",
            BinaryOp::LAnd => "&&",
            BinaryOp::LOr => "||",
            BinaryOp::Plus => "+",
            BinaryOp::Minus => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::BAnd => "&",
            BinaryOp::BOr => "|",
            BinaryOp::BXor => "^",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::Ne
                | BinaryOp::Le
                | BinaryOp::Ge
                | BinaryOp::Lt
                | BinaryOp::Gt
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinaryOp::LAnd | BinaryOp::LOr)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    LNot,
    BNot,
    Minus,
    Deref,
    Increment,
    Decrement,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::LNot => "!",
            UnaryOp::BNot => "~",
            UnaryOp::Minus => "-",
            UnaryOp::Deref => "*",
            UnaryOp::Increment => "++",
            UnaryOp::Decrement => "--",
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IntegerLiteral {
    pub value: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StringLiteral {
    pub value: String,
}

/// Raw stack mode name as written in the script; validated when typed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackModeLiteral {
    pub mode: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PositionalParameter {
    /// `$N`, 1-based.
    Param(usize),
    /// `$#`
    Count,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identifier {
    pub ident: String,
    pub ty: TypeSource,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Builtin {
    pub ident: String,
    pub ty: TypeSource,
}

impl Builtin {
    /// `arg0`..`argN`, `sarg0`..`sargN`
    pub fn is_argx(&self) -> bool {
        ["arg", "sarg"].iter().any(|prefix| {
            self.ident
                .strip_prefix(prefix)
                .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    pub func: String,
    pub args: Vec<ExprId>,
    pub ty: TypeSource,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SizeofTarget {
    Type(SizedType),
    Expr(ExprId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sizeof {
    pub target: SizeofTarget,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Offsetof {
    pub record: SizeofTarget,
    pub field: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Map {
    pub ident: String,
    pub key: Option<ExprId>,
    pub ty: TypeSource,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Variable {
    pub ident: String,
    pub ty: TypeSource,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Binop {
    pub left: ExprId,
    pub op: BinaryOp,
    pub right: ExprId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unop {
    pub op: UnaryOp,
    pub expr: ExprId,
    pub is_post: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ternary {
    pub cond: ExprId,
    pub left: ExprId,
    pub right: ExprId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldAccess {
    pub expr: ExprId,
    pub field: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArrayAccess {
    pub expr: ExprId,
    pub index: ExprId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cast {
    pub ty: SizedType,
    pub expr: ExprId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tuple {
    pub elems: Vec<ExprId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExprKind {
    Integer(IntegerLiteral),
    String(StringLiteral),
    StackMode(StackModeLiteral),
    PositionalParameter(PositionalParameter),
    Identifier(Identifier),
    Builtin(Builtin),
    Call(Call),
    Sizeof(Sizeof),
    Offsetof(Offsetof),
    Map(Map),
    Variable(Variable),
    Binop(Binop),
    Unop(Unop),
    Ternary(Ternary),
    FieldAccess(FieldAccess),
    ArrayAccess(ArrayAccess),
    Cast(Cast),
    Tuple(Tuple),
}

/// Payload-free discriminant of [`ExprKind`], cheap to copy out of the arena
/// before dispatching on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExprTag {
    Integer,
    String,
    StackMode,
    PositionalParameter,
    Identifier,
    Builtin,
    Call,
    Sizeof,
    Offsetof,
    Map,
    Variable,
    Binop,
    Unop,
    Ternary,
    FieldAccess,
    ArrayAccess,
    Cast,
    Tuple,
}

impl ExprKind {
    pub fn tag(&self) -> ExprTag {
        match self {
            ExprKind::Integer(_) => ExprTag::Integer,
            ExprKind::String(_) => ExprTag::String,
            ExprKind::StackMode(_) => ExprTag::StackMode,
            ExprKind::PositionalParameter(_) => ExprTag::PositionalParameter,
            ExprKind::Identifier(_) => ExprTag::Identifier,
            ExprKind::Builtin(_) => ExprTag::Builtin,
            ExprKind::Call(_) => ExprTag::Call,
            ExprKind::Sizeof(_) => ExprTag::Sizeof,
            ExprKind::Offsetof(_) => ExprTag::Offsetof,
            ExprKind::Map(_) => ExprTag::Map,
            ExprKind::Variable(_) => ExprTag::Variable,
            ExprKind::Binop(_) => ExprTag::Binop,
            ExprKind::Unop(_) => ExprTag::Unop,
            ExprKind::Ternary(_) => ExprTag::Ternary,
            ExprKind::FieldAccess(_) => ExprTag::FieldAccess,
            ExprKind::ArrayAccess(_) => ExprTag::ArrayAccess,
            ExprKind::Cast(_) => ExprTag::Cast,
            ExprKind::Tuple(_) => ExprTag::Tuple,
        }
    }

    /// Slot holding the assigned type of a variable-typed expression.
    pub fn type_source(&self) -> Option<&TypeSource> {
        match self {
            ExprKind::Identifier(node) => Some(&node.ty),
            ExprKind::Builtin(node) => Some(&node.ty),
            ExprKind::Call(node) => Some(&node.ty),
            ExprKind::Map(node) => Some(&node.ty),
            ExprKind::Variable(node) => Some(&node.ty),
            _ => None,
        }
    }

    pub fn type_source_mut(&mut self) -> Option<&mut TypeSource> {
        match self {
            ExprKind::Identifier(node) => Some(&mut node.ty),
            ExprKind::Builtin(node) => Some(&mut node.ty),
            ExprKind::Call(node) => Some(&mut node.ty),
            ExprKind::Map(node) => Some(&mut node.ty),
            ExprKind::Variable(node) => Some(&mut node.ty),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Expr {
    pub kind: ExprKind,
    pub loc: Location,
    /// Map this expression is assigned into.
    pub map: Option<ExprId>,
    /// Variable this expression is assigned into.
    pub var: Option<ExprId>,
    /// Set on a map's key expression, pointing back at the map.
    pub key_for_map: Option<ExprId>,
}

impl Expr {
    pub fn new(kind: ExprKind, loc: Location) -> Self {
        Self {
            kind,
            loc,
            map: None,
            var: None,
            key_for_map: None,
        }
    }

    pub fn tag(&self) -> ExprTag {
        self.kind.tag()
    }

    pub fn as_integer(&self) -> Option<i64> {
        match &self.kind {
            ExprKind::Integer(lit) => Some(lit.value),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::String(lit) => Some(&lit.value),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Map> {
        match &self.kind {
            ExprKind::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_call(&self) -> Option<&Call> {
        match &self.kind {
            ExprKind::Call(call) => Some(call),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExprStatement {
    pub expr: ExprId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VarDeclStatement {
    pub var: ExprId,
    pub declared: Option<SizedType>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssignMapStatement {
    pub map: ExprId,
    pub expr: ExprId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssignVarStatement {
    pub var: ExprId,
    pub expr: ExprId,
    /// Set for `let $x = ...`.
    pub var_decl: Option<StmtId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssignConfigVarStatement {
    pub config_var: String,
    pub expr: ExprId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub stmts: Vec<StmtId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct If {
    pub cond: ExprId,
    pub then_block: StmtId,
    pub else_block: Option<StmtId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unroll {
    pub expr: ExprId,
    pub block: StmtId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JumpKind {
    Return,
    Break,
    Continue,
}

impl JumpKind {
    pub fn keyword(self) -> &'static str {
        match self {
            JumpKind::Return => "return",
            JumpKind::Break => "break",
            JumpKind::Continue => "continue",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Jump {
    pub kind: JumpKind,
    pub return_value: Option<ExprId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct While {
    pub cond: ExprId,
    pub block: StmtId,
}

/// `for ($kv : @map) { ... }`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct For {
    pub decl: ExprId,
    pub expr: ExprId,
    pub stmts: Vec<StmtId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigBlock {
    pub stmts: Vec<StmtId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StmtKind {
    Expr(ExprStatement),
    VarDecl(VarDeclStatement),
    AssignMap(AssignMapStatement),
    AssignVar(AssignVarStatement),
    AssignConfigVar(AssignConfigVarStatement),
    Block(Block),
    If(If),
    Unroll(Unroll),
    Jump(Jump),
    While(While),
    For(For),
    Config(ConfigBlock),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StmtTag {
    Expr,
    VarDecl,
    AssignMap,
    AssignVar,
    AssignConfigVar,
    Block,
    If,
    Unroll,
    Jump,
    While,
    For,
    Config,
}

impl StmtKind {
    pub fn tag(&self) -> StmtTag {
        match self {
            StmtKind::Expr(_) => StmtTag::Expr,
            StmtKind::VarDecl(_) => StmtTag::VarDecl,
            StmtKind::AssignMap(_) => StmtTag::AssignMap,
            StmtKind::AssignVar(_) => StmtTag::AssignVar,
            StmtKind::AssignConfigVar(_) => StmtTag::AssignConfigVar,
            StmtKind::Block(_) => StmtTag::Block,
            StmtKind::If(_) => StmtTag::If,
            StmtKind::Unroll(_) => StmtTag::Unroll,
            StmtKind::Jump(_) => StmtTag::Jump,
            StmtKind::While(_) => StmtTag::While,
            StmtKind::For(_) => StmtTag::For,
            StmtKind::Config(_) => StmtTag::Config,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub loc: Location,
}

impl Stmt {
    pub fn new(kind: StmtKind, loc: Location) -> Self {
        Self { kind, loc }
    }

    pub fn tag(&self) -> StmtTag {
        self.kind.tag()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Predicate {
    pub expr: ExprId,
    pub loc: Location,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Probe {
    pub attach_points: Vec<AttachPointId>,
    pub pred: Option<Predicate>,
    /// Always a [`StmtKind::Block`].
    pub block: StmtId,
    pub need_expansion: bool,
    pub index: usize,
    pub loc: Location,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubprogArg {
    pub name: String,
    pub ty: SizedType,
    pub loc: Location,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Subprog {
    pub name: String,
    pub return_type: SizedType,
    pub args: Vec<SubprogArg>,
    pub stmts: Vec<StmtId>,
    pub loc: Location,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Program {
    pub c_definitions: String,
    /// Always a [`StmtKind::Config`] when present.
    pub config: Option<StmtId>,
    pub functions: Vec<SubprogId>,
    pub probes: Vec<ProbeId>,
    pub loc: Location,
}
