//! Abstract syntax tree of the HLSL front-end.
//!
//! Nodes are created by the parser, mutated only by the analyzer (which
//! fills symbol handles and flattening flags), and read-only during code
//! generation. Every expression and identifier node carries a `NodeId`;
//! derived type denoters are memoized per id in the analyzer's type table.

use crate::ty::{DataType, SamplerType, StructId, SymbolId, TypeDenoter};
use crate::version::ShaderTarget;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeId(pub u32);

/// Source location (1-based line and column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub line: u32,
    pub column: u32,
}

impl Span {
    pub fn new(line: u32, column: u32) -> Self {
        Span { line, column }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Allocates node ids during parsing.
#[derive(Debug, Default)]
pub struct NodeCounter {
    next: u32,
}

impl NodeCounter {
    pub fn new() -> Self {
        NodeCounter { next: 0 }
    }

    pub fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub globals: Vec<Stmnt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmnt {
    Null(Span),
    VarDecl(VarDeclStmnt),
    StructDecl(StructDeclStmnt),
    Function(FunctionDecl),
    UniformBuffer(UniformBufferDecl),
    Buffer(BufferDeclStmnt),
    Sampler(SamplerDeclStmnt),
    Alias(AliasDeclStmnt),
    CodeBlock(CodeBlockStmnt),
    For(ForLoopStmnt),
    While(WhileLoopStmnt),
    DoWhile(DoWhileLoopStmnt),
    If(IfStmnt),
    Switch(SwitchStmnt),
    Expr(ExprStmnt),
    Return(ReturnStmnt),
    CtrlTransfer(CtrlTransferStmnt),
}

impl Stmnt {
    pub fn span(&self) -> Span {
        match self {
            Stmnt::Null(span) => *span,
            Stmnt::VarDecl(s) => s.span,
            Stmnt::StructDecl(s) => s.span,
            Stmnt::Function(s) => s.span,
            Stmnt::UniformBuffer(s) => s.span,
            Stmnt::Buffer(s) => s.span,
            Stmnt::Sampler(s) => s.span,
            Stmnt::Alias(s) => s.span,
            Stmnt::CodeBlock(s) => s.span,
            Stmnt::For(s) => s.span,
            Stmnt::While(s) => s.span,
            Stmnt::DoWhile(s) => s.span,
            Stmnt::If(s) => s.span,
            Stmnt::Switch(s) => s.span,
            Stmnt::Expr(s) => s.span,
            Stmnt::Return(s) => s.span,
            Stmnt::CtrlTransfer(s) => s.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CodeBlock {
    pub stmnts: Vec<Stmnt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlockStmnt {
    pub span: Span,
    pub code_block: CodeBlock,
}

/* ----- Declarations ----- */

#[derive(Debug, Clone, PartialEq)]
pub struct StructDeclStmnt {
    pub span: Span,
    pub struct_decl: StructDecl,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub span: Span,
    /// Empty for anonymous structs.
    pub ident: String,
    /// Single inheritance only.
    pub base_struct: Option<String>,
    pub members: Vec<VarDeclStmnt>,
    /// Registry handle, set by the analyzer.
    pub struct_ref: Option<StructId>,
}

impl StructDecl {
    pub fn is_anonymous(&self) -> bool {
        self.ident.is_empty()
    }

    pub fn signature_to_string(&self) -> String {
        if self.is_anonymous() {
            "struct <anonymous>".to_string()
        } else {
            format!("struct {}", self.ident)
        }
    }
}

/// Attribute before a function declaration, e.g. `[numthreads(8, 8, 1)]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionAttribute {
    pub span: Span,
    pub ident: String,
    pub arguments: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub span: Span,
    pub attribs: Vec<FunctionAttribute>,
    pub return_type: VarType,
    pub ident: String,
    pub parameters: Vec<VarDeclStmnt>,
    /// Semantic after the signature, e.g. `: SV_Position`.
    pub semantic: Option<Semantic>,
    /// Forward declarations have no code block.
    pub code_block: Option<CodeBlock>,
}

impl FunctionDecl {
    pub fn is_forward_decl(&self) -> bool {
        self.code_block.is_none()
    }

    pub fn has_void_return_type(&self) -> bool {
        self.return_type.denoter.is_void()
    }

    pub fn signature_to_string(&self) -> String {
        let params: Vec<String> = self
            .parameters
            .iter()
            .map(|p| p.var_type.denoter.to_string())
            .collect();
        format!("{} {}({})", self.return_type.denoter, self.ident, params.join(", "))
    }

    /// Leading parameters without default initializers.
    pub fn num_min_args(&self) -> usize {
        let mut n = 0;
        for param in &self.parameters {
            if param
                .var_decls
                .first()
                .map_or(false, |v| v.initializer.is_some())
            {
                break;
            }
            n += 1;
        }
        n
    }

    pub fn num_max_args(&self) -> usize {
        self.parameters.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformBufferType {
    ConstantBuffer,
    TextureBuffer,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UniformBufferDecl {
    pub span: Span,
    pub buffer_type: UniformBufferType,
    pub ident: String,
    pub registers: Vec<Register>,
    pub members: Vec<VarDeclStmnt>,
}

impl UniformBufferDecl {
    pub fn to_decl_string(&self) -> String {
        let keyword = match self.buffer_type {
            UniformBufferType::ConstantBuffer => "cbuffer",
            UniformBufferType::TextureBuffer => "tbuffer",
        };
        format!("{} {}", keyword, self.ident)
    }
}

/// Texture/buffer object declaration statement, e.g.
/// `Texture2D<float4> colorMap : register(t0);`
#[derive(Debug, Clone, PartialEq)]
pub struct BufferDeclStmnt {
    pub span: Span,
    pub denoter: TypeDenoter,
    pub buffer_decls: Vec<BufferDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BufferDecl {
    pub id: NodeId,
    pub span: Span,
    pub ident: String,
    pub array_dims: Vec<Option<Expr>>,
    pub registers: Vec<Register>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDeclStmnt {
    pub span: Span,
    pub sampler_type: SamplerType,
    pub sampler_decls: Vec<SamplerDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplerDecl {
    pub id: NodeId,
    pub span: Span,
    pub ident: String,
    pub array_dims: Vec<Option<Expr>>,
    pub registers: Vec<Register>,
}

/// Typedef alias declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct AliasDeclStmnt {
    pub span: Span,
    pub ident: String,
    pub denoter: TypeDenoter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputModifier {
    #[default]
    None,
    In,
    Out,
    InOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Static,
    Uniform,
    Extern,
    Volatile,
    Shared,
    GroupShared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeModifier {
    Const,
    RowMajor,
    ColumnMajor,
    Precise,
}

/// Declared type with its source location.
#[derive(Debug, Clone, PartialEq)]
pub struct VarType {
    pub span: Span,
    pub denoter: TypeDenoter,
}

/// Variable declaration statement: one type, one or more declarators.
/// Also used for function parameters and struct members.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDeclStmnt {
    pub span: Span,
    pub input_modifier: InputModifier,
    pub storage_classes: Vec<StorageClass>,
    pub type_modifiers: Vec<TypeModifier>,
    pub var_type: VarType,
    pub var_decls: Vec<VarDecl>,
}

impl VarDeclStmnt {
    pub fn is_input(&self) -> bool {
        !self.is_output() || self.input_modifier == InputModifier::InOut
    }

    pub fn is_output(&self) -> bool {
        matches!(self.input_modifier, InputModifier::Out | InputModifier::InOut)
    }

    pub fn is_uniform(&self) -> bool {
        self.storage_classes.contains(&StorageClass::Uniform)
    }

    pub fn is_const(&self) -> bool {
        self.is_uniform() || self.type_modifiers.contains(&TypeModifier::Const)
    }

    pub fn fetch(&self, ident: &str) -> Option<&VarDecl> {
        self.var_decls.iter().find(|v| v.ident == ident)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub id: NodeId,
    pub span: Span,
    pub ident: String,
    /// Array dimensions in declarator order; `None` is an unsized dim.
    pub array_dims: Vec<Option<Expr>>,
    pub semantic: Option<Semantic>,
    pub pack_offset: Option<PackOffset>,
    pub initializer: Option<Expr>,
    /// Set by the analyzer for entry-point locals whose struct type is
    /// flattened; such declarations are not emitted.
    pub is_entry_output_alias: bool,
    /// Symbol handle, set by the analyzer.
    pub symbol_ref: Option<SymbolId>,
}

impl VarDecl {
    pub fn to_decl_string(&self) -> String {
        let mut s = self.ident.clone();
        for _ in &self.array_dims {
            s.push_str("[]");
        }
        if let Some(semantic) = &self.semantic {
            s.push_str(" : ");
            s.push_str(&semantic.to_string());
        }
        s
    }
}

/* ----- Binding annotations ----- */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterType {
    ConstantBuffer, // b
    Texture,        // t
    Sampler,        // s
    UnorderedAccess, // u
    Legacy,         // c
}

impl RegisterType {
    pub fn from_prefix(ch: char) -> Option<RegisterType> {
        match ch {
            'b' => Some(RegisterType::ConstantBuffer),
            't' => Some(RegisterType::Texture),
            's' => Some(RegisterType::Sampler),
            'u' => Some(RegisterType::UnorderedAccess),
            'c' => Some(RegisterType::Legacy),
            _ => None,
        }
    }

    pub fn prefix(self) -> char {
        match self {
            RegisterType::ConstantBuffer => 'b',
            RegisterType::Texture => 't',
            RegisterType::Sampler => 's',
            RegisterType::UnorderedAccess => 'u',
            RegisterType::Legacy => 'c',
        }
    }
}

/// HLSL `register(...)` binding annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct Register {
    pub span: Span,
    /// Optional per-target profile restriction (e.g. `register(vs, b0)`).
    pub shader_target: ShaderTarget,
    pub register_type: RegisterType,
    pub slot: u32,
}

impl Register {
    pub fn to_decl_string(&self) -> String {
        format!("register({}{})", self.register_type.prefix(), self.slot)
    }

    /// Selects the register that applies to the given shader target.
    pub fn get_for_target(registers: &[Register], target: ShaderTarget) -> Option<&Register> {
        registers
            .iter()
            .find(|r| r.shader_target == ShaderTarget::Undefined || r.shader_target == target)
    }
}

/// HLSL `packoffset(...)` annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct PackOffset {
    pub span: Span,
    pub register_name: String,
    pub vector_component: Option<char>,
}

impl PackOffset {
    pub fn to_decl_string(&self) -> String {
        match self.vector_component {
            Some(c) => format!("packoffset({}.{})", self.register_name, c),
            None => format!("packoffset({})", self.register_name),
        }
    }
}

/* ----- Semantics ----- */

/// Parameter/return semantic: either a system value (`SV_...`) or a
/// user-defined string like `TEXCOORD0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Semantic {
    Position,
    Target(u32),
    Depth,
    VertexId,
    InstanceId,
    PrimitiveId,
    IsFrontFace,
    SampleIndex,
    DispatchThreadId,
    GroupId,
    GroupIndex,
    GroupThreadId,
    UserDefined(String),
}

impl Semantic {
    /// Parses a semantic identifier; system values match case-insensitively
    /// with an optional trailing index.
    pub fn parse(ident: &str) -> Semantic {
        let upper = ident.to_ascii_uppercase();
        let (name, index) = split_trailing_index(&upper);
        match name {
            "SV_POSITION" => Semantic::Position,
            "SV_TARGET" => Semantic::Target(index.unwrap_or(0)),
            "SV_DEPTH" => Semantic::Depth,
            "SV_VERTEXID" => Semantic::VertexId,
            "SV_INSTANCEID" => Semantic::InstanceId,
            "SV_PRIMITIVEID" => Semantic::PrimitiveId,
            "SV_ISFRONTFACE" => Semantic::IsFrontFace,
            "SV_SAMPLEINDEX" => Semantic::SampleIndex,
            "SV_DISPATCHTHREADID" => Semantic::DispatchThreadId,
            "SV_GROUPID" => Semantic::GroupId,
            "SV_GROUPINDEX" => Semantic::GroupIndex,
            "SV_GROUPTHREADID" => Semantic::GroupThreadId,
            _ => Semantic::UserDefined(ident.to_string()),
        }
    }

    pub fn is_system_value(&self) -> bool {
        !matches!(self, Semantic::UserDefined(_))
    }
}

fn split_trailing_index(s: &str) -> (&str, Option<u32>) {
    let trimmed = s.trim_end_matches(|c: char| c.is_ascii_digit());
    if trimmed.len() == s.len() {
        (s, None)
    } else {
        (trimmed, s[trimmed.len()..].parse().ok())
    }
}

impl fmt::Display for Semantic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Semantic::Position => write!(f, "SV_Position"),
            Semantic::Target(n) => write!(f, "SV_Target{}", n),
            Semantic::Depth => write!(f, "SV_Depth"),
            Semantic::VertexId => write!(f, "SV_VertexID"),
            Semantic::InstanceId => write!(f, "SV_InstanceID"),
            Semantic::PrimitiveId => write!(f, "SV_PrimitiveID"),
            Semantic::IsFrontFace => write!(f, "SV_IsFrontFace"),
            Semantic::SampleIndex => write!(f, "SV_SampleIndex"),
            Semantic::DispatchThreadId => write!(f, "SV_DispatchThreadID"),
            Semantic::GroupId => write!(f, "SV_GroupID"),
            Semantic::GroupIndex => write!(f, "SV_GroupIndex"),
            Semantic::GroupThreadId => write!(f, "SV_GroupThreadID"),
            Semantic::UserDefined(s) => write!(f, "{}", s),
        }
    }
}

/* ----- Statements ----- */

#[derive(Debug, Clone, PartialEq)]
pub struct ForLoopStmnt {
    pub span: Span,
    pub init: Box<Stmnt>,
    pub condition: Option<Expr>,
    pub iteration: Option<Expr>,
    pub body: Box<Stmnt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WhileLoopStmnt {
    pub span: Span,
    pub condition: Expr,
    pub body: Box<Stmnt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DoWhileLoopStmnt {
    pub span: Span,
    pub body: Box<Stmnt>,
    pub condition: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfStmnt {
    pub span: Span,
    pub condition: Expr,
    pub body: Box<Stmnt>,
    pub else_stmnt: Option<Box<Stmnt>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchStmnt {
    pub span: Span,
    pub selector: Expr,
    pub cases: Vec<SwitchCase>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub span: Span,
    /// `None` for the default case.
    pub expr: Option<Expr>,
    pub stmnts: Vec<Stmnt>,
}

impl SwitchCase {
    pub fn is_default_case(&self) -> bool {
        self.expr.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprStmnt {
    pub span: Span,
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnStmnt {
    pub span: Span,
    pub expr: Option<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtrlTransfer {
    Break,
    Continue,
    Discard,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CtrlTransferStmnt {
    pub span: Span,
    pub transfer: CtrlTransfer,
}

/* ----- Expressions ----- */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    LogicalAnd,
    LogicalOr,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRight,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl BinaryOp {
    /// Operators whose result is boolean.
    pub fn is_boolean(self) -> bool {
        use BinaryOp::*;
        matches!(
            self,
            LogicalAnd | LogicalOr | Equal | NotEqual | Less | LessEqual | Greater | GreaterEqual
        )
    }

    pub fn to_op_string(self) -> &'static str {
        use BinaryOp::*;
        match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            Mod => "%",
            LogicalAnd => "&&",
            LogicalOr => "||",
            BitAnd => "&",
            BitOr => "|",
            BitXor => "^",
            ShiftLeft => "<<",
            ShiftRight => ">>",
            Equal => "==",
            NotEqual => "!=",
            Less => "<",
            LessEqual => "<=",
            Greater => ">",
            GreaterEqual => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    LogicalNot,
    BitNot,
    Negate,
    Plus,
    Inc,
    Dec,
}

impl UnaryOp {
    pub fn is_logical(self) -> bool {
        matches!(self, UnaryOp::LogicalNot)
    }

    pub fn to_op_string(self) -> &'static str {
        match self {
            UnaryOp::LogicalNot => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::Negate => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Inc => "++",
            UnaryOp::Dec => "--",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl AssignOp {
    pub fn to_op_string(self) -> &'static str {
        match self {
            AssignOp::Set => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
            AssignOp::Mod => "%=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: NodeId,
    pub span: Span,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Placeholder for dynamic array dimensions.
    Null,
    /// Comma operator; the type is the first sub-expression's.
    List(Vec<Expr>),
    Literal(LiteralExpr),
    TypeName(TypeDenoter),
    Ternary {
        cond_expr: Box<Expr>,
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs_expr: Box<Expr>,
        rhs_expr: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    PostUnary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    Call(FunctionCall),
    Bracket(Box<Expr>),
    /// Member/swizzle suffix on a non-identifier expression,
    /// e.g. `foo().xyz`.
    Suffix {
        expr: Box<Expr>,
        var_ident: VarIdent,
    },
    ArrayAccess {
        expr: Box<Expr>,
        array_indices: Vec<Expr>,
    },
    Cast {
        denoter: TypeDenoter,
        expr: Box<Expr>,
    },
    VarAccess {
        var_ident: VarIdent,
        assign: Option<(AssignOp, Box<Expr>)>,
    },
    /// Initializer list `{ ... }`.
    Initializer(Vec<Expr>),
}

impl Expr {
    /// Flattened element count of an initializer list, recursing into
    /// nested initializers.
    pub fn num_initializer_elements(&self) -> usize {
        match &self.kind {
            ExprKind::Initializer(exprs) => {
                exprs.iter().map(Expr::num_initializer_elements).sum()
            }
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LiteralExpr {
    pub data_type: DataType,
    /// Literal text as written in the source (suffix included for UInt).
    pub value: String,
}

impl LiteralExpr {
    /// Returns string literal content without the quotation marks.
    pub fn string_value(&self) -> &str {
        if self.data_type == DataType::String
            && self.value.len() >= 2
            && self.value.starts_with('"')
            && self.value.ends_with('"')
        {
            &self.value[1..self.value.len() - 1]
        } else {
            ""
        }
    }
}

/// Resolution of a function call, filled in by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub span: Span,
    pub ident: String,
    /// Object for method-style calls like `tex.Sample(...)`.
    pub object: Option<Box<Expr>>,
    pub arguments: Vec<Expr>,
    /// Exactly one of the following is set after analysis.
    pub func_decl_ref: Option<FunctionId>,
    pub intrinsic: Option<crate::intrinsics::Intrinsic>,
    pub type_ctor: Option<TypeDenoter>,
}

/// Linked identifier segment: `ident[indices...]` with an optional
/// follow-up segment after `.`.
#[derive(Debug, Clone, PartialEq)]
pub struct VarIdent {
    pub id: NodeId,
    pub span: Span,
    pub ident: String,
    pub array_indices: Vec<Expr>,
    pub next: Option<Box<VarIdent>>,
    /// Symbol handle of the head segment, set by the analyzer.
    pub symbol_ref: Option<SymbolId>,
}

impl VarIdent {
    /// Dot-joined chain string.
    pub fn to_chain_string(&self) -> String {
        let mut name = String::new();
        let mut segment = self;
        loop {
            name.push_str(&segment.ident);
            match &segment.next {
                Some(next) => {
                    segment = next;
                    name.push('.');
                }
                None => break,
            }
        }
        name
    }

    pub fn last_var_ident(&self) -> &VarIdent {
        match &self.next {
            Some(next) => next.last_var_ident(),
            None => self,
        }
    }

    pub fn last_var_ident_mut(&mut self) -> &mut VarIdent {
        if self.next.is_some() {
            self.next.as_mut().unwrap().last_var_ident_mut()
        } else {
            self
        }
    }

    /// Replaces this segment with its follow-up (used to absorb resolved
    /// prefixes after flattening).
    pub fn pop_front(&mut self) {
        if let Some(next) = self.next.take() {
            let next = *next;
            self.id = next.id;
            self.ident = next.ident;
            self.array_indices = next.array_indices;
            self.next = next.next;
            self.symbol_ref = next.symbol_ref;
        }
    }

    /// Number of segments in the chain.
    pub fn chain_len(&self) -> usize {
        1 + self.next.as_ref().map_or(0, |n| n.chain_len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(counter: &mut NodeCounter, ident: &str, next: Option<VarIdent>) -> VarIdent {
        VarIdent {
            id: counter.next_id(),
            span: Span::default(),
            ident: ident.to_string(),
            array_indices: Vec::new(),
            next: next.map(Box::new),
            symbol_ref: None,
        }
    }

    #[test]
    fn test_var_ident_chain_string() {
        let mut counter = NodeCounter::new();
        let tail = segment(&mut counter, "xyz", None);
        let mid = segment(&mut counter, "p", Some(tail));
        let head = segment(&mut counter, "input", Some(mid));

        assert_eq!(head.to_chain_string(), "input.p.xyz");
        assert_eq!(head.last_var_ident().ident, "xyz");
        assert!(head.last_var_ident().next.is_none());
        assert_eq!(head.chain_len(), 3);
    }

    #[test]
    fn test_var_ident_pop_front() {
        let mut counter = NodeCounter::new();
        let tail = segment(&mut counter, "uv", None);
        let mut head = segment(&mut counter, "input", Some(tail));

        head.pop_front();
        assert_eq!(head.ident, "uv");
        assert!(head.next.is_none());
        assert_eq!(head.to_chain_string(), "uv");

        // Popping a single-segment chain is a no-op.
        head.pop_front();
        assert_eq!(head.ident, "uv");
    }

    #[test]
    fn test_semantic_parsing() {
        assert_eq!(Semantic::parse("SV_Position"), Semantic::Position);
        assert_eq!(Semantic::parse("SV_POSITION"), Semantic::Position);
        assert_eq!(Semantic::parse("SV_Target0"), Semantic::Target(0));
        assert_eq!(Semantic::parse("SV_Target3"), Semantic::Target(3));
        assert_eq!(Semantic::parse("SV_VertexID"), Semantic::VertexId);
        assert_eq!(
            Semantic::parse("TEXCOORD0"),
            Semantic::UserDefined("TEXCOORD0".to_string())
        );
        assert!(Semantic::parse("SV_Depth").is_system_value());
        assert!(!Semantic::parse("COLOR0").is_system_value());
    }

    #[test]
    fn test_initializer_element_count() {
        let mut counter = NodeCounter::new();
        let literal = |c: &mut NodeCounter| Expr {
            id: c.next_id(),
            span: Span::default(),
            kind: ExprKind::Literal(LiteralExpr {
                data_type: DataType::Scalar(crate::ty::ScalarType::Int),
                value: "1".to_string(),
            }),
        };
        let inner = Expr {
            id: counter.next_id(),
            span: Span::default(),
            kind: ExprKind::Initializer(vec![literal(&mut counter), literal(&mut counter)]),
        };
        let outer = Expr {
            id: counter.next_id(),
            span: Span::default(),
            kind: ExprKind::Initializer(vec![inner, literal(&mut counter)]),
        };
        assert_eq!(outer.num_initializer_elements(), 3);
    }

    #[test]
    fn test_function_default_parameter_arity() {
        // Build `void f(float a, float b = 1.0)` by hand.
        let mut counter = NodeCounter::new();
        let param = |c: &mut NodeCounter, ident: &str, has_init: bool| VarDeclStmnt {
            span: Span::default(),
            input_modifier: InputModifier::None,
            storage_classes: Vec::new(),
            type_modifiers: Vec::new(),
            var_type: VarType {
                span: Span::default(),
                denoter: TypeDenoter::scalar(crate::ty::ScalarType::Float),
            },
            var_decls: vec![VarDecl {
                id: c.next_id(),
                span: Span::default(),
                ident: ident.to_string(),
                array_dims: Vec::new(),
                semantic: None,
                pack_offset: None,
                initializer: has_init.then(|| Expr {
                    id: c.next_id(),
                    span: Span::default(),
                    kind: ExprKind::Literal(LiteralExpr {
                        data_type: DataType::Scalar(crate::ty::ScalarType::Float),
                        value: "1.0".to_string(),
                    }),
                }),
                is_entry_output_alias: false,
                symbol_ref: None,
            }],
        };
        let decl = FunctionDecl {
            span: Span::default(),
            attribs: Vec::new(),
            return_type: VarType {
                span: Span::default(),
                denoter: TypeDenoter::Void,
            },
            ident: "f".to_string(),
            parameters: vec![
                param(&mut counter, "a", false),
                param(&mut counter, "b", true),
            ],
            semantic: None,
            code_block: Some(CodeBlock::default()),
        };
        assert_eq!(decl.num_min_args(), 1);
        assert_eq!(decl.num_max_args(), 2);
        assert!(!decl.is_forward_decl());
        assert!(decl.has_void_return_type());
    }
}
