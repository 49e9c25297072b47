//! Semantic type lattice of the cross-compiler.
//!
//! A `TypeDenoter` is the resolved type of an expression or declaration.
//! The lattice is closed: base scalar/vector/matrix types, buffer and
//! sampler objects, struct references, typedef aliases, arrays, and void.
//! Struct references are index handles into the analyzer-owned
//! `StructRegistry`, which records members in base-first order so all
//! traversals follow the HLSL inheritance shadow order.

use crate::ast::Semantic;
use std::fmt;

/// Handle of a struct record in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StructId(pub usize);

/// Handle of a symbol in the analyzer's symbol arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Bool,
    Int,
    UInt,
    Half,
    Float,
    Double,
}

impl ScalarType {
    pub fn is_integral(self) -> bool {
        matches!(self, ScalarType::Int | ScalarType::UInt)
    }

    pub fn is_real(self) -> bool {
        matches!(self, ScalarType::Half | ScalarType::Float | ScalarType::Double)
    }

    fn hlsl_name(self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::Int => "int",
            ScalarType::UInt => "uint",
            ScalarType::Half => "half",
            ScalarType::Float => "float",
            ScalarType::Double => "double",
        }
    }

    fn from_hlsl_name(name: &str) -> Option<ScalarType> {
        match name {
            "bool" => Some(ScalarType::Bool),
            "int" | "dword" => Some(ScalarType::Int),
            "uint" => Some(ScalarType::UInt),
            "half" => Some(ScalarType::Half),
            "float" => Some(ScalarType::Float),
            "double" => Some(ScalarType::Double),
            _ => None,
        }
    }
}

/// Structural base data type: scalar, vector, or matrix of a scalar.
/// String only occurs for string literals and never enters arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Scalar(ScalarType),
    Vector(ScalarType, u8),
    Matrix(ScalarType, u8, u8),
    String,
}

impl DataType {
    /// Parses an HLSL type keyword like `float`, `int3` or `float4x4`.
    pub fn from_hlsl_ident(ident: &str) -> Option<DataType> {
        if let Some(scalar) = ScalarType::from_hlsl_name(ident) {
            return Some(DataType::Scalar(scalar));
        }
        // Suffix forms: <scalar>N and <scalar>NxM with N, M in 1..=4.
        let bytes = ident.as_bytes();
        if bytes.len() >= 2 {
            let last = bytes[bytes.len() - 1];
            if bytes.len() >= 4 && bytes[bytes.len() - 2] == b'x' {
                let rows = (bytes[bytes.len() - 3] as char).to_digit(10)?;
                let cols = (last as char).to_digit(10)?;
                let base = &ident[..ident.len() - 3];
                if (1..=4).contains(&rows) && (1..=4).contains(&cols) {
                    let scalar = ScalarType::from_hlsl_name(base)?;
                    return Some(DataType::Matrix(scalar, rows as u8, cols as u8));
                }
            }
            if let Some(n) = (last as char).to_digit(10) {
                let base = &ident[..ident.len() - 1];
                if (1..=4).contains(&n) {
                    let scalar = ScalarType::from_hlsl_name(base)?;
                    return Some(DataType::Vector(scalar, n as u8));
                }
            }
        }
        None
    }

    pub fn scalar_type(&self) -> Option<ScalarType> {
        match self {
            DataType::Scalar(s) | DataType::Vector(s, _) | DataType::Matrix(s, _, _) => Some(*s),
            DataType::String => None,
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, DataType::Scalar(_))
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, DataType::Vector(_, _))
    }

    pub fn is_matrix(&self) -> bool {
        matches!(self, DataType::Matrix(_, _, _))
    }

    /// Number of components for broadcast checks: 1 for scalars, N for
    /// vectors, (rows, cols) flattened for matrices.
    pub fn dimensions(&self) -> (u8, u8) {
        match self {
            DataType::Scalar(_) | DataType::String => (1, 1),
            DataType::Vector(_, n) => (*n, 1),
            DataType::Matrix(_, r, c) => (*r, *c),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Scalar(s) => write!(f, "{}", s.hlsl_name()),
            DataType::Vector(s, n) => write!(f, "{}{}", s.hlsl_name(), n),
            DataType::Matrix(s, r, c) => write!(f, "{}{}x{}", s.hlsl_name(), r, c),
            DataType::String => write!(f, "string"),
        }
    }
}

/// HLSL buffer/texture object types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferType {
    Buffer,
    StructuredBuffer,
    ByteAddressBuffer,
    RwBuffer,
    RwStructuredBuffer,
    RwByteAddressBuffer,
    Texture1D,
    Texture1DArray,
    Texture2D,
    Texture2DArray,
    Texture2DMs,
    Texture3D,
    TextureCube,
    TextureCubeArray,
    RwTexture1D,
    RwTexture2D,
    RwTexture3D,
}

impl BufferType {
    pub fn from_ident(ident: &str) -> Option<BufferType> {
        match ident {
            "Buffer" => Some(BufferType::Buffer),
            "StructuredBuffer" => Some(BufferType::StructuredBuffer),
            "ByteAddressBuffer" => Some(BufferType::ByteAddressBuffer),
            "RWBuffer" => Some(BufferType::RwBuffer),
            "RWStructuredBuffer" => Some(BufferType::RwStructuredBuffer),
            "RWByteAddressBuffer" => Some(BufferType::RwByteAddressBuffer),
            "Texture1D" => Some(BufferType::Texture1D),
            "Texture1DArray" => Some(BufferType::Texture1DArray),
            "Texture2D" => Some(BufferType::Texture2D),
            "Texture2DArray" => Some(BufferType::Texture2DArray),
            "Texture2DMS" => Some(BufferType::Texture2DMs),
            "Texture3D" => Some(BufferType::Texture3D),
            "TextureCube" => Some(BufferType::TextureCube),
            "TextureCubeArray" => Some(BufferType::TextureCubeArray),
            "RWTexture1D" => Some(BufferType::RwTexture1D),
            "RWTexture2D" => Some(BufferType::RwTexture2D),
            "RWTexture3D" => Some(BufferType::RwTexture3D),
            _ => None,
        }
    }

    pub fn is_texture(self) -> bool {
        use BufferType::*;
        matches!(
            self,
            Texture1D
                | Texture1DArray
                | Texture2D
                | Texture2DArray
                | Texture2DMs
                | Texture3D
                | TextureCube
                | TextureCubeArray
                | RwTexture1D
                | RwTexture2D
                | RwTexture3D
        )
    }

    pub fn is_read_write(self) -> bool {
        use BufferType::*;
        matches!(
            self,
            RwBuffer | RwStructuredBuffer | RwByteAddressBuffer | RwTexture1D | RwTexture2D
                | RwTexture3D
        )
    }

    pub fn hlsl_name(self) -> &'static str {
        use BufferType::*;
        match self {
            Buffer => "Buffer",
            StructuredBuffer => "StructuredBuffer",
            ByteAddressBuffer => "ByteAddressBuffer",
            RwBuffer => "RWBuffer",
            RwStructuredBuffer => "RWStructuredBuffer",
            RwByteAddressBuffer => "RWByteAddressBuffer",
            Texture1D => "Texture1D",
            Texture1DArray => "Texture1DArray",
            Texture2D => "Texture2D",
            Texture2DArray => "Texture2DArray",
            Texture2DMs => "Texture2DMS",
            Texture3D => "Texture3D",
            TextureCube => "TextureCube",
            TextureCubeArray => "TextureCubeArray",
            RwTexture1D => "RWTexture1D",
            RwTexture2D => "RWTexture2D",
            RwTexture3D => "RWTexture3D",
        }
    }
}

/// HLSL sampler object types (the legacy DX9 forms and the DX10+ state).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamplerType {
    Sampler1D,
    Sampler2D,
    Sampler3D,
    SamplerCube,
    SamplerState,
    SamplerComparisonState,
}

impl SamplerType {
    pub fn from_ident(ident: &str) -> Option<SamplerType> {
        match ident {
            "sampler" | "sampler2D" => Some(SamplerType::Sampler2D),
            "sampler1D" => Some(SamplerType::Sampler1D),
            "sampler3D" => Some(SamplerType::Sampler3D),
            "samplerCUBE" => Some(SamplerType::SamplerCube),
            "SamplerState" => Some(SamplerType::SamplerState),
            "SamplerComparisonState" => Some(SamplerType::SamplerComparisonState),
            _ => None,
        }
    }

    pub fn hlsl_name(self) -> &'static str {
        match self {
            SamplerType::Sampler1D => "sampler1D",
            SamplerType::Sampler2D => "sampler2D",
            SamplerType::Sampler3D => "sampler3D",
            SamplerType::SamplerCube => "samplerCUBE",
            SamplerType::SamplerState => "SamplerState",
            SamplerType::SamplerComparisonState => "SamplerComparisonState",
        }
    }
}

/// Semantic type of an expression or declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDenoter {
    /// Only valid as a function return type.
    Void,
    Base(DataType),
    Buffer {
        buffer_type: BufferType,
        /// Element type for templated objects like `Texture2D<float4>`.
        elem: Option<Box<TypeDenoter>>,
    },
    Sampler(SamplerType),
    Struct {
        ident: String,
        struct_ref: Option<StructId>,
    },
    Alias {
        ident: String,
        aliased: Box<TypeDenoter>,
    },
    Array {
        base: Box<TypeDenoter>,
        /// Evaluated dimensions in declarator order; `None` is unsized.
        dims: Vec<Option<u64>>,
    },
}

impl TypeDenoter {
    pub fn base(data_type: DataType) -> TypeDenoter {
        TypeDenoter::Base(data_type)
    }

    pub fn scalar(scalar: ScalarType) -> TypeDenoter {
        TypeDenoter::Base(DataType::Scalar(scalar))
    }

    pub fn vector(scalar: ScalarType, n: u8) -> TypeDenoter {
        if n == 1 {
            Self::scalar(scalar)
        } else {
            TypeDenoter::Base(DataType::Vector(scalar, n))
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self.deref_alias(), TypeDenoter::Void)
    }

    pub fn is_base(&self) -> bool {
        matches!(self.deref_alias(), TypeDenoter::Base(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.deref_alias(), TypeDenoter::Array { .. })
    }

    pub fn is_struct(&self) -> bool {
        matches!(self.deref_alias(), TypeDenoter::Struct { .. })
    }

    pub fn as_data_type(&self) -> Option<DataType> {
        match self.deref_alias() {
            TypeDenoter::Base(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_struct_ref(&self) -> Option<StructId> {
        match self.deref_alias() {
            TypeDenoter::Struct { struct_ref, .. } => *struct_ref,
            _ => None,
        }
    }

    /// Follows typedef aliases to their fixed point.
    pub fn deref_alias(&self) -> &TypeDenoter {
        let mut t = self;
        while let TypeDenoter::Alias { aliased, .. } = t {
            t = aliased;
        }
        t
    }

    /// Structural, alias-transparent equality.
    pub fn equals(&self, other: &TypeDenoter) -> bool {
        match (self.deref_alias(), other.deref_alias()) {
            (TypeDenoter::Void, TypeDenoter::Void) => true,
            (TypeDenoter::Base(a), TypeDenoter::Base(b)) => a == b,
            (
                TypeDenoter::Buffer {
                    buffer_type: a,
                    elem: ea,
                },
                TypeDenoter::Buffer {
                    buffer_type: b,
                    elem: eb,
                },
            ) => {
                a == b
                    && match (ea, eb) {
                        (None, None) => true,
                        (Some(x), Some(y)) => x.equals(y),
                        _ => false,
                    }
            }
            (TypeDenoter::Sampler(a), TypeDenoter::Sampler(b)) => a == b,
            (
                TypeDenoter::Struct {
                    ident: ia,
                    struct_ref: ra,
                },
                TypeDenoter::Struct {
                    ident: ib,
                    struct_ref: rb,
                },
            ) => match (ra, rb) {
                (Some(x), Some(y)) => x == y,
                _ => ia == ib,
            },
            (
                TypeDenoter::Array { base: ba, dims: da },
                TypeDenoter::Array { base: bb, dims: db },
            ) => ba.equals(bb) && da == db,
            _ => false,
        }
    }

    /// Implicit-conversion check. Struct-to-struct casts need the registry
    /// for the transitive inheritance walk.
    pub fn is_castable_to(&self, target: &TypeDenoter, registry: &StructRegistry) -> bool {
        if self.equals(target) {
            return true;
        }
        match (self.deref_alias(), target.deref_alias()) {
            (TypeDenoter::Base(from), TypeDenoter::Base(to)) => is_castable_base(*from, *to),
            (
                TypeDenoter::Array { base: ba, dims: da },
                TypeDenoter::Array { base: bb, dims: db },
            ) => {
                da.len() == db.len()
                    && da.iter().zip(db.iter()).all(|(x, y)| match (x, y) {
                        (Some(a), Some(b)) => a == b,
                        _ => true,
                    })
                    && ba.is_castable_to(bb, registry)
            }
            (
                TypeDenoter::Struct { struct_ref: ra, .. },
                TypeDenoter::Struct { struct_ref: rb, .. },
            ) => match (ra, rb) {
                (Some(a), Some(b)) => registry.inherits_from(*a, *b),
                _ => false,
            },
            // Buffers and samplers are invariant.
            _ => false,
        }
    }

    /// Whether an implicit cast to `target` loses components (e.g.
    /// float4 -> float) or scalar width (e.g. double -> float). Callers
    /// surface this as a warning.
    pub fn is_narrowing_cast_to(&self, target: &TypeDenoter) -> bool {
        match (self.deref_alias(), target.deref_alias()) {
            (TypeDenoter::Base(from), TypeDenoter::Base(to)) => {
                let (fr, fc) = from.dimensions();
                let (tr, tc) = to.dimensions();
                if (fr as u32 * fc as u32) > (tr as u32 * tc as u32) {
                    return true;
                }
                let width = |s: ScalarType| match s {
                    ScalarType::Half => 1,
                    ScalarType::Double => 3,
                    _ => 2,
                };
                match (from.scalar_type(), to.scalar_type()) {
                    (Some(f), Some(t)) => f.is_real() && t.is_real() && width(f) > width(t),
                    _ => false,
                }
            }
            _ => false,
        }
    }

    /// Wraps the denoter in array dimensions (declarator order preserved).
    /// An empty dimension list leaves the denoter unchanged.
    pub fn as_array(self, dims: Vec<Option<u64>>) -> TypeDenoter {
        if dims.is_empty() {
            self
        } else {
            TypeDenoter::Array {
                base: Box::new(self),
                dims,
            }
        }
    }

    /// Peels `num_indices` array accesses. Indexing past the declared
    /// array dimensions continues into vector and matrix components.
    pub fn get_from_array(
        &self,
        num_indices: usize,
        registry: &StructRegistry,
    ) -> Result<TypeDenoter, String> {
        let mut current = self.deref_alias().clone();
        let mut remaining = num_indices;
        while remaining > 0 {
            current = match current {
                TypeDenoter::Array { base, dims } => {
                    if remaining >= dims.len() {
                        remaining -= dims.len();
                        base.deref_alias().clone()
                    } else {
                        let left = dims.len() - remaining;
                        remaining = 0;
                        TypeDenoter::Array {
                            base,
                            dims: vec![None; left],
                        }
                    }
                }
                TypeDenoter::Base(DataType::Vector(scalar, _)) => {
                    remaining -= 1;
                    TypeDenoter::scalar(scalar)
                }
                TypeDenoter::Base(DataType::Matrix(scalar, _, cols)) => {
                    remaining -= 1;
                    TypeDenoter::vector(scalar, cols)
                }
                TypeDenoter::Buffer {
                    elem: Some(elem), ..
                } => {
                    remaining -= 1;
                    elem.deref_alias().clone()
                }
                other => {
                    return Err(format!(
                        "illegal array access to non-array type '{}'",
                        other.to_type_string(registry)
                    ))
                }
            };
        }
        Ok(current)
    }

    /// Resolves a single member access: struct member lookup (base-first)
    /// or vector swizzle.
    pub fn get_member(&self, ident: &str, registry: &StructRegistry) -> Result<TypeDenoter, String> {
        match self.deref_alias() {
            TypeDenoter::Struct {
                ident: struct_ident,
                struct_ref,
            } => {
                let id = struct_ref.ok_or_else(|| {
                    format!("unresolved reference to 'struct {}'", struct_ident)
                })?;
                match registry.fetch_member(id, ident) {
                    Some(member) => Ok(member.ty.clone()),
                    None => Err(format!(
                        "undefined member '{}' in '{}'",
                        ident,
                        registry.signature_to_string(id)
                    )),
                }
            }
            TypeDenoter::Base(DataType::Scalar(scalar)) => {
                swizzle_type(*scalar, 1, ident)
                    .ok_or_else(|| format!("invalid swizzle '{}' on '{}'", ident, self))
            }
            TypeDenoter::Base(DataType::Vector(scalar, n)) => {
                swizzle_type(*scalar, *n, ident)
                    .ok_or_else(|| format!("invalid swizzle '{}' on '{}'", ident, self))
            }
            other => Err(format!(
                "member access on non-struct type '{}'",
                other.to_type_string(registry)
            )),
        }
    }

    /// Pretty-print with struct names resolved through the registry.
    pub fn to_type_string(&self, registry: &StructRegistry) -> String {
        match self {
            TypeDenoter::Struct {
                struct_ref: Some(id),
                ..
            } => registry.signature_to_string(*id),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for TypeDenoter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDenoter::Void => write!(f, "void"),
            TypeDenoter::Base(dt) => write!(f, "{}", dt),
            TypeDenoter::Buffer { buffer_type, elem } => {
                write!(f, "{}", buffer_type.hlsl_name())?;
                if let Some(elem) = elem {
                    write!(f, "<{}>", elem)?;
                }
                Ok(())
            }
            TypeDenoter::Sampler(s) => write!(f, "{}", s.hlsl_name()),
            TypeDenoter::Struct { ident, .. } => {
                if ident.is_empty() {
                    write!(f, "struct <anonymous>")
                } else {
                    write!(f, "{}", ident)
                }
            }
            TypeDenoter::Alias { ident, .. } => write!(f, "{}", ident),
            TypeDenoter::Array { base, dims } => {
                write!(f, "{}", base)?;
                for dim in dims {
                    match dim {
                        Some(n) => write!(f, "[{}]", n)?,
                        None => write!(f, "[]")?,
                    }
                }
                Ok(())
            }
        }
    }
}

/// Base-to-base implicit conversion: any numeric/bool combination is
/// allowed as long as the component counts broadcast.
fn is_castable_base(from: DataType, to: DataType) -> bool {
    if from == DataType::String || to == DataType::String {
        return from == to;
    }
    let (fr, fc) = from.dimensions();
    let (tr, tc) = to.dimensions();
    let from_components = fr as u32 * fc as u32;
    let to_components = tr as u32 * tc as u32;
    // Scalars broadcast to anything and anything collapses to a scalar.
    if from_components == 1 || to_components == 1 {
        return true;
    }
    match (from, to) {
        (DataType::Vector(_, n), DataType::Vector(_, m)) => n == m || n == 1 || m == 1,
        (DataType::Matrix(_, r1, c1), DataType::Matrix(_, r2, c2)) => r1 == r2 && c1 == c2,
        // Vector <-> matrix conversions require a scalar side, handled above.
        _ => false,
    }
}

/// Swizzle resolution on a vector of `n` components: each character must
/// be a valid xyzw/rgba accessor within range.
fn swizzle_type(scalar: ScalarType, n: u8, swizzle: &str) -> Option<TypeDenoter> {
    if swizzle.is_empty() || swizzle.len() > 4 {
        return None;
    }
    for ch in swizzle.chars() {
        let component = match ch {
            'x' | 'r' => 0,
            'y' | 'g' => 1,
            'z' | 'b' => 2,
            'w' | 'a' => 3,
            _ => return None,
        };
        if component >= n {
            return None;
        }
    }
    Some(TypeDenoter::vector(scalar, swizzle.len() as u8))
}

/// One member of a struct record.
#[derive(Debug, Clone)]
pub struct StructMember {
    pub ident: String,
    pub ty: TypeDenoter,
    pub semantic: Option<Semantic>,
    /// Const-ness of the member's declaring statement.
    pub is_const: bool,
}

/// A registered struct declaration: its own members plus an optional base.
#[derive(Debug, Clone)]
pub struct StructRecord {
    pub ident: String,
    pub base: Option<StructId>,
    pub members: Vec<StructMember>,
    /// Set when the struct is an entry-point input/output aggregate that
    /// must be flattened into individual stage variables.
    pub must_resolve: bool,
}

/// Arena of struct records, owned by the analyzer. All member traversals
/// visit the base struct first (HLSL inheritance shadow order).
#[derive(Debug, Default)]
pub struct StructRegistry {
    records: Vec<StructRecord>,
}

impl StructRegistry {
    pub fn new() -> Self {
        StructRegistry {
            records: Vec::new(),
        }
    }

    pub fn register(&mut self, record: StructRecord) -> StructId {
        self.records.push(record);
        StructId(self.records.len() - 1)
    }

    pub fn get(&self, id: StructId) -> &StructRecord {
        &self.records[id.0]
    }

    pub fn get_mut(&mut self, id: StructId) -> &mut StructRecord {
        &mut self.records[id.0]
    }

    pub fn signature_to_string(&self, id: StructId) -> String {
        let record = self.get(id);
        if record.ident.is_empty() {
            "struct <anonymous>".to_string()
        } else {
            format!("struct {}", record.ident)
        }
    }

    /// Fetches a member by name, searching the base struct first.
    pub fn fetch_member(&self, id: StructId, ident: &str) -> Option<&StructMember> {
        let record = self.get(id);
        if let Some(base) = record.base {
            if let Some(member) = self.fetch_member(base, ident) {
                return Some(member);
            }
        }
        record.members.iter().find(|m| m.ident == ident)
    }

    /// Total member count including inherited members.
    pub fn num_members(&self, id: StructId) -> usize {
        let record = self.get(id);
        let base = record.base.map_or(0, |b| self.num_members(b));
        base + record.members.len()
    }

    /// Collects member type denoters base-first.
    pub fn collect_member_type_denoters(&self, id: StructId, out: &mut Vec<TypeDenoter>) {
        let record = self.get(id);
        if let Some(base) = record.base {
            self.collect_member_type_denoters(base, out);
        }
        for member in &record.members {
            out.push(member.ty.clone());
        }
    }

    /// Collects members base-first (for flattening in declaration order).
    pub fn collect_members(&self, id: StructId, out: &mut Vec<StructMember>) {
        let record = self.get(id);
        if let Some(base) = record.base {
            self.collect_members(base, out);
        }
        out.extend(record.members.iter().cloned());
    }

    pub fn has_non_system_value_members(&self, id: StructId) -> bool {
        let record = self.get(id);
        if let Some(base) = record.base {
            if self.has_non_system_value_members(base) {
                return true;
            }
        }
        record
            .members
            .iter()
            .any(|m| !m.semantic.as_ref().map_or(false, |s| s.is_system_value()))
    }

    /// True when `id` equals `target` or transitively inherits from it.
    pub fn inherits_from(&self, id: StructId, target: StructId) -> bool {
        if id == target {
            return true;
        }
        let mut current = self.get(id).base;
        while let Some(base) = current {
            if base == target {
                return true;
            }
            current = self.get(base).base;
        }
        false
    }
}

/// Tagged scalar used to re-parse and re-serialize literal values when a
/// literal is converted to another data type. Integer round-trips are
/// lossless in range; real serialization uses the shortest representation
/// that parses back to the same IEEE-754 double.
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    Bool(bool),
    Int(i64),
    Real(f64),
    Str(String),
}

impl Variant {
    pub fn parse(value: &str) -> Variant {
        let trimmed = value.trim();
        match trimmed {
            "true" => return Variant::Bool(true),
            "false" => return Variant::Bool(false),
            _ => {}
        }
        let digits = trimmed.strip_suffix(['u', 'U']).unwrap_or(trimmed);
        if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
            if let Ok(n) = i64::from_str_radix(hex, 16) {
                return Variant::Int(n);
            }
        }
        if let Ok(n) = digits.parse::<i64>() {
            return Variant::Int(n);
        }
        if let Ok(r) = digits.parse::<f64>() {
            return Variant::Real(r);
        }
        Variant::Str(trimmed.to_string())
    }

    pub fn to_bool(&self) -> Variant {
        match self {
            Variant::Bool(b) => Variant::Bool(*b),
            Variant::Int(n) => Variant::Bool(*n != 0),
            Variant::Real(r) => Variant::Bool(*r != 0.0),
            Variant::Str(_) => Variant::Bool(false),
        }
    }

    pub fn to_int(&self) -> Variant {
        match self {
            Variant::Bool(b) => Variant::Int(*b as i64),
            Variant::Int(n) => Variant::Int(*n),
            Variant::Real(r) => Variant::Int(*r as i64),
            Variant::Str(_) => Variant::Int(0),
        }
    }

    pub fn to_real(&self) -> Variant {
        match self {
            Variant::Bool(b) => Variant::Real(if *b { 1.0 } else { 0.0 }),
            Variant::Int(n) => Variant::Real(*n as f64),
            Variant::Real(r) => Variant::Real(*r),
            Variant::Str(_) => Variant::Real(0.0),
        }
    }

    pub fn serialize(&self) -> String {
        match self {
            Variant::Bool(b) => b.to_string(),
            Variant::Int(n) => n.to_string(),
            Variant::Real(r) => {
                if r.is_finite() && r.fract() == 0.0 && r.abs() < 1.0e16 {
                    format!("{:.1}", r)
                } else {
                    format!("{}", r)
                }
            }
            Variant::Str(s) => s.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn float3() -> TypeDenoter {
        TypeDenoter::vector(ScalarType::Float, 3)
    }

    fn float4() -> TypeDenoter {
        TypeDenoter::vector(ScalarType::Float, 4)
    }

    fn int4() -> TypeDenoter {
        TypeDenoter::vector(ScalarType::Int, 4)
    }

    #[test]
    fn test_data_type_parsing() {
        assert_eq!(
            DataType::from_hlsl_ident("float"),
            Some(DataType::Scalar(ScalarType::Float))
        );
        assert_eq!(
            DataType::from_hlsl_ident("float3"),
            Some(DataType::Vector(ScalarType::Float, 3))
        );
        assert_eq!(
            DataType::from_hlsl_ident("float4x4"),
            Some(DataType::Matrix(ScalarType::Float, 4, 4))
        );
        assert_eq!(
            DataType::from_hlsl_ident("uint2"),
            Some(DataType::Vector(ScalarType::UInt, 2))
        );
        assert_eq!(DataType::from_hlsl_ident("float5"), None);
        assert_eq!(DataType::from_hlsl_ident("foobar"), None);
    }

    #[test]
    fn test_equals_algebra() {
        let registry = StructRegistry::new();
        let types = [float3(), float4(), int4(), TypeDenoter::Void];
        // Reflexive.
        for t in &types {
            assert!(t.equals(t));
            assert!(t.is_castable_to(t, &registry));
        }
        // Symmetric.
        for a in &types {
            for b in &types {
                assert_eq!(a.equals(b), b.equals(a));
            }
        }
        // Equality implies castability both ways.
        assert!(float4().is_castable_to(&float4(), &registry));
    }

    #[test]
    fn test_alias_transparent_equality() {
        let alias = TypeDenoter::Alias {
            ident: "vec".to_string(),
            aliased: Box::new(float3()),
        };
        assert!(alias.equals(&float3()));
        assert!(float3().equals(&alias));
    }

    #[test]
    fn test_base_castability() {
        let registry = StructRegistry::new();
        let float1 = TypeDenoter::scalar(ScalarType::Float);
        // Scalar broadcasts to any shape.
        assert!(float1.is_castable_to(&float4(), &registry));
        assert!(float1.is_castable_to(
            &TypeDenoter::Base(DataType::Matrix(ScalarType::Float, 4, 4)),
            &registry
        ));
        // Same-size vectors of different scalars convert.
        assert!(float4().is_castable_to(&int4(), &registry));
        // Mismatched vector sizes do not.
        assert!(!float3().is_castable_to(&float4(), &registry));
        assert!(!float4().is_castable_to(&float3(), &registry));
        // bool <-> numeric converts.
        assert!(TypeDenoter::scalar(ScalarType::Bool)
            .is_castable_to(&TypeDenoter::scalar(ScalarType::Int), &registry));
    }

    #[test]
    fn test_struct_castability_via_inheritance() {
        let mut registry = StructRegistry::new();
        let base = registry.register(StructRecord {
            ident: "Base".to_string(),
            base: None,
            members: vec![],
            must_resolve: false,
        });
        let derived = registry.register(StructRecord {
            ident: "Derived".to_string(),
            base: Some(base),
            members: vec![],
            must_resolve: false,
        });
        let base_ty = TypeDenoter::Struct {
            ident: "Base".to_string(),
            struct_ref: Some(base),
        };
        let derived_ty = TypeDenoter::Struct {
            ident: "Derived".to_string(),
            struct_ref: Some(derived),
        };
        assert!(derived_ty.is_castable_to(&base_ty, &registry));
        assert!(!base_ty.is_castable_to(&derived_ty, &registry));
    }

    #[test]
    fn test_array_projection() {
        let registry = StructRegistry::new();
        let arr = float4().as_array(vec![Some(2), Some(3)]);
        // Peel one dimension.
        let inner = arr.get_from_array(1, &registry).unwrap();
        assert!(inner.is_array());
        // Peel both, then index into the vector.
        let elem = arr.get_from_array(3, &registry).unwrap();
        assert!(elem.equals(&TypeDenoter::scalar(ScalarType::Float)));
        // Too many indices.
        assert!(arr.get_from_array(4, &registry).is_err());
    }

    #[test]
    fn test_swizzle_member_projection() {
        let registry = StructRegistry::new();
        let v = float4();
        assert!(v
            .get_member("xyz", &registry)
            .unwrap()
            .equals(&float3()));
        assert!(v
            .get_member("w", &registry)
            .unwrap()
            .equals(&TypeDenoter::scalar(ScalarType::Float)));
        // Out-of-range component on a float3.
        assert!(float3().get_member("w", &registry).is_err());
        assert!(v.get_member("q", &registry).is_err());
    }

    #[test]
    fn test_struct_member_traversal_base_first() {
        let mut registry = StructRegistry::new();
        let base = registry.register(StructRecord {
            ident: "A".to_string(),
            base: None,
            members: vec![StructMember {
                ident: "p".to_string(),
                ty: float3(),
                semantic: None,
                is_const: false,
            }],
            must_resolve: false,
        });
        let derived = registry.register(StructRecord {
            ident: "B".to_string(),
            base: Some(base),
            members: vec![
                StructMember {
                    ident: "uv".to_string(),
                    ty: TypeDenoter::vector(ScalarType::Float, 2),
                    semantic: None,
                    is_const: false,
                },
                StructMember {
                    ident: "c".to_string(),
                    ty: float4(),
                    semantic: None,
                    is_const: false,
                },
            ],
            must_resolve: false,
        });
        assert_eq!(registry.num_members(derived), 3);
        let mut denoters = Vec::new();
        registry.collect_member_type_denoters(derived, &mut denoters);
        assert_eq!(denoters.len(), registry.num_members(derived));
        // Base member comes first.
        assert!(denoters[0].equals(&float3()));
        // Base member is found through the derived struct.
        assert!(registry.fetch_member(derived, "p").is_some());
        assert!(registry.has_non_system_value_members(derived));
    }

    #[test]
    fn test_system_value_only_struct() {
        let mut registry = StructRegistry::new();
        let id = registry.register(StructRecord {
            ident: "Out".to_string(),
            base: None,
            members: vec![StructMember {
                ident: "p".to_string(),
                ty: float4(),
                semantic: Some(Semantic::Position),
                is_const: false,
            }],
            must_resolve: false,
        });
        assert!(!registry.has_non_system_value_members(id));
    }

    #[test]
    fn test_variant_round_trip() {
        assert_eq!(Variant::parse("42"), Variant::Int(42));
        assert_eq!(Variant::parse("42u"), Variant::Int(42));
        assert_eq!(Variant::parse("0x1F"), Variant::Int(31));
        assert_eq!(Variant::parse("1.5"), Variant::Real(1.5));
        assert_eq!(Variant::parse("true"), Variant::Bool(true));
        // Integer round-trip is lossless.
        assert_eq!(Variant::Int(123456789).serialize(), "123456789");
        // Integral reals keep a decimal point.
        assert_eq!(Variant::Int(1).to_real().serialize(), "1.0");
        assert_eq!(Variant::parse("2").to_real().serialize(), "2.0");
        // Bit-exact double round-trip through the shortest representation.
        let r = Variant::Real(0.1);
        let text = r.serialize();
        assert_eq!(Variant::parse(&text), r);
    }
}
