//! Intrinsic dispatcher: maps HLSL intrinsic calls to their GLSL
//! equivalents. The table is consulted twice per call site: by the
//! analyzer for argument-count checks and result-type derivation, and by
//! the generator for the emission shape.

use crate::ty::{DataType, ScalarType, TypeDenoter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    Abs,
    Acos,
    All,
    Any,
    Asin,
    Atan,
    Atan2,
    Ceil,
    Clamp,
    Clip,
    Cos,
    Cosh,
    Cross,
    Ddx,
    Ddy,
    Degrees,
    Determinant,
    Distance,
    Dot,
    Exp,
    Exp2,
    Floor,
    Fmod,
    Frac,
    IsInf,
    IsNan,
    Length,
    Lerp,
    Log,
    Log2,
    Max,
    Min,
    Mul,
    Normalize,
    Pow,
    Radians,
    Rcp,
    Reflect,
    Refract,
    Round,
    Rsqrt,
    Saturate,
    Sign,
    Sin,
    Sinh,
    SmoothStep,
    Sqrt,
    Step,
    Tan,
    Tanh,
    Transpose,
    Trunc,
    InterlockedAdd,
    InterlockedAnd,
    InterlockedOr,
    InterlockedXor,
    InterlockedMin,
    InterlockedMax,
    InterlockedExchange,
    InterlockedCompareExchange,
    Sample,
    Tex2D,
}

/// How the generator renders a call to this intrinsic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmissionShape {
    /// Ordinary call, possibly under a different GLSL name.
    Call(&'static str),
    /// `mul(A, B)` becomes `(A * B)` with operand order as given.
    BinaryMul,
    /// `rcp(x)` becomes `(1.0 / x)` with the literal typed to match x.
    Reciprocal,
    /// `saturate(x)` becomes `clamp(x, 0.0, 1.0)`.
    Clamp01,
    /// Atomic op; an optional third out-argument receives the original
    /// value from the GLSL return value.
    Atomic(&'static str),
    /// `clip(x)` calls a helper emitted once per translation unit.
    Clip,
    /// Texture sampling; the HLSL sampler-state argument is dropped.
    TextureSample,
}

/// How the analyzer derives the call's result type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeRule {
    SameAsArg0,
    ScalarOfArg0,
    BoolWithDimsOfArg0,
    BoolScalar,
    Float3,
    TransposeOfArg0,
    MulOfArgs,
    Void,
    Float4,
}

#[derive(Debug, Clone, Copy)]
pub struct IntrinsicDescriptor {
    pub name: &'static str,
    pub intrinsic: Intrinsic,
    pub min_args: usize,
    pub max_args: usize,
    pub shape: EmissionShape,
    /// Minimum GLSL version number required (auto-detect raises to it).
    pub min_glsl_version: Option<i32>,
    type_rule: TypeRule,
}

const fn entry(
    name: &'static str,
    intrinsic: Intrinsic,
    min_args: usize,
    max_args: usize,
    shape: EmissionShape,
    type_rule: TypeRule,
) -> IntrinsicDescriptor {
    IntrinsicDescriptor {
        name,
        intrinsic,
        min_args,
        max_args,
        shape,
        min_glsl_version: None,
        type_rule,
    }
}

const fn atomic(name: &'static str, intrinsic: Intrinsic, glsl: &'static str) -> IntrinsicDescriptor {
    IntrinsicDescriptor {
        name,
        intrinsic,
        min_args: 2,
        max_args: 3,
        shape: EmissionShape::Atomic(glsl),
        min_glsl_version: Some(430),
        type_rule: TypeRule::Void,
    }
}

static TABLE: &[IntrinsicDescriptor] = &[
    entry("abs", Intrinsic::Abs, 1, 1, EmissionShape::Call("abs"), TypeRule::SameAsArg0),
    entry("acos", Intrinsic::Acos, 1, 1, EmissionShape::Call("acos"), TypeRule::SameAsArg0),
    entry("all", Intrinsic::All, 1, 1, EmissionShape::Call("all"), TypeRule::BoolScalar),
    entry("any", Intrinsic::Any, 1, 1, EmissionShape::Call("any"), TypeRule::BoolScalar),
    entry("asin", Intrinsic::Asin, 1, 1, EmissionShape::Call("asin"), TypeRule::SameAsArg0),
    entry("atan", Intrinsic::Atan, 1, 1, EmissionShape::Call("atan"), TypeRule::SameAsArg0),
    entry("atan2", Intrinsic::Atan2, 2, 2, EmissionShape::Call("atan"), TypeRule::SameAsArg0),
    entry("ceil", Intrinsic::Ceil, 1, 1, EmissionShape::Call("ceil"), TypeRule::SameAsArg0),
    entry("clamp", Intrinsic::Clamp, 3, 3, EmissionShape::Call("clamp"), TypeRule::SameAsArg0),
    entry("clip", Intrinsic::Clip, 1, 1, EmissionShape::Clip, TypeRule::Void),
    entry("cos", Intrinsic::Cos, 1, 1, EmissionShape::Call("cos"), TypeRule::SameAsArg0),
    entry("cosh", Intrinsic::Cosh, 1, 1, EmissionShape::Call("cosh"), TypeRule::SameAsArg0),
    entry("cross", Intrinsic::Cross, 2, 2, EmissionShape::Call("cross"), TypeRule::Float3),
    entry("ddx", Intrinsic::Ddx, 1, 1, EmissionShape::Call("dFdx"), TypeRule::SameAsArg0),
    entry("ddy", Intrinsic::Ddy, 1, 1, EmissionShape::Call("dFdy"), TypeRule::SameAsArg0),
    entry("degrees", Intrinsic::Degrees, 1, 1, EmissionShape::Call("degrees"), TypeRule::SameAsArg0),
    entry("determinant", Intrinsic::Determinant, 1, 1, EmissionShape::Call("determinant"), TypeRule::ScalarOfArg0),
    entry("distance", Intrinsic::Distance, 2, 2, EmissionShape::Call("distance"), TypeRule::ScalarOfArg0),
    entry("dot", Intrinsic::Dot, 2, 2, EmissionShape::Call("dot"), TypeRule::ScalarOfArg0),
    entry("exp", Intrinsic::Exp, 1, 1, EmissionShape::Call("exp"), TypeRule::SameAsArg0),
    entry("exp2", Intrinsic::Exp2, 1, 1, EmissionShape::Call("exp2"), TypeRule::SameAsArg0),
    entry("floor", Intrinsic::Floor, 1, 1, EmissionShape::Call("floor"), TypeRule::SameAsArg0),
    entry("fmod", Intrinsic::Fmod, 2, 2, EmissionShape::Call("mod"), TypeRule::SameAsArg0),
    entry("frac", Intrinsic::Frac, 1, 1, EmissionShape::Call("fract"), TypeRule::SameAsArg0),
    entry("isinf", Intrinsic::IsInf, 1, 1, EmissionShape::Call("isinf"), TypeRule::BoolWithDimsOfArg0),
    entry("isnan", Intrinsic::IsNan, 1, 1, EmissionShape::Call("isnan"), TypeRule::BoolWithDimsOfArg0),
    entry("length", Intrinsic::Length, 1, 1, EmissionShape::Call("length"), TypeRule::ScalarOfArg0),
    entry("lerp", Intrinsic::Lerp, 3, 3, EmissionShape::Call("mix"), TypeRule::SameAsArg0),
    entry("log", Intrinsic::Log, 1, 1, EmissionShape::Call("log"), TypeRule::SameAsArg0),
    entry("log2", Intrinsic::Log2, 1, 1, EmissionShape::Call("log2"), TypeRule::SameAsArg0),
    entry("max", Intrinsic::Max, 2, 2, EmissionShape::Call("max"), TypeRule::SameAsArg0),
    entry("min", Intrinsic::Min, 2, 2, EmissionShape::Call("min"), TypeRule::SameAsArg0),
    entry("mul", Intrinsic::Mul, 2, 2, EmissionShape::BinaryMul, TypeRule::MulOfArgs),
    entry("normalize", Intrinsic::Normalize, 1, 1, EmissionShape::Call("normalize"), TypeRule::SameAsArg0),
    entry("pow", Intrinsic::Pow, 2, 2, EmissionShape::Call("pow"), TypeRule::SameAsArg0),
    entry("radians", Intrinsic::Radians, 1, 1, EmissionShape::Call("radians"), TypeRule::SameAsArg0),
    entry("rcp", Intrinsic::Rcp, 1, 1, EmissionShape::Reciprocal, TypeRule::SameAsArg0),
    entry("reflect", Intrinsic::Reflect, 2, 2, EmissionShape::Call("reflect"), TypeRule::SameAsArg0),
    entry("refract", Intrinsic::Refract, 3, 3, EmissionShape::Call("refract"), TypeRule::SameAsArg0),
    entry("round", Intrinsic::Round, 1, 1, EmissionShape::Call("round"), TypeRule::SameAsArg0),
    entry("rsqrt", Intrinsic::Rsqrt, 1, 1, EmissionShape::Call("inversesqrt"), TypeRule::SameAsArg0),
    entry("saturate", Intrinsic::Saturate, 1, 1, EmissionShape::Clamp01, TypeRule::SameAsArg0),
    entry("sign", Intrinsic::Sign, 1, 1, EmissionShape::Call("sign"), TypeRule::SameAsArg0),
    entry("sin", Intrinsic::Sin, 1, 1, EmissionShape::Call("sin"), TypeRule::SameAsArg0),
    entry("sinh", Intrinsic::Sinh, 1, 1, EmissionShape::Call("sinh"), TypeRule::SameAsArg0),
    entry("smoothstep", Intrinsic::SmoothStep, 3, 3, EmissionShape::Call("smoothstep"), TypeRule::SameAsArg0),
    entry("sqrt", Intrinsic::Sqrt, 1, 1, EmissionShape::Call("sqrt"), TypeRule::SameAsArg0),
    entry("step", Intrinsic::Step, 2, 2, EmissionShape::Call("step"), TypeRule::SameAsArg0),
    entry("tan", Intrinsic::Tan, 1, 1, EmissionShape::Call("tan"), TypeRule::SameAsArg0),
    entry("tanh", Intrinsic::Tanh, 1, 1, EmissionShape::Call("tanh"), TypeRule::SameAsArg0),
    entry("transpose", Intrinsic::Transpose, 1, 1, EmissionShape::Call("transpose"), TypeRule::TransposeOfArg0),
    entry("trunc", Intrinsic::Trunc, 1, 1, EmissionShape::Call("trunc"), TypeRule::SameAsArg0),
    atomic("InterlockedAdd", Intrinsic::InterlockedAdd, "atomicAdd"),
    atomic("InterlockedAnd", Intrinsic::InterlockedAnd, "atomicAnd"),
    atomic("InterlockedOr", Intrinsic::InterlockedOr, "atomicOr"),
    atomic("InterlockedXor", Intrinsic::InterlockedXor, "atomicXor"),
    atomic("InterlockedMin", Intrinsic::InterlockedMin, "atomicMin"),
    atomic("InterlockedMax", Intrinsic::InterlockedMax, "atomicMax"),
    atomic("InterlockedExchange", Intrinsic::InterlockedExchange, "atomicExchange"),
    IntrinsicDescriptor {
        name: "InterlockedCompareExchange",
        intrinsic: Intrinsic::InterlockedCompareExchange,
        min_args: 3,
        max_args: 4,
        shape: EmissionShape::Atomic("atomicCompSwap"),
        min_glsl_version: Some(430),
        type_rule: TypeRule::Void,
    },
    entry("Sample", Intrinsic::Sample, 2, 3, EmissionShape::TextureSample, TypeRule::Float4),
    entry("tex2D", Intrinsic::Tex2D, 2, 2, EmissionShape::Call("texture"), TypeRule::Float4),
];

/// Looks up an intrinsic by its HLSL name.
pub fn find(name: &str) -> Option<&'static IntrinsicDescriptor> {
    TABLE.iter().find(|d| d.name == name)
}

pub fn find_by_intrinsic(intrinsic: Intrinsic) -> &'static IntrinsicDescriptor {
    TABLE
        .iter()
        .find(|d| d.intrinsic == intrinsic)
        .expect("every intrinsic has a table entry")
}

/// Derives the result type of an intrinsic call from its argument types.
/// Errors are bare messages; callers attach the call-site span.
pub fn derive_type(
    desc: &IntrinsicDescriptor,
    arg_types: &[TypeDenoter],
) -> Result<TypeDenoter, String> {
    let arg0 = || -> Result<&TypeDenoter, String> {
        arg_types
            .first()
            .ok_or_else(|| format!("intrinsic '{}' requires arguments", desc.name))
    };
    match desc.type_rule {
        TypeRule::SameAsArg0 => Ok(arg0()?.clone()),
        TypeRule::ScalarOfArg0 => {
            let scalar = arg0()?
                .as_data_type()
                .and_then(|dt| dt.scalar_type())
                .unwrap_or(ScalarType::Float);
            Ok(TypeDenoter::scalar(scalar))
        }
        TypeRule::BoolWithDimsOfArg0 => match arg0()?.as_data_type() {
            Some(DataType::Vector(_, n)) => Ok(TypeDenoter::vector(ScalarType::Bool, n)),
            _ => Ok(TypeDenoter::scalar(ScalarType::Bool)),
        },
        TypeRule::BoolScalar => Ok(TypeDenoter::scalar(ScalarType::Bool)),
        TypeRule::Float3 => Ok(TypeDenoter::vector(ScalarType::Float, 3)),
        TypeRule::TransposeOfArg0 => match arg0()?.as_data_type() {
            Some(DataType::Matrix(scalar, rows, cols)) => {
                Ok(TypeDenoter::Base(DataType::Matrix(scalar, cols, rows)))
            }
            _ => Err(format!("intrinsic '{}' requires a matrix argument", desc.name)),
        },
        TypeRule::MulOfArgs => derive_mul_type(arg_types),
        TypeRule::Void => Ok(TypeDenoter::Void),
        TypeRule::Float4 => Ok(TypeDenoter::vector(ScalarType::Float, 4)),
    }
}

/// `mul(A, B)` result type: matrix*vector and vector*matrix contract over
/// the shared dimension, matrix*matrix composes, scalars broadcast, and
/// vector*vector is the dot product.
fn derive_mul_type(arg_types: &[TypeDenoter]) -> Result<TypeDenoter, String> {
    if arg_types.len() != 2 {
        return Err("intrinsic 'mul' requires exactly two arguments".to_string());
    }
    let lhs = arg_types[0]
        .as_data_type()
        .ok_or_else(|| format!("can not multiply non-numeric type '{}'", arg_types[0]))?;
    let rhs = arg_types[1]
        .as_data_type()
        .ok_or_else(|| format!("can not multiply non-numeric type '{}'", arg_types[1]))?;
    let scalar = lhs.scalar_type().unwrap_or(ScalarType::Float);
    match (lhs, rhs) {
        (DataType::Scalar(_), _) => Ok(TypeDenoter::Base(rhs)),
        (_, DataType::Scalar(_)) => Ok(TypeDenoter::Base(lhs)),
        (DataType::Matrix(_, r, c), DataType::Vector(_, n)) if c == n => {
            Ok(TypeDenoter::vector(scalar, r))
        }
        (DataType::Vector(_, n), DataType::Matrix(_, r, c)) if n == r => {
            Ok(TypeDenoter::vector(scalar, c))
        }
        (DataType::Matrix(_, r1, c1), DataType::Matrix(_, r2, c2)) if c1 == r2 => {
            Ok(TypeDenoter::Base(DataType::Matrix(scalar, r1, c2)))
        }
        (DataType::Vector(_, n), DataType::Vector(_, m)) if n == m => {
            Ok(TypeDenoter::scalar(scalar))
        }
        _ => Err(format!(
            "can not multiply '{}' with '{}'",
            arg_types[0], arg_types[1]
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(r: u8, c: u8) -> TypeDenoter {
        TypeDenoter::Base(DataType::Matrix(ScalarType::Float, r, c))
    }

    fn vector(n: u8) -> TypeDenoter {
        TypeDenoter::vector(ScalarType::Float, n)
    }

    #[test]
    fn test_lookup() {
        assert!(find("mul").is_some());
        assert!(find("rcp").is_some());
        assert!(find("InterlockedAdd").is_some());
        assert!(find("not_an_intrinsic").is_none());
        assert_eq!(find("frac").unwrap().shape, EmissionShape::Call("fract"));
        assert_eq!(find("lerp").unwrap().shape, EmissionShape::Call("mix"));
    }

    #[test]
    fn test_arity_bounds() {
        let mul = find("mul").unwrap();
        assert_eq!((mul.min_args, mul.max_args), (2, 2));
        let atomic = find("InterlockedAdd").unwrap();
        assert_eq!((atomic.min_args, atomic.max_args), (2, 3));
    }

    #[test]
    fn test_mul_type_derivation() {
        let mul = find("mul").unwrap();
        // matrix4x4 * vector4 -> vector4
        let t = derive_type(mul, &[matrix(4, 4), vector(4)]).unwrap();
        assert!(t.equals(&vector(4)));
        // vector3 * matrix3x4 -> vector4
        let t = derive_type(mul, &[vector(3), matrix(3, 4)]).unwrap();
        assert!(t.equals(&vector(4)));
        // matrix2x3 * matrix3x4 -> matrix2x4
        let t = derive_type(mul, &[matrix(2, 3), matrix(3, 4)]).unwrap();
        assert!(t.equals(&matrix(2, 4)));
        // vector * vector -> scalar (dot product)
        let t = derive_type(mul, &[vector(3), vector(3)]).unwrap();
        assert!(t.equals(&TypeDenoter::scalar(ScalarType::Float)));
        // scalar broadcasts
        let t = derive_type(mul, &[TypeDenoter::scalar(ScalarType::Float), matrix(4, 4)]).unwrap();
        assert!(t.equals(&matrix(4, 4)));
        // dimension mismatch fails
        assert!(derive_type(mul, &[matrix(4, 4), vector(3)]).is_err());
    }

    #[test]
    fn test_misc_type_rules() {
        let dot = find("dot").unwrap();
        let t = derive_type(dot, &[vector(3), vector(3)]).unwrap();
        assert!(t.equals(&TypeDenoter::scalar(ScalarType::Float)));

        let transpose = find("transpose").unwrap();
        let t = derive_type(transpose, &[matrix(2, 4)]).unwrap();
        assert!(t.equals(&matrix(4, 2)));

        let isnan = find("isnan").unwrap();
        let t = derive_type(isnan, &[vector(3)]).unwrap();
        assert!(t.equals(&TypeDenoter::vector(ScalarType::Bool, 3)));

        let clip = find("clip").unwrap();
        assert!(derive_type(clip, &[vector(4)]).unwrap().is_void());
    }
}
