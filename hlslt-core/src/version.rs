//! Shader target and version registry.
//!
//! Output versions use a packed encoding: the low 16 bits carry the
//! version number and the high bits select the language family
//! (0 = GLSL, 1 = ESSL, 2 = VKSL). A version number of 0xffff is the
//! auto-detect sentinel for its family.

use std::fmt;
use std::str::FromStr;

/// Pipeline stage the entry point is translated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShaderTarget {
    #[default]
    Undefined,
    Vertex,
    TessControl,
    TessEval,
    Geometry,
    Fragment,
    Compute,
}

impl fmt::Display for ShaderTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ShaderTarget::Undefined => "undefined",
            ShaderTarget::Vertex => "vertex",
            ShaderTarget::TessControl => "tess-control",
            ShaderTarget::TessEval => "tess-evaluation",
            ShaderTarget::Geometry => "geometry",
            ShaderTarget::Fragment => "fragment",
            ShaderTarget::Compute => "compute",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ShaderTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vertex" => Ok(ShaderTarget::Vertex),
            "tess-control" => Ok(ShaderTarget::TessControl),
            "tess-evaluation" => Ok(ShaderTarget::TessEval),
            "geometry" => Ok(ShaderTarget::Geometry),
            "fragment" => Ok(ShaderTarget::Fragment),
            "compute" => Ok(ShaderTarget::Compute),
            _ => Err(format!("invalid shader target \"{}\"", s)),
        }
    }
}

/// Input shader version (HLSL shader model).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum InputShaderVersion {
    /// Shader Model 3.0 (DirectX 9).
    HLSL3 = 3,
    /// Shader Model 4.0 (DirectX 10).
    HLSL4 = 4,
    /// Shader Model 5.0 (DirectX 11).
    #[default]
    HLSL5 = 5,
}

impl fmt::Display for InputShaderVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HLSL{}", *self as u32)
    }
}

impl FromStr for InputShaderVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HLSL3" => Ok(InputShaderVersion::HLSL3),
            "HLSL4" => Ok(InputShaderVersion::HLSL4),
            "HLSL5" => Ok(InputShaderVersion::HLSL5),
            _ => Err(format!("invalid input shader version \"{}\"", s)),
        }
    }
}

/// Output shader version.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputShaderVersion {
    GLSL110 = 110,
    GLSL120 = 120,
    GLSL130 = 130,
    GLSL140 = 140,
    GLSL150 = 150,
    GLSL330 = 330,
    GLSL400 = 400,
    GLSL410 = 410,
    GLSL420 = 420,
    GLSL430 = 430,
    GLSL440 = 440,
    GLSL450 = 450,
    /// Auto-detect the minimum required GLSL version.
    GLSL = 0x0000_ffff,

    ESSL100 = 0x0001_0000 + 100,
    ESSL300 = 0x0001_0000 + 300,
    ESSL310 = 0x0001_0000 + 310,
    ESSL320 = 0x0001_0000 + 320,
    /// Auto-detect the minimum required ESSL version.
    ESSL = 0x0001_ffff,

    VKSL450 = 0x0002_0000 + 450,
    /// Auto-detect the minimum required VKSL version.
    VKSL = 0x0002_ffff,
}

impl OutputShaderVersion {
    /// Version number without the language-family bits (e.g. 330).
    pub fn number(self) -> u32 {
        self as u32 & 0xffff
    }

    /// True for the auto-detect sentinels.
    pub fn is_auto(self) -> bool {
        self.number() == 0xffff
    }

    pub fn is_language_glsl(self) -> bool {
        (self as u32) >> 16 == 0
    }

    pub fn is_language_essl(self) -> bool {
        (self as u32) >> 16 == 1
    }

    pub fn is_language_vksl(self) -> bool {
        (self as u32) >> 16 == 2
    }

    /// Version number as an ordered `ShaderVersion` pair. The auto-detect
    /// sentinels have no concrete version.
    pub fn shader_version(self) -> Option<ShaderVersion> {
        if self.is_auto() {
            None
        } else {
            let n = self.number() as i32;
            Some(ShaderVersion::new(n / 100, n % 100))
        }
    }
}

impl fmt::Display for OutputShaderVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let family = if self.is_language_essl() {
            "ESSL"
        } else if self.is_language_vksl() {
            "VKSL"
        } else {
            "GLSL"
        };
        if self.is_auto() {
            write!(f, "{}", family)
        } else {
            write!(f, "{}{}", family, self.number())
        }
    }
}

impl FromStr for OutputShaderVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use OutputShaderVersion::*;
        match s {
            "GLSL110" => Ok(GLSL110),
            "GLSL120" => Ok(GLSL120),
            "GLSL130" => Ok(GLSL130),
            "GLSL140" => Ok(GLSL140),
            "GLSL150" => Ok(GLSL150),
            "GLSL330" => Ok(GLSL330),
            "GLSL400" => Ok(GLSL400),
            "GLSL410" => Ok(GLSL410),
            "GLSL420" => Ok(GLSL420),
            "GLSL430" => Ok(GLSL430),
            "GLSL440" => Ok(GLSL440),
            "GLSL450" => Ok(GLSL450),
            "GLSL" => Ok(GLSL),
            "ESSL100" => Ok(ESSL100),
            "ESSL300" => Ok(ESSL300),
            "ESSL310" => Ok(ESSL310),
            "ESSL320" => Ok(ESSL320),
            "ESSL" => Ok(ESSL),
            "VKSL450" => Ok(VKSL450),
            "VKSL" => Ok(VKSL),
            _ => Err(format!("invalid output shader version \"{}\"", s)),
        }
    }
}

/// Totally ordered (major, minor) version pair, used to gate feature
/// availability in the generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct ShaderVersion {
    major: i32,
    minor: i32,
}

impl ShaderVersion {
    pub fn new(major: i32, minor: i32) -> Self {
        ShaderVersion { major, minor }
    }

    pub fn major(&self) -> i32 {
        self.major
    }

    pub fn minor(&self) -> i32 {
        self.minor
    }

    /// The `#version` directive number (e.g. 3.30 -> 330).
    pub fn directive_number(&self) -> i32 {
        self.major * 100 + self.minor
    }
}

impl fmt::Display for ShaderVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_predicates_partition() {
        use OutputShaderVersion::*;
        let all = [
            GLSL110, GLSL120, GLSL130, GLSL140, GLSL150, GLSL330, GLSL400, GLSL410, GLSL420,
            GLSL430, GLSL440, GLSL450, GLSL, ESSL100, ESSL300, ESSL310, ESSL320, ESSL, VKSL450,
            VKSL,
        ];
        for v in all {
            let count = [
                v.is_language_glsl(),
                v.is_language_essl(),
                v.is_language_vksl(),
            ]
            .iter()
            .filter(|b| **b)
            .count();
            assert_eq!(count, 1, "{} must belong to exactly one language", v);
        }
    }

    #[test]
    fn test_auto_sentinels() {
        assert!(OutputShaderVersion::GLSL.is_auto());
        assert!(OutputShaderVersion::ESSL.is_auto());
        assert!(OutputShaderVersion::VKSL.is_auto());
        assert!(!OutputShaderVersion::GLSL330.is_auto());
    }

    #[test]
    fn test_shader_version_ordering() {
        assert!(ShaderVersion::new(1, 30) < ShaderVersion::new(3, 30));
        assert!(ShaderVersion::new(3, 30) < ShaderVersion::new(4, 20));
        assert!(ShaderVersion::new(4, 20) <= ShaderVersion::new(4, 20));
        assert_eq!(ShaderVersion::new(4, 50).to_string(), "4.50");
        assert_eq!(ShaderVersion::new(4, 50).directive_number(), 450);
    }

    #[test]
    fn test_version_round_trip() {
        for s in ["GLSL330", "GLSL450", "ESSL300", "VKSL450", "GLSL", "VKSL"] {
            let v: OutputShaderVersion = s.parse().unwrap();
            assert_eq!(v.to_string(), s);
        }
        assert!("GLSL360".parse::<OutputShaderVersion>().is_err());
    }

    #[test]
    fn test_version_numbers() {
        assert_eq!(OutputShaderVersion::GLSL330.number(), 330);
        assert_eq!(OutputShaderVersion::ESSL310.number(), 310);
        assert_eq!(OutputShaderVersion::VKSL450.number(), 450);
        assert_eq!(
            OutputShaderVersion::GLSL330.shader_version(),
            Some(ShaderVersion::new(3, 30))
        );
        assert_eq!(OutputShaderVersion::VKSL.shader_version(), None);
    }
}
