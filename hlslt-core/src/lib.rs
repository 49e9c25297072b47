//! Offline HLSL to GLSL shader cross-compiler.
//!
//! One translation is one synchronous call: it consumes an HLSL source,
//! runs tokenize -> parse -> analyze -> generate, and returns the GLSL
//! text. Diagnostics flow through the caller-provided [`Log`] sink; the
//! returned `Result` is the success flag.

pub mod analyzer;
pub mod ast;
pub mod codegen;
pub mod diags;
pub mod error;
pub mod intrinsics;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod ty;
pub mod version;

pub use error::{CompilerError, Result};
pub use version::{InputShaderVersion, OutputShaderVersion, ShaderTarget, ShaderVersion};

use analyzer::Analyzer;
use codegen::GlslGenerator;
use log::trace;
use std::collections::HashMap;

/// Resolves `#include` file names to their source text.
pub trait IncludeHandler {
    fn include(&mut self, filename: &str) -> Result<String>;
}

/// Diagnostic sink with the three severity levels of the translator.
pub trait Log {
    fn info(&mut self, message: &str);
    fn warning(&mut self, message: &str);
    fn error(&mut self, message: &str);
}

/// Default sink forwarding to the `log` facade.
#[derive(Debug, Default)]
pub struct StdLog;

impl Log for StdLog {
    fn info(&mut self, message: &str) {
        log::info!("{}", message);
    }

    fn warning(&mut self, message: &str) {
        log::warn!("{}", message);
    }

    fn error(&mut self, message: &str) {
        log::error!("{}", message);
    }
}

/// Input description of one translation.
pub struct ShaderInput<'a> {
    /// HLSL source text.
    pub source_code: String,
    /// Function to treat as the shader entry point; empty translates all
    /// declarations as a pass-through.
    pub entry_point: String,
    pub shader_target: ShaderTarget,
    pub shader_version: InputShaderVersion,
    pub include_handler: Option<&'a mut dyn IncludeHandler>,
    /// Predefined macros (`-D IDENT[=VALUE]`).
    pub predefined_macros: Vec<(String, String)>,
}

impl<'a> ShaderInput<'a> {
    pub fn new(source_code: impl Into<String>) -> Self {
        ShaderInput {
            source_code: source_code.into(),
            entry_point: "main".to_string(),
            shader_target: ShaderTarget::Vertex,
            shader_version: InputShaderVersion::HLSL5,
            include_handler: None,
            predefined_macros: Vec::new(),
        }
    }
}

/// Output description of one translation.
#[derive(Debug, Clone)]
pub struct ShaderOutput {
    pub shader_version: OutputShaderVersion,
    pub options: Options,
}

impl Default for ShaderOutput {
    fn default() -> Self {
        ShaderOutput {
            shader_version: OutputShaderVersion::GLSL330,
            options: Options::default(),
        }
    }
}

/// Code generation options.
#[derive(Debug, Clone)]
pub struct Options {
    /// Indentation unit.
    pub indent: String,
    /// Name-mangling prefix for synthesized identifiers; `"<none>"`
    /// disables prefixing.
    pub prefix: String,
    /// Enable all warning diagnostics.
    pub warnings: bool,
    /// Blank lines between declarations.
    pub blanks: bool,
    /// Emit `#line` directives.
    pub line_marks: bool,
    /// Print an AST debug dump through the log sink.
    pub dump_ast: bool,
    /// Stop after preprocessing and echo the token stream.
    pub preprocess_only: bool,
    /// Pass source comments through to the output.
    pub keep_comments: bool,
    /// Emit `layout(binding = N)` / `layout(location = N)` qualifiers.
    pub explicit_binding: bool,
    /// Permit `#extension` emission.
    pub allow_extensions: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            indent: "    ".to_string(),
            prefix: "_".to_string(),
            warnings: false,
            blanks: true,
            line_marks: false,
            dump_ast: false,
            preprocess_only: false,
            keep_comments: true,
            explicit_binding: false,
            allow_extensions: false,
        }
    }
}

impl Options {
    /// The prefix with the `"<none>"` sentinel resolved.
    pub fn effective_prefix(&self) -> String {
        if self.prefix == "<none>" {
            String::new()
        } else {
            self.prefix.clone()
        }
    }
}

/// The translator facade running the full pass pipeline.
#[derive(Debug, Default)]
pub struct Translator;

impl Translator {
    pub fn new() -> Self {
        Translator
    }

    /// Translates one HLSL source into GLSL text. All diagnostics are
    /// reported through `log`; the error value doubles as the failure
    /// flag and carries the first fatal diagnostic.
    pub fn translate(
        &self,
        input: &mut ShaderInput,
        output: &ShaderOutput,
        log: &mut dyn Log,
    ) -> Result<String> {
        let result = self.translate_inner(input, output, log);
        if let Err(error) = &result {
            log.error(&error.to_string());
        }
        result
    }

    fn translate_inner(
        &self,
        input: &mut ShaderInput,
        output: &ShaderOutput,
        log: &mut dyn Log,
    ) -> Result<String> {
        if output.shader_version.is_language_essl() {
            return Err(CompilerError::UnsupportedFeature {
                message: "ESSL output is a deferred target".to_string(),
                span: ast::Span::default(),
            });
        }
        trace!(
            "translating {} entry '{}' for {}",
            input.shader_version,
            input.entry_point,
            input.shader_target
        );

        // Tokenize (with the preprocessor subset).
        let defines: HashMap<String, String> =
            input.predefined_macros.iter().cloned().collect();
        let mut handler: Option<&mut dyn IncludeHandler> = input
            .include_handler
            .as_mut()
            .map(|h| &mut **h as &mut dyn IncludeHandler);
        let stream = lexer::tokenize_with(&input.source_code, &defines, &mut handler)
            .map_err(|message| CompilerError::Syntax {
                message,
                span: ast::Span::default(),
            })?;

        if output.options.preprocess_only {
            return Ok(stream.to_source_string());
        }

        // Parse.
        let mut parser = parser::Parser::new(stream.tokens);
        let mut program = parser.parse()?;

        // Analyze.
        let analyzer = Analyzer::new(
            input.shader_target,
            &input.entry_point,
            &output.options.effective_prefix(),
        );
        let analysis = analyzer.analyze(&mut program)?;

        if output.options.warnings {
            for warning in analysis.warnings() {
                log.warning(&format!("{} ({})", warning.message(), warning.span()));
            }
        }

        if output.options.dump_ast {
            log.info(&diags::AstFormatter::format_program(&program));
        }

        // Generate.
        let generator = GlslGenerator::new(
            &analysis,
            input.shader_target,
            output.shader_version,
            &output.options,
            &stream.comments,
        );
        generator.generate(&program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullLog;

    impl Log for NullLog {
        fn info(&mut self, _message: &str) {}
        fn warning(&mut self, _message: &str) {}
        fn error(&mut self, _message: &str) {}
    }

    struct CollectLog {
        warnings: Vec<String>,
        errors: Vec<String>,
    }

    impl CollectLog {
        fn new() -> Self {
            CollectLog {
                warnings: Vec::new(),
                errors: Vec::new(),
            }
        }
    }

    impl Log for CollectLog {
        fn info(&mut self, _message: &str) {}
        fn warning(&mut self, message: &str) {
            self.warnings.push(message.to_string());
        }
        fn error(&mut self, message: &str) {
            self.errors.push(message.to_string());
        }
    }

    #[test]
    fn test_trivial_translation() {
        let mut input = ShaderInput::new(
            "float4 main(float4 pos : POSITION) : SV_Position { return pos; }",
        );
        let output = ShaderOutput::default();
        let glsl = Translator::new()
            .translate(&mut input, &output, &mut NullLog)
            .unwrap();
        assert!(glsl.starts_with("#version 330"));
        assert!(glsl.contains("in vec4 pos;"));
        assert!(glsl.contains("gl_Position = pos;"));
    }

    #[test]
    fn test_error_path_produces_no_output() {
        let source = r#"
            struct Data { float x; };
            float4 main(float4 pos : POSITION) : SV_Position {
                Data d;
                float4 v = (int3)d;
                return pos;
            }
        "#;
        let mut input = ShaderInput::new(source);
        let output = ShaderOutput::default();
        let mut log = CollectLog::new();
        let result = Translator::new().translate(&mut input, &output, &mut log);
        match result {
            Err(CompilerError::TypeMismatch { message, .. }) => {
                assert!(message.contains("cast"));
            }
            other => panic!("expected a type mismatch, got {:?}", other),
        }
        // The diagnostic also reached the log sink.
        assert_eq!(log.errors.len(), 1);
        assert!(log.errors[0].contains("cast"));
    }

    #[test]
    fn test_warnings_forwarded_when_enabled() {
        let source = r#"
            void main() {
                float4 v = float4(1.0, 2.0, 3.0, 4.0);
                float s = v;
            }
        "#;
        let mut output = ShaderOutput::default();
        output.options.warnings = true;
        let mut log = CollectLog::new();
        let mut input = ShaderInput::new(source);
        Translator::new()
            .translate(&mut input, &output, &mut log)
            .unwrap();
        assert!(!log.warnings.is_empty());

        // Warnings stay silent by default.
        let mut quiet_log = CollectLog::new();
        let mut input = ShaderInput::new(source);
        Translator::new()
            .translate(&mut input, &ShaderOutput::default(), &mut quiet_log)
            .unwrap();
        assert!(quiet_log.warnings.is_empty());
    }

    #[test]
    fn test_preprocess_only_echoes_tokens() {
        let mut input = ShaderInput::new("float x ;");
        input.predefined_macros.push(("x".to_string(), "y".to_string()));
        let mut output = ShaderOutput::default();
        output.options.preprocess_only = true;
        let text = Translator::new()
            .translate(&mut input, &output, &mut NullLog)
            .unwrap();
        assert!(text.contains("float y ;"));
    }

    #[test]
    fn test_include_handler() {
        struct MapIncludes;

        impl IncludeHandler for MapIncludes {
            fn include(&mut self, filename: &str) -> Result<String> {
                match filename {
                    "common.hlsl" => Ok("float4 tint() { return float4(1, 1, 1, 1); }".to_string()),
                    other => Err(CompilerError::Io(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        other.to_string(),
                    ))),
                }
            }
        }

        let source = "#include \"common.hlsl\"\nfloat4 main(float4 p : POSITION) : SV_Position { return p * tint(); }";
        let mut handler = MapIncludes;
        let mut input = ShaderInput::new(source);
        input.include_handler = Some(&mut handler);
        let glsl = Translator::new()
            .translate(&mut input, &ShaderOutput::default(), &mut NullLog)
            .unwrap();
        assert!(glsl.contains("vec4 tint()"));
    }

    #[test]
    fn test_predefined_macro_reaches_output() {
        let source = "float4 main(float4 p : POSITION) : SV_Position { return p * SCALE; }";
        let mut input = ShaderInput::new(source);
        input
            .predefined_macros
            .push(("SCALE".to_string(), "2.0".to_string()));
        let glsl = Translator::new()
            .translate(&mut input, &ShaderOutput::default(), &mut NullLog)
            .unwrap();
        assert!(glsl.contains("p * 2.0"));
    }

    #[test]
    fn test_prefix_none_sentinel() {
        let mut options = Options::default();
        options.prefix = "<none>".to_string();
        assert_eq!(options.effective_prefix(), "");
        assert_eq!(Options::default().effective_prefix(), "_");
    }
}
