use clap::Parser;
use hlslt_core::{
    CompilerError, InputShaderVersion, Log, Options, OutputShaderVersion, Result, ShaderInput,
    ShaderOutput, ShaderTarget, Translator,
};
use log::{error, info};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Parser)]
#[command(name = "hlslt")]
#[command(about = "Offline HLSL to GLSL shader cross-compiler", long_about = None)]
struct Cli {
    /// Input HLSL files
    #[arg(value_name = "FILE", required = true)]
    inputs: Vec<PathBuf>,

    /// HLSL shader entry point
    #[arg(long = "entry", short = 'E', default_value = "main")]
    entry: String,

    /// Shader target
    #[arg(long = "target", short = 'T', default_value = "vertex")]
    target: ShaderTarget,

    /// HLSL input version (HLSL3, HLSL4, HLSL5)
    #[arg(long = "shaderin", default_value = "HLSL5")]
    shader_in: InputShaderVersion,

    /// GLSL output version (e.g. GLSL330, GLSL for auto-detect, VKSL450)
    #[arg(long = "shaderout", default_value = "GLSL330")]
    shader_out: OutputShaderVersion,

    /// Code indentation string
    #[arg(long = "indent", default_value = "    ")]
    indent: String,

    /// Prefix for synthesized identifiers (use "<none>" to disable)
    #[arg(long = "prefix", default_value = "_")]
    prefix: String,

    /// GLSL output file; default is '<FILE>.<ENTRY>.glsl'
    #[arg(long = "output", short = 'o', value_name = "FILE")]
    output: Option<PathBuf>,

    /// Enable/disable all warnings
    #[arg(long = "warn", value_parser = parse_on_off, num_args = 0..=1, default_missing_value = "on", default_value = "off")]
    warn: bool,

    /// Enable/disable blank lines between declarations
    #[arg(long = "blanks", value_parser = parse_on_off, num_args = 0..=1, default_missing_value = "on", default_value = "on")]
    blanks: bool,

    /// Enable/disable line marks (e.g. '#line 30')
    #[arg(long = "line-marks", value_parser = parse_on_off, num_args = 0..=1, default_missing_value = "on", default_value = "off")]
    line_marks: bool,

    /// Enable/disable a debug dump of the abstract syntax tree
    #[arg(long = "dump-ast", value_parser = parse_on_off, num_args = 0..=1, default_missing_value = "on", default_value = "off")]
    dump_ast: bool,

    /// Enable/disable preprocess-only mode
    #[arg(long = "pponly", value_parser = parse_on_off, num_args = 0..=1, default_missing_value = "on", default_value = "off")]
    preprocess_only: bool,

    /// Enable/disable passthrough of source comments
    #[arg(long = "comments", value_parser = parse_on_off, num_args = 0..=1, default_missing_value = "on", default_value = "on")]
    comments: bool,

    /// Emit explicit layout(binding/location) qualifiers
    #[arg(long = "bindings", value_parser = parse_on_off, num_args = 0..=1, default_missing_value = "on", default_value = "off")]
    explicit_binding: bool,

    /// Permit '#extension' directives in the output
    #[arg(long = "extensions", value_parser = parse_on_off, num_args = 0..=1, default_missing_value = "on", default_value = "off")]
    allow_extensions: bool,

    /// Predefined macro IDENT or IDENT=VALUE
    #[arg(short = 'D', value_name = "IDENT[=VALUE]")]
    defines: Vec<String>,
}

fn parse_on_off(value: &str) -> std::result::Result<bool, String> {
    match value {
        "on" => Ok(true),
        "off" => Ok(false),
        other => Err(format!("expected 'on' or 'off', got '{}'", other)),
    }
}

#[derive(Debug, Error)]
enum DriverError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    TranslationError(#[from] CompilerError),
}

/// Reads include files relative to the including file's directory.
struct FileIncludeHandler {
    base_dir: PathBuf,
}

impl hlslt_core::IncludeHandler for FileIncludeHandler {
    fn include(&mut self, filename: &str) -> Result<String> {
        let path = self.base_dir.join(filename);
        fs::read_to_string(path).map_err(CompilerError::Io)
    }
}

/// Diagnostic sink printing to stderr.
struct StderrLog;

impl Log for StderrLog {
    fn info(&mut self, message: &str) {
        eprintln!("{}", message);
    }

    fn warning(&mut self, message: &str) {
        eprintln!("warning: {}", message);
    }

    fn error(&mut self, message: &str) {
        eprintln!("error: {}", message);
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    // Diagnostics go to stderr; the exit code is 0 in all paths.
    for file in cli.inputs.clone() {
        if let Err(e) = translate_file(&cli, &file) {
            error!("{}: {}", file.display(), e);
        }
    }
}

fn translate_file(cli: &Cli, file: &Path) -> std::result::Result<(), DriverError> {
    let source = fs::read_to_string(file)?;

    let mut handler = FileIncludeHandler {
        base_dir: file.parent().map(Path::to_path_buf).unwrap_or_default(),
    };

    let mut input = ShaderInput::new(source);
    input.entry_point = cli.entry.clone();
    input.shader_target = cli.target;
    input.shader_version = cli.shader_in;
    input.include_handler = Some(&mut handler);
    input.predefined_macros = cli
        .defines
        .iter()
        .map(|define| match define.split_once('=') {
            Some((ident, value)) => (ident.to_string(), value.to_string()),
            None => (define.to_string(), "1".to_string()),
        })
        .collect();

    let output = ShaderOutput {
        shader_version: cli.shader_out,
        options: Options {
            indent: cli.indent.clone(),
            prefix: cli.prefix.clone(),
            warnings: cli.warn,
            blanks: cli.blanks,
            line_marks: cli.line_marks,
            dump_ast: cli.dump_ast,
            preprocess_only: cli.preprocess_only,
            keep_comments: cli.comments,
            explicit_binding: cli.explicit_binding,
            allow_extensions: cli.allow_extensions,
        },
    };

    let glsl = Translator::new().translate(&mut input, &output, &mut StderrLog)?;

    let output_path = cli.output.clone().unwrap_or_else(|| {
        let mut name = file.as_os_str().to_os_string();
        name.push(format!(".{}.glsl", cli.entry));
        PathBuf::from(name)
    });
    fs::write(&output_path, glsl)?;
    info!("translated {} to {}", file.display(), output_path.display());

    Ok(())
}
