//! GLSL output generator.
//!
//! Walks the resolved AST and renders GLSL text. The generator treats
//! the AST as read-only; every rewrite decision (flattened entry I/O,
//! intrinsic dispatch, operand order of `mul`) was made by the analyzer,
//! and this pass only renders it.

use crate::analyzer::{Analysis, SymbolKind, VarRole};
use crate::ast::*;
use crate::error::{CompilerError, Result};
use crate::intrinsics::{self, EmissionShape};
use crate::lexer::Comment;
use crate::ty::{BufferType, DataType, ScalarType, TypeDenoter};
use crate::version::{OutputShaderVersion, ShaderTarget, ShaderVersion};
use crate::Options;
use std::collections::BTreeSet;

pub struct GlslGenerator<'a> {
    analysis: &'a Analysis,
    shader_target: ShaderTarget,
    version_out: OutputShaderVersion,
    options: &'a Options,
    prefix: String,
    comments: &'a [Comment],

    out: String,
    indent_level: usize,

    /// (required version number, feature description) pairs gathered by
    /// the feature scan; raised monotonically for auto-detect outputs.
    requirements: Vec<(i32, String)>,
    required_extensions: BTreeSet<&'static str>,
    /// Component counts of `clip` arguments, for the helper overloads.
    clip_arg_dims: BTreeSet<u8>,
    has_initializer_lists: bool,
    has_resource_bindings: bool,

    is_inside_entry_point: bool,
    comment_cursor: usize,
}

impl<'a> GlslGenerator<'a> {
    pub fn new(
        analysis: &'a Analysis,
        shader_target: ShaderTarget,
        version_out: OutputShaderVersion,
        options: &'a Options,
        comments: &'a [Comment],
    ) -> Self {
        GlslGenerator {
            analysis,
            shader_target,
            version_out,
            options,
            prefix: options.effective_prefix(),
            comments,
            out: String::new(),
            indent_level: 0,
            requirements: Vec::new(),
            required_extensions: BTreeSet::new(),
            clip_arg_dims: BTreeSet::new(),
            has_initializer_lists: false,
            has_resource_bindings: false,
            is_inside_entry_point: false,
            comment_cursor: 0,
        }
    }

    pub fn generate(mut self, program: &Program) -> Result<String> {
        if self.version_out.is_language_essl() {
            return Err(CompilerError::UnsupportedFeature {
                message: "ESSL output is a deferred target".to_string(),
                span: Span::default(),
            });
        }
        if matches!(
            self.version_out,
            OutputShaderVersion::GLSL110 | OutputShaderVersion::GLSL120
        ) {
            return Err(CompilerError::UnsupportedFeature {
                message: format!("{} output is not supported", self.version_out),
                span: Span::default(),
            });
        }

        self.scan_program(program)?;
        let version = self.select_version()?;

        self.write_version_and_extensions(version);
        self.write_clip_helpers();
        self.write_global_io();
        self.write_globals(program)?;

        Ok(std::mem::take(&mut self.out))
    }

    /* ----- Feature scan and version selection ----- */

    fn require(&mut self, version: i32, what: &str) {
        self.requirements.push((version, what.to_string()));
    }

    fn scan_program(&mut self, program: &Program) -> Result<()> {
        if self.shader_target == ShaderTarget::Compute {
            self.require(430, "compute shaders");
        }
        for ty in self.analysis.type_table.values() {
            if let Some(dt) = ty.as_data_type() {
                if dt.scalar_type() == Some(ScalarType::Double) {
                    self.require(400, "double precision");
                    break;
                }
            }
        }
        for stmnt in &program.globals {
            if matches!(stmnt, Stmnt::UniformBuffer(_)) {
                self.require(140, "uniform blocks");
            }
            self.scan_stmnt(stmnt);
        }
        if self.options.explicit_binding && self.has_resource_bindings {
            if self.options.allow_extensions {
                self.required_extensions
                    .insert("GL_ARB_shading_language_420pack");
            } else {
                self.require(420, "explicit bindings");
            }
        }
        if self.has_initializer_lists {
            self.require(420, "initializer lists");
        }
        Ok(())
    }

    fn scan_stmnt(&mut self, stmnt: &Stmnt) {
        match stmnt {
            Stmnt::Null(_) | Stmnt::StructDecl(_) | Stmnt::Alias(_) | Stmnt::CtrlTransfer(_) => {}
            Stmnt::VarDecl(decl) => {
                for var in &decl.var_decls {
                    for dim in var.array_dims.iter().flatten() {
                        self.scan_expr(dim);
                    }
                    if let Some(init) = &var.initializer {
                        self.scan_expr(init);
                    }
                }
            }
            Stmnt::Function(func) => {
                if let Some(block) = &func.code_block {
                    for inner in &block.stmnts {
                        self.scan_stmnt(inner);
                    }
                }
            }
            Stmnt::UniformBuffer(buffer) => {
                if !buffer.registers.is_empty() {
                    self.has_resource_bindings = true;
                }
                for member in &buffer.members {
                    for var in &member.var_decls {
                        if let Some(init) = &var.initializer {
                            self.scan_expr(init);
                        }
                    }
                }
            }
            Stmnt::Buffer(buffer) => {
                for decl in &buffer.buffer_decls {
                    if !decl.registers.is_empty() {
                        self.has_resource_bindings = true;
                    }
                }
                if let TypeDenoter::Buffer { buffer_type, .. } = buffer.denoter.deref_alias() {
                    if buffer_type.is_read_write() {
                        self.require(420, "image load/store");
                    }
                }
            }
            Stmnt::Sampler(_) => {}
            Stmnt::CodeBlock(block) => {
                for inner in &block.code_block.stmnts {
                    self.scan_stmnt(inner);
                }
            }
            Stmnt::For(stmnt) => {
                self.scan_stmnt(&stmnt.init);
                if let Some(cond) = &stmnt.condition {
                    self.scan_expr(cond);
                }
                if let Some(iter) = &stmnt.iteration {
                    self.scan_expr(iter);
                }
                self.scan_stmnt(&stmnt.body);
            }
            Stmnt::While(stmnt) => {
                self.scan_expr(&stmnt.condition);
                self.scan_stmnt(&stmnt.body);
            }
            Stmnt::DoWhile(stmnt) => {
                self.scan_stmnt(&stmnt.body);
                self.scan_expr(&stmnt.condition);
            }
            Stmnt::If(stmnt) => {
                self.scan_expr(&stmnt.condition);
                self.scan_stmnt(&stmnt.body);
                if let Some(else_stmnt) = &stmnt.else_stmnt {
                    self.scan_stmnt(else_stmnt);
                }
            }
            Stmnt::Switch(stmnt) => {
                self.scan_expr(&stmnt.selector);
                for case in &stmnt.cases {
                    if let Some(expr) = &case.expr {
                        self.scan_expr(expr);
                    }
                    for inner in &case.stmnts {
                        self.scan_stmnt(inner);
                    }
                }
            }
            Stmnt::Expr(stmnt) => self.scan_expr(&stmnt.expr),
            Stmnt::Return(stmnt) => {
                if let Some(expr) = &stmnt.expr {
                    self.scan_expr(expr);
                }
            }
        }
    }

    fn scan_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Null | ExprKind::Literal(_) | ExprKind::TypeName(_) => {}
            ExprKind::List(exprs) | ExprKind::Initializer(exprs) => {
                if matches!(expr.kind, ExprKind::Initializer(_)) {
                    self.has_initializer_lists = true;
                }
                for e in exprs {
                    self.scan_expr(e);
                }
            }
            ExprKind::Ternary {
                cond_expr,
                then_expr,
                else_expr,
            } => {
                self.scan_expr(cond_expr);
                self.scan_expr(then_expr);
                self.scan_expr(else_expr);
            }
            ExprKind::Binary {
                lhs_expr, rhs_expr, ..
            } => {
                self.scan_expr(lhs_expr);
                self.scan_expr(rhs_expr);
            }
            ExprKind::Unary { expr: inner, .. } | ExprKind::PostUnary { expr: inner, .. } => {
                self.scan_expr(inner)
            }
            ExprKind::Call(call) => {
                if let Some(object) = &call.object {
                    self.scan_expr(object);
                }
                for arg in &call.arguments {
                    self.scan_expr(arg);
                }
                if let Some(intrinsic) = call.intrinsic {
                    let desc = intrinsics::find_by_intrinsic(intrinsic);
                    if let Some(version) = desc.min_glsl_version {
                        self.require(version, &format!("intrinsic '{}'", desc.name));
                    }
                    if desc.shape == EmissionShape::Clip {
                        let dims = call
                            .arguments
                            .first()
                            .and_then(|arg| self.analysis.type_of(arg.id))
                            .and_then(|ty| ty.as_data_type())
                            .map(|dt| dt.dimensions().0)
                            .unwrap_or(1);
                        self.clip_arg_dims.insert(dims);
                    }
                }
            }
            ExprKind::Bracket(inner) => self.scan_expr(inner),
            ExprKind::Suffix {
                expr: inner,
                var_ident,
            } => {
                self.scan_expr(inner);
                self.scan_var_ident(var_ident);
            }
            ExprKind::ArrayAccess {
                expr: inner,
                array_indices,
            } => {
                self.scan_expr(inner);
                for index in array_indices {
                    self.scan_expr(index);
                }
            }
            ExprKind::Cast { expr: inner, .. } => self.scan_expr(inner),
            ExprKind::VarAccess { var_ident, assign } => {
                self.scan_var_ident(var_ident);
                if let Some((_, rhs)) = assign {
                    self.scan_expr(rhs);
                }
            }
        }
    }

    fn scan_var_ident(&mut self, var_ident: &VarIdent) {
        let mut segment = Some(var_ident);
        while let Some(seg) = segment {
            for index in &seg.array_indices {
                self.scan_expr(index);
            }
            segment = seg.next.as_deref();
        }
    }

    fn select_version(&self) -> Result<ShaderVersion> {
        let base = if self.version_out.is_language_vksl() {
            450
        } else {
            130
        };
        let required = self
            .requirements
            .iter()
            .map(|(v, _)| *v)
            .chain(std::iter::once(base))
            .max()
            .unwrap_or(base);

        match self.version_out.shader_version() {
            Some(chosen) => {
                for (version, what) in &self.requirements {
                    if chosen.directive_number() < *version {
                        return Err(CompilerError::UnsupportedFeature {
                            message: format!(
                                "{} requires GLSL {} but output version is {}",
                                what, version, self.version_out
                            ),
                            span: Span::default(),
                        });
                    }
                }
                Ok(chosen)
            }
            None => {
                // Auto-detect: the smallest enumerated version that
                // satisfies every requirement.
                const VERSIONS: &[i32] = &[130, 140, 150, 330, 400, 410, 420, 430, 440, 450];
                let number = VERSIONS
                    .iter()
                    .copied()
                    .find(|v| *v >= required)
                    .unwrap_or(450);
                Ok(ShaderVersion::new(number / 100, number % 100))
            }
        }
    }

    /* ----- Text writing ----- */

    fn write_line(&mut self, line: &str) {
        for _ in 0..self.indent_level {
            self.out.push_str(&self.options.indent);
        }
        self.out.push_str(line);
        self.out.push('\n');
    }

    fn write_blank(&mut self) {
        if self.options.blanks {
            self.out.push('\n');
        }
    }

    fn open_scope(&mut self) {
        self.write_line("{");
        self.indent_level += 1;
    }

    fn close_scope(&mut self, semicolon: bool) {
        self.indent_level -= 1;
        self.write_line(if semicolon { "};" } else { "}" });
    }

    fn write_line_mark(&mut self, span: Span) {
        if self.options.line_marks {
            self.write_line(&format!("#line {}", span.line));
        }
    }

    /// Emits pending source comments up to the given statement.
    fn write_stmnt_comments(&mut self, span: Span) {
        if !self.options.keep_comments {
            return;
        }
        while self.comment_cursor < self.comments.len()
            && self.comments[self.comment_cursor].line < span.line
        {
            let text = self.comments[self.comment_cursor].text.clone();
            self.write_line(&format!("// {}", text));
            self.comment_cursor += 1;
        }
    }

    fn write_version_and_extensions(&mut self, version: ShaderVersion) {
        self.write_line(&format!("#version {}", version.directive_number()));
        if self.options.allow_extensions {
            let extensions: Vec<&'static str> =
                self.required_extensions.iter().copied().collect();
            for extension in extensions {
                self.write_line(&format!("#extension {} : enable", extension));
            }
        }
    }

    /// The clip intrinsic lowers to a helper emitted once per translation
    /// unit, one overload per referenced argument shape.
    fn write_clip_helpers(&mut self) {
        if self.clip_arg_dims.is_empty() {
            return;
        }
        self.write_blank();
        for dims in self.clip_arg_dims.clone() {
            let helper = format!("{}clip", self.prefix);
            if dims == 1 {
                self.write_line(&format!("void {}(float x)", helper));
                self.open_scope();
                self.write_line("if (x < 0.0)");
                self.indent_level += 1;
                self.write_line("discard;");
                self.indent_level -= 1;
                self.close_scope(false);
            } else {
                let vec = format!("vec{}", dims);
                self.write_line(&format!("void {}({} x)", helper, vec));
                self.open_scope();
                self.write_line(&format!("if (any(lessThan(x, {}(0.0))))", vec));
                self.indent_level += 1;
                self.write_line("discard;");
                self.indent_level -= 1;
                self.close_scope(false);
            }
        }
    }

    fn write_global_io(&mut self) {
        let Some(entry) = &self.analysis.entry else {
            return;
        };
        if let Some([x, y, z]) = entry.num_threads {
            self.write_blank();
            self.write_line(&format!(
                "layout(local_size_x = {}, local_size_y = {}, local_size_z = {}) in;",
                x, y, z
            ));
        }
        let mut wrote_any = false;
        let io: Vec<(bool, String, TypeDenoter, Option<u32>)> = entry
            .inputs
            .iter()
            .filter(|v| !v.builtin)
            .map(|v| (false, v.glsl_name.clone(), v.ty.clone(), v.location))
            .chain(
                entry
                    .outputs
                    .iter()
                    .filter(|v| !v.builtin)
                    .map(|v| (true, v.glsl_name.clone(), v.ty.clone(), v.location)),
            )
            .collect();
        for (is_output, name, ty, location) in io {
            if !wrote_any {
                self.write_blank();
                wrote_any = true;
            }
            let qualifier = if is_output { "out" } else { "in" };
            let layout = match location {
                Some(slot) if self.options.explicit_binding => {
                    format!("layout(location = {}) ", slot)
                }
                _ => String::new(),
            };
            let type_name = glsl_type_name(&ty);
            self.write_line(&format!("{}{} {} {};", layout, qualifier, type_name, name));
        }
    }

    /* ----- Declarations ----- */

    fn write_globals(&mut self, program: &Program) -> Result<()> {
        for stmnt in &program.globals {
            match stmnt {
                Stmnt::Null(_) => {}
                Stmnt::StructDecl(decl) => {
                    if self.struct_must_resolve(&decl.struct_decl) {
                        continue;
                    }
                    self.write_blank();
                    self.write_stmnt_comments(decl.span);
                    self.write_line_mark(decl.span);
                    self.write_struct_decl(&decl.struct_decl)?;
                }
                Stmnt::Alias(_) => {
                    // Typedefs are resolved away during analysis.
                }
                Stmnt::Sampler(_) => {
                    // Separate sampler-state objects fold into the
                    // combined GLSL sampler of the texture they sample.
                }
                Stmnt::VarDecl(decl) => {
                    self.write_blank();
                    self.write_stmnt_comments(decl.span);
                    self.write_line_mark(decl.span);
                    self.write_global_var_decl(decl)?;
                }
                Stmnt::UniformBuffer(buffer) => {
                    self.write_blank();
                    self.write_stmnt_comments(buffer.span);
                    self.write_line_mark(buffer.span);
                    self.write_uniform_buffer_decl(buffer)?;
                }
                Stmnt::Buffer(buffer) => {
                    self.write_blank();
                    self.write_stmnt_comments(buffer.span);
                    self.write_line_mark(buffer.span);
                    self.write_buffer_decl_stmnt(buffer)?;
                }
                Stmnt::Function(func) => {
                    self.write_blank();
                    self.write_stmnt_comments(func.span);
                    self.write_line_mark(func.span);
                    self.write_function_decl(func)?;
                }
                other => {
                    return Err(CompilerError::Internal(format!(
                        "unexpected global statement at {}",
                        other.span()
                    )))
                }
            }
        }
        Ok(())
    }

    fn struct_must_resolve(&self, decl: &StructDecl) -> bool {
        decl.struct_ref
            .map(|id| self.analysis.structs.get(id).must_resolve)
            .unwrap_or(false)
    }

    fn write_struct_decl(&mut self, decl: &StructDecl) -> Result<()> {
        self.write_line(&format!("struct {}", decl.ident));
        self.open_scope();
        for member in &decl.members {
            let type_name = glsl_type_name(&member.var_type.denoter);
            for var in &member.var_decls {
                let dims = self.array_dims_string(&var.array_dims)?;
                self.write_line(&format!("{} {}{};", type_name, var.ident, dims));
            }
        }
        self.close_scope(true);
        Ok(())
    }

    fn write_global_var_decl(&mut self, decl: &VarDeclStmnt) -> Result<()> {
        let is_static = decl.storage_classes.contains(&StorageClass::Static);
        let is_shared = decl.storage_classes.contains(&StorageClass::GroupShared)
            || decl.storage_classes.contains(&StorageClass::Shared);
        let is_const = decl.type_modifiers.contains(&TypeModifier::Const);
        // A plain HLSL global without `static` is an implicit uniform.
        let qualifier = if is_shared {
            "shared "
        } else if is_const {
            "const "
        } else if !is_static {
            "uniform "
        } else {
            ""
        };
        let type_name = glsl_type_name(&decl.var_type.denoter);
        for var in &decl.var_decls {
            let dims = self.array_dims_string(&var.array_dims)?;
            let init = match &var.initializer {
                Some(expr) => format!(" = {}", self.expr_to_string(expr)?),
                None => String::new(),
            };
            self.write_line(&format!(
                "{}{} {}{}{};",
                qualifier, type_name, var.ident, dims, init
            ));
        }
        Ok(())
    }

    fn write_uniform_buffer_decl(&mut self, buffer: &UniformBufferDecl) -> Result<()> {
        let binding = Register::get_for_target(&buffer.registers, self.shader_target);
        let layout = match binding {
            Some(register) if self.options.explicit_binding => {
                format!("layout(std140, binding = {}) ", register.slot)
            }
            _ => "layout(std140) ".to_string(),
        };
        self.write_line(&format!("{}uniform {}", layout, buffer.ident));
        self.open_scope();
        for member in &buffer.members {
            let type_name = glsl_type_name(&member.var_type.denoter);
            for var in &member.var_decls {
                let dims = self.array_dims_string(&var.array_dims)?;
                self.write_line(&format!("{} {}{};", type_name, var.ident, dims));
            }
        }
        self.close_scope(true);
        Ok(())
    }

    fn write_buffer_decl_stmnt(&mut self, buffer: &BufferDeclStmnt) -> Result<()> {
        let TypeDenoter::Buffer { buffer_type, elem } = buffer.denoter.deref_alias() else {
            return Err(CompilerError::Internal(
                "buffer declaration without buffer type".to_string(),
            ));
        };
        let type_name = glsl_resource_name(*buffer_type, elem.as_deref()).ok_or_else(|| {
            CompilerError::UnsupportedFeature {
                message: format!(
                    "'{}' objects are not representable in GLSL output",
                    buffer_type.hlsl_name()
                ),
                span: buffer.span,
            }
        })?;
        for decl in &buffer.buffer_decls {
            let binding = Register::get_for_target(&decl.registers, self.shader_target);
            let layout = match binding {
                Some(register) if self.options.explicit_binding => {
                    format!("layout(binding = {}) ", register.slot)
                }
                _ => String::new(),
            };
            let dims = self.array_dims_string(&decl.array_dims)?;
            self.write_line(&format!(
                "{}uniform {} {}{};",
                layout, type_name, decl.ident, dims
            ));
        }
        Ok(())
    }

    fn write_function_decl(&mut self, func: &FunctionDecl) -> Result<()> {
        let is_entry = self
            .analysis
            .entry
            .as_ref()
            .map(|e| e.ident == func.ident)
            .unwrap_or(false);

        if is_entry {
            if func.is_forward_decl() {
                return Ok(());
            }
            self.write_line("void main()");
            self.is_inside_entry_point = true;
            let block = func.code_block.as_ref().ok_or_else(|| {
                CompilerError::Internal("entry point without a body".to_string())
            })?;
            self.open_scope();
            let last = block.stmnts.len().saturating_sub(1);
            for (index, stmnt) in block.stmnts.iter().enumerate() {
                self.write_stmnt(stmnt, index == last)?;
            }
            self.close_scope(false);
            self.is_inside_entry_point = false;
            return Ok(());
        }

        let mut params = Vec::new();
        for param in &func.parameters {
            params.push(self.param_to_string(param)?);
        }
        let header = format!(
            "{} {}({})",
            glsl_type_name(&func.return_type.denoter),
            func.ident,
            params.join(", ")
        );
        if let Some(block) = func.code_block.as_ref() {
            self.write_line(&header);
            self.open_scope();
            for stmnt in &block.stmnts {
                self.write_stmnt(stmnt, false)?;
            }
            self.close_scope(false);
        } else {
            self.write_line(&format!("{};", header));
        }
        Ok(())
    }

    fn param_to_string(&self, param: &VarDeclStmnt) -> Result<String> {
        let qualifier = match param.input_modifier {
            InputModifier::Out => "out ",
            InputModifier::InOut => "inout ",
            _ => "",
        };
        let var = param
            .var_decls
            .first()
            .ok_or_else(|| CompilerError::Internal("parameter without declarator".to_string()))?;
        let dims = self.array_dims_string(&var.array_dims)?;
        Ok(format!(
            "{}{} {}{}",
            qualifier,
            glsl_type_name(&param.var_type.denoter),
            var.ident,
            dims
        ))
    }

    /* ----- Statements ----- */

    fn write_stmnt(&mut self, stmnt: &Stmnt, is_last_in_entry: bool) -> Result<()> {
        self.write_stmnt_comments(stmnt.span());
        match stmnt {
            Stmnt::Null(_) => {
                self.write_line(";");
                Ok(())
            }
            Stmnt::VarDecl(decl) => self.write_local_var_decl(decl),
            Stmnt::StructDecl(decl) => {
                if !self.struct_must_resolve(&decl.struct_decl) {
                    self.write_struct_decl(&decl.struct_decl)?;
                }
                Ok(())
            }
            Stmnt::CodeBlock(block) => {
                self.open_scope();
                for inner in &block.code_block.stmnts {
                    self.write_stmnt(inner, false)?;
                }
                self.close_scope(false);
                Ok(())
            }
            Stmnt::For(stmnt) => {
                let init = match stmnt.init.as_ref() {
                    Stmnt::Null(_) => ";".to_string(),
                    Stmnt::VarDecl(decl) => self.local_var_decl_to_string(decl)?,
                    Stmnt::Expr(expr_stmnt) => {
                        format!("{};", self.expr_to_string(&expr_stmnt.expr)?)
                    }
                    other => {
                        return Err(CompilerError::Internal(format!(
                            "unexpected for-loop initializer at {}",
                            other.span()
                        )))
                    }
                };
                let condition = match &stmnt.condition {
                    Some(expr) => self.expr_to_string(expr)?,
                    None => String::new(),
                };
                let iteration = match &stmnt.iteration {
                    Some(expr) => self.expr_to_string(expr)?,
                    None => String::new(),
                };
                self.write_line(&format!("for ({} {}; {})", init, condition, iteration));
                self.write_scoped_stmnt(&stmnt.body)
            }
            Stmnt::While(stmnt) => {
                let condition = self.expr_to_string(&stmnt.condition)?;
                self.write_line(&format!("while ({})", condition));
                self.write_scoped_stmnt(&stmnt.body)
            }
            Stmnt::DoWhile(stmnt) => {
                self.write_line("do");
                self.write_scoped_stmnt(&stmnt.body)?;
                let condition = self.expr_to_string(&stmnt.condition)?;
                self.write_line(&format!("while ({});", condition));
                Ok(())
            }
            Stmnt::If(stmnt) => {
                let condition = self.expr_to_string(&stmnt.condition)?;
                self.write_line(&format!("if ({})", condition));
                self.write_scoped_stmnt(&stmnt.body)?;
                if let Some(else_stmnt) = &stmnt.else_stmnt {
                    self.write_line("else");
                    self.write_scoped_stmnt(else_stmnt)?;
                }
                Ok(())
            }
            Stmnt::Switch(stmnt) => {
                let selector = self.expr_to_string(&stmnt.selector)?;
                self.write_line(&format!("switch ({})", selector));
                self.open_scope();
                for case in &stmnt.cases {
                    match &case.expr {
                        Some(expr) => {
                            let label = self.expr_to_string(expr)?;
                            self.write_line(&format!("case {}:", label));
                        }
                        None => self.write_line("default:"),
                    }
                    self.indent_level += 1;
                    for inner in &case.stmnts {
                        self.write_stmnt(inner, false)?;
                    }
                    self.indent_level -= 1;
                }
                self.close_scope(false);
                Ok(())
            }
            Stmnt::Expr(stmnt) => {
                let expr = self.expr_to_string(&stmnt.expr)?;
                self.write_line(&format!("{};", expr));
                Ok(())
            }
            Stmnt::Return(stmnt) => self.write_return_stmnt(stmnt, is_last_in_entry),
            Stmnt::CtrlTransfer(stmnt) => {
                let keyword = match stmnt.transfer {
                    CtrlTransfer::Break => "break;",
                    CtrlTransfer::Continue => "continue;",
                    CtrlTransfer::Discard => "discard;",
                };
                self.write_line(keyword);
                Ok(())
            }
            other => Err(CompilerError::Internal(format!(
                "unexpected statement at {}",
                other.span()
            ))),
        }
    }

    fn write_scoped_stmnt(&mut self, stmnt: &Stmnt) -> Result<()> {
        match stmnt {
            Stmnt::CodeBlock(block) => {
                self.open_scope();
                for inner in &block.code_block.stmnts {
                    self.write_stmnt(inner, false)?;
                }
                self.close_scope(false);
                Ok(())
            }
            other => {
                self.indent_level += 1;
                let result = self.write_stmnt(other, false);
                self.indent_level -= 1;
                result
            }
        }
    }

    fn write_local_var_decl(&mut self, decl: &VarDeclStmnt) -> Result<()> {
        if decl.var_decls.iter().all(|v| v.is_entry_output_alias) {
            return Ok(());
        }
        let line = self.local_var_decl_to_string(decl)?;
        self.write_line(&line);
        Ok(())
    }

    fn local_var_decl_to_string(&self, decl: &VarDeclStmnt) -> Result<String> {
        let qualifier = if decl.type_modifiers.contains(&TypeModifier::Const) {
            "const "
        } else {
            ""
        };
        let type_name = glsl_type_name(&decl.var_type.denoter);
        let mut declarators = Vec::new();
        for var in &decl.var_decls {
            if var.is_entry_output_alias {
                continue;
            }
            let dims = self.array_dims_string(&var.array_dims)?;
            let init = match &var.initializer {
                Some(expr) => format!(" = {}", self.expr_to_string(expr)?),
                None => String::new(),
            };
            declarators.push(format!("{}{}{}", var.ident, dims, init));
        }
        Ok(format!(
            "{}{} {};",
            qualifier,
            type_name,
            declarators.join(", ")
        ))
    }

    fn write_return_stmnt(&mut self, stmnt: &ReturnStmnt, is_last_in_entry: bool) -> Result<()> {
        if !self.is_inside_entry_point {
            let line = match &stmnt.expr {
                Some(expr) => format!("return {};", self.expr_to_string(expr)?),
                None => "return;".to_string(),
            };
            self.write_line(&line);
            return Ok(());
        }

        // Inside the entry point, returned values become output
        // assignments; the return itself survives only mid-body.
        if let Some(expr) = &stmnt.expr {
            if !self.is_entry_output_alias_access(expr) {
                let entry = self.analysis.entry.as_ref().ok_or_else(|| {
                    CompilerError::Internal("entry point info missing".to_string())
                })?;
                let output = entry.return_output.map(|i| &entry.outputs[i]).ok_or_else(
                    || CompilerError::UnsupportedFeature {
                        message: "can not return an aggregate value from the entry point"
                            .to_string(),
                        span: stmnt.span,
                    },
                )?;
                let value = self.expr_to_string(expr)?;
                let target = output.glsl_name.clone();
                self.write_line(&format!("{} = {};", target, value));
            }
        }
        if !is_last_in_entry {
            self.write_line("return;");
        }
        Ok(())
    }

    /// True for `return o;` where `o` is a flattened output-struct local.
    fn is_entry_output_alias_access(&self, expr: &Expr) -> bool {
        match &expr.kind {
            ExprKind::VarAccess { var_ident, assign } if assign.is_none() => var_ident
                .symbol_ref
                .map(|id| {
                    matches!(
                        self.analysis.symbol(id).kind,
                        SymbolKind::Var {
                            role: VarRole::EntryOutputStruct,
                            ..
                        }
                    )
                })
                .unwrap_or(false),
            ExprKind::Bracket(inner) => self.is_entry_output_alias_access(inner),
            _ => false,
        }
    }

    /* ----- Expressions ----- */

    fn expr_to_string(&self, expr: &Expr) -> Result<String> {
        match &expr.kind {
            ExprKind::Null => Ok(String::new()),
            ExprKind::List(exprs) => {
                let parts: Result<Vec<String>> =
                    exprs.iter().map(|e| self.expr_to_string(e)).collect();
                Ok(parts?.join(", "))
            }
            ExprKind::Literal(literal) => Ok(literal.value.clone()),
            ExprKind::TypeName(denoter) => Ok(glsl_type_name(denoter)),
            ExprKind::Ternary {
                cond_expr,
                then_expr,
                else_expr,
            } => Ok(format!(
                "{} ? {} : {}",
                self.expr_to_string(cond_expr)?,
                self.expr_to_string(then_expr)?,
                self.expr_to_string(else_expr)?
            )),
            ExprKind::Binary {
                op,
                lhs_expr,
                rhs_expr,
            } => Ok(format!(
                "{} {} {}",
                self.expr_to_string(lhs_expr)?,
                op.to_op_string(),
                self.expr_to_string(rhs_expr)?
            )),
            ExprKind::Unary { op, expr: inner } => Ok(format!(
                "{}{}",
                op.to_op_string(),
                self.expr_to_string(inner)?
            )),
            ExprKind::PostUnary { op, expr: inner } => Ok(format!(
                "{}{}",
                self.expr_to_string(inner)?,
                op.to_op_string()
            )),
            ExprKind::Call(call) => self.call_to_string(call, expr.span),
            ExprKind::Bracket(inner) => Ok(format!("({})", self.expr_to_string(inner)?)),
            ExprKind::Suffix {
                expr: inner,
                var_ident,
            } => Ok(format!(
                "{}.{}",
                self.expr_to_string(inner)?,
                self.var_ident_tail_to_string(var_ident)?
            )),
            ExprKind::ArrayAccess {
                expr: inner,
                array_indices,
            } => {
                let mut s = self.expr_to_string(inner)?;
                for index in array_indices {
                    s.push_str(&format!("[{}]", self.expr_to_string(index)?));
                }
                Ok(s)
            }
            ExprKind::Cast {
                denoter,
                expr: inner,
            } => Ok(format!(
                "{}({})",
                glsl_type_name(denoter),
                self.expr_to_string(inner)?
            )),
            ExprKind::VarAccess { var_ident, assign } => {
                let mut s = self.var_access_to_string(var_ident)?;
                if let Some((op, rhs)) = assign {
                    s.push_str(&format!(
                        " {} {}",
                        op.to_op_string(),
                        self.expr_to_string(rhs)?
                    ));
                }
                Ok(s)
            }
            ExprKind::Initializer(exprs) => {
                let parts: Result<Vec<String>> =
                    exprs.iter().map(|e| self.expr_to_string(e)).collect();
                Ok(format!("{{ {} }}", parts?.join(", ")))
            }
        }
    }

    fn call_to_string(&self, call: &FunctionCall, span: Span) -> Result<String> {
        let args: Result<Vec<String>> = call
            .arguments
            .iter()
            .map(|a| self.expr_to_string(a))
            .collect();
        let args = args?;

        if let Some(ctor) = &call.type_ctor {
            return Ok(format!("{}({})", glsl_type_name(ctor), args.join(", ")));
        }
        if let Some(intrinsic) = call.intrinsic {
            let desc = intrinsics::find_by_intrinsic(intrinsic);
            return match desc.shape {
                EmissionShape::Call(name) => match &call.object {
                    // Non-sampling method calls fold the object into the
                    // first argument (e.g. legacy tex2D forms).
                    Some(object) => {
                        let object = self.expr_to_string(object)?;
                        Ok(format!("{}({}, {})", name, object, args.join(", ")))
                    }
                    None => Ok(format!("{}({})", name, args.join(", "))),
                },
                EmissionShape::BinaryMul => {
                    Ok(format!("({} * {})", args[0], args[1]))
                }
                EmissionShape::Reciprocal => {
                    let literal = match call
                        .arguments
                        .first()
                        .and_then(|arg| self.analysis.type_of(arg.id))
                        .and_then(|ty| ty.as_data_type())
                        .and_then(|dt| dt.scalar_type())
                    {
                        Some(ScalarType::Double) => "1.0lf",
                        _ => "1.0",
                    };
                    Ok(format!("({} / {})", literal, args[0]))
                }
                EmissionShape::Clamp01 => Ok(format!("clamp({}, 0.0, 1.0)", args[0])),
                EmissionShape::Atomic(name) => {
                    // The optional out-argument receives the original
                    // value from the GLSL return value.
                    match args.split_last() {
                        Some((original, rest)) if args.len() > desc.min_args => {
                            Ok(format!("{} = {}({})", original, name, rest.join(", ")))
                        }
                        _ => Ok(format!("{}({})", name, args.join(", "))),
                    }
                }
                EmissionShape::Clip => Ok(format!("{}clip({})", self.prefix, args[0])),
                EmissionShape::TextureSample => {
                    let object = call.object.as_ref().ok_or_else(|| {
                        CompilerError::Internal("texture sample without object".to_string())
                    })?;
                    let texture = self.expr_to_string(object)?;
                    // The HLSL sampler-state argument has no GLSL
                    // counterpart and is dropped.
                    let coords = args.get(1).cloned().unwrap_or_default();
                    Ok(format!("texture({}, {})", texture, coords))
                }
            };
        }
        if call.func_decl_ref.is_some() {
            return Ok(format!("{}({})", call.ident, args.join(", ")));
        }
        Err(CompilerError::Internal(format!(
            "unresolved function call '{}' at {}",
            call.ident, span
        )))
    }

    /// Renders an identifier chain, rewriting flattened entry-point
    /// accesses to their synthesized stage variables.
    fn var_access_to_string(&self, var_ident: &VarIdent) -> Result<String> {
        let role = var_ident
            .symbol_ref
            .map(|id| match &self.analysis.symbol(id).kind {
                SymbolKind::Var { role, .. } => role.clone(),
                _ => VarRole::Plain,
            })
            .unwrap_or(VarRole::Plain);

        match role {
            VarRole::Plain => self.var_ident_tail_to_string(var_ident),
            VarRole::EntryInput => {
                let entry = self.analysis.entry.as_ref().ok_or_else(|| {
                    CompilerError::Internal("entry point info missing".to_string())
                })?;
                let mapped = entry
                    .input(&var_ident.ident)
                    .or_else(|| entry.output(&var_ident.ident))
                    .map(|v| v.glsl_name.clone())
                    .unwrap_or_else(|| var_ident.ident.clone());
                let mut s = mapped;
                s.push_str(&self.array_indices_to_string(&var_ident.array_indices)?);
                if let Some(next) = &var_ident.next {
                    s.push('.');
                    s.push_str(&self.var_ident_tail_to_string(next)?);
                }
                Ok(s)
            }
            VarRole::EntryInputStruct | VarRole::EntryOutputStruct => {
                let entry = self.analysis.entry.as_ref().ok_or_else(|| {
                    CompilerError::Internal("entry point info missing".to_string())
                })?;
                let member = var_ident.next.as_deref().ok_or_else(|| {
                    CompilerError::UnsupportedFeature {
                        message: format!(
                            "can not reference flattened aggregate '{}' as a whole",
                            var_ident.ident
                        ),
                        span: var_ident.span,
                    }
                })?;
                let io_var = if role == VarRole::EntryInputStruct {
                    entry.input(&member.ident)
                } else {
                    entry.output(&member.ident)
                };
                let io_var = io_var.ok_or_else(|| CompilerError::Internal(format!(
                    "no stage variable for member '{}' at {}",
                    member.ident, member.span
                )))?;
                let mut s = io_var.glsl_name.clone();
                s.push_str(&self.array_indices_to_string(&member.array_indices)?);
                if let Some(next) = &member.next {
                    s.push('.');
                    s.push_str(&self.var_ident_tail_to_string(next)?);
                }
                Ok(s)
            }
        }
    }

    /// Plain chain rendering without any rewriting.
    fn var_ident_tail_to_string(&self, var_ident: &VarIdent) -> Result<String> {
        let mut s = var_ident.ident.clone();
        s.push_str(&self.array_indices_to_string(&var_ident.array_indices)?);
        if let Some(next) = &var_ident.next {
            s.push('.');
            s.push_str(&self.var_ident_tail_to_string(next)?);
        }
        Ok(s)
    }

    fn array_indices_to_string(&self, indices: &[Expr]) -> Result<String> {
        let mut s = String::new();
        for index in indices {
            s.push_str(&format!("[{}]", self.expr_to_string(index)?));
        }
        Ok(s)
    }

    fn array_dims_string(&self, dims: &[Option<Expr>]) -> Result<String> {
        let mut s = String::new();
        for dim in dims {
            match dim {
                Some(expr) => s.push_str(&format!("[{}]", self.expr_to_string(expr)?)),
                None => s.push_str("[]"),
            }
        }
        Ok(s)
    }
}

/// GLSL spelling of a type denoter. Half has no GLSL counterpart and
/// widens to float.
pub fn glsl_type_name(denoter: &TypeDenoter) -> String {
    match denoter.deref_alias() {
        TypeDenoter::Void => "void".to_string(),
        TypeDenoter::Base(dt) => glsl_data_type_name(*dt),
        TypeDenoter::Buffer { buffer_type, elem } => {
            glsl_resource_name(*buffer_type, elem.as_deref())
                .unwrap_or_else(|| buffer_type.hlsl_name().to_string())
        }
        TypeDenoter::Sampler(_) => "sampler2D".to_string(),
        TypeDenoter::Struct { ident, .. } => ident.clone(),
        TypeDenoter::Alias { ident, .. } => ident.clone(),
        TypeDenoter::Array { base, .. } => glsl_type_name(base),
    }
}

fn glsl_data_type_name(data_type: DataType) -> String {
    match data_type {
        DataType::Scalar(scalar) => glsl_scalar_name(scalar).to_string(),
        DataType::Vector(scalar, n) => format!("{}vec{}", glsl_vector_prefix(scalar), n),
        DataType::Matrix(scalar, r, c) => {
            let prefix = if scalar == ScalarType::Double { "dmat" } else { "mat" };
            if r == c {
                format!("{}{}", prefix, r)
            } else {
                format!("{}{}x{}", prefix, r, c)
            }
        }
        DataType::String => "string".to_string(),
    }
}

fn glsl_scalar_name(scalar: ScalarType) -> &'static str {
    match scalar {
        ScalarType::Bool => "bool",
        ScalarType::Int => "int",
        ScalarType::UInt => "uint",
        ScalarType::Half | ScalarType::Float => "float",
        ScalarType::Double => "double",
    }
}

fn glsl_vector_prefix(scalar: ScalarType) -> &'static str {
    match scalar {
        ScalarType::Bool => "b",
        ScalarType::Int => "i",
        ScalarType::UInt => "u",
        ScalarType::Half | ScalarType::Float => "",
        ScalarType::Double => "d",
    }
}

/// GLSL resource type for an HLSL buffer object, or `None` when the
/// object has no direct GLSL counterpart.
fn glsl_resource_name(buffer_type: BufferType, elem: Option<&TypeDenoter>) -> Option<String> {
    let prefix = match elem
        .and_then(|e| e.as_data_type())
        .and_then(|dt| dt.scalar_type())
    {
        Some(ScalarType::Int) => "i",
        Some(ScalarType::UInt) => "u",
        _ => "",
    };
    let base = match buffer_type {
        BufferType::Texture1D => "sampler1D",
        BufferType::Texture1DArray => "sampler1DArray",
        BufferType::Texture2D => "sampler2D",
        BufferType::Texture2DArray => "sampler2DArray",
        BufferType::Texture2DMs => "sampler2DMS",
        BufferType::Texture3D => "sampler3D",
        BufferType::TextureCube => "samplerCube",
        BufferType::TextureCubeArray => "samplerCubeArray",
        BufferType::Buffer => "samplerBuffer",
        BufferType::RwBuffer => "imageBuffer",
        BufferType::RwTexture1D => "image1D",
        BufferType::RwTexture2D => "image2D",
        BufferType::RwTexture3D => "image3D",
        BufferType::StructuredBuffer
        | BufferType::RwStructuredBuffer
        | BufferType::ByteAddressBuffer
        | BufferType::RwByteAddressBuffer => return None,
    };
    Some(format!("{}{}", prefix, base))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Analyzer;
    use crate::lexer::tokenize;
    use crate::parser::Parser;

    fn translate(
        source: &str,
        target: ShaderTarget,
        entry: &str,
        version: OutputShaderVersion,
        options: &Options,
    ) -> Result<String> {
        let stream = tokenize(source).unwrap();
        let mut parser = Parser::new(stream.tokens);
        let mut program = parser.parse()?;
        let analysis = Analyzer::new(target, entry, &options.effective_prefix())
            .analyze(&mut program)?;
        GlslGenerator::new(&analysis, target, version, options, &stream.comments)
            .generate(&program)
    }

    fn translate_default(source: &str, target: ShaderTarget, entry: &str) -> String {
        translate(
            source,
            target,
            entry,
            OutputShaderVersion::GLSL330,
            &Options::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_trivial_vertex_pass() {
        let glsl = translate_default(
            "float4 main(float4 pos : POSITION) : SV_Position { return pos; }",
            ShaderTarget::Vertex,
            "main",
        );
        assert!(glsl.starts_with("#version 330\n"), "got:\n{}", glsl);
        assert!(glsl.contains("in vec4 pos;"), "got:\n{}", glsl);
        assert!(glsl.contains("void main()"), "got:\n{}", glsl);
        assert!(glsl.contains("gl_Position = pos;"), "got:\n{}", glsl);
        // The trailing return of the entry point is absorbed.
        assert!(!glsl.contains("return"), "got:\n{}", glsl);
    }

    #[test]
    fn test_struct_flattening() {
        let source = r#"
            struct VSIn { float3 p : POSITION; float2 uv : TEXCOORD0; };
            struct VSOut { float4 p : SV_Position; float2 uv : TEXCOORD0; };
            VSOut main(VSIn i) {
                VSOut o;
                o.p = float4(i.p, 1);
                o.uv = i.uv;
                return o;
            }
        "#;
        let glsl = translate_default(source, ShaderTarget::Vertex, "main");
        assert!(glsl.contains("in vec3 p;"), "got:\n{}", glsl);
        assert!(glsl.contains("in vec2 uv;"), "got:\n{}", glsl);
        assert!(glsl.contains("out vec2 _uv;"), "got:\n{}", glsl);
        assert!(glsl.contains("gl_Position = vec4(p, 1);"), "got:\n{}", glsl);
        assert!(glsl.contains("_uv = uv;"), "got:\n{}", glsl);
        // The flattened structs are not emitted.
        assert!(!glsl.contains("struct VSIn"), "got:\n{}", glsl);
        assert!(!glsl.contains("struct VSOut"), "got:\n{}", glsl);
        // The local output alias disappears.
        assert!(!glsl.contains("VSOut o"), "got:\n{}", glsl);
    }

    #[test]
    fn test_out_struct_parameter_carries_outputs() {
        let source = r#"
            struct VSIn { float3 p : POSITION; float2 uv : TEXCOORD0; };
            struct VSOut { float4 p : SV_Position; float2 uv : TEXCOORD0; };
            void main(VSIn i, out VSOut o) {
                o.p = float4(i.p, 1);
                o.uv = i.uv;
            }
        "#;
        let glsl = translate_default(source, ShaderTarget::Vertex, "main");
        assert!(glsl.contains("in vec3 p;"), "got:\n{}", glsl);
        assert!(glsl.contains("in vec2 uv;"), "got:\n{}", glsl);
        assert!(glsl.contains("out vec2 _uv;"), "got:\n{}", glsl);
        assert!(glsl.contains("gl_Position = vec4(p, 1);"), "got:\n{}", glsl);
        assert!(glsl.contains("_uv = uv;"), "got:\n{}", glsl);
    }

    #[test]
    fn test_intrinsic_mul() {
        let source = r#"
            float4x4 wvp;
            float4 main(float4 v : POSITION) : SV_Position {
                float4 r = mul(wvp, v);
                return r;
            }
        "#;
        let glsl = translate_default(source, ShaderTarget::Vertex, "main");
        assert!(glsl.contains("vec4 r = (wvp * v);"), "got:\n{}", glsl);
    }

    #[test]
    fn test_intrinsic_rcp() {
        let source = r#"
            float main(float y : TEXCOORD0) : SV_Depth {
                float x = rcp(y);
                return x;
            }
        "#;
        let glsl = translate_default(source, ShaderTarget::Fragment, "main");
        assert!(glsl.contains("float x = (1.0 / y);"), "got:\n{}", glsl);
    }

    #[test]
    fn test_intrinsic_saturate() {
        let source = r#"
            float main(float y : TEXCOORD0) : SV_Depth {
                return saturate(y);
            }
        "#;
        let glsl = translate_default(source, ShaderTarget::Fragment, "main");
        assert!(glsl.contains("clamp(y, 0.0, 1.0)"), "got:\n{}", glsl);
    }

    #[test]
    fn test_clip_helper_emitted_once() {
        let source = r#"
            float4 main(float4 c : COLOR0) : SV_Target {
                clip(c);
                clip(c);
                return c;
            }
        "#;
        let glsl = translate_default(source, ShaderTarget::Fragment, "main");
        assert_eq!(glsl.matches("void _clip(vec4 x)").count(), 1, "got:\n{}", glsl);
        assert!(
            glsl.contains("if (any(lessThan(x, vec4(0.0))))"),
            "got:\n{}",
            glsl
        );
        assert_eq!(glsl.matches("_clip(c);").count(), 2, "got:\n{}", glsl);
        // The helper precedes the entry point.
        assert!(
            glsl.find("void _clip").unwrap() < glsl.find("void main").unwrap(),
            "got:\n{}",
            glsl
        );
    }

    #[test]
    fn test_atomic_rewrite_with_original_value() {
        let source = r#"
            groupshared uint counter;
            [numthreads(8, 8, 1)]
            void main(uint3 id : SV_DispatchThreadID) {
                uint prev;
                InterlockedAdd(counter, 1u, prev);
            }
        "#;
        let glsl = translate(
            source,
            ShaderTarget::Compute,
            "main",
            OutputShaderVersion::GLSL,
            &Options::default(),
        )
        .unwrap();
        assert!(glsl.contains("prev = atomicAdd(counter, 1u);"), "got:\n{}", glsl);
        // Compute plus atomics require at least GLSL 430.
        assert!(glsl.starts_with("#version 430"), "got:\n{}", glsl);
        assert!(
            glsl.contains("layout(local_size_x = 8, local_size_y = 8, local_size_z = 1) in;"),
            "got:\n{}",
            glsl
        );
    }

    #[test]
    fn test_auto_version_is_minimal() {
        let glsl = translate(
            "float4 main(float4 pos : POSITION) : SV_Position { return pos; }",
            ShaderTarget::Vertex,
            "main",
            OutputShaderVersion::GLSL,
            &Options::default(),
        )
        .unwrap();
        assert!(glsl.starts_with("#version 130\n"), "got:\n{}", glsl);
    }

    #[test]
    fn test_fixed_version_too_low_fails() {
        let source = r#"
            groupshared uint counter;
            [numthreads(1, 1, 1)]
            void main(uint3 id : SV_DispatchThreadID) {
                InterlockedAdd(counter, 1u);
            }
        "#;
        let result = translate(
            source,
            ShaderTarget::Compute,
            "main",
            OutputShaderVersion::GLSL330,
            &Options::default(),
        );
        assert!(matches!(
            result.unwrap_err(),
            CompilerError::UnsupportedFeature { .. }
        ));
    }

    #[test]
    fn test_essl_is_deferred() {
        let result = translate(
            "float4 main(float4 pos : POSITION) : SV_Position { return pos; }",
            ShaderTarget::Vertex,
            "main",
            OutputShaderVersion::ESSL300,
            &Options::default(),
        );
        assert!(matches!(
            result.unwrap_err(),
            CompilerError::UnsupportedFeature { .. }
        ));
    }

    #[test]
    fn test_vksl_version_directive() {
        let glsl = translate(
            "float4 main(float4 pos : POSITION) : SV_Position { return pos; }",
            ShaderTarget::Vertex,
            "main",
            OutputShaderVersion::VKSL450,
            &Options::default(),
        )
        .unwrap();
        assert!(glsl.starts_with("#version 450\n"), "got:\n{}", glsl);
    }

    #[test]
    fn test_cbuffer_becomes_uniform_block() {
        let source = r#"
            cbuffer Scene : register(b2) { float4x4 wvp; };
            float4 main(float4 v : POSITION) : SV_Position { return mul(wvp, v); }
        "#;
        let mut options = Options::default();
        options.explicit_binding = true;
        let glsl = translate(
            source,
            ShaderTarget::Vertex,
            "main",
            OutputShaderVersion::GLSL420,
            &options,
        )
        .unwrap();
        assert!(
            glsl.contains("layout(std140, binding = 2) uniform Scene"),
            "got:\n{}",
            glsl
        );
        assert!(glsl.contains("mat4 wvp;"), "got:\n{}", glsl);
    }

    #[test]
    fn test_texture_sampling() {
        let source = r#"
            Texture2D colorMap : register(t0);
            SamplerState linearSampler : register(s0);
            float4 main(float2 uv : TEXCOORD0) : SV_Target {
                return colorMap.Sample(linearSampler, uv);
            }
        "#;
        let glsl = translate_default(source, ShaderTarget::Fragment, "main");
        assert!(glsl.contains("uniform sampler2D colorMap;"), "got:\n{}", glsl);
        assert!(glsl.contains("texture(colorMap, uv)"), "got:\n{}", glsl);
        // Separate sampler state objects disappear.
        assert!(!glsl.contains("linearSampler"), "got:\n{}", glsl);
    }

    #[test]
    fn test_fragment_target_output() {
        let source = r#"
            float4 main(float2 uv : TEXCOORD0) : SV_Target {
                return float4(uv, 0.0, 1.0);
            }
        "#;
        let glsl = translate_default(source, ShaderTarget::Fragment, "main");
        assert!(glsl.contains("out vec4 _target0;"), "got:\n{}", glsl);
        assert!(
            glsl.contains("_target0 = vec4(uv, 0.0, 1.0);"),
            "got:\n{}",
            glsl
        );
    }

    #[test]
    fn test_extension_for_explicit_binding() {
        let source = r#"
            cbuffer Scene : register(b0) { float4x4 wvp; };
            float4 main(float4 v : POSITION) : SV_Position { return mul(wvp, v); }
        "#;
        let mut options = Options::default();
        options.explicit_binding = true;
        options.allow_extensions = true;
        let glsl = translate(
            source,
            ShaderTarget::Vertex,
            "main",
            OutputShaderVersion::GLSL330,
            &options,
        )
        .unwrap();
        assert!(
            glsl.contains("#extension GL_ARB_shading_language_420pack : enable"),
            "got:\n{}",
            glsl
        );
    }

    #[test]
    fn test_comments_passthrough() {
        let source = "// view transform\nfloat4 main(float4 v : POSITION) : SV_Position { return v; }";
        let glsl = translate_default(source, ShaderTarget::Vertex, "main");
        assert!(glsl.contains("// view transform"), "got:\n{}", glsl);

        let mut options = Options::default();
        options.keep_comments = false;
        let stripped = translate(
            source,
            ShaderTarget::Vertex,
            "main",
            OutputShaderVersion::GLSL330,
            &options,
        )
        .unwrap();
        assert!(!stripped.contains("view transform"), "got:\n{}", stripped);
    }

    #[test]
    fn test_line_marks() {
        let source = "float4 main(float4 v : POSITION) : SV_Position { return v; }";
        let mut options = Options::default();
        options.line_marks = true;
        let glsl = translate(
            source,
            ShaderTarget::Vertex,
            "main",
            OutputShaderVersion::GLSL330,
            &options,
        )
        .unwrap();
        assert!(glsl.contains("#line 1"), "got:\n{}", glsl);
    }

    #[test]
    fn test_helper_function_preserved() {
        let source = r#"
            float2 flip(float2 uv) { return float2(uv.x, 1.0 - uv.y); }
            float4 main(float2 uv : TEXCOORD0) : SV_Target {
                return float4(flip(uv), 0.0, 1.0);
            }
        "#;
        let glsl = translate_default(source, ShaderTarget::Fragment, "main");
        assert!(glsl.contains("vec2 flip(vec2 uv)"), "got:\n{}", glsl);
        assert!(glsl.contains("vec4(flip(uv), 0.0, 1.0)"), "got:\n{}", glsl);
    }
}
