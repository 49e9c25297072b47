//! Semantic analysis: reference resolution and type derivation.
//!
//! Runs in two phases over the AST. Phase one collects global
//! declarations into the symbol arena, struct registry and function
//! table. Phase two walks every function body, resolves identifier
//! chains, derives the type of every expression into the `NodeId`-keyed
//! type table, resolves overloads and intrinsics, and classifies the
//! entry point's inputs and outputs for the generator.

use crate::ast::*;
use crate::error::{CompilerError, Result};
use crate::intrinsics;
use crate::scope::ScopeStack;
use crate::ty::{
    DataType, ScalarType, StructId, StructMember, StructRecord, StructRegistry, SymbolId,
    TypeDenoter, Variant,
};
use crate::version::ShaderTarget;
use log::trace;
use std::collections::HashMap;

/// Non-fatal diagnostic collected during analysis.
#[derive(Debug, Clone)]
pub struct Warning {
    message: String,
    span: Span,
}

impl Warning {
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn span(&self) -> Span {
        self.span
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VarRole {
    Plain,
    /// Non-struct entry parameter mapped to a single stage input.
    EntryInput,
    /// Struct-typed entry parameter; member accesses map to stage inputs.
    EntryInputStruct,
    /// Local variable of the entry's output struct type; member accesses
    /// map to stage outputs.
    EntryOutputStruct,
}

#[derive(Debug, Clone)]
pub enum SymbolKind {
    Var {
        ty: TypeDenoter,
        is_const: bool,
        role: VarRole,
    },
    Function(FunctionId),
    Struct(StructId),
    Alias(TypeDenoter),
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub ident: String,
    pub span: Span,
    pub kind: SymbolKind,
}

#[derive(Debug, Clone)]
pub struct FunctionRecord {
    pub ident: String,
    pub param_types: Vec<TypeDenoter>,
    pub return_type: TypeDenoter,
    pub num_min_args: usize,
    pub num_max_args: usize,
    pub has_body: bool,
    pub span: Span,
    pub signature: String,
}

/// One flattened stage input or output.
#[derive(Debug, Clone)]
pub struct IoVar {
    /// Source name (parameter or struct member).
    pub ident: String,
    /// Stage variable name or `gl_*` built-in.
    pub glsl_name: String,
    pub ty: TypeDenoter,
    pub semantic: Option<Semantic>,
    pub builtin: bool,
    /// Declaration-order index for explicit locations (non-builtins only).
    pub location: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct EntryPoint {
    pub ident: String,
    pub inputs: Vec<IoVar>,
    pub outputs: Vec<IoVar>,
    /// Index into `outputs` receiving a non-struct return value.
    pub return_output: Option<usize>,
    /// The flattened output struct type, if the entry returns a struct.
    pub return_struct: Option<StructId>,
    pub num_threads: Option<[u32; 3]>,
}

impl EntryPoint {
    pub fn input(&self, ident: &str) -> Option<&IoVar> {
        self.inputs.iter().find(|v| v.ident == ident)
    }

    pub fn output(&self, ident: &str) -> Option<&IoVar> {
        self.outputs.iter().find(|v| v.ident == ident)
    }
}

/// Result of a full analysis pass, consumed read-only by the generator.
#[derive(Debug, Default)]
pub struct Analysis {
    pub symbols: Vec<Symbol>,
    pub structs: StructRegistry,
    pub functions: Vec<FunctionRecord>,
    pub type_table: HashMap<NodeId, TypeDenoter>,
    pub entry: Option<EntryPoint>,
    warnings: Vec<Warning>,
}

impl Analysis {
    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0]
    }

    pub fn type_of(&self, id: NodeId) -> Option<&TypeDenoter> {
        self.type_table.get(&id)
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }
}

pub struct Analyzer {
    symbols: Vec<Symbol>,
    scope: ScopeStack,
    structs: StructRegistry,
    functions: Vec<FunctionRecord>,
    type_table: HashMap<NodeId, TypeDenoter>,
    warnings: Vec<Warning>,
    shader_target: ShaderTarget,
    entry_point: String,
    prefix: String,
    entry: Option<EntryPoint>,
    current_return_type: Option<TypeDenoter>,
    in_entry: bool,
}

impl Analyzer {
    pub fn new(shader_target: ShaderTarget, entry_point: &str, prefix: &str) -> Self {
        Analyzer {
            symbols: Vec::new(),
            scope: ScopeStack::new(),
            structs: StructRegistry::new(),
            functions: Vec::new(),
            type_table: HashMap::new(),
            warnings: Vec::new(),
            shader_target,
            entry_point: entry_point.to_string(),
            prefix: prefix.to_string(),
            entry: None,
            current_return_type: None,
            in_entry: false,
        }
    }

    pub fn analyze(mut self, program: &mut Program) -> Result<Analysis> {
        self.collect_globals(program)?;
        self.analyze_function_bodies(program)?;
        if !self.entry_point.is_empty() && self.entry.is_none() {
            return Err(CompilerError::UndefinedSymbol {
                ident: self.entry_point.clone(),
                span: Span::default(),
            });
        }
        Ok(Analysis {
            symbols: self.symbols,
            structs: self.structs,
            functions: self.functions,
            type_table: self.type_table,
            entry: self.entry,
            warnings: self.warnings,
        })
    }

    /* ----- Symbol arena ----- */

    fn add_symbol(&mut self, symbol: Symbol) -> SymbolId {
        self.symbols.push(symbol);
        SymbolId(self.symbols.len() - 1)
    }

    fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0]
    }

    fn warn(&mut self, message: String, span: Span) {
        self.warnings.push(Warning { message, span });
    }

    /// Memoized type of an already-visited expression.
    fn ty_of(&self, expr: &Expr) -> Result<TypeDenoter> {
        self.type_table.get(&expr.id).cloned().ok_or_else(|| {
            CompilerError::Internal(format!(
                "missing buffered type denoter for expression at {}",
                expr.span
            ))
        })
    }

    fn reset_type_denoter(&mut self, id: NodeId) {
        self.type_table.remove(&id);
    }

    /* ----- Phase 1: global declarations ----- */

    fn collect_globals(&mut self, program: &mut Program) -> Result<()> {
        for stmnt in &mut program.globals {
            match stmnt {
                Stmnt::StructDecl(decl_stmnt) => {
                    self.register_struct(&mut decl_stmnt.struct_decl)?;
                }
                Stmnt::Alias(alias) => {
                    let resolved = self.resolve_type_denoter(&alias.denoter, alias.span)?;
                    alias.denoter = resolved.clone();
                    self.check_redeclaration(&alias.ident, alias.span)?;
                    let id = self.add_symbol(Symbol {
                        ident: alias.ident.clone(),
                        span: alias.span,
                        kind: SymbolKind::Alias(resolved),
                    });
                    self.scope.insert(alias.ident.clone(), id);
                }
                Stmnt::Function(func) => {
                    self.register_function(func)?;
                }
                Stmnt::VarDecl(decl_stmnt) => {
                    let resolved =
                        self.resolve_type_denoter(&decl_stmnt.var_type.denoter, decl_stmnt.span)?;
                    decl_stmnt.var_type.denoter = resolved.clone();
                    let is_const = decl_stmnt.is_const();
                    for var in &mut decl_stmnt.var_decls {
                        let dims = self.eval_array_dims(&var.array_dims)?;
                        let ty = resolved.clone().as_array(dims);
                        self.check_redeclaration(&var.ident, var.span)?;
                        let id = self.add_symbol(Symbol {
                            ident: var.ident.clone(),
                            span: var.span,
                            kind: SymbolKind::Var {
                                ty,
                                is_const,
                                role: VarRole::Plain,
                            },
                        });
                        var.symbol_ref = Some(id);
                        self.scope.insert(var.ident.clone(), id);
                    }
                }
                Stmnt::UniformBuffer(buffer) => {
                    // cbuffer members are referenced unqualified.
                    for member in &mut buffer.members {
                        let resolved =
                            self.resolve_type_denoter(&member.var_type.denoter, member.span)?;
                        member.var_type.denoter = resolved.clone();
                        for var in &mut member.var_decls {
                            let dims = self.eval_array_dims(&var.array_dims)?;
                            let ty = resolved.clone().as_array(dims);
                            self.check_redeclaration(&var.ident, var.span)?;
                            let id = self.add_symbol(Symbol {
                                ident: var.ident.clone(),
                                span: var.span,
                                kind: SymbolKind::Var {
                                    ty,
                                    is_const: true,
                                    role: VarRole::Plain,
                                },
                            });
                            var.symbol_ref = Some(id);
                            self.scope.insert(var.ident.clone(), id);
                        }
                    }
                }
                Stmnt::Buffer(buffer) => {
                    for decl in &mut buffer.buffer_decls {
                        let dims = self.eval_array_dims(&decl.array_dims)?;
                        let ty = buffer.denoter.clone().as_array(dims);
                        self.check_redeclaration(&decl.ident, decl.span)?;
                        let id = self.add_symbol(Symbol {
                            ident: decl.ident.clone(),
                            span: decl.span,
                            kind: SymbolKind::Var {
                                ty,
                                is_const: true,
                                role: VarRole::Plain,
                            },
                        });
                        self.scope.insert(decl.ident.clone(), id);
                    }
                }
                Stmnt::Sampler(sampler) => {
                    for decl in &mut sampler.sampler_decls {
                        let dims = self.eval_array_dims(&decl.array_dims)?;
                        let ty =
                            TypeDenoter::Sampler(sampler.sampler_type).as_array(dims);
                        self.check_redeclaration(&decl.ident, decl.span)?;
                        let id = self.add_symbol(Symbol {
                            ident: decl.ident.clone(),
                            span: decl.span,
                            kind: SymbolKind::Var {
                                ty,
                                is_const: true,
                                role: VarRole::Plain,
                            },
                        });
                        self.scope.insert(decl.ident.clone(), id);
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn check_redeclaration(&self, ident: &str, span: Span) -> Result<()> {
        if self.scope.is_defined_in_current_scope(ident) {
            Err(CompilerError::RedefinedSymbol {
                ident: ident.to_string(),
                span,
            })
        } else {
            Ok(())
        }
    }

    fn register_struct(&mut self, decl: &mut StructDecl) -> Result<()> {
        let base = match &decl.base_struct {
            Some(base_ident) => match self.scope.lookup(base_ident).map(|id| &self.symbol(id).kind)
            {
                Some(SymbolKind::Struct(base_id)) => Some(*base_id),
                _ => {
                    return Err(CompilerError::UndefinedSymbol {
                        ident: base_ident.clone(),
                        span: decl.span,
                    })
                }
            },
            None => None,
        };

        let mut members = Vec::new();
        for member in &mut decl.members {
            let resolved = self.resolve_type_denoter(&member.var_type.denoter, member.span)?;
            member.var_type.denoter = resolved.clone();
            let is_const = member.is_const();
            for var in &member.var_decls {
                let dims = self.eval_array_dims(&var.array_dims)?;
                members.push(StructMember {
                    ident: var.ident.clone(),
                    ty: resolved.clone().as_array(dims),
                    semantic: var.semantic.clone(),
                    is_const,
                });
            }
        }

        if !decl.is_anonymous() {
            self.check_redeclaration(&decl.ident, decl.span)?;
        }
        let struct_id = self.structs.register(StructRecord {
            ident: decl.ident.clone(),
            base,
            members,
            must_resolve: false,
        });
        decl.struct_ref = Some(struct_id);
        if !decl.is_anonymous() {
            let id = self.add_symbol(Symbol {
                ident: decl.ident.clone(),
                span: decl.span,
                kind: SymbolKind::Struct(struct_id),
            });
            self.scope.insert(decl.ident.clone(), id);
        }
        Ok(())
    }

    fn register_function(&mut self, func: &mut FunctionDecl) -> Result<()> {
        let return_type = self.resolve_type_denoter(&func.return_type.denoter, func.span)?;
        func.return_type.denoter = return_type.clone();
        let mut param_types = Vec::new();
        for param in &mut func.parameters {
            let resolved = self.resolve_type_denoter(&param.var_type.denoter, param.span)?;
            param.var_type.denoter = resolved.clone();
            let dims = match param.var_decls.first() {
                Some(var) => self.eval_array_dims(&var.array_dims)?,
                None => Vec::new(),
            };
            param_types.push(resolved.as_array(dims));
        }

        // Forward declarations pair with exactly one later definition of
        // the same signature; a second definition is a redefinition.
        let existing = self.functions.iter().position(|record| {
            record.ident == func.ident
                && record.param_types.len() == param_types.len()
                && record
                    .param_types
                    .iter()
                    .zip(param_types.iter())
                    .all(|(a, b)| a.equals(b))
        });
        match existing {
            Some(index) => {
                if func.is_forward_decl() {
                    return Ok(());
                }
                if self.functions[index].has_body {
                    return Err(CompilerError::RedefinedSymbol {
                        ident: func.ident.clone(),
                        span: func.span,
                    });
                }
                self.functions[index].has_body = true;
            }
            None => {
                let record = FunctionRecord {
                    ident: func.ident.clone(),
                    signature: func.signature_to_string(),
                    param_types,
                    return_type,
                    num_min_args: func.num_min_args(),
                    num_max_args: func.num_max_args(),
                    has_body: !func.is_forward_decl(),
                    span: func.span,
                };
                self.functions.push(record);
                let function_id = FunctionId(self.functions.len() - 1);
                let id = self.add_symbol(Symbol {
                    ident: func.ident.clone(),
                    span: func.span,
                    kind: SymbolKind::Function(function_id),
                });
                self.scope.insert_global(func.ident.clone(), id);
            }
        }
        Ok(())
    }

    /// Resolves named types (struct or typedef references) left open by
    /// the parser.
    fn resolve_type_denoter(&self, denoter: &TypeDenoter, span: Span) -> Result<TypeDenoter> {
        match denoter {
            TypeDenoter::Struct {
                ident,
                struct_ref: None,
            } => match self.scope.lookup(ident).map(|id| &self.symbol(id).kind) {
                Some(SymbolKind::Struct(struct_id)) => Ok(TypeDenoter::Struct {
                    ident: ident.clone(),
                    struct_ref: Some(*struct_id),
                }),
                Some(SymbolKind::Alias(aliased)) => Ok(TypeDenoter::Alias {
                    ident: ident.clone(),
                    aliased: Box::new(aliased.clone()),
                }),
                _ => Err(CompilerError::UndefinedSymbol {
                    ident: ident.clone(),
                    span,
                }),
            },
            TypeDenoter::Buffer {
                buffer_type,
                elem: Some(elem),
            } => Ok(TypeDenoter::Buffer {
                buffer_type: *buffer_type,
                elem: Some(Box::new(self.resolve_type_denoter(elem, span)?)),
            }),
            other => Ok(other.clone()),
        }
    }

    /// Evaluates constant array dimensions; non-constant or absent
    /// dimensions stay unsized.
    fn eval_array_dims(&self, dims: &[Option<Expr>]) -> Result<Vec<Option<u64>>> {
        Ok(dims.iter().map(|d| d.as_ref().and_then(eval_const_u64)).collect())
    }

    /* ----- Phase 2: function bodies ----- */

    fn analyze_function_bodies(&mut self, program: &mut Program) -> Result<()> {
        // Mutable split: take the globals out so function bodies can be
        // visited while the analyzer state is borrowed mutably.
        let mut globals = std::mem::take(&mut program.globals);
        let mut result = Ok(());
        for stmnt in &mut globals {
            match stmnt {
                Stmnt::Function(func) if func.code_block.is_some() => {
                    if let Err(e) = self.analyze_function(func) {
                        result = Err(e);
                        break;
                    }
                }
                Stmnt::VarDecl(decl_stmnt) => {
                    if let Err(e) = self.analyze_global_initializers(decl_stmnt) {
                        result = Err(e);
                        break;
                    }
                }
                _ => {}
            }
        }
        program.globals = globals;
        result
    }

    fn analyze_global_initializers(&mut self, decl_stmnt: &mut VarDeclStmnt) -> Result<()> {
        let declared = decl_stmnt.var_type.denoter.clone();
        for var in &mut decl_stmnt.var_decls {
            for dim in var.array_dims.iter_mut().flatten() {
                self.visit_expr(dim)?;
            }
            let dims = self.eval_array_dims(&var.array_dims)?;
            let ty = declared.clone().as_array(dims);
            if let Some(init) = &mut var.initializer {
                self.visit_expr(init)?;
                self.validate_implicit_cast(init, &ty, "variable initialization")?;
            }
        }
        Ok(())
    }

    fn analyze_function(&mut self, func: &mut FunctionDecl) -> Result<()> {
        trace!("analyze_function: {}", func.ident);
        self.in_entry = !self.entry_point.is_empty() && func.ident == self.entry_point;
        if self.in_entry {
            let entry = self.classify_entry(func)?;
            self.entry = Some(entry);
        }

        self.scope.push_scope();
        self.current_return_type = Some(func.return_type.denoter.clone());

        for param in &mut func.parameters {
            let declared = param.var_type.denoter.clone();
            let is_const = param.is_const();
            let is_output = param.is_output();
            for var in &mut param.var_decls {
                let dims = self.eval_array_dims(&var.array_dims)?;
                let ty = declared.clone().as_array(dims);
                // Struct parameters flatten per direction: `out`/`inout`
                // aggregates carry stage outputs, matching the entry
                // classification.
                let role = if self.in_entry {
                    if ty.is_struct() {
                        if is_output {
                            VarRole::EntryOutputStruct
                        } else {
                            VarRole::EntryInputStruct
                        }
                    } else {
                        VarRole::EntryInput
                    }
                } else {
                    VarRole::Plain
                };
                let id = self.add_symbol(Symbol {
                    ident: var.ident.clone(),
                    span: var.span,
                    kind: SymbolKind::Var { ty, is_const, role },
                });
                var.symbol_ref = Some(id);
                self.scope.insert(var.ident.clone(), id);
            }
        }

        let mut code_block = func.code_block.take().unwrap_or_default();
        let result = self.visit_code_block(&mut code_block);
        func.code_block = Some(code_block);

        self.scope.pop_scope();
        self.current_return_type = None;
        self.in_entry = false;
        result
    }

    fn visit_code_block(&mut self, block: &mut CodeBlock) -> Result<()> {
        for stmnt in &mut block.stmnts {
            self.visit_stmnt(stmnt)?;
        }
        Ok(())
    }

    fn visit_stmnt(&mut self, stmnt: &mut Stmnt) -> Result<()> {
        match stmnt {
            Stmnt::Null(_) => Ok(()),
            Stmnt::VarDecl(decl) => self.visit_var_decl_stmnt(decl),
            Stmnt::StructDecl(decl) => self.register_struct(&mut decl.struct_decl),
            Stmnt::CodeBlock(block) => {
                self.scope.push_scope();
                let result = self.visit_code_block(&mut block.code_block);
                self.scope.pop_scope();
                result
            }
            Stmnt::For(stmnt) => {
                self.scope.push_scope();
                let result = (|| -> Result<()> {
                    self.visit_stmnt(&mut stmnt.init)?;
                    if let Some(cond) = &mut stmnt.condition {
                        self.visit_expr(cond)?;
                        self.validate_condition(cond, "for loop")?;
                    }
                    if let Some(iter) = &mut stmnt.iteration {
                        self.visit_expr(iter)?;
                    }
                    self.visit_stmnt(&mut stmnt.body)
                })();
                self.scope.pop_scope();
                result
            }
            Stmnt::While(stmnt) => {
                self.visit_expr(&mut stmnt.condition)?;
                self.validate_condition(&stmnt.condition, "while loop")?;
                self.visit_stmnt(&mut stmnt.body)
            }
            Stmnt::DoWhile(stmnt) => {
                self.visit_stmnt(&mut stmnt.body)?;
                self.visit_expr(&mut stmnt.condition)?;
                self.validate_condition(&stmnt.condition, "do-while loop")
            }
            Stmnt::If(stmnt) => {
                self.visit_expr(&mut stmnt.condition)?;
                self.validate_condition(&stmnt.condition, "if statement")?;
                self.visit_stmnt(&mut stmnt.body)?;
                if let Some(else_stmnt) = &mut stmnt.else_stmnt {
                    self.visit_stmnt(else_stmnt)?;
                }
                Ok(())
            }
            Stmnt::Switch(stmnt) => {
                self.visit_expr(&mut stmnt.selector)?;
                self.scope.push_scope();
                let result = (|| -> Result<()> {
                    for case in &mut stmnt.cases {
                        if let Some(expr) = &mut case.expr {
                            self.visit_expr(expr)?;
                        }
                        for case_stmnt in &mut case.stmnts {
                            self.visit_stmnt(case_stmnt)?;
                        }
                    }
                    Ok(())
                })();
                self.scope.pop_scope();
                result
            }
            Stmnt::Expr(stmnt) => self.visit_expr(&mut stmnt.expr),
            Stmnt::Return(stmnt) => {
                if let Some(expr) = &mut stmnt.expr {
                    self.visit_expr(expr)?;
                    if let Some(return_type) = self.current_return_type.clone() {
                        if return_type.is_void() {
                            return Err(CompilerError::TypeMismatch {
                                message: "can not return a value from a void function".to_string(),
                                span: stmnt.span,
                            });
                        }
                        self.validate_implicit_cast(expr, &return_type, "return statement")?;
                    }
                }
                Ok(())
            }
            Stmnt::CtrlTransfer(_) => Ok(()),
            Stmnt::Function(func) => Err(CompilerError::UnsupportedFeature {
                message: "local function declarations are not supported".to_string(),
                span: func.span,
            }),
            Stmnt::UniformBuffer(decl) => Err(CompilerError::UnsupportedFeature {
                message: "local buffer declarations are not supported".to_string(),
                span: decl.span,
            }),
            Stmnt::Buffer(decl) => Err(CompilerError::UnsupportedFeature {
                message: "local buffer declarations are not supported".to_string(),
                span: decl.span,
            }),
            Stmnt::Sampler(decl) => Err(CompilerError::UnsupportedFeature {
                message: "local sampler declarations are not supported".to_string(),
                span: decl.span,
            }),
            Stmnt::Alias(alias) => Err(CompilerError::UnsupportedFeature {
                message: "local typedef declarations are not supported".to_string(),
                span: alias.span,
            }),
        }
    }

    fn visit_var_decl_stmnt(&mut self, decl_stmnt: &mut VarDeclStmnt) -> Result<()> {
        let resolved = self.resolve_type_denoter(&decl_stmnt.var_type.denoter, decl_stmnt.span)?;
        decl_stmnt.var_type.denoter = resolved.clone();
        let is_const = decl_stmnt.is_const();
        let entry_output_struct = self
            .entry
            .as_ref()
            .and_then(|e| e.return_struct)
            .filter(|_| self.in_entry);

        for var in &mut decl_stmnt.var_decls {
            for dim in var.array_dims.iter_mut().flatten() {
                self.visit_expr(dim)?;
            }
            let dims = self.eval_array_dims(&var.array_dims)?;
            let ty = resolved.clone().as_array(dims);

            let role = match (entry_output_struct, ty.as_struct_ref()) {
                (Some(out_struct), Some(var_struct)) if out_struct == var_struct => {
                    var.is_entry_output_alias = true;
                    VarRole::EntryOutputStruct
                }
                _ => VarRole::Plain,
            };

            if self.scope.is_defined_in_current_scope(&var.ident) {
                return Err(CompilerError::RedefinedSymbol {
                    ident: var.ident.clone(),
                    span: var.span,
                });
            }
            let id = self.add_symbol(Symbol {
                ident: var.ident.clone(),
                span: var.span,
                kind: SymbolKind::Var {
                    ty: ty.clone(),
                    is_const,
                    role,
                },
            });
            var.symbol_ref = Some(id);
            self.scope.insert(var.ident.clone(), id);

            if let Some(init) = &mut var.initializer {
                self.visit_expr(init)?;
                self.validate_implicit_cast(init, &ty, "variable initialization")?;
            }
        }
        Ok(())
    }

    fn validate_condition(&mut self, cond: &Expr, context: &str) -> Result<()> {
        let cond_ty = self.ty_of(cond)?;
        let bool_ty = TypeDenoter::scalar(ScalarType::Bool);
        if !cond_ty.is_castable_to(&bool_ty, &self.structs) {
            return Err(CompilerError::TypeMismatch {
                message: format!(
                    "can not cast '{}' to 'bool' in condition of {}",
                    cond_ty.to_type_string(&self.structs),
                    context
                ),
                span: cond.span,
            });
        }
        Ok(())
    }

    /// Validates an implicit conversion; converts literal values in place
    /// and surfaces narrowing as a warning.
    fn validate_implicit_cast(
        &mut self,
        expr: &mut Expr,
        target: &TypeDenoter,
        context: &str,
    ) -> Result<()> {
        let from = self.ty_of(expr)?;
        if !from.is_castable_to(target, &self.structs) {
            return Err(CompilerError::TypeMismatch {
                message: format!(
                    "can not cast '{}' to '{}' in {}",
                    from.to_type_string(&self.structs),
                    target.to_type_string(&self.structs),
                    context
                ),
                span: expr.span,
            });
        }
        if from.is_narrowing_cast_to(target) {
            self.warn(
                format!(
                    "implicit truncation of '{}' to '{}'",
                    from.to_type_string(&self.structs),
                    target.to_type_string(&self.structs)
                ),
                expr.span,
            );
        }
        if let Some(data_type @ DataType::Scalar(_)) = target.as_data_type() {
            self.convert_literal(expr, data_type);
        }
        Ok(())
    }

    /// Re-types a literal expression, re-serializing its value through a
    /// `Variant` and invalidating its buffered type denoter.
    fn convert_literal(&mut self, expr: &mut Expr, target: DataType) {
        if let ExprKind::Literal(literal) = &mut expr.kind {
            if literal.data_type == target || literal.data_type == DataType::String {
                return;
            }
            let variant = Variant::parse(&literal.value);
            literal.value = match target {
                DataType::Scalar(ScalarType::Bool) => variant.to_bool().serialize(),
                DataType::Scalar(ScalarType::Int) => variant.to_int().serialize(),
                DataType::Scalar(ScalarType::UInt) => format!("{}u", variant.to_int().serialize()),
                DataType::Scalar(ScalarType::Half)
                | DataType::Scalar(ScalarType::Float)
                | DataType::Scalar(ScalarType::Double) => variant.to_real().serialize(),
                _ => return,
            };
            literal.data_type = target;
            self.reset_type_denoter(expr.id);
            self.type_table.insert(expr.id, TypeDenoter::Base(target));
        }
    }

    /* ----- Expression derivation ----- */

    fn visit_expr(&mut self, expr: &mut Expr) -> Result<()> {
        if self.type_table.contains_key(&expr.id) {
            return Ok(());
        }
        let span = expr.span;
        let ty = match &mut expr.kind {
            // Null expressions only occur as dynamic array dimensions,
            // which must be integral.
            ExprKind::Null => TypeDenoter::scalar(ScalarType::Int),
            ExprKind::List(exprs) => {
                for e in exprs.iter_mut() {
                    self.visit_expr(e)?;
                }
                let first = exprs.first().ok_or_else(|| {
                    CompilerError::Internal("empty list expression".to_string())
                })?;
                self.ty_of(first)?
            }
            ExprKind::Literal(literal) => TypeDenoter::Base(literal.data_type),
            ExprKind::TypeName(denoter) => {
                let resolved = self.resolve_type_denoter(denoter, span)?;
                *denoter = resolved.clone();
                resolved
            }
            ExprKind::Ternary {
                cond_expr,
                then_expr,
                else_expr,
            } => {
                self.visit_expr(cond_expr)?;
                self.visit_expr(then_expr)?;
                self.visit_expr(else_expr)?;
                let cond_ty = self.ty_of(cond_expr)?;
                let bool_ty = TypeDenoter::scalar(ScalarType::Bool);
                if !cond_ty.is_castable_to(&bool_ty, &self.structs) {
                    return Err(CompilerError::TypeMismatch {
                        message: format!(
                            "can not cast '{}' to 'bool' in condition of ternary expression",
                            cond_ty.to_type_string(&self.structs)
                        ),
                        span: cond_expr.span,
                    });
                }
                let then_ty = self.ty_of(then_expr)?;
                let else_ty = self.ty_of(else_expr)?;
                if !else_ty.is_castable_to(&then_ty, &self.structs) {
                    return Err(CompilerError::TypeMismatch {
                        message: format!(
                            "can not cast '{}' to '{}' in ternary expression",
                            else_ty.to_type_string(&self.structs),
                            then_ty.to_type_string(&self.structs)
                        ),
                        span,
                    });
                }
                then_ty
            }
            ExprKind::Binary {
                op,
                lhs_expr,
                rhs_expr,
            } => {
                let op = *op;
                self.visit_expr(lhs_expr)?;
                self.visit_expr(rhs_expr)?;
                let lhs_ty = self.ty_of(lhs_expr)?;
                let rhs_ty = self.ty_of(rhs_expr)?;
                if !rhs_ty.is_castable_to(&lhs_ty, &self.structs)
                    || !lhs_ty.is_castable_to(&rhs_ty, &self.structs)
                {
                    return Err(CompilerError::TypeMismatch {
                        message: format!(
                            "can not cast '{}' to '{}' in binary expression '{}'",
                            rhs_ty.to_type_string(&self.structs),
                            lhs_ty.to_type_string(&self.structs),
                            op.to_op_string()
                        ),
                        span,
                    });
                }
                if op.is_boolean() {
                    TypeDenoter::scalar(ScalarType::Bool)
                } else {
                    lhs_ty
                }
            }
            ExprKind::Unary { op, expr: inner } => {
                let op = *op;
                self.visit_expr(inner)?;
                if op.is_logical() {
                    TypeDenoter::scalar(ScalarType::Bool)
                } else {
                    self.ty_of(inner)?
                }
            }
            ExprKind::PostUnary { expr: inner, .. } => {
                self.visit_expr(inner)?;
                self.ty_of(inner)?
            }
            ExprKind::Call(call) => self.resolve_call(call, span)?,
            ExprKind::Bracket(inner) => {
                self.visit_expr(inner)?;
                self.ty_of(inner)?
            }
            ExprKind::Suffix {
                expr: inner,
                var_ident,
            } => {
                self.visit_expr(inner)?;
                let inner_ty = self.ty_of(inner)?;
                self.resolve_suffix_chain(&inner_ty, var_ident)?
            }
            ExprKind::ArrayAccess {
                expr: inner,
                array_indices,
            } => {
                self.visit_expr(inner)?;
                for index in array_indices.iter_mut() {
                    self.visit_expr(index)?;
                }
                let inner_ty = self.ty_of(inner)?;
                inner_ty
                    .get_from_array(array_indices.len(), &self.structs)
                    .map_err(|message| CompilerError::TypeMismatch { message, span })?
            }
            ExprKind::Cast {
                denoter,
                expr: inner,
            } => {
                let target = self.resolve_type_denoter(denoter, span)?;
                *denoter = target.clone();
                self.visit_expr(inner)?;
                let value_ty = self.ty_of(inner)?;
                if !value_ty.is_castable_to(&target, &self.structs) {
                    return Err(CompilerError::TypeMismatch {
                        message: format!(
                            "can not cast '{}' to '{}' in cast expression",
                            value_ty.to_type_string(&self.structs),
                            target.to_type_string(&self.structs)
                        ),
                        span,
                    });
                }
                target
            }
            ExprKind::VarAccess { var_ident, assign } => {
                let lhs_ty = self.resolve_var_ident(var_ident)?;
                if let Some((_, rhs)) = assign {
                    self.visit_expr(rhs)?;
                    if let Some(const_ident) = self.first_const_ident(var_ident) {
                        return Err(CompilerError::TypeMismatch {
                            message: format!("can not modify constant '{}'", const_ident),
                            span: var_ident.span,
                        });
                    }
                    self.validate_implicit_cast(rhs, &lhs_ty, "assignment")?;
                }
                lhs_ty
            }
            ExprKind::Initializer(exprs) => {
                if exprs.is_empty() {
                    return Err(CompilerError::TypeMismatch {
                        message: "can not derive type of initializer list with no elements"
                            .to_string(),
                        span,
                    });
                }
                for e in exprs.iter_mut() {
                    self.visit_expr(e)?;
                }
                let first_ty = self.ty_of(&exprs[0])?;
                for e in exprs.iter().skip(1) {
                    let elem_ty = self.ty_of(e)?;
                    if !elem_ty.is_castable_to(&first_ty, &self.structs) {
                        return Err(CompilerError::TypeMismatch {
                            message: format!(
                                "can not cast '{}' to '{}' in initializer list",
                                elem_ty.to_type_string(&self.structs),
                                first_ty.to_type_string(&self.structs)
                            ),
                            span: e.span,
                        });
                    }
                }
                first_ty.as_array(vec![None])
            }
        };
        self.type_table.insert(expr.id, ty);
        Ok(())
    }

    /// Resolves an identifier chain: the head against the scope stack,
    /// the tail through member and array projections.
    fn resolve_var_ident(&mut self, var_ident: &mut VarIdent) -> Result<TypeDenoter> {
        // Index expressions of every segment are ordinary expressions.
        {
            let mut segment = Some(&mut *var_ident);
            while let Some(seg) = segment {
                for index in seg.array_indices.iter_mut() {
                    self.visit_expr(index)?;
                }
                segment = seg.next.as_deref_mut();
            }
        }

        let symbol_id = self.scope.lookup(&var_ident.ident).ok_or_else(|| {
            CompilerError::UndefinedSymbol {
                ident: var_ident.ident.clone(),
                span: var_ident.span,
            }
        })?;
        var_ident.symbol_ref = Some(symbol_id);

        let head_ty = match &self.symbol(symbol_id).kind {
            SymbolKind::Var { ty, .. } => ty.clone(),
            SymbolKind::Struct(struct_id) => {
                return Err(CompilerError::TypeMismatch {
                    message: format!(
                        "can not directly access '{}'",
                        self.structs.signature_to_string(*struct_id)
                    ),
                    span: var_ident.span,
                })
            }
            SymbolKind::Alias(_) => {
                return Err(CompilerError::TypeMismatch {
                    message: format!("can not directly access type '{}'", var_ident.ident),
                    span: var_ident.span,
                })
            }
            SymbolKind::Function(_) => {
                return Err(CompilerError::TypeMismatch {
                    message: format!("can not use function '{}' as a value", var_ident.ident),
                    span: var_ident.span,
                })
            }
        };

        let mut ty = head_ty
            .get_from_array(var_ident.array_indices.len(), &self.structs)
            .map_err(|message| CompilerError::TypeMismatch {
                message,
                span: var_ident.span,
            })?;
        let mut segment = var_ident.next.as_deref();
        while let Some(seg) = segment {
            ty = ty
                .get_member(&seg.ident, &self.structs)
                .and_then(|t| t.get_from_array(seg.array_indices.len(), &self.structs))
                .map_err(|message| CompilerError::TypeMismatch {
                    message,
                    span: seg.span,
                })?;
            segment = seg.next.as_deref();
        }
        Ok(ty)
    }

    fn resolve_suffix_chain(
        &mut self,
        inner_ty: &TypeDenoter,
        var_ident: &mut VarIdent,
    ) -> Result<TypeDenoter> {
        let mut ty = inner_ty.clone();
        let mut segment = Some(&mut *var_ident);
        while let Some(seg) = segment {
            for index in seg.array_indices.iter_mut() {
                self.visit_expr(index)?;
            }
            ty = ty
                .get_member(&seg.ident, &self.structs)
                .and_then(|t| t.get_from_array(seg.array_indices.len(), &self.structs))
                .map_err(|message| CompilerError::TypeMismatch {
                    message,
                    span: seg.span,
                })?;
            segment = seg.next.as_deref_mut();
        }
        Ok(ty)
    }

    /// First chain segment whose declaration is constant, if any. Member
    /// segments are checked against their struct's member records, so a
    /// const member is found even when the head object is mutable.
    fn first_const_ident(&self, var_ident: &VarIdent) -> Option<String> {
        let symbol_id = var_ident.symbol_ref?;
        let (head_ty, head_const) = match &self.symbol(symbol_id).kind {
            SymbolKind::Var { ty, is_const, .. } => (ty.clone(), *is_const),
            _ => return None,
        };
        if head_const {
            return Some(var_ident.ident.clone());
        }
        let mut ty = head_ty
            .get_from_array(var_ident.array_indices.len(), &self.structs)
            .ok()?;
        let mut segment = var_ident.next.as_deref();
        while let Some(seg) = segment {
            let struct_id = ty.as_struct_ref()?;
            let member = self.structs.fetch_member(struct_id, &seg.ident)?;
            if member.is_const {
                return Some(seg.ident.clone());
            }
            ty = member
                .ty
                .get_from_array(seg.array_indices.len(), &self.structs)
                .ok()?;
            segment = seg.next.as_deref();
        }
        None
    }

    /* ----- Function call resolution ----- */

    fn resolve_call(&mut self, call: &mut FunctionCall, span: Span) -> Result<TypeDenoter> {
        if let Some(object) = &mut call.object {
            self.visit_expr(object)?;
        }
        for arg in &mut call.arguments {
            self.visit_expr(arg)?;
        }
        let arg_types: Vec<TypeDenoter> = call
            .arguments
            .iter()
            .map(|a| self.ty_of(a))
            .collect::<Result<_>>()?;

        // Method-style calls dispatch through the intrinsic table only.
        if let Some(object) = &call.object {
            let object_ty = self.ty_of(object)?;
            let desc = intrinsics::find(&call.ident).ok_or_else(|| {
                CompilerError::UndefinedSymbol {
                    ident: call.ident.clone(),
                    span,
                }
            })?;
            self.check_intrinsic_arity(desc, arg_types.len(), span)?;
            call.intrinsic = Some(desc.intrinsic);
            // Texture sampling yields the texture's element type.
            if desc.intrinsic == intrinsics::Intrinsic::Sample {
                if let TypeDenoter::Buffer {
                    elem: Some(elem), ..
                } = object_ty.deref_alias()
                {
                    return Ok(elem.as_ref().clone());
                }
            }
            return intrinsics::derive_type(desc, &arg_types)
                .map_err(|message| CompilerError::TypeMismatch { message, span });
        }

        // Type constructor call, e.g. `float4(...)`.
        if let Some(data_type) = DataType::from_hlsl_ident(&call.ident) {
            let target = TypeDenoter::Base(data_type);
            for (arg, arg_ty) in call.arguments.iter().zip(arg_types.iter()) {
                if arg_ty.as_data_type().is_none() {
                    return Err(CompilerError::TypeMismatch {
                        message: format!(
                            "can not cast '{}' to '{}' in type constructor",
                            arg_ty.to_type_string(&self.structs),
                            target
                        ),
                        span: arg.span,
                    });
                }
            }
            call.type_ctor = Some(target.clone());
            return Ok(target);
        }

        // Intrinsics take precedence over user functions, matching HLSL.
        if let Some(desc) = intrinsics::find(&call.ident) {
            self.check_intrinsic_arity(desc, arg_types.len(), span)?;
            call.intrinsic = Some(desc.intrinsic);
            return intrinsics::derive_type(desc, &arg_types)
                .map_err(|message| CompilerError::TypeMismatch { message, span });
        }

        self.resolve_overload(call, &arg_types, span)
    }

    fn check_intrinsic_arity(
        &self,
        desc: &intrinsics::IntrinsicDescriptor,
        got: usize,
        span: Span,
    ) -> Result<()> {
        if got < desc.min_args || got > desc.max_args {
            Err(CompilerError::IntrinsicMisuse {
                ident: desc.name.to_string(),
                min: desc.min_args,
                max: desc.max_args,
                got,
                span,
            })
        } else {
            Ok(())
        }
    }

    /// Overload resolution: exact matches score 0 per argument, implicit
    /// conversions score 1, anything else rejects the candidate. The
    /// lowest total wins; a tie is an ambiguity error.
    fn resolve_overload(
        &mut self,
        call: &mut FunctionCall,
        arg_types: &[TypeDenoter],
        span: Span,
    ) -> Result<TypeDenoter> {
        let symbol_ids = self.scope.lookup_all(&call.ident).ok_or_else(|| {
            CompilerError::UndefinedSymbol {
                ident: call.ident.clone(),
                span,
            }
        })?;
        let mut candidates: Vec<FunctionId> = Vec::new();
        for id in symbol_ids {
            if let SymbolKind::Function(function_id) = &self.symbols[id.0].kind {
                let record = &self.functions[function_id.0];
                if arg_types.len() >= record.num_min_args
                    && arg_types.len() <= record.num_max_args
                {
                    candidates.push(*function_id);
                }
            }
        }
        if candidates.is_empty() {
            return Err(CompilerError::UndefinedSymbol {
                ident: call.ident.clone(),
                span,
            });
        }

        let mut best: Vec<(FunctionId, usize)> = Vec::new();
        for function_id in candidates {
            let record = &self.functions[function_id.0];
            let mut score = 0usize;
            let mut viable = true;
            for (arg_ty, param_ty) in arg_types.iter().zip(record.param_types.iter()) {
                if arg_ty.equals(param_ty) {
                    continue;
                }
                if arg_ty.is_castable_to(param_ty, &self.structs) {
                    score += 1;
                } else {
                    viable = false;
                    break;
                }
            }
            if viable {
                best.push((function_id, score));
            }
        }

        if best.is_empty() {
            let args: Vec<String> = arg_types
                .iter()
                .map(|t| t.to_type_string(&self.structs))
                .collect();
            return Err(CompilerError::TypeMismatch {
                message: format!(
                    "no matching overload for '{}({})'",
                    call.ident,
                    args.join(", ")
                ),
                span,
            });
        }

        let min_score = best.iter().map(|(_, s)| *s).min().unwrap_or(0);
        let winners: Vec<FunctionId> = best
            .iter()
            .filter(|(_, s)| *s == min_score)
            .map(|(id, _)| *id)
            .collect();
        if winners.len() > 1 {
            let candidates: Vec<String> = winners
                .iter()
                .map(|id| self.functions[id.0].signature.clone())
                .collect();
            return Err(CompilerError::AmbiguousOverload {
                ident: call.ident.clone(),
                candidates: candidates.join("; "),
                span,
            });
        }

        let winner = winners[0];
        call.func_decl_ref = Some(winner);
        Ok(self.functions[winner.0].return_type.clone())
    }

    /* ----- Entry-point classification ----- */

    fn classify_entry(&mut self, func: &FunctionDecl) -> Result<EntryPoint> {
        let mut entry = EntryPoint {
            ident: func.ident.clone(),
            ..EntryPoint::default()
        };

        for attrib in &func.attribs {
            if attrib.ident == "numthreads" {
                if attrib.arguments.len() != 3 {
                    return Err(CompilerError::Syntax {
                        message: "numthreads attribute requires three arguments".to_string(),
                        span: attrib.span,
                    });
                }
                let mut values = [1u32; 3];
                for (i, arg) in attrib.arguments.iter().enumerate() {
                    values[i] = eval_const_u64(arg).ok_or_else(|| CompilerError::Syntax {
                        message: "numthreads arguments must be integer constants".to_string(),
                        span: arg.span,
                    })? as u32;
                }
                entry.num_threads = Some(values);
            }
        }

        let mut input_location = 0u32;
        let mut output_location = 0u32;

        for param in &func.parameters {
            let resolved = self.resolve_type_denoter(&param.var_type.denoter, param.span)?;
            let is_output = param.is_output();
            if let Some(struct_id) = resolved.as_struct_ref() {
                self.structs.get_mut(struct_id).must_resolve = true;
                let mut members = Vec::new();
                self.structs.collect_members(struct_id, &mut members);
                for member in members {
                    self.push_io_var(
                        &mut entry,
                        is_output,
                        &member.ident,
                        member.ty,
                        member.semantic,
                        &mut input_location,
                        &mut output_location,
                    );
                }
            } else {
                let var = param.var_decls.first().ok_or_else(|| {
                    CompilerError::Internal("parameter without declarator".to_string())
                })?;
                self.push_io_var(
                    &mut entry,
                    is_output,
                    &var.ident,
                    resolved,
                    var.semantic.clone(),
                    &mut input_location,
                    &mut output_location,
                );
            }
        }

        let return_type = func.return_type.denoter.clone();
        if let Some(struct_id) = return_type.as_struct_ref() {
            self.structs.get_mut(struct_id).must_resolve = true;
            entry.return_struct = Some(struct_id);
            let mut members = Vec::new();
            self.structs.collect_members(struct_id, &mut members);
            for member in members {
                self.push_io_var(
                    &mut entry,
                    true,
                    &member.ident,
                    member.ty,
                    member.semantic,
                    &mut input_location,
                    &mut output_location,
                );
            }
        } else if !return_type.is_void() {
            let semantic = func.semantic.clone().ok_or_else(|| {
                CompilerError::UnsupportedFeature {
                    message: "entry point return value requires a semantic".to_string(),
                    span: func.span,
                }
            })?;
            let ident = match &semantic {
                Semantic::Target(n) => format!("target{}", n),
                other => other.to_string().to_ascii_lowercase(),
            };
            self.push_io_var(
                &mut entry,
                true,
                &ident,
                return_type,
                Some(semantic),
                &mut input_location,
                &mut output_location,
            );
            entry.return_output = Some(entry.outputs.len() - 1);
        }

        Ok(entry)
    }

    #[allow(clippy::too_many_arguments)]
    fn push_io_var(
        &mut self,
        entry: &mut EntryPoint,
        is_output: bool,
        ident: &str,
        ty: TypeDenoter,
        semantic: Option<Semantic>,
        input_location: &mut u32,
        output_location: &mut u32,
    ) {
        let builtin_name = semantic
            .as_ref()
            .and_then(|s| builtin_for_semantic(s, self.shader_target, !is_output));
        let (glsl_name, builtin, location) = match builtin_name {
            Some(name) => (name.to_string(), true, None),
            None => {
                let counter = if is_output {
                    output_location
                } else {
                    input_location
                };
                let location = *counter;
                *counter += 1;
                let name = if is_output {
                    format!("{}{}", self.prefix, ident)
                } else {
                    ident.to_string()
                };
                (name, false, Some(location))
            }
        };
        let io_var = IoVar {
            ident: ident.to_string(),
            glsl_name,
            ty,
            semantic,
            builtin,
            location,
        };
        if is_output {
            entry.outputs.push(io_var);
        } else {
            entry.inputs.push(io_var);
        }
    }
}

/// Maps a system-value semantic to the GLSL built-in variable for the
/// given stage and direction, if one exists.
pub fn builtin_for_semantic(
    semantic: &Semantic,
    target: ShaderTarget,
    is_input: bool,
) -> Option<&'static str> {
    match (semantic, target, is_input) {
        (Semantic::Position, ShaderTarget::Fragment, true) => Some("gl_FragCoord"),
        (Semantic::Position, _, false) => Some("gl_Position"),
        (Semantic::Position, _, true) => Some("gl_Position"),
        (Semantic::Depth, ShaderTarget::Fragment, false) => Some("gl_FragDepth"),
        (Semantic::VertexId, ShaderTarget::Vertex, true) => Some("gl_VertexID"),
        (Semantic::InstanceId, ShaderTarget::Vertex, true) => Some("gl_InstanceID"),
        (Semantic::IsFrontFace, ShaderTarget::Fragment, true) => Some("gl_FrontFacing"),
        (Semantic::PrimitiveId, _, _) => Some("gl_PrimitiveID"),
        (Semantic::SampleIndex, ShaderTarget::Fragment, true) => Some("gl_SampleID"),
        (Semantic::DispatchThreadId, ShaderTarget::Compute, true) => Some("gl_GlobalInvocationID"),
        (Semantic::GroupId, ShaderTarget::Compute, true) => Some("gl_WorkGroupID"),
        (Semantic::GroupThreadId, ShaderTarget::Compute, true) => Some("gl_LocalInvocationID"),
        (Semantic::GroupIndex, ShaderTarget::Compute, true) => Some("gl_LocalInvocationIndex"),
        _ => None,
    }
}

/// Constant-evaluates an integer expression (literals and brackets only).
fn eval_const_u64(expr: &Expr) -> Option<u64> {
    match &expr.kind {
        ExprKind::Literal(literal) => match Variant::parse(&literal.value) {
            Variant::Int(n) if n >= 0 => Some(n as u64),
            _ => None,
        },
        ExprKind::Bracket(inner) => eval_const_u64(inner),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::Parser;

    fn analyze_source(source: &str, target: ShaderTarget, entry: &str) -> Result<Analysis> {
        let stream = tokenize(source).unwrap();
        let mut parser = Parser::new(stream.tokens);
        let mut program = parser.parse()?;
        Analyzer::new(target, entry, "_").analyze(&mut program)
    }

    #[test]
    fn test_undefined_symbol() {
        let result = analyze_source(
            "float4 main() : SV_Position { return missing; }",
            ShaderTarget::Vertex,
            "main",
        );
        assert!(matches!(
            result.unwrap_err(),
            CompilerError::UndefinedSymbol { ident, .. } if ident == "missing"
        ));
    }

    #[test]
    fn test_cast_error_is_type_mismatch() {
        let source = r#"
            struct Data { float x; };
            void main() {
                Data d;
                float4 v = (int3)d;
            }
        "#;
        let result = analyze_source(source, ShaderTarget::Vertex, "main");
        match result.unwrap_err() {
            CompilerError::TypeMismatch { message, .. } => {
                assert!(message.contains("cast"), "unexpected message: {}", message);
                assert!(message.contains("int3"), "unexpected message: {}", message);
            }
            other => panic!("expected type mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_binary_expr_mismatch() {
        let source = r#"
            struct Data { float x; };
            void main() {
                Data d;
                float f = 1.0 + d;
            }
        "#;
        let result = analyze_source(source, ShaderTarget::Vertex, "main");
        assert!(matches!(
            result.unwrap_err(),
            CompilerError::TypeMismatch { .. }
        ));
    }

    #[test]
    fn test_intrinsic_arity_error() {
        let result = analyze_source(
            "void main() { float x = dot(1.0); }",
            ShaderTarget::Vertex,
            "main",
        );
        match result.unwrap_err() {
            CompilerError::IntrinsicMisuse {
                ident, min, max, got, ..
            } => {
                assert_eq!(ident, "dot");
                assert_eq!((min, max, got), (2, 2, 1));
            }
            other => panic!("expected intrinsic misuse, got {:?}", other),
        }
    }

    #[test]
    fn test_overload_resolution_prefers_exact_match() {
        let source = r#"
            float pick(float x) { return x; }
            float pick(int x) { return 1.0; }
            void main() { float r = pick(1.5); }
        "#;
        let analysis = analyze_source(source, ShaderTarget::Vertex, "main").unwrap();
        // Deterministic: run twice, same result.
        let analysis2 = analyze_source(source, ShaderTarget::Vertex, "main").unwrap();
        assert_eq!(analysis.functions.len(), analysis2.functions.len());
    }

    #[test]
    fn test_ambiguous_overload() {
        // Both candidates need one implicit conversion for an int
        // argument; neither wins.
        let source = r#"
            float pick(float x) { return x; }
            float pick(uint x) { return 1.0; }
            void main() { float r = pick(true); }
        "#;
        let result = analyze_source(source, ShaderTarget::Vertex, "main");
        match result.unwrap_err() {
            CompilerError::AmbiguousOverload { ident, candidates, .. } => {
                assert_eq!(ident, "pick");
                assert!(candidates.contains("pick"));
            }
            other => panic!("expected ambiguous overload, got {:?}", other),
        }
    }

    #[test]
    fn test_forward_declaration_pairs_with_definition() {
        let source = r#"
            float helper(float x);
            float helper(float x) { return x * 2.0; }
            void main() { float r = helper(1.0); }
        "#;
        let analysis = analyze_source(source, ShaderTarget::Vertex, "main").unwrap();
        assert_eq!(
            analysis
                .functions
                .iter()
                .filter(|f| f.ident == "helper")
                .count(),
            1
        );
    }

    #[test]
    fn test_function_redefinition_rejected() {
        let source = r#"
            float helper(float x) { return x; }
            float helper(float x) { return x * 2.0; }
        "#;
        let result = analyze_source(source, ShaderTarget::Vertex, "");
        assert!(matches!(
            result.unwrap_err(),
            CompilerError::RedefinedSymbol { ident, .. } if ident == "helper"
        ));
    }

    #[test]
    fn test_entry_point_classification_simple() {
        let analysis = analyze_source(
            "float4 main(float4 pos : POSITION) : SV_Position { return pos; }",
            ShaderTarget::Vertex,
            "main",
        )
        .unwrap();
        let entry = analysis.entry.as_ref().unwrap();
        assert_eq!(entry.inputs.len(), 1);
        assert_eq!(entry.inputs[0].glsl_name, "pos");
        assert!(!entry.inputs[0].builtin);
        assert_eq!(entry.outputs.len(), 1);
        assert_eq!(entry.outputs[0].glsl_name, "gl_Position");
        assert!(entry.outputs[0].builtin);
        assert_eq!(entry.return_output, Some(0));
    }

    #[test]
    fn test_entry_point_struct_flattening_marks() {
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
        let analysis = analyze_source(source, ShaderTarget::Vertex, "main").unwrap();
        let entry = analysis.entry.as_ref().unwrap();
        assert_eq!(entry.inputs.len(), 2);
        assert_eq!(entry.inputs[0].glsl_name, "p");
        assert_eq!(entry.inputs[1].glsl_name, "uv");
        assert_eq!(entry.outputs.len(), 2);
        assert_eq!(entry.outputs[0].glsl_name, "gl_Position");
        assert_eq!(entry.outputs[1].glsl_name, "_uv");
        assert!(entry.return_struct.is_some());
        // Both structs are marked for flattening.
        let resolved: Vec<bool> = (0..2)
            .map(|i| analysis.structs.get(crate::ty::StructId(i)).must_resolve)
            .collect();
        assert_eq!(resolved, vec![true, true]);
    }

    #[test]
    fn test_type_derivation_is_memoized() {
        let source = "void main() { float x = 1.0 + 2.0; }";
        let analysis = analyze_source(source, ShaderTarget::Vertex, "main").unwrap();
        // Every derived type is stable across repeated queries.
        for (id, ty) in &analysis.type_table {
            assert!(analysis.type_of(*id).unwrap().equals(ty));
            assert!(analysis.type_of(*id).unwrap().equals(ty));
        }
    }

    #[test]
    fn test_assignment_to_constant_rejected() {
        let source = r#"
            static const float SCALE = 2.0;
            void main() { SCALE = 3.0; }
        "#;
        let result = analyze_source(source, ShaderTarget::Vertex, "main");
        match result.unwrap_err() {
            CompilerError::TypeMismatch { message, .. } => {
                assert!(message.contains("constant"));
            }
            other => panic!("expected constant modification error, got {:?}", other),
        }
    }

    #[test]
    fn test_assignment_to_constant_member_rejected() {
        // The const segment sits behind two mutable ones; the chain walk
        // has to find it through the member records.
        let source = r#"
            struct Limits { const float cap; float soft; };
            struct State { Limits limits; float t; };
            void main() {
                State s;
                s.t = 1.0;
                s.limits.soft = 2.0;
                s.limits.cap = 3.0;
            }
        "#;
        let result = analyze_source(source, ShaderTarget::Vertex, "main");
        match result.unwrap_err() {
            CompilerError::TypeMismatch { message, .. } => {
                assert!(message.contains("constant"), "unexpected message: {}", message);
                assert!(message.contains("cap"), "unexpected message: {}", message);
            }
            other => panic!("expected constant modification error, got {:?}", other),
        }
    }

    #[test]
    fn test_out_struct_parameter_role() {
        let source = r#"
            struct VSOut { float4 p : SV_Position; float2 uv : TEXCOORD0; };
            void main(float3 pos : POSITION, out VSOut o) {
                o.p = float4(pos, 1);
                o.uv = float2(0.0, 0.0);
            }
        "#;
        let analysis = analyze_source(source, ShaderTarget::Vertex, "main").unwrap();
        let entry = analysis.entry.as_ref().unwrap();
        // The out parameter's members land in the outputs.
        assert_eq!(entry.outputs.len(), 2);
        assert_eq!(entry.outputs[0].glsl_name, "gl_Position");
        assert_eq!(entry.outputs[1].glsl_name, "_uv");
        // Its symbol carries the output role so member accesses rewrite
        // to stage outputs.
        let symbol = analysis
            .symbols
            .iter()
            .find(|s| s.ident == "o")
            .expect("parameter symbol");
        assert!(matches!(
            symbol.kind,
            SymbolKind::Var {
                role: VarRole::EntryOutputStruct,
                ..
            }
        ));
    }

    #[test]
    fn test_narrowing_assignment_warns() {
        let source = r#"
            void main() {
                float4 v4 = float4(1.0, 2.0, 3.0, 4.0);
                float s = v4;
            }
        "#;
        let analysis = analyze_source(source, ShaderTarget::Vertex, "main").unwrap();
        assert!(analysis
            .warnings()
            .iter()
            .any(|w| w.message().contains("truncation")));
    }

    #[test]
    fn test_literal_conversion_round_trip() {
        // The int literal initializer of a float var is re-typed in place.
        let source = "void main() { float x = 2; }";
        let stream = tokenize(source).unwrap();
        let mut parser = Parser::new(stream.tokens);
        let mut program = parser.parse().unwrap();
        Analyzer::new(ShaderTarget::Vertex, "main", "_")
            .analyze(&mut program)
            .unwrap();
        match &program.globals[0] {
            Stmnt::Function(f) => match &f.code_block.as_ref().unwrap().stmnts[0] {
                Stmnt::VarDecl(decl) => {
                    let init = decl.var_decls[0].initializer.as_ref().unwrap();
                    match &init.kind {
                        ExprKind::Literal(literal) => {
                            assert_eq!(literal.value, "2.0");
                            assert_eq!(
                                literal.data_type,
                                DataType::Scalar(ScalarType::Float)
                            );
                        }
                        other => panic!("expected literal, got {:?}", other),
                    }
                }
                other => panic!("expected var decl, got {:?}", other),
            },
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_struct_member_chain_resolution() {
        let source = r#"
            struct Inner { float2 uv; };
            struct Outer { Inner inner; };
            void main() {
                Outer o;
                float2 uv = o.inner.uv;
                float u = o.inner.uv.x;
            }
        "#;
        assert!(analyze_source(source, ShaderTarget::Vertex, "main").is_ok());
    }

    #[test]
    fn test_member_access_on_non_struct_fails() {
        let source = "void main() { float x = 1.0; float y = x.foo; }";
        let result = analyze_source(source, ShaderTarget::Vertex, "main");
        assert!(matches!(
            result.unwrap_err(),
            CompilerError::TypeMismatch { .. }
        ));
    }

    #[test]
    fn test_missing_entry_point() {
        let result = analyze_source("void other() {}", ShaderTarget::Vertex, "main");
        assert!(matches!(
            result.unwrap_err(),
            CompilerError::UndefinedSymbol { ident, .. } if ident == "main"
        ));
    }
}
