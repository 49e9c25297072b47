//! Recursive-descent parser: token stream to untyped AST.

use crate::ast::*;
use crate::error::{CompilerError, Result};
use crate::lexer::Token;
use crate::ty::{BufferType, DataType, SamplerType, ScalarType, TypeDenoter};
use crate::version::ShaderTarget;
use log::trace;

pub struct Parser {
    tokens: Vec<(Token, Span)>,
    current: usize,
    node_counter: NodeCounter,
}

impl Parser {
    pub fn new(tokens: Vec<(Token, Span)>) -> Self {
        Parser {
            tokens,
            current: 0,
            node_counter: NodeCounter::new(),
        }
    }

    pub fn parse(&mut self) -> Result<Program> {
        let mut globals = Vec::new();
        while !self.is_at_end() {
            globals.push(self.parse_global_stmnt()?);
        }
        Ok(Program { globals })
    }

    /* ----- Token helpers ----- */

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.current).map(|(t, _)| t)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.current + offset).map(|(t, _)| t)
    }

    fn span(&self) -> Span {
        self.tokens
            .get(self.current)
            .or_else(|| self.tokens.last())
            .map(|(_, s)| *s)
            .unwrap_or_default()
    }

    fn advance(&mut self) {
        self.current += 1;
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.tokens.len()
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn accept(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> Result<()> {
        if self.check(&token) {
            self.advance();
            Ok(())
        } else {
            Err(self.err(format!("expected '{}', got {}", token, self.describe_next())))
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.peek() {
            Some(Token::Ident(s)) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            _ => Err(self.err(format!("expected identifier, got {}", self.describe_next()))),
        }
    }

    fn describe_next(&self) -> String {
        match self.peek() {
            Some(t) => format!("'{}'", t),
            None => "end of input".to_string(),
        }
    }

    fn err(&self, message: String) -> CompilerError {
        CompilerError::Syntax {
            message,
            span: self.span(),
        }
    }

    fn next_id(&mut self) -> NodeId {
        self.node_counter.next_id()
    }

    /* ----- Global declarations ----- */

    fn parse_global_stmnt(&mut self) -> Result<Stmnt> {
        trace!("parse_global_stmnt: next token = {:?}", self.peek());
        let attribs = self.parse_attribs()?;
        match self.peek() {
            Some(Token::Typedef) => self.parse_alias_decl_stmnt(),
            Some(Token::Struct) => self.parse_struct_decl_stmnt(),
            Some(Token::CBuffer) | Some(Token::TBuffer) => self.parse_uniform_buffer_decl(),
            Some(Token::Semicolon) => {
                let span = self.span();
                self.advance();
                Ok(Stmnt::Null(span))
            }
            _ => self.parse_global_decl(attribs),
        }
    }

    /// Attributes in square brackets before a declaration or statement,
    /// e.g. `[numthreads(8, 8, 1)]`.
    fn parse_attribs(&mut self) -> Result<Vec<FunctionAttribute>> {
        let mut attribs = Vec::new();
        while self.check(&Token::LBracket) && matches!(self.peek_at(1), Some(Token::Ident(_))) {
            let span = self.span();
            self.advance();
            let ident = self.expect_ident()?;
            let mut arguments = Vec::new();
            if self.accept(&Token::LParen) {
                if !self.check(&Token::RParen) {
                    loop {
                        arguments.push(self.parse_sub_expr()?);
                        if !self.accept(&Token::Comma) {
                            break;
                        }
                    }
                }
                self.expect(Token::RParen)?;
            }
            self.expect(Token::RBracket)?;
            attribs.push(FunctionAttribute {
                span,
                ident,
                arguments,
            });
        }
        Ok(attribs)
    }

    fn parse_alias_decl_stmnt(&mut self) -> Result<Stmnt> {
        let span = self.span();
        self.expect(Token::Typedef)?;
        let denoter = self.parse_type_denoter()?;
        let ident = self.expect_ident()?;
        self.expect(Token::Semicolon)?;
        Ok(Stmnt::Alias(AliasDeclStmnt {
            span,
            ident,
            denoter,
        }))
    }

    fn parse_struct_decl_stmnt(&mut self) -> Result<Stmnt> {
        let span = self.span();
        self.expect(Token::Struct)?;
        let ident = match self.peek() {
            Some(Token::Ident(s)) => {
                let s = s.clone();
                self.advance();
                s
            }
            _ => String::new(),
        };
        let base_struct = if self.accept(&Token::Colon) {
            Some(self.expect_ident()?)
        } else {
            None
        };
        self.expect(Token::LBrace)?;
        let mut members = Vec::new();
        while !self.check(&Token::RBrace) {
            members.push(self.parse_var_decl_stmnt()?);
        }
        self.expect(Token::RBrace)?;
        self.expect(Token::Semicolon)?;
        Ok(Stmnt::StructDecl(StructDeclStmnt {
            span,
            struct_decl: StructDecl {
                span,
                ident,
                base_struct,
                members,
                struct_ref: None,
            },
        }))
    }

    fn parse_uniform_buffer_decl(&mut self) -> Result<Stmnt> {
        let span = self.span();
        let buffer_type = if self.accept(&Token::CBuffer) {
            UniformBufferType::ConstantBuffer
        } else {
            self.expect(Token::TBuffer)?;
            UniformBufferType::TextureBuffer
        };
        let ident = self.expect_ident()?;
        let registers = self.parse_register_annotations()?;
        self.expect(Token::LBrace)?;
        let mut members = Vec::new();
        while !self.check(&Token::RBrace) {
            members.push(self.parse_var_decl_stmnt()?);
        }
        self.expect(Token::RBrace)?;
        // Trailing semicolon after a cbuffer is optional in HLSL.
        self.accept(&Token::Semicolon);
        Ok(Stmnt::UniformBuffer(UniformBufferDecl {
            span,
            buffer_type,
            ident,
            registers,
            members,
        }))
    }

    /// Global variable, buffer/sampler object, or function declaration.
    fn parse_global_decl(&mut self, attribs: Vec<FunctionAttribute>) -> Result<Stmnt> {
        let span = self.span();
        let (input_modifier, storage_classes, type_modifiers) = self.parse_decl_modifiers();

        // Sampler and buffer objects get their own statement kinds.
        if let Some(Token::Ident(ident)) = self.peek().cloned() {
            if let Some(sampler_type) = SamplerType::from_ident(&ident) {
                self.advance();
                return self.parse_sampler_decl_stmnt(span, sampler_type);
            }
            if let Some(buffer_type) = BufferType::from_ident(&ident) {
                self.advance();
                let elem = if self.accept(&Token::Lt) {
                    let elem = self.parse_type_denoter()?;
                    self.expect(Token::Gt)?;
                    Some(Box::new(elem))
                } else {
                    None
                };
                let denoter = TypeDenoter::Buffer { buffer_type, elem };
                return self.parse_buffer_decl_stmnt(span, denoter);
            }
        }

        let var_type = self.parse_var_type()?;
        let ident = self.expect_ident()?;

        if self.check(&Token::LParen) {
            return self.parse_function_decl(span, attribs, var_type, ident);
        }

        let stmnt = self.parse_var_decl_stmnt_tail(
            span,
            input_modifier,
            storage_classes,
            type_modifiers,
            var_type,
            ident,
        )?;
        Ok(Stmnt::VarDecl(stmnt))
    }

    fn parse_sampler_decl_stmnt(&mut self, span: Span, sampler_type: SamplerType) -> Result<Stmnt> {
        let mut sampler_decls = Vec::new();
        loop {
            let decl_span = self.span();
            let ident = self.expect_ident()?;
            let array_dims = self.parse_array_dims()?;
            let registers = self.parse_register_annotations()?;
            sampler_decls.push(SamplerDecl {
                id: self.next_id(),
                span: decl_span,
                ident,
                array_dims,
                registers,
            });
            if !self.accept(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::Semicolon)?;
        Ok(Stmnt::Sampler(SamplerDeclStmnt {
            span,
            sampler_type,
            sampler_decls,
        }))
    }

    fn parse_buffer_decl_stmnt(&mut self, span: Span, denoter: TypeDenoter) -> Result<Stmnt> {
        let mut buffer_decls = Vec::new();
        loop {
            let decl_span = self.span();
            let ident = self.expect_ident()?;
            let array_dims = self.parse_array_dims()?;
            let registers = self.parse_register_annotations()?;
            buffer_decls.push(BufferDecl {
                id: self.next_id(),
                span: decl_span,
                ident,
                array_dims,
                registers,
            });
            if !self.accept(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::Semicolon)?;
        Ok(Stmnt::Buffer(BufferDeclStmnt {
            span,
            denoter,
            buffer_decls,
        }))
    }

    fn parse_function_decl(
        &mut self,
        span: Span,
        attribs: Vec<FunctionAttribute>,
        return_type: VarType,
        ident: String,
    ) -> Result<Stmnt> {
        trace!("parse_function_decl({}): parsing parameters", ident);
        self.expect(Token::LParen)?;
        let mut parameters = Vec::new();
        if self.accept(&Token::Void) {
            // `f(void)` has no parameters.
            self.expect(Token::RParen)?;
        } else {
            if !self.check(&Token::RParen) {
                loop {
                    parameters.push(self.parse_parameter()?);
                    if !self.accept(&Token::Comma) {
                        break;
                    }
                }
            }
            self.expect(Token::RParen)?;
        }

        let semantic = if self.accept(&Token::Colon) {
            Some(Semantic::parse(&self.expect_ident()?))
        } else {
            None
        };

        let code_block = if self.accept(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_code_block()?)
        };

        Ok(Stmnt::Function(FunctionDecl {
            span,
            attribs,
            return_type,
            ident,
            parameters,
            semantic,
            code_block,
        }))
    }

    fn parse_parameter(&mut self) -> Result<VarDeclStmnt> {
        let span = self.span();
        let (input_modifier, storage_classes, type_modifiers) = self.parse_decl_modifiers();
        let var_type = self.parse_var_type()?;
        let decl_span = self.span();
        let ident = self.expect_ident()?;
        let array_dims = self.parse_array_dims()?;
        let semantic = if self.accept(&Token::Colon) {
            Some(Semantic::parse(&self.expect_ident()?))
        } else {
            None
        };
        let initializer = if self.accept(&Token::Assign) {
            Some(self.parse_sub_expr()?)
        } else {
            None
        };
        Ok(VarDeclStmnt {
            span,
            input_modifier,
            storage_classes,
            type_modifiers,
            var_type,
            var_decls: vec![VarDecl {
                id: self.next_id(),
                span: decl_span,
                ident,
                array_dims,
                semantic,
                pack_offset: None,
                initializer,
                is_entry_output_alias: false,
                symbol_ref: None,
            }],
        })
    }

    /* ----- Variable declarations ----- */

    fn parse_decl_modifiers(&mut self) -> (InputModifier, Vec<StorageClass>, Vec<TypeModifier>) {
        let mut input_modifier = InputModifier::None;
        let mut storage_classes = Vec::new();
        let mut type_modifiers = Vec::new();
        loop {
            match self.peek() {
                Some(Token::In) => input_modifier = InputModifier::In,
                Some(Token::Out) => input_modifier = InputModifier::Out,
                Some(Token::InOut) => input_modifier = InputModifier::InOut,
                Some(Token::Uniform) => storage_classes.push(StorageClass::Uniform),
                Some(Token::Static) => storage_classes.push(StorageClass::Static),
                Some(Token::Extern) => storage_classes.push(StorageClass::Extern),
                Some(Token::Volatile) => storage_classes.push(StorageClass::Volatile),
                Some(Token::Shared) => storage_classes.push(StorageClass::Shared),
                Some(Token::GroupShared) => storage_classes.push(StorageClass::GroupShared),
                Some(Token::Const) => type_modifiers.push(TypeModifier::Const),
                Some(Token::RowMajor) => type_modifiers.push(TypeModifier::RowMajor),
                Some(Token::ColumnMajor) => type_modifiers.push(TypeModifier::ColumnMajor),
                Some(Token::Precise) => type_modifiers.push(TypeModifier::Precise),
                _ => break,
            }
            self.advance();
        }
        (input_modifier, storage_classes, type_modifiers)
    }

    fn parse_var_type(&mut self) -> Result<VarType> {
        let span = self.span();
        let denoter = self.parse_type_denoter()?;
        Ok(VarType { span, denoter })
    }

    fn parse_type_denoter(&mut self) -> Result<TypeDenoter> {
        match self.peek() {
            Some(Token::Void) => {
                self.advance();
                Ok(TypeDenoter::Void)
            }
            Some(Token::Ident(ident)) => {
                let ident = ident.clone();
                self.advance();
                if let Some(data_type) = DataType::from_hlsl_ident(&ident) {
                    return Ok(TypeDenoter::Base(data_type));
                }
                if let Some(sampler_type) = SamplerType::from_ident(&ident) {
                    return Ok(TypeDenoter::Sampler(sampler_type));
                }
                if let Some(buffer_type) = BufferType::from_ident(&ident) {
                    let elem = if self.accept(&Token::Lt) {
                        let elem = self.parse_type_denoter()?;
                        self.expect(Token::Gt)?;
                        Some(Box::new(elem))
                    } else {
                        None
                    };
                    return Ok(TypeDenoter::Buffer { buffer_type, elem });
                }
                // Struct or typedef name; the analyzer resolves which.
                Ok(TypeDenoter::Struct {
                    ident,
                    struct_ref: None,
                })
            }
            _ => Err(self.err(format!("expected type, got {}", self.describe_next()))),
        }
    }

    /// Full variable declaration statement including the terminating
    /// semicolon (used for globals, locals, struct and cbuffer members).
    fn parse_var_decl_stmnt(&mut self) -> Result<VarDeclStmnt> {
        let span = self.span();
        let (input_modifier, storage_classes, type_modifiers) = self.parse_decl_modifiers();
        let var_type = self.parse_var_type()?;
        let ident = self.expect_ident()?;
        self.parse_var_decl_stmnt_tail(
            span,
            input_modifier,
            storage_classes,
            type_modifiers,
            var_type,
            ident,
        )
    }

    fn parse_var_decl_stmnt_tail(
        &mut self,
        span: Span,
        input_modifier: InputModifier,
        storage_classes: Vec<StorageClass>,
        type_modifiers: Vec<TypeModifier>,
        var_type: VarType,
        first_ident: String,
    ) -> Result<VarDeclStmnt> {
        let mut var_decls = Vec::new();
        let mut ident = first_ident;
        loop {
            let decl_span = self.span();
            let array_dims = self.parse_array_dims()?;
            let mut semantic = None;
            let mut pack_offset = None;
            if self.accept(&Token::Colon) {
                if self.check(&Token::PackOffsetKw) {
                    pack_offset = Some(self.parse_pack_offset()?);
                } else if self.check(&Token::RegisterKw) {
                    // Register bindings on plain variables are parsed and
                    // dropped; only resource objects carry them through.
                    self.parse_register()?;
                } else {
                    semantic = Some(Semantic::parse(&self.expect_ident()?));
                }
            }
            let initializer = if self.accept(&Token::Assign) {
                Some(self.parse_initializer_value()?)
            } else {
                None
            };
            var_decls.push(VarDecl {
                id: self.next_id(),
                span: decl_span,
                ident,
                array_dims,
                semantic,
                pack_offset,
                initializer,
                is_entry_output_alias: false,
                symbol_ref: None,
            });
            if !self.accept(&Token::Comma) {
                break;
            }
            ident = self.expect_ident()?;
        }
        self.expect(Token::Semicolon)?;
        Ok(VarDeclStmnt {
            span,
            input_modifier,
            storage_classes,
            type_modifiers,
            var_type,
            var_decls,
        })
    }

    /// Array dimensions on a declarator; an empty pair is an unsized dim.
    fn parse_array_dims(&mut self) -> Result<Vec<Option<Expr>>> {
        let mut dims = Vec::new();
        while self.accept(&Token::LBracket) {
            if self.accept(&Token::RBracket) {
                dims.push(None);
            } else {
                dims.push(Some(self.parse_expr()?));
                self.expect(Token::RBracket)?;
            }
        }
        Ok(dims)
    }

    fn parse_initializer_value(&mut self) -> Result<Expr> {
        if self.check(&Token::LBrace) {
            self.parse_initializer_list()
        } else {
            self.parse_sub_expr()
        }
    }

    fn parse_initializer_list(&mut self) -> Result<Expr> {
        let span = self.span();
        self.expect(Token::LBrace)?;
        let mut exprs = Vec::new();
        if !self.check(&Token::RBrace) {
            loop {
                exprs.push(self.parse_initializer_value()?);
                if !self.accept(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::RBrace)?;
        Ok(Expr {
            id: self.next_id(),
            span,
            kind: ExprKind::Initializer(exprs),
        })
    }

    fn parse_register_annotations(&mut self) -> Result<Vec<Register>> {
        let mut registers = Vec::new();
        while self.check(&Token::Colon) && self.peek_at(1) == Some(&Token::RegisterKw) {
            self.advance();
            registers.push(self.parse_register()?);
        }
        Ok(registers)
    }

    fn parse_register(&mut self) -> Result<Register> {
        let span = self.span();
        self.expect(Token::RegisterKw)?;
        self.expect(Token::LParen)?;
        let mut shader_target = ShaderTarget::Undefined;
        let mut name = self.expect_ident()?;
        if self.accept(&Token::Comma) {
            shader_target = match name.as_str() {
                "vs" => ShaderTarget::Vertex,
                "hs" => ShaderTarget::TessControl,
                "ds" => ShaderTarget::TessEval,
                "gs" => ShaderTarget::Geometry,
                "ps" => ShaderTarget::Fragment,
                "cs" => ShaderTarget::Compute,
                other => {
                    return Err(self.err(format!("invalid shader profile \"{}\" in register", other)))
                }
            };
            name = self.expect_ident()?;
        }
        self.expect(Token::RParen)?;

        let mut chars = name.chars();
        let prefix = chars.next().unwrap_or('?');
        let register_type = RegisterType::from_prefix(prefix)
            .ok_or_else(|| self.err(format!("invalid register \"{}\"", name)))?;
        let slot: u32 = chars
            .as_str()
            .parse()
            .map_err(|_| self.err(format!("invalid register slot in \"{}\"", name)))?;

        Ok(Register {
            span,
            shader_target,
            register_type,
            slot,
        })
    }

    fn parse_pack_offset(&mut self) -> Result<PackOffset> {
        let span = self.span();
        self.expect(Token::PackOffsetKw)?;
        self.expect(Token::LParen)?;
        let register_name = self.expect_ident()?;
        let vector_component = if self.accept(&Token::Dot) {
            self.expect_ident()?.chars().next()
        } else {
            None
        };
        self.expect(Token::RParen)?;
        Ok(PackOffset {
            span,
            register_name,
            vector_component,
        })
    }

    /* ----- Statements ----- */

    fn parse_code_block(&mut self) -> Result<CodeBlock> {
        self.expect(Token::LBrace)?;
        let mut stmnts = Vec::new();
        while !self.check(&Token::RBrace) {
            if self.is_at_end() {
                return Err(self.err("unexpected end of input in code block".to_string()));
            }
            stmnts.push(self.parse_stmnt()?);
        }
        self.expect(Token::RBrace)?;
        Ok(CodeBlock { stmnts })
    }

    fn parse_stmnt(&mut self) -> Result<Stmnt> {
        trace!("parse_stmnt: next token = {:?}", self.peek());
        // Loop attributes like [unroll] are parsed and dropped.
        let _ = self.parse_attribs()?;
        let span = self.span();
        match self.peek() {
            Some(Token::Semicolon) => {
                self.advance();
                Ok(Stmnt::Null(span))
            }
            Some(Token::LBrace) => Ok(Stmnt::CodeBlock(CodeBlockStmnt {
                span,
                code_block: self.parse_code_block()?,
            })),
            Some(Token::If) => self.parse_if_stmnt(),
            Some(Token::For) => self.parse_for_stmnt(),
            Some(Token::While) => self.parse_while_stmnt(),
            Some(Token::Do) => self.parse_do_while_stmnt(),
            Some(Token::Switch) => self.parse_switch_stmnt(),
            Some(Token::Return) => {
                self.advance();
                let expr = if self.check(&Token::Semicolon) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(Token::Semicolon)?;
                Ok(Stmnt::Return(ReturnStmnt { span, expr }))
            }
            Some(Token::Break) => {
                self.advance();
                self.expect(Token::Semicolon)?;
                Ok(Stmnt::CtrlTransfer(CtrlTransferStmnt {
                    span,
                    transfer: CtrlTransfer::Break,
                }))
            }
            Some(Token::Continue) => {
                self.advance();
                self.expect(Token::Semicolon)?;
                Ok(Stmnt::CtrlTransfer(CtrlTransferStmnt {
                    span,
                    transfer: CtrlTransfer::Continue,
                }))
            }
            Some(Token::Discard) => {
                self.advance();
                self.expect(Token::Semicolon)?;
                Ok(Stmnt::CtrlTransfer(CtrlTransferStmnt {
                    span,
                    transfer: CtrlTransfer::Discard,
                }))
            }
            Some(Token::Struct) => self.parse_struct_decl_stmnt(),
            _ if self.is_start_of_var_decl() => Ok(Stmnt::VarDecl(self.parse_var_decl_stmnt()?)),
            _ => {
                let expr = self.parse_expr()?;
                self.expect(Token::Semicolon)?;
                Ok(Stmnt::Expr(ExprStmnt { span, expr }))
            }
        }
    }

    /// Declaration-vs-expression disambiguation: a leading modifier or a
    /// type-like identifier followed by an identifier starts a declaration.
    fn is_start_of_var_decl(&self) -> bool {
        match self.peek() {
            Some(
                Token::In
                | Token::Out
                | Token::InOut
                | Token::Uniform
                | Token::Const
                | Token::Static
                | Token::Extern
                | Token::Volatile
                | Token::Shared
                | Token::GroupShared
                | Token::RowMajor
                | Token::ColumnMajor
                | Token::Precise,
            ) => true,
            Some(Token::Ident(_)) => matches!(self.peek_at(1), Some(Token::Ident(_))),
            _ => false,
        }
    }

    fn parse_if_stmnt(&mut self) -> Result<Stmnt> {
        let span = self.span();
        self.expect(Token::If)?;
        self.expect(Token::LParen)?;
        let condition = self.parse_expr()?;
        self.expect(Token::RParen)?;
        let body = Box::new(self.parse_stmnt()?);
        let else_stmnt = if self.accept(&Token::Else) {
            Some(Box::new(self.parse_stmnt()?))
        } else {
            None
        };
        Ok(Stmnt::If(IfStmnt {
            span,
            condition,
            body,
            else_stmnt,
        }))
    }

    fn parse_for_stmnt(&mut self) -> Result<Stmnt> {
        let span = self.span();
        self.expect(Token::For)?;
        self.expect(Token::LParen)?;
        let init = if self.check(&Token::Semicolon) {
            let init_span = self.span();
            self.advance();
            Box::new(Stmnt::Null(init_span))
        } else if self.is_start_of_var_decl() {
            Box::new(Stmnt::VarDecl(self.parse_var_decl_stmnt()?))
        } else {
            let init_span = self.span();
            let expr = self.parse_expr()?;
            self.expect(Token::Semicolon)?;
            Box::new(Stmnt::Expr(ExprStmnt {
                span: init_span,
                expr,
            }))
        };
        let condition = if self.check(&Token::Semicolon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(Token::Semicolon)?;
        let iteration = if self.check(&Token::RParen) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(Token::RParen)?;
        let body = Box::new(self.parse_stmnt()?);
        Ok(Stmnt::For(ForLoopStmnt {
            span,
            init,
            condition,
            iteration,
            body,
        }))
    }

    fn parse_while_stmnt(&mut self) -> Result<Stmnt> {
        let span = self.span();
        self.expect(Token::While)?;
        self.expect(Token::LParen)?;
        let condition = self.parse_expr()?;
        self.expect(Token::RParen)?;
        let body = Box::new(self.parse_stmnt()?);
        Ok(Stmnt::While(WhileLoopStmnt {
            span,
            condition,
            body,
        }))
    }

    fn parse_do_while_stmnt(&mut self) -> Result<Stmnt> {
        let span = self.span();
        self.expect(Token::Do)?;
        let body = Box::new(self.parse_stmnt()?);
        self.expect(Token::While)?;
        self.expect(Token::LParen)?;
        let condition = self.parse_expr()?;
        self.expect(Token::RParen)?;
        self.expect(Token::Semicolon)?;
        Ok(Stmnt::DoWhile(DoWhileLoopStmnt {
            span,
            body,
            condition,
        }))
    }

    fn parse_switch_stmnt(&mut self) -> Result<Stmnt> {
        let span = self.span();
        self.expect(Token::Switch)?;
        self.expect(Token::LParen)?;
        let selector = self.parse_expr()?;
        self.expect(Token::RParen)?;
        self.expect(Token::LBrace)?;
        let mut cases = Vec::new();
        while !self.check(&Token::RBrace) {
            let case_span = self.span();
            let expr = if self.accept(&Token::Case) {
                let e = self.parse_expr()?;
                self.expect(Token::Colon)?;
                Some(e)
            } else {
                self.expect(Token::Default)?;
                self.expect(Token::Colon)?;
                None
            };
            let mut stmnts = Vec::new();
            while !self.check(&Token::Case)
                && !self.check(&Token::Default)
                && !self.check(&Token::RBrace)
            {
                stmnts.push(self.parse_stmnt()?);
            }
            cases.push(SwitchCase {
                span: case_span,
                expr,
                stmnts,
            });
        }
        self.expect(Token::RBrace)?;
        Ok(Stmnt::Switch(SwitchStmnt {
            span,
            selector,
            cases,
        }))
    }

    /* ----- Expressions ----- */

    /// Full expression including the comma operator.
    pub fn parse_expr(&mut self) -> Result<Expr> {
        let span = self.span();
        let first = self.parse_sub_expr()?;
        if !self.check(&Token::Comma) {
            return Ok(first);
        }
        let mut exprs = vec![first];
        while self.accept(&Token::Comma) {
            exprs.push(self.parse_sub_expr()?);
        }
        Ok(Expr {
            id: self.next_id(),
            span,
            kind: ExprKind::List(exprs),
        })
    }

    /// Assignment-level expression (no comma operator).
    fn parse_sub_expr(&mut self) -> Result<Expr> {
        let lhs = self.parse_ternary_expr()?;
        let assign_op = match self.peek() {
            Some(Token::Assign) => Some(AssignOp::Set),
            Some(Token::AddAssign) => Some(AssignOp::Add),
            Some(Token::SubAssign) => Some(AssignOp::Sub),
            Some(Token::MulAssign) => Some(AssignOp::Mul),
            Some(Token::DivAssign) => Some(AssignOp::Div),
            Some(Token::ModAssign) => Some(AssignOp::Mod),
            _ => None,
        };
        if let Some(op) = assign_op {
            self.advance();
            let rhs = self.parse_sub_expr()?;
            match lhs.kind {
                ExprKind::VarAccess {
                    var_ident,
                    assign: None,
                } => Ok(Expr {
                    id: lhs.id,
                    span: lhs.span,
                    kind: ExprKind::VarAccess {
                        var_ident,
                        assign: Some((op, Box::new(rhs))),
                    },
                }),
                _ => Err(CompilerError::Syntax {
                    message: "invalid left-hand-side of assignment".to_string(),
                    span: lhs.span,
                }),
            }
        } else {
            Ok(lhs)
        }
    }

    fn parse_ternary_expr(&mut self) -> Result<Expr> {
        let cond = self.parse_binary_expr(0)?;
        if self.accept(&Token::Question) {
            let then_expr = self.parse_sub_expr()?;
            self.expect(Token::Colon)?;
            let else_expr = self.parse_sub_expr()?;
            Ok(Expr {
                id: self.next_id(),
                span: cond.span,
                kind: ExprKind::Ternary {
                    cond_expr: Box::new(cond),
                    then_expr: Box::new(then_expr),
                    else_expr: Box::new(else_expr),
                },
            })
        } else {
            Ok(cond)
        }
    }

    fn binary_op_at_level(&self, level: usize) -> Option<BinaryOp> {
        let token = self.peek()?;
        let op = match (level, token) {
            (0, Token::OrOr) => BinaryOp::LogicalOr,
            (1, Token::AndAnd) => BinaryOp::LogicalAnd,
            (2, Token::Pipe) => BinaryOp::BitOr,
            (3, Token::Caret) => BinaryOp::BitXor,
            (4, Token::Amp) => BinaryOp::BitAnd,
            (5, Token::Eq) => BinaryOp::Equal,
            (5, Token::Ne) => BinaryOp::NotEqual,
            (6, Token::Lt) => BinaryOp::Less,
            (6, Token::Le) => BinaryOp::LessEqual,
            (6, Token::Gt) => BinaryOp::Greater,
            (6, Token::Ge) => BinaryOp::GreaterEqual,
            (7, Token::Shl) => BinaryOp::ShiftLeft,
            (7, Token::Shr) => BinaryOp::ShiftRight,
            (8, Token::Plus) => BinaryOp::Add,
            (8, Token::Minus) => BinaryOp::Sub,
            (9, Token::Star) => BinaryOp::Mul,
            (9, Token::Slash) => BinaryOp::Div,
            (9, Token::Percent) => BinaryOp::Mod,
            _ => return None,
        };
        Some(op)
    }

    fn parse_binary_expr(&mut self, level: usize) -> Result<Expr> {
        if level > 9 {
            return self.parse_unary_expr();
        }
        let mut lhs = self.parse_binary_expr(level + 1)?;
        while let Some(op) = self.binary_op_at_level(level) {
            self.advance();
            let rhs = self.parse_binary_expr(level + 1)?;
            lhs = Expr {
                id: self.next_id(),
                span: lhs.span,
                kind: ExprKind::Binary {
                    op,
                    lhs_expr: Box::new(lhs),
                    rhs_expr: Box::new(rhs),
                },
            };
        }
        Ok(lhs)
    }

    fn parse_unary_expr(&mut self) -> Result<Expr> {
        let span = self.span();
        let op = match self.peek() {
            Some(Token::Not) => Some(UnaryOp::LogicalNot),
            Some(Token::Tilde) => Some(UnaryOp::BitNot),
            Some(Token::Minus) => Some(UnaryOp::Negate),
            Some(Token::Plus) => Some(UnaryOp::Plus),
            Some(Token::Inc) => Some(UnaryOp::Inc),
            Some(Token::Dec) => Some(UnaryOp::Dec),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let expr = self.parse_unary_expr()?;
            return Ok(Expr {
                id: self.next_id(),
                span,
                kind: ExprKind::Unary {
                    op,
                    expr: Box::new(expr),
                },
            });
        }
        // C-style cast: `(type) unary-expression` for built-in type names.
        if self.check(&Token::LParen) {
            if let Some(Token::Ident(ident)) = self.peek_at(1) {
                if let Some(data_type) = DataType::from_hlsl_ident(ident) {
                    if self.peek_at(2) == Some(&Token::RParen) {
                        self.advance();
                        self.advance();
                        self.advance();
                        let expr = self.parse_unary_expr()?;
                        return Ok(Expr {
                            id: self.next_id(),
                            span,
                            kind: ExprKind::Cast {
                                denoter: TypeDenoter::Base(data_type),
                                expr: Box::new(expr),
                            },
                        });
                    }
                }
            }
        }
        self.parse_postfix_expr()
    }

    fn parse_postfix_expr(&mut self) -> Result<Expr> {
        let mut expr = self.parse_primary_expr()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    // Method call or member suffix.
                    if let (Some(Token::Ident(_)), Some(Token::LParen)) =
                        (self.peek_at(1), self.peek_at(2))
                    {
                        let span = self.span();
                        self.advance();
                        let ident = self.expect_ident()?;
                        let arguments = self.parse_call_arguments()?;
                        expr = Expr {
                            id: self.next_id(),
                            span,
                            kind: ExprKind::Call(FunctionCall {
                                span,
                                ident,
                                object: Some(Box::new(expr)),
                                arguments,
                                func_decl_ref: None,
                                intrinsic: None,
                                type_ctor: None,
                            }),
                        };
                    } else {
                        let span = self.span();
                        self.advance();
                        let var_ident = self.parse_var_ident()?;
                        expr = Expr {
                            id: self.next_id(),
                            span,
                            kind: ExprKind::Suffix {
                                expr: Box::new(expr),
                                var_ident,
                            },
                        };
                    }
                }
                Some(Token::LBracket) => {
                    let span = expr.span;
                    let mut array_indices = Vec::new();
                    while self.accept(&Token::LBracket) {
                        array_indices.push(self.parse_expr()?);
                        self.expect(Token::RBracket)?;
                    }
                    expr = Expr {
                        id: self.next_id(),
                        span,
                        kind: ExprKind::ArrayAccess {
                            expr: Box::new(expr),
                            array_indices,
                        },
                    };
                }
                Some(Token::Inc) => {
                    self.advance();
                    expr = Expr {
                        id: self.next_id(),
                        span: expr.span,
                        kind: ExprKind::PostUnary {
                            op: UnaryOp::Inc,
                            expr: Box::new(expr),
                        },
                    };
                }
                Some(Token::Dec) => {
                    self.advance();
                    expr = Expr {
                        id: self.next_id(),
                        span: expr.span,
                        kind: ExprKind::PostUnary {
                            op: UnaryOp::Dec,
                            expr: Box::new(expr),
                        },
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_call_arguments(&mut self) -> Result<Vec<Expr>> {
        self.expect(Token::LParen)?;
        let mut arguments = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                arguments.push(self.parse_sub_expr()?);
                if !self.accept(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(Token::RParen)?;
        Ok(arguments)
    }

    fn parse_primary_expr(&mut self) -> Result<Expr> {
        let span = self.span();
        match self.peek().cloned() {
            Some(Token::IntLiteral(value)) => {
                self.advance();
                Ok(self.literal(span, DataType::Scalar(ScalarType::Int), value))
            }
            Some(Token::UIntLiteral(value)) => {
                self.advance();
                Ok(self.literal(span, DataType::Scalar(ScalarType::UInt), value))
            }
            Some(Token::FloatLiteral(value, scalar)) => {
                self.advance();
                Ok(self.literal(span, DataType::Scalar(scalar), value))
            }
            Some(Token::StringLiteral(value)) => {
                self.advance();
                Ok(self.literal(span, DataType::String, value))
            }
            Some(Token::True) => {
                self.advance();
                Ok(self.literal(span, DataType::Scalar(ScalarType::Bool), "true".to_string()))
            }
            Some(Token::False) => {
                self.advance();
                Ok(self.literal(
                    span,
                    DataType::Scalar(ScalarType::Bool),
                    "false".to_string(),
                ))
            }
            Some(Token::LParen) => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(Token::RParen)?;
                Ok(Expr {
                    id: self.next_id(),
                    span,
                    kind: ExprKind::Bracket(Box::new(inner)),
                })
            }
            Some(Token::LBrace) => self.parse_initializer_list(),
            Some(Token::Ident(ident)) => {
                if self.peek_at(1) == Some(&Token::LParen) {
                    self.advance();
                    let arguments = self.parse_call_arguments()?;
                    Ok(Expr {
                        id: self.next_id(),
                        span,
                        kind: ExprKind::Call(FunctionCall {
                            span,
                            ident,
                            object: None,
                            arguments,
                            func_decl_ref: None,
                            intrinsic: None,
                            type_ctor: None,
                        }),
                    })
                } else {
                    let var_ident = self.parse_var_ident()?;
                    Ok(Expr {
                        id: self.next_id(),
                        span,
                        kind: ExprKind::VarAccess {
                            var_ident,
                            assign: None,
                        },
                    })
                }
            }
            _ => Err(self.err(format!("expected expression, got {}", self.describe_next()))),
        }
    }

    fn literal(&mut self, span: Span, data_type: DataType, value: String) -> Expr {
        Expr {
            id: self.next_id(),
            span,
            kind: ExprKind::Literal(LiteralExpr { data_type, value }),
        }
    }

    /// Identifier chain `a[0].b.c[i]`, stopping before a segment that
    /// turns out to be a method call.
    fn parse_var_ident(&mut self) -> Result<VarIdent> {
        let span = self.span();
        let ident = self.expect_ident()?;
        let mut array_indices = Vec::new();
        while self.check(&Token::LBracket) {
            self.advance();
            array_indices.push(self.parse_expr()?);
            self.expect(Token::RBracket)?;
        }
        let next = if self.check(&Token::Dot)
            && matches!(self.peek_at(1), Some(Token::Ident(_)))
            && self.peek_at(2) != Some(&Token::LParen)
        {
            self.advance();
            Some(Box::new(self.parse_var_ident()?))
        } else {
            None
        };
        Ok(VarIdent {
            id: self.next_id(),
            span,
            ident,
            array_indices,
            next,
            symbol_ref: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse_source(source: &str) -> Result<Program> {
        let stream = tokenize(source).unwrap();
        let mut parser = Parser::new(stream.tokens);
        parser.parse()
    }

    #[test]
    fn test_parse_simple_function() {
        let program =
            parse_source("float4 main(float4 pos : POSITION) : SV_Position { return pos; }")
                .unwrap();
        assert_eq!(program.globals.len(), 1);
        match &program.globals[0] {
            Stmnt::Function(f) => {
                assert_eq!(f.ident, "main");
                assert_eq!(f.parameters.len(), 1);
                assert_eq!(f.semantic, Some(Semantic::Position));
                assert_eq!(
                    f.parameters[0].var_decls[0].semantic,
                    Some(Semantic::UserDefined("POSITION".to_string()))
                );
                assert!(!f.is_forward_decl());
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_struct_decl() {
        let program = parse_source(
            "struct VSIn { float3 p : POSITION; float2 uv : TEXCOORD0; };",
        )
        .unwrap();
        match &program.globals[0] {
            Stmnt::StructDecl(s) => {
                assert_eq!(s.struct_decl.ident, "VSIn");
                assert_eq!(s.struct_decl.members.len(), 2);
                assert!(s.struct_decl.base_struct.is_none());
            }
            other => panic!("expected struct, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_struct_inheritance() {
        let program = parse_source("struct B : A { float x; };").unwrap();
        match &program.globals[0] {
            Stmnt::StructDecl(s) => {
                assert_eq!(s.struct_decl.base_struct.as_deref(), Some("A"));
            }
            other => panic!("expected struct, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_cbuffer_with_register() {
        let program = parse_source(
            "cbuffer Scene : register(b0) { float4x4 wvp; float4 tint; };",
        )
        .unwrap();
        match &program.globals[0] {
            Stmnt::UniformBuffer(b) => {
                assert_eq!(b.ident, "Scene");
                assert_eq!(b.members.len(), 2);
                assert_eq!(b.registers.len(), 1);
                assert_eq!(b.registers[0].slot, 0);
                assert_eq!(b.registers[0].register_type, RegisterType::ConstantBuffer);
            }
            other => panic!("expected cbuffer, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_texture_and_sampler() {
        let program = parse_source(
            "Texture2D colorMap : register(t0);\nSamplerState linearSampler : register(s0);",
        )
        .unwrap();
        assert!(matches!(program.globals[0], Stmnt::Buffer(_)));
        assert!(matches!(program.globals[1], Stmnt::Sampler(_)));
    }

    #[test]
    fn test_parse_cast_expr() {
        let program = parse_source("void f() { float4 v = (int3)x; }").unwrap();
        match &program.globals[0] {
            Stmnt::Function(f) => {
                let block = f.code_block.as_ref().unwrap();
                match &block.stmnts[0] {
                    Stmnt::VarDecl(decl) => {
                        let init = decl.var_decls[0].initializer.as_ref().unwrap();
                        assert!(matches!(init.kind, ExprKind::Cast { .. }));
                    }
                    other => panic!("expected var decl, got {:?}", other),
                }
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_var_ident_chain() {
        let program = parse_source("void f() { x = i.p.xyz; }").unwrap();
        match &program.globals[0] {
            Stmnt::Function(f) => {
                let block = f.code_block.as_ref().unwrap();
                match &block.stmnts[0] {
                    Stmnt::Expr(e) => match &e.expr.kind {
                        ExprKind::VarAccess { assign, .. } => {
                            let (_, rhs) = assign.as_ref().unwrap();
                            match &rhs.kind {
                                ExprKind::VarAccess { var_ident, .. } => {
                                    assert_eq!(var_ident.to_chain_string(), "i.p.xyz");
                                }
                                other => panic!("expected var access, got {:?}", other),
                            }
                        }
                        other => panic!("expected assignment, got {:?}", other),
                    },
                    other => panic!("expected expr stmnt, got {:?}", other),
                }
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_method_call() {
        let program = parse_source("void f() { float4 c = colorMap.Sample(s, uv); }").unwrap();
        match &program.globals[0] {
            Stmnt::Function(f) => {
                let block = f.code_block.as_ref().unwrap();
                match &block.stmnts[0] {
                    Stmnt::VarDecl(decl) => {
                        let init = decl.var_decls[0].initializer.as_ref().unwrap();
                        match &init.kind {
                            ExprKind::Call(call) => {
                                assert_eq!(call.ident, "Sample");
                                assert!(call.object.is_some());
                                assert_eq!(call.arguments.len(), 2);
                            }
                            other => panic!("expected call, got {:?}", other),
                        }
                    }
                    other => panic!("expected var decl, got {:?}", other),
                }
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_control_flow() {
        let source = r#"
            void f() {
                for (int i = 0; i < 4; i++) {
                    if (i == 2) continue;
                    else break;
                }
                while (true) discard;
                do { x = 1; } while (false);
                switch (n) {
                    case 0: break;
                    default: break;
                }
            }
        "#;
        let program = parse_source(source).unwrap();
        match &program.globals[0] {
            Stmnt::Function(f) => {
                let block = f.code_block.as_ref().unwrap();
                assert!(matches!(block.stmnts[0], Stmnt::For(_)));
                assert!(matches!(block.stmnts[1], Stmnt::While(_)));
                assert!(matches!(block.stmnts[2], Stmnt::DoWhile(_)));
                assert!(matches!(block.stmnts[3], Stmnt::Switch(_)));
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_forward_decl() {
        let program = parse_source("float helper(float x);\nfloat helper(float x) { return x; }")
            .unwrap();
        match (&program.globals[0], &program.globals[1]) {
            (Stmnt::Function(fwd), Stmnt::Function(def)) => {
                assert!(fwd.is_forward_decl());
                assert!(!def.is_forward_decl());
            }
            other => panic!("expected two functions, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_numthreads_attribute() {
        let program =
            parse_source("[numthreads(8, 8, 1)] void cs_main(uint3 id : SV_DispatchThreadID) {}")
                .unwrap();
        match &program.globals[0] {
            Stmnt::Function(f) => {
                assert_eq!(f.attribs.len(), 1);
                assert_eq!(f.attribs[0].ident, "numthreads");
                assert_eq!(f.attribs[0].arguments.len(), 3);
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_ternary_and_precedence() {
        let program = parse_source("void f() { x = a + b * c > d ? 1 : 0; }").unwrap();
        match &program.globals[0] {
            Stmnt::Function(f) => {
                let block = f.code_block.as_ref().unwrap();
                match &block.stmnts[0] {
                    Stmnt::Expr(e) => match &e.expr.kind {
                        ExprKind::VarAccess { assign, .. } => {
                            let (_, rhs) = assign.as_ref().unwrap();
                            assert!(matches!(rhs.kind, ExprKind::Ternary { .. }));
                        }
                        other => panic!("expected assignment, got {:?}", other),
                    },
                    other => panic!("expected expr stmnt, got {:?}", other),
                }
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_initializer_list() {
        let program = parse_source("void f() { float v[2] = { 1.0, 2.0 }; }").unwrap();
        match &program.globals[0] {
            Stmnt::Function(f) => {
                let block = f.code_block.as_ref().unwrap();
                match &block.stmnts[0] {
                    Stmnt::VarDecl(decl) => {
                        let var = &decl.var_decls[0];
                        assert_eq!(var.array_dims.len(), 1);
                        let init = var.initializer.as_ref().unwrap();
                        assert_eq!(init.num_initializer_elements(), 2);
                    }
                    other => panic!("expected var decl, got {:?}", other),
                }
            }
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_reports_span() {
        let err = parse_source("struct {").unwrap_err();
        match err {
            CompilerError::Syntax { .. } => {}
            other => panic!("expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_typedef() {
        let program = parse_source("typedef float4 color_t;").unwrap();
        match &program.globals[0] {
            Stmnt::Alias(a) => {
                assert_eq!(a.ident, "color_t");
            }
            other => panic!("expected typedef, got {:?}", other),
        }
    }
}
