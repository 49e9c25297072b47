//! Diagnostic utilities for AST formatting and display.
//!
//! Provides a compact formatter for AST nodes used by the dump-AST
//! option; the output is close to HLSL syntax with one node per line.

use crate::ast::*;
use std::fmt::Write;

/// Formatter for AST nodes that produces readable, indented output.
pub struct AstFormatter {
    output: String,
    indent: usize,
}

impl AstFormatter {
    pub fn new() -> Self {
        AstFormatter {
            output: String::new(),
            indent: 0,
        }
    }

    /// Format a whole program and return the formatted string.
    pub fn format_program(program: &Program) -> String {
        let mut formatter = AstFormatter::new();
        for stmnt in &program.globals {
            formatter.write_stmnt(stmnt);
        }
        formatter.output
    }

    /// Format a single expression and return the formatted string.
    pub fn format_expression(expr: &Expr) -> String {
        let formatter = AstFormatter::new();
        formatter.format_expr(expr)
    }

    fn write_line(&mut self, content: &str) {
        let indent = "  ".repeat(self.indent);
        let _ = writeln!(self.output, "{}{}", indent, content);
    }

    fn write_stmnt(&mut self, stmnt: &Stmnt) {
        match stmnt {
            Stmnt::Null(_) => self.write_line(";"),
            Stmnt::VarDecl(decl) => self.write_var_decl_stmnt(decl),
            Stmnt::StructDecl(decl) => self.write_struct_decl(&decl.struct_decl),
            Stmnt::Function(func) => self.write_function_decl(func),
            Stmnt::UniformBuffer(buffer) => {
                self.write_line(&buffer.to_decl_string());
                self.indent += 1;
                for member in &buffer.members {
                    self.write_var_decl_stmnt(member);
                }
                self.indent -= 1;
            }
            Stmnt::Buffer(buffer) => {
                for decl in &buffer.buffer_decls {
                    self.write_line(&format!("{} {}", buffer.denoter, decl.ident));
                }
            }
            Stmnt::Sampler(sampler) => {
                for decl in &sampler.sampler_decls {
                    self.write_line(&format!(
                        "{} {}",
                        sampler.sampler_type.hlsl_name(),
                        decl.ident
                    ));
                }
            }
            Stmnt::Alias(alias) => {
                self.write_line(&format!("typedef {} {}", alias.denoter, alias.ident));
            }
            Stmnt::CodeBlock(block) => {
                self.write_line("{");
                self.indent += 1;
                for inner in &block.code_block.stmnts {
                    self.write_stmnt(inner);
                }
                self.indent -= 1;
                self.write_line("}");
            }
            Stmnt::For(stmnt) => {
                self.write_line("for");
                self.indent += 1;
                self.write_stmnt(&stmnt.init);
                if let Some(cond) = &stmnt.condition {
                    self.write_line(&format!("cond: {}", self.format_expr(cond)));
                }
                if let Some(iter) = &stmnt.iteration {
                    self.write_line(&format!("iter: {}", self.format_expr(iter)));
                }
                self.write_stmnt(&stmnt.body);
                self.indent -= 1;
            }
            Stmnt::While(stmnt) => {
                self.write_line(&format!("while {}", self.format_expr(&stmnt.condition)));
                self.indent += 1;
                self.write_stmnt(&stmnt.body);
                self.indent -= 1;
            }
            Stmnt::DoWhile(stmnt) => {
                self.write_line("do");
                self.indent += 1;
                self.write_stmnt(&stmnt.body);
                self.indent -= 1;
                self.write_line(&format!("while {}", self.format_expr(&stmnt.condition)));
            }
            Stmnt::If(stmnt) => {
                self.write_line(&format!("if {}", self.format_expr(&stmnt.condition)));
                self.indent += 1;
                self.write_stmnt(&stmnt.body);
                self.indent -= 1;
                if let Some(else_stmnt) = &stmnt.else_stmnt {
                    self.write_line("else");
                    self.indent += 1;
                    self.write_stmnt(else_stmnt);
                    self.indent -= 1;
                }
            }
            Stmnt::Switch(stmnt) => {
                self.write_line(&format!("switch {}", self.format_expr(&stmnt.selector)));
                self.indent += 1;
                for case in &stmnt.cases {
                    match &case.expr {
                        Some(expr) => self.write_line(&format!("case {}:", self.format_expr(expr))),
                        None => self.write_line("default:"),
                    }
                    self.indent += 1;
                    for inner in &case.stmnts {
                        self.write_stmnt(inner);
                    }
                    self.indent -= 1;
                }
                self.indent -= 1;
            }
            Stmnt::Expr(stmnt) => {
                let formatted = self.format_expr(&stmnt.expr);
                self.write_line(&formatted);
            }
            Stmnt::Return(stmnt) => match &stmnt.expr {
                Some(expr) => {
                    let formatted = self.format_expr(expr);
                    self.write_line(&format!("return {}", formatted));
                }
                None => self.write_line("return"),
            },
            Stmnt::CtrlTransfer(stmnt) => {
                let keyword = match stmnt.transfer {
                    CtrlTransfer::Break => "break",
                    CtrlTransfer::Continue => "continue",
                    CtrlTransfer::Discard => "discard",
                };
                self.write_line(keyword);
            }
        }
    }

    fn write_struct_decl(&mut self, decl: &StructDecl) {
        match &decl.base_struct {
            Some(base) => self.write_line(&format!("{} : {}", decl.signature_to_string(), base)),
            None => self.write_line(&decl.signature_to_string()),
        }
        self.indent += 1;
        for member in &decl.members {
            self.write_var_decl_stmnt(member);
        }
        self.indent -= 1;
    }

    fn write_function_decl(&mut self, func: &FunctionDecl) {
        let mut header = func.signature_to_string();
        if let Some(semantic) = &func.semantic {
            header.push_str(&format!(" : {}", semantic));
        }
        if func.is_forward_decl() {
            header.push_str(" <forward>");
        }
        self.write_line(&header);
        if let Some(block) = &func.code_block {
            self.indent += 1;
            for stmnt in &block.stmnts {
                self.write_stmnt(stmnt);
            }
            self.indent -= 1;
        }
    }

    fn write_var_decl_stmnt(&mut self, decl: &VarDeclStmnt) {
        for var in &decl.var_decls {
            let mut line = format!("{} {}", decl.var_type.denoter, var.to_decl_string());
            if let Some(pack_offset) = &var.pack_offset {
                line.push_str(&format!(" : {}", pack_offset.to_decl_string()));
            }
            if let Some(init) = &var.initializer {
                line.push_str(&format!(" = {}", self.format_expr(init)));
            }
            self.write_line(&line);
        }
    }

    fn format_expr(&self, expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::Null => "<null>".to_string(),
            ExprKind::List(exprs) => {
                let items: Vec<String> = exprs.iter().map(|e| self.format_expr(e)).collect();
                items.join(", ")
            }
            ExprKind::Literal(literal) => literal.value.clone(),
            ExprKind::TypeName(denoter) => denoter.to_string(),
            ExprKind::Ternary {
                cond_expr,
                then_expr,
                else_expr,
            } => format!(
                "({} ? {} : {})",
                self.format_expr(cond_expr),
                self.format_expr(then_expr),
                self.format_expr(else_expr)
            ),
            ExprKind::Binary {
                op,
                lhs_expr,
                rhs_expr,
            } => format!(
                "({} {} {})",
                self.format_expr(lhs_expr),
                op.to_op_string(),
                self.format_expr(rhs_expr)
            ),
            ExprKind::Unary { op, expr } => {
                format!("({}{})", op.to_op_string(), self.format_expr(expr))
            }
            ExprKind::PostUnary { op, expr } => {
                format!("({}{})", self.format_expr(expr), op.to_op_string())
            }
            ExprKind::Call(call) => {
                let args: Vec<String> =
                    call.arguments.iter().map(|a| self.format_expr(a)).collect();
                match &call.object {
                    Some(object) => format!(
                        "{}.{}({})",
                        self.format_expr(object),
                        call.ident,
                        args.join(", ")
                    ),
                    None => format!("{}({})", call.ident, args.join(", ")),
                }
            }
            ExprKind::Bracket(inner) => format!("({})", self.format_expr(inner)),
            ExprKind::Suffix { expr, var_ident } => {
                format!("{}.{}", self.format_expr(expr), var_ident.to_chain_string())
            }
            ExprKind::ArrayAccess {
                expr,
                array_indices,
            } => {
                let mut s = self.format_expr(expr);
                for index in array_indices {
                    s.push_str(&format!("[{}]", self.format_expr(index)));
                }
                s
            }
            ExprKind::Cast { denoter, expr } => {
                format!("(({}){})", denoter, self.format_expr(expr))
            }
            ExprKind::VarAccess { var_ident, assign } => match assign {
                Some((op, rhs)) => format!(
                    "{} {} {}",
                    var_ident.to_chain_string(),
                    op.to_op_string(),
                    self.format_expr(rhs)
                ),
                None => var_ident.to_chain_string(),
            },
            ExprKind::Initializer(exprs) => {
                let items: Vec<String> = exprs.iter().map(|e| self.format_expr(e)).collect();
                format!("{{{}}}", items.join(", "))
            }
        }
    }
}

impl Default for AstFormatter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::Parser;

    fn dump(source: &str) -> String {
        let stream = tokenize(source).unwrap();
        let mut parser = Parser::new(stream.tokens);
        let program = parser.parse().unwrap();
        AstFormatter::format_program(&program)
    }

    #[test]
    fn test_dump_function() {
        let out = dump("float4 main(float4 pos : POSITION) : SV_Position { return pos; }");
        assert!(out.contains("float4 main(float4) : SV_Position"));
        assert!(out.contains("return pos"));
    }

    #[test]
    fn test_dump_struct() {
        let out = dump("struct VSIn { float3 p : POSITION; };");
        assert!(out.contains("struct VSIn"));
        assert!(out.contains("float3 p : POSITION"));
    }

    #[test]
    fn test_dump_nested_expression() {
        let out = dump("void f() { x = a + b * c; }");
        assert!(out.contains("x = (a + (b * c))"));
    }
}
