//! The `Compiler` struct and its per-node emission rules (spec.md §4.6).

use std::rc::Rc;

use monke_ast::{
    AssignOp, AssignStmt, BlockStmt, Expr, FunctionLit, IfExpr, InfixOp, LetStmt, LoopStmt,
    OpAssignStmt, PrefixOp, Program, Stmt, TablePair,
};
use monke_code::{make_into, CompiledFunction, Instructions, Opcode};
use monke_sym::{SymbolScope, SymbolTable};
use monke_util::Span;

use crate::error::CompileError;
use crate::scope::{CompilationScope, LoopTargets};
use crate::{Bytecode, Constant, BUILTIN_NAMES};

pub struct Compiler {
    constants: Vec<Constant>,
    scopes: Vec<CompilationScope>,
    symbol_table: Option<SymbolTable>,
    loops: Vec<LoopTargets>,
}

impl Compiler {
    pub fn new() -> Self {
        let mut symbol_table = SymbolTable::new();
        for (index, name) in BUILTIN_NAMES.iter().enumerate() {
            symbol_table.define_builtin(index, name);
        }
        Self {
            constants: Vec::new(),
            scopes: vec![CompilationScope::new()],
            symbol_table: Some(symbol_table),
            loops: Vec::new(),
        }
    }

    pub fn bytecode(self) -> Bytecode {
        let root = self.scopes.into_iter().next().expect("root scope");
        Bytecode {
            instructions: root.instructions,
            constants: self.constants,
            source_lines: root.source_lines,
        }
    }

    /// Drains the instructions compiled since the last call to this
    /// method (or since construction), leaving the symbol table and
    /// constant pool intact. The REPL keeps one `Compiler` alive across
    /// submissions and calls this after each one, so globals defined in
    /// an earlier line resolve correctly in a later one without
    /// re-running everything that came before (spec.md §6).
    pub fn take_bytecode(&mut self) -> Bytecode {
        let root = self.scopes.first_mut().expect("root scope");
        let instructions = std::mem::take(&mut root.instructions);
        let source_lines = std::mem::take(&mut root.source_lines);
        root.last_instruction = None;
        root.previous_instruction = None;
        Bytecode { instructions, constants: self.constants.clone(), source_lines }
    }

    pub fn compile_program(&mut self, source: &str, program: &Program) -> Result<(), CompileError> {
        for stmt in &program.statements {
            self.compile_stmt(source, stmt)?;
        }
        Ok(())
    }

    fn scope(&mut self) -> &mut CompilationScope {
        self.scopes.last_mut().expect("at least one scope")
    }

    fn symbols(&mut self) -> &mut SymbolTable {
        self.symbol_table.as_mut().expect("symbol table present")
    }

    fn emit(&mut self, op: Opcode, operands: &[usize], line: u32) -> usize {
        let pos = {
            let scope = self.scope();
            let pos = make_into(&mut scope.instructions, op, operands);
            scope.source_lines.push((pos, line));
            pos
        };
        self.scope().set_last_instruction(op, pos);
        pos
    }

    fn add_constant(&mut self, constant: Constant) -> usize {
        self.constants.push(constant);
        self.constants.len() - 1
    }

    fn enter_scope(&mut self) {
        self.scopes.push(CompilationScope::new());
        let outer = self.symbol_table.take().expect("symbol table present");
        self.symbol_table = Some(outer.enter());
    }

    fn leave_scope(&mut self) -> (Instructions, Vec<(usize, u32)>, usize, Vec<monke_sym::Symbol>) {
        let scope = self.scopes.pop().expect("matching enter_scope");
        let inner = self.symbol_table.take().expect("symbol table present");
        let num_locals = inner.num_definitions;
        let free_symbols = inner.free_symbols.clone();
        self.symbol_table = Some(inner.leave());
        (scope.instructions, scope.source_lines, num_locals, free_symbols)
    }

    fn compile_stmt(&mut self, source: &str, stmt: &Stmt) -> Result<(), CompileError> {
        match stmt {
            Stmt::Let(let_stmt) => self.compile_let(source, let_stmt),
            Stmt::Assign(assign) => self.compile_assign(source, assign),
            Stmt::OpAssign(op_assign) => self.compile_op_assign(source, op_assign),
            Stmt::Return(ret) => {
                let line = stmt.span().line;
                match &ret.value {
                    Some(expr) => self.compile_expr(source, expr)?,
                    None => {
                        self.emit(Opcode::Null, &[], line);
                    }
                }
                self.emit(Opcode::ReturnValue, &[], line);
                Ok(())
            }
            Stmt::Expr(expr_stmt) => {
                self.compile_expr(source, &expr_stmt.expr)?;
                self.emit(Opcode::Pop, &[], expr_stmt.span.line);
                Ok(())
            }
            Stmt::Block(block) => self.compile_block(source, block),
            Stmt::Loop(loop_stmt) => self.compile_loop(source, loop_stmt),
            Stmt::Break(span) => self.compile_break(*span),
            Stmt::Continue(span) => self.compile_continue(*span),
        }
    }

    fn compile_block(&mut self, source: &str, block: &BlockStmt) -> Result<(), CompileError> {
        for stmt in &block.statements {
            self.compile_stmt(source, stmt)?;
        }
        Ok(())
    }

    fn compile_let(&mut self, source: &str, let_stmt: &LetStmt) -> Result<(), CompileError> {
        for binding in &let_stmt.bindings {
            let name = binding.name.slice(source);

            if let Some(Expr::Function(_)) = &binding.value {
                let symbol = self.symbols().define(name);
                self.compile_expr(source, binding.value.as_ref().unwrap())?;
                self.emit_set(symbol.scope, symbol.index, binding.name.line);
                continue;
            }

            match &binding.value {
                Some(expr) => self.compile_expr(source, expr)?,
                None => {
                    self.emit(Opcode::Null, &[], binding.name.line);
                }
            }
            let symbol = self.symbols().define(name);
            self.emit_set(symbol.scope, symbol.index, binding.name.line);
        }
        Ok(())
    }

    fn emit_set(&mut self, scope: SymbolScope, index: usize, line: u32) {
        match scope {
            SymbolScope::Global => {
                self.emit(Opcode::SetGlobal, &[index], line);
            }
            SymbolScope::Local => {
                self.emit(Opcode::SetLocal, &[index], line);
            }
            other => unreachable!("define() never produces scope {:?}", other),
        }
    }

    fn compile_identifier(&mut self, source: &str, name_span: Span) -> Result<(), CompileError> {
        let name = name_span.slice(source);
        let symbol = self
            .symbols()
            .resolve(name)
            .ok_or_else(|| CompileError::new(format!("identifier not found: {}", name), name_span))?;

        match symbol.scope {
            SymbolScope::Global => {
                self.emit(Opcode::GetGlobal, &[symbol.index], name_span.line);
            }
            SymbolScope::Local => {
                self.emit(Opcode::GetLocal, &[symbol.index], name_span.line);
            }
            SymbolScope::Free => {
                self.emit(Opcode::GetFree, &[symbol.index], name_span.line);
            }
            SymbolScope::Builtin => {
                self.emit(Opcode::GetBuiltin, &[symbol.index], name_span.line);
            }
            SymbolScope::Function => {
                self.emit(Opcode::CurrentClosure, &[], name_span.line);
            }
        }
        Ok(())
    }

    fn compile_assign(&mut self, source: &str, assign: &AssignStmt) -> Result<(), CompileError> {
        match assign.target.as_ref() {
            Expr::Ident(ident) => {
                self.compile_expr(source, &assign.value)?;
                let name = ident.name.slice(source);
                let symbol = self
                    .symbols()
                    .resolve(name)
                    .ok_or_else(|| CompileError::new(format!("identifier not found: {}", name), ident.name))?;
                self.emit_set(symbol.scope, symbol.index, assign.span.line);
                Ok(())
            }
            Expr::Index(index_expr) => {
                self.compile_expr(source, &index_expr.container)?;
                self.compile_expr(source, &index_expr.index)?;
                self.compile_expr(source, &assign.value)?;
                self.emit(Opcode::SetIndex, &[], assign.span.line);
                Ok(())
            }
            _ => Err(CompileError::new("invalid assignment target", assign.span)),
        }
    }

    fn compile_op_assign(&mut self, source: &str, op_assign: &OpAssignStmt) -> Result<(), CompileError> {
        let ident = match op_assign.target.as_ref() {
            Expr::Ident(ident) => ident,
            Expr::Index(_) => {
                return Err(CompileError::new(
                    "operator-assignment to an indexed target is not supported",
                    op_assign.span,
                ))
            }
            _ => return Err(CompileError::new("invalid assignment target", op_assign.span)),
        };

        let name = ident.name.slice(source);
        let symbol = self
            .symbols()
            .resolve(name)
            .ok_or_else(|| CompileError::new(format!("identifier not found: {}", name), ident.name))?;

        self.emit_get(symbol.scope, symbol.index, ident.name.line);
        self.compile_expr(source, &op_assign.value)?;

        let op = match op_assign.op {
            AssignOp::Add => Opcode::Add,
            AssignOp::Sub => Opcode::Sub,
            AssignOp::Mul => Opcode::Mul,
            AssignOp::Div => Opcode::Div,
        };
        self.emit(op, &[], op_assign.span.line);
        self.emit_set(symbol.scope, symbol.index, op_assign.span.line);
        Ok(())
    }

    fn emit_get(&mut self, scope: SymbolScope, index: usize, line: u32) {
        match scope {
            SymbolScope::Global => self.emit(Opcode::GetGlobal, &[index], line),
            SymbolScope::Local => self.emit(Opcode::GetLocal, &[index], line),
            SymbolScope::Free => self.emit(Opcode::GetFree, &[index], line),
            SymbolScope::Builtin => self.emit(Opcode::GetBuiltin, &[index], line),
            SymbolScope::Function => self.emit(Opcode::CurrentClosure, &[], line),
        };
    }

    fn compile_loop(&mut self, source: &str, loop_stmt: &LoopStmt) -> Result<(), CompileError> {
        if let Some(init) = &loop_stmt.init {
            self.compile_stmt(source, init)?;
        }

        let cond_start = self.scope().instructions.len();
        match &loop_stmt.condition {
            Some(cond) => self.compile_expr(source, cond)?,
            None => {
                self.emit(Opcode::True, &[], loop_stmt.span.line);
            }
        }
        let jnt_pos = self.emit(Opcode::JumpNotTruthy, &[0xFFFF], loop_stmt.span.line);

        self.loops.push(LoopTargets { break_jumps: Vec::new(), continue_jumps: Vec::new() });
        self.compile_block(source, &loop_stmt.body)?;

        let update_pos = self.scope().instructions.len();
        let targets = self.loops.pop().expect("pushed above");
        for pos in &targets.continue_jumps {
            self.scope().instructions.patch_u16(pos + 1, update_pos as u16);
        }

        if let Some(update) = &loop_stmt.update {
            self.compile_stmt(source, update)?;
        }
        self.emit(Opcode::Jump, &[cond_start], loop_stmt.span.line);

        let after_loop = self.scope().instructions.len();
        self.scope().instructions.patch_u16(jnt_pos + 1, after_loop as u16);
        for pos in &targets.break_jumps {
            self.scope().instructions.patch_u16(pos + 1, after_loop as u16);
        }

        Ok(())
    }

    fn compile_break(&mut self, span: Span) -> Result<(), CompileError> {
        if self.loops.is_empty() {
            return Err(CompileError::new("break outside of a loop", span));
        }
        let pos = self.emit(Opcode::Jump, &[0xFFFF], span.line);
        self.loops.last_mut().unwrap().break_jumps.push(pos);
        Ok(())
    }

    fn compile_continue(&mut self, span: Span) -> Result<(), CompileError> {
        if self.loops.is_empty() {
            return Err(CompileError::new("continue outside of a loop", span));
        }
        let pos = self.emit(Opcode::Jump, &[0xFFFF], span.line);
        self.loops.last_mut().unwrap().continue_jumps.push(pos);
        Ok(())
    }

    fn compile_expr(&mut self, source: &str, expr: &Expr) -> Result<(), CompileError> {
        let line = expr.span().line;
        match expr {
            Expr::Ident(ident) => self.compile_identifier(source, ident.name),
            Expr::Null(_) => {
                self.emit(Opcode::Null, &[], line);
                Ok(())
            }
            Expr::Int(v, _) => {
                let idx = self.add_constant(Constant::Integer(*v));
                self.emit(Opcode::Constant, &[idx], line);
                Ok(())
            }
            Expr::Float(v, _) => {
                let idx = self.add_constant(Constant::Float(*v));
                self.emit(Opcode::Constant, &[idx], line);
                Ok(())
            }
            Expr::Bool(true, _) => {
                self.emit(Opcode::True, &[], line);
                Ok(())
            }
            Expr::Bool(false, _) => {
                self.emit(Opcode::False, &[], line);
                Ok(())
            }
            Expr::Str(span) => {
                let text = string_literal_value(*span, source);
                let idx = self.add_constant(Constant::Str(text));
                self.emit(Opcode::Constant, &[idx], line);
                Ok(())
            }
            Expr::Array(arr) => {
                for el in &arr.elements {
                    self.compile_expr(source, el)?;
                }
                self.emit(Opcode::Array, &[arr.elements.len()], line);
                Ok(())
            }
            Expr::Table(table) => {
                for pair in &table.pairs {
                    match pair {
                        TablePair::Shorthand(ident) => {
                            let text = ident.name.slice(source).to_string();
                            let idx = self.add_constant(Constant::Str(text));
                            self.emit(Opcode::Constant, &[idx], ident.name.line);
                            self.compile_identifier(source, ident.name)?;
                        }
                        TablePair::Explicit(key, value) => {
                            self.compile_expr(source, key)?;
                            self.compile_expr(source, value)?;
                        }
                    }
                }
                self.emit(Opcode::Table, &[table.pairs.len() * 2], line);
                Ok(())
            }
            Expr::Function(fn_lit) => self.compile_function_literal(source, fn_lit, line),
            Expr::Prefix(prefix) => {
                self.compile_expr(source, &prefix.right)?;
                let op = match prefix.op {
                    PrefixOp::Minus => Opcode::Minus,
                    PrefixOp::Bang => Opcode::Bang,
                };
                self.emit(op, &[], line);
                Ok(())
            }
            Expr::Infix(infix) => self.compile_infix(source, infix, line),
            Expr::If(if_expr) => self.compile_if(source, if_expr, line),
            Expr::Call(call) => {
                self.compile_expr(source, &call.callee)?;
                for arg in &call.args {
                    self.compile_expr(source, arg)?;
                }
                self.emit(Opcode::Call, &[call.args.len()], line);
                Ok(())
            }
            Expr::Index(index_expr) => {
                self.compile_expr(source, &index_expr.container)?;
                self.compile_expr(source, &index_expr.index)?;
                self.emit(Opcode::Index, &[], line);
                Ok(())
            }
            Expr::Require(require) => {
                if require.args.len() != 1 {
                    return Err(CompileError::new(
                        "require expects exactly one string argument",
                        require.span,
                    ));
                }
                if !matches!(&require.args[0], Expr::Str(_)) {
                    return Err(CompileError::new(
                        "require's argument must be a string literal",
                        require.span,
                    ));
                }
                self.emit(Opcode::GetBuiltin, &[crate::REQUIRE_BUILTIN_INDEX], line);
                self.compile_expr(source, &require.args[0])?;
                self.emit(Opcode::Call, &[1], line);
                Ok(())
            }
        }
    }

    fn compile_infix(&mut self, source: &str, infix: &monke_ast::InfixExpr, line: u32) -> Result<(), CompileError> {
        if matches!(infix.op, InfixOp::Lt) {
            self.compile_expr(source, &infix.right)?;
            self.compile_expr(source, &infix.left)?;
            self.emit(Opcode::GreaterThan, &[], line);
            return Ok(());
        }

        self.compile_expr(source, &infix.left)?;
        self.compile_expr(source, &infix.right)?;

        let op = match infix.op {
            InfixOp::Add => Opcode::Add,
            InfixOp::Sub => Opcode::Sub,
            InfixOp::Mul => Opcode::Mul,
            InfixOp::Div => Opcode::Div,
            InfixOp::Eq => Opcode::Equal,
            InfixOp::NotEq => Opcode::NotEqual,
            InfixOp::Gt => Opcode::GreaterThan,
            InfixOp::Lt => unreachable!("handled above"),
        };
        self.emit(op, &[], line);
        Ok(())
    }

    fn compile_if(&mut self, source: &str, if_expr: &IfExpr, line: u32) -> Result<(), CompileError> {
        self.compile_expr(source, &if_expr.condition)?;
        let jnt_pos = self.emit(Opcode::JumpNotTruthy, &[0xFFFF], line);

        self.compile_block(source, &if_expr.consequence)?;
        if self.scope().last_is(Opcode::Pop) {
            self.scope().remove_last_instruction();
        }

        let jump_pos = self.emit(Opcode::Jump, &[0xFFFF], line);
        let after_consequence = self.scope().instructions.len();
        self.scope().instructions.patch_u16(jnt_pos + 1, after_consequence as u16);

        match &if_expr.alternative {
            Some(alt) => {
                self.compile_block(source, alt)?;
                if self.scope().last_is(Opcode::Pop) {
                    self.scope().remove_last_instruction();
                }
            }
            None => {
                self.emit(Opcode::Null, &[], line);
            }
        }

        let after_alternative = self.scope().instructions.len();
        self.scope().instructions.patch_u16(jump_pos + 1, after_alternative as u16);
        Ok(())
    }

    fn compile_function_literal(
        &mut self,
        source: &str,
        fn_lit: &FunctionLit,
        line: u32,
    ) -> Result<(), CompileError> {
        self.enter_scope();

        if let Some(name_span) = fn_lit.name {
            self.symbols().define_function_name(name_span.slice(source));
        }
        for param in &fn_lit.params {
            self.symbols().define(param.name.slice(source));
        }

        self.compile_block(source, &fn_lit.body)?;

        if self.scope().last_is(Opcode::Pop) {
            let pos = self.scope().last_instruction.unwrap().position;
            self.scope().replace_instruction(pos, Opcode::ReturnValue);
        } else if !self.scope().last_is(Opcode::ReturnValue) {
            self.emit(Opcode::Return, &[], line);
        }

        let (instructions, source_lines, num_locals, free_symbols) = self.leave_scope();

        for free in &free_symbols {
            self.emit_get(free.scope, free.index, line);
        }

        let compiled = CompiledFunction {
            instructions,
            num_locals,
            num_parameters: fn_lit.params.len(),
            source_lines,
            name: fn_lit.name.map(|span| span.slice(source).to_string()),
        };
        let fn_idx = self.add_constant(Constant::CompiledFunction(Rc::new(compiled)));
        self.emit(Opcode::Closure, &[fn_idx, free_symbols.len()], line);
        Ok(())
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Strips the surrounding quotes from a string-literal span's text.
fn string_literal_value(span: Span, source: &str) -> String {
    let text = span.slice(source);
    if text.len() >= 2 {
        text[1..text.len() - 1].to_string()
    } else {
        String::new()
    }
}
