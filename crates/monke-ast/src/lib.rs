//! Abstract syntax tree for Monke (spec.md §3).
//!
//! The tag lives in the type system: `Expr` and `Stmt` are closed sums
//! over the node variants spec.md enumerates, rather than a `void*` with
//! an external tag byte (the source language's encoding — see
//! DESIGN.md). Every node keeps the `Span` of its defining token so
//! parse/compile errors can point back into the original source; no
//! node copies identifier or string bytes out of that source.
//!
//! A parent node owns its children through `Box`/`Vec`, so disposal is
//! just an ordinary drop — Rust's ownership model gives us the
//! post-order traversal spec.md asks for without writing it by hand.

use monke_util::Span;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrefixOp {
    Minus,
    Bang,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InfixOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    Lt,
    Gt,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// A bare identifier reference or binding name. The name is a span, not
/// an owned `String` — callers recover the text with `name.slice(source)`.
#[derive(Clone, Copy, Debug)]
pub struct Ident {
    pub name: Span,
}

#[derive(Clone, Debug)]
pub struct ArrayLit {
    pub elements: Vec<Expr>,
    pub span: Span,
}

/// One `{...}` entry. `Shorthand(x)` is the `{ x, y: 2 }` sugar for
/// `{ "x": x, y: 2 }` — kept as its own variant (rather than folded
/// into `Explicit` with a duplicated `Expr::Ident` key) so the compiler
/// can tell a sugared self-reference apart from `{ x: x }` written out
/// by hand, where `x` on the key side is a genuine lookup.
#[derive(Clone, Debug)]
pub enum TablePair {
    Shorthand(Ident),
    Explicit(Expr, Expr),
}

#[derive(Clone, Debug)]
pub struct TableLit {
    pub pairs: Vec<TablePair>,
    pub span: Span,
}

/// A function literal. `name` is set iff this literal is the right-hand
/// side of a `let` binding or a plain-identifier assignment (spec.md §3
/// invariant) — it exists purely so the compiler can install a
/// `Function`-scoped self-symbol for recursion and so stack traces have
/// something to print.
#[derive(Clone, Debug)]
pub struct FunctionLit {
    pub params: Vec<Ident>,
    pub body: BlockStmt,
    pub name: Option<Span>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct PrefixExpr {
    pub op: PrefixOp,
    pub right: Box<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct InfixExpr {
    pub left: Box<Expr>,
    pub op: InfixOp,
    pub right: Box<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct IfExpr {
    pub condition: Box<Expr>,
    pub consequence: BlockStmt,
    pub alternative: Option<BlockStmt>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct CallExpr {
    pub callee: Box<Expr>,
    pub args: Vec<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct IndexExpr {
    pub container: Box<Expr>,
    pub index: Box<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct RequireExpr {
    pub args: Vec<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum Expr {
    Ident(Ident),
    Null(Span),
    Int(i64, Span),
    Float(f64, Span),
    Bool(bool, Span),
    /// Span covers the literal including quotes; text is recovered with
    /// `span.slice(source)[1..len-1]`.
    Str(Span),
    Array(ArrayLit),
    Table(TableLit),
    Function(FunctionLit),
    Prefix(PrefixExpr),
    Infix(InfixExpr),
    If(IfExpr),
    Call(CallExpr),
    Index(IndexExpr),
    Require(RequireExpr),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Ident(i) => i.name,
            Expr::Null(s) | Expr::Int(_, s) | Expr::Float(_, s) | Expr::Bool(_, s) | Expr::Str(s) => *s,
            Expr::Array(a) => a.span,
            Expr::Table(t) => t.span,
            Expr::Function(f) => f.span,
            Expr::Prefix(p) => p.span,
            Expr::Infix(i) => i.span,
            Expr::If(i) => i.span,
            Expr::Call(c) => c.span,
            Expr::Index(i) => i.span,
            Expr::Require(r) => r.span,
        }
    }

    /// The lvalue invariant from spec.md §3: assignment targets are
    /// always an identifier or an index expression.
    pub fn is_valid_assign_target(&self) -> bool {
        matches!(self, Expr::Ident(_) | Expr::Index(_))
    }

    /// Fully-parenthesized structural print, used for the round-trip and
    /// precedence properties in spec.md §8 (e.g. `-a * b` prints as
    /// `((-a) * b)`).
    pub fn print(&self, source: &str) -> String {
        match self {
            Expr::Ident(i) => i.name.slice(source).to_string(),
            Expr::Null(_) => "null".to_string(),
            Expr::Int(v, _) => v.to_string(),
            Expr::Float(v, _) => v.to_string(),
            Expr::Bool(v, _) => v.to_string(),
            Expr::Str(span) => span.slice(source).to_string(),
            Expr::Array(a) => format!(
                "[{}]",
                a.elements.iter().map(|e| e.print(source)).collect::<Vec<_>>().join(", ")
            ),
            Expr::Table(t) => format!(
                "{{{}}}",
                t.pairs
                    .iter()
                    .map(|pair| match pair {
                        TablePair::Shorthand(ident) => {
                            let name = ident.name.slice(source);
                            format!("{}: {}", name, name)
                        }
                        TablePair::Explicit(k, v) => format!("{}: {}", k.print(source), v.print(source)),
                    })
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Expr::Function(f) => format!(
                "fn({}) {{ ... }}",
                f.params.iter().map(|p| p.name.slice(source)).collect::<Vec<_>>().join(", ")
            ),
            Expr::Prefix(p) => format!("({}{})", prefix_op_str(p.op), p.right.print(source)),
            Expr::Infix(i) => format!(
                "({} {} {})",
                i.left.print(source),
                infix_op_str(i.op),
                i.right.print(source)
            ),
            Expr::If(i) => format!(
                "if{} {{ ... }}",
                i.condition.print(source),
            ),
            Expr::Call(c) => format!(
                "{}({})",
                c.callee.print(source),
                c.args.iter().map(|a| a.print(source)).collect::<Vec<_>>().join(", ")
            ),
            Expr::Index(i) => format!("({}[{}])", i.container.print(source), i.index.print(source)),
            Expr::Require(r) => format!(
                "require({})",
                r.args.iter().map(|a| a.print(source)).collect::<Vec<_>>().join(", ")
            ),
        }
    }
}

fn prefix_op_str(op: PrefixOp) -> &'static str {
    match op {
        PrefixOp::Minus => "-",
        PrefixOp::Bang => "!",
    }
}

fn infix_op_str(op: InfixOp) -> &'static str {
    match op {
        InfixOp::Add => "+",
        InfixOp::Sub => "-",
        InfixOp::Mul => "*",
        InfixOp::Div => "/",
        InfixOp::Eq => "==",
        InfixOp::NotEq => "!=",
        InfixOp::Lt => "<",
        InfixOp::Gt => ">",
    }
}

fn assign_op_str(op: AssignOp) -> &'static str {
    match op {
        AssignOp::Add => "+=",
        AssignOp::Sub => "-=",
        AssignOp::Mul => "*=",
        AssignOp::Div => "/=",
    }
}

#[derive(Clone, Debug)]
pub struct LetBinding {
    pub name: Span,
    pub value: Option<Expr>,
}

#[derive(Clone, Debug)]
pub struct LetStmt {
    pub bindings: Vec<LetBinding>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct AssignStmt {
    pub target: Box<Expr>,
    pub value: Box<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct OpAssignStmt {
    pub target: Box<Expr>,
    pub op: AssignOp,
    pub value: Box<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct ReturnStmt {
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct ExprStmt {
    pub expr: Expr,
    pub span: Span,
}

#[derive(Clone, Debug, Default)]
pub struct BlockStmt {
    pub statements: Vec<Stmt>,
    pub span: Span,
}

/// Shared shape for `for` and `while` (spec.md §3): both lower through
/// the same `init; cond; update; body` skeleton (spec.md §4.6), so they
/// share one AST node distinguished only by which parts are present.
#[derive(Clone, Debug)]
pub struct LoopStmt {
    pub init: Option<Box<Stmt>>,
    pub condition: Option<Expr>,
    pub update: Option<Box<Stmt>>,
    pub body: BlockStmt,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum Stmt {
    Let(LetStmt),
    Assign(AssignStmt),
    OpAssign(OpAssignStmt),
    Return(ReturnStmt),
    Expr(ExprStmt),
    Block(BlockStmt),
    Loop(LoopStmt),
    Break(Span),
    Continue(Span),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Let(s) => s.span,
            Stmt::Assign(s) => s.span,
            Stmt::OpAssign(s) => s.span,
            Stmt::Return(s) => s.span,
            Stmt::Expr(s) => s.span,
            Stmt::Block(s) => s.span,
            Stmt::Loop(s) => s.span,
            Stmt::Break(s) | Stmt::Continue(s) => *s,
        }
    }

    pub fn print(&self, source: &str) -> String {
        match self {
            Stmt::Let(s) => {
                let bindings = s
                    .bindings
                    .iter()
                    .map(|b| match &b.value {
                        Some(v) => format!("{} = {}", b.name.slice(source), v.print(source)),
                        None => b.name.slice(source).to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("let {};", bindings)
            }
            Stmt::Assign(s) => format!("{} = {};", s.target.print(source), s.value.print(source)),
            Stmt::OpAssign(s) => format!(
                "{} {} {};",
                s.target.print(source),
                assign_op_str(s.op),
                s.value.print(source)
            ),
            Stmt::Return(s) => match &s.value {
                Some(v) => format!("return {};", v.print(source)),
                None => "return;".to_string(),
            },
            Stmt::Expr(s) => format!("{};", s.expr.print(source)),
            Stmt::Block(b) => b.statements.iter().map(|st| st.print(source)).collect::<Vec<_>>().join(" "),
            Stmt::Loop(_) => "loop { ... }".to_string(),
            Stmt::Break(_) => "break;".to_string(),
            Stmt::Continue(_) => "continue;".to_string(),
        }
    }
}

/// A parsed program: the root owns every top-level statement.
#[derive(Clone, Debug, Default)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

impl Program {
    pub fn print(&self, source: &str) -> String {
        self.statements.iter().map(|s| s.print(source)).collect::<Vec<_>>().join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str, src: &mut String) -> Ident {
        let start = src.len();
        src.push_str(name);
        Ident { name: Span::new(start, src.len(), 1) }
    }

    #[test]
    fn prefix_and_infix_print_fully_parenthesized() {
        let mut src = String::new();
        let a = ident("a", &mut src);
        let b = ident("b", &mut src);
        let expr = Expr::Infix(InfixExpr {
            left: Box::new(Expr::Prefix(PrefixExpr {
                op: PrefixOp::Minus,
                right: Box::new(Expr::Ident(a)),
                span: Span::DUMMY,
            })),
            op: InfixOp::Mul,
            right: Box::new(Expr::Ident(b)),
            span: Span::DUMMY,
        });
        assert_eq!(expr.print(&src), "((-a) * b)");
    }

    #[test]
    fn double_prefix_prints_nested_parens() {
        let mut src = String::new();
        let a = ident("a", &mut src);
        let expr = Expr::Prefix(PrefixExpr {
            op: PrefixOp::Bang,
            right: Box::new(Expr::Prefix(PrefixExpr {
                op: PrefixOp::Minus,
                right: Box::new(Expr::Ident(a)),
                span: Span::DUMMY,
            })),
            span: Span::DUMMY,
        });
        assert_eq!(expr.print(&src), "(!(-a))");
    }
}
