//! Pratt parser for Monke: turns a token stream into the AST defined by
//! `monke_ast`, accumulating errors in a `Handler`-compatible buffer
//! (spec.md §4.2).

mod error;
mod expr;
mod numeric;
mod parser;
mod precedence;
mod stmt;

pub use error::ParseError;
pub use parser::Parser;
pub use precedence::{precedence_of, Precedence};

use monke_ast::Program;

/// Parses `source` to completion or to the first error. On success,
/// returns the `Program`; on failure, the accumulated parser errors
/// (spec.md §4.2 — parsing stops at the first error, so this is at most
/// one entry long today, but callers should not rely on that).
pub fn parse(source: &str) -> Result<Program, Vec<ParseError>> {
    let mut parser = Parser::new(source);
    let program = parser.parse_program();
    if parser.has_errors() {
        Err(parser.errors().to_vec())
    } else {
        Ok(program)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn print_program(source: &str) -> String {
        let program = parse(source).unwrap_or_else(|errs| {
            panic!("unexpected parse errors for {:?}: {:?}", source, errs)
        });
        program.print(source)
    }

    #[test]
    fn precedence_prefix_binds_tighter_than_product() {
        assert_eq!(print_program("-a * b;"), "((-a) * b);");
    }

    #[test]
    fn precedence_product_binds_tighter_than_sum() {
        assert_eq!(print_program("a + b * c;"), "(a + (b * c));");
    }

    #[test]
    fn double_prefix_operator() {
        assert_eq!(print_program("!-a;"), "(!(-a));");
    }

    #[test]
    fn let_statement_with_multiple_bindings() {
        assert_eq!(print_program("let x = 1, y = 2;"), "let x = 1, y = 2;");
    }

    #[test]
    fn let_without_initializer() {
        assert_eq!(print_program("let x;"), "let x;");
    }

    #[test]
    fn return_with_value() {
        assert_eq!(print_program("return 5;"), "return 5;");
    }

    #[test]
    fn return_without_value() {
        assert_eq!(print_program("return;"), "return;");
    }

    #[test]
    fn assignment_statement() {
        assert_eq!(print_program("x = 5;"), "x = 5;");
    }

    #[test]
    fn operator_assignment_statement() {
        assert_eq!(print_program("x += 5;"), "x += 5;");
    }

    #[test]
    fn index_assignment_statement() {
        assert_eq!(print_program("arr[0] = 5;"), "arr[0] = 5;");
    }

    #[test]
    fn call_expression_prints_arguments() {
        assert_eq!(print_program("add(1, 2 * 3);"), "add(1, (2 * 3));");
    }

    #[test]
    fn index_expression_prints_parenthesized() {
        assert_eq!(print_program("arr[1 + 1];"), "(arr[(1 + 1)]);");
    }

    #[test]
    fn array_literal_prints_elements() {
        assert_eq!(print_program("[1, 2 * 2, 3 + 3];"), "[1, (2 * 2), (3 + 3)];");
    }

    #[test]
    fn table_literal_shorthand_expands_to_self_keyed_pair() {
        let printed = print_program("let x = 1; { x };");
        assert!(printed.contains("{x: x}"));
    }

    #[test]
    fn function_literal_records_let_bound_name() {
        let source = "let add = fn(a, b) { a + b };";
        let program = parse(source).expect("parses");
        match &program.statements[0] {
            monke_ast::Stmt::Let(let_stmt) => match &let_stmt.bindings[0].value {
                Some(monke_ast::Expr::Function(f)) => {
                    assert_eq!(f.name.unwrap().slice(source), "add");
                }
                other => panic!("expected function literal, got {:?}", other),
            },
            other => panic!("expected let statement, got {:?}", other),
        }
    }

    #[test]
    fn for_statement_parses_all_clauses() {
        let source = "for (let i = 0; i < 10; i += 1) { i; }";
        assert!(parse(source).is_ok());
    }

    #[test]
    fn while_statement_parses() {
        assert!(parse("while (true) { break; }").is_ok());
    }

    #[test]
    fn missing_semicolon_reports_new_line_error() {
        let errors = parse("let x = 5 let y = 10;").unwrap_err();
        assert_eq!(
            errors[0].message,
            "this statement must be on a new line or come after a semicolon"
        );
    }

    #[test]
    fn undefined_prefix_reports_error() {
        let errors = parse("};").unwrap_err();
        assert!(errors[0].message.contains("no prefix parse function"));
    }

    #[test]
    fn require_expression_parses_string_argument() {
        assert_eq!(print_program("require(\"mod\");"), "require(\"mod\");");
    }
}
