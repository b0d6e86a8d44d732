//! Single-pass bytecode compiler (spec.md §4.6): walks the AST once,
//! emitting opcodes into a scope stack and building the constant pool.

mod compiler;
mod error;
mod scope;

pub use compiler::Compiler;
pub use error::CompileError;

use std::rc::Rc;

use monke_code::{CompiledFunction, Instructions};

/// Builtin names in their fixed index order (spec.md §1). The compiler
/// only needs the names to resolve calls to `Builtin` symbols; the
/// actual native implementations live in the runtime crate, which must
/// keep this exact order.
pub const BUILTIN_NAMES: &[&str] = &["len", "puts", "first", "last", "rest", "push", "exit", "copy"];

/// The VM's builtin slot that implements `require` (spec.md §6). Kept one
/// past the user-visible builtins: `require` is a grammar form, not a
/// callable identifier, so it is never installed as a symbol and a user
/// can't shadow or re-bind it.
pub const REQUIRE_BUILTIN_INDEX: usize = BUILTIN_NAMES.len();

/// One entry in the compiler's constant pool (spec.md §3).
#[derive(Clone, Debug)]
pub enum Constant {
    Integer(i64),
    Float(f64),
    Str(String),
    CompiledFunction(Rc<CompiledFunction>),
}

/// The output of a successful compilation: the top-level instruction
/// stream plus the constant pool it indexes into.
#[derive(Clone, Debug)]
pub struct Bytecode {
    pub instructions: Instructions,
    pub constants: Vec<Constant>,
    /// Maps a top-level instruction offset to its source line, mirroring
    /// `CompiledFunction::source_lines` for call-stack traces that bottom
    /// out in the top-level frame (spec.md §4.7).
    pub source_lines: Vec<(usize, u32)>,
}

/// Compiles `program` against a fresh compiler (spec.md §4.6 entry
/// point for non-REPL, non-`require` use — the REPL and module loader
/// keep a `Compiler` alive across submissions instead).
pub fn compile(source: &str, program: &monke_ast::Program) -> Result<Bytecode, CompileError> {
    let mut compiler = Compiler::new();
    compiler.compile_program(source, program)?;
    Ok(compiler.bytecode())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compiled_instructions(source: &str) -> Instructions {
        let program = monke_par::parse(source).expect("parse error");
        compile(source, &program).expect("compile error").instructions
    }

    fn dump(source: &str) -> String {
        compiled_instructions(source).disassemble()
    }

    #[test]
    fn integer_arithmetic_emits_constants_and_pop() {
        let out = dump("1 + 2;");
        assert_eq!(
            out,
            "0000 OpConstant 0\n0003 OpConstant 1\n0006 OpAdd\n0007 OpPop\n"
        );
    }

    #[test]
    fn less_than_is_compiled_as_swapped_greater_than() {
        let out = dump("1 < 2;");
        assert_eq!(
            out,
            "0000 OpConstant 0\n0003 OpConstant 1\n0006 OpGreaterThan\n0007 OpPop\n"
        );
    }

    #[test]
    fn boolean_and_null_literals_use_dedicated_opcodes() {
        let out = dump("true; false; null;");
        assert_eq!(out, "0000 OpTrue\n0001 OpPop\n0002 OpFalse\n0003 OpPop\n0004 OpNull\n0005 OpPop\n");
    }

    #[test]
    fn if_without_else_emits_null_alternative_and_patches_both_jumps() {
        let out = dump("if (true) { 10 };");
        assert_eq!(
            out,
            "0000 OpTrue\n\
             0001 OpJumpNotTruthy 10\n\
             0004 OpConstant 0\n\
             0007 OpJump 11\n\
             0010 OpNull\n\
             0011 OpPop\n"
        );
    }

    #[test]
    fn if_with_else_patches_both_branches() {
        let out = dump("if (true) { 10 } else { 20 };");
        assert_eq!(
            out,
            "0000 OpTrue\n\
             0001 OpJumpNotTruthy 10\n\
             0004 OpConstant 0\n\
             0007 OpJump 13\n\
             0010 OpConstant 1\n\
             0013 OpPop\n"
        );
    }

    #[test]
    fn global_let_binding_emits_set_then_get() {
        let out = dump("let one = 1; one;");
        assert_eq!(
            out,
            "0000 OpConstant 0\n0003 OpSetGlobal 0\n0006 OpGetGlobal 0\n0009 OpPop\n"
        );
    }

    #[test]
    fn string_concatenation_shares_the_add_opcode() {
        let out = dump(r#""mon" + "ke";"#);
        assert_eq!(
            out,
            "0000 OpConstant 0\n0003 OpConstant 1\n0006 OpAdd\n0007 OpPop\n"
        );
    }

    #[test]
    fn array_literal_emits_elements_then_array_n() {
        let out = dump("[1, 2, 3];");
        assert_eq!(
            out,
            "0000 OpConstant 0\n0003 OpConstant 1\n0006 OpConstant 2\n0009 OpArray 3\n0012 OpPop\n"
        );
    }

    #[test]
    fn table_literal_emits_pairs_then_table_2n() {
        let out = dump("{1: 2, 3: 4};");
        assert_eq!(
            out,
            "0000 OpConstant 0\n0003 OpConstant 1\n0006 OpConstant 2\n0009 OpConstant 3\n0012 OpTable 4\n0015 OpPop\n"
        );
    }

    #[test]
    fn table_shorthand_pushes_name_as_key_constant_then_looks_it_up() {
        let out = dump("let x = 1; {x};");
        assert_eq!(
            out,
            "0000 OpConstant 0\n\
             0003 OpSetGlobal 0\n\
             0006 OpConstant 1\n\
             0009 OpGetGlobal 0\n\
             0012 OpTable 2\n\
             0015 OpPop\n"
        );
    }

    #[test]
    fn index_expression_emits_container_then_index_then_op() {
        let out = dump("[1, 2][0];");
        assert_eq!(
            out,
            "0000 OpConstant 0\n\
             0003 OpConstant 1\n\
             0006 OpArray 2\n\
             0009 OpConstant 2\n\
             0012 OpIndex\n\
             0013 OpPop\n"
        );
    }

    #[test]
    fn index_assignment_emits_container_index_value_then_set_index() {
        let out = dump("let a = [1]; a[0] = 2;");
        assert_eq!(
            out,
            "0000 OpConstant 0\n\
             0003 OpArray 1\n\
             0006 OpSetGlobal 0\n\
             0009 OpGetGlobal 0\n\
             0012 OpConstant 1\n\
             0015 OpConstant 2\n\
             0018 OpSetIndex\n"
        );
    }

    #[test]
    fn compound_assignment_to_indexed_target_is_rejected() {
        let program = monke_par::parse("let a = [1]; a[0] += 2;").unwrap();
        let err = compile("let a = [1]; a[0] += 2;", &program).unwrap_err();
        assert!(err.message.contains("indexed target"));
    }

    #[test]
    fn compound_assignment_to_identifier_reads_then_writes() {
        let out = dump("let x = 1; x += 2;");
        assert_eq!(
            out,
            "0000 OpConstant 0\n\
             0003 OpSetGlobal 0\n\
             0006 OpGetGlobal 0\n\
             0009 OpConstant 1\n\
             0012 OpAdd\n\
             0013 OpSetGlobal 0\n"
        );
    }

    #[test]
    fn function_literal_replaces_trailing_pop_with_return_value() {
        let source = "fn() { 5 + 10 };";
        let out = dump(source);
        assert_eq!(out, "0000 OpClosure 2 0\n0004 OpPop\n");

        let program = monke_par::parse(source).unwrap();
        let bytecode = compile(source, &program).unwrap();
        let inner = match &bytecode.constants[2] {
            Constant::CompiledFunction(f) => f.instructions.disassemble(),
            _ => panic!("expected compiled function constant at index 2"),
        };
        assert_eq!(inner, "0000 OpConstant 0\n0003 OpConstant 1\n0006 OpAdd\n0007 OpReturnValue\n");
    }

    #[test]
    fn call_expression_compiles_callee_then_args_then_call_n() {
        let out = dump("let f = fn(a) { a }; f(1);");
        assert!(out.contains("OpCall 1"));
        assert!(out.contains("OpGetGlobal 0"));
    }

    #[test]
    fn let_bound_recursive_function_resolves_its_own_name_via_current_closure() {
        let source = "let count = fn(n) { count(n - 1) };";
        let out = dump(source);
        assert!(out.contains("OpClosure"));
        let program = monke_par::parse(source).unwrap();
        let bytecode = compile(source, &program).unwrap();
        let inner = bytecode
            .constants
            .iter()
            .find_map(|c| match c {
                Constant::CompiledFunction(f) => Some(f.clone()),
                _ => None,
            })
            .expect("compiled function constant");
        // The function's own name resolves against the `Function`-scoped
        // self-symbol installed inside its own scope, not the enclosing
        // global binding, so recursion goes through `CurrentClosure`.
        assert!(inner.instructions.disassemble().contains("OpCurrentClosure"));
    }

    #[test]
    fn closure_over_outer_local_emits_get_free_in_inner_scope() {
        let source = "let newAdder = fn(a) { fn(b) { a + b } };";
        let program = monke_par::parse(source).unwrap();
        let bytecode = compile(source, &program).unwrap();

        let outer = bytecode
            .constants
            .iter()
            .find_map(|c| match c {
                Constant::CompiledFunction(f) if f.num_parameters == 1 && f.instructions.disassemble().contains("OpClosure") => {
                    Some(f.clone())
                }
                _ => None,
            })
            .expect("outer function constant");
        assert!(outer.instructions.disassemble().contains("OpGetLocal 0"));

        let inner_source = outer.instructions.disassemble();
        assert!(inner_source.contains("OpClosure"));
    }

    #[test]
    fn while_loop_lowers_to_cond_jump_body_jump_back() {
        let out = dump("while (true) { 1; }");
        assert_eq!(
            out,
            "0000 OpTrue\n\
             0001 OpJumpNotTruthy 11\n\
             0004 OpConstant 0\n\
             0007 OpPop\n\
             0008 OpJump 0\n"
        );
    }

    #[test]
    fn break_and_continue_jump_to_loop_exit_and_update_respectively() {
        let out = dump("for (let i = 0; i < 1; i = i + 1) { break; continue; }");
        assert!(out.matches("OpJump").count() >= 3);
    }

    #[test]
    fn break_outside_loop_is_a_compile_error() {
        let program = monke_par::parse("break;").unwrap();
        assert!(compile("break;", &program).is_err());
    }

    #[test]
    fn bare_return_emits_null_then_return_value() {
        let out = dump("fn() { return; };");
        let inner = {
            let program = monke_par::parse("fn() { return; };").unwrap();
            let bytecode = compile("fn() { return; };", &program).unwrap();
            match &bytecode.constants[0] {
                Constant::CompiledFunction(f) => f.instructions.disassemble(),
                _ => panic!("expected compiled function constant"),
            }
        };
        assert_eq!(inner, "0000 OpNull\n0001 OpReturnValue\n");
        assert!(out.contains("OpClosure"));
    }

    #[test]
    fn require_compiles_to_reserved_builtin_slot_call() {
        let out = dump(r#"require("mod.monke");"#);
        assert_eq!(
            out,
            format!(
                "0000 OpGetBuiltin {}\n0002 OpConstant 0\n0005 OpCall 1\n0007 OpPop\n",
                REQUIRE_BUILTIN_INDEX
            )
        );
    }

    #[test]
    fn require_with_non_literal_argument_is_a_compile_error() {
        let program = monke_par::parse("let p = \"x\"; require(p);").unwrap();
        assert!(compile("let p = \"x\"; require(p);", &program).is_err());
    }

    #[test]
    fn take_bytecode_drains_only_what_was_compiled_since_the_last_call() {
        let mut compiler = Compiler::new();

        let first = monke_par::parse("let x = 5;").unwrap();
        compiler.compile_program("let x = 5;", &first).unwrap();
        let chunk1 = compiler.take_bytecode();
        assert_eq!(chunk1.instructions.disassemble(), "0000 OpConstant 0\n0003 OpSetGlobal 0\n");

        let second = monke_par::parse("x + 1;").unwrap();
        compiler.compile_program("x + 1;", &second).unwrap();
        let chunk2 = compiler.take_bytecode();
        // Resolves `x` against the symbol the first chunk defined, and
        // the instruction offsets start back at zero for the new chunk.
        assert_eq!(chunk2.instructions.disassemble(), "0000 OpGetGlobal 0\n0003 OpConstant 1\n0006 OpAdd\n0007 OpPop\n");
    }
}
