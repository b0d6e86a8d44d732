//! The stack-based bytecode VM (spec.md §4.7): executes `Bytecode` from
//! `monke_compile` against a GC-managed heap of `monke_obj::Object`s.

mod error;
mod frame;
mod heap;
mod vm;

pub use error::{RuntimeError, TraceEntry};
pub use frame::Frame;
pub use vm::{gc_value_mut, BuiltinFn, Vm, MAX_FRAMES, STACK_SIZE};

#[cfg(test)]
mod tests {
    use super::*;
    use monke_obj::Object;

    fn run(source: &str) -> Vm {
        let program = monke_par::parse(source).expect("parse error");
        let bytecode = monke_compile::compile(source, &program).expect("compile error");
        let mut vm = Vm::new(no_op_builtins());
        vm.run(&bytecode).expect("runtime error");
        vm
    }

    fn no_op_builtins() -> Vec<BuiltinFn> {
        fn stub(vm: &mut Vm, _args: &[Object]) -> Object {
            vm.alloc_error("not implemented in this test")
        }
        vec![stub; monke_compile::BUILTIN_NAMES.len() + 1]
    }

    #[test]
    fn integer_arithmetic() {
        let vm = run("1 + 2 * 3;");
        assert!(matches!(vm.last_popped(), Object::Integer(7)));
    }

    #[test]
    fn integer_division_truncates() {
        let vm = run("7 / 2;");
        assert!(matches!(vm.last_popped(), Object::Integer(3)));
    }

    #[test]
    fn mixed_int_float_promotes_to_float() {
        let vm = run("1 + 2.5;");
        match vm.last_popped() {
            Object::Float(v) => assert!((v - 3.5).abs() < f64::EPSILON),
            other => panic!("expected float, got {:?}", other),
        }
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let program = monke_par::parse("1 / 0;").unwrap();
        let bytecode = monke_compile::compile("1 / 0;", &program).unwrap();
        let mut vm = Vm::new(no_op_builtins());
        let err = vm.run(&bytecode).unwrap_err();
        assert!(err.message.contains("division by zero"));
    }

    #[test]
    fn type_mismatch_between_different_kinds_is_reported_exactly() {
        let program = monke_par::parse("5 + true;").unwrap();
        let bytecode = monke_compile::compile("5 + true;", &program).unwrap();
        let mut vm = Vm::new(no_op_builtins());
        let err = vm.run(&bytecode).unwrap_err();
        assert_eq!(err.message, "type mismatch: Integer + Boolean");
    }

    #[test]
    fn unknown_operator_on_same_kind_is_reported_exactly() {
        let program = monke_par::parse(r#""abc" - "def";"#).unwrap();
        let bytecode = monke_compile::compile(r#""abc" - "def";"#, &program).unwrap();
        let mut vm = Vm::new(no_op_builtins());
        let err = vm.run(&bytecode).unwrap_err();
        assert_eq!(err.message, "unknown operator: String - String");
    }

    #[test]
    fn string_concatenation() {
        let vm = run(r#""mon" + "ke";"#);
        match vm.last_popped() {
            Object::String(s) => assert_eq!(s.as_str(), "monke"),
            other => panic!("expected string, got {:?}", other),
        }
    }

    #[test]
    fn boolean_comparison() {
        let vm = run("1 < 2;");
        assert!(matches!(vm.last_popped(), Object::Boolean(true)));
    }

    #[test]
    fn equality_across_kinds_is_false_not_an_error() {
        let vm = run("1 == true;");
        assert!(matches!(vm.last_popped(), Object::Boolean(false)));
    }

    #[test]
    fn if_expression_yields_consequence_value() {
        let vm = run("if (true) { 10 } else { 20 };");
        assert!(matches!(vm.last_popped(), Object::Integer(10)));
    }

    #[test]
    fn if_expression_without_else_yields_null_on_false() {
        let vm = run("if (false) { 10 };");
        assert!(matches!(vm.last_popped(), Object::Null));
    }

    #[test]
    fn global_let_binding_round_trips() {
        let vm = run("let x = 5; x + 1;");
        assert!(matches!(vm.last_popped(), Object::Integer(6)));
    }

    #[test]
    fn function_call_with_return_value() {
        let vm = run("let add = fn(a, b) { a + b }; add(3, 4);");
        assert!(matches!(vm.last_popped(), Object::Integer(7)));
    }

    #[test]
    fn recursive_function_via_current_closure() {
        let vm = run("let count = fn(n) { if (n == 0) { return 0; } return n + count(n - 1); }; count(5);");
        assert!(matches!(vm.last_popped(), Object::Integer(15)));
    }

    #[test]
    fn closures_capture_free_variables() {
        let vm = run("let newAdder = fn(a) { fn(b) { a + b } }; let addTwo = newAdder(2); addTwo(3);");
        assert!(matches!(vm.last_popped(), Object::Integer(5)));
    }

    #[test]
    fn array_literal_and_index() {
        let vm = run("[1, 2, 3][1];");
        assert!(matches!(vm.last_popped(), Object::Integer(2)));
    }

    #[test]
    fn array_index_out_of_range_is_null() {
        let vm = run("[1, 2, 3][10];");
        assert!(matches!(vm.last_popped(), Object::Null));
    }

    #[test]
    fn array_negative_index_is_null() {
        let vm = run("[1, 2, 3][-1];");
        assert!(matches!(vm.last_popped(), Object::Null));
    }

    #[test]
    fn table_literal_and_index() {
        let vm = run(r#"{"a": 1, "b": 2}["a"];"#);
        assert!(matches!(vm.last_popped(), Object::Integer(1)));
    }

    #[test]
    fn index_assignment_mutates_array_in_place() {
        let vm = run("let a = [1, 2, 3]; a[0] = 99; a[0];");
        assert!(matches!(vm.last_popped(), Object::Integer(99)));
    }

    #[test]
    fn index_assignment_mutates_table_in_place() {
        let vm = run(r#"let t = {"a": 1}; t["a"] = 99; t["a"];"#);
        assert!(matches!(vm.last_popped(), Object::Integer(99)));
    }

    #[test]
    fn while_loop_accumulates() {
        let vm = run("let i = 0; let sum = 0; while (i < 5) { sum = sum + i; i = i + 1; } sum;");
        assert!(matches!(vm.last_popped(), Object::Integer(10)));
    }

    #[test]
    fn for_loop_break_and_continue() {
        let vm = run(
            "let sum = 0; for (let i = 0; i < 10; i = i + 1) { if (i == 5) { break; } if (i == 2) { continue; } sum = sum + i; } sum;",
        );
        // 0 + 1 + 3 + 4 = 8 (2 skipped by continue, loop broken at 5)
        assert!(matches!(vm.last_popped(), Object::Integer(8)));
    }

    #[test]
    fn calling_non_function_is_a_runtime_error() {
        let program = monke_par::parse("let x = 5; x();").unwrap();
        let bytecode = monke_compile::compile("let x = 5; x();", &program).unwrap();
        let mut vm = Vm::new(no_op_builtins());
        let err = vm.run(&bytecode).unwrap_err();
        assert!(err.message.contains("calling non-function"));
    }

    #[test]
    fn wrong_argument_count_is_a_runtime_error() {
        let program = monke_par::parse("let f = fn(a) { a }; f(1, 2);").unwrap();
        let bytecode = monke_compile::compile("let f = fn(a) { a }; f(1, 2);", &program).unwrap();
        let mut vm = Vm::new(no_op_builtins());
        let err = vm.run(&bytecode).unwrap_err();
        assert!(err.message.contains("wrong number of arguments"));
    }

    #[test]
    fn globals_persist_across_runs_on_the_same_vm() {
        // Each `monke_compile::compile` call starts a fresh symbol table
        // (the REPL driver keeps one `Compiler` alive across submissions
        // instead), so this only exercises the VM's own contract: the
        // globals vector itself must survive between `run` calls.
        let mut vm = Vm::new(no_op_builtins());

        let program1 = monke_par::parse("let x = 41;").unwrap();
        let bytecode1 = monke_compile::compile("let x = 41;", &program1).unwrap();
        vm.run(&bytecode1).unwrap();

        let program2 = monke_par::parse("1 + 1;").unwrap();
        let bytecode2 = monke_compile::compile("1 + 1;", &program2).unwrap();
        vm.run(&bytecode2).unwrap();

        assert!(matches!(vm.globals()[0], Object::Integer(41)));
    }

    #[test]
    fn require_runs_a_module_and_returns_its_last_value() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("monke_vm_test_require_{}.mk", std::process::id()));
        std::fs::write(&path, "let secret = 41; secret + 1;").unwrap();

        let source = format!(r#"require("{}");"#, path.to_string_lossy());
        let vm = run(&source);
        assert!(matches!(vm.last_popped(), Object::Integer(42)));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn require_of_missing_file_is_an_error_object_not_a_fatal_abort() {
        let vm = run(r#"require("/nonexistent/path/does_not_exist.mk");"#);
        assert!(matches!(vm.last_popped(), Object::Error(_)));
    }

    #[test]
    fn require_caches_an_unchanged_module() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("monke_vm_test_require_cache_{}.mk", std::process::id()));
        std::fs::write(&path, "1;").unwrap();

        let source = format!(r#"require("{}"); require("{}");"#, path.to_string_lossy(), path.to_string_lossy());
        let vm = run(&source);
        assert!(matches!(vm.last_popped(), Object::Integer(1)));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn builtin_call_reaches_the_supplied_function() {
        fn double(_vm: &mut Vm, args: &[Object]) -> Object {
            match args[0] {
                Object::Integer(v) => Object::Integer(v * 2),
                other => other,
            }
        }
        let mut builtins = no_op_builtins();
        builtins[0] = double; // "len" slot, repurposed for this test

        let program = monke_par::parse("len(21);").unwrap();
        let bytecode = monke_compile::compile("len(21);", &program).unwrap();
        let mut vm = Vm::new(builtins);
        vm.run(&bytecode).unwrap();
        assert!(matches!(vm.last_popped(), Object::Integer(42)));
    }
}
