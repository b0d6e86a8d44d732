//! Native builtin functions (spec.md §1, §6): the fixed table installed
//! into `Vm::new` in `monke_compile::BUILTIN_NAMES` order. `require` is
//! handled natively by the VM itself and has no entry here.

use monke_obj::{Object, Table};
use monke_vm::{gc_value_mut, BuiltinFn, Vm};

/// Builds the builtin table in the order `Vm::new` expects: the named
/// builtins, then a reserved (never-called) slot for `require`.
pub fn builtins() -> Vec<BuiltinFn> {
    vec![len, puts, first, last, rest, push, exit, copy, unused_require_slot]
}

fn wrong_arg_count(vm: &mut Vm, name: &str, want: usize, got: usize) -> Object {
    vm.alloc_error(format!("builtin {}(): wrong number of arguments: want={}, got={}", name, want, got))
}

fn unsupported(vm: &mut Vm, name: &str, obj: Object) -> Object {
    vm.alloc_error(format!("builtin {}(): argument of {} not supported", name, obj.type_name()))
}

fn len(vm: &mut Vm, args: &[Object]) -> Object {
    if args.len() != 1 {
        return wrong_arg_count(vm, "len", 1, args.len());
    }
    match args[0] {
        Object::String(s) => Object::Integer(s.as_bytes().len() as i64),
        Object::Array(a) => Object::Integer(a.len() as i64),
        Object::Table(t) => Object::Integer(t.len() as i64),
        other => unsupported(vm, "len", other),
    }
}

fn puts(vm: &mut Vm, args: &[Object]) -> Object {
    let rendered: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    println!("{}", rendered.join(" "));
    let _ = vm;
    Object::Null
}

fn first(vm: &mut Vm, args: &[Object]) -> Object {
    if args.len() != 1 {
        return wrong_arg_count(vm, "first", 1, args.len());
    }
    match args[0] {
        Object::Array(a) => a.first().copied().unwrap_or(Object::Null),
        other => unsupported(vm, "first", other),
    }
}

fn last(vm: &mut Vm, args: &[Object]) -> Object {
    if args.len() != 1 {
        return wrong_arg_count(vm, "last", 1, args.len());
    }
    match args[0] {
        Object::Array(a) => a.last().copied().unwrap_or(Object::Null),
        other => unsupported(vm, "last", other),
    }
}

fn rest(vm: &mut Vm, args: &[Object]) -> Object {
    if args.len() != 1 {
        return wrong_arg_count(vm, "rest", 1, args.len());
    }
    match args[0] {
        Object::Array(a) => {
            if a.len() > 1 {
                let tail = a[1..].to_vec();
                vm.alloc_array(tail)
            } else {
                Object::Null
            }
        }
        other => unsupported(vm, "rest", other),
    }
}

/// Mutates the array argument in place and returns the same array
/// object (spec.md §1) — the one builtin that needs the GC's unchecked
/// interior-mutability escape hatch, since the array is shared with
/// whatever other binding still points at it.
fn push(vm: &mut Vm, args: &[Object]) -> Object {
    if args.len() != 2 {
        return wrong_arg_count(vm, "push", 2, args.len());
    }
    match args[0] {
        Object::Array(arr) => {
            unsafe { gc_value_mut(&arr) }.push(args[1]);
            args[0]
        }
        other => vm.alloc_error(format!(
            "builtin push() expects first argument to be Array, got {}",
            other.type_name()
        )),
    }
}

fn exit(_vm: &mut Vm, _args: &[Object]) -> Object {
    std::process::exit(0);
}

fn copy(vm: &mut Vm, args: &[Object]) -> Object {
    if args.len() != 1 {
        return wrong_arg_count(vm, "copy", 1, args.len());
    }
    deep_copy(vm, args[0])
}

fn deep_copy(vm: &mut Vm, obj: Object) -> Object {
    match obj {
        Object::Null | Object::Integer(_) | Object::Float(_) | Object::Boolean(_) | Object::BuiltinFunction(_) => obj,
        Object::String(s) => vm.alloc_string(s.as_str().to_string()),
        Object::Error(e) => vm.alloc_error(e.as_str().to_string()),
        Object::Array(arr) => {
            let copied: Vec<Object> = arr.iter().map(|item| deep_copy(vm, *item)).collect();
            vm.alloc_array(copied)
        }
        Object::Table(table) => {
            let pairs: Vec<(Object, Object)> = table.iter().map(|(k, v)| (*k, *v)).collect();
            let mut new_table = Table::new();
            for (key, value) in pairs {
                let key = deep_copy(vm, key);
                let value = deep_copy(vm, value);
                // Keys were already hashable in the source table; a
                // fresh copy of the same key variant always is too.
                new_table.insert(key, value).expect("copied key is hashable");
            }
            vm.alloc_table(new_table)
        }
        Object::Closure(_) => vm.alloc_error("builtin copy(): cannot copy a function"),
    }
}

/// `require` is dispatched natively inside `Vm::execute_call` before
/// this table is ever consulted; this stub exists only to keep the
/// builtins vector the length `Vm::new` asserts on.
fn unused_require_slot(vm: &mut Vm, _args: &[Object]) -> Object {
    vm.alloc_error("require is not a callable builtin")
}

#[cfg(test)]
mod tests {
    use super::*;
    use monke_vm::Vm;

    fn run(source: &str) -> Vm {
        let program = monke_par::parse(source).expect("parse error");
        let bytecode = monke_compile::compile(source, &program).expect("compile error");
        let mut vm = Vm::new(builtins());
        vm.run(&bytecode).expect("runtime error");
        vm
    }

    #[test]
    fn len_of_string_array_and_table() {
        let vm = run(r#"len("hello");"#);
        assert!(matches!(vm.last_popped(), Object::Integer(5)));
        let vm = run("len([1, 2, 3]);");
        assert!(matches!(vm.last_popped(), Object::Integer(3)));
        let vm = run(r#"len({"a": 1, "b": 2});"#);
        assert!(matches!(vm.last_popped(), Object::Integer(2)));
    }

    #[test]
    fn len_of_unsupported_type_is_an_error() {
        let vm = run("len(5);");
        assert!(matches!(vm.last_popped(), Object::Error(_)));
    }

    #[test]
    fn first_and_last_of_array() {
        let vm = run("first([1, 2, 3]);");
        assert!(matches!(vm.last_popped(), Object::Integer(1)));
        let vm = run("last([1, 2, 3]);");
        assert!(matches!(vm.last_popped(), Object::Integer(3)));
    }

    #[test]
    fn first_and_last_of_empty_array_is_null() {
        let vm = run("first([]);");
        assert!(matches!(vm.last_popped(), Object::Null));
        let vm = run("last([]);");
        assert!(matches!(vm.last_popped(), Object::Null));
    }

    #[test]
    fn rest_drops_the_first_element() {
        let vm = run("rest([1, 2, 3]);");
        match vm.last_popped() {
            Object::Array(a) => {
                let ints: Vec<i64> = a.iter().map(|o| match o {
                    Object::Integer(v) => *v,
                    other => panic!("expected integer, got {:?}", other),
                }).collect();
                assert_eq!(ints, vec![2, 3]);
            }
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn rest_of_single_element_array_is_null() {
        let vm = run("rest([1]);");
        assert!(matches!(vm.last_popped(), Object::Null));
    }

    #[test]
    fn push_mutates_the_array_in_place() {
        let vm = run("let a = [1, 2]; push(a, 3); a;");
        match vm.last_popped() {
            Object::Array(a) => {
                let ints: Vec<i64> = a.iter().map(|o| match o {
                    Object::Integer(v) => *v,
                    other => panic!("expected integer, got {:?}", other),
                }).collect();
                assert_eq!(ints, vec![1, 2, 3]);
            }
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn push_onto_a_non_array_is_an_error() {
        let vm = run("push(5, 1);");
        assert!(matches!(vm.last_popped(), Object::Error(_)));
    }

    #[test]
    fn copy_produces_a_deep_copy_of_an_array() {
        let vm = run("let a = [1, 2]; let b = copy(a); push(b, 3); len(a);");
        assert!(matches!(vm.last_popped(), Object::Integer(2)));
    }
}
