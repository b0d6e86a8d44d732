//! Runtime value representation (spec.md §3).

use std::fmt;
use std::rc::Rc;

use monke_code::CompiledFunction;

use crate::gc::Gc;
use crate::table::Table;

/// A closure pairs a compiled function with the free variables it
/// captured at creation time. The function itself lives in the
/// compiler's constant pool for the life of the VM and is never
/// GC-managed (spec.md §9) — shared here via `Rc`, not `Gc`.
pub struct ClosureObj {
    pub function: Rc<CompiledFunction>,
    pub free: Vec<Object>,
}

#[derive(Clone, Copy)]
pub struct BuiltinFunction {
    pub index: usize,
    pub name: &'static str,
}

/// A tagged runtime value. Integer/Float/Boolean/Null are plain values;
/// String/Array/Table/Closure/Error are handles into the GC heap, so
/// cloning an `Object` never copies the underlying payload (spec.md §3).
#[derive(Clone, Copy)]
pub enum Object {
    Null,
    Integer(i64),
    Float(f64),
    Boolean(bool),
    BuiltinFunction(BuiltinFunction),
    Error(Gc<String>),
    String(Gc<String>),
    Array(Gc<Vec<Object>>),
    Table(Gc<Table>),
    Closure(Gc<ClosureObj>),
}

impl Object {
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Integer(_) => "Integer",
            Object::Float(_) => "Float",
            Object::Boolean(_) => "Boolean",
            Object::BuiltinFunction(_) => "BuiltinFunction",
            Object::Error(_) => "Error",
            Object::String(_) => "String",
            Object::Array(_) => "Array",
            Object::Table(_) => "Table",
            Object::Closure(_) => "Closure",
        }
    }

    /// Truthiness: everything except `null` and `false` is truthy
    /// (spec.md §4.7).
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Object::Null | Object::Boolean(false))
    }

    /// `==` / `!=` operator semantics: bitwise for value kinds, byte
    /// compare for strings, element-wise and recursive for arrays,
    /// identity for tables and closures (spec.md §3). Unlike table-key
    /// comparison, float equality here is IEEE `==` (`NaN != NaN`).
    pub fn runtime_eq(&self, other: &Object) -> bool {
        match (self, other) {
            (Object::Null, Object::Null) => true,
            (Object::Integer(a), Object::Integer(b)) => a == b,
            (Object::Float(a), Object::Float(b)) => a == b,
            (Object::Boolean(a), Object::Boolean(b)) => a == b,
            (Object::String(a), Object::String(b)) => a.as_bytes() == b.as_bytes(),
            (Object::Array(a), Object::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.runtime_eq(y))
            }
            (Object::Table(a), Object::Table(b)) => a.ptr_eq(b),
            (Object::Closure(a), Object::Closure(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Null => write!(f, "null"),
            Object::Integer(v) => write!(f, "{}", v),
            Object::Float(v) => write!(f, "{}", v),
            Object::Boolean(v) => write!(f, "{}", v),
            Object::BuiltinFunction(b) => write!(f, "builtin function: {}", b.name),
            Object::Error(msg) => write!(f, "ERROR: {}", msg.as_str()),
            Object::String(s) => write!(f, "{}", s.as_str()),
            Object::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Object::Table(table) => {
                write!(f, "{{")?;
                for (i, (k, v)) in table.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            Object::Closure(c) => write!(f, "closure[{}]", c.function.num_parameters),
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.type_name(), self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_and_false_are_falsy() {
        assert!(!Object::Null.is_truthy());
        assert!(!Object::Boolean(false).is_truthy());
    }

    #[test]
    fn zero_is_truthy() {
        assert!(Object::Integer(0).is_truthy());
    }

    #[test]
    fn nan_is_not_equal_to_itself_under_runtime_eq() {
        let nan = Object::Float(f64::NAN);
        assert!(!nan.runtime_eq(&nan));
    }

    #[test]
    fn different_kinds_are_never_equal() {
        assert!(!Object::Integer(1).runtime_eq(&Object::Boolean(true)));
    }
}
