//! The bytecode interpreter (spec.md §4.7): a stack machine driven by a
//! fetch-decode-execute loop over one or more call frames.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::SystemTime;

use monke_code::{CompiledFunction, Opcode};
use monke_compile::{Bytecode, Constant, BUILTIN_NAMES, REQUIRE_BUILTIN_INDEX};
use monke_obj::{BuiltinFunction, ClosureObj, Gc, Object, Table};

use crate::error::{RuntimeError, TraceEntry};
use crate::frame::Frame;
use crate::heap::Heap;

pub const STACK_SIZE: usize = 2048;
pub const MAX_FRAMES: usize = 1024;

/// A native function slot (spec.md §1, §6). Builtins read their
/// arguments and, for anything that allocates (a new array, a new
/// error), go through the `Vm`'s own allocator so the result is
/// tracked by the GC like any other heap value. Errors are ordinary
/// `Object::Error` return values, never a fatal abort (spec.md §7).
///
/// The table passed to `Vm::new` must still reserve a slot for
/// `REQUIRE_BUILTIN_INDEX`, but `require` itself is handled natively by
/// the VM (it needs to recursively run compiled bytecode and keep a
/// module cache, neither of which a bare function pointer can do) — the
/// slot's entry is never actually called.
pub type BuiltinFn = fn(&mut Vm, &[Object]) -> Object;

/// Grants temporary, unchecked mutable access to a GC-managed value.
///
/// # Safety
/// Sound only under the single-threaded, run-to-completion model of
/// spec.md §5: a builtin (the only caller of this) finishes before the
/// VM resumes, and nothing else observes the object mid-mutation. The
/// caller must not retain the returned borrow past the current
/// builtin call, and must not alias it with another live reference
/// into the same allocation for that duration.
pub unsafe fn gc_value_mut<T>(gc: &Gc<T>) -> &mut T {
    &mut (*gc.as_ptr()).value
}

/// A `require`d module's cached result (spec.md §6), keyed by resolved
/// path. Grounded in the original module loader, which keeps this
/// table as part of the VM's own session state and only recompiles a
/// module once its file's mtime advances past what was last observed.
struct CachedModule {
    mtime: SystemTime,
    result: Object,
}

pub struct Vm {
    constants: Vec<Constant>,
    stack: Vec<Object>,
    sp: usize,
    globals: Vec<Object>,
    frames: Vec<Frame>,
    last_popped: Object,
    heap: Heap,
    builtins: Vec<BuiltinFn>,
    modules: HashMap<PathBuf, CachedModule>,
}

impl Vm {
    /// `builtins` must be indexed exactly as the compiler assigns
    /// builtin slots: `monke_compile::BUILTIN_NAMES` order, then
    /// `REQUIRE_BUILTIN_INDEX` for `require` (spec.md §1, §6).
    pub fn new(builtins: Vec<BuiltinFn>) -> Self {
        assert_eq!(
            builtins.len(),
            BUILTIN_NAMES.len() + 1,
            "builtins table must cover every named builtin plus the reserved require slot"
        );
        Self {
            constants: Vec::new(),
            stack: vec![Object::Null; STACK_SIZE],
            sp: 0,
            globals: Vec::new(),
            frames: Vec::new(),
            last_popped: Object::Null,
            heap: Heap::new(),
            builtins,
            modules: HashMap::new(),
        }
    }

    /// The last value popped off the stack — an expression statement's
    /// result, surfaced for REPL display (spec.md §4.7, §6).
    pub fn last_popped(&self) -> Object {
        self.last_popped
    }

    pub fn globals(&self) -> &[Object] {
        &self.globals
    }

    /// Runs `bytecode` as a fresh top-level program on this VM. Globals
    /// and the heap persist across calls so the REPL and module loader
    /// can keep submitting new top-level code against the same session
    /// (spec.md §6).
    pub fn run(&mut self, bytecode: &Bytecode) -> Result<(), RuntimeError> {
        self.constants = bytecode.constants.clone();

        let main_fn = Rc::new(CompiledFunction {
            instructions: bytecode.instructions.clone(),
            num_locals: 0,
            num_parameters: 0,
            source_lines: bytecode.source_lines.clone(),
            name: None,
        });
        let main_closure = self.heap.alloc_closure(ClosureObj { function: main_fn, free: Vec::new() });

        self.sp = 0;
        self.frames.clear();
        self.frames.push(Frame::new(main_closure, 0));

        self.execute(0).map_err(|mut err| {
            err.trace = self.capture_trace();
            err
        })
    }

    /// Allocates a closure directly, for callers (the module loader)
    /// that need to build and run a closure without going through
    /// `Opcode::Closure` (spec.md §6).
    pub fn alloc_closure(&mut self, function: Rc<CompiledFunction>, free: Vec<Object>) -> Gc<ClosureObj> {
        self.maybe_collect();
        self.heap.alloc_closure(ClosureObj { function, free })
    }

    /// Runs a zero-argument `closure` compiled with its own `constants`
    /// pool as a nested frame atop the currently executing call stack,
    /// without disturbing any frame below it, and returns the value it
    /// last popped. Used by `require` (spec.md §6) to execute a loaded
    /// module from inside an already-running builtin call — unlike
    /// `run`, this never clears the caller's frames or stack pointer.
    pub fn call_nested(&mut self, closure: Gc<ClosureObj>, constants: Vec<Constant>) -> Result<Object, RuntimeError> {
        let stop_depth = self.frames.len();
        let saved_sp = self.sp;
        let saved_constants = std::mem::replace(&mut self.constants, constants);

        self.frames.push(Frame::new(closure, self.sp));
        let result = self.execute(stop_depth);

        self.constants = saved_constants;
        self.frames.truncate(stop_depth);
        self.sp = saved_sp;

        result.map(|_| self.last_popped)
    }

    fn capture_trace(&self) -> Vec<TraceEntry> {
        self.frames
            .iter()
            .rev()
            .map(|frame| TraceEntry {
                function_name: frame.closure.function.name.clone(),
                line: frame.closure.function.line_for(frame.ip.max(0) as usize),
            })
            .collect()
    }

    fn fatal(&self, message: impl Into<String>) -> RuntimeError {
        RuntimeError::new(message)
    }

    fn push(&mut self, obj: Object) -> Result<(), RuntimeError> {
        if self.sp >= STACK_SIZE {
            return Err(self.fatal("stack overflow"));
        }
        self.stack[self.sp] = obj;
        self.sp += 1;
        Ok(())
    }

    fn pop(&mut self) -> Object {
        self.sp -= 1;
        self.stack[self.sp]
    }

    fn maybe_collect(&mut self) {
        if !self.heap.needs_gc() {
            return;
        }
        let mut roots: Vec<Object> = Vec::with_capacity(self.sp + self.globals.len() + self.frames.len());
        roots.extend(self.stack[..self.sp].iter().copied());
        roots.extend(self.globals.iter().copied());
        for frame in &self.frames {
            roots.push(Object::Closure(frame.closure));
        }
        self.heap.collect(roots.iter());
    }

    pub fn alloc_string(&mut self, value: String) -> Object {
        self.maybe_collect();
        Object::String(self.heap.alloc_string(value))
    }

    pub fn alloc_error(&mut self, message: impl Into<String>) -> Object {
        self.maybe_collect();
        Object::Error(self.heap.alloc_error(message.into()))
    }

    pub fn alloc_array(&mut self, items: Vec<Object>) -> Object {
        self.maybe_collect();
        Object::Array(self.heap.alloc_array(items))
    }

    pub fn alloc_table(&mut self, table: Table) -> Object {
        self.maybe_collect();
        Object::Table(self.heap.alloc_table(table))
    }

    /// Runs frames until the frame stack unwinds back to `stop_depth`.
    /// `stop_depth` is 0 for a top-level `run`, or the pre-push frame
    /// count for a `call_nested` invocation — either way, the frame
    /// that starts execution here is the only one allowed to end by
    /// running off its own instructions rather than an explicit return.
    fn execute(&mut self, stop_depth: usize) -> Result<(), RuntimeError> {
        loop {
            let frame_idx = self.frames.len() - 1;
            self.frames[frame_idx].ip += 1;
            let ip = self.frames[frame_idx].ip as usize;

            let (op, operands, operand_width) = {
                let ins = &self.frames[frame_idx].instructions().0;
                if ip >= ins.len() {
                    (None, Vec::new(), 0)
                } else {
                    let op = Opcode::from_byte(ins[ip]);
                    let def = op.definition();
                    let (operands, read) = monke_code::read_operands(&def, &ins[ip + 1..]);
                    (Some(op), operands, read)
                }
            };

            let Some(op) = op else {
                if self.frames.len() == stop_depth + 1 {
                    return Ok(());
                }
                return Err(self.fatal("function fell off its end without returning"));
            };
            self.frames[frame_idx].ip += operand_width as isize;

            match op {
                Opcode::Constant => {
                    let constant = self.constants[operands[0]].clone();
                    let obj = self.load_constant(constant);
                    self.push(obj)?;
                }
                Opcode::Pop => {
                    self.last_popped = self.pop();
                }
                Opcode::True => self.push(Object::Boolean(true))?,
                Opcode::False => self.push(Object::Boolean(false))?,
                Opcode::Null => self.push(Object::Null)?,
                Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div => self.execute_binary_op(op)?,
                Opcode::Equal | Opcode::NotEqual | Opcode::GreaterThan => self.execute_comparison(op)?,
                Opcode::Bang => {
                    let operand = self.pop();
                    self.push(Object::Boolean(!operand.is_truthy()))?;
                }
                Opcode::Minus => {
                    let operand = self.pop();
                    let result = match operand {
                        Object::Integer(v) => Object::Integer(
                            v.checked_neg().ok_or_else(|| self.fatal("integer overflow"))?,
                        ),
                        Object::Float(v) => Object::Float(-v),
                        other => return Err(self.fatal(format!("unsupported type for negation: {}", other.type_name()))),
                    };
                    self.push(result)?;
                }
                Opcode::JumpNotTruthy => {
                    let condition = self.pop();
                    if !condition.is_truthy() {
                        self.frames[frame_idx].ip = operands[0] as isize - 1;
                    }
                }
                Opcode::Jump => {
                    self.frames[frame_idx].ip = operands[0] as isize - 1;
                }
                Opcode::GetGlobal => {
                    let idx = operands[0];
                    self.push(self.globals.get(idx).copied().unwrap_or(Object::Null))?;
                }
                Opcode::SetGlobal => {
                    let idx = operands[0];
                    let value = self.pop();
                    if idx >= self.globals.len() {
                        self.globals.resize(idx + 1, Object::Null);
                    }
                    self.globals[idx] = value;
                }
                Opcode::GetLocal => {
                    let idx = operands[0];
                    let bp = self.frames[frame_idx].base_pointer;
                    self.push(self.stack[bp + idx])?;
                }
                Opcode::SetLocal => {
                    let idx = operands[0];
                    let bp = self.frames[frame_idx].base_pointer;
                    let value = self.pop();
                    self.stack[bp + idx] = value;
                }
                Opcode::GetFree => {
                    let idx = operands[0];
                    let obj = self.frames[frame_idx].closure.free[idx];
                    self.push(obj)?;
                }
                Opcode::GetBuiltin => {
                    let idx = operands[0];
                    let name = if idx == REQUIRE_BUILTIN_INDEX { "require" } else { BUILTIN_NAMES[idx] };
                    self.push(Object::BuiltinFunction(BuiltinFunction { index: idx, name }))?;
                }
                Opcode::Array => {
                    let n = operands[0];
                    let items = self.stack[self.sp - n..self.sp].to_vec();
                    self.sp -= n;
                    let obj = self.alloc_array(items);
                    self.push(obj)?;
                }
                Opcode::Table => {
                    let n = operands[0];
                    let start = self.sp - n;
                    let mut table = Table::new();
                    let mut i = start;
                    while i < self.sp {
                        let key = self.stack[i];
                        let value = self.stack[i + 1];
                        table.insert(key, value).map_err(|e| self.fatal(e))?;
                        i += 2;
                    }
                    self.sp -= n;
                    let obj = self.alloc_table(table);
                    self.push(obj)?;
                }
                Opcode::Index => {
                    let index = self.pop();
                    let container = self.pop();
                    let result = self.execute_index(container, index)?;
                    self.push(result)?;
                }
                Opcode::SetIndex => {
                    let value = self.pop();
                    let index = self.pop();
                    let container = self.pop();
                    self.execute_set_index(container, index, value)?;
                }
                Opcode::Call => {
                    let num_args = operands[0];
                    self.execute_call(num_args)?;
                    continue;
                }
                Opcode::ReturnValue => {
                    let return_value = self.pop();
                    let frame = self.frames.pop().expect("at least the main frame");
                    self.sp = frame.base_pointer - 1;
                    self.push(return_value)?;
                }
                Opcode::Return => {
                    let frame = self.frames.pop().expect("at least the main frame");
                    self.sp = frame.base_pointer - 1;
                    self.push(Object::Null)?;
                }
                Opcode::Closure => {
                    let (fn_idx, num_free) = (operands[0], operands[1]);
                    let function = match &self.constants[fn_idx] {
                        Constant::CompiledFunction(f) => f.clone(),
                        _ => return Err(self.fatal("constant at closure index is not a function")),
                    };
                    self.maybe_collect();
                    let free = self.stack[self.sp - num_free..self.sp].to_vec();
                    self.sp -= num_free;
                    let gc = self.heap.alloc_closure(ClosureObj { function, free });
                    self.push(Object::Closure(gc))?;
                }
                Opcode::CurrentClosure => {
                    let closure = self.frames[frame_idx].closure;
                    self.push(Object::Closure(closure))?;
                }
            }
        }
    }

    fn load_constant(&mut self, constant: Constant) -> Object {
        match constant {
            Constant::Integer(v) => Object::Integer(v),
            Constant::Float(v) => Object::Float(v),
            Constant::Str(s) => self.alloc_string(s),
            Constant::CompiledFunction(_) => {
                unreachable!("function constants are only loaded through OpClosure")
            }
        }
    }

    fn execute_call(&mut self, num_args: usize) -> Result<(), RuntimeError> {
        let callee = self.stack[self.sp - 1 - num_args];
        match callee {
            Object::Closure(closure) => {
                if num_args != closure.function.num_parameters {
                    return Err(self.fatal(format!(
                        "wrong number of arguments: want={}, got={}",
                        closure.function.num_parameters, num_args
                    )));
                }
                if self.frames.len() >= MAX_FRAMES {
                    return Err(self.fatal("stack overflow"));
                }
                let base_pointer = self.sp - num_args;
                self.sp = base_pointer + closure.function.num_locals;
                if self.sp > STACK_SIZE {
                    return Err(self.fatal("stack overflow"));
                }
                self.frames.push(Frame::new(closure, base_pointer));
                Ok(())
            }
            Object::BuiltinFunction(b) => {
                let args = self.stack[self.sp - num_args..self.sp].to_vec();
                let result = if b.index == REQUIRE_BUILTIN_INDEX {
                    self.execute_require(&args)
                } else {
                    (self.builtins[b.index])(self, &args)
                };
                self.sp -= num_args + 1;
                self.push(result)
            }
            other => Err(self.fatal(format!("calling non-function: {}", other.type_name()))),
        }
    }

    /// Loads and runs a module by path (spec.md §6). The compiler only
    /// ever emits this call with a single string-literal argument, so
    /// anything else reaching here is an internal inconsistency; still,
    /// like every other builtin, failures come back as an `Object::Error`
    /// rather than aborting the running program.
    fn execute_require(&mut self, args: &[Object]) -> Object {
        let path = match args.first() {
            Some(Object::String(s)) => s.as_str().to_string(),
            _ => return self.alloc_error("require: expected a string path"),
        };

        let resolved = PathBuf::from(&path);
        let mtime = match fs::metadata(&resolved).and_then(|m| m.modified()) {
            Ok(mtime) => mtime,
            Err(e) => return self.alloc_error(format!("require: cannot stat {}: {}", path, e)),
        };

        if let Some(cached) = self.modules.get(&resolved) {
            if cached.mtime >= mtime {
                return cached.result;
            }
        }

        let source = match fs::read_to_string(&resolved) {
            Ok(source) => source,
            Err(e) => return self.alloc_error(format!("require: cannot read {}: {}", path, e)),
        };
        let program = match monke_par::parse(&source) {
            Ok(program) => program,
            Err(errors) => {
                let message = errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; ");
                return self.alloc_error(format!("require: {}: {}", path, message));
            }
        };
        let bytecode: Bytecode = match monke_compile::compile(&source, &program) {
            Ok(bytecode) => bytecode,
            Err(e) => return self.alloc_error(format!("require: {}: {}", path, e)),
        };

        let module_fn = Rc::new(CompiledFunction {
            instructions: bytecode.instructions,
            num_locals: 0,
            num_parameters: 0,
            source_lines: bytecode.source_lines,
            name: Some(path.clone()),
        });
        let closure = self.alloc_closure(module_fn, Vec::new());

        let result = match self.call_nested(closure, bytecode.constants) {
            Ok(value) => value,
            Err(e) => return self.alloc_error(format!("require: {}: {}", path, e.message)),
        };

        self.modules.insert(resolved, CachedModule { mtime, result });
        result
    }

    fn execute_binary_op(&mut self, op: Opcode) -> Result<(), RuntimeError> {
        let right = self.pop();
        let left = self.pop();
        let result = match (left, right) {
            (Object::Integer(l), Object::Integer(r)) => {
                let v = match op {
                    Opcode::Add => l.checked_add(r),
                    Opcode::Sub => l.checked_sub(r),
                    Opcode::Mul => l.checked_mul(r),
                    Opcode::Div => {
                        if r == 0 {
                            return Err(self.fatal("division by zero"));
                        }
                        l.checked_div(r)
                    }
                    _ => unreachable!(),
                };
                Object::Integer(v.ok_or_else(|| self.fatal("integer overflow"))?)
            }
            (Object::Integer(_), Object::Float(_))
            | (Object::Float(_), Object::Integer(_))
            | (Object::Float(_), Object::Float(_)) => {
                let l = as_f64(left);
                let r = as_f64(right);
                if matches!(op, Opcode::Div) && r == 0.0 {
                    return Err(self.fatal("division by zero"));
                }
                Object::Float(match op {
                    Opcode::Add => l + r,
                    Opcode::Sub => l - r,
                    Opcode::Mul => l * r,
                    Opcode::Div => l / r,
                    _ => unreachable!(),
                })
            }
            (Object::String(l), Object::String(r)) if matches!(op, Opcode::Add) => {
                let mut combined = l.as_str().to_string();
                combined.push_str(r.as_str());
                self.alloc_string(combined)
            }
            (l, r) => return Err(self.fatal(binary_op_error(op, l, r))),
        };
        self.push(result)
    }

    fn execute_comparison(&mut self, op: Opcode) -> Result<(), RuntimeError> {
        let right = self.pop();
        let left = self.pop();

        if op == Opcode::GreaterThan {
            let result = match (left, right) {
                (Object::Integer(l), Object::Integer(r)) => l > r,
                (Object::Integer(_), Object::Float(_))
                | (Object::Float(_), Object::Integer(_))
                | (Object::Float(_), Object::Float(_)) => as_f64(left) > as_f64(right),
                (l, r) => return Err(self.fatal(binary_op_error(op, l, r))),
            };
            return self.push(Object::Boolean(result));
        }

        let eq = left.runtime_eq(&right);
        let result = if op == Opcode::Equal { eq } else { !eq };
        self.push(Object::Boolean(result))
    }

    fn execute_index(&mut self, container: Object, index: Object) -> Result<Object, RuntimeError> {
        match container {
            Object::Array(arr) => match index {
                Object::Integer(i) if i >= 0 && (i as usize) < arr.len() => Ok(arr[i as usize]),
                Object::Integer(_) => Ok(Object::Null),
                other => Err(self.fatal(format!("index operator not supported: Array[{}]", other.type_name()))),
            },
            Object::Table(table) => table
                .get(&index)
                .map(|v| v.copied().unwrap_or(Object::Null))
                .map_err(|e| self.fatal(e)),
            other => Err(self.fatal(format!("index operator not supported: {}", other.type_name()))),
        }
    }

    fn execute_set_index(&mut self, container: Object, index: Object, value: Object) -> Result<(), RuntimeError> {
        match container {
            Object::Array(arr) => match index {
                Object::Integer(i) if i >= 0 && (i as usize) < arr.len() => {
                    let slot = unsafe { gc_value_mut(&arr) };
                    slot[i as usize] = value;
                    Ok(())
                }
                Object::Integer(_) => Ok(()),
                other => Err(self.fatal(format!("index operator not supported: Array[{}]", other.type_name()))),
            },
            Object::Table(table) => {
                let t = unsafe { gc_value_mut(&table) };
                t.insert(index, value).map_err(|e| self.fatal(e))
            }
            other => Err(self.fatal(format!("index operator not supported: {}", other.type_name()))),
        }
    }
}

fn as_f64(obj: Object) -> f64 {
    match obj {
        Object::Integer(v) => v as f64,
        Object::Float(v) => v,
        _ => unreachable!("as_f64 called on a non-numeric object"),
    }
}

fn operator_symbol(op: Opcode) -> &'static str {
    match op {
        Opcode::Add => "+",
        Opcode::Sub => "-",
        Opcode::Mul => "*",
        Opcode::Div => "/",
        Opcode::GreaterThan => ">",
        Opcode::Equal => "==",
        Opcode::NotEqual => "!=",
        _ => "?",
    }
}

/// Same-kind operands with no defined operator are "unknown operator";
/// different kinds are always a "type mismatch" regardless of whether
/// either kind defines the operator (spec.md §8).
fn binary_op_error(op: Opcode, left: Object, right: Object) -> String {
    let (l, r) = (left.type_name(), right.type_name());
    let symbol = operator_symbol(op);
    if l == r {
        format!("unknown operator: {} {} {}", l, symbol, r)
    } else {
        format!("type mismatch: {} {} {}", l, symbol, r)
    }
}
