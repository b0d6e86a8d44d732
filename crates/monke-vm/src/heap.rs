//! Allocation and mark-and-sweep collection (spec.md §4.7, §5).
//!
//! `monke_obj::gc` defines the header and handle shapes but deliberately
//! never allocates — the VM is the heap's sole owner, so every `Gc<T>`
//! in the system is born here. Each `GcBox<T>` is linked into a single
//! intrusive list via its header; sweeping walks that list once,
//! dropping anything left unmarked.

use std::cell::Cell;
use std::ptr::NonNull;

use monke_obj::gc::{GcBox, GcHeader, GcKind};
use monke_obj::{ClosureObj, Object, Table};

/// Bytes charged against `bytes_until_gc` per allocation before a
/// collection is forced (spec.md §4.7: initial value 1024, same reset
/// value after every collection).
const GC_THRESHOLD: i64 = 1024;

pub struct Heap {
    head: Option<NonNull<GcHeader>>,
    bytes_until_gc: i64,
}

impl Heap {
    pub fn new() -> Self {
        Self { head: None, bytes_until_gc: GC_THRESHOLD }
    }

    pub fn needs_gc(&self) -> bool {
        self.bytes_until_gc <= 0
    }

    fn header_ptr<T>(ptr: NonNull<GcBox<T>>) -> NonNull<GcHeader> {
        unsafe { NonNull::new_unchecked(ptr.as_ptr() as *mut GcHeader) }
    }

    fn alloc<T>(&mut self, kind: GcKind, value: T, charge: usize) -> NonNull<GcBox<T>> {
        let boxed = Box::new(GcBox {
            header: GcHeader { kind, marked: Cell::new(false), next: Cell::new(None) },
            value,
        });
        let ptr = unsafe { NonNull::new_unchecked(Box::into_raw(boxed)) };
        let header = Self::header_ptr(ptr);
        unsafe { header.as_ref().next.set(self.head) };
        self.head = Some(header);
        self.bytes_until_gc -= charge as i64;
        ptr
    }

    pub fn alloc_string(&mut self, value: String) -> monke_obj::Gc<String> {
        let charge = std::mem::size_of::<GcBox<String>>() + value.len();
        let ptr = self.alloc(GcKind::String, value, charge);
        unsafe { monke_obj::Gc::from_raw(ptr) }
    }

    pub fn alloc_error(&mut self, message: String) -> monke_obj::Gc<String> {
        let charge = std::mem::size_of::<GcBox<String>>() + message.len();
        let ptr = self.alloc(GcKind::Error, message, charge);
        unsafe { monke_obj::Gc::from_raw(ptr) }
    }

    pub fn alloc_array(&mut self, value: Vec<Object>) -> monke_obj::Gc<Vec<Object>> {
        let charge = std::mem::size_of::<GcBox<Vec<Object>>>() + value.len() * std::mem::size_of::<Object>();
        let ptr = self.alloc(GcKind::Array, value, charge);
        unsafe { monke_obj::Gc::from_raw(ptr) }
    }

    pub fn alloc_table(&mut self, value: Table) -> monke_obj::Gc<Table> {
        let charge = std::mem::size_of::<GcBox<Table>>() + value.len() * std::mem::size_of::<Object>() * 2;
        let ptr = self.alloc(GcKind::Table, value, charge);
        unsafe { monke_obj::Gc::from_raw(ptr) }
    }

    pub fn alloc_closure(&mut self, value: ClosureObj) -> monke_obj::Gc<ClosureObj> {
        let charge = std::mem::size_of::<GcBox<ClosureObj>>() + value.free.len() * std::mem::size_of::<Object>();
        let ptr = self.alloc(GcKind::Closure, value, charge);
        unsafe { monke_obj::Gc::from_raw(ptr) }
    }

    /// Marks everything reachable from `roots`, sweeps whatever is left
    /// unmarked, and resets the byte counter (spec.md §4.7).
    pub fn collect<'a>(&mut self, roots: impl Iterator<Item = &'a Object>) {
        for root in roots {
            mark_object(root);
        }
        self.sweep();
        self.bytes_until_gc = GC_THRESHOLD;
    }

    fn sweep(&mut self) {
        let mut current = self.head;
        let mut new_head = None;
        while let Some(header_ptr) = current {
            let header = unsafe { header_ptr.as_ref() };
            let next = header.next.get();
            if header.marked.get() {
                header.marked.set(false);
                header.next.set(new_head);
                new_head = Some(header_ptr);
            } else {
                unsafe { free_header(header_ptr) };
            }
            current = next;
        }
        self.head = new_head;
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        let mut current = self.head;
        while let Some(header_ptr) = current {
            let next = unsafe { header_ptr.as_ref().next.get() };
            unsafe { free_header(header_ptr) };
            current = next;
        }
    }
}

/// Marks `header_ptr` and, recursively, every object it references —
/// the downcast from the type-erased header back to a concrete
/// `GcBox<T>` is driven by `GcKind`, the one tag every header carries.
///
/// # Safety
/// `header_ptr` must point at the header of a live `GcBox<T>` matching
/// its `kind` tag, which holds for every header reachable from `Heap`'s
/// intrusive list.
unsafe fn mark_header(header_ptr: NonNull<GcHeader>) {
    let header = header_ptr.as_ref();
    if header.marked.get() {
        return;
    }
    header.marked.set(true);

    match header.kind {
        GcKind::String | GcKind::Error => {}
        GcKind::Array => {
            let b = header_ptr.as_ptr() as *mut GcBox<Vec<Object>>;
            for item in &(*b).value {
                mark_object(item);
            }
        }
        GcKind::Table => {
            let b = header_ptr.as_ptr() as *mut GcBox<Table>;
            for (key, value) in (*b).value.iter() {
                mark_object(key);
                mark_object(value);
            }
        }
        GcKind::Closure => {
            let b = header_ptr.as_ptr() as *mut GcBox<ClosureObj>;
            for item in &(*b).value.free {
                mark_object(item);
            }
        }
    }
}

fn mark_object(object: &Object) {
    match object {
        Object::String(g) | Object::Error(g) => unsafe { mark_header(g.as_header_ptr()) },
        Object::Array(g) => unsafe { mark_header(g.as_header_ptr()) },
        Object::Table(g) => unsafe { mark_header(g.as_header_ptr()) },
        Object::Closure(g) => unsafe { mark_header(g.as_header_ptr()) },
        Object::Null | Object::Integer(_) | Object::Float(_) | Object::Boolean(_) | Object::BuiltinFunction(_) => {}
    }
}

/// # Safety
/// `header_ptr` must match the `GcKind` it was allocated with and must
/// not be reachable from any live `Gc<T>` handle after this call.
unsafe fn free_header(header_ptr: NonNull<GcHeader>) {
    match header_ptr.as_ref().kind {
        GcKind::String | GcKind::Error => {
            drop(Box::from_raw(header_ptr.as_ptr() as *mut GcBox<String>));
        }
        GcKind::Array => {
            drop(Box::from_raw(header_ptr.as_ptr() as *mut GcBox<Vec<Object>>));
        }
        GcKind::Table => {
            drop(Box::from_raw(header_ptr.as_ptr() as *mut GcBox<Table>));
        }
        GcKind::Closure => {
            drop(Box::from_raw(header_ptr.as_ptr() as *mut GcBox<ClosureObj>));
        }
    }
}
