//! Storage of a running design: module variables, heap objects, and the
//! arithmetic on raw values.
use crate::errors::{SimError, SimResult};
use crate::runtime::{CoroutineId, Semaphore};
use ahash::{HashMap, HashMapExt};
use strobe_ir::{mask, BinOp, Edge, Id, UnOp};

/// `edge` happened when a value went from `old` to `new`.
pub fn edge_fired(edge: Edge, old: u64, new: u64) -> bool {
    let (old_bit, new_bit) = (old & 1, new & 1);
    match edge {
        Edge::Pos => old_bit == 0 && new_bit == 1,
        Edge::Neg => old_bit == 1 && new_bit == 0,
        Edge::Both => old_bit != new_bit,
        Edge::Any => old != new,
    }
}

/// Handle value that refers to nothing.
pub const NULL: u64 = 0;

/// A storage location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Variable of the top-level module.
    Global(Id),
    /// Member of a heap object.
    Field { obj: u64, field: Id },
    /// Automatic variable of one activation of a task or process.
    Local { frame: u64, name: Id },
}

/// Bits `lsb .. lsb + width` of `slot`, which is `full` bits wide.
#[derive(Debug, Clone, Copy)]
pub struct Location {
    pub slot: Slot,
    pub lsb: u64,
    pub width: u64,
    pub full: u64,
}

impl Location {
    pub fn whole(slot: Slot, width: u64) -> Self {
        Self {
            slot,
            lsb: 0,
            width,
            full: width,
        }
    }

    /// Write `value` into the selected bits of `old`.
    pub fn splice(&self, old: u64, value: u64) -> u64 {
        if self.lsb >= 64 {
            return old;
        }
        let bits = mask(u64::MAX, self.width) << self.lsb;
        mask((old & !bits) | ((value << self.lsb) & bits), self.full)
    }
}

/// Values and widths of the variables of the top-level module.
#[derive(Debug)]
pub struct Store {
    values: HashMap<Id, u64>,
    widths: HashMap<Id, u64>,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            values: HashMap::new(),
            widths: HashMap::new(),
        }
    }
}

impl Store {
    pub fn declare(&mut self, name: Id, width: u64, init: u64) {
        self.widths.insert(name, width);
        self.values.insert(name, mask(init, width));
    }

    pub fn contains(&self, name: Id) -> bool {
        self.values.contains_key(&name)
    }

    pub fn get(&self, name: Id) -> SimResult<u64> {
        self.values
            .get(&name)
            .copied()
            .ok_or_else(|| SimError::UnknownVariable(name).into())
    }

    pub fn set(&mut self, name: Id, value: u64) -> SimResult<()> {
        let width = *self
            .widths
            .get(&name)
            .ok_or(SimError::UnknownVariable(name))?;
        self.values.insert(name, mask(value, width));
        Ok(())
    }
}

/// Something a handle can point to.
#[derive(Debug)]
pub enum Object {
    /// Instance of a class or interface.
    Instance {
        class: Id,
        fields: HashMap<Id, u64>,
    },
    Semaphore(Semaphore),
}

/// Objects allocated by `new` and by the elaboration of interfaces and
/// semaphores. Objects are never freed.
#[derive(Debug, Default)]
pub struct Heap {
    objects: Vec<Object>,
}

impl Heap {
    pub fn alloc(&mut self, obj: Object) -> u64 {
        self.objects.push(obj);
        self.objects.len() as u64
    }

    fn index(&self, handle: u64) -> Option<usize> {
        let idx = usize::try_from(handle).ok()?.checked_sub(1)?;
        (idx < self.objects.len()).then_some(idx)
    }

    pub fn get(&self, handle: u64) -> Option<&Object> {
        self.index(handle).map(|idx| &self.objects[idx])
    }

    pub fn get_mut(&mut self, handle: u64) -> Option<&mut Object> {
        self.index(handle).map(|idx| &mut self.objects[idx])
    }

    /// Class of the instance `handle` points to.
    pub fn class_of(&self, handle: u64) -> Option<Id> {
        match self.get(handle)? {
            Object::Instance { class, .. } => Some(*class),
            Object::Semaphore(_) => None,
        }
    }

    pub fn has_field(&self, handle: u64, field: Id) -> bool {
        matches!(self.get(handle), Some(Object::Instance { fields, .. }) if fields.contains_key(&field))
    }

    pub fn field(&self, handle: u64, field: Id) -> Option<u64> {
        match self.get(handle)? {
            Object::Instance { fields, .. } => fields.get(&field).copied(),
            Object::Semaphore(_) => None,
        }
    }

    pub fn set_field(&mut self, handle: u64, field: Id, value: u64) -> bool {
        match self.get_mut(handle) {
            Some(Object::Instance { fields, .. }) => match fields.get_mut(&field) {
                Some(v) => {
                    *v = value;
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    pub fn semaphore_mut(&mut self, handle: u64) -> Option<&mut Semaphore> {
        match self.get_mut(handle)? {
            Object::Semaphore(s) => Some(s),
            Object::Instance { .. } => None,
        }
    }

    /// Drop queued semaphore requests of a killed coroutine.
    pub fn cancel_waiter(&mut self, co: CoroutineId) {
        for obj in &mut self.objects {
            if let Object::Semaphore(s) = obj {
                s.cancel(co);
            }
        }
    }
}

pub fn unary(op: UnOp, v: u64, width: u64) -> u64 {
    match op {
        UnOp::Not => mask(!v, width),
        UnOp::LogNot => (v == 0) as u64,
    }
}

/// Apply `op` and truncate the result to `width` bits. Operands are
/// unsigned.
pub fn binary(op: BinOp, l: u64, r: u64, width: u64) -> u64 {
    let res = match op {
        BinOp::Add => l.wrapping_add(r),
        BinOp::Sub => l.wrapping_sub(r),
        BinOp::And => l & r,
        BinOp::Or => l | r,
        BinOp::Xor => l ^ r,
        BinOp::Shl => u32::try_from(r)
            .ok()
            .and_then(|r| l.checked_shl(r))
            .unwrap_or(0),
        BinOp::Shr => u32::try_from(r)
            .ok()
            .and_then(|r| l.checked_shr(r))
            .unwrap_or(0),
        BinOp::Eq => (l == r) as u64,
        BinOp::Neq => (l != r) as u64,
        BinOp::Lt => (l < r) as u64,
        BinOp::Le => (l <= r) as u64,
        BinOp::Gt => (l > r) as u64,
        BinOp::Ge => (l >= r) as u64,
        BinOp::LogAnd => (l != 0 && r != 0) as u64,
        BinOp::LogOr => (l != 0 || r != 0) as u64,
    };
    mask(res, width)
}

/// Append `value` below the bits accumulated so far.
pub fn concat(acc: u64, value: u64, width: u64) -> u64 {
    if width >= 64 {
        value
    } else {
        (acc << width) | mask(value, width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_wraps_to_width() {
        assert_eq!(binary(BinOp::Add, 0xf, 1, 4), 0);
        assert_eq!(binary(BinOp::Sub, 0, 1, 8), 0xff);
        assert_eq!(binary(BinOp::Shl, 1, 64, 64), 0);
        assert_eq!(binary(BinOp::Shr, 0x80, 7, 8), 1);
        assert_eq!(binary(BinOp::Lt, 3, 5, 1), 1);
        assert_eq!(unary(UnOp::Not, 0b1010, 4), 0b0101);
        assert_eq!(unary(UnOp::LogNot, 0b1010, 4), 0);
        assert_eq!(concat(concat(0, 0b10, 2), 0b011, 3), 0b10011);
    }

    #[test]
    fn splice_keeps_other_bits() {
        let loc = Location {
            slot: Slot::Global(Id::new("x")),
            lsb: 2,
            width: 3,
            full: 8,
        };
        assert_eq!(loc.splice(0b1111_1111, 0b010), 0b1110_1011);
        assert_eq!(loc.splice(0, 0xff), 0b0001_1100);
    }

    #[test]
    fn null_is_never_allocated() {
        let mut heap = Heap::default();
        let h = heap.alloc(Object::Semaphore(Semaphore::new(2)));
        assert_ne!(h, NULL);
        assert!(heap.get(NULL).is_none());
        assert!(heap.semaphore_mut(h).is_some());
        assert!(heap.class_of(h).is_none());
    }
}
