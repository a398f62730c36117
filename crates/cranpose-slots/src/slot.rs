//! Slot values.

use std::any::{type_name, Any};
use std::fmt;
use std::rc::Rc;

/// Opaque value stored in a slot.
///
/// Values are reference counted so a writer can keep the previous table
/// around for rollback without copying payloads. Identity, not equality, is
/// what the table tracks: two values are "the same" only when they share the
/// allocation.
#[derive(Clone)]
pub struct SlotValue {
    value: Rc<dyn Any>,
    type_name: &'static str,
}

impl SlotValue {
    pub fn new<T: 'static>(value: T) -> Self {
        Self::from_rc(Rc::new(value))
    }

    pub fn from_rc<T: 'static>(value: Rc<T>) -> Self {
        Self {
            value,
            type_name: type_name::<T>(),
        }
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.value.is::<T>()
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    pub fn downcast_rc<T: 'static>(&self) -> Option<Rc<T>> {
        Rc::clone(&self.value).downcast::<T>().ok()
    }

    pub fn ptr_eq(&self, other: &SlotValue) -> bool {
        Rc::ptr_eq(&self.value, &other.value)
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Number of live handles to the payload, the table's own included.
    pub fn strong_count(&self) -> usize {
        Rc::strong_count(&self.value)
    }
}

impl fmt::Debug for SlotValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        macro_rules! show {
            ($($ty:ty),*) => {
                $(if let Some(value) = self.value.downcast_ref::<$ty>() {
                    return write!(f, "{:?}", value);
                })*
            };
        }
        show!(i32, i64, u32, u64, usize, bool, char, f32, f64, String, &'static str);
        write!(f, "<{}>", self.type_name)
    }
}

/// One positional cell owned by a group.
#[derive(Clone, Default)]
pub enum Slot {
    /// Marker for a slot that holds nothing yet.
    #[default]
    Empty,
    Value(SlotValue),
}

impl Slot {
    pub fn value<T: 'static>(value: T) -> Self {
        Slot::Value(SlotValue::new(value))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }

    pub fn as_value(&self) -> Option<&SlotValue> {
        match self {
            Slot::Value(value) => Some(value),
            Slot::Empty => None,
        }
    }

    pub fn into_value(self) -> Option<SlotValue> {
        match self {
            Slot::Value(value) => Some(value),
            Slot::Empty => None,
        }
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.as_value().and_then(SlotValue::downcast_ref)
    }

    pub fn downcast_rc<T: 'static>(&self) -> Option<Rc<T>> {
        self.as_value().and_then(SlotValue::downcast_rc)
    }

    /// Both empty, or both holding the same allocation.
    pub fn same_as(&self, other: &Slot) -> bool {
        match (self, other) {
            (Slot::Empty, Slot::Empty) => true,
            (Slot::Value(a), Slot::Value(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<SlotValue> for Slot {
    fn from(value: SlotValue) -> Self {
        Slot::Value(value)
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Empty => f.write_str("Empty"),
            Slot::Value(value) => value.fmt(f),
        }
    }
}
