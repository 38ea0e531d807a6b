use std::any::Any;
use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

static CLOCK: AtomicU64 = AtomicU64::new(0);

/// Modification time on the process-wide logical clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Issues a stamp strictly greater than every stamp issued before.
    pub fn next() -> Self {
        Timestamp(CLOCK.fetch_add(1, Ordering::Relaxed) + 1)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

struct DataCell<T> {
    stamp: Cell<Timestamp>,
    value: RefCell<T>,
}

/// Shared, timestamped value flowing through a pipeline.
///
/// Cloning the handle shares the value; identity, not content, decides
/// whether two handles refer to the same object. Every mutation goes through
/// [`DataObject::modify`] or [`DataObject::replace`] and bumps the timestamp.
pub struct DataObject<T> {
    inner: Rc<DataCell<T>>,
}

impl<T> DataObject<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(DataCell {
                stamp: Cell::new(Timestamp::next()),
                value: RefCell::new(value),
            }),
        }
    }

    pub fn touch(&self) {
        self.inner.stamp.set(Timestamp::next());
    }

    pub fn timestamp(&self) -> Timestamp {
        self.inner.stamp.get()
    }

    /// Read access. Panics if the value is being modified at the same time,
    /// which the single-threaded update walk never does.
    pub fn borrow(&self) -> Ref<'_, T> {
        self.inner.value.borrow()
    }

    pub fn modify<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let result = f(&mut self.inner.value.borrow_mut());
        self.touch();
        result
    }

    pub fn replace(&self, value: T) -> T {
        let previous = self.inner.value.replace(value);
        self.touch();
        previous
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of handles currently sharing this object.
    pub fn holders(&self) -> usize {
        Rc::strong_count(&self.inner)
    }
}

impl<T: Clone> DataObject<T> {
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }
}

impl<T: Default> Default for DataObject<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Clone for DataObject<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for DataObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataObject")
            .field("type", &std::any::type_name::<T>())
            .field("timestamp", &self.timestamp())
            .finish()
    }
}

trait Stamped {
    fn timestamp(&self) -> Timestamp;
    fn type_name(&self) -> &'static str;
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<T: 'static> Stamped for DataCell<T> {
    fn timestamp(&self) -> Timestamp {
        self.stamp.get()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// Type-erased handle to a [`DataObject`], as stored in pipeline ports.
#[derive(Clone)]
pub struct AnyDataObject {
    cell: Rc<dyn Stamped>,
}

impl AnyDataObject {
    pub fn timestamp(&self) -> Timestamp {
        self.cell.timestamp()
    }

    pub fn type_name(&self) -> &'static str {
        self.cell.type_name()
    }

    pub fn is<T: 'static>(&self) -> bool {
        Rc::clone(&self.cell).into_any().is::<DataCell<T>>()
    }

    pub fn downcast<T: 'static>(&self) -> Option<DataObject<T>> {
        Rc::clone(&self.cell)
            .into_any()
            .downcast::<DataCell<T>>()
            .ok()
            .map(|inner| DataObject { inner })
    }

    pub fn ptr_eq(&self, other: &AnyDataObject) -> bool {
        std::ptr::addr_eq(Rc::as_ptr(&self.cell), Rc::as_ptr(&other.cell))
    }
}

impl<T: 'static> From<DataObject<T>> for AnyDataObject {
    fn from(object: DataObject<T>) -> Self {
        let cell: Rc<dyn Stamped> = object.inner;
        Self { cell }
    }
}

impl fmt::Debug for AnyDataObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyDataObject")
            .field("type", &self.type_name())
            .field("timestamp", &self.timestamp())
            .finish()
    }
}
