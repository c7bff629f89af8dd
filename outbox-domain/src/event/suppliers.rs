use super::{Event, EventSupplier};
use crate::error::OutboxResult;
use std::fmt;
use std::sync::Arc;

/// 有序的事件提供者集合
#[derive(Clone, Default)]
pub struct EventSuppliers {
    suppliers: Vec<Arc<dyn EventSupplier>>,
}

impl EventSuppliers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of<S>(supplier: S) -> Self
    where
        S: EventSupplier + 'static,
    {
        let mut suppliers = Self::new();
        suppliers.add(supplier);
        suppliers
    }

    pub fn add<S>(&mut self, supplier: S) -> &mut Self
    where
        S: EventSupplier + 'static,
    {
        self.suppliers.push(Arc::new(supplier));
        self
    }

    pub fn with<S>(mut self, supplier: S) -> Self
    where
        S: EventSupplier + 'static,
    {
        self.add(supplier);
        self
    }

    pub fn extend(&mut self, other: EventSuppliers) -> &mut Self {
        if self.suppliers.is_empty() {
            self.suppliers = other.suppliers;
        } else {
            self.suppliers.extend(other.suppliers);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.suppliers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.suppliers.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn EventSupplier> {
        self.suppliers.iter().map(|s| s.as_ref())
    }

    /// 依次调用每个提供者，保持原有顺序
    pub fn supply_all(&self) -> OutboxResult<Vec<Event>> {
        self.iter().map(|s| s.supply()).collect()
    }
}

impl<S> FromIterator<S> for EventSuppliers
where
    S: EventSupplier + 'static,
{
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut suppliers = Self::new();
        for s in iter {
            suppliers.add(s);
        }
        suppliers
    }
}

impl fmt::Debug for EventSuppliers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSuppliers")
            .field("len", &self.suppliers.len())
            .finish()
    }
}

/// 业务返回值与其产生的事件
///
/// 领域操作可一次返回“结果 + 事件”，由调用方在同一事务内暂存事件。
#[derive(Debug, Clone)]
pub struct EventTuple<V> {
    value: V,
    events: EventSuppliers,
}

impl<V> EventTuple<V> {
    pub fn of(value: V) -> Self {
        Self {
            value,
            events: EventSuppliers::new(),
        }
    }

    pub fn with_events(value: V, events: EventSuppliers) -> Self {
        Self { value, events }
    }

    pub fn add<S>(mut self, supplier: S) -> Self
    where
        S: EventSupplier + 'static,
    {
        self.events.add(supplier);
        self
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn events(&self) -> &EventSuppliers {
        &self.events
    }

    pub fn into_parts(self) -> (V, EventSuppliers) {
        (self.value, self.events)
    }
}
