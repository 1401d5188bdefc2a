//! Per-type tables of registered callbacks.
//!
//! A [`TypeTable`] holds the callbacks bound to one payload type, keyed by
//! [`RegistrationKey`] and kept in insertion order. A [`TableRegistry`] maps
//! payload types to their tables, also in first-registration order, and
//! selects the tables a dispatched payload reaches.

use std::any::{Any, TypeId};

use indexmap::IndexMap;
use indexmap::map::Values;

use crate::error::{RegisterError, RegisterResult};
use crate::key::RegistrationKey;
use crate::payload::{Payload, PayloadType};

/// Callbacks registered for a single payload type.
#[derive(Clone)]
pub(crate) struct TypeTable<V> {
    payload_type: PayloadType,
    entries: IndexMap<RegistrationKey, V>,
}

impl<V> TypeTable<V> {
    pub(crate) fn new(payload_type: PayloadType) -> Self {
        Self {
            payload_type,
            entries: IndexMap::new(),
        }
    }

    pub(crate) fn payload_type(&self) -> PayloadType {
        self.payload_type
    }

    pub(crate) fn name(&self) -> &'static str {
        self.payload_type.name()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts a new entry, failing if the key is taken.
    pub(crate) fn insert_strict(&mut self, key: RegistrationKey, value: V) -> RegisterResult<()> {
        if self.entries.contains_key(&key) {
            return Err(RegisterError::duplicate_key(self.name(), key));
        }
        self.entries.insert(key, value);
        Ok(())
    }

    /// Inserts a new entry unless the key is taken. Returns whether it was inserted.
    pub(crate) fn insert_if_absent(&mut self, key: RegistrationKey, value: V) -> bool {
        match self.entries.entry(key) {
            indexmap::map::Entry::Occupied(_) => false,
            indexmap::map::Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    /// Removes an entry, keeping the order of the rest.
    pub(crate) fn remove(&mut self, key: &RegistrationKey) -> bool {
        self.entries.shift_remove(key).is_some()
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.values()
    }
}

impl<V: Clone> TypeTable<V> {
    /// Replaces this table's entries with a copy of `source`'s.
    pub(crate) fn overwrite_from(&mut self, source: &Self) {
        self.payload_type = source.payload_type;
        self.entries.clone_from(&source.entries);
    }
}

/// Tables for every payload type with registrations.
pub(crate) struct TableRegistry<V> {
    tables: IndexMap<TypeId, TypeTable<V>>,
}

impl<V> Default for TableRegistry<V> {
    fn default() -> Self {
        Self {
            tables: IndexMap::new(),
        }
    }
}

impl<V> TableRegistry<V> {
    /// Returns the table for `K`, creating it on first use.
    pub(crate) fn table_mut<K: Any>(&mut self) -> &mut TypeTable<V> {
        self.tables
            .entry(TypeId::of::<K>())
            .or_insert_with(|| TypeTable::new(PayloadType::of::<K>()))
    }

    pub(crate) fn get_mut<K: Any>(&mut self) -> Option<&mut TypeTable<V>> {
        self.tables.get_mut(&TypeId::of::<K>())
    }

    /// Drops the table for `K`. Returns whether it existed.
    pub(crate) fn remove<K: Any>(&mut self) -> bool {
        self.tables.shift_remove(&TypeId::of::<K>()).is_some()
    }

    pub(crate) fn clear(&mut self) {
        self.tables.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns the tables `payload` reaches, each paired with the view of the
    /// payload as that table's type.
    ///
    /// Without derived dispatch only the table of the payload's exact type is
    /// selected. With it, every table whose type is on the payload's parent
    /// chain is, in table order.
    pub(crate) fn matching<'a>(&'a self, payload: &'a dyn Payload, derived: bool) -> Matches<'a, V> {
        if derived {
            Matches::Derived {
                tables: self.tables.values(),
                payload,
            }
        } else {
            let exact = self
                .tables
                .get(&payload.exact_type_id())
                .map(|table| (table, payload.as_any()));
            Matches::Exact(exact)
        }
    }
}

impl<V: Clone> TableRegistry<V> {
    /// Makes this registry a copy of `live`.
    ///
    /// Tables that disappeared from `live` are dropped, new ones are cloned,
    /// and existing ones have their contents overwritten in place.
    pub(crate) fn sync_from(&mut self, live: &Self) {
        let mut previous = std::mem::take(&mut self.tables);
        for (id, source) in &live.tables {
            let mut table = previous
                .swap_remove(id)
                .unwrap_or_else(|| TypeTable::new(source.payload_type()));
            table.overwrite_from(source);
            self.tables.insert(*id, table);
        }
    }
}

/// Iterator over the tables a payload reaches.
pub(crate) enum Matches<'a, V> {
    Exact(Option<(&'a TypeTable<V>, &'a dyn Any)>),
    Derived {
        tables: Values<'a, TypeId, TypeTable<V>>,
        payload: &'a dyn Payload,
    },
}

impl<'a, V> Iterator for Matches<'a, V> {
    type Item = (&'a TypeTable<V>, &'a dyn Any);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Exact(slot) => slot.take(),
            Self::Derived { tables, payload } => {
                let payload: &'a dyn Payload = *payload;
                tables
                    .by_ref()
                    .find_map(|table| Some((table, payload.upcast(table.payload_type().id())?)))
            }
        }
    }
}
