//! Registration keys.
//!
//! Every validator and handler in a table is stored under a
//! [`RegistrationKey`]. Closures get a freshly generated key; shared handler
//! objects are keyed by the address of their allocation, so registering the
//! same `Rc` twice targets the same slot and unregistering needs nothing but
//! the object itself.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Identity of a registration within a table.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationKey(Repr);

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum Repr {
    Generated(u64),
    Object(usize),
}

impl RegistrationKey {
    /// Returns a key that has never been handed out before.
    pub fn next() -> Self {
        Self(Repr::Generated(NEXT_KEY.fetch_add(1, Ordering::Relaxed)))
    }

    /// Returns the key identifying a shared object.
    ///
    /// Keys of this kind are only unique while the object is alive.
    pub fn of<T: ?Sized>(object: &Rc<T>) -> Self {
        Self(Repr::Object(Rc::as_ptr(object).cast::<()>() as usize))
    }
}

impl fmt::Debug for RegistrationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for RegistrationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Repr::Generated(id) => write!(f, "#{id}"),
            Repr::Object(addr) => write!(f, "@{addr:#x}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_keys_are_unique() {
        let a = RegistrationKey::next();
        let b = RegistrationKey::next();
        assert_ne!(a, b);
    }

    #[test]
    fn test_object_keys_follow_identity() {
        let first = Rc::new(1);
        let alias = Rc::clone(&first);
        let second = Rc::new(1);

        assert_eq!(RegistrationKey::of(&first), RegistrationKey::of(&alias));
        assert_ne!(RegistrationKey::of(&first), RegistrationKey::of(&second));
    }

    #[test]
    fn test_object_key_ignores_trait_object_metadata() {
        let concrete = Rc::new(String::from("x"));
        let erased: Rc<dyn fmt::Display> = concrete.clone();
        assert_eq!(RegistrationKey::of(&concrete), RegistrationKey::of(&erased));
    }
}
