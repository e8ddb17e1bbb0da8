//! Key contract for `HashIndex`.

use std::borrow::Cow;

/// A key that can be hashed by the index.
///
/// Both probe hashes consume the key's byte view, so any two values that
/// compare equal must return identical bytes. This also applies across
/// `Borrow` forms used for lookup: a `String` key and the `str` it
/// borrows as must agree, as they do for every impl in this module.
pub trait IndexKey: Eq {
    fn key_bytes(&self) -> &[u8];
}

impl IndexKey for str {
    #[inline]
    fn key_bytes(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl IndexKey for String {
    #[inline]
    fn key_bytes(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl IndexKey for Box<str> {
    #[inline]
    fn key_bytes(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl IndexKey for Cow<'_, str> {
    #[inline]
    fn key_bytes(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl IndexKey for [u8] {
    #[inline]
    fn key_bytes(&self) -> &[u8] {
        self
    }
}

impl IndexKey for Vec<u8> {
    #[inline]
    fn key_bytes(&self) -> &[u8] {
        self
    }
}

impl<T: IndexKey + ?Sized> IndexKey for &T {
    #[inline]
    fn key_bytes(&self) -> &[u8] {
        (**self).key_bytes()
    }
}
