//! The sorted-vector container, used when cardinality is small.

use core::cmp::Ordering;
use core::ops::{BitAnd, BitOr, BitXor, Sub};

use crate::bitmap_store::BitmapContainer;
use crate::util;

pub const ARRAY_ELEMENT_BYTES: usize = 2;

#[derive(Clone, Eq, PartialEq, Default, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArrayContainer {
    vec: Vec<u16>,
}

impl ArrayContainer {
    pub fn new() -> Self {
        ArrayContainer { vec: Vec::new() }
    }

    /// Build from an already sorted, deduplicated vector.
    ///
    /// # Panics
    /// In debug builds, if the vector is not strictly increasing.
    pub fn from_vec_unchecked(vec: Vec<u16>) -> Self {
        if cfg!(debug_assertions) {
            for w in vec.windows(2) {
                assert!(w[0] < w[1], "array container must be strictly increasing");
            }
        }
        ArrayContainer { vec }
    }

    pub fn serialized_byte_size(cardinality: u64) -> usize {
        cardinality as usize * ARRAY_ELEMENT_BYTES
    }

    pub fn byte_size(&self) -> usize {
        Self::serialized_byte_size(self.len())
    }

    #[inline]
    pub fn insert(&mut self, index: u16) -> bool {
        self.vec.binary_search(&index).map_err(|loc| self.vec.insert(loc, index)).is_err()
    }

    pub fn remove(&mut self, index: u16) -> bool {
        self.vec.binary_search(&index).map(|loc| self.vec.remove(loc)).is_ok()
    }

    pub fn contains(&self, index: u16) -> bool {
        self.vec.binary_search(&index).is_ok()
    }

    pub fn to_bitmap(&self) -> BitmapContainer {
        let mut bits = Box::new([0u64; util::BITMAP_LENGTH]);
        for &index in &self.vec {
            bits[util::key(index)] |= 1 << util::bit(index);
        }
        BitmapContainer::from_raw(self.len(), bits)
    }

    pub fn len(&self) -> u64 {
        self.vec.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.vec.is_empty()
    }

    pub fn min(&self) -> Option<u16> {
        self.vec.first().copied()
    }

    pub fn max(&self) -> Option<u16> {
        self.vec.last().copied()
    }

    pub fn rank(&self, index: u16) -> u64 {
        match self.vec.binary_search(&index) {
            Ok(i) => i as u64 + 1,
            Err(i) => i as u64,
        }
    }

    pub fn select(&self, n: u64) -> Option<u16> {
        self.vec.get(n as usize).copied()
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.vec
    }

    pub fn iter(&self) -> core::slice::Iter<'_, u16> {
        self.vec.iter()
    }

    pub(crate) fn internal_validate(&self) -> Result<(), &'static str> {
        for w in self.vec.windows(2) {
            if w[0] >= w[1] {
                return Err("array elements not strictly increasing");
            }
        }
        Ok(())
    }
}

impl BitOr<&ArrayContainer> for &ArrayContainer {
    type Output = ArrayContainer;

    fn bitor(self, rhs: &ArrayContainer) -> ArrayContainer {
        let mut out = Vec::with_capacity(self.vec.len() + rhs.vec.len());
        let (mut i1, mut i2) = (self.vec.iter(), rhs.vec.iter());
        let (mut v1, mut v2) = (i1.next(), i2.next());
        loop {
            match (v1, v2) {
                (None, None) => break,
                (Some(&a), None) => {
                    out.push(a);
                    v1 = i1.next();
                }
                (None, Some(&b)) => {
                    out.push(b);
                    v2 = i2.next();
                }
                (Some(&a), Some(&b)) => match a.cmp(&b) {
                    Ordering::Equal => {
                        out.push(a);
                        v1 = i1.next();
                        v2 = i2.next();
                    }
                    Ordering::Less => {
                        out.push(a);
                        v1 = i1.next();
                    }
                    Ordering::Greater => {
                        out.push(b);
                        v2 = i2.next();
                    }
                },
            }
        }
        ArrayContainer::from_vec_unchecked(out)
    }
}

impl BitAnd<&ArrayContainer> for &ArrayContainer {
    type Output = ArrayContainer;

    fn bitand(self, rhs: &ArrayContainer) -> ArrayContainer {
        let mut out = Vec::with_capacity(self.vec.len().min(rhs.vec.len()));
        let (mut i1, mut i2) = (self.vec.iter(), rhs.vec.iter());
        let (mut v1, mut v2) = (i1.next(), i2.next());
        loop {
            match (v1, v2) {
                (Some(&a), Some(&b)) => match a.cmp(&b) {
                    Ordering::Equal => {
                        out.push(a);
                        v1 = i1.next();
                        v2 = i2.next();
                    }
                    Ordering::Less => v1 = i1.next(),
                    Ordering::Greater => v2 = i2.next(),
                },
                _ => break,
            }
        }
        ArrayContainer::from_vec_unchecked(out)
    }
}

impl Sub<&ArrayContainer> for &ArrayContainer {
    type Output = ArrayContainer;

    fn sub(self, rhs: &ArrayContainer) -> ArrayContainer {
        let mut out = Vec::with_capacity(self.vec.len());
        let (mut i1, mut i2) = (self.vec.iter(), rhs.vec.iter());
        let (mut v1, mut v2) = (i1.next(), i2.next());
        loop {
            match (v1, v2) {
                (Some(&a), Some(&b)) => match a.cmp(&b) {
                    Ordering::Equal => {
                        v1 = i1.next();
                        v2 = i2.next();
                    }
                    Ordering::Less => {
                        out.push(a);
                        v1 = i1.next();
                    }
                    Ordering::Greater => v2 = i2.next(),
                },
                (Some(&a), None) => {
                    out.push(a);
                    v1 = i1.next();
                }
                (None, _) => break,
            }
        }
        ArrayContainer::from_vec_unchecked(out)
    }
}

impl BitXor<&ArrayContainer> for &ArrayContainer {
    type Output = ArrayContainer;

    fn bitxor(self, rhs: &ArrayContainer) -> ArrayContainer {
        let mut out = Vec::with_capacity(self.vec.len() + rhs.vec.len());
        let (mut i1, mut i2) = (self.vec.iter(), rhs.vec.iter());
        let (mut v1, mut v2) = (i1.next(), i2.next());
        loop {
            match (v1, v2) {
                (None, None) => break,
                (Some(&a), None) => {
                    out.push(a);
                    v1 = i1.next();
                }
                (None, Some(&b)) => {
                    out.push(b);
                    v2 = i2.next();
                }
                (Some(&a), Some(&b)) => match a.cmp(&b) {
                    Ordering::Equal => {
                        v1 = i1.next();
                        v2 = i2.next();
                    }
                    Ordering::Less => {
                        out.push(a);
                        v1 = i1.next();
                    }
                    Ordering::Greater => {
                        out.push(b);
                        v2 = i2.next();
                    }
                },
            }
        }
        ArrayContainer::from_vec_unchecked(out)
    }
}
