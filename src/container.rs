//! [`Container`] is the closed sum type over the three backing stores. The
//! façade that owns a 16-bit high-order key and dispatches across many
//! containers is out of scope here; this type is the per-key payload such a
//! façade would hold.

use core::ops::{BitAnd, BitOr, BitXor, Sub};

use tracing::debug;

use crate::array_store::ArrayContainer;
use crate::bitmap_store::BitmapContainer;
use crate::error::Result;
use crate::run_store::{BitmapOrArray, RunContainer};
use crate::util::BITMAP_LENGTH;

/// Above this cardinality an array encoding is never smaller than a bitmap,
/// so conversions stop considering it.
pub const ARRAY_MAX: u64 = 4096;

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum Container {
    Array(ArrayContainer),
    Bitmap(BitmapContainer),
    Run(RunContainer),
}

impl Container {
    pub fn new() -> Self {
        Container::Array(ArrayContainer::new())
    }

    pub fn cardinality(&self) -> u64 {
        match self {
            Container::Array(c) => c.len(),
            Container::Bitmap(c) => c.len(),
            Container::Run(c) => c.cardinality(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cardinality() == 0
    }

    pub fn contains(&self, x: u16) -> bool {
        match self {
            Container::Array(c) => c.contains(x),
            Container::Bitmap(c) => c.contains(x),
            Container::Run(c) => c.contains(x),
        }
    }

    pub fn add(&mut self, x: u16) -> bool {
        let added = match self {
            Container::Array(c) => {
                if c.contains(x) {
                    false
                } else if c.len() + 1 > ARRAY_MAX {
                    let mut bitmap = c.to_bitmap();
                    let added = bitmap.insert(x);
                    *self = Container::Bitmap(bitmap);
                    added
                } else {
                    c.insert(x)
                }
            }
            Container::Bitmap(c) => c.insert(x),
            Container::Run(c) => c.add(x),
        };
        added
    }

    pub fn remove(&mut self, x: u16) -> bool {
        match self {
            Container::Array(c) => c.remove(x),
            Container::Bitmap(c) => c.remove(x),
            Container::Run(c) => c.remove(x),
        }
    }

    pub fn flip(&mut self, x: u16) {
        match self {
            Container::Array(_) | Container::Bitmap(_) => {
                if !self.remove(x) {
                    self.add(x);
                }
            }
            Container::Run(c) => c.flip(x),
        }
    }

    pub fn rank(&self, x: u16) -> u64 {
        match self {
            Container::Array(c) => c.rank(x),
            Container::Bitmap(c) => c.rank(x),
            Container::Run(c) => c.rank(x),
        }
    }

    pub fn select(&self, j: u64) -> Result<u16> {
        match self {
            Container::Array(c) => c
                .select(j)
                .ok_or(crate::error::RoaringCoreError::IndexOutOfBounds { index: j, cardinality: c.len() }),
            Container::Bitmap(c) => c
                .select(j)
                .ok_or(crate::error::RoaringCoreError::IndexOutOfBounds { index: j, cardinality: c.len() }),
            Container::Run(c) => c.select(j),
        }
    }

    pub fn min(&self) -> Option<u16> {
        match self {
            Container::Array(c) => c.min(),
            Container::Bitmap(c) => c.min(),
            Container::Run(c) => c.min(),
        }
    }

    pub fn max(&self) -> Option<u16> {
        match self {
            Container::Array(c) => c.max(),
            Container::Bitmap(c) => c.max(),
            Container::Run(c) => c.max(),
        }
    }

    /// `iadd(begin, end)` over `[begin, end)`, converting to a bitmap first
    /// if this is an array that would grow past [`ARRAY_MAX`].
    pub fn iadd(&mut self, begin: u32, end: u32) -> Result<u64> {
        crate::error::validate_range(begin, end)?;
        match self {
            Container::Array(c) => {
                let new_count = (begin..end).filter(|&v| !c.contains(v as u16)).count() as u64;
                if c.len() + new_count > ARRAY_MAX {
                    let mut bitmap = c.to_bitmap();
                    let added = bitmap.insert_range(begin, end);
                    *self = Container::Bitmap(bitmap);
                    Ok(added)
                } else {
                    for v in begin..end {
                        c.insert(v as u16);
                    }
                    Ok(new_count)
                }
            }
            Container::Bitmap(c) => Ok(c.insert_range(begin, end)),
            Container::Run(c) => c.iadd(begin, end),
        }
    }

    pub fn iremove(&mut self, begin: u32, end: u32) -> Result<u64> {
        crate::error::validate_range(begin, end)?;
        match self {
            Container::Array(c) => {
                let before = c.len();
                let vec: Vec<u16> =
                    c.as_slice().iter().copied().filter(|&v| (v as u32) < begin || (v as u32) >= end).collect();
                *c = ArrayContainer::from_vec_unchecked(vec);
                Ok(before - c.len())
            }
            Container::Bitmap(c) => Ok(c.remove_range(begin, end)),
            Container::Run(c) => c.iremove(begin, end),
        }
    }

    /// Complement over `[begin, end)`. Array and bitmap containers flip via
    /// a fresh bitmap pass; a run container keeps its own interval-merge
    /// complement since that stays linear in its run count rather than the
    /// 16-bit universe.
    pub fn not(&self, begin: u32, end: u32) -> Result<Container> {
        if let Container::Run(c) = self {
            return Ok(Container::Run(c.not(begin, end)?).ensure_correct_store());
        }
        crate::error::validate_range(begin, end)?;
        let mut result = BitmapContainer::new();
        for v in 0..begin {
            if self.contains(v as u16) {
                result.insert(v as u16);
            }
        }
        for v in begin..end {
            if !self.contains(v as u16) {
                result.insert(v as u16);
            }
        }
        for v in end..0x1_0000 {
            if self.contains(v as u16) {
                result.insert(v as u16);
            }
        }
        Ok(Container::Bitmap(result).ensure_correct_store())
    }

    pub fn trim(&mut self) {
        if let Container::Run(c) = self {
            c.trim();
        }
    }

    /// Byte size of the most compact of array/bitmap/run encodings,
    /// choosing run only when it doesn't lose to both alternatives.
    pub fn run_optimize(&mut self) {
        let card = self.cardinality();
        let array_bytes = ArrayContainer::serialized_byte_size(card);
        let bitmap_bytes = 2 * BITMAP_LENGTH;
        let best_non_run = array_bytes.min(bitmap_bytes);

        let run_candidate = match self {
            Container::Array(c) => Some(array_to_runs(c)),
            Container::Bitmap(c) => {
                let estimated_bytes = RunContainer::serialized_byte_size(c.count_runs() as usize);
                if estimated_bytes > best_non_run {
                    None
                } else {
                    Some(bitmap_to_runs(c))
                }
            }
            Container::Run(_) => None,
        };

        if let Some(run) = run_candidate {
            let run_bytes = run.byte_size();
            if run_bytes <= best_non_run {
                debug!(cardinality = card, run_bytes, best_non_run, "run_optimize: switching to run container");
                *self = Container::Run(run);
            }
        } else if let Container::Run(c) = self {
            let run_bytes = c.byte_size();
            if run_bytes > best_non_run {
                debug!(cardinality = card, run_bytes, best_non_run, "run_optimize: abandoning run container");
                *self = if array_bytes <= bitmap_bytes {
                    Container::Array(c.to_array())
                } else {
                    Container::Bitmap(c.to_bitmap())
                };
            }
        }
    }

    /// Convert to whichever of array/bitmap is appropriate for the current
    /// cardinality. Never introduces or removes a run encoding; that's
    /// `run_optimize`'s job alone, matching the teacher's separation between
    /// cardinality-driven conversion and explicit run optimization.
    pub fn ensure_correct_store(self) -> Container {
        match self {
            Container::Array(c) if c.len() > ARRAY_MAX => Container::Bitmap(c.to_bitmap()),
            Container::Bitmap(c) if c.len() <= ARRAY_MAX => Container::Array(c.to_array()),
            other => other,
        }
    }

    pub fn iter(&self) -> ContainerIter<'_> {
        match self {
            Container::Array(c) => ContainerIter::Array(c.iter()),
            Container::Bitmap(c) => ContainerIter::Bitmap(c.iter()),
            Container::Run(c) => ContainerIter::Run(c.iter()),
        }
    }

    /// In-place intersection, semantically equivalent to `*self = &*self & rhs`.
    /// Per §6.2, in-place twins may alias their inputs and aren't required to
    /// mutate the existing backing store when the result's variant differs.
    pub fn iand(&mut self, rhs: &Container) {
        *self = &*self & rhs;
    }

    pub fn ior(&mut self, rhs: &Container) {
        *self = &*self | rhs;
    }

    pub fn ixor(&mut self, rhs: &Container) {
        *self = &*self ^ rhs;
    }

    pub fn iandnot(&mut self, rhs: &Container) {
        *self = &*self - rhs;
    }

    /// The smallest `max_cardinality` elements, as a new container. Mirrors
    /// each variant's own sorted order, so "smallest" means "first in
    /// iteration order" uniformly across array/bitmap/run.
    pub fn limit(&self, max_cardinality: i32) -> Container {
        let max_cardinality = max_cardinality.max(0) as u64;
        if max_cardinality >= self.cardinality() {
            return self.clone();
        }
        if max_cardinality == 0 {
            return Container::new();
        }
        match self {
            Container::Array(c) => {
                let n = max_cardinality as usize;
                Container::Array(ArrayContainer::from_vec_unchecked(c.as_slice()[..n].to_vec()))
            }
            Container::Bitmap(c) => {
                let last = c.select(max_cardinality - 1).expect("max_cardinality < cardinality");
                let mut result = BitmapContainer::new();
                result.insert_range(0, last as u32 + 1);
                for v in 0..=last {
                    if !c.contains(v) {
                        result.remove(v);
                    }
                }
                Container::Bitmap(result).ensure_correct_store()
            }
            Container::Run(c) => {
                let mut remaining = max_cardinality;
                let mut out_runs = Vec::new();
                for i in 0..c.nbrruns() {
                    let len = c.get_length(i) as u64 + 1;
                    if remaining >= len {
                        out_runs.push((c.get_value(i), c.get_length(i)));
                        remaining -= len;
                    } else {
                        if remaining > 0 {
                            out_runs.push((c.get_value(i), (remaining - 1) as u16));
                        }
                        break;
                    }
                }
                Container::Run(RunContainer::from_runs_unchecked(&out_runs)).ensure_correct_store()
            }
        }
    }

    /// In-memory footprint of the container in its current encoding. This
    /// crate's in-memory layout mirrors the wire layout exactly (no separate
    /// header), so it coincides with [`Container::serialized_size_in_bytes`];
    /// kept as a distinct named accessor since the façade contract (§6.2)
    /// treats "current footprint" and "wire size" as conceptually separate
    /// queries, and a future layout with spare capacity could make them
    /// diverge.
    pub fn get_size_in_bytes(&self) -> usize {
        self.serialized_size_in_bytes()
    }

    /// The size this container would occupy if it were array-encoded,
    /// regardless of its actual current variant — the same comparison
    /// `run_optimize` already does against `array_bytes`, exposed here as
    /// its own query per §6.2.
    pub fn get_array_size_in_bytes(&self) -> usize {
        ArrayContainer::serialized_byte_size(self.cardinality())
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

fn array_to_runs(c: &ArrayContainer) -> RunContainer {
    let mut runs = Vec::new();
    let slice = c.as_slice();
    let mut i = 0;
    while i < slice.len() {
        let start = slice[i];
        let mut end = start;
        let mut j = i + 1;
        while j < slice.len() && slice[j] as u32 == end as u32 + 1 {
            end = slice[j];
            j += 1;
        }
        runs.push((start, end - start));
        i = j;
    }
    RunContainer::from_runs_unchecked(&runs)
}

fn bitmap_to_runs(c: &BitmapContainer) -> RunContainer {
    array_to_runs(&c.to_array())
}

pub enum ContainerIter<'a> {
    Array(core::slice::Iter<'a, u16>),
    Bitmap(crate::bitmap_store::BitmapIter<'a>),
    Run(crate::run_store::RunIter<'a>),
}

impl Iterator for ContainerIter<'_> {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        match self {
            ContainerIter::Array(it) => it.next().copied(),
            ContainerIter::Bitmap(it) => it.next(),
            ContainerIter::Run(it) => it.next(),
        }
    }
}

impl DoubleEndedIterator for ContainerIter<'_> {
    fn next_back(&mut self) -> Option<u16> {
        match self {
            ContainerIter::Array(it) => it.next_back().copied(),
            ContainerIter::Bitmap(it) => it.next_back(),
            ContainerIter::Run(it) => it.next_back(),
        }
    }
}

macro_rules! dispatch_binop {
    ($name:ident, $run_run:ident, $run_bitmap:ident, $run_array:ident, $op:tt) => {
        fn $name(lhs: &Container, rhs: &Container) -> Container {
            match (lhs, rhs) {
                (Container::Run(a), Container::Run(b)) => Container::Run(a.$run_run(b)).ensure_correct_store(),
                (Container::Run(a), Container::Bitmap(b)) => from_bitmap_or_array(a.$run_bitmap(b)),
                (Container::Bitmap(a), Container::Run(b)) => from_bitmap_or_array(b.$run_bitmap(a)),
                (Container::Run(a), Container::Array(b)) => from_bitmap_or_array_like(a.$run_array(b).into()),
                (Container::Array(a), Container::Run(b)) => from_bitmap_or_array_like(b.$run_array(a).into()),
                (Container::Array(a), Container::Array(b)) => {
                    Container::Array(a $op b).ensure_correct_store()
                }
                (Container::Bitmap(a), Container::Bitmap(b)) => {
                    let mut out = a.clone();
                    apply_bitmap_assign(&mut out, b, stringify!($name));
                    Container::Bitmap(out).ensure_correct_store()
                }
                (Container::Array(a), Container::Bitmap(b)) => {
                    // Build `out` from the left operand so non-commutative
                    // `andnot` subtracts in the right direction.
                    let mut out = a.to_bitmap();
                    apply_bitmap_assign(&mut out, b, stringify!($name));
                    Container::Bitmap(out).ensure_correct_store()
                }
                (Container::Bitmap(a), Container::Array(b)) => {
                    let mut out = a.clone();
                    apply_bitmap_array_assign(&mut out, b, stringify!($name));
                    Container::Bitmap(out).ensure_correct_store()
                }
            }
        }
    };
}

fn from_bitmap_or_array(x: BitmapOrArray) -> Container {
    match x {
        BitmapOrArray::Array(a) => Container::Array(a).ensure_correct_store(),
        BitmapOrArray::Bitmap(b) => Container::Bitmap(b).ensure_correct_store(),
    }
}

/// `and_array`/`andnot_array` return a concrete `ArrayContainer` (they can
/// only shrink), while `or_array`/`xor_array` return `BitmapOrArray` since
/// they can grow past the array threshold.
fn from_bitmap_or_array_like(x: ArrayOrBitmapOrArray) -> Container {
    match x {
        ArrayOrBitmapOrArray::Array(a) => Container::Array(a).ensure_correct_store(),
        ArrayOrBitmapOrArray::Wrapped(w) => from_bitmap_or_array(w),
    }
}

enum ArrayOrBitmapOrArray {
    Array(ArrayContainer),
    Wrapped(BitmapOrArray),
}

impl From<ArrayContainer> for ArrayOrBitmapOrArray {
    fn from(a: ArrayContainer) -> Self {
        ArrayOrBitmapOrArray::Array(a)
    }
}

impl From<BitmapOrArray> for ArrayOrBitmapOrArray {
    fn from(w: BitmapOrArray) -> Self {
        ArrayOrBitmapOrArray::Wrapped(w)
    }
}

fn apply_bitmap_assign(out: &mut BitmapContainer, other: &BitmapContainer, op: &str) {
    use core::ops::{BitAndAssign, BitOrAssign, BitXorAssign, SubAssign};
    match op {
        "dispatch_and" => out.bitand_assign(other),
        "dispatch_or" => out.bitor_assign(other),
        "dispatch_xor" => out.bitxor_assign(other),
        "dispatch_andnot" => out.sub_assign(other),
        _ => unreachable!(),
    }
}

fn apply_bitmap_array_assign(out: &mut BitmapContainer, other: &ArrayContainer, op: &str) {
    use core::ops::{BitAndAssign, BitOrAssign, BitXorAssign, SubAssign};
    match op {
        "dispatch_and" => out.bitand_assign(other),
        "dispatch_or" => out.bitor_assign(other),
        "dispatch_xor" => out.bitxor_assign(other),
        "dispatch_andnot" => out.sub_assign(other),
        _ => unreachable!(),
    }
}

dispatch_binop!(dispatch_and, and, and_bitmap, and_array, &);
dispatch_binop!(dispatch_or, or, or_bitmap, or_array, |);
dispatch_binop!(dispatch_xor, xor, xor_bitmap, xor_array, ^);

/// `andnot` isn't commutative, so unlike and/or/xor it can't share the
/// generic dispatch macro: `Run::andnot_bitmap`/`andnot_array` only compute
/// "run minus other", and the macro's shared code assumes either operand
/// order gives the same answer.
fn dispatch_andnot(lhs: &Container, rhs: &Container) -> Container {
    match (lhs, rhs) {
        (Container::Run(a), Container::Run(b)) => Container::Run(a.andnot(b)).ensure_correct_store(),
        (Container::Run(a), Container::Bitmap(b)) => from_bitmap_or_array(a.andnot_bitmap(b)),
        (Container::Run(a), Container::Array(b)) => Container::Array(a.andnot_array(b)).ensure_correct_store(),
        (Container::Bitmap(a), Container::Run(b)) => {
            let mut bits = Box::new(*a.words());
            for i in 0..b.nbrruns() {
                let start = b.get_value(i) as u32;
                let end = start + b.get_length(i) as u32 + 1;
                crate::util::reset_bitmap_range(&mut bits, start, end);
            }
            let len = bits.iter().map(|w| w.count_ones() as u64).sum();
            Container::Bitmap(BitmapContainer::from_raw(len, bits)).ensure_correct_store()
        }
        (Container::Array(a), Container::Run(b)) => {
            let vec: Vec<u16> = a.as_slice().iter().copied().filter(|&v| !b.contains(v)).collect();
            Container::Array(ArrayContainer::from_vec_unchecked(vec)).ensure_correct_store()
        }
        (Container::Array(a), Container::Array(b)) => Container::Array(a - b).ensure_correct_store(),
        (Container::Bitmap(a), Container::Bitmap(b)) => {
            let mut out = a.clone();
            apply_bitmap_assign(&mut out, b, "dispatch_andnot");
            Container::Bitmap(out).ensure_correct_store()
        }
        (Container::Array(a), Container::Bitmap(b)) => {
            let mut out = a.to_bitmap();
            apply_bitmap_assign(&mut out, b, "dispatch_andnot");
            Container::Bitmap(out).ensure_correct_store()
        }
        (Container::Bitmap(a), Container::Array(b)) => {
            let mut out = a.clone();
            apply_bitmap_array_assign(&mut out, b, "dispatch_andnot");
            Container::Bitmap(out).ensure_correct_store()
        }
    }
}

impl BitOr<&Container> for &Container {
    type Output = Container;
    fn bitor(self, rhs: &Container) -> Container {
        dispatch_or(self, rhs)
    }
}

impl BitAnd<&Container> for &Container {
    type Output = Container;
    fn bitand(self, rhs: &Container) -> Container {
        dispatch_and(self, rhs)
    }
}

impl BitXor<&Container> for &Container {
    type Output = Container;
    fn bitxor(self, rhs: &Container) -> Container {
        dispatch_xor(self, rhs)
    }
}

impl Sub<&Container> for &Container {
    type Output = Container;
    fn sub(self, rhs: &Container) -> Container {
        dispatch_andnot(self, rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_past_array_limit_switches_to_bitmap() {
        let mut c = Container::new();
        for v in 0..=ARRAY_MAX as u16 + 10 {
            c.add(v);
        }
        assert!(matches!(c, Container::Bitmap(_)));
    }

    #[test]
    fn run_optimize_picks_run_for_contiguous_data() {
        let mut c = Container::new();
        c.iadd(0, 5000).unwrap();
        c.run_optimize();
        assert!(matches!(c, Container::Run(_)));
    }

    #[test]
    fn cross_variant_and_matches_array_semantics() {
        let mut a = Container::new();
        a.iadd(0, 100).unwrap();
        let mut b = Container::new();
        b.iadd(50, 150).unwrap();
        let intersection = &a & &b;
        assert_eq!(intersection.cardinality(), 50);
    }

    #[test]
    fn run_times_run_and() {
        let a = Container::Run(RunContainer::from_runs_unchecked(&[(0, 9)]));
        let b = Container::Run(RunContainer::from_runs_unchecked(&[(5, 14)]));
        let r = &a & &b;
        assert_eq!(r.cardinality(), 5);
    }

    #[test]
    fn not_matches_bitmap_complement() {
        let mut a = Container::new();
        a.add(5);
        a.add(10);
        let flipped = a.not(0, 16).unwrap();
        assert_eq!(flipped.cardinality(), 14);
        assert!(!flipped.contains(5));
        assert!(!flipped.contains(10));
    }

    #[test]
    fn in_place_ops_match_their_pure_counterparts() {
        let mut a = Container::new();
        a.iadd(0, 100).unwrap();
        let mut b = Container::new();
        b.iadd(50, 150).unwrap();

        let mut iand = a.clone();
        iand.iand(&b);
        assert_eq!(iand, &a & &b);

        let mut ior = a.clone();
        ior.ior(&b);
        assert_eq!(ior, &a | &b);

        let mut ixor = a.clone();
        ixor.ixor(&b);
        assert_eq!(ixor, &a ^ &b);

        let mut iandnot = a.clone();
        iandnot.iandnot(&b);
        assert_eq!(iandnot, &a - &b);
    }

    #[test]
    fn limit_truncates_to_the_smallest_elements() {
        let mut c = Container::new();
        c.iadd(10, 20).unwrap();
        let limited = c.limit(3);
        assert_eq!(limited.iter().collect::<Vec<_>>(), vec![10, 11, 12]);
        assert_eq!(c.limit(0).cardinality(), 0);
        assert_eq!(c.limit(100).cardinality(), c.cardinality());
    }

    #[test]
    fn limit_on_a_run_container_splits_the_crossing_run() {
        let c = Container::Run(RunContainer::from_runs_unchecked(&[(5, 9), (20, 4)])); // 5..=14, 20..=24
        let limited = c.limit(8);
        assert_eq!(limited.iter().collect::<Vec<_>>(), vec![5, 6, 7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn size_accessors_are_distinct_queries() {
        let mut c = Container::new();
        c.iadd(0, 10).unwrap();
        assert_eq!(c.get_array_size_in_bytes(), ArrayContainer::serialized_byte_size(10));
        assert_eq!(c.get_size_in_bytes(), c.serialized_size_in_bytes());
    }

    #[test]
    fn reverse_iteration_is_reachable_through_the_facade() {
        let mut c = Container::new();
        c.iadd(0, 2000).unwrap();
        c.run_optimize();
        assert!(matches!(c, Container::Run(_)));
        let mut rev: Vec<u16> = c.iter().rev().collect();
        rev.reverse();
        assert_eq!(rev, c.iter().collect::<Vec<_>>());
    }
}
