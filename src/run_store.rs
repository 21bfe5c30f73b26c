//! The run-length-encoded container: a sorted sequence of non-adjacent runs
//! stored as a single interleaved `[value, length, value, length, ...]`
//! buffer of `u16`s. This is the hard part of the crate; see the module-level
//! docs on [`crate::Container`] for how it fits into the cross-variant
//! dispatch.

use core::cmp::Ordering;

use crate::array_store::ArrayContainer;
use crate::bitmap_store::BitmapContainer;
use crate::error::{validate_range, Result, RoaringCoreError};
use crate::util;

/// `2 + 4*nbrruns <= min(2 + 2*card, 8192)` is the threshold used elsewhere
/// (in `Container::ensure_correct_store`) to decide whether a run encoding
/// beats bitmap/array; kept here since it's stated in terms of a run
/// container's own byte size.
pub const RUN_HEADER_BYTES: usize = 2;
pub const RUN_ENTRY_BYTES: usize = 4;

#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunContainer {
    /// `[value0, length0, value1, length1, ...]`
    runs: Vec<u16>,
}

impl RunContainer {
    pub fn new() -> Self {
        RunContainer { runs: Vec::new() }
    }

    pub fn full() -> Self {
        RunContainer { runs: vec![0, 0xFFFF] }
    }

    /// Build from an explicit list of `(value, length)` pairs, trusting the
    /// caller that they are sorted, non-adjacent, and in range. Intended for
    /// tests and internal conversions where the invariant is established by
    /// construction.
    pub fn from_runs_unchecked(runs: &[(u16, u16)]) -> Self {
        let mut buf = Vec::with_capacity(runs.len() * 2);
        for &(v, l) in runs {
            buf.push(v);
            buf.push(l);
        }
        let container = RunContainer { runs: buf };
        debug_assert!(container.internal_validate().is_ok());
        container
    }

    pub fn nbrruns(&self) -> usize {
        self.runs.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    #[inline]
    pub fn get_value(&self, i: usize) -> u16 {
        self.runs[2 * i]
    }

    #[inline]
    pub fn get_length(&self, i: usize) -> u16 {
        self.runs[2 * i + 1]
    }

    #[inline]
    fn set_value(&mut self, i: usize, v: u16) {
        self.runs[2 * i] = v;
    }

    #[inline]
    fn set_length(&mut self, i: usize, l: u16) {
        self.runs[2 * i + 1] = l;
    }

    #[inline]
    fn increment_length(&mut self, i: usize) {
        self.runs[2 * i + 1] += 1;
    }

    #[inline]
    fn decrement_length(&mut self, i: usize) {
        self.runs[2 * i + 1] -= 1;
    }

    /// The last element covered by run `i`, as an unsigned 32-bit value so
    /// `value + length` never wraps while we reason about it.
    #[inline]
    fn end_inclusive(&self, i: usize) -> u32 {
        self.get_value(i) as u32 + self.get_length(i) as u32
    }

    pub fn cardinality(&self) -> u64 {
        (0..self.nbrruns()).map(|i| self.get_length(i) as u64 + 1).sum()
    }

    pub fn serialized_byte_size(nbrruns: usize) -> usize {
        RUN_HEADER_BYTES + RUN_ENTRY_BYTES * nbrruns
    }

    pub fn byte_size(&self) -> usize {
        Self::serialized_byte_size(self.nbrruns())
    }

    /// Geometric growth schedule from §3.2: x2 below 64 entries, x1.5 below
    /// 1024, x1.25 above, starting capacity 4 interleaved slots.
    fn grow_capacity(old_cap: usize) -> usize {
        let old_cap = old_cap.max(4);
        let grown = if old_cap < 64 {
            old_cap * 2
        } else if old_cap < 1024 {
            old_cap + old_cap / 2
        } else {
            old_cap + old_cap / 4
        };
        grown.max(old_cap + 2)
    }

    fn reserve_for_insert(&mut self) {
        if self.runs.len() + 2 > self.runs.capacity() {
            let target = Self::grow_capacity(self.runs.capacity());
            self.runs.reserve_exact(target.saturating_sub(self.runs.len()));
        }
    }

    /// Shift runs `[index, nbrruns)` right by one slot, growing capacity if
    /// needed, and leave slot `index` uninitialized-but-present for the
    /// caller to fill in.
    fn make_room_at_index(&mut self, index: usize) {
        self.reserve_for_insert();
        self.runs.push(0);
        self.runs.push(0);
        let nbrruns = self.nbrruns();
        for i in (index + 1..nbrruns).rev() {
            let v = self.get_value(i - 1);
            let l = self.get_length(i - 1);
            self.set_value(i, v);
            self.set_length(i, l);
        }
    }

    /// Shift runs `(index, nbrruns)` left by one slot, dropping run `index`.
    fn recover_room_at_index(&mut self, index: usize) {
        let nbrruns = self.nbrruns();
        for i in index..nbrruns - 1 {
            let v = self.get_value(i + 1);
            let l = self.get_length(i + 1);
            self.set_value(i, v);
            self.set_length(i, l);
        }
        self.runs.truncate(self.runs.len() - 2);
    }

    /// Remove runs `[begin, end]` inclusive, shifting the tail left.
    fn recover_rooms_in_range(&mut self, begin: usize, end: usize) {
        let nbrruns = self.nbrruns();
        let removed = end - begin + 1;
        for i in 0..(nbrruns - end - 1) {
            let v = self.get_value(end + 1 + i);
            let l = self.get_length(end + 1 + i);
            self.set_value(begin + i, v);
            self.set_length(begin + i, l);
        }
        self.runs.truncate(self.runs.len() - 2 * removed);
    }

    pub fn trim(&mut self) {
        self.runs.shrink_to_fit();
    }

    /// Binary search for `key` against run *intervals*, not just run start
    /// values: `Ok(i)` means `key` lies anywhere within run `i`'s
    /// `[value, value+length]` span; `Err(i)` means `key` isn't covered by
    /// any run, with `i` the run index before which a standalone run for
    /// `key` would be inserted. Mirrors the teacher's `cmp_index_interval`
    /// containment comparator rather than a plain start-value lookup, since
    /// treating "inside a run" and "equal to a run's start" as the same
    /// question is what produced the original containment bugs here.
    fn search(&self, key: u16) -> core::result::Result<usize, usize> {
        let mut lo = 0usize;
        let mut hi = self.nbrruns();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let start = self.get_value(mid);
            let end = self.end_inclusive(mid) as u16;
            if util::unsigned_cmp(key, start) == Ordering::Less {
                hi = mid;
            } else if util::unsigned_cmp(key, end) == Ordering::Greater {
                lo = mid + 1;
            } else {
                return Ok(mid);
            }
        }
        Err(lo)
    }

    pub fn contains(&self, x: u16) -> bool {
        self.search(x).is_ok()
    }

    pub fn add(&mut self, x: u16) -> bool {
        match self.search(x) {
            Ok(_) => false,
            Err(i) => {
                // Case: extends the previous run's tail.
                if i > 0 {
                    let prev = i - 1;
                    if (x as u32) == self.end_inclusive(prev) + 1 {
                        self.increment_length(prev);
                        self.maybe_fuse_forward(prev);
                        return true;
                    }
                }
                // Case: prepends the next run.
                if i < self.nbrruns() {
                    let next_value = self.get_value(i);
                    if next_value as u32 == x as u32 + 1 {
                        self.set_value(i, x);
                        self.increment_length(i);
                        return true;
                    }
                }
                // Case: stands alone as a new run of length 0.
                self.make_room_at_index(i);
                self.set_value(i, x);
                self.set_length(i, 0);
                true
            }
        }
    }

    /// Fuse run `i` with run `i+1` if they are now adjacent, after `i`'s
    /// length was just extended.
    fn maybe_fuse_forward(&mut self, i: usize) {
        if i + 1 < self.nbrruns() && self.end_inclusive(i) + 1 == self.get_value(i + 1) as u32 {
            let extra = self.get_length(i + 1) as u32 + 1;
            let new_len = self.get_length(i) as u32 + extra;
            self.set_length(i, new_len as u16);
            self.recover_room_at_index(i + 1);
        }
    }

    pub fn remove(&mut self, x: u16) -> bool {
        match self.search(x) {
            Err(_) => false,
            Ok(i) => {
                let value = self.get_value(i) as u32;
                let length = self.get_length(i) as u32;
                let offset = x as u32 - value;
                if length == 0 {
                    self.recover_room_at_index(i);
                } else if offset == 0 {
                    self.set_value(i, x + 1);
                    self.decrement_length(i);
                } else if offset == length {
                    self.decrement_length(i);
                } else {
                    // Interior: split into two runs.
                    let right_value = x + 1;
                    let right_length = (length - offset - 1) as u16;
                    self.set_length(i, (offset - 1) as u16);
                    self.make_room_at_index(i + 1);
                    self.set_value(i + 1, right_value);
                    self.set_length(i + 1, right_length);
                }
                true
            }
        }
    }

    pub fn flip(&mut self, x: u16) {
        if self.contains(x) {
            self.remove(x);
        } else {
            self.add(x);
        }
    }

    pub fn rank(&self, x: u16) -> u64 {
        let mut sum = 0u64;
        for i in 0..self.nbrruns() {
            let value = self.get_value(i) as u32;
            if value > x as u32 {
                break;
            }
            let end = self.end_inclusive(i);
            if end <= x as u32 {
                sum += self.get_length(i) as u64 + 1;
            } else {
                sum += (x as u32 - value + 1) as u64;
                break;
            }
        }
        sum
    }

    pub fn select(&self, j: u64) -> Result<u16> {
        let mut offset = 0u64;
        for i in 0..self.nbrruns() {
            let length = self.get_length(i) as u64;
            if j <= offset + length {
                return Ok((self.get_value(i) as u64 + (j - offset)) as u16);
            }
            offset += length + 1;
        }
        Err(RoaringCoreError::IndexOutOfBounds { index: j, cardinality: self.cardinality() })
    }

    /// `iadd(begin, end)` over the half-open `[begin, end)`, `end` exclusive
    /// and at most `65536`.
    ///
    /// Finds the window of existing runs that either contain or directly
    /// abut `[begin, last]` by running the containment-aware [`Self::search`]
    /// against both endpoints (falling back to an adjacency check on a miss,
    /// since `search` alone can't see one past a run's edge), then collapses
    /// that whole window into a single run spanning the union.
    pub fn iadd(&mut self, begin: u32, end: u32) -> Result<u64> {
        validate_range(begin, end)?;
        let before = self.cardinality();
        let last = end - 1;
        let begin16 = begin as u16;
        let last16 = last as u16;

        let begin_hit = self.search(begin16);
        let end_hit = self.search(last16);

        let lo = match begin_hit {
            Ok(i) => i,
            Err(i) if i > 0 && self.end_inclusive(i - 1) + 1 == begin => i - 1,
            Err(i) => i,
        };
        let hi = match end_hit {
            Ok(i) => i,
            Err(i) if i < self.nbrruns() && self.get_value(i) as u32 == end => i,
            Err(i) => i.wrapping_sub(1),
        };

        if lo > hi || hi >= self.nbrruns() {
            // Disjoint from every existing run: insert a fresh standalone run.
            // (`hi` can also underflow to `usize::MAX` above when there is no
            // candidate run at all, which this same branch catches.)
            self.make_room_at_index(lo);
            self.set_value(lo, begin16);
            self.set_length(lo, (last - begin) as u16);
        } else {
            let new_start = begin.min(self.get_value(lo) as u32);
            let new_end = last.max(self.end_inclusive(hi));
            self.set_value(lo, new_start as u16);
            self.set_length(lo, (new_end - new_start) as u16);
            if hi > lo {
                self.recover_rooms_in_range(lo + 1, hi);
            }
        }
        Ok(self.cardinality() - before)
    }

    /// `iremove(begin, end)` over the half-open `[begin, end)`.
    ///
    /// Uses the same containment-aware [`Self::search`] on both endpoints to
    /// find the inclusive window `[lo, hi]` of runs that actually overlap
    /// `[begin, last]` (a miss on either side means the endpoint isn't
    /// covered by any run, so the window starts/ends at the insertion
    /// point), then trims the edge runs and drops whatever is fully inside.
    pub fn iremove(&mut self, begin: u32, end: u32) -> Result<u64> {
        validate_range(begin, end)?;
        let before = self.cardinality();
        let last = end - 1;
        let begin16 = begin as u16;
        let last16 = last as u16;

        let begin_hit = self.search(begin16);
        let end_hit = self.search(last16);

        let lo = match begin_hit {
            Ok(i) => i,
            Err(i) => i,
        };
        let hi_excl = match end_hit {
            Ok(i) => i + 1,
            Err(i) => i,
        };

        if lo >= hi_excl {
            return Ok(0);
        }
        let hi = hi_excl - 1;

        let left_survives = (self.get_value(lo) as u32) < begin;
        let right_survives = self.end_inclusive(hi) > last;

        if lo == hi {
            let value = self.get_value(lo) as u32;
            let run_end = self.end_inclusive(lo);
            match (left_survives, right_survives) {
                (true, true) => {
                    let right_value = (last + 1) as u16;
                    let right_length = (run_end - last - 1) as u16;
                    self.set_length(lo, (begin - 1 - value) as u16);
                    self.make_room_at_index(lo + 1);
                    self.set_value(lo + 1, right_value);
                    self.set_length(lo + 1, right_length);
                }
                (true, false) => self.set_length(lo, (begin - 1 - value) as u16),
                (false, true) => {
                    self.set_value(lo, (last + 1) as u16);
                    self.set_length(lo, (run_end - last - 1) as u16);
                }
                (false, false) => self.recover_room_at_index(lo),
            }
        } else {
            if left_survives {
                let value = self.get_value(lo) as u32;
                self.set_length(lo, (begin - 1 - value) as u16);
            }
            if right_survives {
                let run_end = self.end_inclusive(hi);
                self.set_value(hi, (last + 1) as u16);
                self.set_length(hi, (run_end - last - 1) as u16);
            }
            let drain_begin = if left_survives { lo + 1 } else { lo };
            let drain_end = if right_survives { hi - 1 } else { hi };
            if drain_begin <= drain_end {
                self.recover_rooms_in_range(drain_begin, drain_end);
            }
        }
        Ok(before - self.cardinality())
    }

    /// Complement over the half-open `[begin, end)`.
    pub fn not(&self, begin: u32, end: u32) -> Result<RunContainer> {
        validate_range(begin, end)?;
        let last = end - 1;
        let mut out = RunContainer::new();

        let mut i = 0usize;
        let nbrruns = self.nbrruns();
        // Copy runs strictly before the range.
        while i < nbrruns && self.end_inclusive(i) < begin {
            add_run(&mut out, self.get_value(i) as u32, self.end_inclusive(i));
            i += 1;
        }

        let mut cursor = begin;
        while i < nbrruns && self.get_value(i) as u32 <= last {
            let run_start = self.get_value(i) as u32;
            let run_end = self.end_inclusive(i);
            if run_start > cursor {
                add_run(&mut out, cursor, run_start - 1);
            }
            cursor = run_end + 1;
            i += 1;
        }
        if cursor <= last {
            add_run(&mut out, cursor, last);
        }

        // Copy runs strictly after the range.
        while i < nbrruns {
            add_run(&mut out, self.get_value(i) as u32, self.end_inclusive(i));
            i += 1;
        }

        Ok(out)
    }

    pub fn to_array(&self) -> ArrayContainer {
        let mut vec = Vec::with_capacity(self.cardinality() as usize);
        for i in 0..self.nbrruns() {
            let start = self.get_value(i) as u32;
            let end = self.end_inclusive(i);
            vec.extend((start..=end).map(|v| v as u16));
        }
        ArrayContainer::from_vec_unchecked(vec)
    }

    pub fn to_bitmap(&self) -> BitmapContainer {
        let mut bits = Box::new([0u64; util::BITMAP_LENGTH]);
        for i in 0..self.nbrruns() {
            let start = self.get_value(i) as u32;
            let end = self.end_inclusive(i) + 1; // exclusive
            util::set_bitmap_range(&mut bits, start, end);
        }
        BitmapContainer::from_raw(self.cardinality(), bits)
    }

    pub fn min(&self) -> Option<u16> {
        if self.is_empty() {
            None
        } else {
            Some(self.get_value(0))
        }
    }

    pub fn max(&self) -> Option<u16> {
        if self.is_empty() {
            None
        } else {
            Some(self.end_inclusive(self.nbrruns() - 1) as u16)
        }
    }

    pub fn iter(&self) -> RunIter<'_> {
        RunIter { container: self, front_run: 0, front_off: 0, back_run: self.nbrruns(), back_off: 0 }
    }

    /// Mutation through an iterator is unsupported; always returns an error,
    /// matching the façade contract's "not implemented" error kind.
    pub fn iter_mut(&mut self) -> Result<core::convert::Infallible> {
        Err(RoaringCoreError::IteratorMutationUnsupported)
    }

    pub(crate) fn internal_validate(&self) -> core::result::Result<(), &'static str> {
        if self.runs.len() % 2 != 0 {
            return Err("run buffer has odd length");
        }
        for i in 0..self.nbrruns() {
            let value = self.get_value(i) as u32;
            let length = self.get_length(i) as u32;
            if value + length > 0xFFFF {
                return Err("run extends past 0xFFFF");
            }
            if i + 1 < self.nbrruns() {
                let next_value = self.get_value(i + 1) as u32;
                if value + length + 1 >= next_value {
                    return Err("runs are not strictly sorted and non-adjacent");
                }
            }
        }
        Ok(())
    }

    // --- Run x Run set algebra (§4.4) ---

    pub fn and(&self, other: &RunContainer) -> RunContainer {
        let mut out = RunContainer::new();
        out.runs.reserve_exact(2 * (self.nbrruns() + other.nbrruns()));
        let (mut i, mut j) = (0usize, 0usize);
        while i < self.nbrruns() && j < other.nbrruns() {
            let (xstart, xend) = (self.get_value(i) as u32, self.end_inclusive(i));
            let (ystart, yend) = (other.get_value(j) as u32, other.end_inclusive(j));
            let start = xstart.max(ystart);
            let end = xend.min(yend);
            if start <= end {
                add_run(&mut out, start, end);
            }
            if xend < yend {
                i += 1;
            } else {
                j += 1;
            }
        }
        out
    }

    pub fn or(&self, other: &RunContainer) -> RunContainer {
        let mut out = RunContainer::new();
        out.runs.reserve_exact(2 * (self.nbrruns() + other.nbrruns()));
        let (mut i, mut j) = (0usize, 0usize);
        while i < self.nbrruns() || j < other.nbrruns() {
            let take_left = match (i < self.nbrruns(), j < other.nbrruns()) {
                (true, false) => true,
                (false, true) => false,
                (true, true) => self.get_value(i) <= other.get_value(j),
                (false, false) => unreachable!(),
            };
            let (start, mut end) = if take_left {
                let r = (self.get_value(i) as u32, self.end_inclusive(i));
                i += 1;
                r
            } else {
                let r = (other.get_value(j) as u32, other.end_inclusive(j));
                j += 1;
                r
            };
            // Swallow any run from either side that overlaps or abuts the
            // growing window.
            loop {
                let mut absorbed = false;
                if i < self.nbrruns() && self.get_value(i) as u32 <= end.saturating_add(1) {
                    end = end.max(self.end_inclusive(i));
                    i += 1;
                    absorbed = true;
                }
                if j < other.nbrruns() && other.get_value(j) as u32 <= end.saturating_add(1) {
                    end = end.max(other.end_inclusive(j));
                    j += 1;
                    absorbed = true;
                }
                if !absorbed {
                    break;
                }
            }
            add_run(&mut out, start, end);
        }
        out
    }

    pub fn andnot(&self, other: &RunContainer) -> RunContainer {
        let mut out = RunContainer::new();
        out.runs.reserve_exact(2 * (self.nbrruns() + other.nbrruns()));
        let mut j = 0usize;
        for i in 0..self.nbrruns() {
            let mut cursor = self.get_value(i) as u32;
            let end = self.end_inclusive(i);
            while j < other.nbrruns() && other.end_inclusive(j) < cursor {
                j += 1;
            }
            while cursor <= end && j < other.nbrruns() && other.get_value(j) as u32 <= end {
                let (ystart, yend) = (other.get_value(j) as u32, other.end_inclusive(j));
                if ystart > cursor {
                    add_run(&mut out, cursor, ystart - 1);
                }
                cursor = yend + 1;
                if yend <= end {
                    j += 1;
                }
            }
            if cursor <= end {
                add_run(&mut out, cursor, end);
            }
        }
        out
    }

    pub fn xor(&self, other: &RunContainer) -> RunContainer {
        let mut out = RunContainer::new();
        out.runs.reserve_exact(2 * (self.nbrruns() + other.nbrruns()));

        // Collect boundary events: each run contributes a start and an
        // end+1 toggle point. Coverage parity (mod 2) at the cursor decides
        // whether we're inside the symmetric difference.
        let mut events: Vec<(u32, i32)> = Vec::with_capacity(2 * (self.nbrruns() + other.nbrruns()));
        for k in 0..self.nbrruns() {
            events.push((self.get_value(k) as u32, 1));
            events.push((self.end_inclusive(k) + 1, -1));
        }
        for k in 0..other.nbrruns() {
            events.push((other.get_value(k) as u32, 1));
            events.push((other.end_inclusive(k) + 1, -1));
        }
        events.sort_by_key(|&(pos, delta)| (pos, -delta));

        let mut coverage = 0i32;
        let mut open_start: Option<u32> = None;
        let mut k = 0usize;
        while k < events.len() {
            let pos = events[k].0;
            let mut delta = 0i32;
            while k < events.len() && events[k].0 == pos {
                delta += events[k].1;
                k += 1;
            }
            let before = coverage % 2;
            coverage += delta;
            let after = coverage.rem_euclid(2);
            if before == 0 && after == 1 {
                open_start = Some(pos);
            } else if before == 1 && after == 0 {
                if let Some(s) = open_start.take() {
                    if pos > s {
                        add_run(&mut out, s, pos - 1);
                    }
                }
            }
        }
        out
    }

    // --- Run x Bitmap set algebra (§4.4) ---

    pub fn and_bitmap(&self, other: &BitmapContainer) -> BitmapOrArray {
        let card_estimate = self.cardinality().min(other.len());
        if card_estimate <= crate::container::ARRAY_MAX as u64 {
            let mut vec = Vec::new();
            for i in 0..self.nbrruns() {
                for v in self.get_value(i) as u32..=self.end_inclusive(i) {
                    if other.contains(v as u16) {
                        vec.push(v as u16);
                    }
                }
            }
            BitmapOrArray::Array(ArrayContainer::from_vec_unchecked(vec))
        } else {
            let mut bits = Box::new([0u64; util::BITMAP_LENGTH]);
            bits.copy_from_slice(other.words());
            let mut cursor = 0u32;
            for i in 0..self.nbrruns() {
                let start = self.get_value(i) as u32;
                let end = self.end_inclusive(i) + 1;
                util::reset_bitmap_range(&mut bits, cursor, start);
                cursor = end;
            }
            util::reset_bitmap_range(&mut bits, cursor, util::BITMAP_LENGTH as u32 * 64);
            BitmapOrArray::Bitmap(BitmapContainer::from_raw(
                bits.iter().map(|w| w.count_ones() as u64).sum(),
                bits,
            ))
        }
    }

    pub fn or_bitmap(&self, other: &BitmapContainer) -> BitmapOrArray {
        let mut bits = Box::new(*other.words());
        for i in 0..self.nbrruns() {
            util::set_bitmap_range(&mut bits, self.get_value(i) as u32, self.end_inclusive(i) + 1);
        }
        let len = bits.iter().map(|w| w.count_ones() as u64).sum();
        if len <= crate::container::ARRAY_MAX as u64 {
            BitmapOrArray::Array(BitmapContainer::from_raw(len, bits).to_array())
        } else {
            BitmapOrArray::Bitmap(BitmapContainer::from_raw(len, bits))
        }
    }

    pub fn xor_bitmap(&self, other: &BitmapContainer) -> BitmapOrArray {
        let mut bits = Box::new(*other.words());
        for i in 0..self.nbrruns() {
            util::flip_bitmap_range(&mut bits, self.get_value(i) as u32, self.end_inclusive(i) + 1);
        }
        let len = bits.iter().map(|w| w.count_ones() as u64).sum();
        if len <= crate::container::ARRAY_MAX as u64 {
            BitmapOrArray::Array(BitmapContainer::from_raw(len, bits).to_array())
        } else {
            BitmapOrArray::Bitmap(BitmapContainer::from_raw(len, bits))
        }
    }

    pub fn andnot_bitmap(&self, other: &BitmapContainer) -> BitmapOrArray {
        let mut bits = Box::new(*other.words());
        let mut cursor = 0u32;
        for i in 0..self.nbrruns() {
            let start = self.get_value(i) as u32;
            let end = self.end_inclusive(i) + 1;
            util::reset_bitmap_range(&mut bits, cursor, start);
            util::flip_bitmap_range(&mut bits, start, end);
            cursor = end;
        }
        util::reset_bitmap_range(&mut bits, cursor, util::BITMAP_LENGTH as u32 * 64);
        let len = bits.iter().map(|w| w.count_ones() as u64).sum();
        if len <= crate::container::ARRAY_MAX as u64 {
            BitmapOrArray::Array(BitmapContainer::from_raw(len, bits).to_array())
        } else {
            BitmapOrArray::Bitmap(BitmapContainer::from_raw(len, bits))
        }
    }

    // --- Run x Array set algebra (§4.4) ---

    pub fn and_array(&self, other: &ArrayContainer) -> ArrayContainer {
        let values = other.as_slice();
        let mut out = Vec::new();
        let mut run_idx = 0usize;
        let mut pos = 0usize;
        while pos < values.len() && run_idx < self.nbrruns() {
            let v = values[pos];
            let run_end = self.end_inclusive(run_idx);
            let run_start = self.get_value(run_idx) as u32;
            if (run_end as u32) < v as u32 {
                run_idx += 1;
                continue;
            }
            if run_start > v as u32 {
                pos = util::advance_until(values, pos, run_start as u16);
                continue;
            }
            out.push(v);
            pos += 1;
        }
        ArrayContainer::from_vec_unchecked(out)
    }

    pub fn or_array(&self, other: &ArrayContainer) -> BitmapOrArray {
        let mut result = self.to_bitmap();
        for &v in other.as_slice() {
            result.insert(v);
        }
        if result.len() <= crate::container::ARRAY_MAX as u64 {
            BitmapOrArray::Array(result.to_array())
        } else {
            BitmapOrArray::Bitmap(result)
        }
    }

    pub fn xor_array(&self, other: &ArrayContainer) -> BitmapOrArray {
        let mut result = self.to_bitmap();
        for &v in other.as_slice() {
            if result.contains(v) {
                result.remove(v);
            } else {
                result.insert(v);
            }
        }
        if result.len() <= crate::container::ARRAY_MAX as u64 {
            BitmapOrArray::Array(result.to_array())
        } else {
            BitmapOrArray::Bitmap(result)
        }
    }

    pub fn andnot_array(&self, other: &ArrayContainer) -> ArrayContainer {
        let mut result = self.to_array();
        for &v in other.as_slice() {
            result.remove(v);
        }
        result
    }
}

pub enum BitmapOrArray {
    Array(ArrayContainer),
    Bitmap(BitmapContainer),
}

/// Emit a run `[start, end_inclusive]`, fusing with the previously emitted
/// run if they are adjacent or overlapping.
fn add_run(out: &mut RunContainer, start: u32, end_inclusive: u32) {
    if let Some(last) = out.nbrruns().checked_sub(1) {
        let last_end = out.end_inclusive(last);
        if start <= last_end + 1 {
            let new_end = end_inclusive.max(last_end);
            out.set_length(last, (new_end - out.get_value(last) as u32) as u16);
            return;
        }
    }
    out.runs.push(start as u16);
    out.runs.push((end_inclusive - start) as u16);
}

pub struct RunIter<'a> {
    container: &'a RunContainer,
    front_run: usize,
    front_off: u32,
    back_run: usize,
    back_off: u32,
}

impl Iterator for RunIter<'_> {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        if self.front_run >= self.back_run {
            return None;
        }
        if self.front_run + 1 == self.back_run && self.front_off + self.back_off > self.container.get_length(self.front_run) as u32
        {
            return None;
        }
        let value = self.container.get_value(self.front_run) as u32 + self.front_off;
        if self.front_off >= self.container.get_length(self.front_run) as u32 {
            self.front_run += 1;
            self.front_off = 0;
        } else {
            self.front_off += 1;
        }
        Some(value as u16)
    }
}

impl DoubleEndedIterator for RunIter<'_> {
    fn next_back(&mut self) -> Option<u16> {
        if self.front_run >= self.back_run {
            return None;
        }
        if self.back_off == 0 {
            if self.back_run == 0 {
                return None;
            }
            self.back_run -= 1;
            self.back_off = self.container.get_length(self.back_run) as u32;
        } else {
            self.back_off -= 1;
        }
        if self.front_run > self.back_run || (self.front_run == self.back_run && self.front_off > self.back_off) {
            return None;
        }
        let value = self.container.get_value(self.back_run) as u32 + self.back_off;
        Some(value as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runs(c: &RunContainer) -> Vec<(u16, u16)> {
        (0..c.nbrruns()).map(|i| (c.get_value(i), c.get_length(i))).collect()
    }

    #[test]
    fn full_covers_the_whole_universe() {
        let c = RunContainer::full();
        assert_eq!(c.cardinality(), 65536);
        assert_eq!(c.min(), Some(0));
        assert_eq!(c.max(), Some(0xFFFF));
    }

    #[test]
    fn fusion_on_add() {
        let mut c = RunContainer::from_runs_unchecked(&[(11, 4), (17, 3)]);
        assert!(c.add(16));
        assert_eq!(runs(&c), vec![(11, 9)]);
    }

    #[test]
    fn split_on_remove() {
        let mut c = RunContainer::from_runs_unchecked(&[(10, 10)]);
        assert!(c.remove(15));
        assert_eq!(runs(&c), vec![(10, 4), (16, 4)]);
    }

    #[test]
    fn range_complement() {
        let c = RunContainer::from_runs_unchecked(&[(5, 5), (20, 5)]);
        let not = c.not(0, 30).unwrap();
        assert_eq!(runs(&not), vec![(0, 4), (11, 8), (26, 3)]);
    }

    #[test]
    fn overlapping_or() {
        let a = RunContainer::from_runs_unchecked(&[(0, 10)]);
        let b = RunContainer::from_runs_unchecked(&[(5, 10)]);
        let u = a.or(&b);
        assert_eq!(runs(&u), vec![(0, 15)]);
    }

    #[test]
    fn abutting_or_fuses() {
        let a = RunContainer::from_runs_unchecked(&[(0, 9)]);
        let b = RunContainer::from_runs_unchecked(&[(10, 9)]);
        let u = a.or(&b);
        assert_eq!(runs(&u), vec![(0, 19)]);
    }

    #[test]
    fn xor_self_inverse_example() {
        let a = RunContainer::from_runs_unchecked(&[(3, 4), (12, 3)]);
        let b = RunContainer::from_runs_unchecked(&[(4, 2), (13, 1)]);
        let x = a.xor(&b);
        let elements: Vec<u16> = x.iter().collect();
        assert_eq!(elements, vec![3, 7, 12, 15]);
    }

    #[test]
    fn serialize_round_trip_example() {
        let c = RunContainer::from_runs_unchecked(&[(1, 2), (100, 0), (65530, 5)]);
        let bytes = crate::serialization::serialize_run(&c);
        assert_eq!(
            bytes,
            vec![0x03, 0x00, 0x01, 0x00, 0x02, 0x00, 0x64, 0x00, 0x00, 0x00, 0xFA, 0xFF, 0x05, 0x00]
        );
        let back = crate::serialization::deserialize_run(&bytes).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn select_rank_duality() {
        let c = RunContainer::from_runs_unchecked(&[(3, 4), (20, 2)]);
        for j in 0..c.cardinality() {
            let v = c.select(j).unwrap();
            assert_eq!(c.rank(v) - 1, j);
        }
    }

    #[test]
    fn iadd_across_boundary() {
        let mut c = RunContainer::new();
        c.iadd(100, 200).unwrap();
        c.iadd(150, 250).unwrap();
        assert_eq!(runs(&c), vec![(100, 149)]);
    }

    #[test]
    fn iadd_rejects_invalid_range() {
        let mut c = RunContainer::new();
        assert!(matches!(c.iadd(10, 10), Err(RoaringCoreError::InvalidRange { .. })));
        assert!(matches!(c.iadd(10, 70000), Err(RoaringCoreError::InvalidRange { .. })));
    }

    #[test]
    fn iadd_absorbs_a_run_straddling_the_whole_window() {
        // Two separate runs, plus the gap between them, all swallowed by one
        // added range whose own endpoints don't land on either run's start.
        let mut c = RunContainer::from_runs_unchecked(&[(10, 10), (30, 10)]); // 10..=20, 30..=40
        let added = c.iadd(15, 35).unwrap();
        assert_eq!(runs(&c), vec![(10, 30)]); // 10..=40
        assert_eq!(added, 9); // the 21..=29 gap is the only newly covered span
    }

    #[test]
    fn iadd_leaves_untouched_runs_alone() {
        let mut c = RunContainer::from_runs_unchecked(&[(0, 2), (10, 2)]);
        c.iadd(5, 8).unwrap();
        assert_eq!(runs(&c), vec![(0, 2), (5, 2), (10, 2)]);
    }

    #[test]
    fn iremove_splits_a_run_whose_interior_is_not_a_run_start() {
        // Regression: `search` only matched exact run starts, so a range
        // landing entirely inside a run's interior used to be a silent no-op.
        let mut c = RunContainer::from_runs_unchecked(&[(10, 20)]); // covers 10..=30
        let removed = c.iremove(15, 25).unwrap();
        assert_eq!(removed, 10); // 15..=24
        assert_eq!(runs(&c), vec![(10, 4), (25, 5)]);
    }

    #[test]
    fn iremove_straddles_multiple_runs_without_losing_the_tail() {
        // Regression: the old fallback branch could drop an entire run that
        // the removed range didn't fully cover, losing elements that should
        // have survived.
        let mut c = RunContainer::from_runs_unchecked(&[(10, 10), (30, 10)]); // 10..=20, 30..=40
        let removed = c.iremove(15, 35).unwrap();
        assert_eq!(removed, 11); // 15..=20 (6) + 30..=34 (5)
        assert_eq!(runs(&c), vec![(10, 4), (35, 5)]);
    }

    #[test]
    fn iremove_drops_a_run_entirely_enclosed_by_the_range() {
        let mut c = RunContainer::from_runs_unchecked(&[(10, 10), (30, 10), (50, 10)]);
        let removed = c.iremove(15, 45).unwrap();
        assert_eq!(runs(&c), vec![(10, 4), (50, 10)]);
        assert_eq!(removed, 17); // 15..=20 (6) + all of 30..=40 (11)
    }

    #[test]
    fn iremove_on_an_untouched_range_is_a_no_op() {
        let mut c = RunContainer::from_runs_unchecked(&[(10, 10), (30, 10)]);
        assert_eq!(c.iremove(21, 29).unwrap(), 0);
        assert_eq!(runs(&c), vec![(10, 10), (30, 10)]);
    }

    #[test]
    fn iremove_trims_only_the_tail_of_a_single_run() {
        let mut c = RunContainer::from_runs_unchecked(&[(10, 10)]); // 10..=20
        assert_eq!(c.iremove(5, 16).unwrap(), 6); // 10..=15
        assert_eq!(runs(&c), vec![(16, 4)]);
    }

    #[test]
    fn not_is_involution() {
        let c = RunContainer::from_runs_unchecked(&[(5, 5), (20, 5)]);
        let twice = c.not(0, 65536).unwrap().not(0, 65536).unwrap();
        assert_eq!(runs(&twice), runs(&c));
    }

    #[test]
    fn reverse_iterator_matches_forward_reversed() {
        let c = RunContainer::from_runs_unchecked(&[(3, 2), (10, 1)]);
        let fwd: Vec<u16> = c.iter().collect();
        let mut rev: Vec<u16> = c.iter().rev().collect();
        rev.reverse();
        assert_eq!(fwd, rev);
    }
}
