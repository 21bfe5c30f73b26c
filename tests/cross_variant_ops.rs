//! Cross-variant set algebra: each binary operator exercised across all
//! three container encodings, checked against a `Vec<u16>`/set reference
//! rather than another container implementation.

use std::collections::BTreeSet;

use roaring_core::Container;

fn array_container(values: &[u16]) -> Container {
    let mut c = Container::new();
    for &v in values {
        c.add(v);
    }
    c
}

fn run_container(values: &[u16]) -> Container {
    let mut c = array_container(values);
    c.run_optimize();
    c
}

fn bitmap_container(values: &[u16]) -> Container {
    let mut c = Container::new();
    for v in 0..=u16::MAX {
        if values.contains(&v) {
            c.add(v);
        }
    }
    // Force the bitmap encoding regardless of how sparse `values` is by
    // padding past the array threshold, then removing the padding.
    for v in 0..=(roaring_core::ARRAY_MAX as u32 + 1) {
        c.add(v as u16);
    }
    for v in 0..=(roaring_core::ARRAY_MAX as u32 + 1) {
        if !values.contains(&(v as u16)) {
            c.remove(v as u16);
        }
    }
    c
}

fn to_set(c: &Container) -> BTreeSet<u16> {
    c.iter().collect()
}

fn check_all_pairs(a: &[u16], b: &[u16]) {
    let variants_a = [array_container(a), run_container(a), bitmap_container(a)];
    let variants_b = [array_container(b), run_container(b), bitmap_container(b)];

    let expected_and: BTreeSet<u16> = to_set_ref(a).intersection(&to_set_ref(b)).copied().collect();
    let expected_or: BTreeSet<u16> = to_set_ref(a).union(&to_set_ref(b)).copied().collect();
    let expected_xor: BTreeSet<u16> = to_set_ref(a).symmetric_difference(&to_set_ref(b)).copied().collect();
    let expected_andnot: BTreeSet<u16> = to_set_ref(a).difference(&to_set_ref(b)).copied().collect();

    for ca in &variants_a {
        for cb in &variants_b {
            assert_eq!(to_set(&(ca & cb)), expected_and, "and mismatch");
            assert_eq!(to_set(&(ca | cb)), expected_or, "or mismatch");
            assert_eq!(to_set(&(ca ^ cb)), expected_xor, "xor mismatch");
            assert_eq!(to_set(&(ca - cb)), expected_andnot, "andnot mismatch");
        }
    }
}

fn to_set_ref(values: &[u16]) -> BTreeSet<u16> {
    values.iter().copied().collect()
}

#[test]
fn overlapping_contiguous_ranges() {
    let a: Vec<u16> = (0..200).collect();
    let b: Vec<u16> = (100..300).collect();
    check_all_pairs(&a, &b);
}

#[test]
fn disjoint_ranges() {
    let a: Vec<u16> = (0..50).collect();
    let b: Vec<u16> = (1000..1050).collect();
    check_all_pairs(&a, &b);
}

#[test]
fn scattered_sparse_sets() {
    let a: Vec<u16> = (0..2000).step_by(13).collect();
    let b: Vec<u16> = (0..2000).step_by(17).collect();
    check_all_pairs(&a, &b);
}

#[test]
fn one_side_empty() {
    let a: Vec<u16> = (0..100).collect();
    let b: Vec<u16> = Vec::new();
    check_all_pairs(&a, &b);
}

#[test]
fn identical_sets_xor_to_empty() {
    let a: Vec<u16> = (0..500).collect();
    let result = &run_container(&a) ^ &array_container(&a);
    assert_eq!(result.cardinality(), 0);
}

#[test]
fn andnot_is_not_commutative() {
    let a = run_container(&[1, 2, 3, 4, 5]);
    let b = array_container(&[3, 4, 5, 6, 7]);
    let a_minus_b: BTreeSet<u16> = to_set(&(&a - &b));
    let b_minus_a: BTreeSet<u16> = to_set(&(&b - &a));
    assert_eq!(a_minus_b, BTreeSet::from([1, 2]));
    assert_eq!(b_minus_a, BTreeSet::from([6, 7]));
}
