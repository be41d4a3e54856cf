use super::*;

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::collections::BTreeMap;

/// Structural snapshot of a subtree, independent of handles and ordinals.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Shape<A> {
    mask: A,
    key: A,
    range: Option<(A, A)>,
    children: [Option<Box<Shape<A>>>; 2],
}

pub(crate) fn shape<A: Address, V>(t: &RangeTree<A, V>) -> Option<Shape<A>> {
    fn rec<A: Address, V>(t: &RangeTree<A, V>, id: NodeId) -> Shape<A> {
        let node = t.pool.get(id);
        Shape {
            mask: node.mask,
            key: node.key(),
            range: node.as_leaf().map(|leaf| (leaf.start, leaf.end)),
            children: node.children.map(|c| c.map(|c| Box::new(rec(t, c)))),
        }
    }
    t.root.map(|root| rec(t, root))
}

pub(crate) fn validate_tree<A: Address, V>(t: &RangeTree<A, V>) {
    let mut stack: Vec<NodeId> = t.root.into_iter().collect();
    let mut leaf_count = 0usize;
    let mut split_count = 0usize;

    while let Some(id) = stack.pop() {
        let node = t.pool.get(id);

        match &node.kind {
            NodeKind::Leaf(leaf) => {
                leaf_count += 1;
                assert!(leaf.start < leaf.end, "leaf range must be non-empty");
                assert_eq!(
                    node.mask,
                    mask::common_mask(leaf.start, leaf.end),
                    "leaf mask must match its range"
                );
                assert_eq!(leaf.handle.node_id(), id, "leaf handle must name its slot");
                assert!(
                    t.get(leaf.handle).is_some(),
                    "reachable leaf must resolve through its handle"
                );
                assert_eq!(
                    t.lookup(leaf.start).map(Leaf::handle),
                    Some(leaf.handle),
                    "lookup of a leaf's start must find it"
                );
            }
            NodeKind::Split { split_point } => {
                split_count += 1;
                assert_eq!(node.child_count(), 2, "split node must have two children");
                assert_eq!(
                    *split_point,
                    mask::split_point(*split_point, node.mask),
                    "split point must be the top of the 0-side half"
                );
            }
        }

        for (side, child) in node.children.into_iter().enumerate() {
            let Some(child) = child else { continue };
            let c = t.pool.get(child);
            assert!(
                mask::is_wider(node.mask, c.mask),
                "child mask must be narrower than its parent's"
            );
            assert!(
                !mask::prefix_diverges(node.key(), c.key(), node.mask),
                "child must share its parent's prefix"
            );
            assert_eq!(
                mask::child_index(node.mask, c.key()),
                side,
                "child must hang on the side its key selects"
            );
            stack.push(child);
        }
    }

    assert_eq!(leaf_count, t.len(), "reachable leaf count must match RangeTree::len");
    assert_eq!(
        split_count,
        t.split_count(),
        "every live split node must be reachable"
    );

    let ranges: Vec<(A, A)> = t.iter().map(|leaf| (leaf.start, leaf.end)).collect();
    assert_eq!(ranges.len(), leaf_count);
    for pair in ranges.windows(2) {
        assert!(
            pair[0].1 <= pair[1].0,
            "iteration must be ascending and disjoint"
        );
    }
}

fn addr_strategy() -> impl Strategy<Value = u32> {
    prop_oneof![
        4 => 0u32..0x2_0000,
        1 => any::<u32>(),
    ]
}

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    #[proptest(weight = 5)]
    Insert(
        #[proptest(strategy = "addr_strategy()")] u32,
        #[proptest(strategy = "0u32..0x3000")] u32,
    ),
    #[proptest(weight = 2)]
    Remove(#[proptest(strategy = "addr_strategy()")] u32),
    #[proptest(weight = 1)]
    RemoveRange(
        #[proptest(strategy = "addr_strategy()")] u32,
        #[proptest(strategy = "0u32..0x8000")] u32,
    ),
    #[proptest(weight = 3)]
    Lookup(#[proptest(strategy = "addr_strategy()")] u32),
    #[proptest(weight = 1)]
    LookupEndInclusive(#[proptest(strategy = "addr_strategy()")] u32),
    #[proptest(weight = 2)]
    Overlaps(
        #[proptest(strategy = "addr_strategy()")] u32,
        #[proptest(strategy = "0u32..0x8000")] u32,
    ),
    #[proptest(weight = 1)]
    IterRange(
        #[proptest(strategy = "addr_strategy()")] u32,
        #[proptest(strategy = "0u32..0x8000")] u32,
    ),
}

type Model = BTreeMap<u32, (u32, LeafHandle)>;

fn model_hits(m: &Model, start: u32, end: u32) -> Vec<u32> {
    if end <= start {
        return Vec::new();
    }
    m.iter()
        .filter(|&(&s, &(e, _))| s < end && start < e)
        .map(|(&s, _)| s)
        .collect()
}

fn model_lookup(m: &Model, address: u32) -> Option<u32> {
    m.range(..=address)
        .next_back()
        .filter(|&(_, &(e, _))| address < e)
        .map(|(&s, _)| s)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(ops in prop::collection::vec(any::<Op>(), 0..=600)) {
        let mut t: RangeTree<u32, u32> = RangeTree::new();
        let mut m: Model = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(start, len) => {
                    let end = start.saturating_add(len);
                    let got = t.insert(start, end, start);
                    if end <= start {
                        let is_invalid_range = matches!(got, Err(RangeTreeError::InvalidRange { .. }));
                        prop_assert!(is_invalid_range);
                    } else if !model_hits(&m, start, end).is_empty() {
                        let is_overlap = matches!(got, Err(RangeTreeError::Overlap { .. }));
                        prop_assert!(is_overlap);
                    } else {
                        let handle = got.map_err(|e| TestCaseError::fail(e.to_string()))?;
                        m.insert(start, (end, handle));
                    }
                }
                Op::Remove(address) => {
                    let victim = m
                        .range(address..)
                        .next()
                        .or_else(|| m.iter().next())
                        .map(|(&s, &(_, h))| (s, h));
                    if let Some((start, handle)) = victim {
                        prop_assert_eq!(t.remove(handle), Some(start));
                        prop_assert_eq!(t.remove(handle), None);
                        m.remove(&start);
                    }
                }
                Op::RemoveRange(start, len) => {
                    let end = start.saturating_add(len);
                    let expected = model_hits(&m, start, end);
                    let got: Vec<u32> = t.remove_range(start, end).iter().map(Leaf::start).collect();
                    prop_assert_eq!(&got, &expected);
                    for s in expected {
                        m.remove(&s);
                    }
                    validate_tree(&t);
                    let remaining: Vec<(u32, u32)> = m.iter().map(|(&s, &(e, _))| (s, e)).collect();
                    prop_assert_eq!(shape(&t), shape(&build(&remaining)));
                }
                Op::Lookup(address) => {
                    prop_assert_eq!(t.lookup(address).map(Leaf::start), model_lookup(&m, address));
                }
                Op::LookupEndInclusive(address) => {
                    let expected = address
                        .checked_sub(1)
                        .and_then(|below| model_lookup(&m, below));
                    prop_assert_eq!(
                        t.lookup_end_inclusive(address).map(Leaf::start),
                        expected
                    );
                }
                Op::Overlaps(start, len) => {
                    let end = start.saturating_add(len);
                    prop_assert_eq!(
                        t.overlaps(start, end),
                        !model_hits(&m, start, end).is_empty()
                    );
                }
                Op::IterRange(start, len) => {
                    let end = start.saturating_add(len);
                    let got: Vec<u32> = t.iter_range(start, end).map(Leaf::start).collect();
                    prop_assert_eq!(got, model_hits(&m, start, end));
                }
            }

            prop_assert_eq!(t.len(), m.len());
        }

        validate_tree(&t);
        let got: Vec<(u32, u32)> = t.iter().map(|leaf| (leaf.start(), leaf.end())).collect();
        let expected: Vec<(u32, u32)> = m.iter().map(|(&s, &(e, _))| (s, e)).collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_shape_independent_of_order(
        (sorted, shuffled) in disjoint_ranges().prop_flat_map(|ranges| {
            (Just(ranges.clone()), Just(ranges).prop_shuffle())
        })
    ) {
        let a = build(&sorted);
        let b = build(&shuffled);
        validate_tree(&b);
        prop_assert_eq!(shape(&a), shape(&b));
        prop_assert_eq!(a.split_count(), b.split_count());
    }

    #[test]
    fn prop_removal_restores_canonical_shape(
        (ranges, order) in disjoint_ranges().prop_flat_map(|ranges| {
            let order: Vec<usize> = (0..ranges.len()).collect();
            (Just(ranges), Just(order).prop_shuffle())
        })
    ) {
        let mut t = build(&ranges);
        let handles: Vec<LeafHandle> = t.iter().map(Leaf::handle).collect();
        let mut remaining: Vec<(u32, u32)> = ranges.clone();

        for i in order {
            let (start, end) = ranges[i];
            prop_assert_eq!(t.remove(handles[i]), Some(start));
            remaining.retain(|&r| r != (start, end));
            validate_tree(&t);
            prop_assert_eq!(shape(&t), shape(&build(&remaining)));
        }
        prop_assert!(t.is_empty());
        prop_assert_eq!(t.split_count(), 0);
    }
}

/// Sorted, disjoint, non-empty ranges at mixed granularities.
fn disjoint_ranges() -> impl Strategy<Value = Vec<(u32, u32)>> {
    prop::collection::vec((0u32..0x40, 1u32..0x40, 0u32..12), 1..24).prop_map(|parts| {
        let mut cursor = 0u32;
        let mut out = Vec::with_capacity(parts.len());
        for (gap, len, shift) in parts {
            let start = cursor + (gap << shift);
            let end = start + (len << shift);
            out.push((start, end));
            cursor = end;
        }
        out
    })
}

fn build(ranges: &[(u32, u32)]) -> RangeTree<u32, u32> {
    let mut t = RangeTree::new();
    for &(start, end) in ranges {
        t.insert(start, end, start).expect("disjoint ranges must insert");
    }
    t
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

/// Nested leaves, split nodes and a top-half range, so every linking path runs.
const SMALL_SET: [(u32, u32); 6] = [
    (0x1000, 0x2000),
    (0x0, 0x100),
    (0x2000, 0x2100),
    (0x5000, 0x6000),
    (0x3000, 0x4000),
    (0x8000_0000, 0x8000_1000),
];

#[test]
fn exhaustive_insert_order_small_set() {
    let expected = shape(&build(&SMALL_SET));

    for_each_permutation(&SMALL_SET, |perm| {
        let t = build(&perm);
        validate_tree(&t);
        assert_eq!(shape(&t), expected);
        let starts: Vec<u32> = t.iter().map(Leaf::start).collect();
        let mut sorted: Vec<u32> = SMALL_SET.iter().map(|&(s, _)| s).collect();
        sorted.sort_unstable();
        assert_eq!(starts, sorted);
    });
}

#[test]
fn exhaustive_remove_order_small_set() {
    let base = build(&SMALL_SET);

    for_each_permutation(&SMALL_SET, |perm| {
        let mut t = base.clone();
        let mut remaining = SMALL_SET.to_vec();

        for (start, end) in perm {
            let handle = t.lookup(start).map(Leaf::handle).expect("range is registered");
            assert_eq!(t.remove(handle), Some(start));
            remaining.retain(|&r| r != (start, end));
            validate_tree(&t);
            assert_eq!(shape(&t), shape(&build(&remaining)));
        }
        assert!(t.is_empty());
        assert!(t.root.is_none());
        assert_eq!(t.pool.live(), 0);
    });
}

#[test]
fn u64_addresses_use_full_width() {
    let mut t: RangeTree<u64, ()> = RangeTree::new();
    let ranges = [
        (0x0000_7fff_0000_0000, 0x0000_7fff_0010_0000),
        (0xffff_8000_0000_0000, 0xffff_8000_0100_0000),
        (0x0000_0000_0040_0000, 0x0000_0000_0050_0000),
    ];
    for &(s, e) in &ranges {
        t.insert(s, e, ()).unwrap();
    }
    validate_tree(&t);
    for &(s, e) in &ranges {
        assert_eq!(t.lookup(s).map(Leaf::start), Some(s));
        assert_eq!(t.lookup(e - 1).map(Leaf::start), Some(s));
        assert!(t.lookup(e).is_none());
    }
}
