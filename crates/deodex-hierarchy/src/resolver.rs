//! Common-superclass resolution.
//!
//! Ported semantics of the verifier's type-merge rules: concrete classes
//! meet at the nearest common ancestor found by a depth-equalizing
//! lock-step walk; arrays merge covariantly on their element types;
//! a single direct interface-implementation relationship wins outright.
//!
//! Interface handling is deliberately lazy: when two unrelated concrete
//! classes share an interface, the merge still answers with the nearest
//! common *class* ancestor (usually the root). Picking one of several
//! common interfaces would need consumer context this tool does not
//! have, so interface information is discarded at that point.

use crate::universe::{ClassId, ClassUniverse};

/// Number of superclass hops from `class` to the root; the root is 0.
pub fn depth_of(universe: &ClassUniverse, class: ClassId) -> u32 {
    let mut depth = 0;
    let mut current = class;
    while let Some(superclass) = universe.class(current).superclass {
        current = superclass;
        depth += 1;
    }
    depth
}

/// Raises the deeper class to the shallower one's depth, then advances
/// both in lock-step until they meet.
///
/// Panics if the chains exhaust without meeting; linked records always
/// share the root, so that would mean the universe itself is malformed
/// and any answer would be wrong.
fn lockstep_ancestor(universe: &ClassUniverse, mut c1: ClassId, mut c2: ClassId) -> ClassId {
    let mut depth1 = depth_of(universe, c1);
    let mut depth2 = depth_of(universe, c2);
    while depth1 > depth2 {
        c1 = parent(universe, c1);
        depth1 -= 1;
    }
    while depth2 > depth1 {
        c2 = parent(universe, c2);
        depth2 -= 1;
    }
    while c1 != c2 {
        c1 = parent(universe, c1);
        c2 = parent(universe, c2);
    }
    c1
}

fn parent(universe: &ClassUniverse, class: ClassId) -> ClassId {
    universe.class(class).superclass.unwrap_or_else(|| {
        panic!(
            "hierarchy has no common root above {}",
            universe.descriptor(class)
        )
    })
}

/// Merges two array classes with non-primitive elements.
///
/// Equal dimensions merge the element types and wrap the result back up;
/// `[Ljava/lang/String; ⊔ [Ljava/lang/Integer;` is an array of the
/// elements' common superclass. Mismatched dimensions collapse to an
/// array of the root at the shallower dimension, since no other element
/// type can describe an array of unrelated depth.
fn merge_array_types(universe: &mut ClassUniverse, c1: ClassId, c2: ClassId) -> ClassId {
    let (dim1, elem1) = array_shape(universe, c1);
    let (dim2, elem2) = array_shape(universe, c2);

    let (dims, mut merged) = if dim1 == dim2 {
        (dim1, common_superclass(universe, elem1, elem2))
    } else {
        (dim1.min(dim2), universe.root())
    };
    for _ in 0..dims {
        merged = universe.array_class_of(merged);
    }
    merged
}

fn array_shape(universe: &ClassUniverse, class: ClassId) -> (u16, ClassId) {
    let record = universe.class(class);
    match record.element {
        Some(element) => (record.array_dim, element),
        None => panic!("{} is not an array class", record.descriptor),
    }
}

/// The first common superclass of two non-primitive classes.
///
/// Needs `&mut` only to synthesize array records for merge results; the
/// existing graph is never touched.
pub fn common_superclass(universe: &mut ClassUniverse, c1: ClassId, c2: ClassId) -> ClassId {
    debug_assert!(
        !universe.class(c1).is_primitive && !universe.class(c2).is_primitive,
        "common_superclass called with a primitive type"
    );

    if c1 == c2 {
        return c1;
    }

    if universe.class(c1).is_interface && universe.implements_interface(c2, c1) {
        return c1;
    }
    if universe.class(c2).is_interface && universe.implements_interface(c1, c2) {
        return c2;
    }

    let both_arrays_of_references = {
        let (r1, r2) = (universe.class(c1), universe.class(c2));
        match (r1.element, r2.element) {
            (Some(e1), Some(e2)) => {
                !universe.class(e1).is_primitive && !universe.class(e2).is_primitive
            }
            _ => false,
        }
    };
    if both_arrays_of_references {
        return merge_array_types(universe, c1, c2);
    }

    lockstep_ancestor(universe, c1, c2)
}
