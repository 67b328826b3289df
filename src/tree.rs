//! k-ary tree construction over a PE subgroup (spec §4.6), and the
//! full-group tree cache precomputed at init (spec §3 "Full-tree cache").

use crate::transport::Pe;

/// The calling PE's position in a k-ary tree built over some PE subgroup:
/// its parent (itself, if it is the root) and its children, both as
/// physical PE ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeNode {
    pub parent: Pe,
    pub children: Vec<Pe>,
}

impl TreeNode {
    /// Whether the calling PE is the root of this tree (its own parent).
    pub fn is_root(&self, caller_pe: Pe) -> bool {
        self.parent == caller_pe
    }
}

/// Build a k-ary tree over the arithmetic progression of PEs `{start,
/// start+stride, ..., start+(size-1)*stride}`, rooted at the PE at logical
/// index `root`, and return `caller_pe`'s parent and children (spec §4.6).
///
/// Numbering is relative: the root becomes logical rank 0 via rotation, so
/// logical rank `r` has parent `(r-1)/radix` (or itself, if `r == 0`) and
/// children `{radix*r+1 .. radix*r+radix}` clipped to `< size`. Logical
/// ranks map back to physical PEs via `start + ((l + root) % size) *
/// stride`.
pub fn build_kary_tree(start: Pe, stride: Pe, size: i32, root: i32, radix: usize, caller_pe: Pe) -> TreeNode {
    assert!(size > 0, "PE_size must be positive");
    assert!(radix >= 1, "tree_radix must be at least 1");

    let r = to_logical(start, stride, size, root, caller_pe);
    let radix = radix as i32;

    let parent_logical = if r == 0 { 0 } else { (r - 1) / radix };
    let parent = to_physical(start, stride, size, root, parent_logical);

    let first_child = radix * r + 1;
    let last_child = radix * r + radix;
    let children = (first_child..=last_child)
        .filter(|&c| c < size)
        .map(|logical| to_physical(start, stride, size, root, logical))
        .collect();

    TreeNode { parent, children }
}

/// Map a logical rank (root-relative, rotated so the root is rank 0) back to
/// its physical PE id within the `{start, start+stride, ...}` progression.
pub fn to_physical(start: Pe, stride: Pe, size: i32, root: i32, logical: i32) -> Pe {
    start + ((logical + root).rem_euclid(size)) * stride
}

/// Inverse of [`to_physical`]: the logical rank of a physical PE within the
/// progression rooted at logical index `root`.
pub fn to_logical(start: Pe, stride: Pe, size: i32, root: i32, physical: Pe) -> i32 {
    ((physical - start) / stride - root).rem_euclid(size)
}

/// The full-group tree precomputed at init for `(PE_start=0, stride=1,
/// PE_size=num_pes, root=0)`, reused by every collective that runs over the
/// entire world with root PE 0 (spec §3, §4.7).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FullTreeCache {
    node: TreeNode,
}

impl FullTreeCache {
    pub fn build(num_pes: i32, radix: usize, my_pe: Pe) -> Self {
        Self {
            node: build_kary_tree(0, 1, num_pes, 0, radix, my_pe),
        }
    }

    pub fn node(&self) -> &TreeNode {
        &self.node
    }
}
