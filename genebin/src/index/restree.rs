use std::collections::{BTreeSet, HashMap};

use crate::genome::GenomicRegion;

/// The default coarsest bin width of a [`ResolutionTree`], wide enough to
/// cover any chromosome in one root bin
pub const DEFAULT_MAX_WIDTH: u32 = 1_000_000_000;
/// The default finest (leaf) bin width of a [`ResolutionTree`]
pub const DEFAULT_MIN_WIDTH: u32 = 1_000;
/// The default factor between adjacent bin widths
pub const DEFAULT_BRANCHING: u32 = 10;

/// One node of a [`ResolutionTree`]: a bin of `width` bases starting at
/// `start`, holding the indices (into the sorted feature list) of every
/// feature whose span touches it.
#[derive(Debug)]
pub struct TreeNode {
    pub level: u32,
    pub bin: u32,
    pub start: u32,
    pub width: u32,
    pub indices: BTreeSet<usize>,
}

/// A multi-resolution interval tree over one chromosome's features.
///
/// Bin widths grow geometrically from the leaf width up to a root width
/// covering the whole chromosome, so locating the nodes nearest to a
/// position takes one map probe per level regardless of how large the
/// queried span is. A node exists only where at least one feature touches
/// its span.
///
/// Bin boundaries depend on the full feature set, so the tree is rebuilt
/// rather than patched: [`add`][Self::add] marks the tree dirty and
/// [`rebuild`][Self::rebuild] reconstructs it. Queries never rebuild
/// implicitly; they are `&self` and safe for concurrent readers of a built
/// tree.
pub struct ResolutionTree<T> {
    branching: u32,
    // Coarsest first; the finest entry is the leaf width.
    widths: Vec<u32>,
    features: Vec<(GenomicRegion, T)>,
    nodes: HashMap<u32, HashMap<u32, TreeNode>>,
    dirty: bool,
}

impl<T> Default for ResolutionTree<T> {
    fn default() -> Self {
        ResolutionTree::new()
    }
}

impl<T> ResolutionTree<T> {
    pub fn new() -> Self {
        ResolutionTree::with_widths(DEFAULT_MAX_WIDTH, DEFAULT_MIN_WIDTH, DEFAULT_BRANCHING)
    }

    pub fn with_widths(max_width: u32, min_width: u32, branching: u32) -> Self {
        assert!(branching >= 2, "branching factor must be at least 2");
        assert!(
            min_width > 0 && min_width <= max_width,
            "leaf width must be positive and at most the root width"
        );
        let mut widths = Vec::new();
        let mut width = max_width;
        loop {
            widths.push(width);
            if width / branching < min_width {
                break;
            }
            width /= branching;
        }
        ResolutionTree {
            branching,
            widths,
            features: Vec::new(),
            nodes: HashMap::new(),
            dirty: false,
        }
    }

    pub fn branching(&self) -> u32 {
        self.branching
    }

    /// The coarsest bin width, covering the whole chromosome at the root.
    pub fn root_width(&self) -> u32 {
        self.widths[0]
    }

    /// The finest bin width actually built: the last width in the geometric
    /// sequence from the root that is still at least the configured minimum.
    pub fn leaf_width(&self) -> u32 {
        self.widths[self.widths.len() - 1]
    }

    /// Queues a feature for the next [`rebuild`][Self::rebuild].
    pub fn add(&mut self, region: GenomicRegion, value: T) {
        self.features.push((region, value));
        self.dirty = true;
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Whether features were added since the last [`rebuild`][Self::rebuild].
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The feature list in its current order: (start, end)-sorted after a
    /// rebuild, insertion-ordered before the first one.
    pub fn features(&self) -> &[(GenomicRegion, T)] {
        &self.features
    }

    /// Reconstructs every node from the full feature set.
    ///
    /// Features are sorted by (start, end); each feature's index is recorded
    /// at the start-bin and end-bin node of every width on the way down, and
    /// at the leaf width in every bin the feature actually spans.
    pub fn rebuild(&mut self) {
        self.features
            .sort_by(|a, b| (a.0.start(), a.0.end()).cmp(&(b.0.start(), b.0.end())));
        self.nodes.clear();
        for index in 0..self.features.len() {
            let region = &self.features[index].0;
            let (start, end) = (region.start(), region.end());
            let leaf_level = self.widths.len() - 1;
            for level in 0..self.widths.len() {
                let width = self.widths[level];
                if level == leaf_level {
                    for bin in start / width..=end / width {
                        touch(&mut self.nodes, level as u32, width, bin)
                            .indices
                            .insert(index);
                    }
                } else {
                    touch(&mut self.nodes, level as u32, width, start / width)
                        .indices
                        .insert(index);
                    if end / width != start / width {
                        touch(&mut self.nodes, level as u32, width, end / width)
                            .indices
                            .insert(index);
                    }
                }
            }
        }
        self.dirty = false;
    }

    /// The finest built node whose bin contains `position`, probing widths
    /// from the leaf upward. `None` when the position is outside every node.
    pub fn closest_node(&self, position: u32) -> Option<&TreeNode> {
        debug_assert!(!self.dirty, "tree queried while dirty; call rebuild() first");
        for &width in self.widths.iter().rev() {
            let node = self
                .nodes
                .get(&width)
                .and_then(|bins| bins.get(&(position / width)));
            if node.is_some() {
                return node;
            }
        }
        None
    }

    /// The features plausibly overlapping `[start, end]`, as a slice of the
    /// sorted feature list.
    ///
    /// This unions the index sets of the closest nodes at both endpoints and
    /// returns the contiguous range between their minimum and maximum. It is
    /// an approximation that trades exactness for a logarithmic descent:
    /// exact at leaf resolution (leaf bins cover every spanned offset), but
    /// coarse endpoints can pull in extra neighbors. Filter the result when
    /// exact overlaps are required.
    pub fn search(&self, start: u32, end: u32) -> &[(GenomicRegion, T)] {
        debug_assert!(!self.dirty, "tree queried while dirty; call rebuild() first");
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        let mut lo = usize::MAX;
        let mut hi = 0;
        let mut any = false;
        for node in [self.closest_node(start), self.closest_node(end)]
            .into_iter()
            .flatten()
        {
            if let (Some(&first), Some(&last)) =
                (node.indices.iter().next(), node.indices.iter().next_back())
            {
                any = true;
                lo = lo.min(first);
                hi = hi.max(last);
            }
        }
        if !any {
            return &[];
        }
        &self.features[lo..=hi]
    }
}

fn touch(
    nodes: &mut HashMap<u32, HashMap<u32, TreeNode>>,
    level: u32,
    width: u32,
    bin: u32,
) -> &mut TreeNode {
    nodes
        .entry(width)
        .or_insert_with(HashMap::new)
        .entry(bin)
        .or_insert_with(|| TreeNode {
            level,
            bin,
            start: bin * width,
            width,
            indices: BTreeSet::new(),
        })
}
