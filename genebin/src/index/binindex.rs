use std::collections::{BTreeMap, HashMap, HashSet};

use crate::genome::{Chromosome, GenomicRegion};

/// The default bin width used when constructing a [`BinIndex`]
pub const DEFAULT_BIN_WIDTH: u32 = 10_000;

struct ChromBins<T> {
    // Features live once here; bins hold indices into this arena, so a
    // feature spanning many bins is still a single entry.
    features: Vec<(GenomicRegion, T)>,
    bins: BTreeMap<u32, Vec<usize>>,
}

impl<T> ChromBins<T> {
    fn new() -> Self {
        ChromBins {
            features: Vec::new(),
            bins: BTreeMap::new(),
        }
    }
}

/// A fixed-width bin index over genomic features.
///
/// Each feature is registered in every bin its region spans, so range
/// lookups only have to visit the bins a query touches. Construction is
/// single-writer; every query takes `&self` and is safe for concurrent
/// readers once loading is done.
pub struct BinIndex<T> {
    bin_width: u32,
    size: usize,
    chroms: HashMap<Chromosome, ChromBins<T>>,
}

impl<T> Default for BinIndex<T> {
    fn default() -> Self {
        BinIndex::new()
    }
}

impl<T> BinIndex<T> {
    pub fn new() -> Self {
        BinIndex::with_bin_width(DEFAULT_BIN_WIDTH)
    }

    pub fn with_bin_width(bin_width: u32) -> Self {
        assert!(bin_width > 0, "bin width must be positive");
        BinIndex {
            bin_width,
            size: 0,
            chroms: HashMap::new(),
        }
    }

    pub fn bin_width(&self) -> u32 {
        self.bin_width
    }

    /// Total number of insertions, not the number of bin registrations.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Registers `feature` in every bin `region` spans.
    ///
    /// Values are not deduplicated across calls: adding an equal value twice
    /// yields two independent entries.
    pub fn add(&mut self, region: GenomicRegion, feature: T) {
        let width = self.bin_width;
        let chrom_bins = self
            .chroms
            .entry(region.chrom().clone())
            .or_insert_with(ChromBins::new);
        let index = chrom_bins.features.len();
        let first = region.start() / width;
        let last = region.end() / width;
        chrom_bins.features.push((region, feature));
        for bin in first..=last {
            chrom_bins.bins.entry(bin).or_insert_with(Vec::new).push(index);
        }
        self.size += 1;
    }

    // Deduplicated arena indices of every feature registered in a bin the
    // span touches, in bin-traversal order.
    fn indices_in_range(&self, chrom: &Chromosome, start: u32, end: u32) -> Option<(&ChromBins<T>, Vec<usize>)> {
        let chrom_bins = self.chroms.get(chrom)?;
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        let first = start / self.bin_width;
        let last = end / self.bin_width;
        let mut seen = HashSet::new();
        let mut indices = Vec::new();
        for (_, bin_indices) in chrom_bins.bins.range(first..=last) {
            for &index in bin_indices {
                if seen.insert(index) {
                    indices.push(index);
                }
            }
        }
        Some((chrom_bins, indices))
    }

    /// Every feature registered in a bin spanned by `[start, end]`.
    ///
    /// Bin membership is coarser than exact overlap, so results can extend
    /// past the queried span; use [`overlapping_features`][Self::overlapping_features]
    /// for exact filtering. An unknown chromosome yields an empty result.
    pub fn features_in_range(&self, chrom: &Chromosome, start: u32, end: u32) -> Vec<&T> {
        match self.indices_in_range(chrom, start, end) {
            Some((chrom_bins, indices)) => indices
                .into_iter()
                .map(|i| &chrom_bins.features[i].1)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Features overlapping `region` by at least `min_overlap` bases, keyed
    /// by the exact overlapping sub-region.
    ///
    /// A `min_overlap` of -1 accepts any positive overlap. One query can
    /// overlap several sub-regions of a composite feature (exons registered
    /// separately, say); each sub-region maps to its own set of values.
    pub fn overlapping_features(
        &self,
        region: &GenomicRegion,
        min_overlap: i32,
    ) -> BTreeMap<GenomicRegion, Vec<&T>> {
        let mut results = BTreeMap::new();
        let found = self.indices_in_range(region.chrom(), region.start(), region.end());
        let (chrom_bins, indices) = match found {
            Some(found) => found,
            None => return results,
        };
        let threshold = if min_overlap < 1 { 1 } else { min_overlap as u32 };
        for index in indices {
            let (feature_region, value) = &chrom_bins.features[index];
            // Same chromosome by construction of the per-chromosome bins.
            if let Ok(Some(shared)) = region.intersection(feature_region) {
                if shared.len() >= threshold {
                    results.entry(shared).or_insert_with(Vec::new).push(value);
                }
            }
        }
        results
    }

    /// Short-circuiting form of [`overlapping_features`][Self::overlapping_features]:
    /// returns as soon as one qualifying overlap is found.
    pub fn has_overlapping_features(&self, region: &GenomicRegion, min_overlap: i32) -> bool {
        let chrom_bins = match self.chroms.get(region.chrom()) {
            Some(chrom_bins) => chrom_bins,
            None => return false,
        };
        let threshold = if min_overlap < 1 { 1 } else { min_overlap as u32 };
        let first = region.start() / self.bin_width;
        let last = region.end() / self.bin_width;
        let mut seen = HashSet::new();
        for (_, bin_indices) in chrom_bins.bins.range(first..=last) {
            for &index in bin_indices {
                if !seen.insert(index) {
                    continue;
                }
                let feature_region = &chrom_bins.features[index].0;
                let start = region.start().max(feature_region.start());
                let end = region.end().min(feature_region.end());
                if start <= end && end - start + 1 >= threshold {
                    return true;
                }
            }
        }
        false
    }

    /// The features nearest to `position`, all ties included.
    ///
    /// Features overlapping the position win at distance 0. Otherwise bins
    /// are scanned in expanding rings around the position's bin until no
    /// unvisited bin can hold a closer feature.
    pub fn closest_features(&self, chrom: &Chromosome, position: u32) -> Vec<&T> {
        let chrom_bins = match self.chroms.get(chrom) {
            Some(chrom_bins) => chrom_bins,
            None => return Vec::new(),
        };
        if chrom_bins.bins.is_empty() {
            return Vec::new();
        }
        let width = self.bin_width;
        let min_bin = *chrom_bins.bins.keys().next().unwrap();
        let max_bin = *chrom_bins.bins.keys().next_back().unwrap();
        // Positions outside the populated span still measure distance from
        // `position`; starting the scan at the nearest populated bin just
        // skips rings that cannot hold anything.
        let center = (position / width).clamp(min_bin, max_bin);

        let mut seen = HashSet::new();
        let mut candidates: Vec<(u32, usize)> = Vec::new();
        let mut best = u32::MAX;
        let visit = |bin: u32, candidates: &mut Vec<(u32, usize)>, best: &mut u32, seen: &mut HashSet<usize>| {
            if let Some(bin_indices) = chrom_bins.bins.get(&bin) {
                for &index in bin_indices {
                    if seen.insert(index) {
                        let distance = chrom_bins.features[index].0.distance_to(position);
                        if distance < *best {
                            *best = distance;
                        }
                        candidates.push((distance, index));
                    }
                }
            }
        };

        let mut ring: u32 = 0;
        loop {
            let below = center.checked_sub(ring);
            let above = center.checked_add(ring);
            let below_active = below.map_or(false, |bin| bin >= min_bin);
            let above_active = above.map_or(false, |bin| bin <= max_bin);
            if !below_active && !above_active {
                break;
            }
            // A feature first appearing `ring` bins away sits at least
            // (ring - 1) * width + 1 bases from the position.
            if ring > 0 && best != u32::MAX && (ring - 1) as u64 * width as u64 >= best as u64 {
                break;
            }
            if let Some(bin) = below {
                visit(bin, &mut candidates, &mut best, &mut seen);
            }
            if ring > 0 {
                if let Some(bin) = above {
                    visit(bin, &mut candidates, &mut best, &mut seen);
                }
            }
            ring += 1;
        }

        candidates
            .into_iter()
            .filter(|(distance, _)| *distance == best)
            .map(|(_, index)| &chrom_bins.features[index].1)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::Chromosome;

    fn chr1() -> Chromosome {
        Chromosome::new("hg38", "chr1", 1)
    }

    fn region(start: u32, end: u32) -> GenomicRegion {
        GenomicRegion::new(chr1(), start, end)
    }

    fn three_genes() -> BinIndex<&'static str> {
        let mut index = BinIndex::with_bin_width(1000);
        index.add(region(1000, 2000), "G1");
        index.add(region(1500, 2500), "G2");
        index.add(region(9000, 9500), "G3");
        index
    }

    #[test]
    fn features_in_range_finds_bin_neighbors() {
        let index = three_genes();
        let found = index.features_in_range(&chr1(), 1800, 1900);
        assert_eq!(found, vec![&"G1", &"G2"]);
    }

    #[test]
    fn features_in_range_includes_every_feature_over_its_own_span() {
        let index = three_genes();
        for (span, name) in [((1000, 2000), "G1"), ((1500, 2500), "G2"), ((9000, 9500), "G3")] {
            let found = index.features_in_range(&chr1(), span.0, span.1);
            assert!(found.contains(&&name), "{} missing over its own span", name);
        }
    }

    #[test]
    fn spanning_feature_is_deduplicated_across_bins() {
        let mut index = BinIndex::with_bin_width(1000);
        index.add(region(500, 4500), "wide");
        // Registered in five bins, returned once.
        let found = index.features_in_range(&chr1(), 1, 10_000);
        assert_eq!(found, vec![&"wide"]);
        assert_eq!(index.size(), 1);
    }

    #[test]
    fn size_counts_insertions() {
        let index = three_genes();
        assert_eq!(index.size(), 3);
        assert!(!index.is_empty());
    }

    #[test]
    fn unknown_chromosome_is_empty_not_an_error() {
        let index = three_genes();
        let chr2 = Chromosome::new("hg38", "chr2", 2);
        assert!(index.features_in_range(&chr2, 1, 1_000_000).is_empty());
        assert!(!index.has_overlapping_features(&GenomicRegion::new(chr2.clone(), 1, 100), -1));
        assert!(index.closest_features(&chr2, 500).is_empty());
    }

    #[test]
    fn overlapping_features_keys_by_exact_subregion() {
        let index = three_genes();
        let query = region(1800, 2200);
        let overlaps = index.overlapping_features(&query, -1);
        let keys: Vec<(u32, u32)> = overlaps.keys().map(|r| (r.start(), r.end())).collect();
        // G1 contributes [1800, 2000], G2 contributes [1800, 2200].
        assert_eq!(keys, vec![(1800, 2000), (1800, 2200)]);
        assert_eq!(overlaps[&region(1800, 2000)], vec![&"G1"]);
        assert_eq!(overlaps[&region(1800, 2200)], vec![&"G2"]);
    }

    #[test]
    fn overlapping_features_honors_the_threshold() {
        let index = three_genes();
        // G1 overlaps [1950, 2600] by 51 bases, G2 by 551.
        let query = region(1950, 2600);
        let strict = index.overlapping_features(&query, 100);
        assert_eq!(strict.len(), 1);
        assert_eq!(strict[&region(1950, 2500)], vec![&"G2"]);

        let any = index.overlapping_features(&query, -1);
        assert_eq!(any.len(), 2);
    }

    #[test]
    fn bin_neighbors_without_true_overlap_are_filtered() {
        let index = three_genes();
        // Shares bin 2 with G1/G2 but overlaps neither.
        let query = region(2600, 2900);
        assert!(index.overlapping_features(&query, -1).is_empty());
        assert!(!index.has_overlapping_features(&query, -1));
    }

    #[test]
    fn has_overlapping_features_finds_qualifying_overlaps() {
        let index = three_genes();
        assert!(index.has_overlapping_features(&region(1800, 1900), -1));
        assert!(index.has_overlapping_features(&region(1950, 2600), 100));
        assert!(!index.has_overlapping_features(&region(3000, 8000), -1));
    }

    #[test]
    fn closest_features_prefers_overlap() {
        let index = three_genes();
        let found = index.closest_features(&chr1(), 1600);
        assert_eq!(found.len(), 2);
        assert!(found.contains(&&"G1"));
        assert!(found.contains(&&"G2"));
    }

    #[test]
    fn closest_features_picks_the_nearer_flank() {
        let index = three_genes();
        // 5000 is 2500 from G2's end and 4000 from G3's start.
        assert_eq!(index.closest_features(&chr1(), 5000), vec![&"G2"]);
        // 8000 is 5500 from G2's end and 1000 from G3's start.
        assert_eq!(index.closest_features(&chr1(), 8000), vec![&"G3"]);
    }

    #[test]
    fn closest_features_returns_all_ties() {
        let mut index = BinIndex::with_bin_width(1000);
        index.add(region(1000, 2000), "left");
        index.add(region(4000, 5000), "right");
        // 3000 is exactly 1000 from both.
        let found = index.closest_features(&chr1(), 3000);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn reversed_query_bounds_are_normalized() {
        let index = three_genes();
        let found = index.features_in_range(&chr1(), 1900, 1800);
        assert_eq!(found, vec![&"G1", &"G2"]);
    }
}
