/*!
Chromosomes, genomic regions, and the chromosome-name registry.

Coordinates are 1-based and inclusive on both ends throughout the crate.
*/
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// A named chromosome (or scaffold) belonging to a genome assembly.
///
/// The numeric id orders chromosomes the way annotation files expect
/// ("chr2" before "chr10"); the name only breaks ties between entries
/// sharing an id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Chromosome {
    pub genome: String,
    pub name: String,
    pub id: u32,
}

impl Chromosome {
    pub fn new(genome: impl Into<String>, name: impl Into<String>, id: u32) -> Self {
        Chromosome {
            genome: genome.into(),
            name: name.into(),
            id,
        }
    }
}

impl Ord for Chromosome {
    fn cmp(&self, other: &Self) -> Ordering {
        self.genome
            .cmp(&other.genome)
            .then_with(|| self.id.cmp(&other.id))
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl PartialOrd for Chromosome {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Chromosome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Which strand of the double helix a region is annotated on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Strand {
    Forward,
    Reverse,
}

/// Possible errors encountered when combining regions
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegionError {
    #[error("Regions on different chromosomes ({} vs {}) cannot be overlapped.", .0, .1)]
    ChromosomeMismatch(String, String),
}

/// A 1-based, inclusive coordinate span on a chromosome.
///
/// The constructor normalizes its input: reversed bounds are swapped and the
/// start is clamped to 1, so `start <= end` always holds.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GenomicRegion {
    chrom: Chromosome,
    start: u32,
    end: u32,
    strand: Option<Strand>,
}

impl GenomicRegion {
    pub fn new(chrom: Chromosome, start: u32, end: u32) -> Self {
        let (start, end) = if start <= end {
            (start, end)
        } else {
            (end, start)
        };
        GenomicRegion {
            chrom,
            start: start.max(1),
            end: end.max(1),
            strand: None,
        }
    }

    pub fn with_strand(chrom: Chromosome, start: u32, end: u32, strand: Strand) -> Self {
        let mut region = GenomicRegion::new(chrom, start, end);
        region.strand = Some(strand);
        region
    }

    pub fn chrom(&self) -> &Chromosome {
        &self.chrom
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn strand(&self) -> Option<Strand> {
        self.strand
    }

    /// Number of bases covered, inclusive of both ends.
    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    pub fn contains(&self, position: u32) -> bool {
        self.start <= position && position <= self.end
    }

    /// The exact shared span of two regions.
    ///
    /// Returns `Ok(None)` when the regions do not touch, and an error when
    /// they live on different chromosomes (there is no meaningful overlap to
    /// compute).
    pub fn intersection(&self, other: &GenomicRegion) -> Result<Option<GenomicRegion>, RegionError> {
        if self.chrom != other.chrom {
            return Err(RegionError::ChromosomeMismatch(
                self.chrom.name.clone(),
                other.chrom.name.clone(),
            ));
        }
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start > end {
            return Ok(None);
        }
        Ok(Some(GenomicRegion {
            chrom: self.chrom.clone(),
            start,
            end,
            strand: None,
        }))
    }

    /// Shared base count of two regions, 0 when disjoint.
    pub fn overlap_len(&self, other: &GenomicRegion) -> Result<u32, RegionError> {
        Ok(self.intersection(other)?.map_or(0, |r| r.len()))
    }

    /// Distance from a position to this span, 0 when the position falls inside.
    pub fn distance_to(&self, position: u32) -> u32 {
        if position < self.start {
            self.start - position
        } else if position > self.end {
            position - self.end
        } else {
            0
        }
    }
}

impl Ord for GenomicRegion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.chrom
            .cmp(&other.chrom)
            .then_with(|| self.start.cmp(&other.start))
            .then_with(|| self.end.cmp(&other.end))
            .then_with(|| self.strand.cmp(&other.strand))
    }
}

impl PartialOrd for GenomicRegion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for GenomicRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chrom.name, self.start, self.end)
    }
}

/// Resolves a chromosome name like `"chr7"` to its canonical value.
///
/// Implementations are passed explicitly into builders and parsers; there is
/// no process-wide registry.
pub trait ChromosomeRegistry {
    fn resolve(&self, name: &str) -> Option<&Chromosome>;
}

/// Map-backed registry for the chromosomes of one assembly.
pub struct GenomeRegistry {
    genome: String,
    by_name: HashMap<String, Chromosome>,
}

impl GenomeRegistry {
    pub fn new(genome: impl Into<String>) -> Self {
        GenomeRegistry {
            genome: genome.into(),
            by_name: HashMap::new(),
        }
    }

    pub fn genome(&self) -> &str {
        &self.genome
    }

    pub fn add(&mut self, name: impl Into<String>, id: u32) {
        let name = name.into();
        let chrom = Chromosome::new(self.genome.clone(), name.clone(), id);
        self.by_name.insert(name, chrom);
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn chromosomes(&self) -> impl Iterator<Item = &Chromosome> {
        self.by_name.values()
    }
}

impl ChromosomeRegistry for GenomeRegistry {
    fn resolve(&self, name: &str) -> Option<&Chromosome> {
        self.by_name.get(name)
    }
}
