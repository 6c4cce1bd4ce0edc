/*!
Genebin provides binned in-memory indexes and a compact, seek-addressable
binary store for genomic gene annotations.

## Indexing

Features of any type can be registered against a [`GenomicRegion`][genome::GenomicRegion]
in a [`BinIndex`], the fixed-width bin index backing overlap and
nearest-feature queries ([`BinIndex::features_in_range`],
[`BinIndex::overlapping_features`], [`BinIndex::closest_features`]).

For very large, sparse chromosomes, a [`ResolutionTree`] offers a
multi-resolution alternative: geometrically growing bin widths give a
logarithmic descent over arbitrarily large spans ([`ResolutionTree::search`],
[`ResolutionTree::closest_node`]). The tree is rebuilt from the full feature
set after additions; see [`ResolutionTree::rebuild`].

## Reading

The entrypoint to reading gene store files is [`GbfRead::open_file`], which
validates the file header and exposes [`GbfRead::find_genes`] for
random-access overlap queries that touch only the coordinate bins a query
spans. A directory of per-chromosome store files can be queried through
[`GeneStore::open`].

## Writing

New store files are built with [`GbfWrite::create_file`] followed by
[`GbfWrite::write`], which lays out the header, the bin address table, the
per-bin gene-address blocks, and the gene records in a single deterministic
pass, patching the address table once the block positions are known. Store
files are write-once; readers never mutate them.
*/

mod gbf;
mod index;

pub mod genome;
pub mod utils;

pub use gbf::*;
pub use index::*;
