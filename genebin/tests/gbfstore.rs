use std::error::Error;
use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};

use genebin::{Exon, Gene, GeneIdentifier, GbfRead, GbfReadError, GbfWrite, GbfWriteError, GeneStore};

fn gene(
    start: u32,
    end: u32,
    exons: Vec<(u32, u32)>,
    identifiers: Vec<(&str, &str)>,
    tags: Vec<&str>,
) -> Gene {
    Gene {
        start,
        end,
        exons: exons
            .into_iter()
            .map(|(start, end)| Exon { start, end })
            .collect(),
        identifiers: identifiers
            .into_iter()
            .map(|(kind, value)| GeneIdentifier::new(kind, value))
            .collect(),
        tags: tags.into_iter().map(|tag| tag.to_string()).collect(),
    }
}

// G1 and G2 overlap each other; G3 sits alone seven bins away.
fn overlapping_genes() -> Vec<Gene> {
    vec![
        gene(
            1000,
            2000,
            vec![(1000, 1200), (1800, 2000)],
            vec![("gene-name", "ALPHA1"), ("transcript-id", "ALPHA1-201")],
            vec!["protein-coding"],
        ),
        gene(1500, 2500, vec![(1500, 2500)], vec![("gene-name", "BETA2")], vec![]),
        gene(
            9000,
            9500,
            vec![(9000, 9100), (9400, 9500)],
            vec![("gene-name", "GAMMA3")],
            vec!["pseudogene", "curated"],
        ),
    ]
}

fn build_store(genes: Vec<Gene>) -> Result<tempfile::NamedTempFile, Box<dyn Error>> {
    let file = tempfile::NamedTempFile::new()?;
    let path = file.path().to_string_lossy().to_string();
    GbfWrite::create_file(path).write("hg38", genes, 1000)?;
    Ok(file)
}

#[test]
fn roundtrip_preserves_every_field() -> Result<(), Box<dyn Error>> {
    let genes = vec![
        gene(
            1000,
            2000,
            vec![(1000, 1200), (1800, 2000)],
            vec![("gene-name", "ALPHA1"), ("transcript-id", "ALPHA1-201")],
            vec!["protein-coding"],
        ),
        gene(5000, 6000, vec![(5000, 6000)], vec![("gene-name", "BETA2")], vec![]),
        gene(
            9000,
            9500,
            vec![(9000, 9100), (9400, 9500)],
            vec![("gene-name", "GAMMA3")],
            vec!["pseudogene", "curated"],
        ),
    ];
    let file = build_store(genes.clone())?;
    let mut store = GbfRead::open_file(&file.path().to_string_lossy())?;

    let header = store.header().clone();
    assert_eq!(header.version, 1);
    assert_eq!(header.genome, "hg38");
    assert_eq!(header.window, 1000);
    assert_eq!(header.bin_count, 10);

    for expected in &genes {
        let found = store.find_genes(expected.start, expected.end)?;
        assert_eq!(found, vec![expected.clone()]);
    }

    Ok(())
}

#[test]
fn query_returns_bin_neighbors_with_true_overlap_only() -> Result<(), Box<dyn Error>> {
    let file = build_store(overlapping_genes())?;
    let mut store = GbfRead::open_file(&file.path().to_string_lossy())?;

    let found = store.find_genes(1800, 1900)?;
    let spans: Vec<(u32, u32)> = found.iter().map(|g| (g.start, g.end)).collect();
    assert_eq!(spans, vec![(1000, 2000), (1500, 2500)]);

    let found = store.find_genes(9000, 9500)?;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].start, 9000);
    assert_eq!(found[0].end, 9500);

    // Shares bins with G1/G2 without touching either.
    assert!(store.find_genes(2600, 2900)?.is_empty());

    Ok(())
}

#[test]
fn minimum_overlap_filters_short_overlaps() -> Result<(), Box<dyn Error>> {
    let file = build_store(overlapping_genes())?;
    let mut store = GbfRead::open_file(&file.path().to_string_lossy())?;

    // G1 overlaps [1950, 2600] by 51 bases, G2 by 551.
    let found = store.find_genes_with_min(1950, 2600, 100)?;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].end, 2500);

    Ok(())
}

#[test]
fn spanning_genes_decode_once() -> Result<(), Box<dyn Error>> {
    let file = build_store(overlapping_genes())?;
    let mut store = GbfRead::open_file(&file.path().to_string_lossy())?;

    // G1 and G2 are referenced from two bins each; the whole-chromosome
    // query must still return each of them once.
    let found = store.find_genes(1, 10_000)?;
    assert_eq!(found.len(), 3);

    Ok(())
}

#[test]
fn bin_stats_walk_the_whole_table() -> Result<(), Box<dyn Error>> {
    let file = build_store(overlapping_genes())?;
    let mut store = GbfRead::open_file(&file.path().to_string_lossy())?;

    // Walking every bin bounds-checks every table offset against the file,
    // so this doubles as the no-read-past-EOF check.
    let stats = store.bin_stats()?;
    assert_eq!(stats.bins, vec![(1, 2), (2, 2), (9, 1)]);
    assert_eq!(stats.gene_count, 3);

    Ok(())
}

#[test]
fn identical_inputs_build_identical_files() -> Result<(), Box<dyn Error>> {
    let first = build_store(overlapping_genes())?;
    // Same gene set, different input order; the builder sorts.
    let mut shuffled = overlapping_genes();
    shuffled.reverse();
    let second = build_store(shuffled)?;

    let first_bytes = fs::read(first.path())?;
    let second_bytes = fs::read(second.path())?;
    assert!(!first_bytes.is_empty());
    assert_eq!(first_bytes, second_bytes);

    Ok(())
}

#[test]
fn empty_store_reads_as_empty() -> Result<(), Box<dyn Error>> {
    let file = build_store(vec![])?;
    let mut store = GbfRead::open_file(&file.path().to_string_lossy())?;
    assert_eq!(store.header().bin_count, 0);
    assert!(store.find_genes(1, 1_000_000)?.is_empty());
    assert_eq!(store.bin_stats()?.gene_count, 0);
    Ok(())
}

#[test]
fn unknown_version_is_rejected() -> Result<(), Box<dyn Error>> {
    let file = build_store(overlapping_genes())?;
    let mut patch = OpenOptions::new().write(true).open(file.path())?;
    patch.seek(SeekFrom::Start(0))?;
    patch.write_all(&[9])?;

    let result = GbfRead::open_file(&file.path().to_string_lossy());
    assert!(matches!(result, Err(GbfReadError::UnknownVersion(9))));
    Ok(())
}

#[test]
fn corrupt_string_length_is_rejected() -> Result<(), Box<dyn Error>> {
    let file = build_store(overlapping_genes())?;
    // The genome-name length byte sits right after the version byte.
    let mut patch = OpenOptions::new().write(true).open(file.path())?;
    patch.seek(SeekFrom::Start(1))?;
    patch.write_all(&[200])?;

    let result = GbfRead::open_file(&file.path().to_string_lossy());
    assert!(matches!(result, Err(GbfReadError::InvalidFile(_))));
    Ok(())
}

#[test]
fn truncated_store_fails_without_panicking() -> Result<(), Box<dyn Error>> {
    let file = build_store(overlapping_genes())?;
    let full_len = fs::metadata(file.path())?.len();

    // Cut inside the gene records: the header still validates, the query
    // must fail cleanly when an address points past the end.
    let handle = OpenOptions::new().write(true).open(file.path())?;
    handle.set_len(full_len / 2)?;
    let mut store = GbfRead::open_file(&file.path().to_string_lossy())?;
    assert!(store.find_genes(1, 10_000).is_err());

    // Cut inside the bin address table: the header itself is rejected.
    let handle = OpenOptions::new().write(true).open(file.path())?;
    handle.set_len(80)?;
    assert!(matches!(
        GbfRead::open_file(&file.path().to_string_lossy()),
        Err(GbfReadError::InvalidFile(_))
    ));

    Ok(())
}

#[test]
fn oversized_records_are_rejected_at_build_time() -> Result<(), Box<dyn Error>> {
    let file = tempfile::NamedTempFile::new()?;
    let path = file.path().to_string_lossy().to_string();

    let mut too_many_tags = gene(100, 200, vec![], vec![], vec![]);
    too_many_tags.tags = vec!["x".to_string(); 300];
    let result = GbfWrite::create_file(path.clone()).write("hg38", vec![too_many_tags], 1000);
    assert!(matches!(result, Err(GbfWriteError::InvalidRecord(_))));

    let long_name = gene(
        100,
        200,
        vec![],
        vec![("gene-name", "N".repeat(100).as_str())],
        vec![],
    );
    let result = GbfWrite::create_file(path).write("hg38", vec![long_name], 1000);
    assert!(matches!(result, Err(GbfWriteError::InvalidRecord(_))));

    Ok(())
}

#[test]
fn store_directory_resolves_chromosome_files() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let mut store = GeneStore::open(dir.path());
    store.write_chromosome("chr1", "hg38", overlapping_genes(), 1000)?;
    store.write_chromosome(
        "chr2",
        "hg38",
        vec![gene(400, 800, vec![(400, 800)], vec![("gene-name", "DELTA4")], vec![])],
        1000,
    )?;

    let found = store.find_genes("chr1", 1800, 1900)?;
    assert_eq!(found.len(), 2);
    let found = store.find_genes("chr2", 1, 1000)?;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].identifiers[0].value, "DELTA4");

    let missing = store.find_genes("chrX", 1, 1000);
    assert!(matches!(missing, Err(GbfReadError::ChromosomeNotFound(name)) if name == "chrX"));

    Ok(())
}
