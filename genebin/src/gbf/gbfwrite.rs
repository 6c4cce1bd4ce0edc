use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};

use byteorder::{BigEndian, WriteBytesExt};
use itertools::Itertools;
use thiserror::Error;

use crate::gbf::{Gene, GBF_VERSION, HEADER_SIZE, MAX_RECORD_FIELDS, STRING_BUFFER_SIZE};

/// Possible errors encountered when building a gene store file
#[derive(Error, Debug)]
pub enum GbfWriteError {
    #[error("Invalid gene record: {}", .0)]
    InvalidRecord(String),
    #[error("The genome name ({}) exceeds the {}-byte name buffer.", .0, STRING_BUFFER_SIZE)]
    GenomeNameTooLong(String),
    #[error("The window size must be positive.")]
    InvalidWindow,
    #[error("The store layout exceeds the 4-byte address space.")]
    StoreTooLarge,
    #[error("Error occurred: {}", .0)]
    IoError(#[from] io::Error),
}

/// Builds gene store files.
///
/// The builder is deterministic: genes are sorted by (start, end) before
/// layout, so identical inputs produce byte-identical files.
pub struct GbfWrite {
    pub path: String,
}

impl GbfWrite {
    pub fn create_file(path: String) -> Self {
        GbfWrite { path }
    }

    /// Writes one chromosome's genes as a store file with the given bin
    /// window.
    ///
    /// The header and a zero-filled bin address table go out first so every
    /// offset is known before gene data is written; the table is patched
    /// with the real block offsets once the blocks are placed. A gene
    /// spanning several bins is referenced from each bin's block but its
    /// record is written exactly once.
    pub fn write(&self, genome: &str, mut genes: Vec<Gene>, window: u32) -> Result<(), GbfWriteError> {
        if window == 0 {
            return Err(GbfWriteError::InvalidWindow);
        }
        if genome.len() > STRING_BUFFER_SIZE {
            return Err(GbfWriteError::GenomeNameTooLong(genome.to_string()));
        }
        genes.sort_by(|a, b| (a.start, a.end).cmp(&(b.start, b.end)));
        for gene in &genes {
            validate_record(gene)?;
        }

        let bin_count: u32 = match genes.iter().map(|gene| gene.end / window).max() {
            Some(max_bin) => max_bin + 1,
            None => 0,
        };
        let bins: HashMap<u32, Vec<usize>> = genes
            .iter()
            .enumerate()
            .flat_map(|(index, gene)| {
                (gene.start / window..=gene.end / window).map(move |bin| (bin, index))
            })
            .into_group_map();

        // Sizing pass: block and record offsets are known before any gene
        // data is written.
        let table_offset = HEADER_SIZE;
        let blocks_offset = table_offset + 4 * bin_count as u64;
        let blocks_len: u64 = (0..bin_count)
            .map(|bin| 4 + 4 * bins.get(&bin).map_or(0, |indices| indices.len() as u64))
            .sum();
        let mut record_offsets = Vec::with_capacity(genes.len());
        let mut next_record = blocks_offset + blocks_len;
        for gene in &genes {
            record_offsets.push(next_record);
            next_record += encoded_len(gene);
        }
        if next_record > u32::MAX as u64 {
            return Err(GbfWriteError::StoreTooLarge);
        }

        let file = File::create(&self.path)?;
        let mut file = BufWriter::new(file);

        file.write_u8(GBF_VERSION)?;
        write_string(&mut file, genome)?;
        file.write_u32::<BigEndian>(window)?;
        file.write_u32::<BigEndian>(bin_count)?;
        debug_assert!(file.stream_position()? == table_offset);

        // Bin address table, blank until the blocks are placed.
        file.write_all(&vec![0u8; 4 * bin_count as usize])?;

        let mut table = Vec::with_capacity(bin_count as usize);
        let mut position = blocks_offset;
        for bin in 0..bin_count {
            table.push(position as u32);
            match bins.get(&bin) {
                Some(indices) => {
                    file.write_u32::<BigEndian>(indices.len() as u32)?;
                    for &index in indices {
                        file.write_u32::<BigEndian>(record_offsets[index] as u32)?;
                    }
                    position += 4 + 4 * indices.len() as u64;
                }
                None => {
                    file.write_u32::<BigEndian>(0)?;
                    position += 4;
                }
            }
        }
        debug_assert!(file.stream_position()? == blocks_offset + blocks_len);

        for gene in &genes {
            write_record(&mut file, gene)?;
        }
        debug_assert!(file.stream_position()? == next_record);

        file.seek(SeekFrom::Start(table_offset))?;
        for offset in table {
            file.write_u32::<BigEndian>(offset)?;
        }
        file.flush()?;

        Ok(())
    }
}

fn validate_record(gene: &Gene) -> Result<(), GbfWriteError> {
    if gene.start > gene.end {
        return Err(GbfWriteError::InvalidRecord(format!(
            "gene {}-{} has reversed bounds",
            gene.start, gene.end
        )));
    }
    if gene.exons.len() > MAX_RECORD_FIELDS {
        return Err(GbfWriteError::InvalidRecord(format!(
            "gene {}-{} has {} exons (at most {})",
            gene.start,
            gene.end,
            gene.exons.len(),
            MAX_RECORD_FIELDS
        )));
    }
    if gene.identifiers.len() > MAX_RECORD_FIELDS {
        return Err(GbfWriteError::InvalidRecord(format!(
            "gene {}-{} has {} identifiers (at most {})",
            gene.start,
            gene.end,
            gene.identifiers.len(),
            MAX_RECORD_FIELDS
        )));
    }
    if gene.tags.len() > MAX_RECORD_FIELDS {
        return Err(GbfWriteError::InvalidRecord(format!(
            "gene {}-{} has {} tags (at most {})",
            gene.start,
            gene.end,
            gene.tags.len(),
            MAX_RECORD_FIELDS
        )));
    }
    let strings = gene
        .identifiers
        .iter()
        .flat_map(|id| [id.kind.as_str(), id.value.as_str()])
        .chain(gene.tags.iter().map(|tag| tag.as_str()));
    for s in strings {
        if s.len() > STRING_BUFFER_SIZE {
            return Err(GbfWriteError::InvalidRecord(format!(
                "string field \"{}\" exceeds the {}-byte buffer",
                s, STRING_BUFFER_SIZE
            )));
        }
    }
    Ok(())
}

pub(crate) fn encoded_len(gene: &Gene) -> u64 {
    let string = (1 + STRING_BUFFER_SIZE) as u64;
    4 + 4
        + 1
        + 8 * gene.exons.len() as u64
        + 1
        + 2 * string * gene.identifiers.len() as u64
        + 1
        + string * gene.tags.len() as u64
}

fn write_string<W: Write>(file: &mut W, s: &str) -> io::Result<()> {
    debug_assert!(s.len() <= STRING_BUFFER_SIZE);
    file.write_u8(s.len() as u8)?;
    let mut buffer = [0u8; STRING_BUFFER_SIZE];
    buffer[..s.len()].copy_from_slice(s.as_bytes());
    file.write_all(&buffer)
}

fn write_record<W: Write>(file: &mut W, gene: &Gene) -> io::Result<()> {
    file.write_u32::<BigEndian>(gene.start)?;
    file.write_u32::<BigEndian>(gene.end)?;
    file.write_u8(gene.exons.len() as u8)?;
    for exon in &gene.exons {
        file.write_u32::<BigEndian>(exon.start)?;
        file.write_u32::<BigEndian>(exon.end)?;
    }
    file.write_u8(gene.identifiers.len() as u8)?;
    for identifier in &gene.identifiers {
        write_string(file, &identifier.kind)?;
        write_string(file, &identifier.value)?;
    }
    file.write_u8(gene.tags.len() as u8)?;
    for tag in &gene.tags {
        write_string(file, tag)?;
    }
    Ok(())
}
