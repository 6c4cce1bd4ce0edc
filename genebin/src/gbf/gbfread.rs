use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::PathBuf;

use byteorder::{BigEndian, ReadBytesExt};
use smallvec::SmallVec;
use thiserror::Error;

use crate::gbf::gbfwrite::{GbfWrite, GbfWriteError};
use crate::gbf::{Exon, Gene, GeneIdentifier, GBF_VERSION, HEADER_SIZE, STRING_BUFFER_SIZE};

/// Possible errors encountered when reading a gene store
#[derive(Error, Debug)]
pub enum GbfReadError {
    #[error("The requested chromosome ({}) has no store file.", .0)]
    ChromosomeNotFound(String),
    #[error("Unknown format version: {}", .0)]
    UnknownVersion(u8),
    #[error("The file was invalid: {}", .0)]
    InvalidFile(String),
    #[error("Error occurred: {}", .0)]
    IoError(#[from] io::Error),
}

/// Header fields of a gene store file
#[derive(Clone, Debug)]
pub struct GbfHeader {
    pub version: u8,
    pub genome: String,
    pub window: u32,
    pub bin_count: u32,
}

/// Per-bin occupancy of a store file
#[derive(Clone, Debug)]
pub struct GbfBinStats {
    /// Populated bins only, as (bin index, gene-address count).
    pub bins: Vec<(u32, u32)>,
    /// Number of distinct gene records across all bins.
    pub gene_count: usize,
}

/// Reads one chromosome's gene store file.
///
/// Queries seek directly to the bins they touch; nothing else is read. A
/// seek followed by a read is not atomic against other seeks on the same
/// handle, so queries take `&mut self`; open one reader per worker for
/// parallel queries.
pub struct GbfRead {
    pub path: String,
    header: GbfHeader,
    file_len: u64,
    reader: Option<BufReader<File>>,
}

impl GbfRead {
    /// Opens a store file and validates its header.
    pub fn open_file(path: &str) -> Result<Self, GbfReadError> {
        let fp = File::open(path)?;
        let file_len = fp.metadata()?.len();
        let mut file = BufReader::new(fp);
        let header = read_header(&mut file, file_len)?;
        Ok(GbfRead {
            path: path.to_string(),
            header,
            file_len,
            reader: Some(file),
        })
    }

    pub fn header(&self) -> &GbfHeader {
        &self.header
    }

    /// Manually close the open file descriptor (if it exists). If any
    /// queries are performed after this is called, the file descriptor
    /// will be reopened.
    pub fn close(&mut self) {
        self.reader.take();
    }

    fn ensure_reader(&mut self) -> io::Result<&mut BufReader<File>> {
        if self.reader.is_none() {
            let fp = File::open(&self.path)?;
            self.reader.replace(BufReader::new(fp));
        }
        Ok(self.reader.as_mut().unwrap())
    }

    /// The genes overlapping `[start, end]` by at least one base.
    pub fn find_genes(&mut self, start: u32, end: u32) -> Result<Vec<Gene>, GbfReadError> {
        self.find_genes_with_min(start, end, 1)
    }

    /// The genes overlapping `[start, end]` by at least `min_overlap` bases.
    ///
    /// Bin membership over-fetches (a gene can share a bin with the query
    /// without touching it), so decoded records are filtered down to true
    /// overlaps before returning. Query bins beyond the stored table hold no
    /// genes and contribute nothing.
    pub fn find_genes_with_min(
        &mut self,
        start: u32,
        end: u32,
        min_overlap: u32,
    ) -> Result<Vec<Gene>, GbfReadError> {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        let window = self.header.window;
        let bin_count = self.header.bin_count;
        let file_len = self.file_len;
        if bin_count == 0 {
            return Ok(Vec::new());
        }
        let first = start / window;
        if first >= bin_count {
            return Ok(Vec::new());
        }
        let last = (end / window).min(bin_count - 1);
        let min_overlap = min_overlap.max(1);

        let file = self.ensure_reader()?;

        // Union of gene addresses across every touched bin, deduplicated.
        let mut visited = HashSet::new();
        let mut addresses: SmallVec<[u32; 16]> = SmallVec::new();
        for bin in first..=last {
            for address in read_bin_block(file, file_len, bin)? {
                if visited.insert(address) {
                    addresses.push(address);
                }
            }
        }

        let mut genes = Vec::new();
        for address in addresses {
            if (address as u64) < HEADER_SIZE || (address as u64) >= file_len {
                return Err(GbfReadError::InvalidFile(format!(
                    "gene address {} is out of bounds",
                    address
                )));
            }
            file.seek(SeekFrom::Start(address as u64))?;
            let gene = read_record(file)?;
            if gene.overlap_len(start, end) >= min_overlap {
                genes.push(gene);
            }
        }
        Ok(genes)
    }

    /// Walks the whole bin address table, returning the populated bins and
    /// the distinct record count.
    pub fn bin_stats(&mut self) -> Result<GbfBinStats, GbfReadError> {
        let bin_count = self.header.bin_count;
        let file_len = self.file_len;
        let file = self.ensure_reader()?;
        let mut visited = HashSet::new();
        let mut bins = Vec::new();
        for bin in 0..bin_count {
            let addresses = read_bin_block(file, file_len, bin)?;
            if !addresses.is_empty() {
                bins.push((bin, addresses.len() as u32));
            }
            for address in addresses {
                visited.insert(address);
            }
        }
        Ok(GbfBinStats {
            bins,
            gene_count: visited.len(),
        })
    }
}

/// A directory of per-chromosome gene store files (`<chromosome>.gbf`),
/// opened lazily and cached per chromosome.
pub struct GeneStore {
    dir: PathBuf,
    readers: HashMap<String, GbfRead>,
}

impl GeneStore {
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        GeneStore {
            dir: dir.into(),
            readers: HashMap::new(),
        }
    }

    fn chrom_path(&self, chrom: &str) -> PathBuf {
        self.dir.join(format!("{}.gbf", chrom))
    }

    /// The genes of `chrom` overlapping `[start, end]` by at least one base.
    ///
    /// A chromosome without a store file is a [`GbfReadError::ChromosomeNotFound`]
    /// error: the caller asked for a specific file, so absence is not an
    /// empty result here.
    pub fn find_genes(
        &mut self,
        chrom: &str,
        start: u32,
        end: u32,
    ) -> Result<Vec<Gene>, GbfReadError> {
        let reader = match self.readers.entry(chrom.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let path = self.dir.join(format!("{}.gbf", entry.key()));
                if !path.exists() {
                    return Err(GbfReadError::ChromosomeNotFound(entry.key().clone()));
                }
                entry.insert(GbfRead::open_file(&path.to_string_lossy())?)
            }
        };
        reader.find_genes(start, end)
    }

    /// Builds (or replaces) one chromosome's store file in this directory.
    pub fn write_chromosome(
        &mut self,
        chrom: &str,
        genome: &str,
        genes: Vec<Gene>,
        window: u32,
    ) -> Result<(), GbfWriteError> {
        // Drop any cached reader of the file being replaced.
        self.readers.remove(chrom);
        let path = self.chrom_path(chrom);
        GbfWrite::create_file(path.to_string_lossy().into_owned()).write(genome, genes, window)
    }
}

fn read_header<R: Read>(file: &mut R, file_len: u64) -> Result<GbfHeader, GbfReadError> {
    if file_len < HEADER_SIZE {
        return Err(GbfReadError::InvalidFile(format!(
            "{} bytes is too short for a store header",
            file_len
        )));
    }
    let version = file.read_u8()?;
    if version != GBF_VERSION {
        return Err(GbfReadError::UnknownVersion(version));
    }
    let genome = read_string(file)?;
    let window = file.read_u32::<BigEndian>()?;
    if window == 0 {
        return Err(GbfReadError::InvalidFile("window size is zero".to_string()));
    }
    let bin_count = file.read_u32::<BigEndian>()?;
    if HEADER_SIZE + 4 * bin_count as u64 > file_len {
        return Err(GbfReadError::InvalidFile(format!(
            "bin address table ({} bins) exceeds the file",
            bin_count
        )));
    }
    Ok(GbfHeader {
        version,
        genome,
        window,
        bin_count,
    })
}

// Reads one bin's gene-address block, bounds-checking the table slot, the
// block offset, and the address count against the file length.
fn read_bin_block(
    file: &mut BufReader<File>,
    file_len: u64,
    bin: u32,
) -> Result<SmallVec<[u32; 16]>, GbfReadError> {
    let slot = HEADER_SIZE + 4 * bin as u64;
    if slot + 4 > file_len {
        return Err(GbfReadError::InvalidFile(format!(
            "bin address table is truncated at bin {}",
            bin
        )));
    }
    file.seek(SeekFrom::Start(slot))?;
    let block_offset = file.read_u32::<BigEndian>()? as u64;
    if block_offset < HEADER_SIZE || block_offset >= file_len {
        return Err(GbfReadError::InvalidFile(format!(
            "bin {} address {} is out of bounds",
            bin, block_offset
        )));
    }
    file.seek(SeekFrom::Start(block_offset))?;
    let count = file.read_u32::<BigEndian>()? as u64;
    if block_offset + 4 + 4 * count > file_len {
        return Err(GbfReadError::InvalidFile(format!(
            "bin {} holds {} addresses past the end of the file",
            bin, count
        )));
    }
    let mut addresses = SmallVec::new();
    for _ in 0..count {
        addresses.push(file.read_u32::<BigEndian>()?);
    }
    Ok(addresses)
}

fn read_string<R: Read>(file: &mut R) -> Result<String, GbfReadError> {
    let len = file.read_u8()? as usize;
    let mut buffer = [0u8; STRING_BUFFER_SIZE];
    file.read_exact(&mut buffer)?;
    if len > STRING_BUFFER_SIZE {
        return Err(GbfReadError::InvalidFile(format!(
            "string length {} exceeds the {}-byte buffer",
            len, STRING_BUFFER_SIZE
        )));
    }
    String::from_utf8(buffer[..len].to_vec())
        .map_err(|_| GbfReadError::InvalidFile("string field is not valid UTF-8".to_string()))
}

fn read_record<R: Read>(file: &mut R) -> Result<Gene, GbfReadError> {
    let start = file.read_u32::<BigEndian>()?;
    let end = file.read_u32::<BigEndian>()?;
    let exon_count = file.read_u8()?;
    let mut exons = Vec::with_capacity(exon_count as usize);
    for _ in 0..exon_count {
        let exon_start = file.read_u32::<BigEndian>()?;
        let exon_end = file.read_u32::<BigEndian>()?;
        exons.push(Exon {
            start: exon_start,
            end: exon_end,
        });
    }
    let identifier_count = file.read_u8()?;
    let mut identifiers = Vec::with_capacity(identifier_count as usize);
    for _ in 0..identifier_count {
        let kind = read_string(file)?;
        let value = read_string(file)?;
        identifiers.push(GeneIdentifier { kind, value });
    }
    let tag_count = file.read_u8()?;
    let mut tags = Vec::with_capacity(tag_count as usize);
    for _ in 0..tag_count {
        tags.push(read_string(file)?);
    }
    Ok(Gene {
        start,
        end,
        exons,
        identifiers,
        tags,
    })
}
