use std::error::Error;
use std::io::{self, BufWriter, Write};

use clap::Parser;

use crate::GbfRead;

#[derive(Clone, Debug, Parser, PartialEq)]
#[command(
    name = "query",
    about = "Prints the genes overlapping a span of a gene store file.",
    long_about = None,
)]
pub struct StoreQueryArgs {
    /// The gene store file to query.
    pub store: String,

    /// 1-based inclusive start of the queried span.
    pub start: u32,

    /// 1-based inclusive end of the queried span.
    pub end: u32,

    /// Minimum overlap, in bases, for a gene to be reported.
    #[arg(long)]
    #[arg(default_value_t = 1)]
    pub min_overlap: u32,
}

pub fn storequery(args: StoreQueryArgs) -> Result<(), Box<dyn Error>> {
    let mut store = GbfRead::open_file(&args.store)?;
    let genes = store.find_genes_with_min(args.start, args.end, args.min_overlap)?;

    let stdout = io::stdout();
    let handle = stdout.lock();
    let mut out = BufWriter::new(handle);
    for gene in genes {
        let exons = gene
            .exons
            .iter()
            .map(|exon| format!("{}-{}", exon.start, exon.end))
            .collect::<Vec<_>>()
            .join(",");
        let identifiers = gene
            .identifiers
            .iter()
            .map(|id| format!("{}={}", id.kind, id.value))
            .collect::<Vec<_>>()
            .join(";");
        let tags = gene.tags.join(",");
        out.write_fmt(format_args!(
            "{}\t{}\t{}\t{}\t{}\n",
            gene.start, gene.end, exons, identifiers, tags
        ))?;
    }

    Ok(())
}
