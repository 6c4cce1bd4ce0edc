use std::error::Error;

use clap::Parser;

use crate::GbfRead;

#[derive(Clone, Debug, Parser, PartialEq)]
#[command(
    name = "info",
    about = "Gets information about a gene store file.",
    long_about = None,
)]
pub struct StoreInfoArgs {
    /// The gene store file to get info for.
    pub store: String,

    /// If set, will print out every populated bin and its gene-address count.
    #[arg(long)]
    #[arg(default_value_t = false)]
    pub bins: bool,
}

pub fn storeinfo(args: StoreInfoArgs) -> Result<(), Box<dyn Error>> {
    let mut store = GbfRead::open_file(&args.store)?;
    let header = store.header().clone();
    println!("version: {}", header.version);
    println!("genome: {}", header.genome);
    println!("windowSize: {}", header.window);
    println!("binCount: {}", header.bin_count);

    let stats = store.bin_stats()?;
    println!("populatedBins: {}", stats.bins.len());
    println!("geneCount: {}", stats.gene_count);
    if args.bins {
        for (bin, count) in stats.bins {
            println!("\t{}\t{}", bin, count);
        }
    }

    Ok(())
}
