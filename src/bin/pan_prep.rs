use anyhow::Result;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;

#[derive(Debug, Parser)]
struct Args {
    #[arg(long, default_value = "data/pan/raw/pairs.jsonl")]
    pairs: PathBuf,
    #[arg(long, default_value = "data/pan/raw/truth.jsonl")]
    truths: PathBuf,
    #[arg(long, default_value = binrun::DEFAULT_BINS_DIR)]
    bins_out: PathBuf,
    /// Also write train/dev/test.json into this directory
    #[arg(long)]
    splits_out: Option<PathBuf>,
    /// Also write a tab-separated author document-count table
    #[arg(long)]
    stats_out: Option<PathBuf>,
    /// Seed for the redaction tag stand-ins; random when omitted
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let (id_pairs, text_pairs) =
        binrun::corpus::load_raw_pairs(&args.pairs, &args.truths)?;
    let raw = binrun::corpus::collect_by_author(&id_pairs, &text_pairs);

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let repaired = binrun::corpus::repair_documents(&raw, &mut rng);

    let splits = binrun::corpus::train_dev_test_splits(&repaired);

    if let Some(dir) = &args.splits_out {
        binrun::corpus::write_author_docs(&splits.train, &dir.join("train.json"))?;
        binrun::corpus::write_author_docs(&splits.dev, &dir.join("dev.json"))?;
        binrun::corpus::write_author_docs(&splits.test, &dir.join("test.json"))?;
    }

    // Stats describe the corpus as released, before repair.
    if let Some(path) = &args.stats_out {
        binrun::corpus::write_dataset_stats(&raw, path)?;
    }

    let bins =
        binrun::dev_bins::write_dev_bins(&splits.dev, &splits.train, &args.bins_out)?;

    println!(
        "Preprocessing done: pairs={}, authors={}, dev_authors={}, bins={}",
        text_pairs.len(),
        raw.len(),
        splits.dev.len(),
        bins.len()
    );

    Ok(())
}
