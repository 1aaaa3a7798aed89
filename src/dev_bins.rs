use std::cmp::Reverse;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{info, instrument};

use crate::corpus::{write_author_docs, AuthorDocs};

/// Authors per bin shard.
pub const AUTHORS_PER_BIN: usize = 7;

/// Dev authors ordered by how many training documents each has, most
/// first. Ties keep author id order.
fn order_by_train_count<'a>(
    dev: &'a AuthorDocs,
    train: &AuthorDocs,
) -> Vec<(&'a String, &'a Vec<String>)> {
    let mut ordered: Vec<_> = dev.iter().collect();
    ordered.sort_by_key(|(author, _)| {
        Reverse(train.get(*author).map_or(0, Vec::len))
    });
    ordered
}

// The binning order is only well defined when dev and train cover the
// same authors.
fn check_orderings_agree(dev: &AuthorDocs, train: &AuthorDocs) -> Result<()> {
    let mut train_sorted: Vec<&String> = train.keys().collect();
    train_sorted.sort_by_key(|author| {
        Reverse(train.get(*author).map_or(0, Vec::len))
    });

    let dev_sorted: Vec<&String> = order_by_train_count(dev, train)
        .into_iter()
        .map(|(author, _)| author)
        .collect();

    if train_sorted != dev_sorted {
        return Err(anyhow::anyhow!(
            "Dev and train author orderings disagree; both splits must cover the same authors"
        ));
    }
    Ok(())
}

/// Write the dev split as JSON bins of [`AUTHORS_PER_BIN`] authors,
/// with bin 1 holding the authors that have the most training data.
///
/// Bins land in `out_dir` as `bin_1_dev.json`, `bin_2_dev.json` and so
/// on, with a final short bin when the author count is not a multiple
/// of the bin size. Returns the written paths in bin order.
#[instrument(skip(dev, train), err)]
pub fn write_dev_bins(
    dev: &AuthorDocs,
    train: &AuthorDocs,
    out_dir: &Path,
) -> Result<Vec<PathBuf>> {
    check_orderings_agree(dev, train)?;

    let ordered = order_by_train_count(dev, train);
    let mut written = Vec::new();
    for (index, chunk) in ordered.chunks(AUTHORS_PER_BIN).enumerate() {
        let bin: AuthorDocs = chunk
            .iter()
            .map(|(author, docs)| ((*author).clone(), (*docs).clone()))
            .collect();
        let path = out_dir.join(format!("bin_{}_dev.json", index + 1));
        write_author_docs(&bin, &path)?;
        written.push(path);
    }

    info!("Wrote {} dev bins to {}", written.len(), out_dir.display());
    Ok(written)
}
