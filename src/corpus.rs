//! Loading and repair of the PAN22 authorship verification corpus.
//!
//! The raw release ships as two line-aligned JSONL files: `pairs.jsonl`
//! holds document pairs and `truth.jsonl` holds the author ids for each
//! pair. Documents are full of redaction tags like `<city1>` that trip
//! up downstream parsers, so each tag is swapped for an innocuous stand
//! in before the corpus is split and binned.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use serde::Deserialize;
use tracing::{info, instrument};

/// Author id mapped to that author's documents. Ordered so that every
/// serialization of the same corpus comes out identical.
pub type AuthorDocs = BTreeMap<String, Vec<String>>;

/// The corpus partitioned for training and evaluation.
#[derive(Debug, Default)]
pub struct Splits {
    pub train: AuthorDocs,
    pub dev: AuthorDocs,
    pub test: AuthorDocs,
}

#[derive(Debug, Deserialize)]
struct PairRecord {
    pair: (String, String),
}

#[derive(Debug, Deserialize)]
struct TruthRecord {
    authors: (String, String),
}

fn read_jsonl<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut records = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).with_context(|| {
            format!("Bad JSON on line {} of {}", number + 1, path.display())
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Load the raw pair and truth files. The two files describe the same
/// pairs line for line, so their lengths have to agree.
#[instrument(err)]
pub fn load_raw_pairs(
    pairs_path: &Path,
    truths_path: &Path,
) -> Result<(Vec<(String, String)>, Vec<(String, String)>)> {
    let text_pairs: Vec<(String, String)> = read_jsonl::<PairRecord>(pairs_path)?
        .into_iter()
        .map(|record| record.pair)
        .collect();
    let id_pairs: Vec<(String, String)> = read_jsonl::<TruthRecord>(truths_path)?
        .into_iter()
        .map(|record| record.authors)
        .collect();

    if id_pairs.len() != text_pairs.len() {
        return Err(anyhow::anyhow!(
            "Pair files disagree: {} author pairs vs {} text pairs",
            id_pairs.len(),
            text_pairs.len()
        ));
    }

    info!("Loaded {} document pairs", text_pairs.len());
    Ok((id_pairs, text_pairs))
}

/// Group documents by author. A document appearing in several pairs is
/// kept once per author.
pub fn collect_by_author(
    id_pairs: &[(String, String)],
    text_pairs: &[(String, String)],
) -> AuthorDocs {
    let mut data = AuthorDocs::new();
    for ((id_a, id_b), (text_a, text_b)) in id_pairs.iter().zip(text_pairs) {
        for (id, text) in [(id_a, text_a), (id_b, text_b)] {
            let docs = data.entry(id.clone()).or_default();
            if !docs.iter().any(|existing| existing == text) {
                docs.push(text.clone());
            }
        }
    }
    data
}

const DROPPED_TAGS: &[&str] = &[
    "<data_extract>",
    "<data_excerpt>",
    "<link>",
    "<line_break>",
    "<tab>",
    "<table>",
    "<image>",
    "<images>",
    "<nl>",
    "<new>",
    "<figure>",
    "<susiness>",
];

// Date-ish tags that carry no inner keyword for the number regex.
const NUMERIC_TAGS: &[&str] =
    &["<DD>", "<DD_MM_YY>", "<DDth>", "<YY>", "<YYYY>", "<age>"];

const FIRST_NAMES: &[&str] = &[
    "James", "Mary", "Robert", "Patricia", "John", "Jennifer", "Michael",
    "Linda", "David", "Elizabeth", "William", "Barbara", "Richard", "Susan",
    "Joseph", "Jessica", "Thomas", "Sarah", "Charles", "Karen", "Christopher",
    "Lisa", "Daniel", "Nancy", "Matthew", "Betty", "Anthony", "Margaret",
    "Mark", "Sandra", "Donald", "Ashley", "Steven", "Kimberly", "Paul",
    "Emily", "Andrew", "Donna", "Joshua", "Michelle",
];

// Misspellings are deliberate; earlier corpus releases used these
// exact words, and regenerated corpora must stay comparable.
const CITIES: &[&str] = &[
    "New York City",
    "Seattle",
    "Los Angelos",
    "San Fransisco",
    "Chicago",
    "Houston",
    "Pheonix",
    "Philadelphia",
    "San Antonio",
    "San Jose",
    "Dallas",
];

const CONDITIONS: &[&str] =
    &["hypothermia", "flu", "covid", "cancer", "asthma", "monkey pox"];

const ADJECTIVES: &[&str] =
    &["happy", "dense", "loud", "large", "small", "populated", "amazing"];

const COUNTRIES: &[&str] =
    &["America", "Britain", "Brazil", "Russia", "Mexico", "Iran", "Iraq"];

const COURSES: &[&str] = &[
    "math",
    "linguistics",
    "computer science",
    "biology",
    "physics",
    "chemistry",
];

const DAYS: &[&str] = &[
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

const MONTHS: &[&str] = &[
    "December",
    "November",
    "October",
    "September",
    "August",
    "July",
    "June",
];

const LANGUAGES: &[&str] = &[
    "Spanish", "English", "Arabic", "Russian", "Mandarin", "French", "Hebrew",
];

const STATIONS: &[&str] = &[
    "Penn Station",
    "Grand Central Terminal",
    "Huntington Station",
    "Port Jefferson Station",
    "Stony Brook Station",
];

const TOWNS: &[&str] = &[
    "Stony Brook",
    "Port Jefferson",
    "East Setauket",
    "Huntington",
    "Patchogue",
];

const BANDS: &[&str] = &["Nirvana", "Queen", "Pink Floyd", "The Beatles"];

struct TagPatterns {
    question: Regex,
    person: Regex,
    partial: Regex,
    city: Regex,
    condition: Regex,
    adjective: Regex,
    country: Regex,
    course: Regex,
    day: Regex,
    month: Regex,
    number: Regex,
    language: Regex,
    station: Regex,
    town: Regex,
}

fn tag_patterns() -> &'static TagPatterns {
    static PATTERNS: OnceLock<TagPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| TagPatterns {
        question: Regex::new(r"<question(\d)?>").expect("static regex"),
        person: Regex::new(r"(<addr?(\d+)?_.*>)|(<pers(\d)?.*>)")
            .expect("static regex"),
        partial: Regex::new(r"<part_.*>").expect("static regex"),
        city: Regex::new(r"<city(\d)?>").expect("static regex"),
        condition: Regex::new(r"<condition(\d)?>").expect("static regex"),
        adjective: Regex::new(
            r"(<continent(\d)?_adj>)|(<condition(\d)?_adj>)|(<country(\d)_adj>)",
        )
        .expect("static regex"),
        country: Regex::new(r"(<country(\d)?>)|(<counr?ty>)|(<continent>)")
            .expect("static regex"),
        course: Regex::new(r"<course(\d)>").expect("static regex"),
        day: Regex::new(r"(<day(\d)?>)|(<day_abbr>)").expect("static regex"),
        month: Regex::new(r"(<month(\d)?>)|(<month_abbr>)")
            .expect("static regex"),
        number: Regex::new(r"(<.*_number(\d)?>)|(<.*code(\d)?>)")
            .expect("static regex"),
        language: Regex::new(r"<language(\d)?>").expect("static regex"),
        station: Regex::new(r"<station(\d)?>").expect("static regex"),
        town: Regex::new(r"<town(\d)?>").expect("static regex"),
    })
}

fn strip_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[<>\d]").expect("static regex"))
}

fn parenthesis_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(.*\)").expect("static regex"))
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<.*?>").expect("static regex"))
}

fn pick<R: Rng>(choices: &[&str], rng: &mut R) -> String {
    choices.choose(rng).map(|s| s.to_string()).unwrap_or_default()
}

/// Pick a stand-in for one redaction tag.
///
/// Most tags become a random member of their category (a person tag
/// becomes a first name and so on). Purely structural tags become a
/// space, `<part_...>` becomes a full stop, and anything unrecognized
/// keeps its inner keyword with the angle brackets and digits stripped.
pub fn replace_tag<R: Rng>(tag: &str, rng: &mut R) -> String {
    let patterns = tag_patterns();
    if patterns.question.is_match(tag) || DROPPED_TAGS.contains(&tag) {
        " ".to_string()
    } else if patterns.person.is_match(tag) {
        pick(FIRST_NAMES, rng)
    } else if patterns.partial.is_match(tag) {
        ".".to_string()
    } else if patterns.city.is_match(tag) {
        pick(CITIES, rng)
    } else if patterns.condition.is_match(tag) {
        pick(CONDITIONS, rng)
    } else if patterns.adjective.is_match(tag) {
        pick(ADJECTIVES, rng)
    } else if patterns.country.is_match(tag) {
        pick(COUNTRIES, rng)
    } else if patterns.course.is_match(tag) {
        pick(COURSES, rng)
    } else if patterns.day.is_match(tag) {
        pick(DAYS, rng)
    } else if patterns.month.is_match(tag) {
        pick(MONTHS, rng)
    } else if patterns.number.is_match(tag) || NUMERIC_TAGS.contains(&tag) {
        rng.gen_range(0..=10_000).to_string()
    } else if patterns.language.is_match(tag) {
        pick(LANGUAGES, rng)
    } else if patterns.station.is_match(tag) {
        pick(STATIONS, rng)
    } else if patterns.town.is_match(tag) {
        pick(TOWNS, rng)
    } else if tag == "<band>" {
        pick(BANDS, rng)
    } else {
        strip_tag_re().replace_all(tag, "").into_owned()
    }
}

/// Undo the HTML escaping in the raw release; `&amp;` becomes the
/// word `and`.
pub fn unescape_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "and")
}

/// Drop parenthesized spans. Greedy within each line: everything from
/// the first `(` to the last `)` goes.
pub fn strip_parenthesized(text: &str) -> String {
    parenthesis_re().replace_all(text, "").into_owned()
}

fn find_tags(text: &str) -> Vec<String> {
    tag_re()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Collapse runs of whitespace and mend the truncated first word that
/// redaction left behind at the start of many documents.
pub fn normalize_spacing(text: &str) -> String {
    let mut words: Vec<&str> = text.split_whitespace().collect();
    if let Some(first) = words.first() {
        let mended = match *first {
            "r" => Some("Dear"),
            "nk" => Some("Thank"),
            "nks" => Some("Thanks"),
            "d" => Some("Good"),
            "lo" | "lo," => Some("Hello"),
            "t's" | "t`s" => Some("It's"),
            "t" => Some("It"),
            "py" => Some("Happy"),
            "ning" => Some("Morning"),
            "ry" => Some("Sorry"),
            "y>" | "nl>" => Some(""),
            _ => None,
        };
        if let Some(mended) = mended {
            words[0] = mended;
        }
    }
    words.join(" ")
}

/// Repair one document: unescape, drop parenthesized spans, swap every
/// redaction tag for a stand-in, then normalize spacing.
pub fn repair_text<R: Rng>(text: &str, rng: &mut R) -> String {
    let text = unescape_html(text);
    let mut text = strip_parenthesized(&text);
    for tag in find_tags(&text) {
        let replacement = replace_tag(&tag, rng);
        text = text.replacen(&tag, &replacement, 1);
    }
    normalize_spacing(&text)
}

/// Repair every document in the corpus, leaving the input untouched.
pub fn repair_documents<R: Rng>(data: &AuthorDocs, rng: &mut R) -> AuthorDocs {
    let mut repaired = AuthorDocs::new();
    for (author, docs) in data {
        let docs = docs.iter().map(|text| repair_text(text, rng)).collect();
        repaired.insert(author.clone(), docs);
    }
    repaired
}

/// Partition each author's documents: the first five go to test, the
/// next five to dev, and the rest to train. The cut offs are specific
/// to the PAN22 release.
pub fn train_dev_test_splits(data: &AuthorDocs) -> Splits {
    let mut splits = Splits::default();
    for (author, docs) in data {
        for (index, text) in docs.iter().enumerate() {
            let bucket = if index <= 4 {
                &mut splits.test
            } else if index <= 9 {
                &mut splits.dev
            } else {
                &mut splits.train
            };
            bucket.entry(author.clone()).or_default().push(text.clone());
        }
    }
    splits
}

/// Write an author-to-documents map as pretty-printed JSON.
pub fn write_author_docs(data: &AuthorDocs, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create {}", parent.display())
        })?;
    }
    let file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(file, data)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Write a tab-separated table of per-author document counts.
#[instrument(skip(data), err)]
pub fn write_dataset_stats(data: &AuthorDocs, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create {}", parent.display())
        })?;
    }
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(["author", "num_counts"])?;
    for (author, docs) in data {
        let count = docs.len().to_string();
        writer.write_record([author.as_str(), count.as_str()])?;
    }
    writer.flush()?;
    info!(
        "Wrote dataset stats for {} authors to {}",
        data.len(),
        path.display()
    );
    Ok(())
}
