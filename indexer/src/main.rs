use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use searchcore::{ClassifierEngine, DiskInvertedIndex, DocId, Engine};
use serde::Deserialize;
use tracing_subscriber::{EnvFilter, fmt};
use walkdir::WalkDir;

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct InputDoc {
    id: String,
    body: String,
}

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build a positional index and run boolean queries and Naive-Bayes classification against it", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from .txt, .json or .jsonl files under a directory
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
    },
    /// Run a boolean query: terms joined by * (and), + (or), ~ (and not), ` (phrase)
    Query {
        #[arg(long, default_value = "./index")]
        index: String,
        query: Vec<String>,
    },
    /// Print every vocabulary term
    Vocab {
        #[arg(long, default_value = "./index")]
        index: String,
    },
    /// Print the stemmed form of each word
    Stem { words: Vec<String> },
    /// Rank terms by how well they separate the training classes
    Features {
        #[arg(long, default_value = "./index")]
        index: String,
        /// JSON object mapping class name to a list of document names
        #[arg(long)]
        training: String,
        /// Number of terms to print per class and globally
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Assign documents to the most probable training class
    Classify {
        #[arg(long, default_value = "./index")]
        index: String,
        #[arg(long)]
        training: String,
        /// Number of global features used by the model
        #[arg(long, default_value_t = 50)]
        features: usize,
        /// Documents to classify; defaults to every document outside the training set
        docs: Vec<String>,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output } => build_index(&input, &output),
        Commands::Query { index, query } => run_query(&index, &query.join(" ")),
        Commands::Vocab { index } => {
            let mut engine = Engine::new();
            engine.load_index(Path::new(&index))?;
            for term in engine.vocab()? {
                println!("{term}");
            }
            Ok(())
        }
        Commands::Stem { words } => {
            let engine = Engine::new();
            for word in words {
                println!("{word}\t{}", engine.stem(&word));
            }
            Ok(())
        }
        Commands::Features { index, training, top } => print_features(&index, &training, top),
        Commands::Classify { index, training, features, docs } => classify(&index, &training, features, docs),
    }
}

fn build_index(input: &str, output: &str) -> Result<()> {
    let input_path = Path::new(input);
    let mut files: Vec<PathBuf> = Vec::new();
    if input_path.is_dir() {
        for entry in WalkDir::new(input_path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() {
                if let Some(ext) = p.extension().and_then(|s| s.to_str()) {
                    if matches!(ext, "txt" | "json" | "jsonl") {
                        files.push(p.to_path_buf());
                    }
                }
            }
        }
    } else if input_path.is_file() {
        files.push(input_path.to_path_buf());
    } else {
        bail!("input {input} does not exist");
    }

    let mut docs: BTreeMap<String, String> = BTreeMap::new();
    for file in files {
        match file.extension().and_then(|s| s.to_str()) {
            Some("jsonl") => read_jsonl(&file, &mut docs)?,
            Some("json") => read_json(&file, &mut docs)?,
            _ => {
                let name = file.strip_prefix(input_path).unwrap_or(&file).to_string_lossy().into_owned();
                let name = if name.is_empty() { file.to_string_lossy().into_owned() } else { name };
                let text = fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
                insert_doc(&mut docs, name, text);
            }
        }
    }
    tracing::info!(num_docs = docs.len(), "collected documents");

    let mut engine = Engine::new();
    let meta = engine.create_index(docs, Path::new(output))?;
    tracing::info!(output, num_docs = meta.num_docs, num_terms = meta.num_terms, "index build complete");
    Ok(())
}

fn insert_doc(docs: &mut BTreeMap<String, String>, name: String, text: String) {
    if docs.insert(name.clone(), text).is_some() {
        tracing::warn!(name = name.as_str(), "duplicate document name; keeping the last one");
    }
}

fn read_jsonl(file: &Path, docs: &mut BTreeMap<String, String>) -> Result<()> {
    let f = File::open(file)?;
    let reader = BufReader::new(f);
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc: InputDoc = serde_json::from_str(&line).with_context(|| format!("parsing {}", file.display()))?;
        insert_doc(docs, doc.id, doc.body);
    }
    Ok(())
}

fn read_json(file: &Path, docs: &mut BTreeMap<String, String>) -> Result<()> {
    let f = File::open(file)?;
    let reader = BufReader::new(f);
    let json: serde_json::Value = serde_json::from_reader(reader)?;
    match json {
        serde_json::Value::Array(arr) => {
            for v in arr {
                let doc: InputDoc = serde_json::from_value(v)?;
                insert_doc(docs, doc.id, doc.body);
            }
        }
        serde_json::Value::Object(_) => {
            let doc: InputDoc = serde_json::from_value(json)?;
            insert_doc(docs, doc.id, doc.body);
        }
        _ => {}
    }
    Ok(())
}

fn run_query(index: &str, query: &str) -> Result<()> {
    let mut engine = Engine::new();
    engine.load_index(Path::new(index))?;
    let hits = engine.query(query)?;
    for name in &hits {
        println!("{name}");
    }
    tracing::info!(query, total_hits = hits.len(), "query complete");
    Ok(())
}

/// Loads `{ "class": ["doc name", ...] }` and registers every document with the classifier.
fn load_training(engine: &Engine, training: &str) -> Result<(ClassifierEngine, BTreeSet<DocId>)> {
    let f = File::open(training).with_context(|| format!("opening {training}"))?;
    let classes: BTreeMap<String, Vec<String>> = serde_json::from_reader(BufReader::new(f))?;
    let index = engine.index().context("index not loaded")?;
    let mut classifier = engine.classifier()?;
    let mut training_ids = BTreeSet::new();
    for (class_name, names) in &classes {
        let ids = resolve(index, names)?;
        classifier.add_training_doc_list(class_name, &ids)?;
        training_ids.extend(ids);
    }
    Ok((classifier, training_ids))
}

fn resolve(index: &DiskInvertedIndex, names: &[String]) -> Result<Vec<DocId>> {
    names
        .iter()
        .map(|n| index.doc_id(n).with_context(|| format!("document {n} is not in the index")))
        .collect()
}

fn print_features(index: &str, training: &str, top: usize) -> Result<()> {
    let mut engine = Engine::new();
    engine.load_index(Path::new(index))?;
    let (mut classifier, _) = load_training(&engine, training)?;
    classifier.generate_features_list()?;

    let class_names: Vec<String> = classifier.class_names().into_iter().map(String::from).collect();
    for class_name in &class_names {
        println!("[{class_name}]");
        for scored in classifier.top_class_features(class_name, top)? {
            println!("{:.6}\t{}", scored.score, scored.term);
        }
    }
    println!("[global]");
    for scored in classifier.top_global_features(top) {
        println!("{:.6}\t{}", scored.score, scored.term);
    }
    Ok(())
}

fn classify(index: &str, training: &str, features: usize, docs: Vec<String>) -> Result<()> {
    let mut engine = Engine::new();
    engine.load_index(Path::new(index))?;
    let (mut classifier, training_ids) = load_training(&engine, training)?;
    classifier.generate_features_list()?;

    let disk = engine.index().context("index not loaded")?;
    let targets: Vec<DocId> = if docs.is_empty() {
        disk.doc_ids().iter().copied().filter(|id| !training_ids.contains(id)).collect()
    } else {
        resolve(disk, &docs)?
    };
    for id in targets {
        let class_name = classifier.classify_doc(features, id)?;
        println!("{}\t{class_name}", disk.doc_name(id).unwrap_or_default());
    }
    Ok(())
}
