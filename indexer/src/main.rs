use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use plotsim_core::persist::{
    begin_text_staging, load_index, load_meta, open_store, publish_docs, publish_texts, save_meta, stage_docs, stage_text, IndexPaths, MetaFile,
};
use plotsim_core::tokenizer::normalize;
use plotsim_core::vectorizer::vectorize;
use plotsim_core::{DocCatalog, DocId, GenerationInfo, Normalization, SimilarityEngine, SimilarityOptions, VectorizerOptions};
use std::collections::HashSet;
use std::path::Path;
use tracing_subscriber::{EnvFilter, fmt};

mod corpus;

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and query the plot summary similarity index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Vectorize every plot summary and replace the stored generation
    Build {
        /// Tab-separated `id<TAB>summary` file
        #[arg(long)]
        summaries: String,
        /// Tab-separated movie metadata file
        #[arg(long)]
        metadata: String,
        /// Output index directory
        #[arg(long, env = "PLOTSIM_INDEX", default_value = "./index")]
        output: String,
        /// Store raw tf-idf and normalize during each query instead of at index time
        #[arg(long, default_value_t = false)]
        query_time_norm: bool,
    },
    /// Print the documents most similar to one document
    Similar {
        #[arg(long, env = "PLOTSIM_INDEX", default_value = "./index")]
        index: String,
        /// Document id to find neighbours for
        #[arg(long)]
        id: DocId,
        #[arg(long, default_value_t = 5)]
        top: usize,
        #[arg(long, env = "PLOTSIM_MAX_SCAN_ROWS", default_value_t = plotsim_core::similarity::DEFAULT_MAX_SCAN_ROWS)]
        max_scan_rows: usize,
    },
    /// Show what the current generation contains
    Stats {
        #[arg(long, env = "PLOTSIM_INDEX", default_value = "./index")]
        index: String,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { summaries, metadata, output, query_time_norm } => {
            let normalization = if query_time_norm { Normalization::QueryTime } else { Normalization::IndexTime };
            build_index(Path::new(&summaries), Path::new(&metadata), &output, VectorizerOptions { normalization })?;
            Ok(())
        }
        Commands::Similar { index, id, top, max_scan_rows } => {
            let paths = IndexPaths::new(&index);
            let (docs, store) = load_index(&paths).with_context(|| format!("opening index {index}"))?;
            let engine = SimilarityEngine::new(&store, &docs, SimilarityOptions { max_scan_rows });
            let neighbors = engine.top_n(id, top)?;
            if neighbors.is_empty() {
                println!("no similar documents for {id}");
            }
            for n in neighbors {
                println!("{:>10}  {} (Similarity: {:.2})", n.doc_id, n.label, n.score);
            }
            Ok(())
        }
        Commands::Stats { index } => {
            let paths = IndexPaths::new(&index);
            let meta = load_meta(&paths).with_context(|| format!("reading metadata of {index}"))?;
            let store = open_store(&paths)?;
            println!("{}", serde_json::to_string_pretty(&meta)?);
            if let Some(info) = store.generation_info()? {
                println!("generation {} normalization {:?}, {} vectors stored", info.generation, info.normalization, store.len()?);
            }
            Ok(())
        }
    }
}

fn build_index(summaries: &Path, metadata: &Path, output: &str, options: VectorizerOptions) -> Result<GenerationInfo> {
    let paths = IndexPaths::new(output);

    let plots = corpus::read_summaries(summaries)?;
    let mut catalog = DocCatalog::new();
    for (doc_id, meta) in corpus::read_metadata(metadata)? {
        catalog.insert(doc_id, meta);
    }

    // Movies without a plot have nothing to compare; keep them out of the catalog.
    let with_plot: HashSet<DocId> = plots.iter().map(|(id, _)| *id).collect();
    let dropped = catalog.retain(|id| with_plot.contains(&id));
    tracing::info!(summaries = plots.len(), catalog = catalog.len(), dropped, "ingested corpus");

    let tokenized: Vec<(DocId, Vec<String>)> = plots.iter().map(|(doc_id, text)| (*doc_id, normalize(text))).collect();
    let vectorized = vectorize(&tokenized, options).context("vectorizing corpus")?;

    // Texts and catalog are staged next to the live index and only renamed into
    // place once the new generation is committed.
    begin_text_staging(&paths)?;
    for (doc_id, text) in &plots {
        let rel = stage_text(&paths, *doc_id, text)?;
        if let Some(meta) = catalog.get_mut(*doc_id) {
            meta.text_path = Some(rel);
        }
    }
    stage_docs(&paths, &catalog)?;

    let store = open_store(&paths)?;
    let info = store.commit(&vectorized)?;
    publish_docs(&paths)?;
    publish_texts(&paths)?;
    save_meta(&paths, &MetaFile::from(&info))?;

    tracing::info!(output, generation = info.generation, "index build complete");
    Ok(info)
}
