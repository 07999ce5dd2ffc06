use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "outfit-finder", version)]
#[command(about = "Find catalogue products matching the outfit in a photo")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Serve the HTTP API
    Serve,

    /// Embed catalogue documents that are not processed yet
    Backfill(BackfillArgs),

    /// Create the vector search index, or check that it exists
    Index(IndexArgs),

    /// Extract the products of an outfit from a photo
    Extract(ExtractArgs),

    /// Recommend catalogue products for a category -> description mapping
    Recommend(RecommendArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackfillModeArg {
    /// Write the embedding onto the source document
    InPlace,
    /// Copy documents with their embedding into `--destination`
    Copy,
}

#[derive(Debug, Args)]
pub struct BackfillArgs {
    #[arg(long, value_enum, default_value = "in-place")]
    pub mode: BackfillModeArg,

    /// Destination collection, required with `--mode copy`
    #[arg(long, required_if_eq("mode", "copy"))]
    pub destination: Option<String>,

    /// Source collection. Defaults to the configured products collection.
    #[arg(long)]
    pub source: Option<String>,

    /// Stop after this many documents
    #[arg(short, long)]
    pub limit: Option<u64>,

    /// Documents embedded in parallel
    #[arg(short, long, default_value_t = 1)]
    pub concurrency: usize,

    /// Text fields to embed. Defaults to the configured fields.
    #[arg(short, long, value_delimiter = ',')]
    pub fields: Vec<String>,
}

#[derive(Debug, Args)]
pub struct IndexArgs {
    /// Only check that the collection and index exist
    #[arg(long)]
    pub check: bool,
}

#[derive(Debug, Args)]
pub struct ExtractArgs {
    /// Photo to analyse (PNG, JPEG, GIF or WEBP)
    pub image: PathBuf,

    /// Replace the default extraction instruction
    #[arg(short, long)]
    pub instruction: Option<String>,

    /// Continue with recommendations for the extracted products
    #[arg(short, long)]
    pub recommend: bool,

    /// Results per product when recommending
    #[arg(short = 'k', long)]
    pub top_k: Option<u32>,
}

#[derive(Debug, Args)]
pub struct RecommendArgs {
    /// JSON object of category -> description, or `@path` to read it from a file
    pub products: String,

    /// Results per product
    #[arg(short = 'k', long)]
    pub top_k: Option<u32>,

    /// Restrict matches to one catalogue subcategory
    #[arg(short, long)]
    pub subcategory: Option<String>,
}
