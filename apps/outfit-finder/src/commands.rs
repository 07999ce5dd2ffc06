//! Subcommand implementations

use domain_outfit::{
    BackfillJob, BackfillMode, BackfillOptions, EqualityFilter, ExtractedProducts, OutfitSession,
    RecommendOptions, Recommendation, VectorIndexDefinition,
};
use eyre::{WrapErr, bail};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::api;
use crate::cli::{BackfillArgs, BackfillModeArg, ExtractArgs, IndexArgs, RecommendArgs};
use crate::openapi::ApiDoc;
use crate::server;
use crate::state::AppState;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

pub async fn serve(state: AppState) -> eyre::Result<()> {
    let api_routes = api::routes(&state)?;
    let app = server::build_router::<ApiDoc>(api_routes, api::health::router(state.db.clone()));

    let mongo_client = state.mongo_client.clone();
    info!("Starting Outfit Finder API (graceful shutdown timeout: {:?})", SHUTDOWN_TIMEOUT);
    server::serve(app, &state.config.server, SHUTDOWN_TIMEOUT, async move {
        info!("Shutting down: closing MongoDB connections");
        mongo_client.shutdown().await;
        info!("MongoDB connection closed successfully");
    })
    .await
    .wrap_err("Server error")?;

    info!("Outfit Finder API shutdown complete");
    Ok(())
}

pub async fn backfill(state: &AppState, args: BackfillArgs) -> eyre::Result<()> {
    let options = backfill_options(state, &args)?;
    let source = args
        .source
        .unwrap_or_else(|| state.config.outfit.products_collection.clone());

    let job = BackfillJob::new(Arc::new(state.catalog(&source)), state.embedder()?);
    let report = job.run(&options).await?;

    info!(
        "Backfill complete: {} scanned, {} embedded, {} skipped, {} failed",
        report.scanned, report.embedded, report.skipped, report.failed
    );
    print_json(&report)
}

fn backfill_options(state: &AppState, args: &BackfillArgs) -> eyre::Result<BackfillOptions> {
    if args.concurrency == 0 {
        bail!("--concurrency must be at least 1");
    }

    let mode = match (args.mode, &args.destination) {
        (BackfillModeArg::InPlace, _) => BackfillMode::InPlace,
        (BackfillModeArg::Copy, Some(destination)) => BackfillMode::Copy {
            destination: destination.clone(),
        },
        (BackfillModeArg::Copy, None) => bail!("--destination is required with --mode copy"),
    };

    let mut options = BackfillOptions::from_config(&state.config.outfit)
        .with_mode(mode)
        .with_concurrency(args.concurrency);
    if let Some(limit) = args.limit {
        options = options.with_limit(limit);
    }
    if !args.fields.is_empty() {
        options.text_fields = args.fields.clone();
    }
    Ok(options)
}

pub async fn index(state: &AppState, args: IndexArgs) -> eyre::Result<()> {
    let search = state.vector_search();
    let settings = search.settings();

    if args.check {
        search.verify().await?;
        info!(
            "Vector index '{}' is present on '{}'",
            settings.index, settings.collection
        );
        return Ok(());
    }

    let definition = VectorIndexDefinition::new(settings, state.config.outfit.embedding_model);
    if search.ensure_index(&definition).await? {
        info!(
            "Requested vector index '{}' ({} dimensions); Atlas builds it in the background",
            definition.name, definition.dimensions
        );
    } else {
        info!("Vector index '{}' already exists", definition.name);
    }
    Ok(())
}

#[derive(Serialize)]
struct ExtractOutput<'a> {
    products: &'a ExtractedProducts,
    #[serde(skip_serializing_if = "Option::is_none")]
    recommendation: Option<Recommendation>,
}

pub async fn extract(state: &AppState, args: ExtractArgs) -> eyre::Result<()> {
    let image = tokio::fs::read(&args.image)
        .await
        .wrap_err_with(|| format!("Failed to read {}", args.image.display()))?;

    let finder = state.finder()?;
    let mut session = OutfitSession::new();
    if let Some(instruction) = args.instruction {
        session = session.with_instruction(instruction);
    }
    session.upload(image);

    finder.extract(&mut session).await?;
    if let Some(issue) = session.issue() {
        warn!("Vision output could not be parsed: {}", issue.message());
    }

    let recommendation = if args.recommend {
        let options = RecommendOptions {
            top_k: args.top_k,
            filter: None,
        };
        Some(finder.recommend(&session, options).await)
    } else {
        None
    };

    print_json(&ExtractOutput {
        products: &session.products,
        recommendation,
    })
}

pub async fn recommend(state: &AppState, args: RecommendArgs) -> eyre::Result<()> {
    let products = read_products(&args.products).await?;
    let options = RecommendOptions {
        top_k: args.top_k,
        filter: args
            .subcategory
            .map(|value| EqualityFilter {
                field: "subcategory".to_string(),
                value,
            }),
    };

    let recommendation = state.recommender()?.recommend(&products, options).await;
    for failure in &recommendation.failures {
        warn!(
            "No recommendation for '{}': {} ({})",
            failure.category, failure.message, failure.error
        );
    }
    print_json(&recommendation)
}

/// Inline JSON, or `@path` to a JSON file. Anything other than an object is
/// an empty mapping.
async fn read_products(input: &str) -> eyre::Result<ExtractedProducts> {
    let text = match input.strip_prefix('@') {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .wrap_err_with(|| format!("Failed to read {path}"))?,
        None => input.to_string(),
    };
    serde_json::from_str(&text).wrap_err("Products are not valid JSON")
}

fn print_json<T: Serialize>(value: &T) -> eyre::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
