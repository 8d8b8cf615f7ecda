mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use config::QueryAgentConfig;
use fusion_core::tools::{ToolContext, ToolOutcome};
use fusion_core::{Fusion, QueryRequest};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "query_agent", about = "Answer prompts from stored knowledge, tools, the web and synthesized routines")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve a prompt and print the response
    Ask {
        prompt: String,
        /// Attach a file the request may read (repeatable)
        #[arg(short, long = "file")]
        files: Vec<PathBuf>,
        #[arg(long, default_value_t = 0)]
        depth: usize,
    },
    /// Stage and index files into the knowledge store
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Store a piece of free text
    Remember { text: String },
    /// List the registered tools
    Tools,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Logging / tracing
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,fusion_core=info,query_agent=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Load configuration (defaults + env + optional TOML overlay)
    let cfg = QueryAgentConfig::load();
    let data_collection = cfg.core.solver.data_collection.clone();

    let mut fusion = Fusion::from_config(cfg.core.clone()).await?;
    fusion.start().await?;

    let outcome = match cli.command {
        Command::Ask {
            prompt,
            files,
            depth,
        } => {
            info!(target: "query_agent", prompt = %prompt, files = files.len(), "Resolving prompt");
            let mut request = QueryRequest::new(prompt)
                .with_files(files.iter().map(|p| p.to_string_lossy().into_owned()));
            request.depth = depth;
            let response = fusion.solve(request).await;
            print_json(&response, cfg.pretty)
        }
        Command::Ingest { paths } => {
            let attachments: Vec<String> = paths
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect();
            let args = json!({ "file_paths": &attachments });
            invoke(&fusion, &data_collection, "file_upload", args, attachments, cfg.pretty).await
        }
        Command::Remember { text } => {
            let args = json!({ "information": text });
            invoke(
                &fusion,
                &data_collection,
                "information_upload",
                args,
                Vec::new(),
                cfg.pretty,
            )
            .await
        }
        Command::Tools => print_json(&fusion.tool_registry.descriptors(), cfg.pretty),
    };

    fusion.shutdown().await.ok();
    outcome
}

async fn invoke(
    fusion: &Fusion,
    collection: &str,
    tool: &str,
    args: serde_json::Value,
    attachments: Vec<String>,
    pretty: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = ToolContext {
        store: fusion.store.clone(),
        collection: collection.to_string(),
        attachments,
    };
    match fusion.tool_registry.invoke(tool, args, &ctx).await {
        ToolOutcome::Succeeded(value) => print_json(&value, pretty),
        ToolOutcome::Failed(payload) => {
            error!(target: "query_agent", tool = %tool, "Tool call failed");
            print_json(&payload, pretty)?;
            Err(format!("{tool} failed").into())
        }
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<(), Box<dyn std::error::Error>> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{text}");
    Ok(())
}
