// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod config;
mod console;

use std::path::PathBuf;

use clap::Parser;
use config::AppConfig;
use log::{info, warn};
use place_core::{AssistantBridge, OpenRouterBackend, Session, WikipediaSummaries};

#[derive(Parser, Debug)]
#[command(author, version, about = "Campus map viewer console")]
struct Args {
    /// Configuration file (default: platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// POI document source, URL or file path
    #[arg(long)]
    pois: Option<String>,

    /// Zone document source, URL or file path
    #[arg(long)]
    zones: Option<String>,

    /// Print the resolved configuration and exit
    #[arg(long, default_value_t = false)]
    print_config: bool,

    /// Deep link fragment to open at startup, e.g. "#poi=library"
    #[arg(long)]
    open: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = AppConfig::load(args.config.as_deref())?;
    if let Some(pois) = args.pois {
        config.pois_source = Some(pois);
    }
    if let Some(zones) = args.zones {
        config.zones_source = Some(zones);
    }

    if args.print_config {
        match &args.config {
            Some(path) => println!("Config file: {}", path.display()),
            None => println!("Config file: {}", AppConfig::get_config_path()?.display()),
        }
        println!("{config:#?}");
        return Ok(());
    }

    match config.api_key_source() {
        Some(source) => info!("OpenRouter API key loaded from {source}"),
        None => warn!("No OpenRouter API key configured, assistant requests may be rejected"),
    }

    let backend = OpenRouterBackend::new(config.api_key(), config.links.map_url(), config.app_title.as_str())?
        .with_endpoint(config.completion_url.as_str());
    let summaries = WikipediaSummaries::new()?.with_base_url(config.summary_url.as_str());
    let assistant = AssistantBridge::new(backend, summaries, config.assistant_config());

    let session = Session::new(config.session_config(), assistant)?;
    let feeds = config.feed_configs()?;
    if feeds.is_empty() {
        warn!("No place sources configured, use --pois/--zones or the config file");
    }
    let pending_link = args.open.as_deref().and_then(|fragment| session.open_on_load(fragment));
    let mut tasks = session.start(feeds);
    tasks.extend(pending_link);

    let result = console::run(&session).await;

    session.shutdown();
    for task in tasks {
        if let Err(e) = task.await {
            warn!("Background task ended abnormally: {e}");
        }
    }
    info!("Shutdown complete");
    result
}
