mod http;

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::{Parser, Subcommand};
use pingscope_core::{
    process_body, Config, InferenceController, ModelId, Notice, NoticeKind, QueryForm, Rendered,
    SceneBuilder, Subscriber, Viewport,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::http::HttpInferenceSource;

#[derive(Parser, Debug)]
#[command(about = "Query a subscriber's inferred location and inspect the supporting pings")]
struct Args {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one inference query and print its scene.
    Infer {
        #[arg(long)]
        subscriber: Option<u64>,

        #[arg(long)]
        start: Option<DateTime<Utc>>,

        #[arg(long)]
        end: Option<DateTime<Utc>>,

        #[arg(long, default_value = "majority-vote")]
        model: ModelId,

        #[arg(long)]
        json: bool,
    },
    /// Search subscribers by name.
    Subscribers {
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        json: bool,
    },
    /// Build the scene for a saved inference response, offline.
    Render {
        #[arg(long)]
        response: PathBuf,

        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RenderedOutput<'a> {
    result: &'a pingscope_core::InferenceResult,
    scene: &'a pingscope_core::MapScene,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let cfg = load_config(&args)?;

    match args.command {
        Command::Infer {
            subscriber,
            start,
            end,
            model,
            json,
        } => {
            let form = QueryForm {
                subscriber_id: subscriber,
                start_time: start,
                end_time: end,
                model_id: Some(model),
            };
            run_infer(&cfg, &form, json)
        }
        Command::Subscribers { name, json } => run_subscribers(&cfg, name.as_deref(), json),
        Command::Render { response, json } => {
            let body = fs::read_to_string(&response)
                .with_context(|| format!("failed to read {}", response.display()))?;
            let builder = SceneBuilder::new(cfg.map.clone());
            let rendered = process_body(&body, cfg.max_pings, &builder)?;
            print_rendered(&rendered, json)
        }
    }
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let cfg = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    let mut cfg = cfg.with_env_overrides()?;
    if let Some(url) = &args.api_url {
        cfg.api_base_url = url.clone();
        cfg.validate()?;
    }
    Ok(cfg)
}

fn run_infer(cfg: &Config, form: &QueryForm, json: bool) -> anyhow::Result<()> {
    let source = HttpInferenceSource::new(cfg)?;
    let mut controller = InferenceController::new(source, cfg);

    if let Err(errors) = controller.submit(form) {
        for err in &errors {
            eprintln!("[!!] {}: {}", err.field, err.message);
        }
        bail!("query not submitted");
    }

    let wait = Duration::from_millis(cfg.timeout_ms) + Duration::from_secs(1);
    if !controller.wait_idle(wait) {
        bail!("no response within {}ms", wait.as_millis());
    }

    let state = controller.state();
    if let Some(Notice { kind, message }) = &state.notice {
        match kind {
            NoticeKind::Transient => eprintln!("[!] {message}"),
            NoticeKind::Fatal => bail!("inference response rejected: {message}"),
        }
    }
    match controller.displayed() {
        Some(rendered) => print_rendered(rendered, json),
        None => bail!("no inference result to display"),
    }
}

fn run_subscribers(cfg: &Config, name: Option<&str>, json: bool) -> anyhow::Result<()> {
    let source = HttpInferenceSource::new(cfg)?;
    let subscribers = source.subscribers(name)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&subscribers)?);
        return Ok(());
    }
    print_subscribers(&subscribers);
    Ok(())
}

fn print_subscribers(subscribers: &[Subscriber]) {
    if subscribers.is_empty() {
        println!("No subscribers found");
        return;
    }
    for s in subscribers {
        println!("- {} {}", s.id, s.name);
    }
}

fn print_rendered(rendered: &Rendered, json: bool) -> anyhow::Result<()> {
    if json {
        let output = RenderedOutput {
            result: &rendered.result,
            scene: &rendered.scene,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let result = &rendered.result;
    let scene = &rendered.scene;
    println!(
        "Subscriber {} ({}): predicted state {}",
        result.subscriber_id,
        result.model_id,
        if result.predicted_state.is_empty() {
            "?"
        } else {
            result.predicted_state.as_str()
        }
    );
    println!(
        "  interval:   {} -> {}",
        result.interval_start.to_rfc3339_opts(SecondsFormat::Secs, true),
        result.interval_end.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    println!(
        "  pings:      {} reported, {} plotted",
        result.ping_count,
        scene.markers.len()
    );
    println!(
        "  confidence: {} [{}]",
        scene.badge.text,
        scene.badge.color.as_str()
    );
    match &scene.overlay {
        Some(region) => println!(
            "  overlay:    center=({:.5}, {:.5}) radius={:.1}m stroke={} opacity={:.2}",
            region.center.latitude,
            region.center.longitude,
            region.radius_meters,
            scene.overlay_color.as_str(),
            scene.overlay_opacity
        ),
        None => println!("  overlay:    none"),
    }
    match &scene.viewport {
        Viewport::FitTo { padding_px, .. } => {
            println!("  viewport:   fit overlay, padding {padding_px}px")
        }
        Viewport::Static { center, zoom } => println!(
            "  viewport:   center=({:.4}, {:.4}) zoom={}",
            center.latitude, center.longitude, zoom
        ),
    }
    for m in &scene.markers {
        println!(
            "- {:?} ({:.5}, {:.5}) {} state={}",
            m.icon,
            m.position.latitude,
            m.position.longitude,
            m.popup.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            m.popup.state.as_deref().unwrap_or("?")
        );
    }
    Ok(())
}
