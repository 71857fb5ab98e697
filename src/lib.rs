//! snipchat — snip any screen region and hand it to chat.
//!
//! This is the app shell that wires together:
//! - Screen capture domain (capture/)
//! - Selection overlays (overlay/)
//! - Delivery of finished captures (handoff/)
//! - Configuration (config.rs)

pub mod capture;
pub mod config;
pub mod handoff;
pub mod overlay;

use capture::{
    CancelReason, CaptureSession, CaptureSummary, DesktopHost, HostSlot, ListOptions,
    SelectionRect, SourceKind, Viewport,
};
use clap::{Arg, ArgAction, ArgMatches, Command};
use config::AppConfig;
use handoff::{ChatHandoff, HandoffSink, HandoffTargets, Transcript, VisionClient};
use overlay::{parse_selection, parse_viewport, OverlayHost, ScriptedOverlay};
use std::path::PathBuf;
use std::sync::Arc;

fn cli() -> Command {
    let handoff_args = [
        Arg::new("out")
            .long("out")
            .value_name("DIR")
            .value_parser(clap::value_parser!(PathBuf))
            .help("Save the PNG into DIR (default when no other target is given)"),
        Arg::new("copy")
            .long("copy")
            .action(ArgAction::SetTrue)
            .help("Copy the capture to the clipboard"),
        Arg::new("ask")
            .long("ask")
            .value_name("PROMPT")
            .help("Send the capture to the chat model with PROMPT and stream the answer"),
    ];

    Command::new("snipchat")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Snip any screen region and hand it to chat, disk or clipboard")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("sources")
                .about("List capture sources as JSON")
                .arg(
                    Arg::new("windows")
                        .long("windows")
                        .action(ArgAction::SetTrue)
                        .help("Include application windows"),
                )
                .arg(
                    Arg::new("thumbnails")
                        .long("thumbnails")
                        .action(ArgAction::SetTrue)
                        .help("Include data-URI thumbnails"),
                ),
        )
        .subcommand(
            Command::new("snip")
                .about("Capture a selected region of the primary screen")
                .arg(
                    Arg::new("select")
                        .long("select")
                        .value_name("X,Y,W,H")
                        .value_parser(parse_selection)
                        .help("Select this rectangle instead of dragging on the overlay"),
                )
                .arg(
                    Arg::new("viewport")
                        .long("viewport")
                        .value_name("WxH")
                        .value_parser(parse_viewport)
                        .help("Overlay size the selection refers to (default: preview size)"),
                )
                .args(handoff_args.clone()),
        )
        .subcommand(
            Command::new("full")
                .about("Capture the whole primary screen")
                .args(handoff_args),
        )
}

/// Entry point, called by `main`.
pub fn run() -> Result<(), String> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let matches = cli().get_matches();
    let config = AppConfig::load().map_err(|e| e.to_string())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start async runtime: {}", e))?;

    match matches.subcommand() {
        Some(("sources", args)) => runtime.block_on(list_sources(&config, args)),
        Some(("snip", args)) => match args.get_one::<SelectionRect>("select").copied() {
            Some(rect) => {
                let viewport = args.get_one::<Viewport>("viewport").copied();
                runtime.block_on(async {
                    let slot = bootstrap_host(&config);
                    let overlay = ScriptedOverlay::new(Some(rect), viewport);
                    run_capture(&config, args, slot, Some(overlay)).await
                })
            }
            None => run_interactive(runtime, config, args.clone()),
        },
        Some(("full", args)) => runtime.block_on(async {
            let slot = bootstrap_host(&config);
            run_capture(&config, args, slot, None::<ScriptedOverlay>).await
        }),
        _ => Err("unknown command".to_string()),
    }
}

async fn list_sources(config: &AppConfig, args: &ArgMatches) -> Result<(), String> {
    use capture::CaptureHost;

    let host = DesktopHost::connect(&config.readiness)
        .await
        .map_err(|e| e.to_string())?;

    let mut types = vec![SourceKind::Screen];
    if args.get_flag("windows") {
        types.push(SourceKind::Window);
    }
    let options = ListOptions {
        types,
        fetch_thumbnail: args.get_flag("thumbnails"),
        thumbnail_size: config.thumbnail_size,
    };

    let sources = host
        .list_sources(&options)
        .await
        .map_err(|e| e.to_string())?;
    let json = serde_json::to_string_pretty(&sources).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

/// Starts the host bootstrap. The slot resolves once the display server
/// answers. Must be called inside the runtime.
fn bootstrap_host(config: &AppConfig) -> Arc<HostSlot<DesktopHost>> {
    let slot = Arc::new(HostSlot::new());
    let bootstrap = slot.clone();
    let policy = config.readiness;
    tokio::spawn(async move {
        match DesktopHost::connect(&policy).await {
            Ok(host) => {
                bootstrap.announce(host);
            }
            Err(e) => log::error!("[CAPTURE] Desktop host bootstrap failed: {}", e),
        }
    });
    slot
}

/// Runs one session (area when `overlay` is given, else full screen) and
/// delivers the result.
async fn run_capture<O: OverlayHost + Send>(
    config: &AppConfig,
    args: &ArgMatches,
    slot: Arc<HostSlot<DesktopHost>>,
    overlay: Option<O>,
) -> Result<(), String> {
    let session = CaptureSession::new(&*slot, config.session_config());
    let token = session.token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let mut sink = HandoffSink::new();
    let outcome = match overlay {
        Some(mut overlay) => session.run_area(&mut overlay, &mut sink).await,
        None => session.run_full(&mut sink).await,
    };

    match outcome {
        Ok(summary) => match sink.take_capture() {
            Some(image) => deliver(config, args, &summary, &image).await,
            None => Err("capture finished without an image".to_string()),
        },
        Err(CancelReason::Failed(e)) => Err(format!(
            "{} (at the {} stage)",
            sink.cancel_message().unwrap_or("Capture failed"),
            e.stage()
        )),
        // Already announced by the sink.
        Err(_) => Ok(()),
    }
}

/// Interactive `snip`: overlay windows run on this (the main) thread while
/// the session runs on the runtime's worker threads.
#[cfg(feature = "overlay")]
fn run_interactive(
    runtime: tokio::runtime::Runtime,
    config: AppConfig,
    args: ArgMatches,
) -> Result<(), String> {
    let size = args
        .get_one::<Viewport>("viewport")
        .map(|v| (v.width.round() as u32, v.height.round() as u32));

    let slot = {
        let _entered = runtime.enter();
        bootstrap_host(&config)
    };
    let (overlay, windows) = overlay::window_overlay(size, slot.clone());

    let session = runtime.spawn(async move { run_capture(&config, &args, slot, Some(overlay)).await });

    // Returns once the session has dropped its overlay.
    windows.run();

    runtime
        .block_on(session)
        .map_err(|e| format!("capture task failed: {}", e))?
}

#[cfg(not(feature = "overlay"))]
fn run_interactive(
    _runtime: tokio::runtime::Runtime,
    _config: AppConfig,
    _args: ArgMatches,
) -> Result<(), String> {
    Err("interactive selection needs the `overlay` feature; pass --select X,Y,W,H".to_string())
}

async fn deliver(
    config: &AppConfig,
    args: &ArgMatches,
    summary: &CaptureSummary,
    image: &capture::EncodedImage,
) -> Result<(), String> {
    let ask = args.get_one::<String>("ask").cloned();
    let copy = args.get_flag("copy");
    let save_dir = args
        .get_one::<PathBuf>("out")
        .cloned()
        .or_else(|| (!copy && ask.is_none()).then(|| config.output_dir()));

    let targets = HandoffTargets {
        save_dir,
        copy_to_clipboard: copy,
        ask,
    };

    let client;
    let mut transcript;
    let chat = match targets.ask {
        Some(_) => {
            client = match &config.openai_api_url {
                Some(url) => VisionClient::from_env(config.openai_model.clone())
                    .map(|c| c.with_api_url(url.clone())),
                None => VisionClient::from_env(config.openai_model.clone()),
            }
            .map_err(|e| e.to_string())?;
            transcript = Transcript::load(handoff::transcript::default_path())
                .map_err(|e| e.to_string())?;
            Some(ChatHandoff {
                client: &client,
                transcript: &mut transcript,
                history_turns: config.chat_history_turns,
            })
        }
        None => None,
    };

    let report = handoff::deliver(image, &targets, chat)
        .await
        .map_err(|e| e.to_string())?;

    if let Some(path) = &report.saved_to {
        println!(
            "Saved {}x{} capture of {} to {}",
            summary.width,
            summary.height,
            summary.source_id,
            path.display()
        );
    }
    if report.copied {
        println!("Copied {}x{} capture to the clipboard", summary.width, summary.height);
    }
    Ok(())
}
