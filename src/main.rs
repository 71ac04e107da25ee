//! Rollcall shell
//!
//! Drives the client core from a terminal. Each input line is either a
//! fragment to navigate to (`#/dashboard`, `/personnel?search=cruz`) or an
//! interaction with the mounted view:
//!
//! ```text
//! input login-email admin@bfp.gov.ph
//! click mode-out
//! submit login-form
//! ```
//!
//! After every line the document title, the mounted view and the visible
//! toasts are printed.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use rollcall::app::{App, AppContext};
use rollcall::config::Config;
use rollcall::face::{Camera, ImageFileCamera, NoCamera};
use rollcall::views::UiEvent;

#[derive(Parser)]
#[command(name = "rollcall")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Interactive shell over the attendance client")]
struct Args {
    /// Config file (default: ~/.config/rollcall/config.toml, then ./config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Still image served as every camera frame
    #[arg(long)]
    camera_image: Option<PathBuf>,

    /// Fragment shown first
    #[arg(default_value = "#/dashboard")]
    start: String,
}

const HELP: &str = "\
Commands:
  #/<path>[?k=v]          navigate
  click <id>              click an element
  input <id> <value>      type into a field
  submit <id>             submit a form
  back                    previous location
  page                    print the whole page
  help                    this text
  quit                    leave";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::load_default(),
    };
    rollcall::logging::init(&config.logging);

    let camera: Arc<dyn Camera> = match &args.camera_image {
        Some(path) => Arc::new(ImageFileCamera::new(path)),
        None => Arc::new(NoCamera),
    };
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        base_url = %config.api.base_url,
        "Rollcall shell starting"
    );

    let ctx = AppContext::open(config, camera).context("building application context")?;
    let mut app = App::new(ctx);
    app.start(&args.start).await?;
    print_screen(&app);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            "quit" | "exit" => break,
            "help" => {
                println!("{}", HELP);
                continue;
            }
            "page" => {
                println!("{}", app.render());
                continue;
            }
            "back" => app.back().await?,
            _ if line.starts_with('#') || line.starts_with('/') => {
                if let Err(e) = app.open(line).await {
                    eprintln!("navigation failed: {}", e);
                }
            }
            _ => match UiEvent::parse(line) {
                Some(event) => {
                    if !app.dispatch(event).await? {
                        println!("(nothing listens for that)");
                    }
                }
                None => {
                    println!("{}", HELP);
                    continue;
                }
            },
        }
        print_screen(&app);
    }

    app.shutdown();
    tracing::info!("Rollcall shell stopped");
    Ok(())
}

fn print_screen(app: &App) {
    let ctx = app.context();
    println!("== {} ==", ctx.ui.title());
    if let Some(location) = app.router().current_location() {
        println!("at {}", location);
    }
    match app.router().outlet().content() {
        Some(content) => println!("{}", content),
        None => println!("(empty)"),
    }
    for toast in ctx.ui.notifications().visible() {
        println!("[{}] {}", toast.severity.as_str(), toast.message);
    }
}
