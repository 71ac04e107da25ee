//! Rollcall CLI
//!
//! One-shot commands against the attendance backend:
//! - Sign in and out, show the signed-in user
//! - List personnel and attendance
//! - Record attendance by hand or from a still image
//! - Register faces and generate reports

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rollcall::api::dto::{AttendanceRecord, AttendanceType, NewAttendance, Personnel};
use rollcall::api::ProgressCallback;
use rollcall::app::AppContext;
use rollcall::config::{generate_default_config, Config};
use rollcall::face::{interpret, DetectionEvent, Frame, NoCamera};
use rollcall::services::{QueryParams, ReportFormat, ReportKind, ReportOutput};

#[derive(Parser)]
#[command(name = "rollcall-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Command-line client for the station attendance backend")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: ~/.config/rollcall/config.toml, then ./config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend URL, overriding the config
    #[arg(long, global = true)]
    pub api_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and keep the session in the state file
    Login {
        email: String,
        /// Password (default: $ROLLCALL_PASSWORD)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Sign out and forget the stored session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Personnel records
    Personnel {
        #[command(subcommand)]
        command: PersonnelCommands,
    },

    /// Attendance records
    Attendance {
        #[command(subcommand)]
        command: AttendanceCommands,
    },

    /// Run face detection on an image
    Detect {
        image: PathBuf,
        /// Match threshold (default: [face] min_confidence)
        #[arg(long)]
        min_confidence: Option<f64>,
    },

    /// Register a face image for a personnel record
    RegisterFace { personnel_id: u64, image: PathBuf },

    /// Generate a report (attendance, personnel, activity)
    Report {
        kind: ReportKind,
        /// json, pdf, csv or excel
        #[arg(short, long, default_value = "json")]
        format: ReportFormat,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        /// Directory for file reports (default: [storage] download_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum PersonnelCommands {
    List {
        #[arg(short, long)]
        search: Option<String>,
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "50")]
        per_page: u32,
    },
}

#[derive(Subcommand)]
pub enum AttendanceCommands {
    List {
        /// First day, YYYY-MM-DD
        #[arg(long)]
        from: Option<String>,
        /// Last day, YYYY-MM-DD
        #[arg(long)]
        to: Option<String>,
        /// in or out
        #[arg(short = 't', long = "type")]
        kind: Option<AttendanceType>,
        #[arg(long)]
        personnel: Option<u64>,
        /// Output format (table, json, csv)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Record a check-in or check-out by hand
    Record {
        personnel_id: u64,
        #[arg(short = 't', long = "type", default_value = "in")]
        kind: AttendanceType,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Config { output } = &cli.command {
        let content = generate_default_config();
        match output {
            Some(path) => {
                std::fs::write(path, content)?;
                println!("Config written to {}", path.display());
            }
            None => print!("{}", content),
        }
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::load_default(),
    };
    if let Some(url) = cli.api_url {
        config.api.base_url = url;
    }
    rollcall::logging::init(&config.logging);

    let ctx = AppContext::open(config, Arc::new(NoCamera)).context("building client")?;
    let result = run(&ctx, cli.command).await;
    ctx.services.auth.stop_token_refresh();
    result
}

async fn run(ctx: &AppContext, command: Commands) -> anyhow::Result<()> {
    let services = &ctx.services;

    match command {
        Commands::Login { email, password } => {
            let password = match password.or_else(|| std::env::var("ROLLCALL_PASSWORD").ok()) {
                Some(p) => p,
                None => bail!("No password given (use --password or ROLLCALL_PASSWORD)"),
            };
            let user = services.auth.login(&email, &password).await?;
            println!("Signed in as {}", user.display_name());
        }

        Commands::Logout => {
            services.auth.logout().await;
            println!("Signed out");
        }

        Commands::Whoami => {
            require_session(ctx).await?;
            match services.auth.current_user() {
                Some(user) => {
                    println!("{}", user.display_name());
                    if let Some(email) = &user.email {
                        println!("  email: {}", email);
                    }
                    if let Some(role) = &user.role {
                        println!("  role:  {}", role);
                    }
                }
                None => println!("Signed in"),
            }
        }

        Commands::Personnel {
            command: PersonnelCommands::List {
                search,
                page,
                per_page,
            },
        } => {
            require_session(ctx).await?;
            let mut params = QueryParams::new().with("page", page).with("per_page", per_page);
            if let Some(search) = search {
                params = params.with("search", search);
            }
            let list = services.personnel.list(&params).await?;
            print_personnel(&list.data);
            if let Some(total) = list.total {
                println!();
                println!("{} of {} personnel", list.data.len(), total);
            }
        }

        Commands::Attendance {
            command:
                AttendanceCommands::List {
                    from,
                    to,
                    kind,
                    personnel,
                    format,
                },
        } => {
            require_session(ctx).await?;
            let mut params = QueryParams::new();
            if let Some(from) = from {
                params = params.with("date_from", from);
            }
            if let Some(to) = to {
                params = params.with("date_to", to);
            }
            if let Some(kind) = kind {
                params = params.with("type", kind.as_str());
            }
            let list = match personnel {
                Some(id) => services.attendance.list_for_personnel(id, &params).await?,
                None => services.attendance.list(&params).await?,
            };

            match format.as_str() {
                "json" => println!("{}", serde_json::to_string_pretty(&list.data)?),
                "csv" => print_attendance_csv(&list.data)?,
                _ => print_attendance_table(&list.data),
            }
        }

        Commands::Attendance {
            command: AttendanceCommands::Record { personnel_id, kind },
        } => {
            require_session(ctx).await?;
            let attendance = NewAttendance {
                personnel_id,
                attendance_type: kind,
                source: "manual".to_string(),
            };
            services.attendance.record(&attendance).await?;
            println!("Personnel {} {}", personnel_id, kind.verb());
        }

        Commands::Detect {
            image,
            min_confidence,
        } => {
            require_session(ctx).await?;
            let frame = read_frame(&image).await?;
            let threshold = min_confidence.unwrap_or(ctx.config.face.min_confidence);
            let response = services.face.detect(&frame).await?;

            match interpret(&response, threshold) {
                Some(DetectionEvent::Matched {
                    personnel,
                    confidence,
                }) => println!(
                    "Matched {} (id {}) with confidence {:.0}%",
                    personnel.name,
                    personnel.id,
                    confidence * 100.0
                ),
                Some(DetectionEvent::Face(face)) => println!(
                    "Face found, confidence {:.0}% below {:.0}%",
                    face.confidence * 100.0,
                    threshold * 100.0
                ),
                None => println!("No face detected"),
            }
        }

        Commands::RegisterFace {
            personnel_id,
            image,
        } => {
            require_session(ctx).await?;
            let frame = read_frame(&image).await?;
            let progress: ProgressCallback = Arc::new(|p| eprint!("\rUploading... {:>3}%", p));
            services
                .face
                .register(personnel_id, &frame, Some(progress))
                .await?;
            eprintln!();
            println!("Face registered for personnel {}", personnel_id);
        }

        Commands::Report {
            kind,
            format,
            from,
            to,
            output,
        } => {
            require_session(ctx).await?;
            let mut params = QueryParams::new();
            if let Some(from) = from {
                params = params.with("date_from", from);
            }
            if let Some(to) = to {
                params = params.with("date_to", to);
            }

            match services.report.generate(kind, format, &params).await? {
                ReportOutput::Data(data) => println!("{}", serde_json::to_string_pretty(&data)?),
                ReportOutput::File(file) => {
                    let dir = output
                        .unwrap_or_else(|| PathBuf::from(&ctx.config.storage.download_dir));
                    std::fs::create_dir_all(&dir)
                        .with_context(|| format!("creating {}", dir.display()))?;
                    let path = file.save(&dir)?;
                    println!("Report saved to {}", path.display());
                }
            }
        }

        // written before the client is built
        Commands::Config { .. } => {}
    }

    Ok(())
}

async fn require_session(ctx: &AppContext) -> anyhow::Result<()> {
    if !ctx.services.auth.check_auth().await {
        bail!("Not signed in (run `rollcall-cli login <email>` first)");
    }
    Ok(())
}

async fn read_frame(path: &Path) -> anyhow::Result<Frame> {
    let path = path.to_path_buf();
    let frame = tokio::task::spawn_blocking(move || Frame::from_file(&path)).await??;
    Ok(frame)
}

fn print_personnel(personnel: &[Personnel]) {
    if personnel.is_empty() {
        println!("No personnel found");
        return;
    }

    println!(
        "{:<6} {:<12} {:<28} {:<10} {}",
        "ID", "ID Number", "Name", "Rank", "Position"
    );
    println!("{}", "-".repeat(72));
    for p in personnel {
        println!(
            "{:<6} {:<12} {:<28} {:<10} {}",
            p.id,
            p.id_number.as_deref().unwrap_or("-"),
            p.name,
            p.rank.as_deref().unwrap_or("-"),
            p.position.as_deref().unwrap_or("-")
        );
    }
}

fn print_attendance_table(records: &[AttendanceRecord]) {
    if records.is_empty() {
        println!("No attendance records for the selected range");
        return;
    }

    println!(
        "{:<6} {:<24} {:<12} {:<10} {:<10} {}",
        "ID", "Name", "Date", "Time In", "Time Out", "Status"
    );
    println!("{}", "-".repeat(76));
    for r in records {
        println!(
            "{:<6} {:<24} {:<12} {:<10} {:<10} {}",
            r.id,
            r.personnel_name.as_deref().unwrap_or("-"),
            r.date.as_deref().unwrap_or("-"),
            r.time_in.as_deref().unwrap_or("-"),
            r.time_out.as_deref().unwrap_or("-"),
            r.status.as_deref().unwrap_or("-")
        );
    }
}

fn print_attendance_csv(records: &[AttendanceRecord]) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(std::io::stdout());
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}
