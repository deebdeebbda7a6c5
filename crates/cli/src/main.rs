mod settings;

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use facecheck_core::attendance::infrastructure::http_attendance_client::HttpAttendanceClient;
use facecheck_core::capture::domain::frame_source::FrameSource;
use facecheck_core::capture::infrastructure::still_image_camera::StillImageCamera;
use facecheck_core::scoring::infrastructure::http_scorer::{HttpScorer, ScoreEndpoint};
use facecheck_core::session::check_in_use_case::CheckInUseCase;
use facecheck_core::session::session_logger::StdoutSessionLogger;
use facecheck_core::session::verification_session::{
    SessionConfig, SessionEvent, SessionHandle, VerificationSession,
};
use facecheck_core::shared::constants::DEFAULT_JPEG_QUALITY;
use facecheck_core::shared::frame::Frame;

use settings::Settings;

/// Camera face verification and attendance check-in.
#[derive(Parser)]
#[command(name = "facecheck")]
struct Cli {
    /// Backend base URL (overrides settings).
    #[arg(long, global = true)]
    server: Option<String>,

    /// Bearer token passed to the backend verbatim.
    #[arg(long, global = true)]
    token: Option<String>,

    /// Minimum similarity percent for a verified frame to count (0-100).
    #[arg(long, global = true)]
    threshold: Option<f64>,

    /// Consecutive verified frames required before auto-capture.
    #[arg(long, global = true)]
    required_hits: Option<u32>,

    /// Persist the effective settings for future runs.
    #[arg(long, global = true)]
    save_settings: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List camera devices under a directory.
    Devices {
        /// Directory whose image sub-directories act as cameras.
        #[arg(long)]
        cameras: PathBuf,
    },
    /// Verify a face until a stable match is captured.
    Verify {
        #[command(flatten)]
        session: SessionArgs,

        /// Compare against this admin account instead of the logged-in user.
        #[arg(long)]
        user_id: Option<String>,
    },
    /// Verify, then submit the captured frame as an attendance check-in.
    CheckIn {
        #[command(flatten)]
        session: SessionArgs,
    },
}

#[derive(Args)]
struct SessionArgs {
    /// Directory whose image sub-directories act as cameras.
    #[arg(long)]
    cameras: PathBuf,

    /// Camera device id (see `devices`).
    #[arg(long)]
    camera: Option<String>,

    /// Give up when no stable face is found within this many seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Write the captured JPEG to this path.
    #[arg(long)]
    save_capture: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = effective_settings(&cli)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    match cli.command {
        Command::Devices { cameras } => list_devices(&cameras),
        Command::Verify { session, user_id } => {
            runtime.block_on(run_verify(&settings, &session, user_id))
        }
        Command::CheckIn { session } => runtime.block_on(run_check_in(&settings, &session)),
    }
}

fn effective_settings(cli: &Cli) -> Result<Settings, Box<dyn std::error::Error>> {
    let mut settings = Settings::load();
    if let Some(server) = &cli.server {
        settings.server_url = server.clone();
    }
    if let Some(token) = &cli.token {
        settings.access_token = Some(token.clone());
    }
    if let Some(threshold) = cli.threshold {
        settings.threshold_percent = threshold;
    }
    if let Some(hits) = cli.required_hits {
        settings.required_hits = hits;
    }
    if let Command::Verify { session, .. } | Command::CheckIn { session } = &cli.command {
        if let Some(camera) = &session.camera {
            settings.camera = Some(camera.clone());
        }
    }

    settings.to_policy().validate()?;

    if cli.save_settings {
        let path = settings.save()?;
        log::info!("Settings saved to {}", path.display());
    }
    Ok(settings)
}

fn list_devices(cameras: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let camera = StillImageCamera::open(cameras, DEFAULT_JPEG_QUALITY)?;
    let devices = camera.list_devices()?;
    if devices.is_empty() {
        println!("No cameras found in {}", cameras.display());
    }
    for device in devices {
        println!("{}\t{}", device.id, device.label);
    }
    Ok(())
}

fn open_camera(
    settings: &Settings,
    args: &SessionArgs,
) -> Result<Arc<StillImageCamera>, Box<dyn std::error::Error>> {
    let camera = StillImageCamera::open(&args.cameras, settings.jpeg_quality)?;
    if let Some(id) = &args.camera {
        camera.select_device(id)?;
    } else if let Some(id) = &settings.camera {
        if let Err(e) = camera.select_device(id) {
            log::warn!("Preferred camera unavailable, using default: {e}");
        }
    }
    if camera.selected_device().is_none() {
        return Err(format!("No cameras found in {}", args.cameras.display()).into());
    }
    Ok(Arc::new(camera))
}

async fn run_verify(
    settings: &Settings,
    args: &SessionArgs,
    user_id: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let camera = open_camera(settings, args)?;
    let is_admin = user_id.is_some();
    let endpoint = if is_admin {
        ScoreEndpoint::AdminLogin
    } else {
        ScoreEndpoint::CheckIn
    };
    let scorer = HttpScorer::new(&settings.server_url, endpoint)
        .with_access_token(settings.access_token.clone());
    log::info!("Scoring against {}", scorer.url());

    let mut policy = settings.to_policy();
    policy.preview_auto_capture = is_admin;
    let config = SessionConfig {
        policy,
        user_id,
        require_user_id: is_admin,
    };

    let mut session = VerificationSession::spawn(
        camera,
        Arc::new(scorer),
        config,
        Box::new(StdoutSessionLogger::default()),
    )?;
    session.open();

    let frame = wait_for(timeout(args), session.next_capture())
        .await?
        .ok_or("Verification session ended before a capture")?;

    if is_admin {
        report_preview(&mut session).await;
    } else if let Some(similarity) = session.state().last_similarity {
        println!("Verified (similarity {similarity:.1}%)");
    } else {
        println!("Verified");
    }

    save_capture(args, &frame)?;
    session.shutdown().await;
    Ok(())
}

async fn report_preview(session: &mut SessionHandle) {
    while let Some(event) = session.next_event().await {
        match event {
            SessionEvent::PreviewScored {
                similarity_percent,
                verified,
            } => {
                let verdict = if verified { "Verified" } else { "Not verified" };
                println!("{verdict} (similarity {similarity_percent:.1}%)");
                return;
            }
            SessionEvent::PreviewFailed(message) => {
                println!("{message}");
                return;
            }
            _ => {}
        }
    }
}

async fn run_check_in(
    settings: &Settings,
    args: &SessionArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let camera = open_camera(settings, args)?;
    let scorer = HttpScorer::new(&settings.server_url, ScoreEndpoint::CheckIn)
        .with_access_token(settings.access_token.clone());
    let client = HttpAttendanceClient::new(&settings.server_url, settings.access_token.clone());

    let mut session = VerificationSession::spawn(
        camera,
        Arc::new(scorer),
        SessionConfig {
            policy: settings.to_policy(),
            ..SessionConfig::default()
        },
        Box::new(StdoutSessionLogger::default()),
    )?;

    let result = CheckInUseCase::new(client, timeout(args))
        .execute(&mut session)
        .await;
    session.shutdown().await;
    let check_in = result?;

    let record = &check_in.record;
    println!(
        "Checked in: {} at {} ({})",
        record.user_name, record.check_in_time, record.status
    );
    if let Some(similarity) = record.similarity {
        println!("Similarity: {:.1}%", similarity * 100.0);
    }
    save_capture(args, &check_in.frame)?;
    Ok(())
}

fn timeout(args: &SessionArgs) -> Option<Duration> {
    args.timeout_secs.map(Duration::from_secs)
}

async fn wait_for<T>(
    limit: Option<Duration>,
    future: impl std::future::Future<Output = T>,
) -> Result<T, Box<dyn std::error::Error>> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, future)
            .await
            .map_err(|_| format!("No stable face within {}s", limit.as_secs()).into()),
        None => Ok(future.await),
    }
}

fn save_capture(args: &SessionArgs, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(path) = &args.save_capture {
        std::fs::write(path, frame.jpeg())?;
        log::info!("Capture saved to {}", path.display());
    }
    Ok(())
}
