mod config;
mod console;
mod kiosk;
mod session;
mod station;

use anyhow::{bail, Context, Result};
use attend_client::{build_report, AdminClient};
use attend_core::auth::{self, AuthProvider};
use attend_core::{Action, CapturePage, PageConfig, PageExit, Trigger};
use attend_hw::{Camera, CameraError};
use clap::{Parser, Subcommand};
use config::Config;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "attend", about = "Face-recognition attendance client")]
struct Cli {
    /// Configuration file (default: $XDG_CONFIG_HOME/attend/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password (password from ATTEND_PASSWORD or stdin)
    Login {
        #[arg(short, long)]
        email: String,
    },
    /// Sign out and forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Enroll a face under a name (requires sign-in)
    Enroll {
        #[arg(short, long)]
        name: String,
        /// Use a JPEG file instead of the camera
        #[arg(long)]
        photo: Option<PathBuf>,
    },
    /// Check in with a face capture and the current location
    CheckIn {
        #[arg(long)]
        photo: Option<PathBuf>,
    },
    /// Check out with a face capture and the current location
    CheckOut {
        #[arg(long)]
        photo: Option<PathBuf>,
    },
    /// Interactive station reading commands from stdin
    Kiosk {
        /// Enrollment station (requires sign-in, session expires)
        #[arg(long)]
        enroll: bool,
        #[arg(long)]
        photo: Option<PathBuf>,
    },
    /// Manage enrolled users (requires sign-in)
    Users {
        #[command(subcommand)]
        command: UsersCommand,
    },
    /// Attendance history of one user (requires sign-in)
    Report { username: String },
    /// Run camera diagnostics
    Test {
        /// Save the captured frame here
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum UsersCommand {
    /// List users with their latest check-in/out
    List,
    /// Edit a user's details
    Edit {
        name: String,
        #[arg(long)]
        new_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        role: Option<String>,
    },
    /// Delete a user
    Delete {
        name: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    session::restore(&config.session_file);

    match cli.command {
        Commands::Login { email } => {
            let password = read_password()?;
            let provider = station::auth_provider(&config)?;
            let user = provider.sign_in(&email, &password).await?;
            println!("Signed in as {}", user.email);
        }
        Commands::Logout => {
            let provider = station::auth_provider(&config)?;
            let was = auth::current_user();
            provider.sign_out().await?;
            match was {
                Some(user) => println!("Signed out {}", user.email),
                None => println!("Not signed in"),
            }
        }
        Commands::Whoami => match auth::current_user() {
            Some(user) => println!("{} ({})", user.email, user.uid),
            None => println!("Not signed in"),
        },
        Commands::Enroll { name, photo } => {
            require_sign_in()?;
            let page = station::enroll_page(&config);
            return run_once(&config, Action::Enroll { label: name }, photo.as_deref(), page).await;
        }
        Commands::CheckIn { photo } => {
            let page = station::attendance_page(&config);
            return run_once(&config, Action::CheckIn, photo.as_deref(), page).await;
        }
        Commands::CheckOut { photo } => {
            let page = station::attendance_page(&config);
            return run_once(&config, Action::CheckOut, photo.as_deref(), page).await;
        }
        Commands::Kiosk { enroll, photo } => {
            let page_config = if enroll {
                require_sign_in()?;
                station::enroll_page(&config)
            } else {
                station::attendance_page(&config)
            };
            let page = mount(&config, photo.as_deref(), page_config).await?;
            if kiosk::run(page, enroll).await? == PageExit::Expired {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Users { command } => {
            require_sign_in()?;
            let admin = AdminClient::new(&config.server_url, config.request_timeout())?;
            users(&admin, command).await?;
        }
        Commands::Report { username } => {
            require_sign_in()?;
            let admin = AdminClient::new(&config.server_url, config.request_timeout())?;
            let events = admin
                .attendance(&username)
                .await
                .with_context(|| format!("failed to fetch attendance for {username}"))?;
            print!("{}", console::render_report(&username, &build_report(&events)));
        }
        Commands::Test { output } => camera_test(&config, output).await?,
    }

    Ok(ExitCode::SUCCESS)
}

fn require_sign_in() -> Result<()> {
    auth::require_user().context("sign in first with `attend login --email <address>`")?;
    Ok(())
}

fn read_password() -> Result<String> {
    if let Ok(password) = std::env::var("ATTEND_PASSWORD") {
        return Ok(password);
    }
    eprint!("Password: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn mount(
    config: &Config,
    photo: Option<&Path>,
    page_config: PageConfig,
) -> Result<CapturePage> {
    let adapters = station::adapters(config, photo).await?;
    let auth = station::auth_provider(config)?;
    Ok(CapturePage::mount(
        adapters,
        station::controller_config(config),
        page_config,
        auth,
    ))
}

/// Mount a page, run one action on it, and unmount.
async fn run_once(
    config: &Config,
    action: Action,
    photo: Option<&Path>,
    page_config: PageConfig,
) -> Result<ExitCode> {
    let page = mount(config, photo, page_config).await?;
    let handle = page.dispatch(action);

    let trigger = tokio::select! {
        joined = handle => Some(joined.context("capture task failed")?),
        _ = page.expired() => None,
    };
    page.unmount().await;

    tracing::debug!(?trigger, "action finished");
    Ok(match trigger {
        Some(Trigger::Completed(outcome)) if outcome.succeeded => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}

async fn users(admin: &AdminClient, command: UsersCommand) -> Result<()> {
    match command {
        UsersCommand::List => {
            let users = admin.list_users().await.context("failed to fetch users")?;
            print!("{}", console::render_users(&users));
        }
        UsersCommand::Edit {
            name,
            new_name,
            email,
            role,
        } => {
            let users = admin.list_users().await.context("failed to fetch users")?;
            let Some(mut record) = users.into_iter().find(|u| u.name == name) else {
                bail!("no user named {name}");
            };
            if let Some(new_name) = new_name {
                record.name = new_name;
            }
            if email.is_some() {
                record.email = email;
            }
            if role.is_some() {
                record.role = role;
            }
            admin.update_user(&name, &record).await?;
            println!("User updated successfully");
        }
        UsersCommand::Delete { name, yes } => {
            if !yes && !confirm(&format!("Are you sure you want to delete {name}?"))? {
                println!("Cancelled");
                return Ok(());
            }
            admin.delete_user(&name).await?;
            println!("User deleted successfully");
        }
    }
    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    eprint!("{question} [y/N] ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}

async fn camera_test(config: &Config, output: Option<PathBuf>) -> Result<()> {
    println!("Video devices:");
    let devices = Camera::list_devices();
    if devices.is_empty() {
        println!("  (none)");
    }
    for dev in &devices {
        println!("  {}  {} [{}] {}", dev.path, dev.name, dev.driver, dev.bus);
    }

    let settings = station::camera_settings(config);
    let (format, width, height, jpeg) = tokio::task::spawn_blocking(move || {
        let camera = Camera::open(&settings.device, settings.width, settings.height)?;
        camera.discard_frames(settings.warmup_frames)?;
        let jpeg = camera.capture_jpeg(settings.jpeg_quality)?;
        Ok::<_, CameraError>((camera.pixel_format(), camera.width, camera.height, jpeg))
    })
    .await
    .context("camera task failed")?
    .with_context(|| format!("camera test failed on {}", config.camera_device))?;

    println!(
        "Captured {} bytes of JPEG from {} ({width}x{height}, {format:?})",
        jpeg.len(),
        config.camera_device
    );
    if let Some(path) = output {
        std::fs::write(&path, &jpeg)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Saved to {}", path.display());
    }
    Ok(())
}
