//! services/portal/src/cli.rs
//!
//! Command-line surface of the portal client and its dispatch.

use clap::Parser;
use portal_core::domain::{SubmitOutcome, VoucherStatus};
use portal_core::router::DashboardTab;
use portal_core::session::login_failure_message;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::app::Portal;
use crate::config::Config;
use crate::error::ClientError;
use crate::render;

#[derive(Parser)]
#[command(name = "portal")]
#[command(about = "Terminal client for the e-learning portal")]
pub struct Cli {
    /// Backend base URL (overrides PORTAL_API_URL)
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Sign in and store the session
    Login {
        /// Learner email / user ID
        #[arg(long)]
        email: String,
        /// Password
        #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out and clear the stored session
    Logout,
    /// Show the signed-in learner
    Whoami,
    /// Show the learning dashboard
    Dashboard,
    /// Course documents
    Docs {
        #[command(subcommand)]
        command: DocsCommands,
    },
    /// Voucher redemption
    Voucher {
        #[command(subcommand)]
        command: VoucherCommands,
    },
    /// Open the course platform in the browser
    Courses {
        /// Print the URL instead of opening it
        #[arg(long)]
        print: bool,
    },
    /// Open the exam platform in the browser
    Exams {
        /// Print the URL instead of opening it
        #[arg(long)]
        print: bool,
    },
}

#[derive(clap::Subcommand)]
pub enum DocsCommands {
    /// List uploaded documents
    List,
    /// Download a document by filename
    Download {
        filename: String,
        /// Where to write the file (default: the file's name in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(clap::Subcommand)]
pub enum VoucherCommands {
    /// Submit a voucher code
    Submit { code: String },
    /// Fetch the current voucher status once
    Status,
    /// Poll the voucher status until it is verified (Ctrl-C to stop)
    Watch {
        /// Seconds between polls
        #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
        interval: u64,
    },
}

/// Resolves configuration for a parsed command line.
pub fn load_config(cli: &Cli) -> Result<Config, ClientError> {
    let config = Config::from_env()?;
    Ok(match &cli.api_url {
        Some(url) => config.with_api_url(url)?,
        None => config,
    })
}

pub async fn run(cli: Cli, config: Arc<Config>) -> Result<(), ClientError> {
    let mut portal = Portal::bootstrap(config).await?;

    match cli.command {
        Commands::Login { email, password } => match portal.login(&email, &password).await {
            Ok(session) => println!("Signed in as {} <{}>", session.user.name, session.user.email),
            Err(ClientError::Port(e)) => {
                error!("Login error: {}", e);
                return Err(ClientError::LoginFailed(login_failure_message(&e)));
            }
            Err(e) => return Err(e),
        },
        Commands::Logout => {
            portal.logout().await?;
            println!("Signed out.");
        }
        Commands::Whoami => {
            if !portal.session().state().is_authenticated() {
                return Err(ClientError::NotLoggedIn);
            }
            let user = portal.profile().await;
            println!("{} <{}>", user.name, user.email);
        }
        Commands::Dashboard => {
            let snapshot = portal.dashboard().await?;
            print!("{}", render::render_dashboard(&snapshot));
        }
        Commands::Docs { command } => run_docs(&portal, command).await?,
        Commands::Voucher { command } => run_voucher(&mut portal, command).await?,
        Commands::Courses { print } => open_tab(&portal, DashboardTab::Courses, print)?,
        Commands::Exams { print } => open_tab(&portal, DashboardTab::Exams, print)?,
    }
    Ok(())
}

async fn run_docs(portal: &Portal, command: DocsCommands) -> Result<(), ClientError> {
    match command {
        DocsCommands::List => {
            let documents = portal.documents().await?;
            print!("{}", render::render_documents(&documents));
        }
        DocsCommands::Download { filename, output } => {
            let path = portal.download(&filename, output.as_deref()).await?;
            println!("Saved {}", path.display());
        }
    }
    Ok(())
}

async fn run_voucher(portal: &mut Portal, command: VoucherCommands) -> Result<(), ClientError> {
    match command {
        VoucherCommands::Submit { code } => match portal.submit_voucher(&code).await? {
            SubmitOutcome::Accepted => {
                let voucher = portal.voucher();
                print!("{}", render::render_voucher(voucher.record(), voucher.status()));
            }
            SubmitOutcome::NotVerified => {
                print!("{}", render::render_voucher(None, VoucherStatus::NotSubmitted));
            }
        },
        VoucherCommands::Status => {
            let status = portal.refresh_voucher().await?;
            print!("{}", render::render_voucher(portal.voucher().record(), status));
        }
        VoucherCommands::Watch { interval } => {
            let cancel = CancellationToken::new();
            let on_ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
                on_ctrl_c.cancel();
                // A second Ctrl-C exits at once.
                if tokio::signal::ctrl_c().await.is_ok() {
                    std::process::exit(130);
                }
            });

            let mut last = None;
            let status = portal
                .watch_voucher(Duration::from_secs(interval), cancel, |status| {
                    if last != Some(status) {
                        println!("{}", status);
                        last = Some(status);
                    }
                })
                .await?;
            info!(%status, "Voucher watch finished");
        }
    }
    Ok(())
}

fn open_tab(portal: &Portal, tab: DashboardTab, print_only: bool) -> Result<(), ClientError> {
    let url = portal
        .tab_url(tab)?
        .ok_or_else(|| ClientError::Internal(format!("{:?} has no platform URL", tab)))?;
    if print_only {
        println!("{}", url);
        return Ok(());
    }
    info!(%url, "Opening in browser");
    open::that(url.as_str())?;
    println!("Opened {}", url);
    Ok(())
}
