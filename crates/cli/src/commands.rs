//! CLI commands

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use fepa_core::{FileStorage, KeyValueStorage, MemoryStorage, Notification, SessionStore};
use fepa_http::client::{AdminClient, ApiRequest, AuthEvent, Method};
use fepa_http::notifications::{NotificationCenter, PushEvent, spawn_poller};
use fepa_http::types::NotificationQuery;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::AdminSettings;

/// File holding long-lived credentials between runs
const LOCAL_STORE_FILE: &str = "local.json";

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and store the session
    Login {
        /// Account email; defaults to the remembered one
        email: Option<String>,

        /// Account password
        #[arg(long, env = "FEPA_PASSWORD", hide_env_values = true)]
        password: String,

        /// Remember the email for the next login
        #[arg(long)]
        remember: bool,
    },

    /// Sign out and drop stored credentials
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Notification operations
    Notifications {
        #[command(subcommand)]
        command: NotificationCommands,
    },

    /// Send an authenticated request and print the JSON response
    Api {
        /// HTTP method, e.g. GET or PATCH
        method: String,

        /// Path below the API base URL, e.g. /users
        path: String,

        /// JSON request body
        #[arg(long)]
        body: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum NotificationCommands {
    /// List notifications
    List {
        #[arg(long)]
        page: Option<u32>,

        #[arg(long)]
        limit: Option<u32>,

        /// Only unread notifications
        #[arg(long)]
        unread: bool,
    },

    /// Print the unread count
    Unread,

    /// Mark one notification as read
    Read { id: String },

    /// Mark every notification as read
    ReadAll,

    /// Delete one notification
    Delete { id: String },

    /// Delete every notification
    Clear,

    /// Follow notifications until interrupted
    Watch,
}

impl Commands {
    /// Commands that run until interrupted and must not be timed out
    pub const fn is_long_running(&self) -> bool {
        matches!(
            self,
            Self::Notifications {
                command: NotificationCommands::Watch
            }
        )
    }

    pub async fn execute(self, settings: AdminSettings, data_dir: &Path) -> Result<()> {
        let client = build_client(&settings, data_dir)?;

        match self {
            Self::Login {
                email,
                password,
                remember,
            } => login(&client, email, &password, remember).await,
            Self::Logout => {
                client.logout().await?;
                println!("Signed out");
                Ok(())
            }
            Self::Whoami => {
                let user = client.me().await?;
                println!("{}", serde_json::to_string_pretty(&user)?);
                Ok(())
            }
            Self::Notifications { command } => command.execute(client, &settings).await,
            Self::Api { method, path, body } => api(&client, &method, path, body).await,
        }
    }
}

impl NotificationCommands {
    pub async fn execute(self, client: AdminClient, settings: &AdminSettings) -> Result<()> {
        let center = NotificationCenter::new(client);

        match self {
            Self::List { page, limit, unread } => {
                let query = NotificationQuery {
                    page,
                    limit,
                    unread_only: unread,
                };
                let page = center.client().list_notifications(query).await?;
                if page.notifications.is_empty() {
                    println!("No notifications");
                }
                for notification in &page.notifications {
                    print_notification(notification);
                }
                if let Some(count) = page.unread_count {
                    println!("{count} unread");
                }
                Ok(())
            }
            Self::Unread => {
                println!("{}", center.poll_unread().await?);
                Ok(())
            }
            Self::Read { id } => {
                center.mark_as_read(&id).await?;
                println!("Marked {id} as read");
                Ok(())
            }
            Self::ReadAll => {
                center.mark_all_as_read().await?;
                println!("Marked all notifications as read");
                Ok(())
            }
            Self::Delete { id } => {
                center.delete(&id).await?;
                println!("Deleted {id}");
                Ok(())
            }
            Self::Clear => {
                center.delete_all().await?;
                println!("Deleted all notifications");
                Ok(())
            }
            Self::Watch => watch(center, settings).await,
        }
    }
}

fn build_client(settings: &AdminSettings, data_dir: &Path) -> Result<AdminClient> {
    let local: Arc<dyn KeyValueStorage> =
        Arc::new(FileStorage::new(data_dir.join(LOCAL_STORE_FILE)));
    let session = SessionStore::new(local, Arc::new(MemoryStorage::new()));

    let mut builder = AdminClient::builder()
        .base_url(&settings.api.base_url)
        .timeout(settings.timeout())
        .session(session);
    if let Some(agent) = &settings.api.user_agent {
        builder = builder.user_agent(agent);
    }

    builder.build().context("Failed to create API client")
}

async fn login(
    client: &AdminClient,
    email: Option<String>,
    password: &str,
    remember: bool,
) -> Result<()> {
    let email = match email {
        Some(email) => email,
        None => client
            .session()
            .remembered_email()
            .await?
            .context("No email given and none remembered")?,
    };

    let user = client.login(&email, password, remember).await?;
    info!(user_id = %user.id, role = ?user.role, "Signed in");
    println!(
        "Signed in as {} ({:?})",
        user.name.as_deref().unwrap_or(&user.email),
        user.role
    );
    Ok(())
}

async fn api(client: &AdminClient, method: &str, path: String, body: Option<String>) -> Result<()> {
    let method = Method::from_bytes(method.to_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method: {method}"))?;

    let mut request = ApiRequest::new(method, path);
    if let Some(body) = body {
        let body: Value = serde_json::from_str(&body).context("Request body is not valid JSON")?;
        request = request.body(body);
    }

    let response: Value = client.send(request).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn watch(center: NotificationCenter, settings: &AdminSettings) -> Result<()> {
    if !center.client().session().is_authenticated().await? {
        bail!("Not signed in; run `fepa-admin login` first");
    }

    let shutdown = CancellationToken::new();
    let mut pushes = center.subscribe();
    let mut auth_events = center.client().subscribe();

    println!("{} unread", center.poll_unread().await?);

    let poller = spawn_poller(center.clone(), settings.poll_interval(), shutdown.clone());
    let socket = settings.api.socket_url.clone().map(|url| {
        tokio::spawn(fepa_http::notifications::listen_with_reconnect(
            center.clone(),
            url,
            settings.poll_interval(),
            shutdown.clone(),
        ))
    });

    let mut last_count = center.unread_count().await;
    let mut ticker = tokio::time::interval(settings.poll_interval());

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Interrupted, stopping watch");
                break;
            }
            event = auth_events.recv() => {
                if let Ok(AuthEvent::SessionExpired { reason }) = event {
                    warn!(%reason, "Session expired");
                    eprintln!("Session expired; run `fepa-admin login` to sign in again");
                    break;
                }
            }
            push = pushes.recv() => match push {
                Ok(PushEvent::NotificationNew(notification)) => print_notification(&notification),
                Ok(PushEvent::SystemAlert(alert)) => println!("System alert: {alert}"),
                Ok(_) => {}
                Err(err) => warn!(error = %err, "Missed push events"),
            },
            _ = ticker.tick() => {
                let count = center.unread_count().await;
                if count != last_count {
                    println!("{count} unread");
                    last_count = count;
                }
            }
        }
    }

    shutdown.cancel();
    poller.await?;
    if let Some(socket) = socket {
        socket.await?;
    }
    Ok(())
}

fn print_notification(notification: &Notification) {
    let marker = if notification.read { " " } else { "*" };
    println!(
        "{marker} {} [{}] {} - {} ({})",
        notification.id,
        notification.kind,
        notification.title,
        notification.message,
        notification.created_at.format("%Y-%m-%d %H:%M")
    );
}
