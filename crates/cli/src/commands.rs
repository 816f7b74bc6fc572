//! CLI commands

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use http::Method;
use http::header::{CONTENT_TYPE, HeaderValue};
use serde_json::json;
use sessiongate_core::{
    FileSessionStore, REFRESH_TOKEN_KEY, SessionStore, TOKEN_KEY, TokenValidator,
};
use sessiongate_http::{
    ClientConfig, ClientError, LogoutHook, RequestOptions, SessionGate, SessionGuard, Transport,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config;

#[derive(Subcommand)]
pub enum Commands {
    /// Decode and validate a token locally (signature is not checked)
    Inspect {
        /// Token to inspect; defaults to the stored session token
        token: Option<String>,
    },

    /// Store session credentials
    Login {
        /// Bearer token
        #[arg(long)]
        token: String,

        /// Refresh token used to renew an expired bearer token
        #[arg(long)]
        refresh_token: Option<String>,
    },

    /// Clear stored session credentials
    Logout,

    /// Validate the stored session, refreshing an expired token
    Check,

    /// Send a request, refreshing the session and retrying once on 401/419
    Request {
        /// Path relative to the base URL, or an absolute URL
        path: String,

        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// JSON request body
        #[arg(short = 'd', long)]
        data: Option<String>,
    },

    /// Generate a default configuration file
    InitConfig {
        /// Output file path
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl Commands {
    pub async fn execute(self, config_path: Option<PathBuf>) -> Result<()> {
        match self {
            Self::InitConfig { output, force } => init_config(output, force),
            Self::Inspect { token } => Session::open(config_path)?.inspect(token),
            Self::Login {
                token,
                refresh_token,
            } => Session::open(config_path)?.login(&token, refresh_token.as_deref()),
            Self::Logout => Session::open(config_path)?.logout(),
            Self::Check => Session::open(config_path)?.check().await,
            Self::Request { path, method, data } => {
                Session::open(config_path)?
                    .request(&path, &method, data.as_deref())
                    .await
            }
        }
    }
}

/// Prints how to start a new session
struct LoginHint;

impl LogoutHook for LoginHint {
    fn redirect_to_login(&self) {
        eprintln!("Session ended. Log in again with: sessiongate login --token <TOKEN>");
    }
}

/// Loaded configuration and the on-disk session it points at
struct Session {
    config: ClientConfig,
    store: Arc<FileSessionStore>,
}

impl Session {
    fn open(config_path: Option<PathBuf>) -> Result<Self> {
        let config = config::load_client_config(config_path.as_deref())?;
        let path = config::session_path(&config)?;
        debug!(path = %path.display(), "opening session store");
        let store = FileSessionStore::open(&path)
            .with_context(|| format!("failed to open session store {}", path.display()))?;

        Ok(Self {
            config,
            store: Arc::new(store),
        })
    }

    fn transport(&self) -> Result<Arc<dyn Transport>> {
        Ok(Arc::new(self.config.build_transport(self.store.clone())?))
    }

    fn inspect(&self, token: Option<String>) -> Result<()> {
        let token = token.or_else(|| self.store.get(TOKEN_KEY));
        let result = TokenValidator::new().validate(token.as_deref());
        println!("{}", serde_json::to_string_pretty(&result)?);

        match result.reason() {
            Some(reason) => bail!("token is not valid: {reason}"),
            None => Ok(()),
        }
    }

    fn login(&self, token: &str, refresh_token: Option<&str>) -> Result<()> {
        let validation = TokenValidator::new().validate(Some(token));
        if let Some(reason) = validation.reason() {
            bail!("refusing to store token: {reason}");
        }

        self.store.set(TOKEN_KEY, token)?;
        match refresh_token {
            Some(refresh_token) => self.store.set(REFRESH_TOKEN_KEY, refresh_token)?,
            None => self.store.remove(REFRESH_TOKEN_KEY)?,
        }

        info!(path = %self.store.path().display(), "session stored");
        match validation.subject() {
            Some(subject) => println!("Logged in as {subject}"),
            None => println!("Logged in"),
        }
        Ok(())
    }

    fn logout(&self) -> Result<()> {
        self.store.remove(TOKEN_KEY)?;
        self.store.remove(REFRESH_TOKEN_KEY)?;
        info!(path = %self.store.path().display(), "session cleared");
        println!("Logged out");
        Ok(())
    }

    async fn check(&self) -> Result<()> {
        let transport = self.transport()?;
        let refresher = self
            .config
            .build_token_refresher(transport, self.store.clone());
        let guard = SessionGuard::new(
            self.store.clone(),
            TokenValidator::new(),
            refresher,
            Arc::new(LoginHint),
        );

        let outcome = guard.check().await?;
        println!("{}", serde_json::to_string_pretty(&outcome)?);

        if !outcome.is_authenticated() {
            bail!("no usable session");
        }
        Ok(())
    }

    async fn request(&self, path: &str, method: &str, data: Option<&str>) -> Result<()> {
        let method = Method::from_bytes(method.to_uppercase().as_bytes())
            .with_context(|| format!("invalid HTTP method: {method}"))?;

        let mut options = RequestOptions::new(method);
        if let Some(data) = data {
            let body: serde_json::Value =
                serde_json::from_str(data).context("request body is not valid JSON")?;
            options = options.json(&body)?;
        }
        options = options.header(
            http::header::ACCEPT,
            HeaderValue::from_static("application/json, */*"),
        );

        let transport = self.transport()?;
        let refresher = self
            .config
            .build_refresher(transport.clone(), self.store.clone());
        let gate = SessionGate::new(transport, refresher);

        let response = match gate.request(path, options).await {
            Ok(response) => response,
            Err(err @ ClientError::SessionExpired(_)) => {
                LoginHint.redirect_to_login();
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        };

        let body = if is_json(&response.headers) {
            response
                .json::<serde_json::Value>()
                .unwrap_or_else(|_| json!(response.text()))
        } else {
            json!(response.text())
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "status": response.status.as_u16(),
                "refreshed": gate.refresh_count() > 0,
                "body": body,
            }))?
        );

        if !response.ok() {
            bail!("request failed with status {}", response.status);
        }
        Ok(())
    }
}

fn is_json(headers: &http::HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("json"))
}

fn init_config(output: PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            output.display()
        );
    }

    // Create parent directory if it doesn't exist
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    config::generate_default_config(&output)?;
    println!("Generated configuration at: {}", output.display());
    Ok(())
}
