use async_trait::async_trait;
use reqwest::Url;
use thiserror::Error;
use tokio::process::Command;

/// Errors raised while handing a URL to the host
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Unsupported URL: {0}")]
    UnsupportedUrl(String),

    #[error("Failed to launch browser: {0}")]
    Launch(#[from] std::io::Error),

    #[error("Browser exited with status {0}")]
    ExitStatus(i32),
}

/// Host surface able to open URLs outside the app
#[async_trait]
pub trait ExternalBrowser: Send + Sync {
    /// Whether `url` can be opened at all
    async fn can_open(&self, url: &str) -> bool;

    async fn open(&self, url: &str) -> Result<(), BrowserError>;
}

/// Opens URLs with the platform's default handler
#[derive(Debug, Clone, Default)]
pub struct SystemBrowser;

impl SystemBrowser {
    fn parse(url: &str) -> Option<Url> {
        Url::parse(url)
            .ok()
            .filter(|u| matches!(u.scheme(), "http" | "https") && u.has_host())
    }

    /// Opener program and leading arguments for `os`
    ///
    /// The URL is always passed as one trailing argument and never goes
    /// through a shell, so `&` and `^` in query strings reach the handler intact.
    fn launcher(os: &str) -> (&'static str, &'static [&'static str]) {
        match os {
            "macos" => ("open", &[]),
            "windows" => ("rundll32", &["url.dll,FileProtocolHandler"]),
            _ => ("xdg-open", &[]),
        }
    }

    fn command(url: &str) -> Command {
        let (program, args) = Self::launcher(std::env::consts::OS);
        let mut cmd = Command::new(program);
        cmd.args(args).arg(url);
        cmd
    }
}

#[async_trait]
impl ExternalBrowser for SystemBrowser {
    async fn can_open(&self, url: &str) -> bool {
        Self::parse(url).is_some()
    }

    async fn open(&self, url: &str) -> Result<(), BrowserError> {
        let parsed = Self::parse(url).ok_or_else(|| BrowserError::UnsupportedUrl(url.to_string()))?;

        tracing::info!("Opening {} in the system browser", parsed);

        let status = Self::command(parsed.as_str()).status().await?;
        if !status.success() {
            return Err(BrowserError::ExitStatus(status.code().unwrap_or(-1)));
        }

        Ok(())
    }
}
