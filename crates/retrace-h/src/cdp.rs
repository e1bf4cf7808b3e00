use chromiumoxide::cdp::browser_protocol::page::{
    EventJavascriptDialogOpening, HandleJavaScriptDialogParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EventConsoleApiCalled;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

type LaunchError = Box<dyn std::error::Error + Send + Sync>;

/// How to start the browser.
#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    pub visible: bool,
    /// Takes precedence over `CHROME_BIN`.
    pub chrome_bin: Option<PathBuf>,
}

impl LaunchOptions {
    fn executable(&self) -> Option<PathBuf> {
        self.chrome_bin
            .clone()
            .or_else(|| std::env::var_os("CHROME_BIN").map(PathBuf::from))
    }
}

/// Chromium profile directory. Temporary profiles are removed on close.
#[derive(Debug)]
struct Profile {
    path: PathBuf,
    temporary: bool,
}

impl Profile {
    /// `RETRACE_USER_DATA_DIR` when set, otherwise a fresh directory under the
    /// system temp dir so that concurrent replays never share browser state.
    fn resolve() -> Result<Self, LaunchError> {
        let profile = match std::env::var_os("RETRACE_USER_DATA_DIR") {
            Some(dir) => Self {
                path: PathBuf::from(dir),
                temporary: false,
            },
            None => {
                let nanos = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map_err(|e| format!("System clock error: {}", e))?
                    .as_nanos();
                Self {
                    path: std::env::temp_dir().join(format!(
                        "retrace-profile-{}-{}",
                        std::process::id(),
                        nanos
                    )),
                    temporary: true,
                }
            }
        };
        std::fs::create_dir_all(&profile.path)?;
        info!(
            path = %profile.path.display(),
            temporary = profile.temporary,
            "Using browser profile"
        );
        Ok(profile)
    }

    fn remove(&self) {
        if !self.temporary {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            debug!("Failed to remove profile {}: {}", self.path.display(), e);
        }
    }
}

/// A launched browser with the single page replays run in.
pub struct CdpClient {
    browser: Browser,
    pub page: Page,
    handler: JoinHandle<()>,
    profile: Profile,
}

impl CdpClient {
    pub async fn launch(options: &LaunchOptions) -> Result<Self, LaunchError> {
        let profile = Profile::resolve()?;

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .user_data_dir(&profile.path);
        if options.visible {
            builder = builder.with_head();
        }
        if let Some(executable) = options.executable() {
            info!("Using Chrome binary: {}", executable.display());
            builder = builder.chrome_executable(executable);
        }
        let config = builder
            .build()
            .map_err(|e| format!("Invalid browser config: {}", e))?;

        info!(visible = options.visible, "Launching Chromium");
        let (browser, mut events) = Browser::launch(config)
            .await
            .map_err(|e| format!("Failed to launch browser: {}", e))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(e) = event {
                    error!("Browser handler error (ignoring): {}", e);
                }
            }
            debug!("Browser handler task ended");
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| format!("Failed to open page: {}", e))?;
        forward_console(&page).await?;
        accept_dialogs(&page).await?;

        Ok(Self {
            browser,
            page,
            handler,
            profile,
        })
    }

    pub async fn close(mut self) -> Result<(), LaunchError> {
        let closed = self.browser.close().await;
        let joined = self.handler.await;
        self.profile.remove();

        closed.map_err(|e| format!("Error closing browser: {}", e))?;
        joined.map_err(|e| format!("Error awaiting browser handler: {}", e))?;
        Ok(())
    }
}

/// Page console output goes to the debug log.
async fn forward_console(page: &Page) -> Result<(), LaunchError> {
    let mut calls = page
        .event_listener::<EventConsoleApiCalled>()
        .await
        .map_err(|e| format!("Failed to subscribe to console events: {}", e))?;

    tokio::spawn(async move {
        while let Some(call) = calls.next().await {
            let args: Vec<&str> = call
                .args
                .iter()
                .map(|arg| arg.description.as_deref().unwrap_or("?"))
                .collect();
            debug!(kind = ?call.r#type, "Page console: {}", args.join(" "));
        }
    });
    Ok(())
}

/// An open JavaScript dialog blocks every later evaluation; accept each one.
async fn accept_dialogs(page: &Page) -> Result<(), LaunchError> {
    let mut dialogs = page
        .event_listener::<EventJavascriptDialogOpening>()
        .await
        .map_err(|e| format!("Failed to subscribe to dialog events: {}", e))?;

    let page = page.clone();
    tokio::spawn(async move {
        while let Some(dialog) = dialogs.next().await {
            info!(kind = ?dialog.r#type, "Accepting dialog: {}", dialog.message);
            if let Err(e) = page.execute(HandleJavaScriptDialogParams::new(true)).await {
                error!("Failed to accept dialog: {}", e);
            }
        }
    });
    Ok(())
}
