use crate::cdp::{CdpClient, LaunchOptions};
use crate::script::{self, QueryReply, SelectReply};
use async_trait::async_trait;
use retrace_engine::config::schema::BrowserConfig;
use retrace_engine::driver::{Driver, DriverError, ElementHandle, NavigationResult, QueryOutcome};
use retrace_engine::selector::SelectorKind;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

pub struct HeadlessDriver {
    client: Option<CdpClient>,
    launch: LaunchOptions,
    command_timeout: Duration,
}

impl HeadlessDriver {
    pub fn new() -> Self {
        Self::from_config(&BrowserConfig::default())
    }

    pub fn from_config(config: &BrowserConfig) -> Self {
        Self {
            client: None,
            launch: LaunchOptions {
                visible: config.visible,
                chrome_bin: config.chrome_bin.clone(),
            },
            command_timeout: Duration::from_millis(config.command_timeout_ms),
        }
    }

    fn client(&self) -> Result<&CdpClient, DriverError> {
        self.client.as_ref().ok_or(DriverError::NotReady)
    }

    /// Run one browser command under the configured timeout.
    async fn timed<T, E, F>(&self, operation: &str, command: F) -> Result<T, DriverError>
    where
        E: std::fmt::Display,
        F: Future<Output = Result<T, E>>,
    {
        match tokio::time::timeout(self.command_timeout, command).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(DriverError::Other(format!("{} failed: {}", operation, e))),
            Err(_) => Err(DriverError::Timeout {
                operation: operation.to_string(),
            }),
        }
    }

    async fn get_navigation_result(
        page: &chromiumoxide::Page,
    ) -> Result<NavigationResult, DriverError> {
        let title = page
            .get_title()
            .await
            .unwrap_or_default()
            .unwrap_or_default();
        let url = page
            .url()
            .await
            .map_err(|e| DriverError::Navigation(e.to_string()))?
            .unwrap_or_default();
        Ok(NavigationResult {
            url,
            title,
            status: 200,
        })
    }

    async fn find(&self, element: ElementHandle) -> Result<chromiumoxide::Element, DriverError> {
        let page = &self.client()?.page;
        let selector = script::handle_selector(element.id);
        match tokio::time::timeout(self.command_timeout, page.find_element(selector)).await {
            Ok(Ok(found)) => Ok(found),
            Ok(Err(_)) => Err(DriverError::ElementStale { id: element.id }),
            Err(_) => Err(DriverError::Timeout {
                operation: format!("locating element {}", element.id),
            }),
        }
    }
}

impl Default for HeadlessDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Driver for HeadlessDriver {
    async fn launch(&mut self) -> Result<(), DriverError> {
        info!("Launching Headless Driver (Chromium)...");
        let client = CdpClient::launch(&self.launch)
            .await
            .map_err(|e| DriverError::Other(e.to_string()))?;
        self.client = Some(client);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        if let Some(client) = self.client.take() {
            client
                .close()
                .await
                .map_err(|e| DriverError::Other(e.to_string()))?;
        }
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.client.is_some()
    }

    async fn navigate(&mut self, url: &str) -> Result<NavigationResult, DriverError> {
        let page = &self.client()?.page;

        info!("Navigating to: {}", url);
        match tokio::time::timeout(self.command_timeout, page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(DriverError::Navigation(e.to_string())),
            Err(_) => {
                return Err(DriverError::Timeout {
                    operation: format!("navigating to {}", url),
                });
            }
        }

        Self::get_navigation_result(page).await
    }

    async fn content(&mut self) -> Result<String, DriverError> {
        let page = &self.client()?.page;
        self.timed("reading page content", page.content()).await
    }

    async fn query_unique(
        &mut self,
        kind: SelectorKind,
        expression: &str,
    ) -> Result<QueryOutcome, DriverError> {
        let page = &self.client()?.page;
        let reply: QueryReply = script::evaluate(
            page,
            &script::query_script(kind, expression)?,
            self.command_timeout,
        )
        .await?;

        if let Some(error) = reply.error {
            debug!("Selector rejected by the page: {} ({})", expression, error);
            return Err(DriverError::SelectorInvalid {
                selector: expression.to_string(),
            });
        }

        Ok(match (reply.count, reply.id) {
            (1, Some(id)) => QueryOutcome::Found(ElementHandle { id }),
            (0, _) => QueryOutcome::NotFound,
            (1, None) => {
                return Err(DriverError::ScriptError(
                    "query matched one element but returned no handle".into(),
                ));
            }
            (count, _) => QueryOutcome::Ambiguous(count),
        })
    }

    async fn click(&mut self, element: ElementHandle) -> Result<(), DriverError> {
        let found = self.find(element).await?;
        debug!("Clicking element {}", element.id);
        match tokio::time::timeout(self.command_timeout, found.click()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(DriverError::ElementNotInteractable {
                id: element.id,
                reason: e.to_string(),
            }),
            Err(_) => Err(DriverError::Timeout {
                operation: format!("clicking element {}", element.id),
            }),
        }
    }

    async fn fill(&mut self, element: ElementHandle, text: &str) -> Result<(), DriverError> {
        let found = self.find(element).await?;
        let page = &self.client()?.page;

        let cleared: bool =
            script::evaluate(page, &script::clear_script(element.id), self.command_timeout)
                .await?;
        if !cleared {
            return Err(DriverError::ElementStale { id: element.id });
        }

        let typing = async {
            found.click().await?;
            found.type_str(text).await
        };
        match tokio::time::timeout(self.command_timeout, typing).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(DriverError::ElementNotInteractable {
                id: element.id,
                reason: e.to_string(),
            }),
            Err(_) => Err(DriverError::Timeout {
                operation: format!("typing into element {}", element.id),
            }),
        }
    }

    async fn select_option(
        &mut self,
        element: ElementHandle,
        label: &str,
    ) -> Result<(), DriverError> {
        let page = &self.client()?.page;
        let reply: SelectReply = script::evaluate(
            page,
            &script::select_option_script(element.id, label)?,
            self.command_timeout,
        )
        .await?;

        match reply {
            SelectReply::Selected => Ok(()),
            SelectReply::Missing => Err(DriverError::ElementStale { id: element.id }),
            SelectReply::NotSelect => Err(DriverError::ElementNotInteractable {
                id: element.id,
                reason: "not a <select> element".into(),
            }),
            SelectReply::NoOption => Err(DriverError::ElementNotInteractable {
                id: element.id,
                reason: format!("no option labelled '{}'", label),
            }),
        }
    }

    async fn scroll_by(&mut self, dy: i64) -> Result<(), DriverError> {
        let page = &self.client()?.page;
        let _: bool =
            script::evaluate(page, &script::scroll_script(dy), self.command_timeout).await?;
        Ok(())
    }

    async fn viewport_height(&mut self) -> Result<i64, DriverError> {
        let page = &self.client()?.page;
        let height: f64 =
            script::evaluate(page, script::VIEWPORT_HEIGHT_SCRIPT, self.command_timeout).await?;
        Ok(height.round() as i64)
    }
}
