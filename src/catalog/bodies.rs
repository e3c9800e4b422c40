//! Built-in unit bodies
//!
//! Maps locator kinds to body factories. Factories validate parameters up
//! front so a malformed unit fails before any resource is touched.

use std::collections::HashMap;
use tracing::debug;

use crate::executor::{unit_body, UnitBody, UnitContext, UnitResolver};
use crate::http::{endpoint_of, HttpRequest};
use crate::models::{Locator, TestUnit, UnitError};
use crate::pool::{BrowserSession, Page};

type BodyFactory = fn(&Locator) -> Result<UnitBody, UnitError>;

/// Resolver backed by the built-in body registry
pub struct BuiltinResolver {
    factories: HashMap<&'static str, BodyFactory>,
}

impl BuiltinResolver {
    pub fn new() -> Self {
        let mut resolver = Self {
            factories: HashMap::new(),
        };
        resolver.register("api.status", api_status);
        resolver.register("api.json_fields", api_json_fields);
        resolver.register("ui.title", ui_title);
        resolver.register("ui.element", ui_element);
        resolver
    }

    pub fn register(&mut self, kind: &'static str, factory: BodyFactory) {
        self.factories.insert(kind, factory);
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.factories.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }
}

impl Default for BuiltinResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitResolver for BuiltinResolver {
    fn resolve(&self, unit: &TestUnit) -> Result<UnitBody, UnitError> {
        let factory = self.factories.get(unit.locator.kind.as_str()).ok_or_else(|| {
            UnitError::malformed(format!(
                "Unit '{}' has unknown locator kind '{}' (known: {})",
                unit.name,
                unit.locator.kind,
                self.kinds().join(", ")
            ))
        })?;
        factory(&unit.locator)
    }
}

fn required(locator: &Locator, key: &str) -> Result<String, UnitError> {
    locator
        .get(key)
        .filter(|value| !value.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            UnitError::malformed(format!(
                "Locator '{}' requires parameter '{}'",
                locator.kind, key
            ))
        })
}

fn required_url(locator: &Locator) -> Result<String, UnitError> {
    let url = required(locator, "url")?;
    endpoint_of(&url)
        .map_err(|e| UnitError::malformed(format!("Locator '{}': {}", locator.kind, e)))?;
    Ok(url)
}

fn api_status(locator: &Locator) -> Result<UnitBody, UnitError> {
    let url = required_url(locator)?;
    let expected = match locator.get("status") {
        Some(status) => status.trim().parse::<u16>().map_err(|_| {
            UnitError::malformed(format!("Invalid expected status '{status}'"))
        })?,
        None => 200,
    };

    Ok(unit_body(move |ctx: UnitContext| async move {
        let agent = ctx.http_agent(&url).await?;
        let response = agent.get(&url).await?;
        debug!("{} returned {} in {}ms", url, response.status_code, response.duration_ms);
        if response.status_code != expected {
            return Err(UnitError::assertion(format!(
                "Expected status {} from {}, got {}",
                expected, url, response.status_code
            )));
        }
        Ok(())
    }))
}

fn api_json_fields(locator: &Locator) -> Result<UnitBody, UnitError> {
    let url = required_url(locator)?;
    let fields: Vec<String> = required(locator, "fields")?
        .split(',')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .map(str::to_string)
        .collect();

    Ok(unit_body(move |ctx: UnitContext| async move {
        let agent = ctx.http_agent(&url).await?;
        let request = HttpRequest::get(&url).header("Accept", "application/json");
        let response = agent.send(request).await?;
        if !response.is_success() {
            return Err(UnitError::assertion(format!(
                "Expected success from {}, got {}",
                url, response.status_code
            )));
        }

        let value: serde_json::Value = serde_json::from_str(&response.body).map_err(|e| {
            UnitError::assertion(format!("Response from {url} is not valid JSON"))
                .with_detail(e.to_string())
        })?;
        let object = value.as_object().ok_or_else(|| {
            UnitError::assertion(format!("Response from {url} is not a JSON object"))
        })?;

        let missing: Vec<&str> = fields
            .iter()
            .filter(|field| object.get(field.as_str()).map_or(true, |v| v.is_null()))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(UnitError::assertion(format!(
                "Response from {} is missing fields: {}",
                url,
                missing.join(", ")
            )));
        }
        Ok(())
    }))
}

fn ui_title(locator: &Locator) -> Result<UnitBody, UnitError> {
    let url = required_url(locator)?;
    let expected = required(locator, "title")?;

    Ok(unit_body(move |ctx: UnitContext| async move {
        let mut browser = ctx.acquire_browser().await?;
        let result = check_title(&mut browser, &url, &expected).await;
        ctx.release_browser(browser).await;
        result
    }))
}

async fn check_title(
    session: &mut BrowserSession,
    url: &str,
    expected: &str,
) -> Result<(), UnitError> {
    let page = loaded(session.open(url).await?)?;
    let title = page.title().unwrap_or_default();
    debug!("Session {} title: {:?}", session.id(), title);

    if title.contains(expected) {
        Ok(())
    } else {
        Err(UnitError::assertion(format!(
            "Expected title containing '{expected}', got '{title}'"
        )))
    }
}

fn ui_element(locator: &Locator) -> Result<UnitBody, UnitError> {
    let url = required_url(locator)?;
    let selector = required(locator, "selector")?;

    Ok(unit_body(move |ctx: UnitContext| async move {
        let mut browser = ctx.acquire_browser().await?;
        let result = check_element(&mut browser, &url, &selector).await;
        ctx.release_browser(browser).await;
        result
    }))
}

async fn check_element(
    session: &mut BrowserSession,
    url: &str,
    selector: &str,
) -> Result<(), UnitError> {
    let page = loaded(session.open(url).await?)?;
    if page.contains(selector) {
        Ok(())
    } else {
        Err(UnitError::assertion(format!(
            "Element '{selector}' does not exist on {url}"
        )))
    }
}

/// Reject error pages before asserting on their content
fn loaded(page: &Page) -> Result<&Page, UnitError> {
    if page.is_loaded() {
        Ok(page)
    } else {
        Err(UnitError::assertion(format!(
            "Page {} failed to load: status {}",
            page.url, page.status_code
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::executor::{RetryPolicy, UnitRunner};
    use crate::models::{FailureKind, OutcomeStatus, TestCategory, TestOutcome};
    use crate::pool::SharedResources;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve `body` with `status` to every connection on a local port
    async fn serve(status: u16, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    let response = format!(
                        "HTTP/1.1 {} X\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{addr}")
    }

    fn unit(locator: Locator) -> TestUnit {
        TestUnit::new("unit", locator, TestCategory::Unknown)
    }

    fn context() -> (UnitContext, Arc<SharedResources>) {
        let resources = Arc::new(SharedResources::new(&PoolConfig::default(), 5));
        (UnitContext::new(resources.clone()), resources)
    }

    async fn run(locator: Locator) -> Result<(), UnitError> {
        let body = BuiltinResolver::new().resolve(&unit(locator))?;
        let (ctx, _) = context();
        body(ctx).await
    }

    fn malformed(locator: Locator) -> bool {
        matches!(
            BuiltinResolver::new().resolve(&unit(locator)),
            Err(e) if e.kind == FailureKind::Malformed
        )
    }

    #[test]
    fn test_registered_kinds() {
        let resolver = BuiltinResolver::new();
        assert_eq!(
            resolver.kinds(),
            vec!["api.json_fields", "api.status", "ui.element", "ui.title"]
        );

        let err = resolver
            .resolve(&unit(Locator::new("ui.screenshot")))
            .err()
            .unwrap();
        assert_eq!(err.kind, FailureKind::Malformed);
        assert!(err
            .message
            .ends_with("(known: api.json_fields, api.status, ui.element, ui.title)"));
    }

    #[test]
    fn test_malformed_locators() {
        assert!(malformed(Locator::new("ui.screenshot")));
        assert!(malformed(Locator::new("api.status")));
        assert!(malformed(Locator::new("api.status").param("url", "relative/path")));
        assert!(malformed(
            Locator::new("api.status")
                .param("url", "http://localhost")
                .param("status", "ok")
        ));
        assert!(malformed(Locator::new("ui.title").param("url", "http://localhost")));
        assert!(malformed(Locator::new("ui.element").param("url", "http://localhost")));
        assert!(malformed(Locator::new("api.json_fields").param("url", "http://localhost")));
    }

    #[tokio::test]
    async fn test_api_status() {
        let url = serve(201, "created").await;

        let ok = Locator::new("api.status").param("url", &url).param("status", "201");
        tokio_test::assert_ok!(run(ok).await);

        let wrong = Locator::new("api.status").param("url", &url);
        let err = tokio_test::assert_err!(run(wrong).await);
        assert_eq!(err.kind, FailureKind::Assertion);
        assert!(err.message.contains("got 201"));
    }

    #[tokio::test]
    async fn test_api_json_fields() {
        let url = serve(200, r#"{"id": 1, "title": "hello", "userId": null}"#).await;

        let ok = Locator::new("api.json_fields")
            .param("url", &url)
            .param("fields", "id, title");
        tokio_test::assert_ok!(run(ok).await);

        let missing = Locator::new("api.json_fields")
            .param("url", &url)
            .param("fields", "id,userId,body");
        let err = tokio_test::assert_err!(run(missing).await);
        assert_eq!(err.kind, FailureKind::Assertion);
        assert!(err.message.ends_with("userId, body"));
    }

    #[tokio::test]
    async fn test_ui_title_releases_browser() {
        let url = serve(200, "<html><title>Swag Labs</title></html>").await;
        let body = BuiltinResolver::new()
            .resolve(&unit(
                Locator::new("ui.title").param("url", &url).param("title", "Swag"),
            ))
            .unwrap();

        let (ctx, resources) = context();
        tokio_test::assert_ok!(body(ctx).await);
        assert_eq!(resources.browser_stats().await.idle, 1);
    }

    #[tokio::test]
    async fn test_ui_element_missing_is_terminal() {
        let url = serve(200, "<div class=\"inventory_list\"></div>").await;

        let found = Locator::new("ui.element")
            .param("url", &url)
            .param("selector", "inventory_list");
        tokio_test::assert_ok!(run(found).await);

        let missing = Locator::new("ui.element")
            .param("url", &url)
            .param("selector", "shopping_cart_link");
        let err = tokio_test::assert_err!(run(missing).await);
        assert_eq!(err.kind, FailureKind::Assertion);
        assert!(!err.is_transient());
        assert!(err.message.contains("shopping_cart_link"));
    }

    #[tokio::test]
    async fn test_ui_error_page_fails_even_with_expected_text() {
        let url = serve(
            500,
            "<html><title>Swag Labs</title><div id=\"login-button\"></div></html>",
        )
        .await;

        let title = Locator::new("ui.title").param("url", &url).param("title", "Swag");
        let err = tokio_test::assert_err!(run(title).await);
        assert_eq!(err.kind, FailureKind::Assertion);
        assert!(err.message.contains("status 500"));

        let element = Locator::new("ui.element")
            .param("url", &url)
            .param("selector", "login-button");
        let err = tokio_test::assert_err!(run(element).await);
        assert!(err.message.contains("status 500"));
    }

    async fn run_with_retries(locator: Locator) -> TestOutcome {
        let (_, resources) = context();
        let runner = UnitRunner::new(
            Arc::new(BuiltinResolver::new()),
            resources,
            RetryPolicy::new(2, Duration::ZERO),
        );
        runner.run(unit(locator)).await
    }

    #[tokio::test]
    async fn test_connection_refused_runs_once() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/users", listener.local_addr().unwrap());
        drop(listener);

        let outcome = run_with_retries(Locator::new("api.status").param("url", &url)).await;
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.retry_attempts, 0);
        assert_eq!(outcome.error.map(|e| e.kind), Some(FailureKind::Other));
    }

    #[tokio::test]
    async fn test_missing_element_runs_once() {
        let url = serve(200, "<div class=\"inventory_list\"></div>").await;
        let locator = Locator::new("ui.element")
            .param("url", &url)
            .param("selector", "no_such_element");

        let outcome = run_with_retries(locator).await;
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.retry_attempts, 0);
    }
}
