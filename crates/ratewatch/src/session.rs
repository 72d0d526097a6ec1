//! Page sources: something that turns a search URL into rendered HTML.

use std::time::Duration;

use reqwest::{Client, Url};
use thirtyfour::error::WebDriverErrorInner;
use thirtyfour::prelude::{ElementQueryable, WebDriverError};
use thirtyfour::{By, ChromiumLikeCapabilities, DesiredCapabilities, WebDriver};

use crate::parser::PROPERTY_CARD;

pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";

const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Page not ready after {waited:?}: {url}")]
    Timeout { url: String, waited: Duration },
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("WebDriver error: {0}")]
    WebDriver(#[from] WebDriverError),
}

/// A browser-like session that loads one page at a time.
///
/// Implementations wait at most their configured timeout for listing
/// entries and report [`SessionError::Timeout`] when none show up.
#[allow(async_fn_in_trait)]
pub trait PageSource {
    async fn load(&mut self, url: &Url) -> Result<String, SessionError>;

    /// Releases the underlying browser or connection pool.
    async fn close(self) -> Result<(), SessionError>
    where
        Self: Sized;
}

#[derive(Debug, Clone)]
pub struct HttpSession {
    client: Client,
    timeout: Duration,
}

impl HttpSession {
    pub fn new(timeout: Duration) -> Result<Self, SessionError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!(
                "{}/{}",
                env!("CARGO_PKG_NAME"),
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;

        Ok(Self { client, timeout })
    }
}

impl PageSource for HttpSession {
    async fn load(&mut self, url: &Url) -> Result<String, SessionError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let result = match response {
            Ok(r) => r.text().await,
            Err(e) => Err(e),
        };

        result.map_err(|e| {
            if e.is_timeout() {
                SessionError::Timeout {
                    url: url.to_string(),
                    waited: self.timeout,
                }
            } else {
                log::error!("HTTP error: {e:?}");
                SessionError::Http(e)
            }
        })
    }

    async fn close(self) -> Result<(), SessionError> {
        Ok(())
    }
}

pub struct WebDriverSession {
    driver: WebDriver,
    timeout: Duration,
}

impl WebDriverSession {
    /// Starts a Chrome session on a running WebDriver server
    /// (chromedriver listens on [`DEFAULT_WEBDRIVER_URL`] by default).
    pub async fn connect(
        server_url: &str,
        headless: bool,
        timeout: Duration,
    ) -> Result<Self, SessionError> {
        let mut caps = DesiredCapabilities::chrome();
        if headless {
            caps.set_headless()?;
        }
        caps.add_arg("--disable-gpu")?;
        caps.add_arg("--disable-blink-features=AutomationControlled")?;
        caps.add_arg("--window-size=1920,1080")?;

        log::info!("Connecting to WebDriver at {}", server_url);
        let driver = WebDriver::new(server_url, caps).await?;

        Ok(Self { driver, timeout })
    }
}

/// A readiness wait that ran out of time is a page timeout; anything else
/// (dead session, refused connection) is a driver failure.
fn readiness_error(e: WebDriverError, url: &Url, waited: Duration) -> SessionError {
    match e.as_inner() {
        WebDriverErrorInner::NoSuchElement(_) | WebDriverErrorInner::Timeout(_) => {
            log::debug!("Readiness wait failed: {e}");
            SessionError::Timeout {
                url: url.to_string(),
                waited,
            }
        }
        _ => SessionError::WebDriver(e),
    }
}

impl PageSource for WebDriverSession {
    async fn load(&mut self, url: &Url) -> Result<String, SessionError> {
        self.driver.goto(url.as_str()).await?;

        self.driver
            .query(By::Css(PROPERTY_CARD))
            .wait(self.timeout, POLL_INTERVAL)
            .first()
            .await
            .map_err(|e| readiness_error(e, url, self.timeout))?;

        Ok(self.driver.source().await?)
    }

    async fn close(self) -> Result<(), SessionError> {
        self.driver.quit().await?;
        Ok(())
    }
}

/// Runtime choice between the two session kinds.
pub enum BrowserSession {
    WebDriver(WebDriverSession),
    Http(HttpSession),
}

impl PageSource for BrowserSession {
    async fn load(&mut self, url: &Url) -> Result<String, SessionError> {
        match self {
            BrowserSession::WebDriver(s) => s.load(url).await,
            BrowserSession::Http(s) => s.load(url).await,
        }
    }

    async fn close(self) -> Result<(), SessionError> {
        match self {
            BrowserSession::WebDriver(s) => s.close().await,
            BrowserSession::Http(s) => s.close().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> Url {
        Url::parse("https://www.booking.com/searchresults.html?ss=Taubate").unwrap()
    }

    #[test]
    fn test_missing_listings_is_a_timeout() {
        let e = thirtyfour::error::no_such_element("no such element".to_string());
        let err = readiness_error(e, &url(), Duration::from_secs(10));

        assert!(matches!(
            err,
            SessionError::Timeout { waited, .. } if waited == Duration::from_secs(10)
        ));
    }

    #[test]
    fn test_driver_failure_is_not_a_timeout() {
        let e = WebDriverError::from_inner(WebDriverErrorInner::RequestFailed(
            "connection refused".to_string(),
        ));
        let err = readiness_error(e, &url(), Duration::from_secs(10));

        assert!(matches!(err, SessionError::WebDriver(_)));
    }
}
