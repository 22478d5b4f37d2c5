use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use headless_chrome::{Browser, LaunchOptions, Tab};
use tracing::warn;

use super::dom;
use crate::types::{Extraction, PageState, Step};

/// One Chrome session per invocation. The browser shuts down when this is
/// dropped at the end of the run.
pub struct BrowserSession {
    _browser: Browser,
    tab: Arc<Tab>,
}

impl BrowserSession {
    pub fn launch(headless: bool) -> Result<Self> {
        let options = LaunchOptions {
            headless,
            args: vec![
                OsStr::new("--no-first-run"),
                OsStr::new("--no-default-browser-check"),
                OsStr::new("--disable-blink-features=AutomationControlled"),
            ],
            idle_browser_timeout: Duration::from_secs(120),
            ..Default::default()
        };

        let browser = Browser::new(options).context("failed to launch Chrome")?;
        let tab = browser.new_tab()?;

        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    pub fn navigate(&self, url: &str) -> Result<()> {
        self.tab.navigate_to(url)?;
        self.tab.wait_for_element("body")?;
        Ok(())
    }

    /// Run one step and capture what the page looks like afterwards. Step
    /// failures land in [`PageState::error`] so the planner can route around
    /// them instead of aborting the whole act.
    pub fn execute(&self, step: &Step) -> PageState {
        let mut extracted = Vec::new();
        let error = self
            .apply(step, &mut extracted)
            .err()
            .map(|e| format!("{e:#}"));

        if let Some(ref err) = error {
            warn!(?step, %err, "step failed");
        }

        PageState {
            url: dom::current_url(&self.tab).unwrap_or_else(|_| "unknown".to_string()),
            title: dom::page_title(&self.tab).unwrap_or_else(|_| "untitled".to_string()),
            dom_snapshot: dom::capture_snapshot(&self.tab).unwrap_or_default(),
            extracted,
            error,
        }
    }

    fn apply(&self, step: &Step, extracted: &mut Vec<Extraction>) -> Result<()> {
        match step {
            Step::Navigate { url } => {
                self.tab.navigate_to(url)?;
                self.tab.wait_for_element("body")?;
                std::thread::sleep(Duration::from_millis(1500));
            }
            Step::WaitFor {
                selector,
                timeout_ms,
            } => {
                self.tab
                    .wait_for_element_with_custom_timeout(selector, Duration::from_millis(*timeout_ms))?;
            }
            Step::TypeInto { selector, text } => {
                let element = self.tab.find_element(selector)?;
                element.click()?;
                let js_selector = selector.replace('\'', "\\'");
                self.tab.evaluate(
                    &format!("document.querySelector('{js_selector}').value = ''"),
                    false,
                )?;
                self.tab.type_str(text)?;
            }
            Step::Click { selector } => {
                self.tab.find_element(selector)?.click()?;
                std::thread::sleep(Duration::from_millis(1000));
            }
            Step::PressKey { key } => {
                self.tab.press_key(key)?;
                std::thread::sleep(Duration::from_millis(1000));
            }
            Step::Extract { selector, label } => {
                let js_selector = selector.replace('\'', "\\'");
                let result = self.tab.evaluate(
                    &format!("(document.querySelector('{js_selector}') || {{}}).innerText || ''"),
                    false,
                )?;
                let content = result
                    .value
                    .and_then(|v| v.as_str().map(String::from))
                    .unwrap_or_default();
                extracted.push(Extraction {
                    label: label.clone(),
                    content: content.chars().take(2000).collect(),
                });
            }
            Step::Done { .. } => {}
        }

        Ok(())
    }
}
