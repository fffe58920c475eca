//! Scripted page client for crawler tests

use crate::crawler::client::{FetchError, LoadedPage, PageClient, PageContext};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

enum Step {
    Fail,
    Status(u16),
}

#[derive(Default)]
struct Script {
    pages: HashMap<String, String>,
    queued: HashMap<String, VecDeque<Step>>,
    visits: HashMap<String, u32>,
    opened: u32,
    closed: u32,
}

/// Serves canned pages; unknown URLs fail with a navigation error
#[derive(Clone, Default)]
pub(crate) struct ScriptedClient {
    script: Arc<Mutex<Script>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `html` at `url` once any queued failures are used up
    pub fn page(&self, url: &str, html: impl Into<String>) -> &Self {
        self.script
            .lock()
            .unwrap()
            .pages
            .insert(url.to_string(), html.into());
        self
    }

    /// Makes the next `times` navigations to `url` time out
    pub fn fail_times(&self, url: &str, times: u32) -> &Self {
        let mut script = self.script.lock().unwrap();
        let queue = script.queued.entry(url.to_string()).or_default();
        for _ in 0..times {
            queue.push_back(Step::Fail);
        }
        self
    }

    /// Makes the next navigation to `url` answer with an HTTP status
    pub fn status_once(&self, url: &str, status: u16) -> &Self {
        self.script
            .lock()
            .unwrap()
            .queued
            .entry(url.to_string())
            .or_default()
            .push_back(Step::Status(status));
        self
    }

    /// Stops serving `url`
    pub fn remove(&self, url: &str) -> &Self {
        self.script.lock().unwrap().pages.remove(url);
        self
    }

    pub fn visits(&self, url: &str) -> u32 {
        self.script
            .lock()
            .unwrap()
            .visits
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_visits(&self) -> u32 {
        self.script.lock().unwrap().visits.values().sum()
    }

    /// (opened, closed) context counts
    pub fn contexts(&self) -> (u32, u32) {
        let script = self.script.lock().unwrap();
        (script.opened, script.closed)
    }
}

pub(crate) struct ScriptedContext {
    script: Arc<Mutex<Script>>,
}

#[async_trait]
impl PageClient for ScriptedClient {
    type Context = ScriptedContext;

    async fn open(&self) -> Result<ScriptedContext, FetchError> {
        self.script.lock().unwrap().opened += 1;
        Ok(ScriptedContext {
            script: Arc::clone(&self.script),
        })
    }
}

#[async_trait]
impl PageContext for ScriptedContext {
    async fn navigate(&mut self, url: &Url, _timeout: Duration) -> Result<LoadedPage, FetchError> {
        let key = url.to_string();
        let outcome = {
            let mut script = self.script.lock().unwrap();
            *script.visits.entry(key.clone()).or_insert(0) += 1;

            match script.queued.get_mut(&key).and_then(VecDeque::pop_front) {
                Some(Step::Fail) => Err(FetchError::Timeout { url: key.clone() }),
                Some(Step::Status(status)) => Err(FetchError::Status {
                    url: key.clone(),
                    status,
                }),
                None => match script.pages.get(&key) {
                    Some(html) => Ok(LoadedPage::new(url.clone(), html.clone())),
                    None => Err(FetchError::Navigation {
                        url: key.clone(),
                        message: "no route".to_string(),
                    }),
                },
            }
        };

        // Yield so sibling tasks in a batch interleave
        tokio::task::yield_now().await;
        outcome
    }

    async fn close(&mut self) {
        self.script.lock().unwrap().closed += 1;
    }
}
