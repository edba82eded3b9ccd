// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Scripted in-memory pod lister for tests

use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use super::{MemberPod, PodLister};
use crate::error::{DiscoveryError, Result};

#[derive(Clone, Debug)]
pub enum Scripted {
    Members(Vec<MemberPod>),
    Fail(String),
}

/// Returns scripted responses in order; the last one repeats forever
pub struct FakeLister {
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<(String, String)>>,
    delay: Option<Duration>,
}

impl FakeLister {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn returning(members: Vec<MemberPod>) -> Self {
        Self::new(vec![Scripted::Members(members)])
    }

    pub fn failing(error: &str) -> Self {
        Self::new(vec![Scripted::Fail(error.to_string())])
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// (namespace, selector) of every call so far
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    fn next(&self) -> Scripted {
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script
                .front()
                .cloned()
                .unwrap_or(Scripted::Members(Vec::new()))
        }
    }
}

#[async_trait]
impl PodLister for FakeLister {
    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<MemberPod>> {
        self.calls
            .lock()
            .unwrap()
            .push((namespace.to_string(), label_selector.to_string()));
        let response = self.next();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match response {
            Scripted::Members(members) => Ok(members),
            Scripted::Fail(error) => Err(DiscoveryError::DiscoveryUnavailable(error)),
        }
    }
}

/// Members of `default` labelled app=x
pub fn members(names: &[&str]) -> Vec<MemberPod> {
    names
        .iter()
        .map(|name| {
            MemberPod::new(
                *name,
                "default",
                BTreeMap::from([("app".to_string(), "x".to_string())]),
            )
        })
        .collect()
}
