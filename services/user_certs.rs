/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Client certificate selection.
//!
//! When a server asks for a client certificate and several are installed, the
//! web application prompts the user. At most one prompt is outstanding per
//! URL; duplicate requests for the same URL wait on the in-flight one. The
//! user's choice is remembered for the rest of the process.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Installed client certificate, as presented to the user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub subject_name: String,
    #[serde(default)]
    pub issuer_name: String,
    #[serde(default)]
    pub serial_number: String,
    pub fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateError {
    EmptyUrl,
    NoCandidates,
    /// No prompt is outstanding for the URL.
    NotRequested(String),
    /// The broker went away before the user chose.
    Abandoned(String),
}

impl std::fmt::Display for CertificateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyUrl => write!(f, "URL for certificate request was empty"),
            Self::NoCandidates => write!(f, "no client certificates available"),
            Self::NotRequested(url) => write!(f, "no certificate request pending for {url}"),
            Self::Abandoned(url) => write!(f, "certificate request for {url} was abandoned"),
        }
    }
}

impl std::error::Error for CertificateError {}

/// Asks the user to pick a certificate. The answer arrives later through
/// [`CertificateBroker::resolve`].
pub trait CertificatePrompt: Send + Sync {
    fn request_selection(&self, url: &str, candidates: &[Certificate]);
}

enum Selection {
    Pending(Vec<oneshot::Sender<Certificate>>),
    Selected(Certificate),
}

pub struct CertificateBroker {
    prompt: Arc<dyn CertificatePrompt>,
    selections: Mutex<HashMap<String, Selection>>,
}

impl CertificateBroker {
    pub fn new(prompt: Arc<dyn CertificatePrompt>) -> Self {
        Self {
            prompt,
            selections: Mutex::new(HashMap::new()),
        }
    }

    /// Certificate to present to `url`.
    ///
    /// A single candidate is used without asking.
    pub async fn select_certificate(&self, url: &str, candidates: Vec<Certificate>) -> Result<Certificate, CertificateError> {
        if url.is_empty() {
            return Err(CertificateError::EmptyUrl);
        }
        match candidates.as_slice() {
            [] => return Err(CertificateError::NoCandidates),
            [only] => return Ok(only.clone()),
            _ => {},
        }

        let (tx, rx) = oneshot::channel();
        let first_request = {
            let mut selections = self.selections.lock();
            match selections.entry(url.to_string()) {
                Entry::Occupied(mut occupied) => match occupied.get_mut() {
                    Selection::Selected(cert) => return Ok(cert.clone()),
                    Selection::Pending(waiters) => {
                        waiters.push(tx);
                        false
                    },
                },
                Entry::Vacant(vacant) => {
                    vacant.insert(Selection::Pending(vec![tx]));
                    true
                },
            }
        };

        if first_request {
            log::debug!("user_certs: prompting for {url} ({} candidates)", candidates.len());
            self.prompt.request_selection(url, &candidates);
        } else {
            log::debug!("user_certs: joining pending request for {url}");
        }

        rx.await.map_err(|_| CertificateError::Abandoned(url.to_string()))
    }

    /// Record the user's choice for `url` and wake every waiting request.
    /// Returns the number of requests answered.
    pub fn resolve(&self, url: &str, cert: Certificate) -> Result<usize, CertificateError> {
        let waiters = {
            let mut selections = self.selections.lock();
            match selections.get_mut(url) {
                Some(selection @ Selection::Pending(_)) => {
                    match std::mem::replace(selection, Selection::Selected(cert.clone())) {
                        Selection::Pending(waiters) => waiters,
                        Selection::Selected(_) => Vec::new(),
                    }
                },
                _ => return Err(CertificateError::NotRequested(url.to_string())),
            }
        };

        let answered = waiters
            .into_iter()
            .filter_map(|waiter| waiter.send(cert.clone()).ok())
            .count();
        log::info!("user_certs: certificate '{}' selected for {url}", cert.subject_name);
        Ok(answered)
    }

    pub fn is_pending(&self, url: &str) -> bool {
        matches!(self.selections.lock().get(url), Some(Selection::Pending(_)))
    }

    /// Requests for `url` still waiting on the user.
    pub fn waiting_requests(&self, url: &str) -> usize {
        match self.selections.lock().get(url) {
            Some(Selection::Pending(waiters)) => waiters.len(),
            _ => 0,
        }
    }
}
