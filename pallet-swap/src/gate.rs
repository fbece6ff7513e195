//! Service gate: take bound services offline around a swap, then back online.
//!
//! A service may be reachable through several administration channels
//! (different hosts or credentials for the same switch). Every channel is
//! attempted for every binding; one channel failing never stops the others,
//! and a channel without credentials is skipped rather than failed. The
//! channels are not switched atomically with respect to each other.

use std::cell::RefCell;
use std::time::Duration;

use serde::Deserialize;

use pallet_core::{ChannelConfig, ServiceBinding, ServiceState};

use crate::error::GateError;
use crate::report::{ToggleResult, ToggleStatus};

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const READ_TIMEOUT: Duration = Duration::from_secs(120);

/// ArcGIS admin error code for an expired or invalid token.
const INVALID_TOKEN: i64 = 498;

/// One administration surface able to start and stop services.
pub trait ServiceChannel {
    fn name(&self) -> &str;

    /// `Some(reason)` when the channel cannot act and must be skipped.
    fn unavailable(&self) -> Option<String> {
        None
    }

    fn set_state(&self, binding: &ServiceBinding, state: ServiceState) -> Result<(), GateError>;
}

/// Fans a desired state out over every configured channel.
#[derive(Default)]
pub struct GateCoordinator {
    channels: Vec<Box<dyn ServiceChannel>>,
}

impl GateCoordinator {
    pub fn new(channels: Vec<Box<dyn ServiceChannel>>) -> Self {
        Self { channels }
    }

    /// One [`ArcGisAdminChannel`] per configured channel.
    pub fn from_config(channels: &[ChannelConfig]) -> Self {
        Self::new(
            channels
                .iter()
                .map(|c| Box::new(ArcGisAdminChannel::new(c.clone())) as Box<dyn ServiceChannel>)
                .collect(),
        )
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Bring every binding to `state` on every channel, best effort.
    ///
    /// Returns one result per (channel, binding) pair, channels in order.
    pub fn ensure(&self, state: ServiceState, bindings: &[ServiceBinding]) -> Vec<ToggleResult> {
        let mut results = Vec::with_capacity(self.channels.len() * bindings.len());
        for channel in &self.channels {
            let skip = channel.unavailable();
            for binding in bindings {
                let status = match &skip {
                    Some(reason) => {
                        tracing::debug!(channel = channel.name(), service = %binding, "skipped: {reason}");
                        ToggleStatus::Skipped {
                            reason: reason.clone(),
                        }
                    }
                    None => match channel.set_state(binding, state) {
                        Ok(()) => {
                            tracing::info!(channel = channel.name(), service = %binding, %state, "service toggled");
                            ToggleStatus::Toggled
                        }
                        Err(err) => {
                            tracing::error!(channel = channel.name(), service = %binding, %state, error = %err, "service toggle failed");
                            ToggleStatus::Failed {
                                error: err.to_string(),
                            }
                        }
                    },
                };
                results.push(ToggleResult {
                    channel: channel.name().to_string(),
                    service: binding.to_string(),
                    state,
                    status,
                });
            }
        }
        results
    }
}

// ---------------------------------------------------------------------------
// ArcGIS Server administrator API
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct AdminResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    messages: Vec<String>,
}

impl AdminResponse {
    fn is_error(&self) -> bool {
        self.status.as_deref() == Some("error")
    }

    fn message(&self) -> String {
        if self.messages.is_empty() {
            "no message".to_string()
        } else {
            self.messages.join("; ")
        }
    }
}

/// Starts and stops services through `https://host:port/<instance>/admin`.
///
/// A token is requested on first use and reused for the rest of the run;
/// an invalid-token response triggers one refresh and retry.
pub struct ArcGisAdminChannel {
    config: ChannelConfig,
    agent: ureq::Agent,
    token: RefCell<Option<String>>,
}

impl ArcGisAdminChannel {
    pub fn new(config: ChannelConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .build();
        Self {
            config,
            agent,
            token: RefCell::new(None),
        }
    }

    fn post(&self, url: &str, form: &[(&str, &str)]) -> Result<AdminResponse, GateError> {
        let request_err = |message: String| GateError::Request {
            url: url.to_string(),
            message,
        };
        let response = self
            .agent
            .post(url)
            .send_form(form)
            .map_err(|e| request_err(e.to_string()))?;
        response
            .into_json::<AdminResponse>()
            .map_err(|e| request_err(e.to_string()))
    }

    fn token(&self) -> Result<String, GateError> {
        if let Some(token) = self.token.borrow().as_ref() {
            return Ok(token.clone());
        }
        let Some((username, password)) = self.config.credentials() else {
            return Err(GateError::Token {
                channel: self.config.name.clone(),
                message: "no credentials".to_string(),
            });
        };
        let url = format!("{}/generateToken", self.config.admin_url());
        let body = self.post(
            &url,
            &[
                ("username", username),
                ("password", password),
                ("client", "requestip"),
                ("expiration", "60"),
                ("f", "json"),
            ],
        )?;
        let token = match (body.is_error(), body.token.clone()) {
            (false, Some(token)) => token,
            _ => {
                return Err(GateError::Token {
                    channel: self.config.name.clone(),
                    message: body.message(),
                })
            }
        };
        *self.token.borrow_mut() = Some(token.clone());
        Ok(token)
    }

    fn service_url(&self, binding: &ServiceBinding, state: ServiceState) -> String {
        format!(
            "{}/services/{}.{}/{}",
            self.config.admin_url(),
            binding.name,
            binding.service_type,
            state.verb()
        )
    }
}

impl ServiceChannel for ArcGisAdminChannel {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn unavailable(&self) -> Option<String> {
        if self.config.credentials().is_none() {
            Some("no credentials configured".to_string())
        } else {
            None
        }
    }

    fn set_state(&self, binding: &ServiceBinding, state: ServiceState) -> Result<(), GateError> {
        let url = self.service_url(binding, state);
        let mut refreshed = false;
        loop {
            let token = self.token()?;
            let body = self.post(&url, &[("token", token.as_str()), ("f", "json")])?;
            if !body.is_error() {
                return Ok(());
            }
            if body.code == Some(INVALID_TOKEN) && !refreshed {
                tracing::debug!(channel = self.name(), "token rejected; requesting a new one");
                *self.token.borrow_mut() = None;
                refreshed = true;
                continue;
            }
            return Err(GateError::Rejected {
                service: binding.to_string(),
                verb: state.verb().to_string(),
                message: body.message(),
            });
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
