//! HTTP client executing commands on a running daemon.

use std::io::Write;

use tracing::{debug, info};

use crate::command::CommandRequest;
use crate::environment::Environment;
use crate::errors::{ExecuteError, is_daemon_not_running};
use crate::executor::{Executor, LocalExecutor};
use crate::http;
use crate::transport::TransportConfig;

const CLIENT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::client");

/// Forwards requests to the daemon, optionally running them locally when no
/// daemon is listening.
pub struct HttpClient {
    transport: TransportConfig,
    fallback: Option<LocalExecutor>,
}

impl HttpClient {
    #[must_use]
    pub fn new(transport: TransportConfig) -> Self {
        Self {
            transport,
            fallback: None,
        }
    }

    #[must_use]
    pub fn with_fallback(mut self, fallback: LocalExecutor) -> Self {
        self.fallback = Some(fallback);
        self
    }

    fn exchange(&self, request: &CommandRequest, out: &mut dyn Write) -> Result<(), ExecuteError> {
        let endpoint = self.transport.address();
        let connection =
            self.transport
                .dialer()
                .dial()
                .map_err(|source| ExecuteError::Connect {
                    endpoint: endpoint.clone(),
                    source,
                })?;

        let target = http::request_target(self.transport.api_prefix(), request);
        debug!(target: CLIENT_TARGET, %endpoint, %target, "sending request");
        let response = http::post(connection, self.transport.host(), &target).map_err(
            |source| ExecuteError::Exchange {
                endpoint: endpoint.clone(),
                source,
            },
        )?;

        if !response.is_success() {
            let message = response
                .error_message()
                .unwrap_or_else(|| format!("daemon responded with status {}", response.status));
            return Err(ExecuteError::Remote { message });
        }
        out.write_all(&response.body).map_err(ExecuteError::Output)
    }
}

impl Executor for HttpClient {
    fn execute(
        &self,
        request: &CommandRequest,
        env: &Environment,
        out: &mut dyn Write,
    ) -> Result<(), ExecuteError> {
        match self.exchange(request, out) {
            Err(error) if is_daemon_not_running(&error) => match &self.fallback {
                Some(fallback) => {
                    info!(
                        target: CLIENT_TARGET,
                        endpoint = %self.transport.address(),
                        error = %error,
                        "daemon not reachable; running command locally"
                    );
                    fallback.execute(request, env, out)
                }
                None => Err(error),
            },
            other => other,
        }
    }
}
