use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use reqwest::Client;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReadinessError {
    #[error("Readiness check failed after {0} consecutive failures")]
    TooManyFailures(u32),
    #[error("Readiness check timed out after {0:?}")]
    TimedOut(Duration),
}

/// How long and how hard to poll before the platform counts as up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessConfig {
    pub check_interval: Duration,
    /// Overall budget for the whole poll.
    pub timeout: Duration,
    /// Passing rounds in a row needed to report ready.
    pub success_threshold: u32,
    /// Failing rounds in a row after which polling stops.
    pub failure_threshold: u32,
    pub probes: Vec<ReadinessProbe>,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(60),
            success_threshold: 1,
            failure_threshold: 60,
            probes: vec![ReadinessProbe::default()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessProbe {
    pub probe_type: ProbeType,
    pub host: String,
    pub port: Option<u16>,
    pub path: Option<String>,
    /// Any HTTP response below this status counts as ready.
    pub max_status: Option<u16>,
    pub timeout: Duration,
}

impl Default for ReadinessProbe {
    fn default() -> Self {
        Self {
            probe_type: ProbeType::Tcp,
            host: "127.0.0.1".to_string(),
            port: Some(4000),
            path: None,
            max_status: None,
            timeout: Duration::from_secs(5),
        }
    }
}

impl ReadinessProbe {
    fn address(&self) -> String {
        format!("{}:{}", self.host, self.port.unwrap_or(80))
    }

    /// One attempt, bounded by the probe's own timeout.
    async fn passes(&self, client: &Client) -> bool {
        let attempt = async {
            match self.probe_type {
                ProbeType::Tcp => TcpStream::connect(self.address())
                    .await
                    .map(drop)
                    .map_err(|e| e.to_string()),
                ProbeType::Http => {
                    let path = self.path.as_deref().unwrap_or("/");
                    let url = format!("http://{}{}", self.address(), path);
                    let ceiling = self.max_status.unwrap_or(500);
                    match client.get(&url).send().await {
                        Ok(resp) if resp.status().as_u16() < ceiling => Ok(()),
                        Ok(resp) => Err(format!("status {}", resp.status())),
                        Err(e) => Err(e.to_string()),
                    }
                }
            }
        };
        match timeout(self.timeout, attempt).await {
            Ok(Ok(())) => true,
            Ok(Err(reason)) => {
                debug!(address = %self.address(), %reason, "Probe failed");
                false
            }
            Err(_) => {
                debug!(address = %self.address(), "Probe timed out");
                false
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeType {
    Http,
    Tcp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadinessStatus {
    pub ready: bool,
    pub checks_performed: u32,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
    pub last_check: Option<Instant>,
}

impl ReadinessStatus {
    fn record(&mut self, passed: bool, success_threshold: u32) {
        self.checks_performed += 1;
        self.last_check = Some(Instant::now());
        if passed {
            self.consecutive_successes += 1;
            self.consecutive_failures = 0;
        } else {
            self.consecutive_successes = 0;
            self.consecutive_failures += 1;
        }
        self.ready = self.consecutive_successes >= success_threshold;
    }
}

/// Polls the platform's services until every probe passes.
pub struct ReadinessChecker {
    config: ReadinessConfig,
    status: ReadinessStatus,
    client: Client,
}

impl ReadinessChecker {
    pub fn new(config: ReadinessConfig) -> Self {
        Self {
            config,
            status: ReadinessStatus::default(),
            // Local ports only; an environment proxy would intercept these requests.
            client: Client::builder()
                .no_proxy()
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    pub fn status(&self) -> &ReadinessStatus {
        &self.status
    }

    /// A round passes only when every probe passes.
    pub async fn wait_for_ready(&mut self) -> Result<ReadinessStatus, ReadinessError> {
        let budget = self.config.timeout;
        timeout(budget, self.poll())
            .await
            .unwrap_or(Err(ReadinessError::TimedOut(budget)))
    }

    async fn poll(&mut self) -> Result<ReadinessStatus, ReadinessError> {
        loop {
            let mut passed = true;
            for probe in &self.config.probes {
                if !probe.passes(&self.client).await {
                    passed = false;
                    break;
                }
            }
            self.status.record(passed, self.config.success_threshold);

            if self.status.ready {
                return Ok(self.status.clone());
            }
            if self.status.consecutive_failures >= self.config.failure_threshold {
                return Err(ReadinessError::TooManyFailures(self.config.failure_threshold));
            }
            sleep(self.config.check_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn tcp_config(port: u16) -> ReadinessConfig {
        ReadinessConfig {
            check_interval: Duration::from_millis(20),
            timeout: Duration::from_secs(2),
            success_threshold: 2,
            failure_threshold: 3,
            probes: vec![ReadinessProbe {
                probe_type: ProbeType::Tcp,
                port: Some(port),
                timeout: Duration::from_millis(200),
                ..Default::default()
            }],
        }
    }

    /// Answers every request with `status` and an empty body.
    async fn http_server(status: u16) -> (u16, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {status} Status\r\ncontent-length: 0\r\nconnection: close\r\n\r\n"
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        (port, handle)
    }

    fn http_config(port: u16) -> ReadinessConfig {
        ReadinessConfig {
            probes: vec![ReadinessProbe {
                probe_type: ProbeType::Http,
                port: Some(port),
                path: Some("/health".to_string()),
                timeout: Duration::from_millis(500),
                ..Default::default()
            }],
            ..tcp_config(port)
        }
    }

    #[tokio::test]
    async fn test_http_ok_is_ready() {
        let (port, server) = http_server(200).await;

        let mut checker = ReadinessChecker::new(http_config(port));
        let status = checker.wait_for_ready().await.unwrap();
        assert!(status.ready);
        assert_eq!(status.checks_performed, 2);
        server.abort();
    }

    #[tokio::test]
    async fn test_http_server_error_fails() {
        let (port, server) = http_server(503).await;

        let mut checker = ReadinessChecker::new(http_config(port));
        let err = checker.wait_for_ready().await.unwrap_err();
        assert_eq!(err, ReadinessError::TooManyFailures(3));
        assert!(!checker.status().ready);
        server.abort();
    }

    #[tokio::test]
    async fn test_tcp_probe_ready() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let accept = tokio::spawn(async move {
            loop {
                if listener.accept().await.is_err() {
                    break;
                }
            }
        });

        let mut checker = ReadinessChecker::new(tcp_config(port));
        let status = checker.wait_for_ready().await.unwrap();
        assert!(status.ready);
        assert_eq!(status.consecutive_successes, 2);
        accept.abort();
    }

    #[tokio::test]
    async fn test_tcp_probe_gives_up() {
        // Bind then drop to get a port nobody listens on.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let mut checker = ReadinessChecker::new(tcp_config(port));
        let err = checker.wait_for_ready().await.unwrap_err();
        assert_eq!(err, ReadinessError::TooManyFailures(3));
        assert_eq!(checker.status().checks_performed, 3);
    }

    #[tokio::test]
    async fn test_overall_timeout() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = ReadinessConfig {
            timeout: Duration::from_millis(100),
            failure_threshold: u32::MAX,
            ..tcp_config(port)
        };

        let mut checker = ReadinessChecker::new(config);
        let err = checker.wait_for_ready().await.unwrap_err();
        assert_eq!(err, ReadinessError::TimedOut(Duration::from_millis(100)));
    }
}
