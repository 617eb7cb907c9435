//! Liveness probes for the readiness wait.
//!
//! Each probe finishes within the budget it is handed, including name
//! resolution and any subprocess it starts.

use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use stagekit::{Probe, Target};

use crate::command::Invocation;

/// Succeeds once a TCP connection to `host:port` opens
#[derive(Debug, Clone)]
pub struct TcpProbe {
    port: u16,
    connect_timeout: Duration,
}

impl TcpProbe {
    pub fn new(port: u16, connect_timeout: Duration) -> Self {
        Self {
            port,
            connect_timeout,
        }
    }

    /// Resolve `host`, giving up after `limit`.
    ///
    /// A lookup that overruns keeps its thread until the resolver returns.
    fn addresses(&self, host: &str, limit: Duration) -> Vec<SocketAddr> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return vec![SocketAddr::new(ip, self.port)];
        }

        let (tx, rx) = mpsc::channel();
        let query = (host.to_string(), self.port);
        thread::spawn(move || {
            let _ = tx.send(query.to_socket_addrs().map(|addrs| addrs.collect::<Vec<_>>()));
        });

        match rx.recv_timeout(limit) {
            Ok(Ok(addrs)) => addrs,
            Ok(Err(e)) => {
                log::debug!("cannot resolve {host}: {e}");
                Vec::new()
            }
            Err(_) => {
                log::debug!("resolving {host} took over {}ms", limit.as_millis());
                Vec::new()
            }
        }
    }
}

impl Probe for TcpProbe {
    fn probe(&self, target: &Target, timeout: Duration) -> bool {
        let budget = self.connect_timeout.min(timeout);
        if budget.is_zero() {
            return false;
        }
        let deadline = Instant::now() + budget;

        for addr in self.addresses(&target.host, budget) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                log::debug!("tcp probe of {target}: out of time before {addr}");
                return false;
            }
            match TcpStream::connect_timeout(&addr, remaining) {
                Ok(_) => return true,
                Err(e) => log::debug!("tcp probe {addr}: {e}"),
            }
        }
        false
    }
}

/// Succeeds once `ssh principal@host true` exits zero
#[derive(Debug, Clone)]
pub struct SshProbe {
    binary: PathBuf,
    port: u16,
    identity: Option<PathBuf>,
    connect_timeout: Duration,
}

impl SshProbe {
    pub fn new(port: u16, connect_timeout: Duration) -> Self {
        Self {
            binary: PathBuf::from("ssh"),
            port,
            identity: None,
            connect_timeout,
        }
    }

    pub fn with_identity(mut self, identity: impl Into<PathBuf>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn invocation(&self, target: &Target, timeout: Duration) -> Invocation {
        // ssh only takes whole seconds
        let seconds = self.connect_timeout.min(timeout).as_secs().max(1);
        let mut invocation = Invocation::new(&self.binary).args([
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={seconds}"),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-p".to_string(),
            self.port.to_string(),
        ]);
        if let Some(identity) = &self.identity {
            invocation = invocation.arg("-i").arg(identity);
        }
        invocation.arg(target.to_string()).arg("true")
    }
}

impl Probe for SshProbe {
    /// The whole ssh process, authentication included, is killed once
    /// `timeout` runs out.
    fn probe(&self, target: &Target, timeout: Duration) -> bool {
        if timeout.is_zero() {
            return false;
        }
        match self.invocation(target, timeout).status_within(timeout) {
            Ok(Some(status)) => status.success(),
            Ok(None) => {
                log::debug!("ssh probe of {target} killed after {}ms", timeout.as_millis());
                false
            }
            Err(e) => {
                log::debug!("ssh probe: {e}");
                false
            }
        }
    }
}
