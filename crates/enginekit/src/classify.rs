//! Engine failure classification.
//!
//! Terraform and Ansible report every failure as a non-zero exit plus free
//! text. The patterns below sort that text into the root-cause categories an
//! operator can act on (credentials, network, quota, unreachable target).

use stagekit::EngineError;

/// Longest message kept from engine stderr
const MAX_MESSAGE: usize = 400;

const QUOTA: &[&str] = &[
    "quota",
    "limitexceeded",
    "limit exceeded",
    "insufficientinstancecapacity",
    "insufficient capacity",
    "skunotavailable",
    "rate exceeded",
    "toomanyrequests",
];

const CREDENTIALS: &[&str] = &[
    "no valid credential",
    "invalidclienttokenid",
    "expiredtoken",
    "expired token",
    "authorizationfailed",
    "authentication failed",
    "unauthorized",
    "access denied",
    "accessdenied",
    "could not find default credentials",
    "permission denied (publickey",
];

const UNREACHABLE: &[&str] = &[
    "unreachable!",
    "failed to connect to the host via ssh",
    "no route to host",
    "host key verification failed",
];

const NETWORK: &[&str] = &[
    "could not resolve",
    "no such host",
    "connection refused",
    "connection reset",
    "timed out",
    "timeout",
    "tls handshake",
    "network is unreachable",
    "dial tcp",
    "failed to query available provider packages",
];

/// Create an [`EngineError`] from a failed command's output text.
///
/// `command` is the command line shown to the operator when the text matches
/// no known category.
pub fn classify(command: &str, stderr: &str) -> EngineError {
    let lower = stderr.to_lowercase();
    let message = summarize(stderr);
    let matches = |patterns: &[&str]| patterns.iter().any(|p| lower.contains(p));

    if matches(QUOTA) {
        EngineError::Quota { message }
    } else if matches(CREDENTIALS) {
        EngineError::Credentials { message }
    } else if matches(UNREACHABLE) {
        EngineError::Unreachable { message }
    } else if matches(NETWORK) {
        EngineError::Network { message }
    } else {
        EngineError::CommandFailed {
            command: command.to_string(),
            stderr: message,
        }
    }
}

/// Trailing stdout lines considered when stderr names no error
const STDOUT_TAIL: usize = 40;

/// Terraform wraps diagnostics in box-drawing characters (`│ Error: ...`)
fn clean(line: &str) -> &str {
    line.trim_start_matches(['│', '╷', '╵', ' ']).trim()
}

fn is_marker(line: &str) -> bool {
    let line = clean(line);
    line.starts_with("Error:") || line.starts_with("fatal:") || line.starts_with("ERROR!")
}

/// The text to classify for a failed command.
///
/// Ansible reports task and host failures on stdout and leaves stderr empty
/// or full of warnings. When stderr holds no error line, the tail of stdout
/// is put in front of it.
pub fn failure_text(stderr: &str, stdout: &str) -> String {
    if stdout.trim().is_empty() || stderr.lines().any(is_marker) {
        return stderr.to_string();
    }
    let lines: Vec<&str> = stdout.lines().collect();
    let tail = lines[lines.len().saturating_sub(STDOUT_TAIL)..].join("\n");
    if stderr.trim().is_empty() {
        tail
    } else {
        format!("{tail}\n{stderr}")
    }
}

/// Reduce engine output to the line that names the error.
///
/// Falls back to the last non-empty line.
pub fn summarize(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().map(clean).filter(|l| !l.is_empty()).collect();

    let picked = lines
        .iter()
        .find(|l| is_marker(l))
        .or_else(|| lines.last())
        .copied()
        .unwrap_or("no error output");

    if picked.chars().count() > MAX_MESSAGE {
        let cut: String = picked.chars().take(MAX_MESSAGE).collect();
        format!("{cut}...")
    } else {
        picked.to_string()
    }
}
