//! Helper to handle child process stdout/stderr output
//!
//! Children get piped stdout/stderr. Each pipe is drained on its own task so
//! a chatty child never blocks on a full pipe buffer; lines are forwarded to
//! tracing at debug level, tagged with the child's role.

use shared::{process_debug, ProcessId, StackRole};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;

/// Take the child's piped stdout/stderr and drain them in background tasks
pub fn spawn_output_consumers(child: &mut Child, role: StackRole) {
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(drain_lines(stdout, role, "stdout"));
    }

    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(drain_lines(stderr, role, "stderr"));
    }
}

/// Read `stream` to EOF, logging each line; returns the number of lines read.
/// Bytes that are not UTF-8 are logged lossily and never stop the drain.
pub async fn drain_lines<R>(stream: R, role: StackRole, stream_name: &'static str) -> usize
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    let mut count = 0;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                count += 1;
                let line = String::from_utf8_lossy(&buf);
                process_debug!(
                    ProcessId::current(),
                    "[{} {}] {}",
                    role,
                    stream_name,
                    line.trim_end_matches(['\r', '\n'])
                );
            }
            Err(e) => {
                process_debug!(ProcessId::current(), "[{} {}] stream closed: {}", role, stream_name, e);
                break;
            }
        }
    }

    count
}
