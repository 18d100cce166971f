//! Low-level process management.

use std::collections::BTreeMap;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};

use tracing::debug;

/// Spawn a process with piped stdout and stderr.
///
/// The environment overlay is applied on top of the inherited environment;
/// the command is executed directly, never through a shell.
pub fn spawn_process(
    argv: &[String],
    env: &BTreeMap<String, String>,
    cwd: &Path,
) -> io::Result<Child> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command"))?;
    Command::new(program)
        .args(args)
        .envs(env)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
}

/// Read a process output stream to the end on a dedicated thread.
///
/// Lines are echoed at debug level as they arrive; the joined handle
/// yields the full text. Reading concurrently with the wait is what keeps
/// a chatty child from blocking on a full pipe.
pub fn launch_stream_reader<R>(label: &'static str, stream: R) -> JoinHandle<String>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || read_stream(label, stream))
}

fn read_stream<R: Read>(label: &'static str, stream: R) -> String {
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();
    let mut text = String::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let chunk = String::from_utf8_lossy(&line);
                debug!("[{label}] {}", chunk.trim_end_matches('\n'));
                text.push_str(&chunk);
            }
        }
    }
    text
}

/// Wait for a child, draining both output streams.
///
/// Returns the exit status together with the full stdout and stderr text.
pub fn wait_with_output(mut child: Child) -> io::Result<(ExitStatus, String, String)> {
    let stdout_thread = child.stdout.take().map(|s| launch_stream_reader("stdout", s));
    let stderr_thread = child.stderr.take().map(|s| launch_stream_reader("stderr", s));

    let status = child.wait()?;

    let stdout = stdout_thread
        .and_then(|t| t.join().ok())
        .unwrap_or_default();
    let stderr = stderr_thread
        .and_then(|t| t.join().ok())
        .unwrap_or_default();

    Ok((status, stdout, stderr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_both_streams() {
        let argv = vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo out; echo err >&2".to_string(),
        ];
        let child = spawn_process(&argv, &BTreeMap::new(), Path::new(".")).unwrap();
        let (status, stdout, stderr) = wait_with_output(child).unwrap();
        assert!(status.success());
        assert_eq!(stdout, "out\n");
        assert_eq!(stderr, "err\n");
    }

    #[test]
    fn empty_argv_is_invalid_input() {
        let err = spawn_process(&[], &BTreeMap::new(), Path::new(".")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn environment_overlay_is_visible() {
        let mut env = BTreeMap::new();
        env.insert("SWEEP_TEST_VAR".to_string(), "42".to_string());
        let argv = vec![
            "sh".to_string(),
            "-c".to_string(),
            "echo $SWEEP_TEST_VAR".to_string(),
        ];
        let child = spawn_process(&argv, &env, Path::new(".")).unwrap();
        let (_, stdout, _) = wait_with_output(child).unwrap();
        assert_eq!(stdout, "42\n");
    }
}
