//! Shared test utilities for agentic integration tests.
//!
//! Provides scripted stand-ins for assistant CLIs. A [`FakeCli`] is a
//! `/bin/sh` script in its own temp directory that appends a line to a spawn
//! log every time it starts, then runs a scripted body: emit stream-json
//! lines, fail some number of times, create a plan file, or hang until
//! killed. Point the invoker at [`FakeCli::path`] as the `claude` binary.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use tempfile::TempDir;

/// Quote `s` for a POSIX shell.
pub fn sh_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Write an executable `/bin/sh` script.
pub fn write_script(path: &Path, body: &str) {
    fs::write(path, format!("#!/bin/sh\n{body}")).expect("failed to write fake script");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))
            .expect("failed to make fake script executable");
    }
}

/// A shell line that prints `line` verbatim followed by a newline.
pub fn emit(line: &str) -> String {
    format!("printf '%s\\n' {}\n", sh_quote(line))
}

/// A shell line that writes `content` to `relative` under the current
/// directory, creating parent directories.
pub fn create_file(relative: &str, content: &str) -> String {
    let parent = Path::new(relative)
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut out = String::new();
    if !parent.is_empty() {
        out.push_str(&format!("mkdir -p {}\n", sh_quote(&parent)));
    }
    out.push_str(&format!(
        "printf '%s' {} > {}\n",
        sh_quote(content),
        sh_quote(relative)
    ));
    out
}

/// A Claude stream-json `system/init` line.
pub fn init_line(session_id: &str) -> String {
    json!({"type": "system", "subtype": "init", "session_id": session_id}).to_string()
}

/// A Claude stream-json assistant text line.
pub fn assistant_line(text: &str) -> String {
    json!({
        "type": "assistant",
        "message": {"content": [{"type": "text", "text": text}]}
    })
    .to_string()
}

/// A Claude stream-json terminal `result` line.
pub fn result_line(is_error: bool, text: &str) -> String {
    json!({
        "type": "result",
        "subtype": if is_error { "error_during_execution" } else { "success" },
        "is_error": is_error,
        "result": text,
        "session_id": "fake-session",
    })
    .to_string()
}

/// Shell body that emits a complete successful transcript ending in `text`.
pub fn succeed_with(text: &str) -> String {
    let mut body = emit(&init_line("fake-session"));
    body.push_str(&emit(&assistant_line(text)));
    body.push_str(&emit(&result_line(false, text)));
    body
}

const SPAWN_LOG: &str = "spawns.log";

/// A scripted fake assistant CLI.
pub struct FakeCli {
    _dir: TempDir,
    script: PathBuf,
    spawn_log: PathBuf,
}

impl FakeCli {
    /// A fake that runs `body` after logging its spawn.
    pub fn new(body: &str) -> Self {
        Self::in_dir(fake_dir(), body)
    }

    /// Emits a successful transcript whose final text is `text`.
    pub fn succeeding(text: &str) -> Self {
        Self::new(&succeed_with(text))
    }

    /// Exits 1 (with a line on stderr) for the first `failures` spawns, then
    /// succeeds with `text`.
    pub fn failing_then_succeeding(failures: usize, text: &str) -> Self {
        let dir = fake_dir();
        let log = dir.path().join(SPAWN_LOG);
        let body = format!(
            "count=$(wc -l < {log} | tr -d ' ')\n\
             if [ \"$count\" -le {failures} ]; then\n\
             echo \"simulated failure $count\" >&2\n\
             exit 1\n\
             fi\n\
             {success}",
            log = sh_quote(&log.to_string_lossy()),
            success = succeed_with(text),
        );
        Self::in_dir(dir, &body)
    }

    /// Always exits with `code` after printing one assistant line.
    pub fn always_exit(code: i32) -> Self {
        Self::new(&format!(
            "{}echo 'upstream unavailable' >&2\nexit {code}\n",
            emit(&assistant_line("working"))
        ))
    }

    /// Emits a terminal result marked as an error.
    pub fn reporting_error(message: &str) -> Self {
        Self::new(&emit(&result_line(true, message)))
    }

    /// Exits 0 without printing anything.
    pub fn silent() -> Self {
        Self::new("exit 0\n")
    }

    /// Prints events and a truncated terminal line, then exits 0.
    pub fn malformed() -> Self {
        let mut body = emit(&assistant_line("partial"));
        body.push_str("printf '%s' '{\"type\":\"result\",\"is_er'\n");
        Self::new(&body)
    }

    /// Prints one event, then sleeps far longer than any test timeout.
    pub fn hanging() -> Self {
        let mut body = emit(&assistant_line("thinking"));
        body.push_str("sleep 30\n");
        Self::new(&body)
    }

    /// Chooses a body by a marker in the arguments (the prompt is one of
    /// them). Cases are tried in order; `fallback` runs when none match.
    pub fn routing(cases: &[(&str, String)], fallback: &str) -> Self {
        let mut body = String::from("case \"$*\" in\n");
        for (marker, branch) in cases {
            body.push_str(&format!("  *{}*)\n{branch}  ;;\n", sh_quote(marker)));
        }
        body.push_str(&format!("  *)\n{fallback}  ;;\nesac\n"));
        Self::new(&body)
    }

    fn in_dir(dir: TempDir, body: &str) -> Self {
        let script = dir.path().join("fake-assistant");
        let spawn_log = dir.path().join(SPAWN_LOG);
        let header = format!("printf '%s\\n' spawn >> {}\n", sh_quote(&spawn_log.to_string_lossy()));
        write_script(&script, &format!("{header}{body}"));
        Self {
            _dir: dir,
            script,
            spawn_log,
        }
    }

    pub fn path(&self) -> &Path {
        &self.script
    }

    /// The script path as a string, for binary configuration.
    pub fn binary(&self) -> String {
        self.script.to_string_lossy().into_owned()
    }

    /// How many times the fake has been started.
    pub fn spawns(&self) -> usize {
        fs::read_to_string(&self.spawn_log)
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }
}

fn fake_dir() -> TempDir {
    tempfile::tempdir().expect("failed to create fake cli dir")
}
