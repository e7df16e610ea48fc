use chrono::{DateTime, Utc};
use software_metrics::analytics::bucketing::parse_timestamp;
use software_metrics::model::{HeadCommit, Job, Run};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: std::sync::Arc<std::sync::Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: std::sync::Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        let buf = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    /// Assert that the captured log output contains the provided substring.
    pub fn assert_contains(&self, needle: &str) {
        let out = self.output();
        assert!(
            out.contains(needle),
            "expected logs to contain `{needle}`, got:\n{out}"
        );
    }
}

struct TestWriter(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut guard = self.0.lock().unwrap();
        guard.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Sets an environment variable for the lifetime of the guard.
#[allow(dead_code)]
pub struct EnvGuard {
    key: String,
    prev: Option<String>,
}

#[allow(dead_code)]
impl EnvGuard {
    pub fn set(key: &str, val: impl AsRef<str>) -> Self {
        let prev = std::env::var(key).ok();
        unsafe { std::env::set_var(key, val.as_ref()) };
        Self {
            key: key.to_string(),
            prev,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match &self.prev {
            Some(v) => unsafe { std::env::set_var(&self.key, v) },
            None => unsafe { std::env::remove_var(&self.key) },
        }
    }
}

// -- Record builders --

#[allow(dead_code)]
pub fn ts(raw: &str) -> DateTime<Utc> {
    parse_timestamp(raw).unwrap_or_else(|| panic!("bad fixture timestamp {raw}"))
}

/// Builder for [`Run`] fixtures with sensible completed/success defaults.
#[allow(dead_code)]
pub struct RunBuilder(Run);

#[allow(dead_code)]
impl RunBuilder {
    pub fn new(id: i64, path: &str) -> Self {
        Self(Run {
            id,
            path: Some(path.into()),
            status: Some("completed".into()),
            conclusion: Some("success".into()),
            event: Some("push".into()),
            head_branch: Some("main".into()),
            html_url: Some(format!("https://ci.example/runs/{id}")),
            ..Default::default()
        })
    }

    pub fn name(mut self, name: &str) -> Self {
        self.0.name = Some(name.into());
        self
    }

    pub fn created(mut self, at: &str) -> Self {
        self.0.created_at = Some(ts(at));
        self
    }

    pub fn conclusion(mut self, conclusion: &str) -> Self {
        self.0.conclusion = Some(conclusion.into());
        self
    }

    pub fn event(mut self, event: &str) -> Self {
        self.0.event = Some(event.into());
        self
    }

    pub fn commit(mut self, sha: &str) -> Self {
        self.0.head_commit = Some(HeadCommit {
            id: Some(sha.into()),
            ..Default::default()
        });
        self
    }

    pub fn build(self) -> Run {
        self.0
    }
}

/// Builder for [`Job`] fixtures.
#[allow(dead_code)]
pub struct JobBuilder(Job);

#[allow(dead_code)]
impl JobBuilder {
    pub fn new(id: i64, run_id: i64, name: &str) -> Self {
        Self(Job {
            id,
            run_id: Some(run_id),
            name: Some(name.into()),
            status: Some("completed".into()),
            conclusion: Some("success".into()),
            ..Default::default()
        })
    }

    pub fn conclusion(mut self, conclusion: &str) -> Self {
        self.0.conclusion = Some(conclusion.into());
        self
    }

    /// Start and completion; `completed` may be empty for unfinished jobs.
    pub fn window(mut self, started: &str, completed: &str) -> Self {
        self.0.started_at = Some(ts(started));
        self.0.created_at = self.0.started_at;
        self.0.completed_at = parse_timestamp(completed);
        self
    }

    pub fn build(self) -> Job {
        self.0
    }
}

// -- Store fixtures --

#[allow(dead_code)]
pub fn fixture_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/pipeline")
}

/// Copy the pipeline fixture store into a fresh temp dir.
#[allow(dead_code)]
pub fn fixture_store() -> TempDir {
    let tmp = TempDir::new().unwrap();
    for entry in std::fs::read_dir(fixture_dir()).unwrap() {
        let entry = entry.unwrap();
        std::fs::copy(entry.path(), tmp.path().join(entry.file_name())).unwrap();
    }
    tmp
}

/// Write serialized runs and jobs into a fresh store directory.
#[allow(dead_code)]
pub fn write_store(runs: &[Run], jobs: &[Job]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    std::fs::write(
        tmp.path().join("workflows.json"),
        serde_json::to_string(runs).unwrap(),
    )
    .unwrap();
    std::fs::write(
        tmp.path().join("jobs.json"),
        serde_json::to_string(jobs).unwrap(),
    )
    .unwrap();
    tmp
}
