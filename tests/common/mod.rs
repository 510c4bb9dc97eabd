#![allow(dead_code)]

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use terminus_agent::common::config::{AgentConfig, PathsConfig};
use terminus_agent::common::error::AgentResult;
use terminus_agent::handler::context::HandlerContext;
use terminus_agent::storage::kv_store_impl::KvStoreImpl;
use terminus_agent::storage::memory::memory_store::MemoryStore;
use terminus_agent::traits::process_runner::{CommandOutput, CommandSpec, ProcessRunner};

pub const NODE: &str = "node1";

/// Records every command and answers with a canned exit status.
#[derive(Default)]
pub struct FakeRunner {
    calls: Mutex<Vec<CommandSpec>>,
    statuses: Mutex<HashMap<String, i32>>,
    panics: Mutex<Vec<String>>,
}

impl FakeRunner {
    /// Makes every invocation of `program` exit with `status`.
    pub fn set_status(&self, program: &str, status: i32) {
        self.statuses.lock().unwrap().insert(program.to_string(), status);
    }

    /// Makes every invocation of `program` panic.
    pub fn panic_on(&self, program: &str) {
        self.panics.lock().unwrap().push(program.to_string());
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls().iter().map(CommandSpec::display).collect()
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.program).collect()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl ProcessRunner for FakeRunner {
    async fn run(&self, spec: &CommandSpec) -> AgentResult<CommandOutput> {
        self.calls.lock().unwrap().push(spec.clone());
        let panics = self.panics.lock().unwrap().contains(&spec.program);
        if panics {
            panic!("{} crashed", spec.program);
        }
        let status = self
            .statuses
            .lock()
            .unwrap()
            .get(&spec.program)
            .copied()
            .unwrap_or(0);
        let stdout = match (spec.program.as_str(), status) {
            ("which", 0) => format!("/usr/bin/{}", spec.args.join(" ")),
            (_, 0) => "ok".to_string(),
            _ => String::new(),
        };
        Ok(CommandOutput {
            command: spec.display(),
            status: Some(status),
            stdout,
            stderr: if status == 0 { String::new() } else { "failed".to_string() },
        })
    }
}

pub struct TestAgent {
    pub root: TempDir,
    pub runner: Arc<FakeRunner>,
    pub ctx: HandlerContext,
}

impl TestAgent {
    pub fn new() -> Self {
        Self::with_store(Arc::new(KvStoreImpl::Memory(MemoryStore::new())), NODE)
    }

    /// A second agent on the same substrate, e.g. another node.
    pub fn with_store(store: Arc<KvStoreImpl>, node: &str) -> Self {
        let root = tempfile::tempdir().unwrap();
        let config = AgentConfig {
            node_name: node.to_string(),
            paths: PathsConfig::rooted(root.path()),
            ..Default::default()
        };
        let runner = Arc::new(FakeRunner::default());
        let ctx = HandlerContext::new(Arc::new(config), store, runner.clone());
        Self { root, runner, ctx }
    }

    pub fn paths(&self) -> &PathsConfig {
        &self.ctx.config.paths
    }

    /// Files in the proxy and supervisor config dirs.
    pub fn generated_files(&self) -> Vec<String> {
        let mut files = Vec::new();
        for dir in [self.paths().proxy_conf_dir(), self.paths().supervisor_conf_dir()] {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries {
                let entry = entry.unwrap();
                let name = entry.file_name().to_string_lossy().to_string();
                let parent = dir.file_name().unwrap().to_string_lossy().to_string();
                files.push(format!("{}/{}", parent, name));
            }
        }
        files.sort();
        files
    }

    /// Writes a package with the given manifest and a small source tree.
    pub fn package(&self, manifest: &str) -> PathBuf {
        build_package(
            self.root.path(),
            &[("manifest.json", manifest), ("wsgi.py", "application = None\n")],
        )
    }
}

/// Builds a tar.gz from `(path, content)` pairs.
pub fn build_package(dir: &Path, files: &[(&str, &str)]) -> PathBuf {
    let path = dir.join(format!("package-{}.tar.gz", uuid::Uuid::new_v4()));
    let encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, content.as_bytes()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
    path
}
