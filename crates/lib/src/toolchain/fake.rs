//! In-process toolchain used by the orchestration tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{Invocation, Toolchain, ToolchainError, ToolchainOutput};
use crate::config::artifact_dir;
use crate::task::TaskPhase;

/// Records every invocation. Builds write `files` (name -> content) into the
/// cargo-style artifact directory of the triple; cleans remove the triple's
/// target directory. Triples listed in `failing` fail immediately with exit
/// code 101; everything else waits for `delay` first.
#[derive(Default)]
pub(crate) struct FakeToolchain {
  pub files: HashMap<String, Vec<(String, String)>>,
  pub failing: HashSet<String>,
  pub delay: Option<Duration>,
  pub calls: Mutex<Vec<Invocation>>,
  running: AtomicUsize,
  pub max_running: AtomicUsize,
}

impl FakeToolchain {
  pub fn new() -> Self {
    Self::default()
  }

  /// Make builds of `triple` emit a library `name` whose content is `content`.
  pub fn with_file(mut self, triple: &str, name: &str, content: &str) -> Self {
    self
      .files
      .entry(triple.to_string())
      .or_default()
      .push((name.to_string(), content.to_string()));
    self
  }

  pub fn failing(mut self, triple: &str) -> Self {
    self.failing.insert(triple.to_string());
    self
  }

  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }

  pub fn into_arc(self) -> Arc<Self> {
    Arc::new(self)
  }

  pub fn calls(&self) -> Vec<Invocation> {
    self.calls.lock().unwrap().clone()
  }

  pub fn calls_for(&self, phase: TaskPhase) -> Vec<String> {
    self
      .calls()
      .into_iter()
      .filter(|c| c.phase == phase)
      .map(|c| c.triple)
      .collect()
  }
}

#[async_trait]
impl Toolchain for FakeToolchain {
  async fn invoke(&self, invocation: &Invocation) -> Result<ToolchainOutput, ToolchainError> {
    self.calls.lock().unwrap().push(invocation.clone());

    if self.failing.contains(&invocation.triple) {
      return Err(ToolchainError::ToolchainInvocation {
        triple: invocation.triple.clone(),
        code: Some(101),
        stderr: format!("error: could not compile for {}", invocation.triple),
      });
    }

    let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
    self.max_running.fetch_max(now, Ordering::SeqCst);

    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }

    self.running.fetch_sub(1, Ordering::SeqCst);

    let dir = artifact_dir(&invocation.working_dir, &invocation.triple, invocation.release);
    match invocation.phase {
      TaskPhase::Build => {
        std::fs::create_dir_all(&dir).unwrap();
        for (name, content) in self.files.get(&invocation.triple).into_iter().flatten() {
          std::fs::write(dir.join(name), content).unwrap();
        }
      }
      TaskPhase::Clean => {
        let target_dir = invocation.working_dir.join("target").join(&invocation.triple);
        if target_dir.exists() {
          std::fs::remove_dir_all(target_dir).unwrap();
        }
      }
      TaskPhase::Collect => return Err(ToolchainError::UnsupportedPhase(TaskPhase::Collect)),
    }

    Ok(ToolchainOutput::default())
  }
}
