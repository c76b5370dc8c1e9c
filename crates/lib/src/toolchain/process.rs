//! Ownership of a toolchain's whole process tree.
//!
//! cargo runs rustc, build scripts and linkers as its own children, so
//! killing the cargo process alone leaves them running. Each invocation is
//! started in a new process group (unix) or assigned to a job object
//! (Windows), and [`ProcessTree`] kills the group when it is dropped before
//! the toolchain finished.

use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Prepare `command` so that its descendants can be killed together.
pub(crate) fn isolate(command: &mut Command) {
  #[cfg(unix)]
  command.process_group(0);
  #[cfg(not(unix))]
  let _ = command;
}

/// Kills every process of a spawned toolchain when dropped.
///
/// Call [`ProcessTree::release`] once the toolchain exited on its own.
#[derive(Debug)]
pub(crate) struct ProcessTree {
  #[cfg(unix)]
  group: Option<rustix::process::Pid>,
  #[cfg(windows)]
  job: Option<windows::Job>,
}

impl ProcessTree {
  pub(crate) fn attach(child: &Child) -> Self {
    #[cfg(unix)]
    {
      // process_group(0) makes the child the leader of a group with its own pid
      let group = child
        .id()
        .and_then(|pid| i32::try_from(pid).ok())
        .and_then(rustix::process::Pid::from_raw);
      Self { group }
    }
    #[cfg(windows)]
    {
      let job = match windows::Job::assign(child) {
        Ok(job) => Some(job),
        Err(e) => {
          warn!(error = %e, "could not place toolchain in a job object");
          None
        }
      };
      Self { job }
    }
    #[cfg(not(any(unix, windows)))]
    {
      let _ = child;
      Self {}
    }
  }

  /// Forget the tree without killing it.
  pub(crate) fn release(mut self) {
    #[cfg(unix)]
    {
      self.group = None;
    }
    #[cfg(windows)]
    {
      // Closing the job still ends stray processes left in it
      self.job = None;
    }
  }
}

impl Drop for ProcessTree {
  fn drop(&mut self) {
    #[cfg(unix)]
    if let Some(group) = self.group.take() {
      use rustix::process::{Signal, kill_process_group};

      match kill_process_group(group, Signal::KILL) {
        Ok(()) => debug!(pgid = group.as_raw_nonzero().get(), "killed toolchain process group"),
        // The group already exited
        Err(e) if e == rustix::io::Errno::SRCH => {}
        Err(e) => warn!(error = %e, "failed to kill toolchain process group"),
      }
    }
  }
}

#[cfg(windows)]
mod windows {
  use std::io;

  use tokio::process::Child;
  use windows_sys::Win32::Foundation::{CloseHandle, HANDLE};
  use windows_sys::Win32::System::JobObjects::{
    AssignProcessToJobObject, CreateJobObjectW, JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE,
    JOBOBJECT_EXTENDED_LIMIT_INFORMATION, JobObjectExtendedLimitInformation, SetInformationJobObject,
  };

  /// A job object that kills its processes when the last handle closes.
  #[derive(Debug)]
  pub(super) struct Job(HANDLE);

  // SAFETY: a job handle is a kernel object handle usable from any thread.
  unsafe impl Send for Job {}
  unsafe impl Sync for Job {}

  impl Job {
    pub(super) fn assign(child: &Child) -> io::Result<Self> {
      let process = child
        .raw_handle()
        .ok_or_else(|| io::Error::other("toolchain process already exited"))?;

      // SAFETY: null attributes and name create an anonymous job object.
      let handle = unsafe { CreateJobObjectW(std::ptr::null(), std::ptr::null()) };
      if handle.is_null() {
        return Err(io::Error::last_os_error());
      }
      let job = Job(handle);

      // SAFETY: the limit struct is plain data, valid when zero-initialized,
      // and outlives the call.
      let configured = unsafe {
        let mut limits: JOBOBJECT_EXTENDED_LIMIT_INFORMATION = std::mem::zeroed();
        limits.BasicLimitInformation.LimitFlags = JOB_OBJECT_LIMIT_KILL_ON_JOB_CLOSE;
        SetInformationJobObject(
          job.0,
          JobObjectExtendedLimitInformation,
          &limits as *const _ as *const core::ffi::c_void,
          std::mem::size_of::<JOBOBJECT_EXTENDED_LIMIT_INFORMATION>() as u32,
        )
      };
      if configured == 0 {
        return Err(io::Error::last_os_error());
      }

      // SAFETY: both handles are valid for the duration of the call.
      if unsafe { AssignProcessToJobObject(job.0, process as HANDLE) } == 0 {
        return Err(io::Error::last_os_error());
      }

      Ok(job)
    }
  }

  impl Drop for Job {
    fn drop(&mut self) {
      // SAFETY: the handle came from CreateJobObjectW and is closed once.
      unsafe {
        CloseHandle(self.0);
      }
    }
  }
}
