use std::{
  collections::HashMap,
  ffi::CString,
  fs,
  io::{self, Read},
  os::unix::io::RawFd,
  path::{Path, PathBuf},
  thread, time,
};

use async_trait::async_trait;
use log::{debug, error, info, warn};
use nix::fcntl::{open, OFlag};
use nix::libc;
use nix::mount::{mount, MsFlags};
use nix::sched::{unshare, CloneFlags};
use nix::sys::resource::{setrlimit, Resource};
use nix::sys::signal::{kill, Signal};
use nix::sys::stat::Mode;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{alarm, chdir, chroot, close, dup2, execvpe, fork, write, ForkResult};
use thiserror::Error;

use super::cgroup::{RunCgroup, Usage};
use super::request::Cmd;
use super::response::{ExecuteResult, Status};
use crate::{file, CONFIG};

const STDIN_NAME: &str = ".stdin";
const STDOUT_NAME: &str = ".stdout";
const STDERR_NAME: &str = ".stderr";
const SETUP_ERROR_NAME: &str = ".setup_error";

/// How often the supervisor polls a still running child.
const POLL_INTERVAL: time::Duration = time::Duration::from_millis(10);

/// Executes commands in an isolated environment.
///
/// The trait is the seam between judging logic and the isolation technology;
/// swapping namespaces and cgroups for another mechanism only needs a new
/// implementation here.
#[async_trait]
pub trait Sandbox: Send + Sync {
  /// Run one command to completion.
  ///
  /// Never fails: problems with the sandbox itself come back as results
  /// with `Status::InternalError`, so they can never be confused with a
  /// failure of the command under test.
  async fn run(&self, cmd: Cmd) -> ExecuteResult;
}

/// Process based sandbox backed by namespaces, rlimits and cgroups.
#[derive(Debug, Default)]
pub struct LinuxSandbox;

#[async_trait]
impl Sandbox for LinuxSandbox {
  async fn run(&self, cmd: Cmd) -> ExecuteResult {
    match tokio::task::spawn_blocking(move || run_blocking(cmd)).await {
      Ok(res) => res,
      Err(err) => ExecuteResult::internal_error(&format!("sandbox task panicked: {}", err)),
    }
  }
}

#[derive(Debug, Error)]
pub(super) enum SetupError {
  #[error("io error: {0}")]
  Io(#[from] io::Error),

  #[error("os error: {0}")]
  Os(#[from] nix::Error),

  #[error("bad string in request: {0}")]
  BadString(#[from] std::ffi::NulError),
}

fn run_blocking(cmd: Cmd) -> ExecuteResult {
  match supervise(&cmd) {
    Ok(res) => res,
    Err(err) => {
      error!("sandbox setup failed: {}", err);
      ExecuteResult::internal_error(&format!("sandbox setup failed: {}", err))
    }
  }
}

/// Isolation settings snapshotted before the fork, so the child never has
/// to touch the config lock.
struct Isolation {
  chroot: bool,
  mounts: Vec<String>,
  wall_limit: time::Duration,
}

fn supervise(cmd: &Cmd) -> Result<ExecuteResult, SetupError> {
  if cmd.args.is_empty() {
    return Ok(ExecuteResult::internal_error("empty command"));
  }

  let scratch = tempfile::Builder::new().prefix("arbiter-run-").tempdir()?;

  stage(cmd, scratch.path())?;

  let stdin_fd = if cmd.stdin.is_some() {
    open(
      &scratch.path().join(STDIN_NAME),
      OFlag::O_RDONLY,
      Mode::empty(),
    )?
  } else {
    open(Path::new("/dev/null"), OFlag::O_RDONLY, Mode::empty())?
  };
  let stdout_fd = open(
    &scratch.path().join(STDOUT_NAME),
    OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC,
    Mode::from_bits_truncate(0o644),
  )?;
  let stderr_fd = open(
    &scratch.path().join(STDERR_NAME),
    OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC,
    Mode::from_bits_truncate(0o644),
  )?;

  let isolation = {
    let c = CONFIG.read().unwrap();
    Isolation {
      chroot: c.sandbox.chroot,
      mounts: c.sandbox.mounts.clone(),
      wall_limit: cmd.time_limit * 2 + c.sandbox.wall_clock_margin,
    }
  };

  let start = time::Instant::now();
  match unsafe { fork() }? {
    ForkResult::Child => child(cmd, &isolation, scratch.path(), stdin_fd, stdout_fd, stderr_fd),
    ForkResult::Parent { child, .. } => {
      info!("start supervising child process (pid = {})", child);

      let _ = close(stdin_fd);
      let _ = close(stdout_fd);
      let _ = close(stderr_fd);

      let cgroup = RunCgroup::new(cmd, child);

      let wall_limit = isolation.wall_limit;
      let mut wall_killed = false;
      let (status, signal) = loop {
        let wait = match waitpid(child, Some(WaitPidFlag::WNOHANG)) {
          Ok(wait) => wait,
          Err(err) => {
            let _ = kill(child, Signal::SIGKILL);
            cgroup.kill_remaining();
            return Err(err.into());
          }
        };
        match wait {
          WaitStatus::StillAlive => {
            if !wall_killed && start.elapsed() >= wall_limit {
              warn!(
                "child process #{}. exceeded the wall clock ceiling {:?}",
                child, wall_limit
              );
              wall_killed = true;
              let _ = kill(child, Signal::SIGKILL);
              cgroup.kill_remaining();
            }
            thread::sleep(POLL_INTERVAL);
          }
          WaitStatus::Exited(pid, status) => {
            info!("child process #{}. exited with status {}", pid, status);
            break (Some(status), None);
          }
          WaitStatus::Signaled(pid, signal, _) => {
            info!("child process #{}. is signaled by {}", pid, signal);
            break (None, Some(signal));
          }
          _ => {}
        }
      };

      let wall_time = start.elapsed();
      // Peaks must be read before the stragglers are killed and the group
      // torn down.
      let usage = cgroup.usage(cmd);
      cgroup.kill_remaining();
      debug!("usage of child process #{}.: {:?}", child, usage);

      let setup_error = read_capped(&scratch.path().join(SETUP_ERROR_NAME), 4096);
      if !setup_error.is_empty() {
        return Ok(ExecuteResult::internal_error(&String::from_utf8_lossy(
          &setup_error,
        )));
      }

      let stdout = read_capped(&scratch.path().join(STDOUT_NAME), cmd.stdout_limit);
      let stderr = read_capped(&scratch.path().join(STDERR_NAME), cmd.stderr_limit);

      let mut files = HashMap::new();
      for name in &cmd.copy_out {
        match fs::read(scratch.path().join(name)) {
          Ok(content) => {
            files.insert(name.clone(), content);
          }
          Err(err) => debug!("copy out file {} is missing: {}", name, err),
        }
      }

      Ok(ExecuteResult {
        status: classify(status, signal, &usage, cmd, wall_killed),
        time: usage.time,
        wall_time,
        memory: usage.memory,
        exit_code: status.unwrap_or(-1),
        stdout,
        stderr,
        files,
      })
    }
  }
}

/// Map the reaped wait status and the measured usage onto a run status.
///
/// Limit checks win over the raw exit reason: a process killed while over a
/// limit is reported as that limit, whatever signal took it down.
pub(crate) fn classify(
  exit: Option<i32>,
  signal: Option<Signal>,
  usage: &Usage,
  cmd: &Cmd,
  wall_killed: bool,
) -> Status {
  if wall_killed
    || usage.time >= cmd.time_limit
    || matches!(
      signal,
      Some(Signal::SIGXCPU) | Some(Signal::SIGALRM) | Some(Signal::SIGVTALRM)
    )
  {
    return Status::TimeLimitExceeded;
  }
  if usage.memory >= cmd.memory_limit {
    return Status::MemoryLimitExceeded;
  }
  if usage.pids_saturated {
    return Status::ProcessLimitExceeded;
  }
  if signal.is_some() {
    return Status::Signalled;
  }
  if exit != Some(0) {
    return Status::NonZeroExitStatus;
  }
  return Status::Accepted;
}

/// Copy the request files into the fresh scratch directory.
fn stage(cmd: &Cmd, scratch: &Path) -> io::Result<()> {
  for (name, file) in &cmd.copy_in {
    let dst = scratch.join(name);
    match file {
      // fs::copy carries the permission bits along, which keeps a staged
      // artifact executable.
      file::File::Path(src) => {
        fs::copy(src, &dst)?;
      }
      file::File::Memory(content) => fs::write(&dst, content)?,
    }
  }
  if let Some(stdin) = &cmd.stdin {
    let dst = scratch.join(STDIN_NAME);
    match stdin {
      file::File::Path(src) => {
        fs::copy(src, &dst)?;
      }
      file::File::Memory(content) => fs::write(&dst, content)?,
    }
  }
  Ok(())
}

fn read_capped(path: &Path, limit: u64) -> Vec<u8> {
  let mut content = vec![];
  if let Ok(file) = fs::File::open(path) {
    let _ = file.take(limit).read_to_end(&mut content);
  }
  content
}

fn child(
  cmd: &Cmd,
  isolation: &Isolation,
  scratch: &Path,
  stdin_fd: RawFd,
  stdout_fd: RawFd,
  stderr_fd: RawFd,
) -> ! {
  if let Err(err) = child_setup(cmd, isolation, scratch, stdin_fd, stdout_fd, stderr_fd) {
    // Reported through the scratch directory: the parent turns a non-empty
    // setup error file into an internal error, never into a verdict.
    let message = format!("sandbox child setup failed: {}", err);
    let _ = fs::write(SETUP_ERROR_NAME, &message);
    let _ = write(libc::STDERR_FILENO, message.as_bytes());
    unsafe { libc::_exit(126) };
  }
  unsafe { libc::_exit(127) };
}

fn child_setup(
  cmd: &Cmd,
  isolation: &Isolation,
  scratch: &Path,
  stdin_fd: RawFd,
  stdout_fd: RawFd,
  stderr_fd: RawFd,
) -> Result<std::convert::Infallible, SetupError> {
  // The scratch directory is the working directory of every run; with
  // chroot enabled it also becomes the root.
  chdir(scratch)?;

  dup2(stdin_fd, libc::STDIN_FILENO)?;
  dup2(stdout_fd, libc::STDOUT_FILENO)?;
  dup2(stderr_fd, libc::STDERR_FILENO)?;
  close(stdin_fd)?;
  close(stdout_fd)?;
  close(stderr_fd)?;

  // Network is off unconditionally. Unprivileged hosts reach the namespace
  // through a fresh user namespace; a kernel that can give us neither fails
  // the whole run instead of running unisolated.
  if unshare(CloneFlags::CLONE_NEWUSER | CloneFlags::CLONE_NEWNET).is_err() {
    unshare(CloneFlags::CLONE_NEWNET)?;
  }

  if isolation.chroot {
    seal_root(scratch, &isolation.mounts)?;
  }

  set_resource_limit(cmd)?;
  set_alarm(isolation.wall_limit);

  let program = into_c_string(&cmd.args[0])?;
  let args = cmd
    .args
    .iter()
    .map(|a| into_c_string(a))
    .collect::<Result<Vec<CString>, _>>()?;
  let env = cmd
    .env
    .iter()
    .map(|e| into_c_string(e))
    .collect::<Result<Vec<CString>, _>>()?;

  return Ok(execvpe(&program, args.as_slice(), env.as_slice())?);
}

/// Make the scratch directory the root of the child, with the configured
/// toolchain directories bound read-only inside it.
///
/// The child then sees its own files, the interpreter or runtime it needs,
/// and nothing else of the host.
fn seal_root(new_root: &Path, mounts: &[String]) -> Result<(), SetupError> {
  unshare(CloneFlags::CLONE_NEWNS)?;

  mount::<Path, Path, Path, Path>(
    Some(new_root),
    new_root,
    None,
    MsFlags::MS_BIND | MsFlags::MS_REC,
    None,
  )?;

  for mount_point in mounts {
    let src = Path::new(mount_point);
    if !src.is_dir() {
      continue;
    }
    let target = match src.strip_prefix("/") {
      Ok(stripped) => new_root.join(stripped),
      Err(_) => continue,
    };
    fs::create_dir_all(&target)?;

    mount::<Path, PathBuf, Path, Path>(
      Some(src),
      &target,
      None,
      MsFlags::MS_BIND | MsFlags::MS_REC,
      None,
    )?;
    mount::<Path, PathBuf, Path, Path>(
      None,
      &target,
      None,
      MsFlags::MS_BIND | MsFlags::MS_REMOUNT | MsFlags::MS_RDONLY | MsFlags::MS_REC,
      None,
    )?;
  }

  chroot(new_root)?;
  chdir(Path::new("/"))?;

  Ok(())
}

/// Set the rlimits of the child.
fn set_resource_limit(cmd: &Cmd) -> Result<(), SetupError> {
  let cpu = (cmd.time_limit.as_secs_f64()).ceil() as u64;
  setrlimit(Resource::RLIMIT_CPU, cpu + 1, cpu + 1)?;

  // The address space stays unlimited; memory is enforced by the cgroup so
  // the true peak can still be measured.
  setrlimit(
    Resource::RLIMIT_AS,
    libc::RLIM_INFINITY,
    libc::RLIM_INFINITY,
  )?;

  setrlimit(
    Resource::RLIMIT_STACK,
    libc::RLIM_INFINITY,
    libc::RLIM_INFINITY,
  )?;

  let fsize = 256 * 1024 * 1024 as u64;
  setrlimit(Resource::RLIMIT_FSIZE, fsize, fsize)?;

  Ok(())
}

/// Arm the wall clock alarm of the child.
///
/// The supervisor polls with the same ceiling, so a program that blocks
/// SIGALRM still gets collected in bounded real time.
fn set_alarm(wall_limit: time::Duration) {
  let wall = wall_limit.as_secs().max(1) as libc::c_uint;
  alarm::set(wall);
}

fn into_c_string(s: &str) -> Result<CString, std::ffi::NulError> {
  CString::new(s)
}
