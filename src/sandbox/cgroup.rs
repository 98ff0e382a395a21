use std::time;

use cgroups_rs::cgroup_builder::CgroupBuilder;
use cgroups_rs::cpuacct::CpuAcctController;
use cgroups_rs::memory::MemController;
use cgroups_rs::pid::PidController;
use cgroups_rs::{Cgroup, CgroupPid, Controller, MaxValue};
use log::{debug, error, warn};
use nix::sys::resource::{getrusage, UsageWho};
use nix::sys::signal::{kill, Signal};
use nix::sys::time::TimeVal;
use nix::unistd::Pid;

use super::request::Cmd;
use crate::CONFIG;

/// Cgroup attached to one sandboxed process tree.
///
/// Controllers the host kernel does not expose are skipped; accounting then
/// falls back to `getrusage`, which still covers single-process runs.
pub(super) struct RunCgroup {
  name: String,
  cgroup: Option<Cgroup>,
  enable_cpuacct: bool,
  enable_memory: bool,
  enable_pids: bool,
}

/// Measured usage of one run.
#[derive(Debug)]
pub(crate) struct Usage {
  /// Consumed CPU time (user + sys).
  pub time: time::Duration,

  /// Peak resident memory including swap, in bytes.
  pub memory: u64,

  /// The process count high water mark reached the configured maximum.
  pub pids_saturated: bool,
}

impl RunCgroup {
  pub fn new(cmd: &Cmd, child: Pid) -> Self {
    let parent = CONFIG.read().unwrap().sandbox.cgroup.clone();
    let name = format!("{}/{}.{}", parent, parent, child.as_raw());
    debug!("init cgroup {}", name);

    let hierarchy = cgroups_rs::hierarchies::auto();

    let enable_cpuacct = hierarchy
      .subsystems()
      .iter()
      .any(|subsystem| subsystem.controller_name() == "cpuacct");
    let enable_memory = hierarchy
      .subsystems()
      .iter()
      .any(|subsystem| subsystem.controller_name() == "memory");
    let enable_pids = hierarchy
      .subsystems()
      .iter()
      .any(|subsystem| subsystem.controller_name() == "pids");

    let builder = CgroupBuilder::new(name.as_str());
    let builder = if enable_memory {
      // A page of slack so the accounting peak can actually reach the limit
      // before the kill.
      let memory_limit = cmd.memory_limit as i64 + 4 * 1024;
      builder
        .memory()
        .memory_soft_limit(memory_limit)
        .memory_hard_limit(memory_limit)
        .memory_swap_limit(memory_limit)
        .done()
    } else {
      builder
    };
    let builder = if enable_pids {
      builder
        .pid()
        .maximum_number_of_processes(MaxValue::Value(cmd.process_limit as i64))
        .done()
    } else {
      builder
    };

    let mut supported_controller = vec![];
    if enable_cpuacct {
      supported_controller.push("cpuacct".to_string());
    }
    if enable_memory {
      supported_controller.push("memory".to_string());
    }
    if enable_pids {
      supported_controller.push("pids".to_string());
    }
    let builder = builder.set_specified_controllers(supported_controller);

    let cgroup = match builder.build(hierarchy) {
      Ok(cgroup) => cgroup,
      Err(err) => {
        error!("build cgroup fails: {}", err);
        return RunCgroup {
          name,
          cgroup: None,
          enable_cpuacct: false,
          enable_memory: false,
          enable_pids: false,
        };
      }
    };
    let task = CgroupPid::from(child.as_raw() as u64);

    if enable_cpuacct {
      if let Some(cpuacct) = cgroup.controller_of::<CpuAcctController>() {
        let _ = cpuacct.reset();
        let _ = cpuacct.add_task(&task);
      }
    }
    if enable_memory {
      if let Some(memory) = cgroup.controller_of::<MemController>() {
        let _ = memory.reset_max_usage();
        let _ = memory.add_task(&task);
      }
    }
    if enable_pids {
      if let Some(pid) = cgroup.controller_of::<PidController>() {
        let _ = pid.add_task(&task);
      }
    }

    if !enable_cpuacct {
      warn!("cgroup cpuacct is not supported");
    }
    if !enable_memory {
      warn!("cgroup memory is not supported");
    }
    if !enable_pids {
      warn!("cgroup pids is not supported");
    }

    RunCgroup {
      name,
      cgroup: Some(cgroup),
      enable_cpuacct,
      enable_memory,
      enable_pids,
    }
  }

  /// Measure the usage of the tree.
  ///
  /// Must be read before `kill_remaining`, while the peak counters still
  /// describe the run.
  pub fn usage(&self, cmd: &Cmd) -> Usage {
    let mut rusage = None;

    let is_cgroup = self.cgroup.is_some();
    let time = if is_cgroup && self.enable_cpuacct {
      let cgroup = self.cgroup.as_ref().unwrap();
      match cgroup.controller_of::<CpuAcctController>() {
        Some(cpuacct) => time::Duration::from_nanos(cpuacct.cpuacct().usage),
        None => time::Duration::ZERO,
      }
    } else {
      let usage = getrusage(UsageWho::RUSAGE_CHILDREN).ok();
      rusage = usage;
      usage.map_or(time::Duration::ZERO, |usage| {
        duration(usage.user_time()) + duration(usage.system_time())
      })
    };

    let memory = if is_cgroup && self.enable_memory {
      let cgroup = self.cgroup.as_ref().unwrap();
      match cgroup.controller_of::<MemController>() {
        Some(memory) => memory.memswap().max_usage_in_bytes,
        None => 0,
      }
    } else {
      let usage = rusage.or_else(|| getrusage(UsageWho::RUSAGE_CHILDREN).ok());
      // ru_maxrss is in kilobytes.
      usage.map_or(0, |usage| usage.max_rss() as u64 * 1024)
    };

    let pids_saturated = if is_cgroup && self.enable_pids {
      let cgroup = self.cgroup.as_ref().unwrap();
      match cgroup.controller_of::<PidController>() {
        Some(pid) => pid
          .get_pid_current()
          .map_or(false, |current| current >= cmd.process_limit),
        None => false,
      }
    } else {
      false
    };

    Usage {
      time,
      memory,
      pids_saturated,
    }
  }

  /// Kill every task still alive in the group, so no descendant of a run
  /// outlives its supervision.
  pub fn kill_remaining(&self) {
    if let Some(cgroup) = &self.cgroup {
      for task in cgroup.tasks() {
        debug!("kill leftover task {} of cgroup {}", task.pid, self.name);
        let _ = kill(Pid::from_raw(task.pid as i32), Signal::SIGKILL);
      }
    }
  }
}

impl Drop for RunCgroup {
  fn drop(&mut self) {
    if let Some(cgroup) = &self.cgroup {
      if let Err(err) = cgroup.delete() {
        warn!("delete cgroup {} fails: {}", self.name, err);
      }
    }
  }
}

fn duration(val: TimeVal) -> time::Duration {
  time::Duration::from_micros((val.tv_sec() as u64) * 1_000_000 + val.tv_usec() as u64)
}
