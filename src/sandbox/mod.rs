mod cgroup;
mod executor;
mod request;
mod response;

pub use {
  executor::{LinuxSandbox, Sandbox},
  request::Cmd,
  response::{ExecuteResult, Status},
};

pub(crate) use {cgroup::Usage, executor::classify};
