mod argv;
mod error;
mod pool;
mod process;

pub use argv::{build_argv, build_env};
pub use error::ExecError;
pub use pool::{ExecutionHandle, ExecutorPool, PoolConfig};
pub use process::{
    spawn, Completion, ProcessRequest, RunningProcess, DEFAULT_MAX_OUTPUT_BYTES, TERMINATION_GRACE,
};
