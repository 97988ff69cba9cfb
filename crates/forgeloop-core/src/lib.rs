mod bundle;
mod context;
mod controller;
mod error;
mod exec;
mod oracle;
mod outcome;

pub use bundle::{Bundle, BundleError, BundleFile, Patch};
pub use context::{RoundRecord, TaskContext, DEFAULT_MAX_ROUNDS, DEFAULT_STEP_TIMEOUT};
pub use controller::Controller;
pub use error::{OracleError, SandboxError};
pub use exec::{ExecutionBackend, ExecutionOutput};
pub use oracle::{JudgeOracle, ProposeOracle, Verdict};
pub use outcome::TaskOutcome;
