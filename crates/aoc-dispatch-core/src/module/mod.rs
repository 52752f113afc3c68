//! Solver modules: ABI, loading and caching.
//!
//! ```text
//! ModuleCache::ensure(key)
//!     │
//!     ├── entry present ──────────────► SolverHandle
//!     ├── load in flight ─── join ────► SolverHandle | LoadError
//!     └── start load
//!             └── ModuleLoader::load (blocking pool)
//!                     └── DylibLoader: dlopen → aoc_solver_init → aoc_solver_solve?
//! ```

mod cache;
pub mod ffi;
mod loader;

pub use cache::ModuleCache;
pub use ffi::{IntoSolution, SolveStatus};
pub use loader::{DylibLoader, ModuleLoader, Solver, SolverHandle, artifact_file_name};
