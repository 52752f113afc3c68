//! Solver loading.
//!
//! [`ModuleLoader`] is the fetch + instantiate + initialize step the module
//! cache delegates to. [`DylibLoader`] implements it for native solver
//! libraries found in a modules directory.

use std::ffi::CStr;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;

use crate::error::LoadError;
use crate::key::{Part, SolverKey};

use super::ffi::{
    self, DEFAULT_LANGUAGE, INIT_SYMBOL, InitFn, LANGUAGE_SYMBOL, LanguageFn, SOLVE_SYMBOL, SolveFn,
};

/// A loaded, initialized solver.
pub trait Solver: Send + Sync {
    /// Run the solver on `input`. `Err` carries the solver's own message.
    fn invoke(&self, input: &str) -> Result<String, String>;

    /// Source-language label shown next to results.
    fn language(&self) -> &str;
}

/// Shared reference to a cached solver.
pub type SolverHandle = Arc<dyn Solver>;

/// Produces ready-to-invoke solvers for keys.
///
/// Called from the blocking pool; may block on I/O.
pub trait ModuleLoader: Send + Sync + 'static {
    fn load(&self, key: SolverKey) -> Result<SolverHandle, LoadError>;
}

/// Platform file name for a key's artifact, e.g. `libsolution_2023_01_1.so`.
pub fn artifact_file_name(key: &SolverKey) -> PathBuf {
    PathBuf::from(libloading::library_filename(key.artifact_name()))
}

/// Loads solvers from `<modules_dir>/<artifact_file_name>`.
#[derive(Debug, Clone)]
pub struct DylibLoader {
    modules_dir: PathBuf,
}

impl DylibLoader {
    pub fn new(modules_dir: impl Into<PathBuf>) -> Self {
        Self {
            modules_dir: modules_dir.into(),
        }
    }

    pub fn modules_dir(&self) -> &Path {
        &self.modules_dir
    }

    /// Where the artifact for `key` is expected. Does not touch the filesystem.
    pub fn artifact_path(&self, key: &SolverKey) -> PathBuf {
        self.modules_dir.join(artifact_file_name(key))
    }

    /// Keys with an artifact present, for days 1-25 of the given years.
    pub fn available(&self, years: RangeInclusive<u16>) -> Vec<SolverKey> {
        let mut keys = Vec::new();
        for year in years {
            for day in 1..=25 {
                for part in Part::ALL {
                    let key = SolverKey { year, day, part };
                    if self.artifact_path(&key).is_file() {
                        keys.push(key);
                    }
                }
            }
        }
        keys
    }
}

impl ModuleLoader for DylibLoader {
    fn load(&self, key: SolverKey) -> Result<SolverHandle, LoadError> {
        let artifact = key.artifact_name();
        let path = self.artifact_path(&key);

        if !path.is_file() {
            return Err(LoadError::NotFound { artifact });
        }

        tracing::debug!("Loading solver module {}", path.display());

        // SAFETY: solver modules are trusted artifacts built for this host.
        let library = unsafe { Library::new(&path) }.map_err(|e| LoadError::Instantiate {
            artifact: artifact.clone(),
            message: e.to_string(),
        })?;

        if let Ok(init) = unsafe { library.get::<InitFn>(INIT_SYMBOL.as_bytes()) } {
            let code = unsafe { (*init)() };
            if code != 0 {
                return Err(LoadError::Init { artifact, code });
            }
        }

        let solve: SolveFn = unsafe { library.get::<SolveFn>(SOLVE_SYMBOL.as_bytes()) }
            .map(|symbol| *symbol)
            .map_err(|_| LoadError::MissingCapability {
                artifact: artifact.clone(),
                symbol: SOLVE_SYMBOL.to_string(),
            })?;

        let language = unsafe { library.get::<LanguageFn>(LANGUAGE_SYMBOL.as_bytes()) }
            .ok()
            .map(|symbol| unsafe { (*symbol)() })
            .filter(|ptr| !ptr.is_null())
            .map(|ptr| unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

        Ok(Arc::new(DylibSolver {
            solve,
            language,
            _library: library,
        }))
    }
}

/// Solver backed by a loaded dynamic library.
struct DylibSolver {
    solve: SolveFn,
    language: String,
    /// Keeps `solve` valid; dropped last.
    _library: Library,
}

impl Solver for DylibSolver {
    fn invoke(&self, input: &str) -> Result<String, String> {
        // SAFETY: `_library` outlives this call and `solve` came from it.
        unsafe { ffi::call_solve(self.solve, input) }
    }

    fn language(&self) -> &str {
        &self.language
    }
}
