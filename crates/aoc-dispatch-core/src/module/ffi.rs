//! C ABI shared by the host and solver modules.
//!
//! A solver module is a `cdylib` exporting:
//!
//! | symbol | signature | required |
//! |---|---|---|
//! | `aoc_solver_init` | `fn() -> i32` | no (0 = ok) |
//! | `aoc_solver_solve` | `fn(*const u8, usize, *mut *mut u8, *mut usize) -> i32` | yes |
//! | `aoc_solver_language` | `fn() -> *const c_char` | no |
//!
//! Output buffers are allocated with `malloc` by the module and released
//! with `free` by the host. Solver crates normally get all of this from
//! [`export_solver!`](crate::export_solver).

use std::any::Any;
use std::fmt::Display;
use std::os::raw::c_char;
use std::panic::{self, AssertUnwindSafe};

/// Optional initialization entry point.
pub const INIT_SYMBOL: &str = "aoc_solver_init";
/// Required invocation entry point.
pub const SOLVE_SYMBOL: &str = "aoc_solver_solve";
/// Optional source-language label.
pub const LANGUAGE_SYMBOL: &str = "aoc_solver_language";

/// Label used when a module does not export [`LANGUAGE_SYMBOL`].
pub const DEFAULT_LANGUAGE: &str = "Rust";

pub type InitFn = unsafe extern "C" fn() -> i32;
pub type SolveFn = unsafe extern "C" fn(*const u8, usize, *mut *mut u8, *mut usize) -> i32;
pub type LanguageFn = unsafe extern "C" fn() -> *const c_char;

/// Status code returned by `aoc_solver_solve`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum SolveStatus {
    /// Output holds the answer.
    Success = 0,
    /// Input was rejected before solving (e.g. not UTF-8).
    InvalidInput = -1,
    /// Solver returned an error; output holds the message.
    SolverError = -2,
    /// Solver panicked; output holds the panic message.
    Panic = -4,
}

impl From<i32> for SolveStatus {
    fn from(code: i32) -> Self {
        match code {
            0 => Self::Success,
            -1 => Self::InvalidInput,
            -4 => Self::Panic,
            _ => Self::SolverError,
        }
    }
}

/// RAII guard for module-allocated output.
struct FfiMemoryGuard {
    ptr: *mut u8,
}

impl FfiMemoryGuard {
    unsafe fn new(ptr: *mut u8) -> Self {
        Self { ptr }
    }

    fn as_slice(&self, len: usize) -> &[u8] {
        if self.ptr.is_null() || len == 0 {
            return &[];
        }
        unsafe { std::slice::from_raw_parts(self.ptr, len) }
    }
}

impl Drop for FfiMemoryGuard {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe {
                libc::free(self.ptr as *mut libc::c_void);
            }
        }
    }
}

/// Call a module's solve entry point and translate its status code.
///
/// # Safety
///
/// `solve` must point into a library that is still loaded and follow the
/// module ABI above.
pub(crate) unsafe fn call_solve(solve: SolveFn, input: &str) -> Result<String, String> {
    let mut out_ptr: *mut u8 = std::ptr::null_mut();
    let mut out_len: usize = 0;

    let code = unsafe { solve(input.as_ptr(), input.len(), &mut out_ptr, &mut out_len) };

    let guard = unsafe { FfiMemoryGuard::new(out_ptr) };
    let text = String::from_utf8_lossy(guard.as_slice(out_len)).into_owned();

    match SolveStatus::from(code) {
        SolveStatus::Success => Ok(text),
        SolveStatus::InvalidInput => Err(format!("invalid input: {}", text)),
        SolveStatus::SolverError => Err(text),
        SolveStatus::Panic => Err(format!("solver panicked: {}", text)),
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Return values a solver function may produce.
pub trait IntoSolution {
    fn into_solution(self) -> Result<String, String>;
}

impl IntoSolution for String {
    fn into_solution(self) -> Result<String, String> {
        Ok(self)
    }
}

impl<T: Display, E: Display> IntoSolution for Result<T, E> {
    fn into_solution(self) -> Result<String, String> {
        self.map(|v| v.to_string()).map_err(|e| e.to_string())
    }
}

/// Module-side body of `aoc_solver_solve`, used by [`export_solver!`](crate::export_solver).
///
/// # Safety
///
/// `input_ptr` must be valid for `input_len` bytes; `out_ptr` and `out_len`
/// must be valid for writes.
pub unsafe fn run_exported<F, R>(
    input_ptr: *const u8,
    input_len: usize,
    out_ptr: *mut *mut u8,
    out_len: *mut usize,
    solve: F,
) -> i32
where
    F: FnOnce(&str) -> R,
    R: IntoSolution,
{
    if out_ptr.is_null() || out_len.is_null() {
        return SolveStatus::InvalidInput as i32;
    }

    let bytes: &[u8] = if input_ptr.is_null() || input_len == 0 {
        &[]
    } else {
        unsafe { std::slice::from_raw_parts(input_ptr, input_len) }
    };

    let (status, text) = match std::str::from_utf8(bytes) {
        Err(e) => (
            SolveStatus::InvalidInput,
            format!("input is not valid UTF-8: {}", e),
        ),
        Ok(input) => {
            match panic::catch_unwind(AssertUnwindSafe(|| solve(input).into_solution())) {
                Ok(Ok(answer)) => (SolveStatus::Success, answer),
                Ok(Err(message)) => (SolveStatus::SolverError, message),
                Err(payload) => (SolveStatus::Panic, panic_message(&*payload)),
            }
        }
    };

    unsafe { write_output(text.as_bytes(), out_ptr, out_len) };
    status as i32
}

/// Copy `bytes` into a fresh `malloc` buffer handed to the host.
unsafe fn write_output(bytes: &[u8], out_ptr: *mut *mut u8, out_len: *mut usize) {
    let buf = unsafe { libc::malloc(bytes.len().max(1)) } as *mut u8;
    if buf.is_null() {
        unsafe {
            *out_ptr = std::ptr::null_mut();
            *out_len = 0;
        }
        return;
    }
    unsafe {
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), buf, bytes.len());
        *out_ptr = buf;
        *out_len = bytes.len();
    }
}

/// Export a solver function with the module ABI.
///
/// ```ignore
/// fn solve(input: &str) -> String {
///     input.lines().count().to_string()
/// }
///
/// aoc_dispatch_core::export_solver!(solve, "Rust");
/// ```
#[macro_export]
macro_rules! export_solver {
    ($solve:path) => {
        $crate::export_solver!($solve, "Rust");
    };
    ($solve:path, $language:literal) => {
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn aoc_solver_solve(
            input_ptr: *const u8,
            input_len: usize,
            out_ptr: *mut *mut u8,
            out_len: *mut usize,
        ) -> i32 {
            unsafe {
                $crate::module::ffi::run_exported(input_ptr, input_len, out_ptr, out_len, $solve)
            }
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn aoc_solver_language() -> *const ::std::os::raw::c_char {
            concat!($language, "\0").as_ptr() as *const ::std::os::raw::c_char
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer(input: &str) -> String {
        input.trim().len().to_string()
    }

    fn failing(_input: &str) -> Result<u64, String> {
        Err("no path through the maze".to_string())
    }

    fn panicking(_input: &str) -> String {
        panic!("index out of bounds")
    }

    unsafe extern "C" fn answer_entry(
        input_ptr: *const u8,
        input_len: usize,
        out_ptr: *mut *mut u8,
        out_len: *mut usize,
    ) -> i32 {
        unsafe { run_exported(input_ptr, input_len, out_ptr, out_len, answer) }
    }

    unsafe extern "C" fn failing_entry(
        input_ptr: *const u8,
        input_len: usize,
        out_ptr: *mut *mut u8,
        out_len: *mut usize,
    ) -> i32 {
        unsafe { run_exported(input_ptr, input_len, out_ptr, out_len, failing) }
    }

    unsafe extern "C" fn panicking_entry(
        input_ptr: *const u8,
        input_len: usize,
        out_ptr: *mut *mut u8,
        out_len: *mut usize,
    ) -> i32 {
        unsafe { run_exported(input_ptr, input_len, out_ptr, out_len, panicking) }
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(SolveStatus::from(0), SolveStatus::Success);
        assert_eq!(SolveStatus::from(-1), SolveStatus::InvalidInput);
        assert_eq!(SolveStatus::from(-4), SolveStatus::Panic);
        assert_eq!(SolveStatus::from(-99), SolveStatus::SolverError);
    }

    #[test]
    fn test_call_solve_success() {
        let result = unsafe { call_solve(answer_entry, "abc\n") };
        assert_eq!(result, Ok("3".to_string()));
    }

    #[test]
    fn test_call_solve_reports_solver_error() {
        let result = unsafe { call_solve(failing_entry, "") };
        assert_eq!(result, Err("no path through the maze".to_string()));
    }

    #[test]
    fn test_call_solve_contains_panic() {
        let result = unsafe { call_solve(panicking_entry, "x") };
        let message = result.unwrap_err();
        assert!(message.starts_with("solver panicked"));
        assert!(message.contains("index out of bounds"));
    }

    #[test]
    fn test_panic_message_payloads() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("boom"));
        assert_eq!(panic_message(&*owned), "boom");

        let other: Box<dyn Any + Send> = Box::new(42u32);
        assert_eq!(panic_message(&*other), "unknown panic");
    }
}
