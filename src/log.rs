/*!

  Handles emitting debug, assert, verbose, and trace log messages. Verbosity level and trace
  registry live behind atomics/`Mutex` rather than raw `static mut`, so they're safe to touch
  from more than one call site.

*/

pub use verbosity::*;
pub use assertions::*;
pub use trace::*;

pub(crate) mod assertions {
  use std::sync::atomic::AtomicBool;

  pub(crate) static ASSERTIONS_ENABLED: AtomicBool = AtomicBool::new(true);

  /// Prints assertion violation to `stderr`.
  pub fn notify_assertion_violation(code: &str, file: &str, line: u32) {
    eprintln!(
      "ASSERTION VIOLATION\nFile: {}\nLine: {}\n{}",
      file, line, code,
    );
  }

  /// A logged assert that includes source location on failure. Guarded by the `debug`
  /// feature so release builds skip the check entirely.
  #[macro_export]
  macro_rules! log_assert {
    ($cond:expr) => {{
      #[cfg(feature = "debug")]
      {
        if $crate::log::assertions::ASSERTIONS_ENABLED.load(std::sync::atomic::Ordering::Relaxed) && !($cond) {
          $crate::log::assertions::notify_assertion_violation(stringify!($cond), file!(), line!());
        }
      }
    }};
  }

  /// A logged assert that includes source location on failure, unconditionally (not guarded
  /// by a feature flag), and panics. Used for invariants that must never fail if the rest of
  /// the crate is correct.
  #[macro_export]
  macro_rules! verify {
    ($cond:expr) => {{
      if !($cond) {
        $crate::log::assertions::notify_assertion_violation(
          format!("Failed to verify: {}", stringify!($cond)).as_str(),
          file!(),
          line!(),
        );
        panic!("failed to verify: {}", stringify!($cond));
      }
    }};
  }
}

pub(crate) mod trace {
  use std::collections::HashMap;
  use std::sync::Mutex;

  static ENABLED_TRACES: Mutex<Option<HashMap<&'static str, bool>>> = Mutex::new(None);

  fn print_trace(text: &str) {
    eprintln!("{}", text);
  }

  /// Auxiliary helper for `trace!`, do not use directly.
  pub fn trace_prefix(tag: &str, function: &str, filename: &str, line_number: u32) {
    print_trace(&format!(
      "-------- [{}] {} {}:{} ---------",
      tag, function, filename, line_number
    ));
  }

  /// Auxiliary helper for `trace!`, do not use directly.
  pub fn trace_suffix() {
    print_trace("------------------------------------------------");
  }

  pub fn is_trace_enabled(tag: &str) -> bool {
    ENABLED_TRACES
      .lock()
      .unwrap()
      .as_ref()
      .and_then(|traces| traces.get(tag).copied())
      .unwrap_or(false)
  }

  pub fn update_trace(tag: &'static str, enable: bool) {
    let mut guard = ENABLED_TRACES.lock().unwrap();
    guard.get_or_insert_with(HashMap::new).insert(tag, enable);
  }

  /// Runs `$code` and brackets it with a `[$tag]` prefix/suffix line when `$tag` tracing has
  /// been enabled with `update_trace`. A no-op (aside from the enablement check) otherwise.
  #[macro_export]
  macro_rules! trace {
    ($tag:expr, $code:expr) => {{
      if $crate::log::trace::is_trace_enabled($tag) {
        $crate::log::trace::trace_prefix($tag, "", file!(), line!());
        $code;
        $crate::log::trace::trace_suffix();
      }
    }};
  }
}

// Global control over verbose messaging.
pub(crate) mod verbosity {
  use std::sync::atomic::{AtomicI32, Ordering};

  pub(crate) static VERBOSITY: AtomicI32 = AtomicI32::new(0);

  fn verbosity_is_at_least(lvl: i32) -> bool {
    lvl >= VERBOSITY.load(Ordering::Relaxed)
  }

  pub fn set_verbosity(new_value: i32) {
    VERBOSITY.store(new_value, Ordering::Relaxed);
  }

  pub(crate) fn verbose_emit(msg: &str) {
    eprintln!("{}", msg);
  }

  pub(crate) fn log_at_level(level: i32, msg: &str) {
    if verbosity_is_at_least(level) {
      verbose_emit(msg);
    }
  }
}
