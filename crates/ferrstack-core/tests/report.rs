//! Tests for the run report and exit statuses

use ferrstack_core::error::StackError;
use ferrstack_core::report::{Diagnostic, ExitStatus, RunReport, UnwindScope};
use ferrstack_core::types::{Address, ThreadId};

fn ceiling_notice() -> Diagnostic
{
    Diagnostic::MaxFramesShown {
        tid: ThreadId(7),
        max: 256,
    }
}

#[test]
fn test_exit_codes()
{
    assert_eq!(ExitStatus::Ok.code(), 0);
    assert_eq!(ExitStatus::Error.code(), 1);
    assert_eq!(ExitStatus::Bad.code(), 2);
    assert_eq!(ExitStatus::Usage.code(), 64);
}

#[test]
fn test_nothing_shown_is_bad()
{
    let report = RunReport::new();
    assert_eq!(report.exit_status(), ExitStatus::Bad);

    let mut report = RunReport::new();
    report.record(&ceiling_notice());
    report.record(&ceiling_notice());
    assert_eq!(report.exit_status(), ExitStatus::Bad);
}

#[test]
fn test_frames_without_errors_is_ok()
{
    let mut report = RunReport::new();
    report.mark_frames_shown();
    report.mark_frames_shown();
    assert!(report.any_frame_shown());
    assert_eq!(report.exit_status(), ExitStatus::Ok);
}

#[test]
fn test_frames_with_errors_is_error()
{
    let mut report = RunReport::new();
    report.mark_frames_shown();
    report.record(&ceiling_notice());
    assert_eq!(report.error_count(), 1);
    assert_eq!(report.exit_status(), ExitStatus::Error);
}

#[test]
fn test_diagnostic_messages()
{
    assert_eq!(
        ceiling_notice().to_string(),
        "tid 7: shown max number of frames (256, use -n 0 for unlimited)"
    );

    let failed_at = Diagnostic::UnwindFailedAt {
        scope: UnwindScope::AllThreads,
        tid: ThreadId(7),
        pc: Address::new(0x401f),
        module: "/usr/bin/app".to_string(),
        source: StackError::MemoryRead(0x10),
    };
    assert_eq!(
        failed_at.to_string(),
        "thread_getframes tid 7 at 0x401f in /usr/bin/app: Cannot read memory at 0x10"
    );

    let failed = Diagnostic::UnwindFailed {
        scope: UnwindScope::SingleThread,
        tid: ThreadId(7),
        source: StackError::ThreadNotFound(7),
    };
    assert_eq!(failed.to_string(), "getthread_frames tid 7: No such thread: 7");

    let threads = Diagnostic::ThreadsFailed(StackError::Unwind("gone".to_string()));
    assert_eq!(threads.to_string(), "getthreads: gone");
}
