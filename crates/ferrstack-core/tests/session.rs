mod common;

use common::{return_frames, FakeModule, FakeTarget};
use ferrstack_core::options::StackOptions;
use ferrstack_core::report::{ExitStatus, RunReport};
use ferrstack_core::session::StackSession;
use ferrstack_core::types::{Address, AddressClass, Frame, SourceLocation};

/// Run a session and return stdout, stderr, the report and the exit status.
fn run(options: StackOptions, target: &mut FakeTarget) -> (String, String, RunReport, ExitStatus)
{
    let mut session = StackSession::new(options, Vec::new(), Vec::new()).unwrap();
    session.run(target).unwrap();
    let status = session.report().exit_status();
    let (out, err, report) = session.into_parts();
    (String::from_utf8(out).unwrap(), String::from_utf8(err).unwrap(), report, status)
}

fn app() -> FakeModule
{
    FakeModule::new(0, "/usr/bin/app", 0x4000, 0x5000)
}

#[test]
fn test_adjusted_addresses_without_names()
{
    let mut target = FakeTarget::new(42).thread(42, return_frames(&[0x4010, 0x4020, 0x4030]));
    let (out, err, report, status) = run(StackOptions::default(), &mut target);

    assert_eq!(
        out,
        "PID 42 - process\n\
         TID 42:\n\
         #0  0x000000000000400f\n\
         #1  0x000000000000401f\n\
         #2  0x000000000000402f\n"
    );
    assert_eq!(err, "");
    assert_eq!(report.error_count(), 0);
    assert_eq!(status, ExitStatus::Ok);
}

#[test]
fn test_ceiling_reports_once()
{
    let mut target = FakeTarget::new(42).thread(42, return_frames(&[0x4010, 0x4020, 0x4030, 0x4040, 0x4050]));
    let options = StackOptions {
        max_frames: 2,
        ..StackOptions::default()
    };
    let (out, err, report, status) = run(options, &mut target);

    assert_eq!(out.lines().filter(|line| line.starts_with('#')).count(), 2);
    assert_eq!(err, "ferrstack: tid 42: shown max number of frames (2, use -n 0 for unlimited)\n");
    assert_eq!(report.error_count(), 1);
    assert!(report.any_frame_shown());
    assert_eq!(status, ExitStatus::Error);
    assert_eq!(target.pulled.get(), 2);
}

#[test]
fn test_stack_of_exactly_ceiling_frames()
{
    let mut target = FakeTarget::new(42).thread(42, return_frames(&[0x4010, 0x4020]));
    let options = StackOptions {
        max_frames: 2,
        ..StackOptions::default()
    };
    let (_, _, report, status) = run(options, &mut target);
    assert_eq!(report.error_count(), 1);
    assert_eq!(status, ExitStatus::Error);
}

#[test]
fn test_no_frames_is_bad()
{
    let mut target = FakeTarget::new(42).unstartable_thread(42).thread(43, Vec::new());
    let mut session = StackSession::new(StackOptions::default(), Vec::new(), Vec::new()).unwrap();
    session.run(&mut target).unwrap();
    assert_eq!(session.report().error_count(), 1);
    assert_eq!(session.report().exit_status(), ExitStatus::Bad);
    assert_eq!(session.report().exit_status().code(), 2);
}

#[test]
fn test_finish_explains_bad_status()
{
    let mut target = FakeTarget::new(42).thread(42, Vec::new());
    let mut session = StackSession::new(StackOptions::default(), Vec::new(), Vec::new()).unwrap();
    session.run(&mut target).unwrap();
    assert_eq!(session.finish(), ExitStatus::Bad);
}

#[test]
fn test_unwind_failure_names_last_frame()
{
    let mut target = FakeTarget::new(42)
        .module(app())
        .failing_thread(42, return_frames(&[0x4010, 0x4020]), "no unwind info")
        .thread(43, return_frames(&[0x4030]));
    let (out, err, report, status) = run(StackOptions::default(), &mut target);

    assert_eq!(
        err,
        "ferrstack: thread_getframes tid 42 at 0x401f in /usr/bin/app: no unwind info\n"
    );
    // The next thread is still shown.
    assert!(out.contains("TID 43:\n#0  0x000000000000402f\n"));
    assert_eq!(report.error_count(), 1);
    assert_eq!(status, ExitStatus::Error);
}

#[test]
fn test_unwind_failure_outside_modules()
{
    let mut target = FakeTarget::new(42).failing_thread(42, return_frames(&[0x9010]), "bad cfa");
    let (_, err, _, _) = run(StackOptions::default(), &mut target);
    assert_eq!(err, "ferrstack: thread_getframes tid 42 at 0x900f in <unknown>: bad cfa\n");
}

#[test]
fn test_unwind_failure_before_any_frame()
{
    let mut target = FakeTarget::new(42).failing_thread(42, Vec::new(), "no registers");
    let (out, err, report, status) = run(StackOptions::default(), &mut target);
    assert_eq!(out, "PID 42 - process\nTID 42:\n");
    assert_eq!(err, "ferrstack: thread_getframes tid 42: no registers\n");
    assert_eq!(report.error_count(), 1);
    assert_eq!(status, ExitStatus::Bad);
}

#[test]
fn test_thread_list_failure()
{
    let mut target = FakeTarget::new(42).without_thread_list();
    let (out, err, _, status) = run(StackOptions::default(), &mut target);
    assert_eq!(out, "PID 42 - process\n");
    assert_eq!(err, "ferrstack: getthreads: cannot list threads\n");
    assert_eq!(status, ExitStatus::Bad);
}

#[test]
fn test_one_thread_uses_process_id()
{
    let mut target = FakeTarget::new(42)
        .thread(41, return_frames(&[0x4010]))
        .thread(42, return_frames(&[0x4020]));
    let options = StackOptions {
        one_thread: true,
        ..StackOptions::default()
    };
    let (out, _, _, status) = run(options, &mut target);
    assert_eq!(out, "TID 42:\n#0  0x000000000000401f\n");
    assert_eq!(status, ExitStatus::Ok);
}

#[test]
fn test_one_thread_failure_scope()
{
    let mut target = FakeTarget::new(42).unstartable_thread(42);
    let options = StackOptions {
        one_thread: true,
        ..StackOptions::default()
    };
    let (_, err, _, _) = run(options, &mut target);
    assert_eq!(err, "ferrstack: getthread_frames tid 42: Failed to attach: thread 42\n");
}

#[test]
fn test_core_header()
{
    let mut target = FakeTarget::new(9).core().thread(9, return_frames(&[0x4010]));
    let (out, _, _, _) = run(StackOptions::default(), &mut target);
    assert!(out.starts_with("PID 9 - core\n"));
}

#[test]
fn test_verbose_frame_lines()
{
    let module = app()
        .build_id(&[0xab, 0xcd])
        .symbol(0x4000, 0x4100, "main")
        .line(0x4000, 0x4100, SourceLocation::from_file("app.c").with_line(12));
    let frames = vec![
        Frame::new(Address::new(0x4010), true),
        Frame::new(Address::new(0x4021), false),
    ];
    let mut target = FakeTarget::new(42).module(module).thread(42, frames);
    let options = StackOptions {
        show_build_id: true,
        ..StackOptions::default().verbose()
    };
    let (out, _, _, _) = run(options, &mut target);

    assert_eq!(
        out,
        "PID 42 - process\n\
         TID 42:\n\
         #0  0x0000000000004010     main - /usr/bin/app\n    \
         [abcd]@0x4000+0x10\n    \
         app.c:12\n\
         #1  0x0000000000004020 - 1 main - /usr/bin/app\n    \
         [abcd]@0x4000+0x20\n    \
         app.c:12\n"
    );
}

#[test]
fn test_address_width_of_32_bit_module()
{
    let module = app().class(AddressClass::Elf32);
    let mut target = FakeTarget::new(42).module(module).thread(42, return_frames(&[0x4010]));
    let (out, _, _, _) = run(StackOptions::default(), &mut target);
    assert!(out.contains("#0  0x0000400f\n"));
}

#[test]
fn test_inline_frames_count_against_ceiling()
{
    use ferrstack_core::types::{DieHandle, Scope, ScopeChain, ScopeTag, UnitHandle};

    let scope = |die, tag, name: &str| Scope {
        die: DieHandle(die),
        tag,
        name: Some(name.to_string()),
        call_site: None,
    };
    let chain = ScopeChain {
        unit: UnitHandle(0),
        scopes: vec![
            scope(1, ScopeTag::InlinedSubroutine, "inner"),
            scope(2, ScopeTag::InlinedSubroutine, "middle"),
            scope(3, ScopeTag::Subprogram, "outer"),
        ]
        .into(),
    };
    let mut target = FakeTarget::new(42)
        .module(app().scope(0x4000, 0x4100, chain))
        .thread(42, return_frames(&[0x4010, 0x4020]));
    let options = StackOptions {
        show_debugname: true,
        show_inlines: true,
        max_frames: 2,
        ..StackOptions::default()
    };
    let (out, err, _, status) = run(options, &mut target);

    assert_eq!(
        out,
        "PID 42 - process\n\
         TID 42:\n\
         #0  0x000000000000400f inner\n\
         #1  0x000000000000400f middle\n"
    );
    assert!(err.contains("shown max number of frames (2"));
    assert_eq!(status, ExitStatus::Error);
}

#[test]
fn test_module_map_before_stacks()
{
    let module = app().build_id(&[0x01, 0x02]);
    let mut target = FakeTarget::new(42).module(module).thread(42, return_frames(&[0x4010]));
    let options = StackOptions {
        list_modules: true,
        ..StackOptions::default()
    };
    let (out, _, _, _) = run(options, &mut target);

    assert!(out.starts_with(
        "PID 42 - process module memory map\n\
         0x0000000000004000-0x0000000000005000 app\n  \
         [0102]\n  \
         /usr/bin/app\n\
         PID 42 - process\n"
    ));
}

#[test]
fn test_unbounded_ceiling_shows_everything()
{
    let pcs: Vec<u64> = (0..3000).map(|n| 0x4010 + n * 0x10).collect();
    let mut target = FakeTarget::new(42).thread(42, return_frames(&pcs));
    let options = StackOptions {
        max_frames: 0,
        ..StackOptions::default()
    };
    let (out, err, _, status) = run(options, &mut target);
    assert_eq!(out.lines().filter(|line| line.starts_with('#')).count(), 3000);
    assert_eq!(err, "");
    assert_eq!(status, ExitStatus::Ok);
}
