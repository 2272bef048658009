//! # Live Processes
//!
//! A running process is read through procfs and ptrace:
//!
//! - threads: `/proc/PID/task`
//! - mappings: `/proc/PID/maps`
//! - memory: `/proc/PID/mem`
//! - registers: `PTRACE_GETREGS` on a seized, interrupted thread
//!
//! A thread stays stopped only while its frames are being pulled.
//! [`StoppedThread`] detaches on drop, which resumes it.
//!
//! ## References
//!
//! - [ptrace(2) man page](https://man7.org/linux/man-pages/man2/ptrace.2.html)
//! - [proc_pid_mem(5) man page](https://man7.org/linux/man-pages/man5/proc_pid_mem.5.html)

use std::fs::{self, File};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::PathBuf;

use nix::errno::Errno;
use nix::sys::ptrace;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use tracing::{debug, trace};

use super::maps::parse_maps;
use crate::error::{Result, StackError};
use crate::symbols::Mapping;
use crate::types::{Address, Architecture, ProcessId, Registers, ThreadId};
use crate::unwind::MemoryAccess;

/// A process opened for reading.
pub(crate) struct LiveProcess
{
    pid: ProcessId,
    memory: File,
}

impl LiveProcess
{
    /// Open `/proc/PID/mem`, which checks ptrace access to the process.
    pub(crate) fn open(pid: ProcessId) -> Result<Self>
    {
        let proc_dir = PathBuf::from(format!("/proc/{pid}"));
        if !proc_dir.exists() {
            return Err(StackError::ProcessNotFound(pid.0));
        }
        let memory = File::open(proc_dir.join("mem")).map_err(|err| match err.kind() {
            io::ErrorKind::PermissionDenied => StackError::PermissionDenied(format!("cannot read memory of process {pid}")),
            io::ErrorKind::NotFound => StackError::ProcessNotFound(pid.0),
            _ => StackError::AttachFailed(format!("process {pid}: {err}")),
        })?;
        debug!(pid = pid.0, "process opened");
        Ok(Self { pid, memory })
    }

    /// Architecture of live targets, which is always the host's.
    pub(crate) fn architecture() -> Result<Architecture>
    {
        Architecture::host().ok_or_else(|| StackError::Unsupported("host architecture".to_string()))
    }

    /// Thread ids, ascending.
    pub(crate) fn threads(&self) -> Result<Vec<ThreadId>>
    {
        let mut threads = Vec::new();
        for entry in fs::read_dir(format!("/proc/{}/task", self.pid))? {
            let entry = entry?;
            if let Some(tid) = entry.file_name().to_str().and_then(|name| name.parse::<u64>().ok()) {
                threads.push(ThreadId(tid));
            }
        }
        threads.sort_unstable();
        Ok(threads)
    }

    /// File-backed mappings of the process.
    pub(crate) fn mappings(&self) -> Result<Vec<Mapping>>
    {
        let text = fs::read_to_string(format!("/proc/{}/maps", self.pid))?;
        Ok(parse_maps(&text))
    }

    /// Stop one thread and read its registers.
    pub(crate) fn stop(&self, thread: ThreadId) -> Result<ThreadMemory<'_>>
    {
        Ok(ThreadMemory {
            file: &self.memory,
            thread: StoppedThread::seize(thread)?,
        })
    }
}

/// A thread held in a ptrace stop.
pub(crate) struct StoppedThread
{
    tid: Pid,
    registers: Option<Registers>,
}

impl StoppedThread
{
    fn seize(thread: ThreadId) -> Result<Self>
    {
        let raw = i32::try_from(thread.raw()).map_err(|_| StackError::ThreadNotFound(thread.raw()))?;
        let tid = Pid::from_raw(raw);
        ptrace::seize(tid, ptrace::Options::empty()).map_err(|errno| attach_error(thread, errno))?;

        // Detached by drop from here on, whatever happens next.
        let mut stopped = Self { tid, registers: None };
        ptrace::interrupt(tid).map_err(|errno| attach_error(thread, errno))?;
        match waitpid(tid, Some(WaitPidFlag::__WALL)).map_err(|errno| attach_error(thread, errno))? {
            WaitStatus::Exited(..) | WaitStatus::Signaled(..) => return Err(StackError::ThreadNotFound(thread.raw())),
            status => trace!(?status, "thread stopped"),
        }
        stopped.registers = Some(read_registers(tid, thread)?);
        Ok(stopped)
    }
}

impl Drop for StoppedThread
{
    fn drop(&mut self)
    {
        if let Err(errno) = ptrace::detach(self.tid, None) {
            debug!(tid = self.tid.as_raw(), "detach failed: {errno}");
        }
    }
}

/// Memory of a process, read while one of its threads is stopped.
pub(crate) struct ThreadMemory<'a>
{
    file: &'a File,
    thread: StoppedThread,
}

impl ThreadMemory<'_>
{
    /// Registers captured when the thread stopped.
    pub(crate) fn registers(&self) -> Option<Registers>
    {
        self.thread.registers.clone()
    }
}

impl MemoryAccess for ThreadMemory<'_>
{
    fn read_u64(&self, address: Address) -> Result<u64>
    {
        let mut bytes = [0u8; 8];
        self.file
            .read_exact_at(&mut bytes, address.value())
            .map_err(|_| StackError::MemoryRead(address.value()))?;
        Ok(u64::from_ne_bytes(bytes))
    }
}

fn attach_error(thread: ThreadId, errno: Errno) -> StackError
{
    match errno {
        Errno::EPERM => StackError::PermissionDenied(format!("cannot ptrace thread {thread}")),
        Errno::ESRCH => StackError::ThreadNotFound(thread.raw()),
        other => StackError::AttachFailed(format!("thread {thread}: {other}")),
    }
}

#[cfg(target_arch = "x86_64")]
fn read_registers(tid: Pid, thread: ThreadId) -> Result<Registers>
{
    let regs = ptrace::getregs(tid).map_err(|errno| attach_error(thread, errno))?;
    let words = [
        regs.r15, regs.r14, regs.r13, regs.r12, regs.rbp, regs.rbx, regs.r11, regs.r10, regs.r9, regs.r8, regs.rax,
        regs.rcx, regs.rdx, regs.rsi, regs.rdi, regs.orig_rax, regs.rip, regs.cs, regs.eflags, regs.rsp, regs.ss,
        regs.fs_base, regs.gs_base, regs.ds, regs.es, regs.fs, regs.gs,
    ];
    super::regs::x86_64_registers(&words).ok_or_else(|| StackError::Unwind(format!("thread {thread}: short register set")))
}

#[cfg(not(target_arch = "x86_64"))]
fn read_registers(_tid: Pid, _thread: ThreadId) -> Result<Registers>
{
    Err(StackError::Unsupported(
        "live processes on this architecture; use a core file".to_string(),
    ))
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_own_process_threads_and_mappings()
    {
        let pid = ProcessId(std::process::id());
        let process = LiveProcess::open(pid).unwrap();

        let threads = process.threads().unwrap();
        assert!(threads.contains(&ThreadId(u64::from(pid.0))));
        assert!(threads.windows(2).all(|pair| pair[0] < pair[1]));

        let mappings = process.mappings().unwrap();
        assert!(mappings.iter().all(|mapping| mapping.path.is_absolute()));
    }

    #[test]
    fn test_missing_process()
    {
        // Above the kernel's pid_max limit.
        let result = LiveProcess::open(ProcessId(u32::MAX));
        assert!(matches!(result, Err(StackError::ProcessNotFound(_))));
    }

    #[test]
    fn test_errno_mapping()
    {
        assert!(matches!(
            attach_error(ThreadId(5), Errno::EPERM),
            StackError::PermissionDenied(_)
        ));
        assert!(matches!(attach_error(ThreadId(5), Errno::ESRCH), StackError::ThreadNotFound(5)));
        assert!(matches!(attach_error(ThreadId(5), Errno::EIO), StackError::AttachFailed(_)));
    }
}
