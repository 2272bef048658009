//! In-memory target used by the integration tests.

#![allow(dead_code)]

use std::cell::Cell;
use std::rc::Rc;

use ferrstack_core::error::{Result, StackError};
use ferrstack_core::provider::{DebugInfoSource, FrameStream, ThreadSource};
use ferrstack_core::types::{
    Address, AddressClass, BuildId, Frame, ModuleDescriptor, ModuleFiles, ModuleId, ProcessId, ScopeChain,
    SourceLocation, TargetKind, ThreadId,
};

/// Frames of one thread, optionally ending in an error.
pub struct FakeThread
{
    pub tid: ThreadId,
    pub frames: Vec<Frame>,
    pub failure: Option<String>,
    pub fails_to_start: bool,
}

/// A module with hand-written lookup tables.
pub struct FakeModule
{
    pub descriptor: ModuleDescriptor,
    pub symbols: Vec<(u64, u64, String)>,
    pub scopes: Vec<(u64, u64, ScopeChain)>,
    pub lines: Vec<(u64, u64, SourceLocation)>,
}

impl FakeModule
{
    pub fn new(id: usize, name: &str, start: u64, end: u64) -> Self
    {
        Self {
            descriptor: ModuleDescriptor {
                id: ModuleId(id),
                name: name.to_string(),
                start: Address::new(start),
                end: Address::new(end),
                class: Some(AddressClass::Elf64),
                build_id: None,
            },
            symbols: Vec::new(),
            scopes: Vec::new(),
            lines: Vec::new(),
        }
    }

    pub fn class(mut self, class: AddressClass) -> Self
    {
        self.descriptor.class = Some(class);
        self
    }

    pub fn build_id(mut self, bytes: &[u8]) -> Self
    {
        self.descriptor.build_id = Some(BuildId(bytes.to_vec()));
        self
    }

    pub fn symbol(mut self, start: u64, end: u64, name: &str) -> Self
    {
        self.symbols.push((start, end, name.to_string()));
        self
    }

    pub fn scope(mut self, start: u64, end: u64, chain: ScopeChain) -> Self
    {
        self.scopes.push((start, end, chain));
        self
    }

    pub fn line(mut self, start: u64, end: u64, location: SourceLocation) -> Self
    {
        self.lines.push((start, end, location));
        self
    }
}

/// Target whose threads and modules are plain vectors.
pub struct FakeTarget
{
    pub pid: ProcessId,
    pub kind: TargetKind,
    pub threads: Option<Vec<FakeThread>>,
    pub modules: Vec<FakeModule>,
    /// Frames handed out by all streams so far
    pub pulled: Rc<Cell<usize>>,
}

impl FakeTarget
{
    pub fn new(pid: u32) -> Self
    {
        Self {
            pid: ProcessId(pid),
            kind: TargetKind::Process,
            threads: Some(Vec::new()),
            modules: Vec::new(),
            pulled: Rc::new(Cell::new(0)),
        }
    }

    pub fn core(mut self) -> Self
    {
        self.kind = TargetKind::Core;
        self
    }

    pub fn thread(mut self, tid: u64, frames: Vec<Frame>) -> Self
    {
        self.push_thread(FakeThread {
            tid: ThreadId(tid),
            frames,
            failure: None,
            fails_to_start: false,
        });
        self
    }

    pub fn failing_thread(mut self, tid: u64, frames: Vec<Frame>, reason: &str) -> Self
    {
        self.push_thread(FakeThread {
            tid: ThreadId(tid),
            frames,
            failure: Some(reason.to_string()),
            fails_to_start: false,
        });
        self
    }

    pub fn unstartable_thread(mut self, tid: u64) -> Self
    {
        self.push_thread(FakeThread {
            tid: ThreadId(tid),
            frames: Vec::new(),
            failure: None,
            fails_to_start: true,
        });
        self
    }

    pub fn without_thread_list(mut self) -> Self
    {
        self.threads = None;
        self
    }

    pub fn module(mut self, module: FakeModule) -> Self
    {
        self.modules.push(module);
        self
    }

    fn push_thread(&mut self, thread: FakeThread)
    {
        self.threads.get_or_insert_with(Vec::new).push(thread);
    }

    fn find_module(&self, id: ModuleId) -> Option<&FakeModule>
    {
        self.modules.iter().find(|module| module.descriptor.id == id)
    }
}

fn covering<T: Clone>(table: &[(u64, u64, T)], address: Address) -> Option<T>
{
    table
        .iter()
        .find(|(start, end, _)| *start <= address.value() && address.value() < *end)
        .map(|(_, _, value)| value.clone())
}

/// Frames that are all return addresses.
pub fn return_frames(pcs: &[u64]) -> Vec<Frame>
{
    pcs.iter().map(|pc| Frame::new(Address::new(*pc), false)).collect()
}

impl ThreadSource for FakeTarget
{
    fn pid(&self) -> ProcessId
    {
        self.pid
    }

    fn kind(&self) -> TargetKind
    {
        self.kind
    }

    fn threads(&mut self) -> Result<Vec<ThreadId>>
    {
        match &self.threads {
            Some(threads) => Ok(threads.iter().map(|thread| thread.tid).collect()),
            None => Err(StackError::Unwind("cannot list threads".to_string())),
        }
    }

    fn frames(&mut self, thread: ThreadId) -> Result<FrameStream<'_>>
    {
        let found = self
            .threads
            .as_ref()
            .and_then(|threads| threads.iter().find(|candidate| candidate.tid == thread))
            .ok_or(StackError::ThreadNotFound(thread.raw()))?;
        if found.fails_to_start {
            return Err(StackError::AttachFailed(format!("thread {thread}")));
        }

        let pulled = Rc::clone(&self.pulled);
        let frames = found.frames.clone().into_iter().map(move |frame| {
            pulled.set(pulled.get() + 1);
            Ok(frame)
        });
        let failure = found
            .failure
            .clone()
            .map(|reason| Err(StackError::Unwind(reason)));
        Ok(Box::new(frames.chain(failure)))
    }
}

impl DebugInfoSource for FakeTarget
{
    fn modules(&self) -> Result<Vec<ModuleId>>
    {
        Ok(self.modules.iter().map(|module| module.descriptor.id).collect())
    }

    fn module_at(&self, address: Address) -> Option<ModuleId>
    {
        self.modules
            .iter()
            .find(|module| module.descriptor.start <= address && address < module.descriptor.end)
            .map(|module| module.descriptor.id)
    }

    fn module(&self, id: ModuleId) -> Option<ModuleDescriptor>
    {
        self.find_module(id).map(|module| module.descriptor.clone())
    }

    fn module_files(&self, id: ModuleId) -> ModuleFiles
    {
        match self.find_module(id) {
            Some(module) => ModuleFiles {
                main_file: Some(module.descriptor.name.clone().into()),
                debug_file: None,
            },
            None => ModuleFiles::default(),
        }
    }

    fn symbol_name(&self, id: ModuleId, address: Address) -> Option<String>
    {
        covering(&self.find_module(id)?.symbols, address)
    }

    fn scopes(&self, id: ModuleId, address: Address) -> Option<ScopeChain>
    {
        covering(&self.find_module(id)?.scopes, address)
    }

    fn source_line(&self, id: ModuleId, address: Address) -> Option<SourceLocation>
    {
        covering(&self.find_module(id)?.lines, address)
    }
}
