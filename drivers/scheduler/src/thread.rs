//! Thread control blocks and the callee-saved context switch (§4.6).

use alloc::boxed::Box;
use alloc::vec;
use core::arch::global_asm;
use core::sync::atomic::{AtomicPtr, AtomicU32, Ordering};

global_asm!(include_str!("asm/context_switch.s"));

extern "C" {
    fn context_switch(old: *mut ThreadContext, new: *const ThreadContext);
}

/// Kernel stack size for a created thread.
pub const STACK_SIZE: usize = 16 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tid(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Created,
    Ready,
    Running,
    Blocked,
    Dead,
}

/// The callee-saved registers plus `rsp`. `context_switch`'s asm stub
/// reads and writes these fields in this exact order.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadContext {
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub rbx: u64,
    pub rbp: u64,
    pub rsp: u64,
}

pub type Entry = extern "C" fn(usize);

/// Thread control block. Ownership is manual: `create` leaks a `Box` into
/// a raw pointer the run queue and `CURRENT` pass around, and `destroy`
/// reclaims it once the thread is `Dead`.
pub struct Tcb {
    pub tid: Tid,
    pub state: ThreadState,
    pub context: ThreadContext,
    stack: Option<Box<[u8]>>,
    entry: Entry,
    arg: usize,
    pub next: *mut Tcb,
}

static NEXT_TID: AtomicU32 = AtomicU32::new(0);
static CURRENT: AtomicPtr<Tcb> = AtomicPtr::new(core::ptr::null_mut());

fn alloc_tid() -> Tid {
    Tid(NEXT_TID.fetch_add(1, Ordering::Relaxed))
}

extern "C" fn boot_entry_unused(_arg: usize) {}

/// Wraps the thread that's already running (the boot thread) in a TCB so
/// the scheduler has somewhere to save its context on the first switch
/// away from it. Must be called once, before any other thread runs.
pub fn init_boot() {
    let tcb = Box::new(Tcb {
        tid: alloc_tid(),
        state: ThreadState::Running,
        context: ThreadContext::default(),
        stack: None,
        entry: boot_entry_unused,
        arg: 0,
        next: core::ptr::null_mut(),
    });
    let ptr = Box::into_raw(tcb);
    CURRENT.store(ptr, Ordering::Release);
    // SAFETY: `ptr` was just stored and nothing else can have read it yet.
    let tid = unsafe { (*ptr).tid };
    log::info!("threading initialized (boot thread tid={})", tid.0);
}

/// Extern "C" trampoline: the first code a freshly created thread runs.
/// `context_switch`'s `ret` pops this address off the synthetic stack
/// `create` built, which is what jumps here instead of returning to a
/// real caller.
extern "C" fn trampoline() -> ! {
    libx64::sti();
    let cur = current();
    // SAFETY: `cur` is always valid while running: it's either the boot
    // TCB or a TCB this function itself is executing inside of.
    let (entry, arg) = unsafe { ((*cur).entry, (*cur).arg) };
    entry(arg);
    // SAFETY: no one else touches `state` while this thread owns the CPU.
    unsafe {
        (*cur).state = ThreadState::Dead;
    }
    libx64::diverging_hlt();
}

/// Allocates a kernel stack and TCB for a new thread, with the stack
/// primed so the first `context_switch` into it lands in `trampoline`.
/// Returns `None` if the stack allocation fails.
pub fn create(entry: Entry, arg: usize) -> Option<*mut Tcb> {
    let mut stack = vec![0u8; STACK_SIZE].into_boxed_slice();

    // SAFETY: `stack` is `STACK_SIZE` bytes just allocated by this
    // function; the stack grows down so the top word is the last one.
    let rsp = unsafe {
        let top = stack.as_mut_ptr().add(STACK_SIZE).cast::<u64>();
        let ret_addr = top.sub(1);
        ret_addr.write(trampoline as usize as u64);
        ret_addr as u64
    };

    let tcb = Box::new(Tcb {
        tid: alloc_tid(),
        state: ThreadState::Ready,
        context: ThreadContext {
            rsp,
            ..ThreadContext::default()
        },
        stack: Some(stack),
        entry,
        arg,
        next: core::ptr::null_mut(),
    });

    let ptr = Box::into_raw(tcb);
    log::info!("created thread tid={}", unsafe { (*ptr).tid.0 });
    Some(ptr)
}

/// Frees a thread's stack and TCB.
///
/// # Safety
/// `ptr` must have come from `create`/`init_boot`, must not be reachable
/// from the run queue or `CURRENT`, and its state must be `Dead`.
pub unsafe fn destroy(ptr: *mut Tcb) {
    debug_assert!(matches!((*ptr).state, ThreadState::Dead));
    drop(Box::from_raw(ptr));
}

#[must_use]
pub fn current() -> *mut Tcb {
    CURRENT.load(Ordering::Acquire)
}

pub fn set_current(ptr: *mut Tcb) {
    CURRENT.store(ptr, Ordering::Release);
}

/// Saves `old`'s context and restores `new`'s, unless they're the same
/// thread.
///
/// # Safety
/// `old` and `new` must point at live TCBs; `new`'s context must describe
/// a runnable stack (either previously saved by this function, or primed
/// by `create`).
pub unsafe fn switch(old: *mut Tcb, new: *mut Tcb) {
    if old == new {
        return;
    }
    context_switch(&mut (*old).context, &(*new).context);
}
