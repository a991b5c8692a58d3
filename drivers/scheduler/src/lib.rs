//! Cooperative round-robin thread scheduler (§4.6): a FIFO run queue, an
//! idle thread that only ever runs when the queue is empty, and a
//! 5-step `schedule` that is the only place a context switch happens.

#![no_std]

extern crate alloc;

pub mod runqueue;
pub mod thread;

use kcore::klazy;
use kcore::sync::SpinMutex;

use runqueue::RunQueue;
use thread::{Entry, Tcb, ThreadState};

klazy! {
    ref static RUN_QUEUE: SpinMutex<RunQueue> = SpinMutex::new(RunQueue::new());
}

static IDLE: core::sync::atomic::AtomicPtr<Tcb> =
    core::sync::atomic::AtomicPtr::new(core::ptr::null_mut());

/// Must be called once, after a global allocator is installed, before any
/// other function in this crate.
pub fn init() {
    thread::init_boot();
    log::info!("scheduler initialized (round-robin)");
}

/// Creates a new thread and enqueues it as `Ready`.
pub fn spawn(entry: Entry, arg: usize) -> Option<()> {
    let t = thread::create(entry, arg)?;
    // SAFETY: `t` was just created and isn't reachable from anywhere else.
    unsafe {
        (*t).state = ThreadState::Ready;
    }
    RUN_QUEUE.lock().push(t);
    Some(())
}

/// Designates `t` as the thread that runs when the run queue is empty.
/// The idle thread is never itself placed in the run queue.
pub fn set_idle(entry: Entry, arg: usize) -> Option<()> {
    let t = thread::create(entry, arg)?;
    // SAFETY: `t` was just created, exclusively owned here.
    unsafe {
        (*t).state = ThreadState::Running;
    }
    IDLE.store(t, core::sync::atomic::Ordering::Release);
    Some(())
}

/// Picks the next thread to run and switches to it. Must be called with
/// interrupts disabled — the caller (an IRQ handler, or `sched_yield`) is
/// responsible for that.
///
/// Implements the five-step algorithm: pop the next ready thread; if none
/// is ready, either keep running the current thread (if it still can) or
/// fall back to idle; re-enqueue the outgoing thread if it's still
/// runnable and isn't idle; mark the incoming thread running/current;
/// switch only if the incoming thread differs from the outgoing one.
pub fn schedule() {
    let old = thread::current();
    let idle = IDLE.load(core::sync::atomic::Ordering::Acquire);

    let mut next = RUN_QUEUE.lock().pop();

    if next.is_null() {
        // SAFETY: `old` is always a live TCB once `init()` has run.
        if unsafe { (*old).state } == ThreadState::Running {
            return;
        }
        if idle.is_null() {
            return;
        }
        next = idle;
    }

    // SAFETY: `old` is live; `old != idle` is checked before requeuing.
    unsafe {
        if (*old).state == ThreadState::Running && old != idle {
            (*old).state = ThreadState::Ready;
            RUN_QUEUE.lock().push(old);
        }
    }

    // SAFETY: `next` is either the run-queue pop or idle, both live TCBs.
    unsafe {
        (*next).state = ThreadState::Running;
    }
    thread::set_current(next);

    // SAFETY: both point at live TCBs; `old`'s context is only resumed
    // the next time it's switched back into.
    unsafe {
        thread::switch(old, next);
    }
}

/// Cooperative yield: disables interrupts, schedules, restores the prior
/// interrupt-enable state.
pub fn sched_yield() {
    libx64::without_interrupts(schedule);
}
