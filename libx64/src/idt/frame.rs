/// Full general-purpose register snapshot built by the low-level interrupt
/// stub before control reaches a Rust handler, plus the CPU-pushed tail
/// (`rip`, `cs`, `rflags`, `rsp`, `ss`) and the two words the stub itself adds
/// (`vector`, `error_code` — zero-filled by the stub for vectors that don't
/// push one natively).
///
/// Field order mirrors push order on the stack: the stub pushes registers
/// `rax` through `r15` after the CPU's own frame, so reading top-to-bottom
/// here is also reading the stack bottom-to-top from the stub's `push`
/// sequence in reverse.
#[derive(Clone, Copy)]
#[repr(C)]
pub struct InterruptFrame {
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub r11: u64,
    pub r10: u64,
    pub r9: u64,
    pub r8: u64,
    pub rbp: u64,
    pub rdi: u64,
    pub rsi: u64,
    pub rdx: u64,
    pub rcx: u64,
    pub rbx: u64,
    pub rax: u64,

    pub vector: u64,
    pub error_code: u64,

    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

impl core::fmt::Debug for InterruptFrame {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InterruptFrame")
            .field("vector", &self.vector)
            .field("error_code", &self.error_code)
            .field("rip", &format_args!("{:#018x}", self.rip))
            .field("cs", &self.cs)
            .field("rflags", &format_args!("{:#018x}", self.rflags))
            .field("rsp", &format_args!("{:#018x}", self.rsp))
            .field("ss", &self.ss)
            .field("rax", &format_args!("{:#018x}", self.rax))
            .finish()
    }
}
