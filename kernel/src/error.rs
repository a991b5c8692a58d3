//! §7 error classification: sentinels at the PFA/heap boundary, `Result` for
//! operations that have a real Rust sum-type error channel available.

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum KernelError {
    OutOfMemory,
    DescriptorExhausted,
    Timeout,
    OutOfBounds,
    DeviceNotPresent,
    QueueUnavailable,
}

impl core::fmt::Display for KernelError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            Self::OutOfMemory => "out of memory",
            Self::DescriptorExhausted => "virtqueue descriptor table exhausted",
            Self::Timeout => "operation timed out",
            Self::OutOfBounds => "request out of bounds",
            Self::DeviceNotPresent => "device not present",
            Self::QueueUnavailable => "queue unavailable",
        };
        f.write_str(msg)
    }
}
