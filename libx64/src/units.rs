#![allow(non_upper_case_globals)]

pub const Kb: usize = 1024;
pub const Mb: usize = Kb * 1024;
pub const Gb: usize = Mb * 1024;

pub const KB: usize = 1024 / 8;
pub const MB: usize = Kb * 1024;
pub const GB: usize = Mb * 1024;
