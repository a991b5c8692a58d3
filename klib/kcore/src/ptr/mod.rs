mod volatile;

pub use volatile::Volatile;
