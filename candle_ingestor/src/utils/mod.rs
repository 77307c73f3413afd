pub mod clock;
pub mod shutdown;
