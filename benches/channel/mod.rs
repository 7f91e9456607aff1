pub mod frame;
pub mod session;
