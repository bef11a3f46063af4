//! Backend implementations.

pub mod gonkagate;

pub use gonkagate::GonkaGateProvider;
