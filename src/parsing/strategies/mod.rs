// Vendor-specific parsing strategies

pub mod ssga;

pub use ssga::SsgaStrategy;
