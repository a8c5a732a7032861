// Diagnose module - stderr classification and remediation hints

pub mod analyzer;
pub mod types;

pub use analyzer::ErrorDiagnoser;
pub use types::ErrorCategory;
