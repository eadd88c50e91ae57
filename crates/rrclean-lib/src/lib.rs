pub mod clean;
pub mod error;
pub mod io;
pub mod metrics;
pub mod plot;
pub mod signal;

pub use clean::*;
pub use error::*;
pub use metrics::*;
pub use signal::*;
