pub mod arch;
pub mod error;
pub mod header;
pub mod requirement;
pub mod runtime;
pub mod version;

pub use arch::*;
pub use error::{Error, Result};
pub use header::pe::{PeFormat, PeHeader};
pub use header::Header;
pub use requirement::*;
pub use runtime::{latest_matching, parse_runtime_info_line, InstalledRuntimeSet, RuntimeFamily};
pub use version::*;
