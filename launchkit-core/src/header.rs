pub mod pe;

use crate::arch::Architecture;

pub trait Header: std::fmt::Debug + Send + Sync {
    /// Returns the processor architecture the image targets.
    fn architecture(&self) -> Architecture;

    /// Returns true if this is a 64-bit image.
    fn is_64(&self) -> bool;

    /// Returns a short human-readable name, e.g. "PE32" or "PE32+".
    fn format_name(&self) -> &'static str;

    /// Returns true if the image is a library (vs a program).
    fn is_library(&self) -> bool;

    /// Returns true if the image carries a managed runtime descriptor.
    fn is_managed(&self) -> bool;
}
