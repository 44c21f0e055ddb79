pub mod file_io;
pub mod network_converter;
pub use file_io::*;
#[allow(unused_imports)]
pub use network_converter::*;
