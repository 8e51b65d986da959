pub mod ajax;
pub mod console;
pub mod sandbox;

pub use ajax::AjaxScanService;
pub use console::{ConsoleConfirmer, ConsoleView};
pub use sandbox::SandboxScanService;
