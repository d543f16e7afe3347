//! Terminal ownership: input mode on one side, pinned frame output on the other.

pub mod frame;
pub mod mode;

use std::{panic, sync::Arc};

pub use frame::{CrosstermRows, FrameRenderer, RowSource};
pub use mode::TerminalModeController;

/// Restore the input mode before the default panic output is printed.
pub fn install_panic_hook(mode: Arc<TerminalModeController>) {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = mode.restore();
        original_hook(panic_info);
    }));
}
