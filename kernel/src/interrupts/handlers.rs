//! Handler slots and default handlers
//!
//! `enable()` fills lines 0 to 3 with these defaults, but never replaces a
//! handler that was registered earlier.

use std::sync::Arc;

use super::{Interrupt, Line, EXCEPTION, KEYBOARD, SYSCALL, TIMER};

/// Error a handler may report; logged, never propagated
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

pub type HandlerResult = core::result::Result<(), HandlerError>;

/// Interrupt handler
pub type Handler = Arc<dyn Fn(&Interrupt) -> HandlerResult + Send + Sync>;

/// Built-in handlers for the reserved lines
pub fn defaults() -> Vec<(Line, Handler)> {
    vec![
        (EXCEPTION, Arc::new(on_exception) as Handler),
        (KEYBOARD, Arc::new(on_keyboard) as Handler),
        (TIMER, Arc::new(on_timer) as Handler),
        (SYSCALL, Arc::new(on_syscall) as Handler),
    ]
}

fn payload_text(irq: &Interrupt) -> String {
    irq.payload
        .as_deref()
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        .unwrap_or_default()
}

fn on_exception(irq: &Interrupt) -> HandlerResult {
    log::error!("[irq] exception: {}", payload_text(irq));
    Ok(())
}

fn on_keyboard(irq: &Interrupt) -> HandlerResult {
    log::debug!("[irq] keyboard: {:?}", irq.payload);
    Ok(())
}

fn on_timer(_irq: &Interrupt) -> HandlerResult {
    log::trace!("[irq] timer");
    Ok(())
}

fn on_syscall(irq: &Interrupt) -> HandlerResult {
    log::trace!("[irq] syscall {}", payload_text(irq));
    Ok(())
}
