//! Structured abort for faults raised while a unit is running.
//!
//! A fault is an ordinary `Err(Fault)` that every interpreter frame propagates
//! with `?`, so unwinding stops at the run-level call that armed the channel.
//! The channel itself only tracks whether such a run is in progress.
//!
//! Only one run may be armed per state at a time. Arming again before the
//! current run finishes is refused with an `InternalError` fault instead of
//! being nested; `eval` re-enters the loader and `invoke` directly and never
//! re-arms.

use thiserror::Error;

use crate::diagnostics::SourceSpan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Reference,
    Type,
    Syntax,
    Range,
    Internal,
}

impl FaultKind {
    pub fn label(self) -> &'static str {
        match self {
            FaultKind::Reference => "ReferenceError",
            FaultKind::Type => "TypeError",
            FaultKind::Syntax => "SyntaxError",
            FaultKind::Range => "RangeError",
            FaultKind::Internal => "InternalError",
        }
    }
}

/// A runtime error that aborts the current run instead of returning a value.
#[derive(Debug, Clone, Error)]
#[error("{}: {}", .kind.label(), .message)]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
    pub span: Option<SourceSpan>,
}

impl Fault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            span: None,
        }
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span.get_or_insert(span);
        self
    }
}

/// How control arrived back at an armed run.
#[derive(Debug)]
pub enum Entry<T> {
    Normal(T),
    Aborted(Fault),
}

impl<T> From<Result<T, Fault>> for Entry<T> {
    fn from(result: Result<T, Fault>) -> Self {
        match result {
            Ok(value) => Entry::Normal(value),
            Err(fault) => Entry::Aborted(fault),
        }
    }
}

/// Per-state record of whether a top-level run is accepting faults.
#[derive(Debug, Default)]
pub struct AbortChannel {
    armed: bool,
}

impl AbortChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn arm(&mut self) -> Result<(), Fault> {
        if self.armed {
            return Err(Fault::new(
                FaultKind::Internal,
                "abort channel is already armed by a running unit",
            ));
        }
        self.armed = true;
        Ok(())
    }

    pub fn disarm(&mut self) {
        self.armed = false;
    }

    /// Hands back `fault` for propagation to the armed run.
    ///
    /// # Panics
    ///
    /// Panics when no run is armed: there is no frame left to resume.
    pub fn raise(&self, fault: Fault) -> Fault {
        assert!(self.armed, "fault raised with no armed run: {fault}");
        tracing::debug!(%fault, "fault raised");
        fault
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arm_and_disarm_toggle_state() {
        let mut channel = AbortChannel::new();
        assert!(!channel.is_armed());
        channel.arm().expect("first arm succeeds");
        assert!(channel.is_armed());
        channel.disarm();
        assert!(!channel.is_armed());
    }

    #[test]
    fn rearming_while_armed_is_refused() {
        let mut channel = AbortChannel::new();
        channel.arm().expect("first arm succeeds");
        let fault = channel.arm().expect_err("nested arm must be refused");
        assert_eq!(fault.kind, FaultKind::Internal);
        assert!(channel.is_armed());
    }

    #[test]
    #[should_panic(expected = "no armed run")]
    fn raising_without_armed_run_panics() {
        let channel = AbortChannel::new();
        let _ = channel.raise(Fault::new(FaultKind::Type, "boom"));
    }

    #[test]
    fn fault_display_uses_error_label() {
        let fault = Fault::new(FaultKind::Reference, "x is not defined");
        assert_eq!(fault.to_string(), "ReferenceError: x is not defined");
    }

    #[test]
    fn entry_reflects_result() {
        assert!(matches!(Entry::from(Ok::<_, Fault>(1)), Entry::Normal(1)));
        let aborted: Entry<()> = Err(Fault::new(FaultKind::Range, "deep")).into();
        assert!(matches!(aborted, Entry::Aborted(_)));
    }
}
