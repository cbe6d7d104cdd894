//! Haptic feedback seam
//!
//! The activation engine pulses the vibration motor at press start and on
//! completion. Platforms without a motor (desktop, web view) plug in
//! [`NullHaptics`]. Failures here are best-effort feedback, never a reason
//! to stop a press from progressing; the engine logs them and moves on.

use crate::error::HapticError;

/// Vibration strength for an impact pulse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImpactStyle {
    #[default]
    Light,
    Medium,
    Heavy,
}

/// Trait for haptic feedback implementations
pub trait HapticFeedback: Send + Sync {
    /// Fire a single impact pulse (press start)
    fn impact(&self, style: ImpactStyle) -> Result<(), HapticError>;

    /// Fire a success notification pattern (press completed)
    fn notify_success(&self) -> Result<(), HapticError>;
}

/// No-op haptics for platforms without a vibration motor
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHaptics;

impl HapticFeedback for NullHaptics {
    fn impact(&self, _style: ImpactStyle) -> Result<(), HapticError> {
        Ok(())
    }

    fn notify_success(&self) -> Result<(), HapticError> {
        Ok(())
    }
}
