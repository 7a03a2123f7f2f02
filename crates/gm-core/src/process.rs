//! Process state machine (derived view)
//!
//! The control surface only ever mirrors what the device reports:
//!
//! ```text
//!   Idle ──(a = true)──► Active ──(a = false)──► Finished
//!    ▲                                              │
//!    └──── process absent (after req:process:clear) ┘
//! ```
//!
//! Nothing here fabricates a transition. `Finished` stays until the device
//! reports no process at all.

use gm_protocol::{Command, ProcessInfo, TargetType};

/// Derived state of the brew/steam/water process
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ProcessState {
    /// No process reported
    #[default]
    Idle,
    /// Process is running
    Active(ProcessInfo),
    /// Process ended; stays on screen until cleared
    Finished(ProcessInfo),
}

impl ProcessState {
    /// Derive the state from the store's `process` field
    pub fn from_process(process: Option<&ProcessInfo>) -> Self {
        match process {
            None => ProcessState::Idle,
            Some(p) if p.active => ProcessState::Active(p.clone()),
            Some(p) => ProcessState::Finished(p.clone()),
        }
    }

    /// No process on screen
    pub fn is_idle(&self) -> bool {
        matches!(self, ProcessState::Idle)
    }

    /// A process is running
    pub fn is_active(&self) -> bool {
        matches!(self, ProcessState::Active(_))
    }

    /// A process ended and waits to be cleared
    pub fn is_finished(&self) -> bool {
        matches!(self, ProcessState::Finished(_))
    }

    /// The process being shown, if any
    pub fn info(&self) -> Option<&ProcessInfo> {
        match self {
            ProcessState::Idle => None,
            ProcessState::Active(p) | ProcessState::Finished(p) => Some(p),
        }
    }

    /// Progress display values, `None` when idle
    pub fn progress(&self) -> Option<ProcessProgress<'_>> {
        self.info().map(ProcessProgress)
    }

    /// Command behind the single start/stop/dismiss button
    pub fn primary_action(&self) -> Command {
        match self {
            ProcessState::Idle => Command::ProcessActivate,
            ProcessState::Active(_) => Command::ProcessDeactivate,
            ProcessState::Finished(_) => Command::ProcessClear,
        }
    }

    /// The brew target toggle is only offered when nothing is on screen
    pub fn can_change_brew_target(&self) -> bool {
        self.is_idle()
    }
}

/// Display values computed on read from a process's canonical fields
#[derive(Debug, Clone, Copy)]
pub struct ProcessProgress<'a>(&'a ProcessInfo);

impl<'a> ProcessProgress<'a> {
    /// Display values for `info`
    pub fn new(info: &'a ProcessInfo) -> Self {
        Self(info)
    }

    /// Progress in percent, always within [0, 100]
    pub fn percent(&self) -> f64 {
        progress_percent(self.0.progress_current, self.0.progress_total)
    }

    /// Whole seconds elapsed, from the reported `e` only. Nothing ticks on
    /// the client, so a finished process shows the last value reported.
    pub fn elapsed_secs(&self) -> u64 {
        self.0.elapsed_ms / 1000
    }

    /// Elapsed time as `m:ss`
    pub fn elapsed_display(&self) -> String {
        format_duration(self.elapsed_secs())
    }

    /// Heading for the current stage
    pub fn stage_title(&self) -> &'static str {
        if self.0.stage == "brew" {
            "BREW"
        } else {
            "PREINFUSION"
        }
    }

    /// Target of the current phase, e.g. `25.0s` or `36.0g`
    pub fn target_display(&self) -> String {
        match self.0.target_type {
            TargetType::Time => format!("{:.1}s", self.0.progress_total / 1000.0),
            TargetType::Volumetric => format!("{:.1}g", self.0.progress_total),
            TargetType::Unknown => format!("{:.1}", self.0.progress_total),
        }
    }
}

/// `current / total` as a percentage clamped to [0, 100]. A zero, negative
/// or non-finite total yields 0.
pub fn progress_percent(current: f64, total: f64) -> f64 {
    if !(total.is_finite() && total > 0.0) {
        return 0.0;
    }
    let pct = current / total * 100.0;
    if pct.is_nan() {
        return 0.0;
    }
    pct.clamp(0.0, 100.0)
}

/// Format whole seconds as `m:ss`
pub fn format_duration(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}
