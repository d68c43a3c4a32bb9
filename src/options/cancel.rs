use crate::options::option::{OptionBuilder, WampOption};
use crate::{Arg, WampDict};

/// The cancellation mode sent in `CANCEL.Options.mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelMode {
    /// Wait for the callee to respond with an error before completing the call
    Kill,
    /// Complete the call immediately with a `cancelled` error, but still ask
    /// the router to forward the cancellation to the callee
    KillNoWait,
    /// Complete the call immediately; the router never forwards an INTERRUPT
    Skip,
}

impl CancelMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelMode::Kill => "kill",
            CancelMode::KillNoWait => "killnowait",
            CancelMode::Skip => "skip",
        }
    }
}

impl Default for CancelMode {
    fn default() -> Self {
        CancelMode::Kill
    }
}

/// Base struct for storing WampDict value
pub struct CancelOptionItem(Option<WampDict>);

impl CancelOptionItem {
    pub fn with_mode(&self, mode: CancelMode) -> Self {
        self.with_option(WampOption::CancelOption(
            "mode".to_owned(),
            Arg::String(mode.as_str().to_owned()),
        ))
    }
}

impl OptionBuilder for CancelOptionItem {
    fn create(options: Option<WampDict>) -> Self
    where
        Self: OptionBuilder + Sized,
    {
        Self(options)
    }

    fn get_dict(&self) -> Option<WampDict> {
        self.0.clone()
    }
}

impl Default for CancelOptionItem {
    fn default() -> Self {
        Self::empty()
    }
}

/// Alias for CancelOptionItem
pub type CancelOptions = CancelOptionItem;
