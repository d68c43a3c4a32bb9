use crate::options::option::{OptionBuilder, WampOption};
use crate::{Arg, WampDict, WampList};

/// Base struct for storing WampDict value
pub struct CallOptionItem(Option<WampDict>);

impl CallOptionItem {
    /// Requests the callee deliver progressive results for this call
    pub fn with_receive_progress(&self, enabled: bool) -> Self {
        self.with_option(WampOption::CallOption(
            "receive_progress".to_owned(),
            Arg::Bool(enabled),
        ))
    }

    /// Sets the call timeout, in milliseconds, after which the router (or this
    /// core, if the router doesn't support it) cancels the call with a
    /// `killnowait` and completes it with a timeout error
    pub fn with_timeout(&self, timeout_ms: u64) -> Self {
        self.with_option(WampOption::CallOption(
            "timeout".to_owned(),
            Arg::Integer(timeout_ms as i64),
        ))
    }

    /// Requests the callee be told the identity of the caller
    pub fn with_disclose_me(&self, enabled: bool) -> Self {
        self.with_option(WampOption::CallOption(
            "disclose_me".to_owned(),
            Arg::Bool(enabled),
        ))
    }

    /// Restricts the call to only be routed to one of the listed callees
    pub fn with_eligible(&self, session_ids: WampList) -> Self {
        self.with_option(WampOption::CallOption(
            "eligible".to_owned(),
            Arg::List(session_ids),
        ))
    }
}

impl OptionBuilder for CallOptionItem {
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

impl Default for CallOptionItem {
    fn default() -> Self {
        Self::empty()
    }
}

/// Alias for CallOptionItem
pub type CallOptions = CallOptionItem;
