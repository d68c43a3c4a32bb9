use crate::options::option::{OptionBuilder, WampOption};
use crate::{Arg, WampDict};

/// Base struct for storing WampDict value
pub struct RegisterOptionItem(Option<WampDict>);

impl RegisterOptionItem {
    /// Add an option for pattern matching the procedure uri of the registration
    pub fn with_match(&self, match_option: &str) -> Self {
        self.with_option(WampOption::RegisterOption(
            "match".to_owned(),
            Arg::String(match_option.to_owned()),
        ))
    }

    /// Sets the invocation policy used when more than one callee registers
    /// the same procedure uri (e.g. `"single"`, `"roundrobin"`, `"random"`,
    /// `"first"`, `"last"`)
    pub fn with_invoke(&self, policy: &str) -> Self {
        self.with_option(WampOption::RegisterOption(
            "invoke".to_owned(),
            Arg::String(policy.to_owned()),
        ))
    }

    /// Requests this callee be told the identity of the caller on invocation
    pub fn with_disclose_caller(&self, enabled: bool) -> Self {
        self.with_option(WampOption::RegisterOption(
            "disclose_caller".to_owned(),
            Arg::Bool(enabled),
        ))
    }
}

impl OptionBuilder for RegisterOptionItem {
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

impl Default for RegisterOptionItem {
    fn default() -> Self {
        Self::empty()
    }
}

/// Alias for RegisterOptionItem
pub type RegisterOptions = RegisterOptionItem;
