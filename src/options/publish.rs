use crate::options::option::{OptionBuilder, WampOption};
use crate::{Arg, WampDict, WampList};

/// Base struct for storing WampDict value
pub struct PublishOptionItem(Option<WampDict>);

impl PublishOptionItem {
    /// Requests the router send a PUBLISHED reply acknowledging the publication
    pub fn with_acknowledge(&self, enabled: bool) -> Self {
        self.with_option(WampOption::PublishOption(
            "acknowledge".to_owned(),
            Arg::Bool(enabled),
        ))
    }

    /// Requests subscribers be told the identity of the publisher
    pub fn with_disclose_me(&self, enabled: bool) -> Self {
        self.with_option(WampOption::PublishOption(
            "disclose_me".to_owned(),
            Arg::Bool(enabled),
        ))
    }

    /// Excludes the listed session ids from receiving the event
    pub fn with_exclude(&self, session_ids: WampList) -> Self {
        self.with_option(WampOption::PublishOption(
            "exclude".to_owned(),
            Arg::List(session_ids),
        ))
    }

    /// Restricts the event to only the listed session ids
    pub fn with_eligible(&self, session_ids: WampList) -> Self {
        self.with_option(WampOption::PublishOption(
            "eligible".to_owned(),
            Arg::List(session_ids),
        ))
    }
}

impl OptionBuilder for PublishOptionItem {
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

impl Default for PublishOptionItem {
    fn default() -> Self {
        Self::empty()
    }
}

/// Alias for PublishOptionItem
pub type PublishOptions = PublishOptionItem;
