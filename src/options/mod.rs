pub mod option;
pub use option::{OptionBuilder, WampOption};

pub mod subscription;
pub use subscription::SubscribeOptions;

pub mod call;
pub use call::CallOptions;

pub mod publish;
pub use publish::PublishOptions;

pub mod register;
pub use register::RegisterOptions;

pub mod cancel;
pub use cancel::{CancelMode, CancelOptions};
