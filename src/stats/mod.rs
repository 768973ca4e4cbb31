pub mod descriptive;
pub mod variance;

pub use descriptive::{ChannelSummary, DescriptiveStatistics};
pub use variance::{FTest, OneWayAnova, TwoFactorAnova};
