pub mod bounded;

pub use bounded::{bounded, ChannelStats, Receiver, Sender};
