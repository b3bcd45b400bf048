//! Barrage load test orchestration
//!
//! A [`LoadTest`] groups endpoints into [`Layer`]s. Running it spawns one
//! attack loop per endpoint; each loop repeatedly runs a rate-paced attack
//! cycle through a [`barrage_attack::TrafficGenerator`] and pushes one
//! result per completed request onto a bounded [`result_channel`]. A single
//! [`Aggregator`] drains the channel into a [`barrage_registry::Registry`].

pub mod aggregator;
pub mod attack_loop;
pub mod channel;
pub mod layer;
pub mod loadtest;

pub use aggregator::{Aggregator, AggregatorReport};
pub use attack_loop::LoopExit;
pub use channel::{result_channel, ChannelClosed, ResultReceiver, ResultSender};
pub use layer::{Layer, LayerOverrides, LayerSettings};
pub use loadtest::{LoadTest, RunHandle};
