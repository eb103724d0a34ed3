pub mod subscribe;

pub use subscribe::{SubscribeError, SubscribeQuery};
