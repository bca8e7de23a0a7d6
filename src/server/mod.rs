pub mod connection;
pub mod end_point;
pub mod match_actor;
pub mod messages;
pub mod protocol;
pub mod registry;
