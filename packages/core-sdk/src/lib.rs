pub mod client;
pub mod config;
pub mod conversation;
pub mod error;
pub mod graphql;
pub mod models;
pub mod proxy;
pub mod rest;
pub mod telemetry;

pub use client::{ChatClient, Transport, TransportMode};
pub use error::{DispatchError, ErrorKind};

/**
 * \brief SDK 预导入集合，方便外部引用常用模块。
 */
pub mod prelude {
    pub use crate::client::{ChatClient, Transport, TransportMode};
    pub use crate::config::{BuildProfile, EndpointConfig, ProxyConfig};
    pub use crate::conversation::{Conversation, SubmitError};
    pub use crate::error::{DispatchError, ErrorKind};
    pub use crate::models::{ChatMessage, DispatchOptions, DispatchRequest, Reply, Role};
}
