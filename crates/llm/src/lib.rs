//! Chat relay: turns an inbound conversation into a streaming completion
//! request and forwards the answer token by token.

pub mod error;
pub mod messages;
pub mod relay;
pub mod sink;
pub mod tokens;
pub mod upstream;

pub use error::{RelayError, RelayStatus, UpstreamError};
pub use messages::{ChatRequest, Conversation};
pub use relay::{ModelConfig, RequestContext, RequestOutcome, StreamRelay};
pub use sink::{ChannelSink, DownstreamSink, SinkClosed};
pub use upstream::{CompletionRequest, OpenAiUpstream, TokenStream, UpstreamSource};
