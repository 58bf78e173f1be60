//! Databricks Genie access for the Teams bot.
//!
//! [`GenieClient`] speaks the workspace REST API, [`GenieGateway`] turns a chat
//! question into a [`GenieAnswer`] and never surfaces raw backend errors.

mod client;
mod error;
mod feedback;
mod gateway;
pub mod mock;
mod types;

pub use client::{
    FeedbackRoute, GenieApi, GenieCapabilities, GenieClient, GenieSettings, ListingRoute,
};
pub use error::{BackendFailure, GenieError, is_ip_acl_block};
pub use feedback::DirectFeedbackClient;
pub use gateway::{
    ACCESS_DENIED_TEXT, DECODE_FAILURE_TEXT, GENERIC_FAILURE_TEXT, GenieAnswer, GenieGateway,
    GenieReply, SharedGenieApi, failure_text,
};
pub use types::{
    ColumnInfo, FeedbackRating, GenieAttachment, GenieMessage, MessageError, MessageStatus,
    QueryAttachment, QueryResultResponse, ResultData, ResultManifest, ResultSchema,
    StartConversationResponse, StatementResponse, TextAttachment,
};
