//! Turns Genie answers into what Teams displays: markdown text bubbles and
//! Adaptive Card payloads for the feedback prompt.

pub mod cards;
pub mod format;
mod telemetry;

pub use cards::{
    FeedbackData, build_ack_card, build_error_card, build_feedback_prompt, card_invoke_response,
};
pub use format::{format_cell, markdown_table, render, render_for, with_user_header};
