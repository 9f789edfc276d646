//! JSON usage API family.
//!
//! Most hosted services expose a bearer-token endpoint that returns a JSON
//! usage document. The differences between them are the URL and where the
//! numbers sit in the document, both of which live in the descriptor.

mod mapping;
mod strategy;

pub use mapping::{UsageMapping, UsageShape, number_at, parse_amount, text_at, timestamp_at};
pub use strategy::{TokenApiStrategy, token_pipeline};
