//! Output parsing for the external toolchains.
//!
//! The wrapped tools speak text, not a structured API. Everything the
//! rest of the system knows about a tool invocation comes through this
//! module: a [`crate::messages::MessageBag`] plus extracted layer
//! properties and field schemas. No other module may look at raw tool
//! output, so a wording change in a tool stays contained here.

pub mod etl;
pub mod gdal;
