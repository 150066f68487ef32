//! A minimal BSON 1.1 codec: enough to compose reply documents and parse
//! request bodies. See `DESIGN.md` for the module's grounding.

pub mod builder;
pub mod document;
pub mod value;

pub use builder::DocumentBuilder;
pub use document::Document;
pub use value::Value;
