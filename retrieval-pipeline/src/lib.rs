#![allow(clippy::missing_docs_in_private_items)]

pub mod answer;
pub mod citations;
pub mod store_registry;

pub use answer::{answer_question, SearchAnswer};
pub use citations::{resolve_citations, Citation, CitationResolution};
pub use store_registry::StoreRegistry;
