//! Product extraction
//!
//! Turns a product page URL into a normalized `ProductRecord` through an
//! ordered chain of strategies, each of which may miss without failing the
//! page.

mod endpoint;
mod pipeline;
mod record;
mod script;
mod structured;

pub use endpoint::endpoint_product;
pub use pipeline::{extract_from_html, Extracted, ExtractionPipeline, ExtractionSource, StageOutcome};
pub use record::{json_text, ProductRecord, VariantRecord, MAX_OPTIONS};
pub use script::{find_script_product, match_script, script_patterns, ScriptMatch, ScriptPattern};
pub use structured::{find_json_ld_product, product_from_json_ld};
