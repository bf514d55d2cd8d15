pub mod batch_planner;
pub mod model_invoker;
pub mod page_splitter;
pub mod prompts;
pub mod report_synthesizer;
pub mod response_sanitizer;

pub use batch_planner::plan_batches;
pub use model_invoker::{InvocationMode, InvocationPayload, ModelInvoker, RetryPolicy};
pub use page_splitter::split_document;
pub use report_synthesizer::ReportSynthesizer;
pub use response_sanitizer::{parse_report, sanitize};
