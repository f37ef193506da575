//! ragfuse-pipeline
//!
//! `FusionPipeline::run(&Query) -> PipelineOutput`: retrieval through the
//! hybrid combiner or both paths independently, optional reranking, context
//! assembly and generation under the configured fusion strategy.

pub mod assemble;
pub mod context;
pub mod llm;
pub mod orchestrator;

pub use assemble::{assemble, Components};
pub use context::{format_qa_prompt, render_context, CorpusResolver, QA_TEMPLATE};
pub use llm::OpenAiGenerator;
pub use orchestrator::FusionPipeline;
