//! Stage tables for each content type, and the views projected from them.
//!
//! Every pipeline is a [`PipelineSpec`](crate::pipeline::PipelineSpec)
//! whose stages call a shared [`PaperApi`](crate::api::PaperApi). Views
//! turn a [`RunSnapshot`](crate::pipeline::RunSnapshot) into the flags and
//! lists a page renders.

/// Debug for stages that only hold an API handle.
macro_rules! opaque_debug {
    ($($name:ident),+ $(,)?) => {
        $(impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name)).finish_non_exhaustive()
            }
        })+
    };
}

mod flow;
pub mod media;
pub mod mindmap;
pub mod podcast;
pub mod slides;
pub mod storytelling;

pub use flow::PaperFlow;
pub use media::{media_pipeline, MediaConfig, MediaView};
pub use mindmap::{mindmap_pipeline, MindmapFlow};
pub use podcast::{podcast_pipeline, PodcastView};
pub use slides::{slides_pipeline, SlideFlow, SlideView};
pub use storytelling::{storytelling_pipeline, StorytellingView};
