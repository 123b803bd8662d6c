//! Binds a distinct [`AggregateToolSource`] to each pipeline stage.
//!
//! The generic [`ToolRegistry`]/[`AggregateToolSource`] pair is
//! stage-agnostic; a resume-authoring run needs each stage's agent to see
//! only the tools relevant to it (research needs the web fetcher, section
//! writing and review don't). [`StageToolkits`] is the thin per-stage
//! wrapper that makes that binding explicit.

use std::collections::HashMap;
use std::sync::Arc;

use crate::stage::Stage;

use super::AggregateToolSource;

/// One [`AggregateToolSource`] per stage that needs tools, built once at
/// startup and looked up by the Pipeline Coordinator before each stage's
/// agent loop invocation.
#[derive(Default)]
pub struct StageToolkits {
    by_stage: HashMap<Stage, Arc<AggregateToolSource>>,
}

impl StageToolkits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `toolkit` to `stage`, replacing any previous binding.
    pub fn bind(&mut self, stage: Stage, toolkit: Arc<AggregateToolSource>) -> &mut Self {
        self.by_stage.insert(stage, toolkit);
        self
    }

    /// The toolkit bound to `stage`, or an empty one if none was bound —
    /// stages with no tool needs (e.g. `quality_review`, which only reasons
    /// over prior artifacts) run with zero tools rather than erroring.
    pub fn for_stage(&self, stage: Stage) -> Arc<AggregateToolSource> {
        self.by_stage
            .get(&stage)
            .cloned()
            .unwrap_or_else(|| Arc::new(AggregateToolSource::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool_source::{ToolCallContent, ToolCallContext, ToolSource, ToolSourceError, ToolSpec};
    use async_trait::async_trait;

    struct SearchTool;

    #[async_trait]
    impl super::super::Tool for SearchTool {
        fn name(&self) -> &str {
            "search"
        }
        fn spec(&self) -> ToolSpec {
            ToolSpec {
                name: "search".into(),
                description: None,
                input_schema: serde_json::json!({}),
                parallel_safe: true,
            }
        }
        async fn call(
            &self,
            _args: serde_json::Value,
            _ctx: Option<&ToolCallContext>,
        ) -> Result<ToolCallContent, ToolSourceError> {
            Ok(ToolCallContent { text: "ok".into() })
        }
    }

    #[tokio::test]
    async fn bound_stage_sees_only_its_toolkit() {
        let mut toolkits = StageToolkits::new();
        let research_toolkit = Arc::new(AggregateToolSource::new());
        research_toolkit.register_async(Box::new(SearchTool)).await;
        toolkits.bind(Stage::Research, research_toolkit);

        let research_tools = toolkits.for_stage(Stage::Research).list_tools().await.unwrap();
        assert_eq!(research_tools.len(), 1);

        let review_tools = toolkits.for_stage(Stage::QualityReview).list_tools().await.unwrap();
        assert!(review_tools.is_empty());
    }
}
