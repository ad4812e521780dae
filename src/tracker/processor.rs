use futures::future::join_all;
use log::{debug, info};
use tokio::sync::Semaphore;

use super::resolver::ReferenceResolver;
use crate::models::Pipeline;

/// Resolutions allowed in flight at once.
pub const MAX_CONCURRENT_PROCESSING: usize = 10;

/// Pipelines submitted together before waiting for completion.
pub const BATCH_SIZE: usize = 100;

/// Resolves the adoption of every pipeline in place.
///
/// Pipelines are handled batch by batch; within a batch all resolutions are
/// submitted together and throttled by a shared permit pool. A failed
/// resolution leaves that pipeline without adoption.
pub async fn process_pipelines(resolver: &ReferenceResolver<'_>, pipelines: &mut [Pipeline]) {
    let semaphore = Semaphore::new(MAX_CONCURRENT_PROCESSING);
    let batch_count = pipelines.len().div_ceil(BATCH_SIZE);

    for (batch_num, batch) in pipelines.chunks_mut(BATCH_SIZE).enumerate() {
        debug!(
            "processor: batch {}/{batch_count} ({} pipelines)",
            batch_num + 1,
            batch.len()
        );

        let tasks = batch.iter_mut().map(|pipeline| {
            let semaphore = &semaphore;
            async move {
                // The pool is never closed, so acquiring cannot fail.
                let Ok(_permit) = semaphore.acquire().await else {
                    return;
                };
                tokio::task::yield_now().await;
                let adoption = match resolver.resolve(pipeline) {
                    Ok(adoption) => adoption,
                    Err(e) => {
                        debug!("processor: failed to parse pipeline '{}': {e}", pipeline.name);
                        None
                    }
                };
                pipeline.adoption = adoption;
            }
        });
        join_all(tasks).await;
    }

    let adopted = pipelines.iter().filter(|p| p.is_compliant()).count();
    info!(
        "processor: {adopted} of {} pipelines adopt cataloged templates",
        pipelines.len()
    );
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::models::TemplateSource;

    const ADOPTING: &str = r#"
resources:
  repositories:
    - repository: templates
      type: git
      name: Lib/tpl
steps:
  - template: build.yaml@templates
"#;

    fn pipeline(id: u64, content: &str) -> Pipeline {
        Pipeline {
            id,
            name: format!("pipeline-{id}"),
            folder: String::new(),
            definition_path: Some("azure-pipelines.yml".into()),
            project_id: None,
            repository_id: Some("r-1".into()),
            content: Some(content.into()),
            adoption: None,
        }
    }

    #[tokio::test]
    async fn test_results_are_written_to_their_own_pipeline() {
        let mut source = TemplateSource::new("Lib", "tpl", "main", None, vec![]).unwrap();
        source.resolved_templates.insert("build.yaml".into());
        let projects = HashMap::new();
        let resolver = ReferenceResolver::new(&source, "main", &projects, None);

        // Spans several batches; every third pipeline adopts, every fifth is broken.
        let mut pipelines: Vec<Pipeline> = (0..250u64)
            .map(|id| match id {
                id if id % 5 == 0 => pipeline(id, "steps: [unclosed"),
                id if id % 3 == 0 => pipeline(id, ADOPTING),
                id => pipeline(id, "steps:\n  - script: echo\n"),
            })
            .collect();

        process_pipelines(&resolver, &mut pipelines).await;

        for p in &pipelines {
            let expected = p.id % 5 != 0 && p.id % 3 == 0;
            assert_eq!(p.is_compliant(), expected, "pipeline {}", p.id);
        }
    }

    #[tokio::test]
    async fn test_empty_input() {
        let source = TemplateSource::new("Lib", "tpl", "main", None, vec![]).unwrap();
        let projects = HashMap::new();
        let resolver = ReferenceResolver::new(&source, "main", &projects, None);
        let mut pipelines: Vec<Pipeline> = Vec::new();

        process_pipelines(&resolver, &mut pipelines).await;
        assert!(pipelines.is_empty());
    }
}
