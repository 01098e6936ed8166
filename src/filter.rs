use crate::llm_adapter::{Dispatch, ModelId, ModelRequest};
use crate::types::Paper;
use std::time::Duration;
use tracing::{info, warn};

/// Enough for a one-word answer.
pub const FILTER_MAX_TOKENS: u32 = 5;
pub const FILTER_TIMEOUT: Duration = Duration::from_secs(30);

pub fn filter_prompt(paper: &Paper, topic: &str) -> String {
    format!(
        "Is the following paper primarily about '{}'? Answer with only 'yes' or 'no'.\n\nTitle: {}\nAbstract: {}",
        topic, paper.title, paper.abstract_text
    )
}

/// Affirmative iff the reply contains "yes" in any case.
pub fn is_affirmative(reply: &str) -> bool {
    reply.to_lowercase().contains("yes")
}

/// Keep the papers the model says are about `topic`, in their original order.
///
/// One call per paper and no retry: a failed call drops the paper.
pub async fn filter_by_topic(
    dispatcher: &dyn Dispatch,
    papers: Vec<Paper>,
    topic: &str,
    model: &ModelId,
) -> Vec<Paper> {
    let total = papers.len();
    info!("Filtering {} papers by topic '{}' using model '{}'", total, topic, model);

    let mut kept = Vec::with_capacity(total);
    for (index, paper) in papers.into_iter().enumerate() {
        let request = ModelRequest::prompt(model.clone(), filter_prompt(&paper, topic), FILTER_MAX_TOKENS)
            .with_timeout(FILTER_TIMEOUT);

        match dispatcher.dispatch(&request).await {
            Ok(reply) => {
                info!("Paper {}/{}: '{}' - reply: {}", index + 1, total, paper.short_title(), reply);
                if is_affirmative(&reply) {
                    kept.push(paper);
                }
            }
            Err(e) => {
                warn!("No reply for paper '{}' ({}); dropping it", paper.short_title(), e);
            }
        }
    }

    info!("Filtering complete: {} of {} papers match '{}'", kept.len(), total, topic);
    kept
}
