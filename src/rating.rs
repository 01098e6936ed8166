use crate::llm_adapter::{Dispatch, DispatchError, ModelId, ModelRequest};
use crate::retry::{retry_bounded, RetryPolicy};
use crate::types::{Paper, Rating};
use std::time::Duration;
use tracing::{error, info, warn};

pub const RATING_MAX_TOKENS: u32 = 1000;
pub const RATING_ATTEMPTS: u32 = 2;
pub const RATING_TIMEOUT: Duration = Duration::from_secs(60);

const RATING_PROMPT: &str = r#"# Role Setting
You are an experienced researcher in the field of Artificial Intelligence, skilled at quickly evaluating the potential value of research papers.

# Task
Based on the following paper's title and abstract, please summarize it and score it across multiple dimensions (1-10 points, 1 being the lowest, 10 being the highest). Finally, provide an overall preliminary priority score.

# Input
Paper Title: {title}
Paper Abstract: {abstract}

# My Research Interests
{interests}

# Output Requirements
Output should always be in JSON format, strictly compliant with RFC8259.
Please output the evaluation and explanations in the following JSON format:
{
  "tldr": "<summary>", // Too Long; Didn't Read. Summarize the paper in one or two brief sentences.
  "tldr_zh": "<summary>", // Too Long; Didn't Read. Summarize the paper in one or two brief sentences, in Chinese.
  "relevance_score": <score>, // Relevance to my research interests
  "novelty_claim_score": <score>, // Degree of novelty claimed in the abstract
  "clarity_score": <score>, // Clarity and completeness of the abstract writing
  "potential_impact_score": <score>, // Estimated potential impact based on abstract claims
  "overall_priority_score": <score> // Preliminary reading priority score combining all factors above
}

# Scoring Guidelines
- Relevance: Focus on whether it is directly related to the research interests I provided.
- Novelty: Evaluate the degree of innovation claimed in the abstract regarding the method or viewpoint compared to known work.
- Clarity: Evaluate whether the abstract itself is easy to understand and complete with essential elements.
- Potential Impact: Evaluate the importance of the problem it claims to solve and the potential application value of the results.
- Overall Priority: Provide an overall score combining all the above factors. A high score indicates suggested priority for reading.
"#;

/// Why a single rating attempt produced nothing usable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RatingError {
    #[error("dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("reply contains no JSON object")]
    NoJson,

    #[error("reply is not a valid rating object: {0}")]
    InvalidJson(String),

    #[error("{field} = {value} is outside 1-10")]
    ScoreOutOfRange { field: &'static str, value: f64 },
}

pub fn rating_prompt(paper: &Paper, interests: &str) -> String {
    RATING_PROMPT
        .replace("{title}", &paper.title)
        .replace("{abstract}", &paper.abstract_text)
        .replace("{interests}", interests)
}

/// Strip an optional fenced code block around the payload.
pub fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(open) = trimmed.find("```") else {
        return trimmed;
    };

    // Skip a language tag such as `json`, whether or not the payload starts on the same line.
    let body = trimmed[open + 3..].trim_start_matches(|c: char| c.is_ascii_alphabetic());
    let body = match body.find("```") {
        Some(close) => &body[..close],
        None => body,
    };
    body.trim()
}

/// Parse a reply into a `Rating`, rejecting scores outside 1-10.
pub fn parse_rating(reply: &str) -> Result<Rating, RatingError> {
    let payload = strip_code_fence(reply);
    if !payload.contains('{') {
        return Err(RatingError::NoJson);
    }

    let rating: Rating = serde_json::from_str(payload).map_err(|e| RatingError::InvalidJson(e.to_string()))?;
    if let Some((field, value)) = rating.out_of_range_score() {
        return Err(RatingError::ScoreOutOfRange { field, value });
    }
    Ok(rating)
}

/// Attach a rating to every paper that yields one within two attempts.
///
/// Papers that never produce a valid rating are kept without one.
pub async fn rate_papers(
    dispatcher: &dyn Dispatch,
    mut papers: Vec<Paper>,
    interests: &str,
    model: &ModelId,
) -> Vec<Paper> {
    let total = papers.len();
    info!("Rating {} papers using model '{}'", total, model);
    let policy = RetryPolicy::immediate(RATING_ATTEMPTS);

    for (index, paper) in papers.iter_mut().enumerate() {
        let request = ModelRequest::prompt(model.clone(), rating_prompt(paper, interests), RATING_MAX_TOKENS)
            .with_timeout(RATING_TIMEOUT);
        let title = paper.short_title();

        let outcome = retry_bounded(
            &policy,
            |_| dispatcher.dispatch(&request),
            |attempt, reply| {
                let rating = reply.map_err(RatingError::from).and_then(|text| parse_rating(&text));
                if let Err(e) = &rating {
                    warn!("Paper {}/{} (attempt {}): '{}' - {}", index + 1, total, attempt, title, e);
                }
                rating
            },
        )
        .await;

        match outcome {
            Ok(rating) => {
                info!(
                    "Paper {}/{}: '{}' - overall priority {}",
                    index + 1,
                    total,
                    title,
                    rating.overall_priority_score
                );
                paper.rating = Some(rating);
            }
            Err(exhausted) => {
                error!(
                    "Paper {}/{}: no rating for '{}' after {} attempts ({})",
                    index + 1,
                    total,
                    title,
                    exhausted.attempts,
                    exhausted.last_error
                );
            }
        }
    }

    info!("Rating complete");
    papers
}

/// Highest `overall_priority_score` first; unrated papers count as 0 and ties keep input order.
pub fn sort_by_priority(papers: &mut [Paper]) {
    papers.sort_by(|a, b| b.priority().total_cmp(&a.priority()));
}
