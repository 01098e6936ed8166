mod common;

use common::*;
use paper_digest::filter::{filter_by_topic, FILTER_MAX_TOKENS};
use paper_digest::DispatchError;

#[tokio::test]
async fn test_affirmative_reply_keeps_paper() {
    init_tracing();
    let dispatcher = ScriptedDispatcher::texts(&["Yes."]);

    let kept = filter_by_topic(&dispatcher, vec![paper("2401.00001", "GANs")], "image generation", &marketplace_model()).await;

    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].id, "2401.00001");
    assert!(kept[0].rating.is_none());
    assert_eq!(dispatcher.requests()[0].max_output_tokens, FILTER_MAX_TOKENS);
}

#[tokio::test]
async fn test_negative_reply_or_failure_drops_paper() {
    init_tracing();
    let dispatcher = ScriptedDispatcher::replies(vec![
        Ok("No, unrelated.".to_string()),
        Err(DispatchError::Status { status: 500, body: "boom".to_string() }),
    ]);

    let kept = filter_by_topic(
        &dispatcher,
        vec![paper("2401.00001", "Parsing"), paper("2401.00002", "Robots")],
        "image generation",
        &marketplace_model(),
    )
    .await;

    assert!(kept.is_empty());
    assert_eq!(dispatcher.call_count(), 2);
}

#[tokio::test]
async fn test_mixed_replies_keep_relative_order() {
    init_tracing();
    let dispatcher = ScriptedDispatcher::texts(&["yes", "no", "YES please"]);
    let papers = vec![paper("a", "First"), paper("b", "Second"), paper("c", "Third")];

    let kept = filter_by_topic(&dispatcher, papers, "image generation", &marketplace_model()).await;

    let ids: Vec<&str> = kept.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c"]);
    assert_eq!(dispatcher.call_count(), 3);
}

#[tokio::test]
async fn test_prompt_mentions_topic_title_and_abstract() {
    init_tracing();
    let dispatcher = ScriptedDispatcher::texts(&["no"]);

    filter_by_topic(&dispatcher, vec![paper("a", "Video Diffusion")], "video generation", &managed_model()).await;

    let request = &dispatcher.requests()[0];
    let text = request.to_messages()[0].joined_text();
    assert!(text.contains("'video generation'"));
    assert!(text.contains("Title: Video Diffusion"));
    assert!(text.contains("Abstract: Abstract of Video Diffusion."));
    assert_eq!(request.model, managed_model());
}
