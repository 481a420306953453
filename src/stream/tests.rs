use super::*;

fn openai_delta_extractor() -> impl DeltaExtractor {
    |payload: &Value| {
        payload["choices"][0]["delta"]["content"]
            .as_str()
            .map(str::to_string)
    }
}

async fn collect(input: &str) -> Vec<StreamFrame> {
    let (tx, mut rx) = mpsc::channel(1);
    let cancel = CancellationToken::new();
    let reader = input.as_bytes();
    tokio::spawn(decode_sse_stream(reader, openai_delta_extractor(), cancel, tx));
    let mut frames = Vec::new();
    while let Some(f) = rx.recv().await {
        frames.push(f);
    }
    frames
}

#[tokio::test]
async fn streaming_assembly_four_frames_final_concatenates() {
    let input = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\" \"}}]}\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"world\"}}]}\n",
        "data: [DONE]\n",
    );
    let frames = collect(input).await;
    assert_eq!(frames.len(), 4);
    assert!(!frames[0].is_final);
    assert!(!frames[1].is_final);
    assert!(!frames[2].is_final);
    assert!(frames[3].is_final);
    assert_eq!(frames[3].content, "Hello world");
    assert_eq!(frames[3].finish_reason, Some(FinishReason::Stop));
}

#[tokio::test]
async fn malformed_json_mid_stream_is_skipped_not_terminal() {
    let input = concat!(
        "data: {not json}\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"Valid\"}}]}\n",
        "data: [DONE]\n",
    );
    let frames = collect(input).await;
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].content, "Valid");
    assert!(frames[1].is_final);
    assert_eq!(frames[1].content, "Valid");
}

#[tokio::test]
async fn blank_lines_and_non_data_lines_are_skipped() {
    let input = concat!(
        "\n",
        "event: message_start\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n",
        "\n",
        "data: [DONE]\n",
    );
    let frames = collect(input).await;
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].content, "Hi");
}

#[tokio::test]
async fn eof_without_done_terminates_cleanly() {
    let input = "data: {\"choices\":[{\"delta\":{\"content\":\"partial\"}}]}\n";
    let frames = collect(input).await;
    assert_eq!(frames.len(), 2);
    assert!(frames[1].is_final);
    assert_eq!(frames[1].finish_reason, Some(FinishReason::Stop));
    assert_eq!(frames[1].content, "partial");
}

#[tokio::test]
async fn cancellation_closes_after_at_most_one_in_flight_frame() {
    let input = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"c\"}}]}\n",
        "data: [DONE]\n",
    );
    let (tx, mut rx) = mpsc::channel(1);
    let cancel = CancellationToken::new();
    cancel.cancel();
    tokio::spawn(decode_sse_stream(input.as_bytes(), openai_delta_extractor(), cancel, tx));
    let mut count = 0;
    while rx.recv().await.is_some() {
        count += 1;
    }
    assert!(count <= 1, "expected at most one in-flight frame after cancellation, got {count}");
}
