//! Streamed agent runs: event delivery and host tool servicing.

mod common;

use agent_bridge::bridge::event_channel;
use agent_bridge::types::ToolDefinition;
use agent_bridge::{Error, Message, ProviderOptions, StreamEvent};
use common::{direct_bridge, envelope_bridge, EnvelopeEngine, Entry, ScriptedEngine, Step};
use futures::StreamExt;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn kinds(events: &[StreamEvent]) -> Vec<&str> {
    events.iter().map(|e| e.kind.as_str()).collect()
}

#[tokio::test]
async fn test_stream_delivers_events_and_result() {
    let engine = ScriptedEngine::new();
    engine.script(vec![Step::finish("hello there")]);
    let bridge = direct_bridge(engine.clone());
    let provider = bridge
        .create_provider("openai", "gpt-4o", ProviderOptions::new("k"))
        .await
        .unwrap();
    let agent = bridge.agent("talker", provider.clone()).build().unwrap();

    let (sink, events) = event_channel();
    let result = agent.stream(&[Message::user("hi")], sink).await.unwrap();
    assert_eq!(result.text, "hello there");
    assert_eq!(result.steps, 1);

    let events: Vec<StreamEvent> = events.collect().await;
    assert_eq!(kinds(&events), ["step_start", "text_delta", "done"]);
    assert_eq!(events[1].get("delta"), Some(&json!("hello there")));
    assert_eq!(events[2].get("steps"), Some(&json!(1)));

    let runs = engine.runs();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].entry, Entry::Stream);
    provider.destroy().await.unwrap();
}

#[tokio::test]
async fn test_stream_services_host_tools_once() {
    let engine = ScriptedEngine::new();
    engine.script(vec![Step::call("lookup", json!({ "id": 7 })), Step::finish("found")]);
    let bridge = direct_bridge(engine.clone());
    let provider = bridge
        .create_provider("openai", "gpt-4o", ProviderOptions::new("k"))
        .await
        .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let agent = bridge
        .agent("finder", provider.clone())
        .tool(ToolDefinition::new("lookup", "Find a record").execute_fn({
            let calls = calls.clone();
            move |args| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(json!({ "record": args["id"] }))
                }
            }
        }))
        .build()
        .unwrap();

    let (sink, mut events) = event_channel();
    let result = agent.stream(&[Message::user("find 7")], sink).await.unwrap();
    assert_eq!(result.text, "found");
    assert_eq!(result.steps, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let mut seen = Vec::new();
    while let Some(event) = events.recv().await {
        seen.push(event);
    }
    assert_eq!(kinds(&seen), ["step_start", "tool_result", "step_start", "text_delta", "done"]);
    let tool_event = &seen[1];
    assert_eq!(tool_event.get("toolName"), Some(&json!("lookup")));
    assert_eq!(tool_event.get("isError"), Some(&Value::Bool(false)));
    assert_eq!(tool_event.get("result"), Some(&json!(r#"{"record":7}"#)));

    assert_eq!(engine.runs()[0].entry, Entry::Stream);
    provider.destroy().await.unwrap();
}

#[tokio::test]
async fn test_stream_without_callbacks_resolves_tools_in_engine() {
    let engine = ScriptedEngine::without_callbacks();
    engine.script(vec![Step::call("t", json!({})), Step::finish("ok")]);
    let bridge = direct_bridge(engine.clone());
    let provider = bridge
        .create_provider("openai", "gpt-4o", ProviderOptions::new("k"))
        .await
        .unwrap();
    let agent = bridge
        .agent("plain", provider.clone())
        .tool(ToolDefinition::new("t", "host").execute_fn(|args| async move { Ok(args) }))
        .build()
        .unwrap();

    let (sink, events) = event_channel();
    agent.stream(&[Message::user("hi")], sink).await.unwrap();
    let events: Vec<StreamEvent> = events.collect().await;
    assert_eq!(kinds(&events).last(), Some(&"done"));
    assert_eq!(*engine.engine_resolved.lock().unwrap(), vec!["t".to_string()]);
    assert!(engine.replies().is_empty());
    provider.destroy().await.unwrap();
}

#[tokio::test]
async fn test_stream_unavailable_over_envelope() {
    let module = EnvelopeEngine::new(ScriptedEngine::new());
    let bridge = envelope_bridge(module.clone());
    let provider = bridge
        .create_provider("openai", "gpt-4o", ProviderOptions::new("k"))
        .await
        .unwrap();
    let agent = bridge.agent("sandboxed", provider.clone()).build().unwrap();

    let (sink, events) = event_channel();
    let err = agent.stream(&[Message::user("hi")], sink).await.unwrap_err();
    match err {
        Error::CapabilityUnavailable { capability, .. } => assert_eq!(capability, "streaming"),
        other => panic!("expected CapabilityUnavailable, got {other:?}"),
    }
    assert!(module.sent("agentRun").is_empty());
    assert!(events.collect::<Vec<_>>().await.is_empty());

    // The plain entry point still works on the same agent.
    assert_eq!(agent.run_prompt("hi").await.unwrap().text, "done");
    provider.destroy().await.unwrap();
}

#[tokio::test]
async fn test_stream_unavailable_when_module_lacks_it() {
    let engine = ScriptedEngine::without_streaming();
    let bridge = direct_bridge(engine.clone());
    let provider = bridge
        .create_provider("openai", "gpt-4o", ProviderOptions::new("k"))
        .await
        .unwrap();
    let agent = bridge.agent("quiet", provider.clone()).build().unwrap();

    let (sink, _events) = event_channel();
    let err = agent.stream(&[Message::user("hi")], sink).await.unwrap_err();
    assert!(matches!(err, Error::CapabilityUnavailable { .. }), "{err:?}");
    assert!(engine.runs().is_empty());
    provider.destroy().await.unwrap();
}

#[tokio::test]
async fn test_stream_on_destroyed_provider() {
    let engine = ScriptedEngine::new();
    let bridge = direct_bridge(engine.clone());
    let provider = bridge
        .create_provider("openai", "gpt-4o", ProviderOptions::new("k"))
        .await
        .unwrap();
    let agent = bridge.agent("late", provider.clone()).build().unwrap();
    provider.destroy().await.unwrap();

    let (sink, _events) = event_channel();
    let err = agent.stream(&[Message::user("hi")], sink).await.unwrap_err();
    assert!(matches!(err, Error::UseAfterDestroy { .. }));
    assert!(engine.runs().is_empty());
}
