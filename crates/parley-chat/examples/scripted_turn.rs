// Scripted chat turn
//
// Runs two chat turns against a scripted agent with tracing recorded to an
// in-memory trace log, then prints the resulting trace graph.
//
// Run with: RUST_LOG=debug cargo run -p parley-chat --example scripted_turn

use std::io::Write;
use std::sync::Arc;

use parley_chat::{ChatOrchestrator, ChatTurn, TurnCallbacks};
use parley_core::memory::ScriptedAgentExecutor;
use parley_core::{
    AgentEvent, AgentMessage, ChatInput, ModelPricing, OnStream, SimpleMessage,
    StaticPricingTable, Usage, UsageMetrics,
};
use parley_observability::{
    InMemoryTraceLog, Observability, ObservabilityConfig, OutputNodeRequest, TraceLog,
};
use tracing_subscriber::EnvFilter;

const MODEL: &str = "claude-v3.7-sonnet";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let log = InMemoryTraceLog::new();
    let backend: Arc<dyn TraceLog> = Arc::new(log.clone());
    let observability = Observability::new(
        ObservabilityConfig::for_stream("arn:example:stream/traces", "traces"),
        Some(backend),
    );

    let pricing = StaticPricingTable::new().with_model(
        MODEL,
        ModelPricing::new(3.0, 15.0).with_cache_rates(0.3, 3.75),
    )?;

    let executor = ScriptedAgentExecutor::completing(
        AgentMessage::assistant("Rust is a systems programming language."),
        UsageMetrics::new(Usage {
            input_tokens: Some(1200),
            output_tokens: Some(64),
            cache_read_input_tokens: Some(800),
            cache_write_input_tokens: None,
        }),
    )
    .event(AgentEvent::stream_token("Rust is a systems "))
    .event(AgentEvent::stream_token("programming language."))
    .event(AgentEvent::message(AgentMessage::assistant(
        "Rust is a systems programming language.",
    )));

    let orchestrator = ChatOrchestrator::new(Arc::new(executor), Arc::new(pricing))
        .with_observability(observability);

    let on_stream: OnStream = Arc::new(|token: &str| {
        print!("{}", token);
        let _ = std::io::stdout().flush();
    });
    let callbacks = TurnCallbacks {
        on_stream: Some(on_stream),
        ..TurnCallbacks::default()
    };

    let mut history = Vec::new();
    let mut last_message_id: Option<String> = None;

    for (user_message_id, question) in [("u1", "What is Rust?"), ("u2", "Tell me more.")] {
        history.push(SimpleMessage::user(question));
        let turn = ChatTurn::new(
            ChatInput::new(MODEL, question).with_message_id(user_message_id),
            history.clone(),
        )
        .with_conversation_id("c1");

        let result = orchestrator.run(turn, callbacks.clone()).await?;
        println!();
        println!(
            "stop_reason={} input={} output={} price=${:.6}",
            result.stop_reason,
            result.token_counts.input,
            result.token_counts.output,
            result.price
        );

        let assistant_message_id = format!("a{}", &user_message_id[1..]);
        let mut request = OutputNodeRequest::new("c1", user_message_id, &assistant_message_id);
        if let Some(last) = &last_message_id {
            request = request.with_last_message_id(last.clone());
        }
        orchestrator.append_output_node(&request).await;

        history.push(SimpleMessage::assistant(
            result.message.content.first().and_then(|b| b.as_text()).unwrap_or_default(),
        ));
        last_message_id = Some(assistant_message_id);
    }

    println!("\nTrace graph:");
    for node in log.nodes() {
        println!("  node {}", node);
    }
    for (from, to) in log.edges() {
        println!("  edge {} -> {}", from, to);
    }

    Ok(())
}
