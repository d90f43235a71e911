//! `stepwise run`: one task, one line per step.

use std::sync::Arc;
use std::time::Duration;
use stepwise_agent::{Agent, RunEvent, StepStrategy, StreamOptions, ToolCallAgent};
use stepwise_config::AppConfig;
use stepwise_core::agent::{AgentState, RunConfig};
use stepwise_core::counter::RunCounters;
use stepwise_core::event::{DomainEvent, EventBus};

pub struct RunArgs {
    pub prompt: String,
    pub stream: bool,
    pub profile: Option<String>,
    pub max_steps: Option<u32>,
    pub idle_timeout: Option<u64>,
}

pub async fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let run_config = resolve_run_config(&config, args.profile.as_deref(), args.max_steps)?;

    let provider = match stepwise_providers::from_config(&config) {
        Ok(provider) => provider,
        Err(e) => {
            eprintln!();
            eprintln!("  ERROR: {e}");
            eprintln!();
            eprintln!("  Set STEPWISE_API_KEY (or OPENAI_API_KEY), or add api_key to:");
            eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
            eprintln!();
            return Err(e.into());
        }
    };

    let counters = RunCounters::new();
    let event_bus = Arc::new(EventBus::default());
    let tools = Arc::new(stepwise_tools::default_registry(&config, &counters));
    spawn_event_logger(&event_bus);

    let strategy = ToolCallAgent::new(provider, tools)
        .with_event_bus(event_bus.clone())
        .into_strategy();
    let agent = Agent::new(run_config, strategy)?
        .with_counters(counters)
        .with_event_bus(event_bus);

    let state = if args.stream {
        let idle = args
            .idle_timeout
            .unwrap_or(config.agent.stream_idle_timeout_secs);
        let options = StreamOptions::default()
            .with_idle_timeout(Duration::from_secs(idle))
            .with_channel_capacity(config.agent.stream_channel_capacity);
        run_streaming(agent, &args.prompt, options).await?
    } else {
        let mut agent = agent;
        let lines = agent.run(&args.prompt).await?;
        for line in &lines {
            println!("{line}");
        }
        agent.state()
    };

    if state == AgentState::Error {
        return Err("run ended in ERROR state".into());
    }
    Ok(())
}

/// Pick the profile and apply command-line overrides.
fn resolve_run_config(
    config: &AppConfig,
    profile: Option<&str>,
    max_steps: Option<u32>,
) -> Result<RunConfig, Box<dyn std::error::Error>> {
    let name = profile.unwrap_or(&config.agent.profile);
    let mut run_config = config.profile(name)?;
    if let Some(max_steps) = max_steps {
        run_config.max_steps = max_steps;
    }
    run_config.validate()?;
    Ok(run_config)
}

async fn run_streaming<S: StepStrategy + 'static>(
    agent: Agent<S>,
    prompt: &str,
    options: StreamOptions,
) -> Result<AgentState, Box<dyn std::error::Error>> {
    let mut stream = agent.run_streaming(prompt, options)?;

    loop {
        let interrupted = tokio::select! {
            event = stream.recv() => match event {
                Some(RunEvent::Done { .. }) => false,
                Some(event) => {
                    println!("{}", event.content());
                    false
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => true,
        };
        if interrupted && !stream.is_cancelled() {
            eprintln!("  Cancelling after the current step...");
            stream.cancel();
        }
    }

    let agent = stream.join().await?;
    Ok(agent.state())
}

/// Surface tool and loop events in the log.
fn spawn_event_logger(bus: &EventBus) {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match event.as_ref() {
                DomainEvent::ToolExecuted {
                    tool_name,
                    success,
                    duration_ms,
                    ..
                } => tracing::debug!(tool = %tool_name, success, duration_ms, "tool event"),
                DomainEvent::LoopDetected { agent, step, .. } => {
                    tracing::info!(agent = %agent, step, "loop event")
                }
                DomainEvent::AgentStateChanged { agent, from, to, .. } => {
                    tracing::debug!(agent = %agent, %from, %to, "state event")
                }
                DomainEvent::StepCompleted { .. } => {}
            }
        }
    });
}
