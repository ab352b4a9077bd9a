//! Planner/coder handoff
//!
//! A minimal two-agent delegation run: a `planner` agent breaks the task
//! down and delegates the implementation step to a `coder` agent via the
//! `call_agent` sentinel tool, then returns the coder's result as its own.
//!
//! Run with:
//! ```bash
//! export OPENAI_API_KEY=your_openai_key
//! cargo run --example planner_coder_handoff
//! ```

use cloudllm::{async_run, Agent, Provider, ProviderKind};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let api_key = std::env::var("OPENAI_API_KEY").expect("OPENAI_API_KEY must be set");
    let provider = Provider::new("openai", ProviderKind::OpenAi, api_key);

    let planner = Agent::new(
        "planner",
        "Break the user's request into one concrete implementation step, \
         delegate it to \"coder\", and finish with the result you get back.",
        "gpt-5",
        "openai",
    );
    let coder = Agent::new(
        "coder",
        "Implement whatever step you're asked to implement, in a few \
         sentences of plain-language description, and finish with it.",
        "gpt-5",
        "openai",
    );

    let result = async_run(
        "planner",
        "Add a health-check endpoint to a small HTTP service.",
        vec![planner, coder],
        Vec::new(),
        vec![provider],
        true,
    )
    .await?;

    println!("output: {}", result.output);
    println!("\n{}", result.format_trace());
    Ok(())
}
