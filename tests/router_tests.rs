//! Router-level invariants reachable through the public surface: sentinel
//! augmentation and system prompt composition.

use cloudllm::{Agent, Provider, ProviderKind, Router};

fn sample_router() -> Router {
    let agents = vec![
        Agent::new("planner", "Plan the work.", "gpt-5", "openai"),
        Agent::new("coder", "Write the code.", "gpt-5", "openai"),
        Agent::new("reviewer", "Review the code.", "gpt-5", "openai"),
    ];
    let providers = vec![Provider::new("openai", ProviderKind::OpenAi, "sk-test")];
    Router::new(agents, Vec::new(), providers)
}

#[test]
fn every_agents_schema_list_ends_with_call_agent_then_finish() {
    let router = sample_router();
    for name in ["planner", "coder", "reviewer"] {
        let agent = router.get_agent(name).unwrap().clone();
        let schemas = router.build_tool_schemas(&agent);
        assert!(schemas.len() >= 2);
        assert_eq!(schemas[schemas.len() - 2]["name"], "call_agent");
        assert_eq!(schemas[schemas.len() - 1]["name"], "finish");
    }
}

#[test]
fn call_agent_schema_requires_agent_name_and_message() {
    let router = sample_router();
    let agent = router.get_agent("planner").unwrap().clone();
    let schemas = router.build_tool_schemas(&agent);
    let call_agent = &schemas[schemas.len() - 2];
    let required: Vec<&str> = call_agent["parameters"]["required"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(required, vec!["agent_name", "message"]);
}

#[test]
fn finish_schema_requires_message() {
    let router = sample_router();
    let agent = router.get_agent("planner").unwrap().clone();
    let schemas = router.build_tool_schemas(&agent);
    let finish = &schemas[schemas.len() - 1];
    let required: Vec<&str> = finish["parameters"]["required"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(required, vec!["message"]);
}

#[test]
fn system_prompt_lists_every_other_agent_but_not_itself() {
    let router = sample_router();
    let agent = router.get_agent("coder").unwrap().clone();
    let prompt = router.build_system_prompt(&agent);
    assert!(prompt.starts_with("You are \"coder\"."));
    assert!(prompt.contains("planner"));
    assert!(prompt.contains("reviewer"));
    assert!(!prompt.contains("- coder:"));
}

#[test]
fn single_agent_system_prompt_omits_the_delegation_roster() {
    let agents = vec![Agent::new("solo", "Do it all.", "gpt-5", "openai")];
    let providers = vec![Provider::new("openai", ProviderKind::OpenAi, "sk-test")];
    let router = Router::new(agents, Vec::new(), providers);
    let agent = router.get_agent("solo").unwrap().clone();
    let prompt = router.build_system_prompt(&agent);
    assert!(!prompt.contains("Available agents"));
}

#[test]
fn unknown_agent_name_is_a_routing_error() {
    let router = sample_router();
    assert!(router.get_agent("ghost").is_err());
}

#[test]
fn unknown_tool_name_is_a_tool_error() {
    let router = sample_router();
    assert!(router.get_tool("ghost").is_err());
}
