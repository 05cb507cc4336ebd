//! Capabilities command - classifier report for one model id

use clap::Args;
use serde::Serialize;

use crate::domain::capability::{
    capability_report, model_family, reasoning_effort_options, supports_reasoning_effort,
    supports_temperature_and_top_p, thinking_budget, thinking_token_limit, ModelFamily,
};
use crate::domain::{Model, ModelCapability, Provider, ReasoningEffort};

/// Arguments for the capabilities command
#[derive(Args, Clone, Debug)]
pub struct CapabilitiesArgs {
    /// Model id, optionally provider-prefixed (e.g. "deepseek/deepseek-r1")
    pub model: String,

    /// Provider id from the config file, for provider-scoped rules
    #[arg(long, short)]
    pub provider: Option<String>,

    /// Display name, used for opaque endpoint ids
    #[arg(long)]
    pub name: Option<String>,

    /// max_tokens the thinking budget is capped against
    #[arg(long)]
    pub max_tokens: Option<u32>,

    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct Report {
    model: String,
    family: ModelFamily,
    capabilities: Vec<(ModelCapability, bool)>,
    sampling_parameters: bool,
    reasoning_effort_param: bool,
    thinking_tokens: Option<(u32, u32)>,
    budgets: Vec<(ReasoningEffort, Option<u32>)>,
}

pub async fn run(args: CapabilitiesArgs) -> anyhow::Result<()> {
    let config = super::bootstrap();

    let (provider, mut model) = match args.provider.as_deref() {
        Some(id) => {
            let entry = config.provider(id)?;
            (Some(entry.to_provider()), entry.model(&args.model))
        }
        None => (None, Model::new(args.model.clone(), "local")),
    };
    if let Some(name) = &args.name {
        model = model.with_name(name.clone());
    }

    let report = build_report(&model, provider.as_ref(), args.max_tokens);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn build_report(model: &Model, provider: Option<&Provider>, max_tokens: Option<u32>) -> Report {
    let budgets = reasoning_effort_options(model, provider)
        .iter()
        .map(|effort| (*effort, thinking_budget(model, *effort, max_tokens)))
        .collect();

    Report {
        model: model.id().to_string(),
        family: model_family(model),
        capabilities: capability_report(model, provider),
        sampling_parameters: supports_temperature_and_top_p(model),
        reasoning_effort_param: supports_reasoning_effort(model, provider),
        thinking_tokens: thinking_token_limit(model.id()).map(|limit| (limit.min, limit.max)),
        budgets,
    }
}

fn print_report(report: &Report) {
    println!("{} ({:?})", report.model, report.family);
    for (kind, supported) in &report.capabilities {
        println!("  {:<18} {}", kind.as_str(), if *supported { "yes" } else { "no" });
    }
    println!("  {:<18} {}", "temperature/top_p", report.sampling_parameters);
    println!("  {:<18} {}", "reasoning_effort", report.reasoning_effort_param);

    if let Some((min, max)) = report.thinking_tokens {
        println!("  thinking tokens    {}..={}", min, max);
    }
    for (effort, budget) in &report.budgets {
        match budget {
            Some(tokens) => println!("  budget {:<11} {}", effort.as_str(), tokens),
            None => println!("  budget {:<11} dynamic", effort.as_str()),
        }
    }
}
