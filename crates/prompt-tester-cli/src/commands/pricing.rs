use anyhow::Result;

use prompt_tester_core::models::TokenUsage;

use crate::app::App;

pub async fn handle(
    app: &App,
    model_id: &str,
    prompt_tokens: u32,
    completion_tokens: u32,
) -> Result<()> {
    let Some(pricing) = app.pricing.pricing(model_id).await else {
        println!("No pricing known for {}", model_id);
        return Ok(());
    };

    println!("{}", model_id);
    println!("  prompt:     ${:.2} / 1M tokens", pricing.prompt * 1_000_000.0);
    println!("  completion: ${:.2} / 1M tokens", pricing.completion * 1_000_000.0);

    if prompt_tokens > 0 || completion_tokens > 0 {
        let cost = pricing.cost(TokenUsage::new(prompt_tokens, completion_tokens));
        println!(
            "  {} in / {} out: ${:.6}",
            prompt_tokens, completion_tokens, cost
        );
    }
    Ok(())
}
