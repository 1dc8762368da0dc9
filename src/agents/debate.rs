// =============================================================================
// Debate Agents — adversarial bull and bear argumentation
// =============================================================================
//
// The bull argues for entering, the bear argues against — the bear sees
// the bull's argument and is expected to attack it. Arguments come from
// the language model adapter when one is attached; otherwise a
// deterministic template keyed off the research sentiment stands in, so
// the downstream signal extraction still has something to score.
// =============================================================================

use std::sync::Arc;

use tracing::warn;

use crate::adapters::LanguageModelAdapter;

/// Generates both sides of the debate.
pub struct DebateAgent {
    llm: Option<Arc<dyn LanguageModelAdapter>>,
}

impl DebateAgent {
    pub fn new(llm: Option<Arc<dyn LanguageModelAdapter>>) -> Self {
        Self { llm }
    }

    /// The bullish case for buying the symbol now.
    pub async fn bull_case(
        &self,
        symbol: &str,
        current_price: f64,
        research_summary: Option<&str>,
        sentiment: f64,
    ) -> String {
        if let Some(llm) = &self.llm {
            let prompt = format!(
                "You are a BULL TRADER arguing why {symbol} should be BOUGHT NOW.\n\n\
                 Market data:\n\
                 - Current price: ${current_price}\n\
                 - Research: {}\n\n\
                 Present a strong bullish case with technical signals, fundamental \
                 catalysts, momentum indicators, and the risk/reward ratio. Be \
                 aggressive but data-driven; cite specific metrics.",
                research_summary.unwrap_or("N/A")
            );
            match llm.generate("You are an aggressive bull trader", &prompt).await {
                Ok(text) => return text,
                Err(e) => warn!(symbol, error = %e, "bull argument generation failed, using template"),
            }
        }

        if sentiment >= 0.0 {
            format!(
                "BULL: {symbol} shows positive momentum with an uptrend holding above \
                 support; multi-source research reads favorable and risk/reward supports \
                 a buy near {current_price:.2}."
            )
        } else {
            format!(
                "BULL: despite mixed research, {symbol} holds key support near \
                 {current_price:.2} and a reversal would offer a favorable entry."
            )
        }
    }

    /// The bearish case, written with the bull's argument in view.
    pub async fn bear_case(
        &self,
        symbol: &str,
        current_price: f64,
        research_summary: Option<&str>,
        bull_argument: Option<&str>,
        sentiment: f64,
    ) -> String {
        if let Some(llm) = &self.llm {
            let prompt = format!(
                "You are a BEAR TRADER arguing why {symbol} should be SOLD or AVOIDED.\n\n\
                 Market data:\n\
                 - Current price: ${current_price}\n\
                 - Research: {}\n\
                 - Bull's argument: {}\n\n\
                 Present a strong bearish case with technical warnings, fundamental \
                 risks, overvaluation indicators, and direct counterarguments to the \
                 bull. Be skeptical and risk-focused; cite specific concerns.",
                research_summary.unwrap_or("N/A"),
                bull_argument.unwrap_or("N/A")
            );
            match llm
                .generate("You are a skeptical bear trader focused on risk", &prompt)
                .await
            {
                Ok(text) => return text,
                Err(e) => warn!(symbol, error = %e, "bear argument generation failed, using template"),
            }
        }

        if sentiment <= 0.0 {
            format!(
                "BEAR: {symbol} faces a weak backdrop; research reads negative and the \
                 downtrend below {current_price:.2} points to further decline."
            )
        } else {
            format!(
                "BEAR: {symbol} looks overextended near resistance at {current_price:.2}; \
                 overbought momentum and profit-taking risk a sharp pullback and decline."
            )
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoLlm;

    #[async_trait]
    impl LanguageModelAdapter for EchoLlm {
        async fn generate(&self, _system: &str, user: &str) -> anyhow::Result<String> {
            Ok(format!("LLM says: {}", &user[..20.min(user.len())]))
        }
    }

    struct BrokenLlm;

    #[async_trait]
    impl LanguageModelAdapter for BrokenLlm {
        async fn generate(&self, _system: &str, _user: &str) -> anyhow::Result<String> {
            anyhow::bail!("model unavailable")
        }
    }

    #[tokio::test]
    async fn templates_cover_both_sentiment_signs() {
        let agent = DebateAgent::new(None);

        let bull = agent.bull_case("BTC/USDT", 50_000.0, None, 0.5).await;
        assert!(bull.contains("BULL"));
        assert!(bull.contains("uptrend"));

        let bear = agent
            .bear_case("BTC/USDT", 50_000.0, None, Some(&bull), 0.5)
            .await;
        assert!(bear.contains("BEAR"));
        assert!(bear.contains("pullback"));

        let bear_negative = agent
            .bear_case("BTC/USDT", 50_000.0, None, None, -0.5)
            .await;
        assert!(bear_negative.contains("downtrend"));
    }

    #[tokio::test]
    async fn llm_path_is_used_when_available() {
        let agent = DebateAgent::new(Some(Arc::new(EchoLlm)));
        let bull = agent.bull_case("ETH/USDT", 3000.0, Some("research"), 0.1).await;
        assert!(bull.starts_with("LLM says:"));
    }

    #[tokio::test]
    async fn llm_failure_falls_back_to_template() {
        let agent = DebateAgent::new(Some(Arc::new(BrokenLlm)));
        let bear = agent.bear_case("ETH/USDT", 3000.0, None, None, -0.2).await;
        assert!(bear.contains("BEAR"));
    }
}
