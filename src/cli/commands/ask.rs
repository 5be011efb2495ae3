//! Ask command implementation.

use crate::cli::{App, Output};
use crate::config::Settings;
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(input: &str, question: &str, top_k: Option<usize>, mut settings: Settings) -> Result<()> {
    if let Some(k) = top_k {
        settings.retrieval.top_k = k;
        settings.validate()?;
    }

    let app = App::new(settings)?;

    let (source, _) = match app.load(input).await {
        Ok(loaded) => loaded,
        Err(e) => {
            Output::error(&format!("Failed to load {}: {}", input, e));
            return Err(e.into());
        }
    };

    let spinner = Output::spinner("Thinking...");
    let result = app.engine().ask(&source.id, question).await;
    spinner.finish_and_clear();

    match result {
        Ok(answer) => {
            println!("\n{}\n", answer.text);

            if !answer.sources.is_empty() {
                Output::header("Sources");
                for source in &answer.sources {
                    Output::excerpt(
                        source.rank,
                        source.timestamp.as_deref(),
                        source.score,
                        &source.excerpt,
                        source.url.as_deref(),
                    );
                }
            }
        }
        Err(e) => {
            Output::error(&format!("Failed to generate answer: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
