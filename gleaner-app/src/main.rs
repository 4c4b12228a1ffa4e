use anyhow::{Context, Result};
use clap::Parser;
use gleaner_common::observability::init_logging;
use gleaner_config::{GleanerConfig, GleanerConfigLoader};
use gleaner_llm::inference::RetryPolicy;
use gleaner_llm::{ensure_llm_ready, extraction_inference};
use gleaner_pipeline::{ExtractionStatus, Pipeline, PipelineError, PipelineOptions, scrape_page};
use gleaner_web::fetcher_from_config;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

mod cli;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // 1) Config: file (if any), then env, then flags
    let loader = match &cli.global.config {
        Some(path) => GleanerConfigLoader::new().with_file(path),
        None => GleanerConfigLoader::new().with_default_file(),
    };
    let mut cfg: GleanerConfig = loader.load().context("failed to load configuration")?;
    cli.global.apply(&mut cfg);

    let log_path = init_logging(cfg.logging.log_config("gleaner"))?;
    tracing::debug!(log = %log_path.display(), "logging initialised");

    match cli.command {
        Commands::Config => {
            print!("{}", cfg.to_yaml()?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Scrape { url } => scrape(&cfg, &url).await,
        Commands::Extract {
            url,
            describe,
            max_chunk_len,
            show_content,
        } => {
            if let Some(n) = max_chunk_len {
                cfg.chunking.max_chunk_len = n;
            }
            extract(&cfg, &url, &describe, show_content).await
        }
    }
}

async fn scrape(cfg: &GleanerConfig, url: &str) -> Result<ExitCode> {
    let fetcher = fetcher_from_config(&cfg.fetch)?;
    let page = match scrape_page(fetcher.as_ref(), url).await {
        Ok(page) => page,
        Err(err) => return Ok(report(&err)),
    };
    if let Some(title) = &page.title {
        eprintln!("# {title}");
    }
    println!("{}", page.text);
    Ok(ExitCode::SUCCESS)
}

async fn extract(
    cfg: &GleanerConfig,
    url: &str,
    description: &str,
    show_content: bool,
) -> Result<ExitCode> {
    let options = PipelineOptions {
        max_chunk_len: cfg.chunking.max_chunk_len,
    };
    if let Err(err) = options.validate() {
        return Ok(report(&err));
    }

    // Fetch before connecting so a bad URL never waits on a model pull.
    let fetcher = fetcher_from_config(&cfg.fetch)?;
    let page = match scrape_page(fetcher.as_ref(), url).await {
        Ok(page) => page,
        Err(err) => return Ok(report(&err)),
    };
    if show_content {
        eprintln!("{}\n---", page.text);
    }

    let client = ensure_llm_ready(&cfg.llm)
        .await
        .context("language model is not available")?;
    let retry = RetryPolicy::new(
        cfg.extraction.retries,
        Duration::from_millis(cfg.extraction.retry_backoff_ms),
    );
    let inference = extraction_inference(client, &cfg.llm, retry);

    let cancel = CancellationToken::new();
    watch_ctrl_c(cancel.clone());

    let pipeline = Pipeline::new(fetcher, inference)
        .with_options(options)
        .with_observer(Arc::new(|index: usize, total: usize| {
            eprintln!("extracted chunk {index} of {total}");
        }));

    match pipeline
        .extract_text_with_cancellation(&page.text, description, &cancel)
        .await
    {
        Ok(extraction) => {
            println!("{}", extraction.output());
            if let ExtractionStatus::Cancelled { processed, total } = extraction.status() {
                eprintln!("[partial] cancelled after {processed} of {total} chunks");
                return Ok(ExitCode::from(130));
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => Ok(report(&err)),
    }
}

fn report(err: &PipelineError) -> ExitCode {
    eprintln!("gleaner: {err}");
    tracing::error!(stage = %err.stage, url = ?err.url, error = %err, "pipeline failed");
    ExitCode::FAILURE
}

/// First Ctrl-C stops after the chunk in flight; a second one exits at once.
fn watch_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        eprintln!("cancelling after the current chunk (Ctrl-C again to abort)");
        cancel.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Config whose model endpoint has nothing listening.
    fn offline_model_config() -> GleanerConfig {
        let mut cfg = GleanerConfig::default();
        cfg.llm.endpoint = "http://127.0.0.1:9".to_string();
        cfg.fetch.timeout_secs = 5;
        cfg
    }

    #[tokio::test]
    async fn zero_budget_is_rejected_before_fetching() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>x</p>"))
            .expect(0)
            .mount(&server)
            .await;

        let mut cfg = offline_model_config();
        cfg.chunking.max_chunk_len = 0;
        for show_content in [false, true] {
            let outcome = extract(&cfg, &server.uri(), "x", show_content).await;
            assert!(outcome.is_ok(), "{outcome:?}");
        }
        server.verify().await;
    }

    #[tokio::test]
    async fn fetch_failure_is_reported_without_touching_the_model() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        // An offline model endpoint would surface as Err, not as a reported failure.
        let outcome = extract(&offline_model_config(), &server.uri(), "x", false).await;
        assert!(outcome.is_ok(), "{outcome:?}");
        server.verify().await;
    }
}
