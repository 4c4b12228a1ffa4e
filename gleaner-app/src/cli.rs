use clap::{Args, Parser, Subcommand};
use gleaner_common::FetchMode;
use gleaner_config::GleanerConfig;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "gleaner",
    about = "Extract information from a web page with a local language model",
    version
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// Config file (defaults to ./gleaner.yaml, then the user config dir)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Load pages in a WebDriver-controlled browser instead of plain HTTP
    #[arg(long, global = true)]
    pub browser: bool,

    /// WebDriver endpoint used with --browser
    #[arg(long, global = true, value_name = "URL")]
    pub webdriver: Option<String>,

    /// Ollama model name
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Ollama endpoint
    #[arg(long, global = true, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Mirror log events to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch a page and print its clean text
    Scrape {
        url: String,
    },
    /// Fetch a page and extract what --describe asks for
    Extract {
        url: String,
        /// What to extract, in plain language
        #[arg(short, long)]
        describe: String,
        /// Override the chunk budget, in characters
        #[arg(long, value_name = "N")]
        max_chunk_len: Option<usize>,
        /// Print the scraped text to stderr before extracting
        #[arg(long)]
        show_content: bool,
    },
    /// Print the effective configuration
    Config,
}

impl GlobalArgs {
    /// Fold command-line overrides into the loaded configuration.
    pub fn apply(&self, config: &mut GleanerConfig) {
        if self.browser {
            config.fetch.mode = FetchMode::Browser;
        }
        if let Some(url) = &self.webdriver {
            config.fetch.webdriver_url = url.clone();
        }
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
        if let Some(endpoint) = &self.endpoint {
            config.llm.endpoint = endpoint.clone();
        }
        if self.verbose {
            config.logging.stderr = true;
        }
    }
}
