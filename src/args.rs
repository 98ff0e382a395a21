use clap::Parser;
use shadow_rs::shadow;

shadow!(build);

// Command line args
#[derive(Parser)]
#[clap(version = build::CLAP_LONG_VERSION)]
#[clap(about = "Judging pipeline for untrusted code submissions.", long_about = None)]
pub struct Args {
  #[clap(short, long, value_parser)]
  pub config_search_path: Vec<String>,

  /// Path of a JSON file holding the parsed problem set to serve.
  #[clap(short, long, value_parser)]
  pub problems: Option<String>,
}
