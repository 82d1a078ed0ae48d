use clap::builder::FalseyValueParser;
use clap::{Parser, Subcommand};
use release_crates::commands;
use release_crates::core::config::{PublishOptions, RegistrySettings};
use release_crates::core::error::{RailError, RailResult, print_error};
use release_crates::ui::WorkflowReporter;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Publish the crates of a Cargo workspace in dependency order
#[derive(Parser)]
#[command(name = "release-crates")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(styles = get_styles())]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Publish every publishable crate, dependencies first
  ///
  /// Every flag falls back to the matching GitHub Action input variable.
  Publish(PublishArgs),
}

#[derive(clap::Args)]
struct PublishArgs {
  /// Workspace directory or path to its Cargo.toml
  #[arg(long, env = "INPUT_DIRECTORY", default_value = ".")]
  directory: String,
  /// Registry API token (required unless rehearsing)
  #[arg(long, env = "INPUT_CRATES-TOKEN", default_value = "", hide_env_values = true)]
  crates_token: String,
  /// GitHub token
  #[arg(long, env = "INPUT_GITHUB-TOKEN", default_value = "", hide_env_values = true)]
  github_token: String,
  /// Run `cargo publish --dry-run` and don't wait for the registry
  #[arg(long, env = "INPUT_DRY-RUN", value_parser = FalseyValueParser::new())]
  dry_run: bool,
  /// Allow publishing with uncommitted changes
  #[arg(long, env = "INPUT_ALLOW-DIRTY", value_parser = FalseyValueParser::new())]
  allow_dirty: bool,
  /// Skip crates older than the newest version in the registry
  #[arg(long, env = "INPUT_ONLY-NEWEST", value_parser = FalseyValueParser::new())]
  only_newest: bool,
  /// Crate whose version is tagged as `v{version}` once published
  #[arg(long, env = "INPUT_TAG-CRATE", default_value = "")]
  tag_crate: String,
  /// Extra arguments for `cargo publish`, separated by whitespace
  #[arg(long, env = "INPUT_ARGUMENTS", default_value = "", allow_hyphen_values = true)]
  arguments: String,
  /// Run cargo with --dry-run and keep tags local
  #[arg(long)]
  no_push: bool,
  /// Print the publish report as JSON
  #[arg(long)]
  json: bool,
}

fn get_styles() -> clap::builder::Styles {
  clap::builder::Styles::styled()
    .usage(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .header(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
    )
    .literal(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))))
    .invalid(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .error(
      anstyle::Style::new()
        .bold()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red))),
    )
    .valid(
      anstyle::Style::new()
        .bold()
        .underline()
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
    )
    .placeholder(anstyle::Style::new().fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::White))))
}

fn main() {
  tracing_subscriber::registry()
    .with(
      tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "release_crates=info".into()),
    )
    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    .init();

  let cli = Cli::parse();

  let result = match cli.command {
    Commands::Publish(args) => publish(args),
  };

  if let Err(err) = result {
    handle_error(err);
  }
}

fn publish(args: PublishArgs) -> RailResult<()> {
  let cwd = std::env::current_dir()?;
  let options = PublishOptions::from_inputs(
    &cwd,
    &args.github_token,
    &args.crates_token,
    &args.directory,
    args.dry_run,
    args.allow_dirty,
    args.only_newest,
    &args.tag_crate,
    &args.arguments,
  )
  // Set by cargo for `cargo run` and cargo subcommands
  .with_cargo(std::env::var_os("CARGO").filter(|v| !v.is_empty()).map(PathBuf::from));
  let settings = RegistrySettings::load(&options.repository_dir())?;

  // Workflow commands only mean something inside GitHub Actions
  let annotations = std::env::var("GITHUB_ACTIONS").is_ok_and(|v| v == "true");
  let output_file = std::env::var_os("GITHUB_OUTPUT")
    .filter(|v| !v.is_empty())
    .map(PathBuf::from);
  let reporter = WorkflowReporter::new(annotations, output_file);

  commands::run_publish(&options, &settings, !args.no_push, &reporter, args.json)
}

fn handle_error(err: RailError) -> ! {
  print_error(&err);
  std::process::exit(err.exit_code().as_i32());
}
