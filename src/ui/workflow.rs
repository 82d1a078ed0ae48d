//! GitHub Actions workflow commands and step outputs
//!
//! Inside Actions, groups and annotations are emitted as `::command::` lines
//! and outputs are appended to the `$GITHUB_OUTPUT` file. Elsewhere the same
//! calls print plain status lines and outputs go to stdout.

use crate::core::error::{RailResult, ResultExt};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// Status reporter for a publish run
#[derive(Debug, Clone, Default)]
pub struct WorkflowReporter {
  annotations: bool,
  output_file: Option<PathBuf>,
}

impl WorkflowReporter {
  pub fn new(annotations: bool, output_file: Option<PathBuf>) -> Self {
    Self {
      annotations,
      output_file,
    }
  }

  /// Plain text reporter that prints outputs to stdout
  pub fn plain() -> Self {
    Self::default()
  }

  pub fn start_group(&self, title: &str) {
    if self.annotations {
      println!("::group::{}", escape_data(title));
    } else {
      println!("\n📦 {}", title);
    }
  }

  pub fn end_group(&self) {
    if self.annotations {
      println!("::endgroup::");
    }
  }

  pub fn notice(&self, message: &str) {
    if self.annotations {
      println!("::notice::{}", escape_data(message));
    } else {
      println!("✅ {}", message);
    }
  }

  pub fn warning(&self, message: &str) {
    if self.annotations {
      println!("::warning::{}", escape_data(message));
    } else {
      println!("⚠️  {}", message);
    }
  }

  /// Record a step output
  pub fn set_output(&self, name: &str, value: &str) -> RailResult<()> {
    let Some(path) = &self.output_file else {
      println!("{}={}", name, value);
      return Ok(());
    };

    let mut file = OpenOptions::new()
      .create(true)
      .append(true)
      .open(path)
      .with_context(|| format!("Failed to open output file {}", path.display()))?;

    let entry = if value.contains('\n') {
      let delimiter = delimiter_for(value);
      format!("{}<<{}\n{}\n{}\n", name, delimiter, value, delimiter)
    } else {
      format!("{}={}\n", name, value)
    };
    file
      .write_all(entry.as_bytes())
      .with_context(|| format!("Failed to write output \"{}\"", name))?;
    Ok(())
  }
}

/// Workflow command data may not contain raw newlines
fn escape_data(value: &str) -> String {
  value.replace('%', "%25").replace('\r', "%0D").replace('\n', "%0A")
}

fn delimiter_for(value: &str) -> String {
  let mut delimiter = "EOF".to_string();
  while value.lines().any(|line| line == delimiter) {
    delimiter.push('_');
  }
  delimiter
}
