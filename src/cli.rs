//! Minimal CLI: check JSON documents against a schema descriptor.
use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use crate::dataset::Config;
use crate::descriptor;
use crate::parse;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// validate JSON documents against a JSON schema descriptor
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// validate each input document and report its issues
    Check(CheckArgs),
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// schema descriptor file (JSON)
    #[arg(short, long)]
    schema: PathBuf,

    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    /// stop at the first issue per document
    #[arg(long, default_value_t = false)]
    abort_early: bool,

    /// stop each action pipeline at its first issue
    #[arg(long, default_value_t = false)]
    abort_pipe_early: bool,

    /// print issues as a JSON array instead of human-readable lines
    #[arg(long, default_value_t = false)]
    json: bool,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Check(args) => args.run(),
        }
    }
}

impl CheckArgs {
    fn run(&self) -> anyhow::Result<()> {
        let schema_src = std::fs::read_to_string(&self.schema)
            .with_context(|| format!("failed to read schema file {}", self.schema.display()))?;
        let schema = descriptor::schema_from_str(&schema_src)
            .with_context(|| format!("invalid schema descriptor {}", self.schema.display()))?;

        let config = Config {
            abort_early: self.abort_early,
            abort_pipe_early: self.abort_pipe_early,
            lang: None,
        };

        let source_paths = resolve_file_path_patterns(&self.input)?;
        let mut failed = 0usize;
        for source_path in &source_paths {
            let display = source_path.display();
            let source = std::fs::read_to_string(source_path)
                .with_context(|| format!("failed to read input file {display}"))?;
            let value: serde_json::Value = serde_json::from_str(&source)
                .with_context(|| format!("failed to parse JSON input file {display}"))?;

            let output = parse::safe_parse(&schema, value, &config)?;
            if output.is_ok() {
                println!("{} {display}", "✓".green());
                continue;
            }

            failed += 1;
            println!("{} {display}", "✗".red());
            if self.json {
                println!("{}", serde_json::to_string_pretty(&output.issues)?);
            } else {
                for issue in &output.issues {
                    let path = issue.dot_path();
                    if path.is_empty() {
                        println!("  {}", issue.message);
                    } else {
                        println!("  {}: {}", path.bold(), issue.message);
                    }
                }
            }
        }

        if failed > 0 {
            bail!("{failed} of {} documents failed validation", source_paths.len());
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                // Pattern was explicitly a glob but matched nothing -> surface as an error
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            // Treat as a literal path
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_paths_pass_through_unresolved() {
        let paths = resolve_file_path_patterns(["a.json", "dir/b.json"]).unwrap();
        assert_eq!(paths, vec![PathBuf::from("a.json"), PathBuf::from("dir/b.json")]);
    }

    #[test]
    fn empty_glob_is_an_error() {
        let err = resolve_file_path_patterns(["no-such-dir-ever/*.json"]).unwrap_err();
        assert!(err.to_string().contains("matched no files"));
    }
}
