// Line-oriented chat on the terminal: one resolution per line of input.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use tracing::{error, info};

use crate::resolver::{AnswerSource, Resolution, Resolver};

/// Writes a resolved answer under the heading matching where it came from.
pub fn print_resolution<W: Write>(out: &mut W, resolution: &Resolution) -> Result<()> {
    let heading = match resolution.source {
        AnswerSource::Dataset => "Recommended Movies:",
        AnswerSource::Generated => "Answer (From AI Model):",
    };
    writeln!(out, "{}\n{}", heading, resolution.text)?;
    Ok(())
}

/// Reads queries until EOF, `exit` or `quit`. Blank lines are skipped.
///
/// A failed generation is reported and the loop carries on with the next query.
pub async fn run_chat<R: BufRead, W: Write>(resolver: &Resolver, input: R, mut out: W) -> Result<usize> {
    info!("Starting chat session...");
    writeln!(out, "Enter a genre or a question (\"exit\" to quit).")?;
    out.flush()?;

    let mut answered = 0;
    for line in input.lines() {
        let line = line.context("Failed to read from stdin")?;
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("exit") || query.eq_ignore_ascii_case("quit") {
            break;
        }

        match resolver.resolve(query).await {
            Ok(resolution) => {
                print_resolution(&mut out, &resolution)?;
                answered += 1;
            }
            Err(e) => {
                error!("Text generation failed: {:?}", e);
                writeln!(out, "Error: {}", e)?;
            }
        }
        out.flush()?;
    }

    info!(answered, "Chat session finished");
    Ok(answered)
}
