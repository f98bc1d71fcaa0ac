// ============================================================
// Layer 6 — Command Annotator
// ============================================================
// Runs an external dependency parser once per sentence and reads
// its CoNLL-U output.
//
//   tokens ──stdin──▶ [ parser command ] ──stdout──▶ CoNLL-U
//                                                      │
//                                                      ▼
//                                             Vec<TokenTag>
//
// The command is configured as one string, e.g.
//   "python -m my_parser --lang {lang} --pretokenized"
// where {lang} is replaced by the configured language. Input is
// the pre-tokenized sentence on one line, tokens separated by a
// single space.
//
// CoNLL-U columns:
//   ID FORM LEMMA UPOS XPOS FEATS HEAD DEPREL DEPS MISC
// XPOS is used, falling back to UPOS when XPOS is "_".
// Multi-word ranges (1-2) and empty nodes (1.1) are skipped.

use std::io::{self, Write};
use std::process::{Child, Command, Stdio};

use anyhow::{bail, Context, Result};

use crate::domain::traits::{Annotator, TokenTag};

const LANG_PLACEHOLDER: &str = "{lang}";

pub struct CommandAnnotator {
    program: String,
    args:    Vec<String>,
}

impl CommandAnnotator {
    pub fn new(command_line: &str, language: &str) -> Result<Self> {
        let mut parts = command_line
            .split_whitespace()
            .map(|p| p.replace(LANG_PLACEHOLDER, language));

        let Some(program) = parts.next() else {
            bail!("annotator command is empty");
        };
        Ok(Self { program, args: parts.collect() })
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Annotator for CommandAnnotator {
    fn annotate(&self, tokens: &[String]) -> Result<Vec<TokenTag>> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Cannot start annotator '{}'", self.program))?;

        write_line(&mut child, &tokens.join(" "))?;

        let output = child.wait_with_output().context("Annotator did not finish")?;
        if !output.status.success() {
            bail!(
                "annotator exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        parse_conllu(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Send one line to the child and close its stdin.
/// On failure the child is killed and reaped before returning.
fn write_line(child: &mut Child, line: &str) -> Result<()> {
    let written = match child.stdin.take() {
        Some(mut stdin) => writeln!(stdin, "{line}"),
        None => Err(io::Error::new(io::ErrorKind::BrokenPipe, "annotator stdin is not piped")),
    };

    if let Err(e) = written {
        let _ = child.kill();
        let _ = child.wait();
        return Err(e).context("Cannot write to annotator");
    }
    Ok(())
}

/// Token rows of a CoNLL-U document, in order.
pub fn parse_conllu(text: &str) -> Result<Vec<TokenTag>> {
    let mut tags = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 7 {
            bail!("CoNLL-U line {} has {} columns: '{}'", line_no + 1, cols.len(), line);
        }
        if cols[0].contains('-') || cols[0].contains('.') {
            continue;
        }

        let xpos = if cols[4] != "_" { cols[4] } else { cols[3] };
        let head = cols[6]
            .parse::<usize>()
            .with_context(|| format!("CoNLL-U line {} has head '{}'", line_no + 1, cols[6]))?;

        tags.push(TokenTag { xpos: xpos.to_string(), head });
    }

    Ok(tags)
}
