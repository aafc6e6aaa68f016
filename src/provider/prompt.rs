//! Interactive provider: print an analysis prompt and read the answer back.

use std::io::{self, BufRead, BufReader, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};

use super::{ClassificationRequest, ProviderReply, SemanticProvider};
use crate::error::ProviderError;

/// How often a waiting request checks whether a newer one replaced it.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Render the human-readable analysis request for a batch.
pub fn build_analysis_prompt(request: &ClassificationRequest) -> String {
    let mut out = String::new();

    out.push_str("# Document Structure Analysis Request\n\n");
    out.push_str("## Document Context\n");
    out.push_str(&format!(
        "- **File**: {}\n",
        request.document_name.as_deref().unwrap_or("Unknown")
    ));
    match request.page_index {
        Some(page) => out.push_str(&format!(
            "- **Page**: {} of {}\n",
            page + 1,
            request.page_count
        )),
        None => out.push_str(&format!("- **Pages**: {}\n", request.page_count)),
    }
    out.push_str(&format!("- **Text Blocks**: {}\n\n", request.spans.len()));

    out.push_str(
        "## Analysis Task\n\
         Classify the semantic role of each text block below.\n\
         \n\
         **Roles:**\n\
         - `title`: main document title (same as heading level 1)\n\
         - `heading` with `level` 1-6, or `heading1` .. `heading6`\n\
         - `paragraph`: regular body text\n\
         - `list_item` with `level` = nesting depth starting at 0\n\
         - `table_cell`: table content\n\
         - `caption`: image or table caption\n\
         \n\
         ## Text Blocks\n",
    );

    for span in &request.spans {
        let mut style = Vec::new();
        if span.is_bold {
            style.push("BOLD");
        }
        if span.is_italic {
            style.push("ITALIC");
        }
        let style = if style.is_empty() {
            String::new()
        } else {
            format!(" [{}]", style.join(", "))
        };
        out.push_str(&format!(
            "Block {}: Font: {:.1}pt{} | Page {} | Position: [{:.0}, {:.0}, {:.0}, {:.0}]\n",
            span.order_index,
            span.font_size,
            style,
            span.page_index + 1,
            span.bbox.x0,
            span.bbox.y0,
            span.bbox.x1,
            span.bbox.y1
        ));
        out.push_str(&format!("Text: {}\n", span.text));
        if !span.font_name.is_empty() {
            out.push_str(&format!("Font: {}\n", span.font_name));
        }
        out.push('\n');
    }

    out.push_str(
        "## Expected Response Format\n\
         Reply with a JSON object keyed by block number:\n\
         \n\
         ```json\n\
         {\n  \"hints\": {\n    \"0\": {\"role\": \"heading\", \"level\": 1},\n    \"1\": {\"role\": \"paragraph\"}\n  }\n}\n\
         ```\n\
         \n\
         Blocks you leave out keep their automatic classification.\n",
    );

    out
}

/// A provider that asks a person (or a tool watching the terminal).
///
/// The prompt is written to `writer`. Input is read line by line on a
/// dedicated thread, and the answer is collected until the JSON object
/// closes, a line reading `END`, or end of input. An empty first line means
/// "no answer".
///
/// Requests take turns on the input: a request that outlived its timeout
/// stops reading as soon as a newer request starts, before the newer prompt
/// is printed, so it never consumes an answer meant for someone else.
pub struct PromptProvider {
    lines: Mutex<Receiver<String>>,
    writer: Mutex<Box<dyn Write + Send>>,
    generation: AtomicU64,
}

impl PromptProvider {
    /// Create a provider over arbitrary streams.
    pub fn new(reader: impl BufRead + Send + 'static, writer: impl Write + Send + 'static) -> Self {
        let (tx, rx) = unbounded();
        thread::spawn(move || {
            let mut reader = reader;
            loop {
                let mut line = String::new();
                match reader.read_line(&mut line) {
                    Ok(0) => break,
                    Ok(_) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        log::warn!("stopped reading prompt answers: {}", e);
                        break;
                    }
                }
            }
        });

        Self {
            lines: Mutex::new(rx),
            writer: Mutex::new(Box::new(writer)),
            generation: AtomicU64::new(0),
        }
    }

    /// Prompt on stderr, read from stdin.
    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stderr())
    }

    fn write_prompt(&self, prompt: &str) -> io::Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| io::Error::other("prompt writer lock poisoned"))?;
        writeln!(writer, "{}", "=".repeat(80))?;
        write!(writer, "{}", prompt)?;
        writeln!(writer, "{}", "=".repeat(80))?;
        writeln!(
            writer,
            "Paste the JSON response, or press Enter to keep the automatic classification:"
        )?;
        writer.flush()
    }

    fn ask(&self, prompt: &str) -> Result<String, ProviderError> {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let lines = self
            .lines
            .lock()
            .map_err(|_| ProviderError::Failed("prompt input lock poisoned".into()))?;
        if self.generation.load(Ordering::SeqCst) != ticket {
            return Err(ProviderError::Disconnected);
        }

        self.write_prompt(prompt)
            .map_err(|e| ProviderError::Failed(e.to_string()))?;

        let mut answer = String::new();
        let mut depth: i64 = 0;
        let mut opened = false;
        loop {
            if self.generation.load(Ordering::SeqCst) != ticket {
                // Replaced by a newer request; leave the input to it.
                return Err(ProviderError::Disconnected);
            }
            let line = match lines.recv_timeout(POLL_INTERVAL) {
                Ok(line) => line,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };

            let trimmed = line.trim();
            if answer.is_empty() && trimmed.is_empty() {
                break;
            }
            if trimmed == "END" {
                break;
            }
            for c in trimmed.chars() {
                match c {
                    '{' => {
                        depth += 1;
                        opened = true;
                    }
                    '}' => depth -= 1,
                    _ => {}
                }
            }
            answer.push_str(&line);
            if opened && depth <= 0 {
                break;
            }
        }
        Ok(answer)
    }
}

impl SemanticProvider for PromptProvider {
    fn name(&self) -> &str {
        "prompt"
    }

    fn classify(&self, request: &ClassificationRequest) -> Result<ProviderReply, ProviderError> {
        let prompt = build_analysis_prompt(request);
        let answer = self.ask(&prompt)?;

        if answer.trim().is_empty() {
            log::info!("no answer entered; keeping automatic classification");
            Ok(ProviderReply::NoAnswer)
        } else {
            Ok(ProviderReply::Text(answer))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BBox;
    use crate::provider::SpanSummary;
    use std::io::Cursor;

    fn request() -> ClassificationRequest {
        ClassificationRequest {
            document_name: Some("report.pdf".into()),
            page_index: Some(0),
            page_count: 3,
            spans: vec![SpanSummary {
                order_index: 7,
                text: "Overview".into(),
                font_size: 18.0,
                is_bold: true,
                is_italic: false,
                page_index: 0,
                font_name: "Helvetica-Bold".into(),
                bbox: BBox::new(72.0, 80.0, 200.0, 100.0),
            }],
        }
    }

    #[test]
    fn test_build_analysis_prompt() {
        let prompt = build_analysis_prompt(&request());
        assert!(prompt.contains("**File**: report.pdf"));
        assert!(prompt.contains("**Page**: 1 of 3"));
        assert!(prompt.contains("Block 7: Font: 18.0pt [BOLD] | Page 1"));
        assert!(prompt.contains("Text: Overview"));
        assert!(prompt.contains("\"hints\""));
    }

    #[test]
    fn test_prompt_provider_reads_json() {
        let input = Cursor::new("{\"hints\": {\n\"7\": {\"role\": \"title\"}\n}}\nignored\n");
        let provider = PromptProvider::new(input, Vec::new());
        match provider.classify(&request()).unwrap() {
            ProviderReply::Text(text) => {
                assert!(text.contains("\"7\""));
                assert!(!text.contains("ignored"));
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[test]
    fn test_prompt_provider_empty_answer() {
        let provider = PromptProvider::new(Cursor::new("\n"), Vec::new());
        assert_eq!(provider.classify(&request()).unwrap(), ProviderReply::NoAnswer);

        let provider = PromptProvider::new(Cursor::new(""), Vec::new());
        assert_eq!(provider.classify(&request()).unwrap(), ProviderReply::NoAnswer);
    }
}
